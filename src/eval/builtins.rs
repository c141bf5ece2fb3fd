//! The closed set of `fn::` built-ins.
//!
//! Every built-in is a pure function over the value domain: poison
//! propagates silently, unknown inputs short-circuit to unknown results,
//! and eventual inputs make the result eventual. Only `fn::invoke` talks to
//! the orchestrator; only `fn::readFile` touches the filesystem.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use indexmap::IndexMap;
use std::path::PathBuf;

use crate::ast::{BuiltinExpr, Expr};
use crate::eval::value::{lift, Archive, Asset, EvalFailure, EventualValue, PlainValue, Value};
use crate::eval::Evaluator;
use crate::orchestrator::CallRequest;
use crate::package;
use crate::schema::format_number;
use crate::syntax::SourceRange;

impl Evaluator {
    pub(crate) async fn eval_builtin(
        &mut self,
        builtin: &BuiltinExpr,
        range: &SourceRange,
    ) -> Value {
        match builtin {
            BuiltinExpr::Join { delimiter, values } => self.eval_join(delimiter, values).await,
            BuiltinExpr::Split { delimiter, source } => self.eval_split(delimiter, source).await,
            BuiltinExpr::Select { index, values } => self.eval_select(index, values, range).await,
            BuiltinExpr::ToJson { value } => self.eval_to_json(value, range).await,
            BuiltinExpr::ToBase64 { value } => self.eval_to_base64(value).await,
            BuiltinExpr::FromBase64 { value } => self.eval_from_base64(value).await,
            BuiltinExpr::Secret { value } => self.eval_expr(value).await.into_secret(),
            BuiltinExpr::ReadFile { path } => self.eval_read_file(path).await,
            BuiltinExpr::Invoke {
                token, args, ret, ..
            } => self.eval_invoke(token, args.as_ref(), ret.as_ref(), range).await,
            BuiltinExpr::StringAsset { text } => {
                self.eval_asset_builder(text, "fn::stringAsset", |s| {
                    PlainValue::Asset(Asset::String(s))
                })
                .await
            }
            BuiltinExpr::FileAsset { path } => {
                self.eval_asset_builder(path, "fn::fileAsset", |s| {
                    PlainValue::Asset(Asset::File(s))
                })
                .await
            }
            BuiltinExpr::RemoteAsset { uri } => {
                self.eval_asset_builder(uri, "fn::remoteAsset", |s| {
                    PlainValue::Asset(Asset::Remote(s))
                })
                .await
            }
            BuiltinExpr::FileArchive { path } => {
                self.eval_asset_builder(path, "fn::fileArchive", |s| {
                    PlainValue::Archive(Archive::File(s))
                })
                .await
            }
            BuiltinExpr::RemoteArchive { uri } => {
                self.eval_asset_builder(uri, "fn::remoteArchive", |s| {
                    PlainValue::Archive(Archive::Remote(s))
                })
                .await
            }
            BuiltinExpr::AssetArchive { entries } => self.eval_asset_archive(entries).await,
        }
    }

    async fn eval_join(&mut self, delimiter: &Expr, values: &Expr) -> Value {
        let delimiter_value = self.eval_expr(delimiter).await;
        let values_value = self.eval_expr(values).await;
        if delimiter_value.is_poison() || values_value.is_poison() {
            return Value::Poison;
        }

        if let Some(plain) = delimiter_value.as_plain() {
            if plain.as_str().is_none() {
                self.error(
                    &delimiter.range,
                    format!(
                        "the first argument to fn::join must be a string, found {}",
                        plain.type_description()
                    ),
                    "",
                );
                return Value::Poison;
            }
        }
        if let Some(plain) = values_value.as_plain() {
            match plain {
                PlainValue::List(items) => {
                    let mut failed = false;
                    for (i, item) in items.iter().enumerate() {
                        if item.as_str().is_none() {
                            self.error(
                                &values.range,
                                format!(
                                    "the second argument to fn::join must be a list of strings, found {} at index {}",
                                    item.type_description(),
                                    i
                                ),
                                "",
                            );
                            failed = true;
                        }
                    }
                    if failed {
                        return Value::Poison;
                    }
                }
                other => {
                    self.error(
                        &values.range,
                        format!(
                            "the second argument to fn::join must be a list, found {}",
                            other.type_description()
                        ),
                        "",
                    );
                    return Value::Poison;
                }
            }
        }

        lift(vec![delimiter_value, values_value], |plains| {
            let mut plains = plains.into_iter();
            let (Some(PlainValue::String(delimiter)), Some(PlainValue::List(items))) =
                (plains.next(), plains.next())
            else {
                return Err(EvalFailure::new("fn::join arguments changed shape"));
            };
            let strings: Vec<&str> = items.iter().filter_map(PlainValue::as_str).collect();
            Ok(PlainValue::String(strings.join(&delimiter)))
        })
        .unwrap_or(Value::Poison)
    }

    async fn eval_split(&mut self, delimiter: &Expr, source: &Expr) -> Value {
        let delimiter_value = self.eval_expr(delimiter).await;
        let source_value = self.eval_expr(source).await;
        if delimiter_value.is_poison() || source_value.is_poison() {
            return Value::Poison;
        }
        for (value, expr, position) in [
            (&delimiter_value, delimiter, "first"),
            (&source_value, source, "second"),
        ] {
            if let Some(plain) = value.as_plain() {
                if plain.as_str().is_none() {
                    self.error(
                        &expr.range,
                        format!(
                            "the {} argument to fn::split must be a string, found {}",
                            position,
                            plain.type_description()
                        ),
                        "",
                    );
                    return Value::Poison;
                }
            }
        }
        lift(vec![delimiter_value, source_value], |plains| {
            let mut plains = plains.into_iter();
            let (Some(PlainValue::String(delimiter)), Some(PlainValue::String(source))) =
                (plains.next(), plains.next())
            else {
                return Err(EvalFailure::new("fn::split arguments changed shape"));
            };
            Ok(PlainValue::List(
                source
                    .split(&delimiter)
                    .map(|part| PlainValue::String(part.to_string()))
                    .collect(),
            ))
        })
        .unwrap_or(Value::Poison)
    }

    async fn eval_select(&mut self, index: &Expr, values: &Expr, range: &SourceRange) -> Value {
        let index_value = self.eval_expr(index).await;
        let values_value = self.eval_expr(values).await;
        if index_value.is_poison() || values_value.is_poison() {
            return Value::Poison;
        }

        if let Some(plain) = index_value.as_plain() {
            match plain {
                PlainValue::Number(n) if n.fract() == 0.0 => {}
                PlainValue::Number(n) => {
                    self.error(
                        &index.range,
                        format!("fn::select index must be an integer, found {}", n),
                        "",
                    );
                    return Value::Poison;
                }
                other => {
                    self.error(
                        &index.range,
                        format!(
                            "fn::select index must be an integer, found {}",
                            other.type_description()
                        ),
                        "",
                    );
                    return Value::Poison;
                }
            }
        }
        if let Some(plain) = values_value.as_plain() {
            if !matches!(plain, PlainValue::List(_)) {
                self.error(
                    &values.range,
                    format!(
                        "the second argument to fn::select must be a list, found {}",
                        plain.type_description()
                    ),
                    "",
                );
                return Value::Poison;
            }
        }

        let selected = lift(vec![index_value, values_value], |plains| {
            let mut plains = plains.into_iter();
            let (Some(PlainValue::Number(n)), Some(PlainValue::List(items))) =
                (plains.next(), plains.next())
            else {
                return Err(EvalFailure::new("fn::select arguments changed shape"));
            };
            let index = n as i64;
            if index < 0 || index as usize >= items.len() {
                return Err(EvalFailure::new(format!(
                    "fn::select index {} out of range for list of length {}",
                    format_number(n),
                    items.len()
                )));
            }
            Ok(items[index as usize].clone())
        });
        match selected {
            Ok(value) => value,
            Err(failure) => {
                self.error(range, failure.summary, failure.detail);
                Value::Poison
            }
        }
    }

    async fn eval_to_json(&mut self, value: &Expr, range: &SourceRange) -> Value {
        let evaluated = self.eval_expr(value).await;
        if evaluated.is_poison() {
            return Value::Poison;
        }
        let encoded = lift(vec![evaluated], |plains| {
            let json = to_json_value(&plains[0])?;
            serde_json::to_string(&json)
                .map(PlainValue::String)
                .map_err(|err| EvalFailure::new(err.to_string()))
        });
        match encoded {
            Ok(value) => value,
            Err(failure) => {
                self.error(range, failure.summary, failure.detail);
                Value::Poison
            }
        }
    }

    async fn eval_to_base64(&mut self, value: &Expr) -> Value {
        let evaluated = self.eval_expr(value).await;
        if evaluated.is_poison() {
            return Value::Poison;
        }
        if let Some(plain) = evaluated.as_plain() {
            if plain.as_str().is_none() {
                self.error(
                    &value.range,
                    format!(
                        "the argument to fn::toBase64 must be a string, found {}",
                        plain.type_description()
                    ),
                    "",
                );
                return Value::Poison;
            }
        }
        lift(vec![evaluated], |plains| {
            let Some(PlainValue::String(text)) = plains.into_iter().next() else {
                return Err(EvalFailure::new("fn::toBase64 argument changed shape"));
            };
            Ok(PlainValue::String(BASE64.encode(text.as_bytes())))
        })
        .unwrap_or(Value::Poison)
    }

    async fn eval_from_base64(&mut self, value: &Expr) -> Value {
        let evaluated = self.eval_expr(value).await;
        if evaluated.is_poison() {
            return Value::Poison;
        }
        if let Some(plain) = evaluated.as_plain() {
            if plain.as_str().is_none() {
                self.error(
                    &value.range,
                    format!(
                        "the argument to fn::fromBase64 must be a string, found {}",
                        plain.type_description()
                    ),
                    "",
                );
                return Value::Poison;
            }
        }
        let decoded = lift(vec![evaluated], |plains| {
            let Some(PlainValue::String(text)) = plains.into_iter().next() else {
                return Err(EvalFailure::new("fn::fromBase64 argument changed shape"));
            };
            let bytes = BASE64
                .decode(text.as_bytes())
                .map_err(|err| EvalFailure::new(format!("invalid base64: {}", err)))?;
            let decoded = String::from_utf8(bytes)
                .map_err(|_| EvalFailure::new("fn::fromBase64 decoded to invalid UTF-8"))?;
            Ok(PlainValue::String(decoded))
        });
        match decoded {
            Ok(value) => value,
            Err(failure) => {
                self.error(&value.range, failure.summary, failure.detail);
                Value::Poison
            }
        }
    }

    async fn eval_read_file(&mut self, path: &Expr) -> Value {
        let evaluated = self.eval_expr(path).await;
        match &evaluated {
            Value::Poison => return Value::Poison,
            Value::Eventual(eventual) if !eventual.is_known() => return evaluated,
            _ => {}
        }
        let Some(PlainValue::String(requested)) = evaluated.as_plain() else {
            self.error(
                &path.range,
                format!(
                    "the argument to fn::readFile must be a string, found {}",
                    evaluated.type_description()
                ),
                "",
            );
            return Value::Poison;
        };

        let base = self.options.working_directory.clone();
        let candidate = {
            let p = PathBuf::from(requested);
            if p.is_absolute() {
                p
            } else {
                base.join(p)
            }
        };
        let canonical_base = base.canonicalize().unwrap_or(base);
        let canonical = match candidate.canonicalize() {
            Ok(canonical) => canonical,
            Err(err) => {
                self.error(
                    &path.range,
                    format!("fn::readFile: unable to open {}: {}", requested, err),
                    "",
                );
                return Value::Poison;
            }
        };
        if !canonical.starts_with(&canonical_base) && !self.options.allow_external_paths {
            self.error(
                &path.range,
                format!(
                    "fn::readFile path {} is outside of the working directory {}",
                    requested,
                    canonical_base.display()
                ),
                "",
            );
            return Value::Poison;
        }

        match std::fs::read_to_string(&canonical) {
            Ok(contents) => {
                let deps = evaluated.deps();
                let secret = evaluated.is_secret();
                if deps.is_empty() && !secret {
                    Value::string(contents)
                } else {
                    Value::Eventual(EventualValue {
                        value: Some(PlainValue::String(contents)),
                        secret,
                        deps,
                    })
                }
            }
            Err(err) => {
                self.error(
                    &path.range,
                    format!("fn::readFile: unable to read {}: {}", requested, err),
                    "",
                );
                Value::Poison
            }
        }
    }

    async fn eval_invoke(
        &mut self,
        token: &Expr,
        args: Option<&Expr>,
        ret: Option<&Expr>,
        range: &SourceRange,
    ) -> Value {
        let Some(token_value) = token.as_string_literal() else {
            self.error(
                &token.range,
                "fn::invoke function must be a string literal",
                "",
            );
            return Value::Poison;
        };
        let token_value = token_value.to_string();

        let args_value = match args {
            Some(args) => self.eval_expr(args).await,
            None => Value::Plain(PlainValue::Object(IndexMap::new())),
        };
        if args_value.is_poison() {
            return Value::Poison;
        }
        // An unknown argument means the call cannot happen yet; the whole
        // invocation is unknown.
        if args_value.is_unknown() {
            return args_value;
        }
        let (arg_map, deps, secret) = match &args_value {
            Value::Poison | Value::Eventual(EventualValue { value: None, .. }) => unreachable!(),
            Value::Plain(PlainValue::Object(map)) => (map.clone(), Default::default(), false),
            Value::Eventual(eventual) => match &eventual.value {
                Some(PlainValue::Object(map)) => {
                    (map.clone(), eventual.deps.clone(), eventual.secret)
                }
                _ => {
                    self.error(
                        range,
                        format!(
                            "fn::invoke arguments must be an object, found {}",
                            args_value.type_description()
                        ),
                        "",
                    );
                    return Value::Poison;
                }
            },
            Value::Plain(other) => {
                self.error(
                    range,
                    format!(
                        "fn::invoke arguments must be an object, found {}",
                        other.type_description()
                    ),
                    "",
                );
                return Value::Poison;
            }
        };

        // Diagnostic mode: after an error the call is never issued.
        if self.diags.has_errors() {
            return Value::Poison;
        }

        let loader = self.loader.clone();
        let canonical = match package::resolve_function(loader.as_ref(), &token_value).await {
            Ok((_, canonical)) => canonical,
            Err(err) => {
                self.error(range, err.to_string(), "");
                return Value::Poison;
            }
        };

        let request = CallRequest {
            token: canonical,
            args: arg_map
                .into_iter()
                .map(|(k, v)| (k, Value::Plain(v)))
                .collect(),
        };
        let orchestrator = self.orchestrator.clone();
        let response = match orchestrator.call(request).await {
            Ok(response) => response,
            Err(err) => {
                self.error(range, err.to_string(), "");
                return Value::Poison;
            }
        };

        let wrap = |value: Value| -> Value {
            if deps.is_empty() && !secret {
                return value;
            }
            match value {
                Value::Plain(plain) => Value::Eventual(EventualValue {
                    value: Some(plain),
                    secret,
                    deps: deps.clone(),
                }),
                Value::Eventual(eventual) => Value::Eventual(EventualValue {
                    secret: eventual.secret || secret,
                    deps: eventual.deps.union(&deps).cloned().collect(),
                    value: eventual.value,
                }),
                Value::Poison => Value::Poison,
            }
        };

        if let Some(ret) = ret {
            let Some(ret_name) = ret.as_string_literal() else {
                self.error(&ret.range, "fn::invoke return must be a string literal", "");
                return Value::Poison;
            };
            let found = response
                .outputs
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(ret_name))
                .map(|(_, value)| value.clone());
            match found {
                Some(value) => wrap(value),
                None => {
                    self.error(
                        &ret.range,
                        format!(
                            "fn::invoke of {} returned no field '{}'",
                            token_value, ret_name
                        ),
                        "",
                    );
                    Value::Poison
                }
            }
        } else {
            let pairs: Vec<(Value, Value)> = response
                .outputs
                .into_iter()
                .map(|(name, value)| (Value::string(name), value))
                .collect();
            match crate::eval::value::collect_object(pairs) {
                Ok(value) => wrap(value),
                Err(failure) => {
                    self.error(range, failure.summary, failure.detail);
                    Value::Poison
                }
            }
        }
    }

    async fn eval_asset_builder(
        &mut self,
        argument: &Expr,
        name: &'static str,
        build: impl FnOnce(String) -> PlainValue + Send,
    ) -> Value {
        let evaluated = self.eval_expr(argument).await;
        if evaluated.is_poison() {
            return Value::Poison;
        }
        if let Some(plain) = evaluated.as_plain() {
            if plain.as_str().is_none() {
                self.error(
                    &argument.range,
                    format!(
                        "the argument to {} must be a string, found {}",
                        name,
                        plain.type_description()
                    ),
                    "",
                );
                return Value::Poison;
            }
        }
        lift(vec![evaluated], |plains| {
            let Some(PlainValue::String(text)) = plains.into_iter().next() else {
                return Err(EvalFailure::new("asset argument changed shape"));
            };
            Ok(build(text))
        })
        .unwrap_or(Value::Poison)
    }

    async fn eval_asset_archive(&mut self, entries: &Expr) -> Value {
        let evaluated = self.eval_expr(entries).await;
        if evaluated.is_poison() {
            return Value::Poison;
        }
        let archived = lift(vec![evaluated], |plains| {
            let Some(PlainValue::Object(map)) = plains.into_iter().next() else {
                return Err(EvalFailure::new(
                    "fn::assetArchive requires an object of assets and archives",
                ));
            };
            for (key, value) in &map {
                if !matches!(value, PlainValue::Asset(_) | PlainValue::Archive(_)) {
                    return Err(EvalFailure::new(format!(
                        "fn::assetArchive entry '{}' must be an asset or an archive, found {}",
                        key,
                        value.type_description()
                    )));
                }
            }
            Ok(PlainValue::Archive(Archive::Assets(map)))
        });
        match archived {
            Ok(value) => value,
            Err(failure) => {
                self.error(&entries.range, failure.summary, failure.detail);
                Value::Poison
            }
        }
    }
}

/// Encodes a plain value as JSON. Object key order follows source order.
pub fn to_json_value(plain: &PlainValue) -> Result<serde_json::Value, EvalFailure> {
    Ok(match plain {
        PlainValue::Null => serde_json::Value::Null,
        PlainValue::Bool(b) => serde_json::Value::Bool(*b),
        PlainValue::Number(n) => {
            if n.fract() == 0.0 && n.abs() < 9.0e15 {
                serde_json::Value::Number(serde_json::Number::from(*n as i64))
            } else {
                serde_json::Number::from_f64(*n)
                    .map(serde_json::Value::Number)
                    .ok_or_else(|| EvalFailure::new("cannot encode a non-finite number as JSON"))?
            }
        }
        PlainValue::String(s) => serde_json::Value::String(s.clone()),
        PlainValue::List(items) => serde_json::Value::Array(
            items
                .iter()
                .map(to_json_value)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        PlainValue::Object(map) => {
            let mut object = serde_json::Map::with_capacity(map.len());
            for (key, value) in map {
                object.insert(key.clone(), to_json_value(value)?);
            }
            serde_json::Value::Object(object)
        }
        other => {
            return Err(EvalFailure::new(format!(
                "cannot encode {} as JSON",
                other.type_description()
            )))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_preserves_source_key_order() {
        let mut map = IndexMap::new();
        map.insert("one".to_string(), PlainValue::Number(1.0));
        map.insert(
            "two".to_string(),
            PlainValue::List(vec![PlainValue::Number(1.0), PlainValue::Number(2.0)]),
        );
        let json = to_json_value(&PlainValue::Object(map)).unwrap();
        assert_eq!(
            serde_json::to_string(&json).unwrap(),
            r#"{"one":1,"two":[1,2]}"#
        );
    }

    #[test]
    fn json_numbers_drop_integral_fractions() {
        let json = to_json_value(&PlainValue::Number(42.0)).unwrap();
        assert_eq!(serde_json::to_string(&json).unwrap(), "42");
        let json = to_json_value(&PlainValue::Number(1.5)).unwrap();
        assert_eq!(serde_json::to_string(&json).unwrap(), "1.5");
    }

    #[test]
    fn assets_do_not_encode_as_json() {
        let err = to_json_value(&PlainValue::Asset(Asset::String("x".into()))).unwrap_err();
        assert!(err.summary.contains("cannot encode an asset as JSON"));
    }
}

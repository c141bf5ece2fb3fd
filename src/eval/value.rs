//! The evaluator's value domain.
//!
//! A value is either plain, an *eventual* record (possibly-unknown contents
//! plus dependency and secrecy markers), or the poison sentinel left behind
//! by a failed expression. Built-ins are pure functions over this domain:
//! [`lift`] composes them so that any eventual input makes the result
//! eventual, unknown inputs short-circuit, and poison propagates silently.

use std::collections::BTreeSet;

use indexmap::IndexMap;

use crate::schema::format_number;

/// An asset: inline text, a local file, or a remote URI.
#[derive(Debug, Clone, PartialEq)]
pub enum Asset {
    String(String),
    File(String),
    Remote(String),
}

/// An archive: a bag of named assets/archives, a local file, or a remote URI.
#[derive(Debug, Clone, PartialEq)]
pub enum Archive {
    Assets(IndexMap<String, PlainValue>),
    File(String),
    Remote(String),
}

/// A fully-known value.
#[derive(Debug, Clone, PartialEq)]
pub enum PlainValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<PlainValue>),
    Object(IndexMap<String, PlainValue>),
    Asset(Asset),
    Archive(Archive),
}

impl PlainValue {
    /// Indefinite-article description, for diagnostics ("found a number").
    pub fn type_description(&self) -> &'static str {
        match self {
            PlainValue::Null => "null",
            PlainValue::Bool(_) => "a boolean",
            PlainValue::Number(_) => "a number",
            PlainValue::String(_) => "a string",
            PlainValue::List(_) => "a list",
            PlainValue::Object(_) => "an object",
            PlainValue::Asset(_) => "an asset",
            PlainValue::Archive(_) => "an archive",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PlainValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// The string form used by interpolation. Numbers drop a trailing `.0`;
    /// null renders empty.
    pub fn to_display_string(&self) -> String {
        match self {
            PlainValue::Null => String::new(),
            PlainValue::Bool(b) => b.to_string(),
            PlainValue::Number(n) => format_number(*n),
            PlainValue::String(s) => s.clone(),
            other => format!("{:?}", other),
        }
    }
}

/// A value that resolves during apply: the dependency set is always known,
/// the contents may not be (preview), and the whole record may be secret.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventualValue {
    /// `None` marks an unknown (preview-time) value.
    pub value: Option<PlainValue>,
    pub secret: bool,
    /// Logical names of the resources this value was derived from.
    pub deps: BTreeSet<String>,
}

impl EventualValue {
    pub fn known(value: PlainValue) -> Self {
        Self {
            value: Some(value),
            ..Default::default()
        }
    }

    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn with_dep(mut self, dep: impl Into<String>) -> Self {
        self.deps.insert(dep.into());
        self
    }

    pub fn with_secret(mut self, secret: bool) -> Self {
        self.secret = secret;
        self
    }

    pub fn is_known(&self) -> bool {
        self.value.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Plain(PlainValue),
    Eventual(EventualValue),
    /// Sentinel for a failed expression; consumers propagate it without
    /// reporting again.
    Poison,
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::Plain(PlainValue::String(s.into()))
    }

    pub fn number(n: f64) -> Self {
        Value::Plain(PlainValue::Number(n))
    }

    pub fn bool(b: bool) -> Self {
        Value::Plain(PlainValue::Bool(b))
    }

    pub fn null() -> Self {
        Value::Plain(PlainValue::Null)
    }

    pub fn unknown_from(deps: BTreeSet<String>, secret: bool) -> Self {
        Value::Eventual(EventualValue {
            value: None,
            secret,
            deps,
        })
    }

    pub fn is_poison(&self) -> bool {
        matches!(self, Value::Poison)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Value::Eventual(e) if !e.is_known())
    }

    pub fn is_secret(&self) -> bool {
        matches!(self, Value::Eventual(e) if e.secret)
    }

    /// The dependency set carried by this value.
    pub fn deps(&self) -> BTreeSet<String> {
        match self {
            Value::Eventual(e) => e.deps.clone(),
            _ => BTreeSet::new(),
        }
    }

    /// The plain contents, when known.
    pub fn as_plain(&self) -> Option<&PlainValue> {
        match self {
            Value::Plain(p) => Some(p),
            Value::Eventual(e) => e.value.as_ref(),
            Value::Poison => None,
        }
    }

    /// Marks the value secret. The result is always eventual, even for a
    /// plain input.
    pub fn into_secret(self) -> Value {
        match self {
            Value::Plain(p) => Value::Eventual(EventualValue::known(p).with_secret(true)),
            Value::Eventual(e) => Value::Eventual(e.with_secret(true)),
            Value::Poison => Value::Poison,
        }
    }

    /// Indefinite-article description of the contents, for diagnostics.
    pub fn type_description(&self) -> &'static str {
        match self {
            Value::Plain(p) => p.type_description(),
            Value::Eventual(e) => match &e.value {
                Some(p) => p.type_description(),
                None => "an unknown value",
            },
            Value::Poison => "a failed value",
        }
    }
}

/// A failed computation inside a lifted function: a diagnostic summary and
/// optional detail, positioned by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalFailure {
    pub summary: String,
    pub detail: String,
}

impl EvalFailure {
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            detail: String::new(),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }
}

/// Applies a pure function over the plain contents of `inputs`.
///
/// Poison wins over everything; unknown inputs short-circuit to an unknown
/// result carrying the merged markers; otherwise the function runs and the
/// result is eventual iff any input was.
pub fn lift<F>(inputs: Vec<Value>, f: F) -> Result<Value, EvalFailure>
where
    F: FnOnce(Vec<PlainValue>) -> Result<PlainValue, EvalFailure>,
{
    if inputs.iter().any(Value::is_poison) {
        return Ok(Value::Poison);
    }
    let mut secret = false;
    let mut deps = BTreeSet::new();
    let mut any_eventual = false;
    let mut known = true;
    for input in &inputs {
        if let Value::Eventual(e) = input {
            any_eventual = true;
            secret |= e.secret;
            deps.extend(e.deps.iter().cloned());
            known &= e.is_known();
        }
    }
    if !known {
        return Ok(Value::unknown_from(deps, secret));
    }
    let plains: Vec<PlainValue> = inputs
        .into_iter()
        .map(|v| match v {
            Value::Plain(p) => p,
            Value::Eventual(e) => e.value.expect("checked known above"),
            Value::Poison => unreachable!("checked poison above"),
        })
        .collect();
    let result = f(plains)?;
    if any_eventual {
        Ok(Value::Eventual(EventualValue {
            value: Some(result),
            secret,
            deps,
        }))
    } else {
        Ok(Value::Plain(result))
    }
}

/// Collapses a list of evaluated elements into a single list value,
/// lifting to eventual when any element is eventual.
pub fn collect_list(items: Vec<Value>) -> Value {
    lift(items, |plains| Ok(PlainValue::List(plains)))
        .expect("list collection cannot fail")
}

/// Collapses evaluated `(key, value)` pairs into an object value.
pub fn collect_object(entries: Vec<(Value, Value)>) -> Result<Value, EvalFailure> {
    let mut flat = Vec::with_capacity(entries.len() * 2);
    for (key, value) in entries {
        flat.push(key);
        flat.push(value);
    }
    lift(flat, |plains| {
        let mut object = IndexMap::with_capacity(plains.len() / 2);
        let mut iter = plains.into_iter();
        while let (Some(key), Some(value)) = (iter.next(), iter.next()) {
            let PlainValue::String(key) = key else {
                return Err(EvalFailure::new(format!(
                    "object keys must be strings, found {}",
                    key.type_description()
                )));
            };
            object.insert(key, value);
        }
        Ok(PlainValue::Object(object))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eventual(value: PlainValue, dep: &str) -> Value {
        Value::Eventual(EventualValue::known(value).with_dep(dep))
    }

    #[test]
    fn lift_of_plain_inputs_is_plain() {
        let result = lift(
            vec![Value::string("a"), Value::string("b")],
            |plains| {
                let joined = plains
                    .iter()
                    .map(|p| p.as_str().unwrap())
                    .collect::<Vec<_>>()
                    .join("-");
                Ok(PlainValue::String(joined))
            },
        )
        .unwrap();
        assert_eq!(result, Value::string("a-b"));
    }

    #[test]
    fn lift_merges_deps_and_secrecy() {
        let a = eventual(PlainValue::String("x".into()), "resA");
        let b = Value::Eventual(
            EventualValue::known(PlainValue::String("y".into()))
                .with_dep("resB")
                .with_secret(true),
        );
        let result = lift(vec![a, b], |_| Ok(PlainValue::Null)).unwrap();
        let Value::Eventual(e) = result else {
            panic!("expected an eventual result");
        };
        assert!(e.secret);
        assert_eq!(
            e.deps.into_iter().collect::<Vec<_>>(),
            vec!["resA".to_string(), "resB".to_string()]
        );
    }

    #[test]
    fn unknown_inputs_short_circuit() {
        let unknown = Value::Eventual(EventualValue::unknown().with_dep("resA"));
        let result = lift(vec![Value::string("x"), unknown], |_| {
            panic!("must not run on unknown inputs")
        })
        .unwrap();
        assert!(result.is_unknown());
        assert_eq!(result.deps().len(), 1);
    }

    #[test]
    fn poison_wins_silently() {
        let result = lift(vec![Value::string("x"), Value::Poison], |_| {
            panic!("must not run on poisoned inputs")
        })
        .unwrap();
        assert!(result.is_poison());
    }

    #[test]
    fn secret_marking_is_always_eventual() {
        let v = Value::string("hush").into_secret();
        assert!(v.is_secret());
        assert_eq!(v.as_plain(), Some(&PlainValue::String("hush".into())));
    }

    #[test]
    fn collect_list_lifts_eventual_elements() {
        let list = collect_list(vec![
            Value::number(1.0),
            eventual(PlainValue::Number(2.0), "resA"),
        ]);
        let Value::Eventual(e) = list else {
            panic!("expected eventual");
        };
        assert_eq!(
            e.value,
            Some(PlainValue::List(vec![
                PlainValue::Number(1.0),
                PlainValue::Number(2.0)
            ]))
        );
        assert!(e.deps.contains("resA"));
    }

    #[test]
    fn display_strings_format_numbers_minimally() {
        assert_eq!(PlainValue::Number(42.0).to_display_string(), "42");
        assert_eq!(PlainValue::Number(1.5).to_display_string(), "1.5");
        assert_eq!(PlainValue::Null.to_display_string(), "");
    }
}

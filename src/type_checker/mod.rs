//! Structural type checking over the decl tree.
//!
//! The checker runs once per program, after planning and before evaluation.
//! It computes a [`SchemaType`] for every expression (the type cache), checks
//! resource inputs and invoke arguments property-by-property against their
//! schema hints, and reports every mismatch as a diagnostic. Expressions the
//! checker cannot type are cached as `Invalid` so downstream passes never
//! see a hole.

pub mod assignable;
pub mod property;

use std::collections::{HashMap, HashSet};

use futures::future::join_all;
use tracing::debug;

use crate::ast::{
    BuiltinExpr, ConfigEntry, Expr, ExprId, ExprKind, PropertyEntry, PropertyMapOrExpr,
    ResourceEntry, TemplateDecl, VariableEntry,
};
use crate::diags::suggestion::ExistingFieldFormatter;
use crate::diags::{Diagnostic, Diagnostics};
use crate::package::PackageLoader;
use crate::runner::{self, Plan, Walker, BUILTIN_VAR_NAME};
use crate::schema::{FunctionType, ObjectType, Property, ResourceType, SchemaType};
use crate::syntax::SourceRange;
use crate::type_checker::assignable::{is_assignable_literal, Literal};
use crate::type_checker::property::type_property_access;

/// Queries over the typing of a checked program.
#[derive(Debug, Default)]
pub struct TypeCache {
    exprs: HashMap<ExprId, SchemaType>,
    resources: HashMap<String, SchemaType>,
    configuration: HashMap<String, SchemaType>,
    outputs: HashMap<String, SchemaType>,
    variables: HashMap<String, ExprId>,
}

impl TypeCache {
    /// A cache pre-seeded with the built-in context variable.
    fn seeded() -> Self {
        let mut cache = TypeCache::default();
        cache.exprs.insert(
            0,
            SchemaType::Object(ObjectType {
                token: "pulumi:builtin:pulumi".to_string(),
                properties: vec![
                    Property::new("cwd", SchemaType::String),
                    Property::new("project", SchemaType::String),
                    Property::new("stack", SchemaType::String),
                ],
            }),
        );
        cache.variables.insert(BUILTIN_VAR_NAME.to_string(), 0);
        cache
    }

    pub fn type_resource(&self, name: &str) -> Option<&SchemaType> {
        self.resources.get(name)
    }

    pub fn type_variable(&self, name: &str) -> Option<&SchemaType> {
        self.exprs.get(self.variables.get(name)?)
    }

    pub fn type_config(&self, name: &str) -> Option<&SchemaType> {
        self.configuration.get(name)
    }

    pub fn type_output(&self, name: &str) -> Option<&SchemaType> {
        self.outputs.get(name)
    }

    pub fn type_expr(&self, id: ExprId) -> Option<&SchemaType> {
        self.exprs.get(&id)
    }
}

/// Pre-resolved schema hints, keyed by the token as written in the program.
#[derive(Debug, Default)]
pub struct Hints {
    resources: HashMap<String, Result<ResourceType, String>>,
    functions: HashMap<String, Result<FunctionType, String>>,
}

impl Hints {
    pub fn resource(&self, token: &str) -> Option<&Result<ResourceType, String>> {
        self.resources.get(token)
    }

    pub fn function(&self, token: &str) -> Option<&Result<FunctionType, String>> {
        self.functions.get(token)
    }
}

/// Resolves every resource and function token the template mentions.
pub async fn prefetch_hints(template: &TemplateDecl, loader: &dyn PackageLoader) -> Hints {
    let mut hints = Hints::default();
    let mut resource_tokens: Vec<&str> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    for entry in &template.resources {
        if seen.insert(&entry.decl.ty.value) {
            resource_tokens.push(&entry.decl.ty.value);
        }
    }
    let mut function_tokens: Vec<String> = Vec::new();
    for expr in all_expressions(template) {
        collect_function_tokens(expr, &mut function_tokens);
    }
    function_tokens.dedup();

    // Package loads are independent; resolve them concurrently.
    let resource_hints = join_all(resource_tokens.into_iter().map(|token| async move {
        let resolved = match crate::package::resolve_resource(loader, token).await {
            Ok((package, canonical)) => {
                let mut hint = package
                    .resource_type_hint(&canonical)
                    .unwrap_or_else(|| ResourceType::new(canonical.as_str()));
                hint.is_component = package.is_component(&canonical).unwrap_or(false);
                Ok(hint)
            }
            Err(err) => Err(err.to_string()),
        };
        (token.to_string(), resolved)
    }));
    let function_hints = join_all(function_tokens.into_iter().map(|token| async move {
        let resolved = match crate::package::resolve_function(loader, &token).await {
            Ok((package, canonical)) => Ok(package
                .function_type_hint(&canonical)
                .unwrap_or_else(|| FunctionType {
                    token: canonical.as_str().to_string(),
                    inputs: None,
                    outputs: None,
                })),
            Err(err) => Err(err.to_string()),
        };
        (token, resolved)
    }));
    let (resource_hints, function_hints) = futures::join!(resource_hints, function_hints);
    hints.resources.extend(resource_hints);
    hints.functions.extend(function_hints);
    hints
}

fn all_expressions(template: &TemplateDecl) -> Vec<&Expr> {
    let mut exprs = Vec::new();
    for entry in template.config_entries() {
        exprs.extend(entry.param.default.iter());
        exprs.extend(entry.param.value.iter());
    }
    exprs.extend(template.variables.iter().map(|v| &v.value));
    for entry in &template.resources {
        exprs.extend(entry.decl.expressions());
    }
    exprs.extend(template.outputs.iter().map(|o| &o.value));
    exprs
}

fn collect_function_tokens(expr: &Expr, out: &mut Vec<String>) {
    match &expr.kind {
        ExprKind::Builtin(builtin) => {
            if let BuiltinExpr::Invoke { token, .. } = &**builtin {
                if let Some(token) = token.as_string_literal() {
                    if !out.iter().any(|t| t == token) {
                        out.push(token.to_string());
                    }
                }
            }
            for child in builtin.children() {
                collect_function_tokens(child, out);
            }
        }
        ExprKind::List(items) => {
            for item in items {
                collect_function_tokens(item, out);
            }
        }
        ExprKind::Object(entries) => {
            for entry in entries {
                collect_function_tokens(&entry.value, out);
            }
        }
        _ => {}
    }
}

/// Runs the checker over a template, returning the type cache and every
/// diagnostic found (including planning diagnostics).
pub async fn type_check(
    template: &TemplateDecl,
    loader: &dyn PackageLoader,
) -> (TypeCache, Diagnostics) {
    let mut diags = Diagnostics::new();
    let plan = runner::plan(template, &mut diags);
    let hints = prefetch_hints(template, loader).await;
    let cache = type_check_with(template, &plan, hints, &mut diags);
    (cache, diags)
}

/// Checker entry for callers that already planned and prefetched.
pub fn type_check_with(
    template: &TemplateDecl,
    plan: &Plan,
    hints: Hints,
    diags: &mut Diagnostics,
) -> TypeCache {
    let mut ctx = CheckContext {
        cache: TypeCache::seeded(),
        diags: std::mem::take(diags),
        hints,
    };
    let mut walker: Walker<'_, CheckContext> = Walker {
        visit_expr: Some(Box::new(type_expr)),
        visit_config: Some(Box::new(type_config)),
        visit_variable: Some(Box::new(type_variable)),
        visit_resource: Some(Box::new(type_resource)),
        visit_output: Some(Box::new(type_output)),
    };
    walker.walk(&mut ctx, template, plan);
    debug!(
        exprs = ctx.cache.exprs.len(),
        errors = ctx.diags.has_errors(),
        "type check finished"
    );
    *diags = ctx.diags;
    ctx.cache
}

struct CheckContext {
    cache: TypeCache,
    diags: Diagnostics,
    hints: Hints,
}

impl CheckContext {
    fn expr_type(&self, expr: &Expr) -> SchemaType {
        self.cache
            .exprs
            .get(&expr.id)
            .cloned()
            .unwrap_or(SchemaType::Invalid)
    }

    fn set_type(&mut self, expr: &Expr, ty: SchemaType) {
        self.cache.exprs.insert(expr.id, ty);
    }

    /// Reports a diagnostic when `from_expr` cannot be assigned where `to`
    /// is expected. Internal mismatches demote to warnings.
    fn assert_assignable(&mut self, range: &SourceRange, from_expr: &Expr, to: &SchemaType) {
        let from = self.expr_type(from_expr);
        let literal = match &from_expr.kind {
            ExprKind::String(s) => Some(Literal::String(s)),
            ExprKind::Number(n) => Some(Literal::Number(*n)),
            _ => None,
        };
        if let Err(reason) = is_assignable_literal(&from, to, literal) {
            let summary = format!(
                "{} is not assignable from {}",
                to.display_type(),
                from.display_type()
            );
            if reason.is_internal() {
                self.diags.push(Diagnostic::warning(
                    Some(range.clone()),
                    format!("internal error: {}", summary),
                    reason.to_string(),
                ));
            } else {
                self.diags.push(Diagnostic::error(
                    Some(range.clone()),
                    summary,
                    reason.to_string(),
                ));
            }
        }
    }
}

fn type_expr(ctx: &mut CheckContext, expr: &Expr) {
    let ty = match &expr.kind {
        ExprKind::Null => SchemaType::Invalid,
        ExprKind::Boolean(_) => SchemaType::Boolean,
        ExprKind::Number(_) => SchemaType::Number,
        ExprKind::String(_) => SchemaType::String,
        ExprKind::Interpolate(_) => SchemaType::String,
        ExprKind::Symbol(_) => {
            type_symbol(ctx, expr);
            return;
        }
        ExprKind::List(items) => {
            let mut element_types: Vec<SchemaType> = Vec::new();
            for item in items {
                let ty = ctx.expr_type(item);
                if !element_types.contains(&ty) {
                    element_types.push(ty);
                }
            }
            let element = match element_types.len() {
                0 => SchemaType::Invalid,
                1 => element_types.into_iter().next().expect("length checked"),
                _ => SchemaType::Union(element_types),
            };
            SchemaType::array(element)
        }
        ExprKind::Object(entries) => {
            let mut properties = Vec::with_capacity(entries.len());
            let mut valid = true;
            for entry in entries {
                match &entry.key.kind {
                    ExprKind::String(name) => properties
                        .push(Property::new(name.clone(), ctx.expr_type(&entry.value))),
                    other => {
                        ctx.diags.push(Diagnostic::error(
                            Some(entry.key.range.clone()),
                            format!("Object key must be a string, got {}", describe_kind(other)),
                            "",
                        ));
                        valid = false;
                    }
                }
            }
            if valid {
                SchemaType::Object(ObjectType::anonymous(properties))
            } else {
                SchemaType::Invalid
            }
        }
        ExprKind::Builtin(builtin) => type_builtin(ctx, builtin),
    };
    ctx.set_type(expr, ty);
}

fn describe_kind(kind: &ExprKind) -> &'static str {
    match kind {
        ExprKind::Null => "null",
        ExprKind::Boolean(_) => "a boolean",
        ExprKind::Number(_) => "a number",
        ExprKind::String(_) => "a string",
        ExprKind::Interpolate(_) => "an interpolated string",
        ExprKind::Symbol(_) => "a symbol",
        ExprKind::List(_) => "a list",
        ExprKind::Object(_) => "an object",
        ExprKind::Builtin(_) => "a builtin function call",
    }
}

fn type_builtin(ctx: &mut CheckContext, builtin: &BuiltinExpr) -> SchemaType {
    match builtin {
        BuiltinExpr::Join { delimiter, .. } => {
            ctx.assert_assignable(&delimiter.range, delimiter, &SchemaType::String);
            SchemaType::String
        }
        BuiltinExpr::Split { delimiter, source } => {
            ctx.assert_assignable(&delimiter.range, delimiter, &SchemaType::String);
            ctx.assert_assignable(&source.range, source, &SchemaType::String);
            SchemaType::array(SchemaType::String)
        }
        BuiltinExpr::Select { index, values } => {
            // Integrality of the index is a runtime check; the static check
            // only rejects non-numeric indices.
            ctx.assert_assignable(&index.range, index, &SchemaType::Number);
            ctx.assert_assignable(&values.range, values, &SchemaType::array(SchemaType::Any));
            match ctx.expr_type(values).unwrap() {
                SchemaType::Array(element) => (**element).clone(),
                _ => SchemaType::Invalid,
            }
        }
        BuiltinExpr::ToJson { .. } => SchemaType::String,
        BuiltinExpr::ToBase64 { value } | BuiltinExpr::FromBase64 { value } => {
            ctx.assert_assignable(&value.range, value, &SchemaType::String);
            SchemaType::String
        }
        BuiltinExpr::Secret { value } => ctx.expr_type(value),
        BuiltinExpr::ReadFile { path } => {
            ctx.assert_assignable(&path.range, path, &SchemaType::String);
            SchemaType::String
        }
        BuiltinExpr::Invoke { .. } => type_invoke(ctx, builtin),
        BuiltinExpr::StringAsset { .. }
        | BuiltinExpr::FileAsset { .. }
        | BuiltinExpr::RemoteAsset { .. } => SchemaType::Asset,
        BuiltinExpr::AssetArchive { .. }
        | BuiltinExpr::FileArchive { .. }
        | BuiltinExpr::RemoteArchive { .. } => SchemaType::Archive,
    }
}

fn type_invoke(ctx: &mut CheckContext, builtin: &BuiltinExpr) -> SchemaType {
    let BuiltinExpr::Invoke {
        token, args, ret, ..
    } = builtin
    else {
        unreachable!("caller matched invoke");
    };
    let Some(token_value) = token.as_string_literal() else {
        ctx.diags.push(Diagnostic::error(
            Some(token.range.clone()),
            "fn::invoke function must be a string literal",
            "",
        ));
        return SchemaType::Invalid;
    };
    let hint = match ctx.hints.functions.get(token_value) {
        Some(Ok(hint)) => hint.clone(),
        Some(Err(message)) => {
            let message = message.clone();
            ctx.diags
                .push(Diagnostic::error(Some(token.range.clone()), message, ""));
            return SchemaType::Invalid;
        }
        None => return SchemaType::Invalid,
    };

    if let Some(args) = args {
        if let ExprKind::Object(entries) = &args.kind {
            let input_names: Vec<String> = hint
                .inputs
                .as_ref()
                .map(|inputs| inputs.properties.iter().map(|p| p.name.clone()).collect())
                .unwrap_or_default();
            let fmtr =
                ExistingFieldFormatter::new(format!("Invoke {}", hint.token), input_names);
            for entry in entries {
                let Some(key) = entry.key.as_string_literal() else {
                    continue;
                };
                let input = hint.inputs.as_ref().and_then(|inputs| inputs.property(key));
                match input {
                    Some(input) => {
                        let ty = input.ty.clone();
                        ctx.assert_assignable(&entry.value.range, &entry.value, &ty);
                    }
                    None => {
                        let (summary, detail) = fmtr.message_with_detail(key);
                        ctx.diags.push(Diagnostic::error(
                            Some(entry.key.range.clone()),
                            summary,
                            detail,
                        ));
                    }
                }
            }
        }
    }

    if let Some(ret) = ret {
        let Some(ret_name) = ret.as_string_literal() else {
            ctx.diags.push(Diagnostic::error(
                Some(ret.range.clone()),
                "fn::invoke return must be a string literal",
                "",
            ));
            return SchemaType::Invalid;
        };
        let output = hint.outputs.as_ref().and_then(|outputs| {
            outputs
                .properties
                .iter()
                .find(|p| p.name.eq_ignore_ascii_case(ret_name))
        });
        match output {
            Some(output) => output.ty.clone(),
            None => {
                let fields = hint
                    .outputs
                    .as_ref()
                    .map(|o| o.properties.iter().map(|p| p.name.clone()).collect())
                    .unwrap_or_default();
                let fmtr =
                    ExistingFieldFormatter::new(token_value.to_string(), fields).properties();
                let (summary, detail) = fmtr.message_with_detail(ret_name);
                ctx.diags
                    .push(Diagnostic::error(Some(ret.range.clone()), summary, detail));
                SchemaType::Invalid
            }
        }
    } else {
        match &hint.outputs {
            Some(outputs) => SchemaType::Object(outputs.clone()),
            None => SchemaType::Invalid,
        }
    }
}

fn type_symbol(ctx: &mut CheckContext, expr: &Expr) {
    let ExprKind::Symbol(access) = &expr.kind else {
        return;
    };
    let Some(root) = access.root_name() else {
        ctx.set_type(expr, SchemaType::Invalid);
        return;
    };
    let root_type = if let Some(ty) = ctx.cache.resources.get(root) {
        ty.clone()
    } else if let Some(id) = ctx.cache.variables.get(root) {
        ctx.cache
            .exprs
            .get(id)
            .cloned()
            .unwrap_or(SchemaType::Invalid)
    } else if let Some(ty) = ctx.cache.configuration.get(root) {
        ty.clone()
    } else {
        // Planning already reported unresolved roots.
        ctx.set_type(expr, SchemaType::Invalid);
        return;
    };

    let mut pending: Vec<(String, String)> = Vec::new();
    let mut set_error = |summary: &str, detail: &str| {
        pending.push((summary.to_string(), detail.to_string()));
        SchemaType::Invalid
    };
    let ty = type_property_access(&root_type, root, &access.accessors[1..], &mut set_error);
    for (summary, detail) in pending {
        ctx.diags
            .push(Diagnostic::error(Some(expr.range.clone()), summary, detail));
    }
    ctx.set_type(expr, ty);
}

fn type_config(ctx: &mut CheckContext, entry: &ConfigEntry) {
    let name = &entry.key.value;
    let ty = if let Some(value) = &entry.param.value {
        ctx.expr_type(value)
    } else if let Some(default) = &entry.param.default {
        ctx.expr_type(default)
    } else if let Some(declared) = &entry.param.ty {
        parse_config_type(&declared.value).unwrap_or(SchemaType::Invalid)
    } else {
        SchemaType::Invalid
    };
    ctx.cache.configuration.insert(name.clone(), ty);
}

/// Parses a declared configuration type. Accepts the canonical lowercase
/// spellings and the legacy capitalized forms (`String`, `List<String>`).
pub fn parse_config_type(declared: &str) -> Option<SchemaType> {
    let trimmed = declared.trim();
    let folded = trimmed.to_lowercase();
    match folded.as_str() {
        "string" => return Some(SchemaType::String),
        "number" => return Some(SchemaType::Number),
        "integer" | "int" => return Some(SchemaType::Integer),
        "boolean" | "bool" => return Some(SchemaType::Boolean),
        _ => {}
    }
    for prefix in ["array<", "list<"] {
        if folded.starts_with(prefix) && folded.ends_with('>') {
            let inner = &trimmed[prefix.len()..trimmed.len() - 1];
            return parse_config_type(inner).map(SchemaType::array);
        }
    }
    None
}

fn type_variable(ctx: &mut CheckContext, entry: &VariableEntry) {
    ctx.cache
        .variables
        .insert(entry.key.value.clone(), entry.value.id);
}

fn type_output(ctx: &mut CheckContext, entry: &PropertyEntry) {
    let ty = ctx.expr_type(&entry.value);
    ctx.cache.outputs.insert(entry.key.value.clone(), ty);
}

fn type_resource(ctx: &mut CheckContext, entry: &ResourceEntry) {
    let name = &entry.key.value;
    let decl = &entry.decl;
    let hint = match ctx.hints.resources.get(&decl.ty.value) {
        Some(Ok(hint)) => hint.clone(),
        Some(Err(message)) => {
            let message = message.clone();
            ctx.diags.push(Diagnostic::error(
                Some(decl.ty.range.clone()),
                format!("error resolving type of resource {}: {}", name, message),
                "",
            ));
            return;
        }
        None => return,
    };

    if let Some(PropertyMapOrExpr::Map(entries)) = &decl.properties {
        check_schema_properties(ctx, &hint.token, &hint.inputs, entries);
    }
    if let Some(get) = &decl.get {
        check_schema_properties(ctx, &hint.token, &hint.outputs, &get.state);
        if let Some(id) = &get.id {
            ctx.assert_assignable(&id.range, id, &SchemaType::String);
        }
    }

    ctx.cache
        .resources
        .insert(name.clone(), SchemaType::Resource(hint));
}

/// Checks a property map against a schema property list: unknown keys error
/// with the structural "cannot assign" detail, known keys check assignably.
fn check_schema_properties(
    ctx: &mut CheckContext,
    token: &str,
    schema_properties: &[Property],
    entries: &[PropertyEntry],
) {
    for entry in entries {
        let key = &entry.key.value;
        match schema_properties.iter().find(|p| p.name == *key) {
            Some(property) => {
                let ty = property.ty.clone();
                ctx.assert_assignable(&entry.key.range, &entry.value, &ty);
            }
            None => {
                let attempted = SchemaType::Object(ObjectType::anonymous(
                    entries
                        .iter()
                        .map(|e| Property::new(e.key.value.clone(), ctx.expr_type(&e.value)))
                        .collect(),
                ));
                let fmtr = ExistingFieldFormatter::new(
                    format!("'{}'", token),
                    schema_properties.iter().map(|p| p.name.clone()).collect(),
                )
                .properties();
                let (_, existing) = fmtr.message_with_detail(key);
                ctx.diags.push(Diagnostic::error(
                    Some(entry.key.range.clone()),
                    format!("Property {} does not exist on '{}'", key, token),
                    format!(
                        "Cannot assign '{}' to '{}':\n  {}",
                        attempted.display_type(),
                        token,
                        existing
                    ),
                ));
            }
        }
    }
}

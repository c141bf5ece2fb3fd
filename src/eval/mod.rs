//! Program evaluation.
//!
//! The evaluator walks the planned node order, materializes each node's
//! expressions into [`Value`]s, registers resources with the orchestrator,
//! and exports outputs. It is logically sequential: dependency order governs
//! when registration requests are issued, and the eventual-value records
//! carry everything continuations would need.

pub mod builtins;
pub mod value;

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use async_recursion::async_recursion;
use indexmap::IndexMap;
use tracing::{debug, instrument};

use crate::ast::{
    ConfigEntry, Expr, ExprKind, InterpolationPart, PropertyAccess, PropertyAccessor,
    PropertyEntry, PropertyMapOrExpr, ResourceEntry, ResourceOptionsDecl, TemplateDecl,
    VariableEntry,
};
use crate::diags::suggestion::ExistingFieldFormatter;
use crate::diags::{Diagnostic, Diagnostics};
use crate::eval::value::{collect_list, collect_object, EventualValue, PlainValue, Value};
use crate::orchestrator::{
    CustomTimeouts, Orchestrator, ReadRequest, RegisterRequest, ResourceOptions,
};
use crate::package::{self, PackageLoader};
use crate::runner::{self, NodeKind, BUILTIN_VAR_NAME};
use crate::schema::ResourceType;
use crate::syntax::SourceRange;
use crate::type_checker::parse_config_type;
use crate::schema::SchemaType;

/// A configuration value supplied by the host, keyed by logical name.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValue {
    pub value: PlainValue,
    pub secret: bool,
}

impl ConfigValue {
    pub fn plain(value: PlainValue) -> Self {
        Self {
            value,
            secret: false,
        }
    }

    pub fn secret(value: PlainValue) -> Self {
        Self {
            value,
            secret: true,
        }
    }
}

/// Host-supplied evaluation settings.
#[derive(Debug, Clone)]
pub struct EvalOptions {
    pub project: String,
    pub stack: String,
    /// Base directory for `fn::readFile` and the built-in `cwd`.
    pub working_directory: PathBuf,
    /// Permit `fn::readFile` outside the working directory.
    pub allow_external_paths: bool,
    /// Preview mode: resource outputs may be unknown.
    pub dry_run: bool,
    /// Supplied configuration values, keyed by logical name.
    pub config: IndexMap<String, ConfigValue>,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            project: "project".to_string(),
            stack: "stack".to_string(),
            working_directory: PathBuf::from("."),
            allow_external_paths: false,
            dry_run: false,
            config: IndexMap::new(),
        }
    }
}

/// A resource after registration (or external read).
#[derive(Debug, Clone)]
pub struct RegisteredResource {
    pub id: Value,
    pub urn: String,
    pub outputs: IndexMap<String, Value>,
    pub schema: ResourceType,
    pub poisoned: bool,
    /// The resource's state is wholly unresolved (a suppressed external
    /// read); every output access yields an unknown.
    pub outputs_unknown: bool,
}

/// Evaluates one template against an orchestrator.
pub struct Evaluator {
    template: TemplateDecl,
    pub(crate) loader: Arc<dyn PackageLoader>,
    pub(crate) orchestrator: Arc<dyn Orchestrator>,
    pub(crate) options: EvalOptions,
    pub(crate) diags: Diagnostics,
    config: IndexMap<String, Value>,
    variables: IndexMap<String, Value>,
    resources: IndexMap<String, RegisteredResource>,
    exports: IndexMap<String, Value>,
}

impl Evaluator {
    pub fn new(
        template: TemplateDecl,
        loader: Arc<dyn PackageLoader>,
        orchestrator: Arc<dyn Orchestrator>,
        options: EvalOptions,
    ) -> Self {
        Self {
            template,
            loader,
            orchestrator,
            options,
            diags: Diagnostics::new(),
            config: IndexMap::new(),
            variables: IndexMap::new(),
            resources: IndexMap::new(),
            exports: IndexMap::new(),
        }
    }

    pub fn config_value(&self, name: &str) -> Option<&Value> {
        self.config.get(name)
    }

    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    pub fn resource(&self, name: &str) -> Option<&RegisteredResource> {
        self.resources.get(name)
    }

    pub fn exports(&self) -> &IndexMap<String, Value> {
        &self.exports
    }

    /// Runs the whole program. Configuration evaluates first as a phase; an
    /// error there stops before anything reaches the orchestrator. After
    /// that, sibling nodes keep evaluating in diagnostic mode when one
    /// fails, but no further registrations, reads, invokes, or exports are
    /// issued.
    #[instrument(skip(self), fields(program = %self.template.name.as_ref().map(|n| n.value.as_str()).unwrap_or("")))]
    pub async fn evaluate(&mut self) -> Diagnostics {
        let mut plan_diags = Diagnostics::new();
        let plan = runner::plan(&self.template, &mut plan_diags);
        let has_plan_errors = plan_diags.has_errors();
        self.diags.extend(plan_diags);
        if has_plan_errors {
            return self.diags.clone();
        }

        for node in &plan.nodes {
            if node.kind != NodeKind::Config {
                continue;
            }
            let Some(entry) = self.template.config_entries().nth(node.index).cloned() else {
                continue;
            };
            self.eval_config(&entry).await;
        }
        if self.diags.has_errors() {
            return self.diags.clone();
        }

        for node in &plan.nodes {
            match node.kind {
                NodeKind::Config => {}
                NodeKind::Variable => {
                    let entry = self.template.variables[node.index].clone();
                    self.eval_variable(&entry).await;
                }
                NodeKind::Resource => {
                    let entry = self.template.resources[node.index].clone();
                    self.eval_resource(&entry).await;
                }
                NodeKind::Output => {
                    let entry = self.template.outputs[node.index].clone();
                    self.eval_output(&entry).await;
                }
            }
        }
        self.diags.clone()
    }

    fn error(&mut self, range: &SourceRange, summary: impl Into<String>, detail: impl Into<String>) {
        self.diags
            .push(Diagnostic::error(Some(range.clone()), summary, detail));
    }

    // ---- configuration ----

    async fn eval_config(&mut self, entry: &ConfigEntry) {
        let key = entry.key.value.clone();
        let param = &entry.param;

        if let Some(value_expr) = &param.value {
            let value_expr = value_expr.clone();
            let value = self.eval_expr(&value_expr).await;
            self.config.insert(key, value);
            return;
        }

        let declared = match &param.ty {
            Some(declared_expr) => match parse_config_type(&declared_expr.value) {
                Some(ty) => Some(ty),
                None => {
                    self.error(
                        &declared_expr.range,
                        format!("unexpected configuration type '{}'", declared_expr.value),
                        "",
                    );
                    self.config.insert(key, Value::Poison);
                    return;
                }
            },
            None => None,
        };

        if let (Some(declared), Some(default)) = (&declared, &param.default) {
            if let Err(found) = default_matches_type(default, declared) {
                self.error(
                    &entry.key.range,
                    format!(
                        "type mismatch: default value of type {} but type {} was specified",
                        found,
                        declared.display_type()
                    ),
                    "",
                );
                self.config.insert(key, Value::Poison);
                return;
            }
        }

        let logical = param
            .name
            .as_ref()
            .map(|n| n.value.clone())
            .unwrap_or_else(|| key.clone());
        if let Some(supplied) = self.options.config.get(&logical).cloned() {
            if supplied.secret {
                if let Some(secret) = &param.secret {
                    if !secret.value {
                        self.error(
                            &secret.range,
                            "Cannot mark a configuration value as not secret if the associated config value is secret",
                            "",
                        );
                        self.config.insert(key, Value::Poison);
                        return;
                    }
                }
            }
            if let Some(declared) = &declared {
                if !plain_matches_type(&supplied.value, declared) {
                    self.error(
                        &entry.key.range,
                        format!(
                            "type mismatch: value of type {} but type {} was specified",
                            supplied.value.type_description(),
                            declared.display_type()
                        ),
                        "",
                    );
                    self.config.insert(key, Value::Poison);
                    return;
                }
            }
            let mut value = Value::Plain(coerce_config_value(supplied.value, declared.as_ref()));
            if supplied.secret || param.secret.as_ref().is_some_and(|s| s.value) {
                value = value.into_secret();
            }
            self.config.insert(key, value);
            return;
        }

        if let Some(default) = &param.default {
            let default = default.clone();
            let mut value = self.eval_expr(&default).await;
            if param.secret.as_ref().is_some_and(|s| s.value) {
                value = value.into_secret();
            }
            self.config.insert(key, value);
            return;
        }

        let summary = if param.ty.is_none() {
            "unable to infer type: either 'default' or 'type' is required".to_string()
        } else {
            format!("missing required configuration variable '{}'", key)
        };
        self.error(&entry.key.range, summary, "");
        self.config.insert(key, Value::Poison);
    }

    // ---- variables and outputs ----

    async fn eval_variable(&mut self, entry: &VariableEntry) {
        let value = self.eval_expr(&entry.value).await;
        self.variables.insert(entry.key.value.clone(), value);
    }

    async fn eval_output(&mut self, entry: &PropertyEntry) {
        let value = self.eval_expr(&entry.value).await;
        if value.is_poison() || self.diags.has_errors() {
            return;
        }
        if let Err(err) = self
            .orchestrator
            .export(&entry.key.value, value.clone())
            .await
        {
            self.error(&entry.key.range, err.to_string(), "");
            return;
        }
        self.exports.insert(entry.key.value.clone(), value);
    }

    // ---- resources ----

    #[instrument(skip(self, entry), fields(resource = %entry.key.value))]
    async fn eval_resource(&mut self, entry: &ResourceEntry) {
        let key = entry.key.value.clone();
        let decl = &entry.decl;

        // Diagnostic mode: once the program has errored, later resources
        // still resolve their expressions but never reach the orchestrator.
        if self.diags.has_errors() {
            self.resources.insert(
                key,
                RegisteredResource {
                    id: Value::Poison,
                    urn: String::new(),
                    outputs: IndexMap::new(),
                    schema: ResourceType::new(decl.ty.value.clone()),
                    poisoned: true,
                    outputs_unknown: false,
                },
            );
            return;
        }

        let (package, canonical) =
            match package::resolve_resource(self.loader.as_ref(), &decl.ty.value).await {
                Ok(resolved) => resolved,
                Err(err) => {
                    self.error(
                        &decl.ty.range,
                        format!("error resolving type of resource {}: {}", key, err),
                        "",
                    );
                    return;
                }
            };
        let mut schema = package
            .resource_type_hint(&canonical)
            .unwrap_or_else(|| ResourceType::new(canonical.as_str()));
        schema.is_component = package.is_component(&canonical).unwrap_or(false);

        let registered_name = decl
            .name
            .as_ref()
            .map(|n| n.value.clone())
            .unwrap_or_else(|| key.clone());

        // Inputs.
        let mut inputs: IndexMap<String, Value> = IndexMap::new();
        let mut extra_deps: BTreeSet<String> = BTreeSet::new();
        let mut poisoned = false;
        match &decl.properties {
            Some(PropertyMapOrExpr::Map(entries)) => {
                for property in entries.clone() {
                    let value = self.eval_expr(&property.value).await;
                    poisoned |= value.is_poison();
                    inputs.insert(property.key.value.clone(), value);
                }
            }
            Some(PropertyMapOrExpr::Expr(expr)) => {
                let expr = (**expr).clone();
                let bag = self.eval_expr(&expr).await;
                match bag {
                    Value::Poison => poisoned = true,
                    Value::Plain(PlainValue::Object(map)) => {
                        for (name, plain) in map {
                            inputs.insert(name, Value::Plain(plain));
                        }
                    }
                    Value::Eventual(eventual) => match &eventual.value {
                        Some(PlainValue::Object(map)) => {
                            for (name, plain) in map.clone() {
                                inputs.insert(
                                    name,
                                    Value::Eventual(
                                        EventualValue {
                                            value: Some(plain),
                                            secret: eventual.secret,
                                            deps: eventual.deps.clone(),
                                        },
                                    ),
                                );
                            }
                        }
                        Some(other) => {
                            self.error(
                                &expr.range,
                                format!(
                                    "resource properties must be an object, found {}",
                                    other.type_description()
                                ),
                                "",
                            );
                            return;
                        }
                        None => {
                            // Unknown property bag: register with no known
                            // inputs but carry the dependencies.
                            extra_deps.extend(eventual.deps.iter().cloned());
                        }
                    },
                    Value::Plain(other) => {
                        self.error(
                            &expr.range,
                            format!(
                                "resource properties must be an object, found {}",
                                other.type_description()
                            ),
                            "",
                        );
                        return;
                    }
                }
            }
            None => {}
        }

        let get_id = match &decl.get {
            Some(get) => match &get.id {
                Some(id_expr) => {
                    let id_expr = id_expr.clone();
                    let id = self.eval_expr(&id_expr).await;
                    poisoned |= id.is_poison();
                    Some((id, id_expr.range))
                }
                None => {
                    self.error(
                        decl.get.as_ref().and_then(|g| g.range.as_ref()).unwrap_or(&decl.range),
                        format!("missing required field 'id' in get block of resource {}", key),
                        "",
                    );
                    return;
                }
            },
            None => None,
        };

        if poisoned {
            self.resources.insert(
                key,
                RegisteredResource {
                    id: Value::Poison,
                    urn: String::new(),
                    outputs: IndexMap::new(),
                    schema,
                    poisoned: true,
                    outputs_unknown: false,
                },
            );
            return;
        }

        // Provider-injected constants.
        for (name, constant) in package.resource_constants(&canonical) {
            inputs
                .entry(name)
                .or_insert_with(|| Value::Plain(json_to_plain(constant)));
        }

        // Dependencies: everything the inputs were derived from plus the
        // explicit option edges.
        let mut dependencies: BTreeSet<String> = inputs.values().flat_map(|v| v.deps()).collect();
        dependencies.extend(extra_deps);
        for expr in decl.options.expressions() {
            runner::collect_symbol_roots(expr, &mut |root, _| {
                if self.resources.contains_key(root) {
                    dependencies.insert(root.to_string());
                }
            });
        }

        // Secret outputs: schema hints unioned with the user option.
        let mut secret_outputs: Vec<String> = Vec::new();
        for property in &schema.outputs {
            if property.secret
                || package.is_resource_property_secret(&canonical, &property.name)
            {
                secret_outputs.push(property.name.clone());
            }
        }
        if let Some(extra) = &decl.options.additional_secret_outputs {
            for name in extra.values() {
                if !secret_outputs.contains(&name) {
                    secret_outputs.push(name);
                }
            }
        }

        let mut options = self.eval_resource_options(&decl.options);
        options.additional_secret_outputs = secret_outputs.clone();
        for alias in &schema.aliases {
            if !options.aliases.contains(alias) {
                options.aliases.push(alias.clone());
            }
        }

        // External read.
        if let Some((id_value, id_range)) = get_id {
            let state = match &decl.get {
                Some(get) => {
                    let mut state = IndexMap::new();
                    for property in get.state.clone() {
                        let value = self.eval_expr(&property.value).await;
                        state.insert(property.key.value.clone(), value);
                    }
                    state
                }
                None => IndexMap::new(),
            };
            match &id_value {
                Value::Eventual(eventual) if !eventual.is_known() => {
                    // The id only becomes known during apply: skip the read
                    // and satisfy consumers with unknowns typed by the schema.
                    let mut outputs = IndexMap::new();
                    for property in &schema.outputs {
                        outputs.insert(
                            property.name.clone(),
                            Value::Eventual(EventualValue::unknown().with_dep(&key)),
                        );
                    }
                    self.resources.insert(
                        key.clone(),
                        RegisteredResource {
                            id: Value::Eventual(EventualValue::unknown().with_dep(&key)),
                            urn: String::new(),
                            outputs,
                            schema,
                            poisoned: false,
                            outputs_unknown: true,
                        },
                    );
                    return;
                }
                _ => {}
            }
            let Some(PlainValue::String(id)) = id_value.as_plain() else {
                self.error(
                    &id_range,
                    format!(
                        "get.id must be a string, instead got {}",
                        id_value.type_description()
                    ),
                    "This indicates a bug in the template type checker",
                );
                return;
            };
            let request = ReadRequest {
                token: canonical.clone(),
                name: registered_name,
                id: id.clone(),
                state,
            };
            match self.orchestrator.read_resource(request).await {
                Ok(response) => {
                    let outputs =
                        self.wrap_outputs(&key, response.outputs, &secret_outputs);
                    self.resources.insert(
                        key.clone(),
                        RegisteredResource {
                            id: Value::Eventual(
                                EventualValue::known(PlainValue::String(id.clone()))
                                    .with_dep(&key),
                            ),
                            urn: response.urn,
                            outputs,
                            schema,
                            poisoned: false,
                            outputs_unknown: false,
                        },
                    );
                }
                Err(err) => {
                    self.error(&decl.range, err.to_string(), "");
                }
            }
            return;
        }

        // Registration.
        let request = RegisterRequest {
            token: canonical.clone(),
            name: registered_name,
            custom: !schema.is_component,
            inputs,
            options,
            dependencies,
        };
        match self.orchestrator.register_resource(request).await {
            Ok(response) => {
                let outputs = self.wrap_outputs(&key, response.outputs, &secret_outputs);
                let id = match response.id {
                    Some(id) => Value::Eventual(
                        EventualValue::known(PlainValue::String(id)).with_dep(&key),
                    ),
                    None => Value::Eventual(EventualValue::unknown().with_dep(&key)),
                };
                debug!(resource = %key, urn = %response.urn, "registered resource");
                self.resources.insert(
                    key.clone(),
                    RegisteredResource {
                        id,
                        urn: response.urn,
                        outputs,
                        schema,
                        poisoned: false,
                        outputs_unknown: false,
                    },
                );
            }
            Err(err) => {
                self.error(&decl.range, err.to_string(), "");
            }
        }
    }

    /// Wraps raw orchestrator outputs as eventuals depending on the
    /// resource, applying secret markers.
    fn wrap_outputs(
        &self,
        resource: &str,
        outputs: IndexMap<String, Value>,
        secret_outputs: &[String],
    ) -> IndexMap<String, Value> {
        outputs
            .into_iter()
            .map(|(name, value)| {
                let secret = secret_outputs.contains(&name);
                let wrapped = match value {
                    Value::Plain(plain) => Value::Eventual(
                        EventualValue::known(plain)
                            .with_dep(resource)
                            .with_secret(secret),
                    ),
                    Value::Eventual(eventual) => Value::Eventual(EventualValue {
                        secret: eventual.secret || secret,
                        ..eventual
                    }.with_dep(resource)),
                    Value::Poison => Value::Poison,
                };
                (name, wrapped)
            })
            .collect()
    }

    fn eval_resource_options(&mut self, decl: &ResourceOptionsDecl) -> ResourceOptions {
        let symbol_root = |expr: &Expr| -> Option<String> {
            match &expr.kind {
                ExprKind::Symbol(access) => access.root_name().map(str::to_string),
                ExprKind::String(s) => Some(s.clone()),
                _ => None,
            }
        };
        let bool_of = |expr: &Option<crate::ast::BoolExpr>| expr.as_ref().map(|b| b.value);

        let mut options = ResourceOptions {
            aliases: decl
                .aliases
                .as_ref()
                .map(|l| l.values())
                .unwrap_or_default(),
            custom_timeouts: decl.custom_timeouts.as_ref().map(|ct| CustomTimeouts {
                create: ct.create.as_ref().map(|s| s.value.clone()),
                update: ct.update.as_ref().map(|s| s.value.clone()),
                delete: ct.delete.as_ref().map(|s| s.value.clone()),
            }),
            delete_before_replace: bool_of(&decl.delete_before_replace),
            ignore_changes: decl
                .ignore_changes
                .as_ref()
                .map(|l| l.values())
                .unwrap_or_default(),
            import_id: decl.import.as_ref().map(|s| s.value.clone()),
            parent: decl.parent.as_ref().and_then(&symbol_root),
            protect: decl.protect.as_ref().and_then(|expr| match &expr.kind {
                ExprKind::Boolean(b) => Some(*b),
                _ => None,
            }),
            provider: decl.provider.as_ref().and_then(&symbol_root),
            providers: Vec::new(),
            version: decl.version.as_ref().map(|s| s.value.clone()),
            plugin_download_url: decl.plugin_download_url.as_ref().map(|s| s.value.clone()),
            replace_on_changes: decl
                .replace_on_changes
                .as_ref()
                .map(|l| l.values())
                .unwrap_or_default(),
            retain_on_delete: bool_of(&decl.retain_on_delete),
            deleted_with: decl.deleted_with.as_ref().and_then(&symbol_root),
            ..Default::default()
        };
        if let Some(providers) = &decl.providers {
            if let ExprKind::List(items) = &providers.kind {
                options.providers = items.iter().filter_map(&symbol_root).collect();
            } else if let Some(root) = symbol_root(providers) {
                options.providers.push(root);
            }
        }
        options
    }

    // ---- expressions ----

    #[async_recursion]
    pub(crate) async fn eval_expr(&mut self, expr: &Expr) -> Value {
        match &expr.kind {
            ExprKind::Null => Value::null(),
            ExprKind::Boolean(b) => Value::bool(*b),
            ExprKind::Number(n) => Value::number(*n),
            ExprKind::String(s) => Value::string(s.clone()),
            ExprKind::Interpolate(parts) => self.eval_interpolate(parts, &expr.range).await,
            ExprKind::Symbol(access) => self.eval_property_access(access, &expr.range),
            ExprKind::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval_expr(item).await);
                }
                collect_list(values)
            }
            ExprKind::Object(entries) => {
                let mut pairs = Vec::with_capacity(entries.len());
                for entry in entries {
                    let key = self.eval_expr(&entry.key).await;
                    let value = self.eval_expr(&entry.value).await;
                    pairs.push((key, value));
                }
                match collect_object(pairs) {
                    Ok(value) => value,
                    Err(failure) => {
                        self.error(&expr.range, failure.summary, failure.detail);
                        Value::Poison
                    }
                }
            }
            ExprKind::Builtin(builtin) => self.eval_builtin(builtin, &expr.range).await,
        }
    }

    async fn eval_interpolate(
        &mut self,
        parts: &[InterpolationPart],
        range: &SourceRange,
    ) -> Value {
        let mut inputs = Vec::new();
        for part in parts {
            inputs.push(Value::string(part.text.clone()));
            if let Some(access) = &part.access {
                inputs.push(self.eval_property_access(access, range));
            }
        }
        value::lift(inputs, |plains| {
            let mut joined = String::new();
            for plain in plains {
                joined.push_str(&plain.to_display_string());
            }
            Ok(PlainValue::String(joined))
        })
        .unwrap_or(Value::Poison)
    }

    /// Resolves a property access against the evaluated program state.
    pub(crate) fn eval_property_access(
        &mut self,
        access: &PropertyAccess,
        range: &SourceRange,
    ) -> Value {
        let Some(root) = access.root_name() else {
            self.error(range, "property access must start with a name", "");
            return Value::Poison;
        };
        let rest = &access.accessors[1..];

        if let Some(resource) = self.resources.get(root) {
            if resource.poisoned {
                return Value::Poison;
            }
            let resource = resource.clone();
            return self.walk_resource(&resource, root, rest, range);
        }
        if let Some(value) = self.variables.get(root) {
            let value = value.clone();
            return self.walk_value(value, root, rest, range);
        }
        if let Some(value) = self.config.get(root) {
            let value = value.clone();
            return self.walk_value(value, root, rest, range);
        }
        if root == BUILTIN_VAR_NAME {
            let mut context = IndexMap::new();
            context.insert(
                "cwd".to_string(),
                PlainValue::String(self.options.working_directory.display().to_string()),
            );
            context.insert(
                "project".to_string(),
                PlainValue::String(self.options.project.clone()),
            );
            context.insert(
                "stack".to_string(),
                PlainValue::String(self.options.stack.clone()),
            );
            return self.walk_value(Value::Plain(PlainValue::Object(context)), root, rest, range);
        }

        self.error(
            range,
            format!("resource, variable, or config value {:?} not found", root),
            "",
        );
        Value::Poison
    }

    fn walk_resource(
        &mut self,
        resource: &RegisteredResource,
        root: &str,
        accessors: &[PropertyAccessor],
        range: &SourceRange,
    ) -> Value {
        let Some((first, rest)) = accessors.split_first() else {
            // A bare resource reference coerces to its URN.
            return Value::Eventual(
                EventualValue::known(PlainValue::String(resource.urn.clone())).with_dep(root),
            );
        };
        let name = match first {
            PropertyAccessor::Name(name) | PropertyAccessor::StringSubscript(name) => name,
            PropertyAccessor::IntSubscript(_) => {
                self.error(
                    range,
                    format!("Cannot index via number into '{}' (a resource)", root),
                    "",
                );
                return Value::Poison;
            }
        };
        let value = match name.as_str() {
            "id" => resource.id.clone(),
            "urn" => Value::Eventual(
                EventualValue::known(PlainValue::String(resource.urn.clone())).with_dep(root),
            ),
            _ => match resource.outputs.get(name) {
                Some(value) => value.clone(),
                None => {
                    // During preview (or when the schema admits the property)
                    // a missing output is unknown, not an error.
                    let in_schema = resource.schema.output(name).is_some();
                    if self.options.dry_run
                        || resource.outputs_unknown
                        || in_schema
                        || resource.schema.outputs.is_empty()
                    {
                        Value::Eventual(EventualValue::unknown().with_dep(root))
                    } else {
                        let fmtr = ExistingFieldFormatter::new(
                            root.to_string(),
                            resource.outputs.keys().cloned().collect(),
                        )
                        .properties();
                        let (summary, detail) = fmtr.message_with_detail(name);
                        self.error(range, summary, detail);
                        return Value::Poison;
                    }
                }
            },
        };
        self.walk_value(value, &format!("{}.{}", root, name), rest, range)
    }

    fn walk_value(
        &mut self,
        mut value: Value,
        running_name: &str,
        accessors: &[PropertyAccessor],
        range: &SourceRange,
    ) -> Value {
        let mut running_name = running_name.to_string();
        for accessor in accessors {
            // Descend through eventuals, keeping their markers on the result.
            let (plain, secret, deps) = match value {
                Value::Poison => return Value::Poison,
                Value::Plain(plain) => (plain, false, BTreeSet::new()),
                Value::Eventual(eventual) => match eventual.value {
                    Some(plain) => (plain, eventual.secret, eventual.deps),
                    None => return Value::Eventual(eventual),
                },
            };
            let next = match (accessor, &plain) {
                (PropertyAccessor::Name(name), PlainValue::Object(map))
                | (PropertyAccessor::StringSubscript(name), PlainValue::Object(map)) => {
                    match map.get(name) {
                        Some(found) => {
                            let found = found.clone();
                            running_name = format!("{}.{}", running_name, name);
                            found
                        }
                        None => {
                            let fmtr = ExistingFieldFormatter::new(
                                running_name.clone(),
                                map.keys().cloned().collect(),
                            )
                            .properties();
                            let (summary, detail) = fmtr.message_with_detail(name);
                            self.error(range, summary, detail);
                            return Value::Poison;
                        }
                    }
                }
                (PropertyAccessor::IntSubscript(index), PlainValue::List(items)) => {
                    let length = items.len();
                    if *index < 0 || *index as usize >= length {
                        self.error(
                            range,
                            format!(
                                "index {} out of range for '{}' (a list of length {})",
                                index, running_name, length
                            ),
                            "",
                        );
                        return Value::Poison;
                    }
                    running_name = format!("{}[{}]", running_name, index);
                    items[*index as usize].clone()
                }
                (PropertyAccessor::IntSubscript(_), PlainValue::Object(_)) => {
                    self.error(
                        range,
                        format!(
                            "Cannot index via number into '{}' ({})",
                            running_name,
                            plain.type_description()
                        ),
                        "Index via number is only allowed on Arrays",
                    );
                    return Value::Poison;
                }
                (PropertyAccessor::StringSubscript(_), PlainValue::List(_))
                | (PropertyAccessor::Name(_), PlainValue::List(_)) => {
                    self.error(
                        range,
                        format!(
                            "Cannot index via string into '{}' ({})",
                            running_name,
                            plain.type_description()
                        ),
                        "Index via string is only allowed on Maps",
                    );
                    return Value::Poison;
                }
                (_, other) => {
                    self.error(
                        range,
                        format!(
                            "cannot access a property on '{}' ({})",
                            running_name,
                            other.type_description()
                        ),
                        "Property access is only allowed on Resources and Objects",
                    );
                    return Value::Poison;
                }
            };
            value = if deps.is_empty() && !secret {
                Value::Plain(next)
            } else {
                Value::Eventual(EventualValue {
                    value: Some(next),
                    secret,
                    deps,
                })
            };
        }
        value
    }
}

/// Checks a default literal against a declared configuration type, returning
/// the literal's type description on mismatch.
fn default_matches_type(expr: &Expr, declared: &SchemaType) -> Result<(), &'static str> {
    match (&expr.kind, declared.unwrap()) {
        (_, SchemaType::Any) => Ok(()),
        (ExprKind::Number(n), SchemaType::Integer) => {
            if n.fract() == 0.0 {
                Ok(())
            } else {
                Err("number")
            }
        }
        (ExprKind::Number(_), SchemaType::Number) => Ok(()),
        (ExprKind::Number(_), _) => Err("number"),
        (ExprKind::String(_), SchemaType::String) => Ok(()),
        (ExprKind::String(s), SchemaType::Integer) => {
            s.parse::<i64>().map(|_| ()).map_err(|_| "string")
        }
        (ExprKind::String(s), SchemaType::Number) => {
            s.parse::<f64>().map(|_| ()).map_err(|_| "string")
        }
        (ExprKind::String(_), _) => Err("string"),
        (ExprKind::Boolean(_), SchemaType::Boolean) => Ok(()),
        (ExprKind::Boolean(_), _) => Err("boolean"),
        (ExprKind::List(items), SchemaType::Array(element)) => {
            for item in items {
                default_matches_type(item, element).map_err(|_| "list")?;
            }
            Ok(())
        }
        (ExprKind::List(_), _) => Err("list"),
        // Non-literal defaults are checked at runtime.
        _ => Ok(()),
    }
}

/// Checks a supplied plain value against a declared configuration type.
fn plain_matches_type(value: &PlainValue, declared: &SchemaType) -> bool {
    match (value, declared.unwrap()) {
        (_, SchemaType::Any) => true,
        (PlainValue::Number(n), SchemaType::Integer) => n.fract() == 0.0,
        (PlainValue::Number(_), SchemaType::Number) => true,
        (PlainValue::String(s), SchemaType::Integer) => s.parse::<i64>().is_ok(),
        (PlainValue::String(s), SchemaType::Number) => s.parse::<f64>().is_ok(),
        (PlainValue::String(_), SchemaType::String) => true,
        (PlainValue::Bool(_), SchemaType::Boolean) => true,
        (PlainValue::String(s), SchemaType::Boolean) => s == "true" || s == "false",
        (PlainValue::List(items), SchemaType::Array(element)) => {
            items.iter().all(|item| plain_matches_type(item, element))
        }
        (PlainValue::Object(_), SchemaType::Map(_)) => true,
        _ => false,
    }
}

/// Converts a numeric-looking supplied string into the declared numeric
/// type, so consumers see the value the declaration promised.
fn coerce_config_value(value: PlainValue, declared: Option<&SchemaType>) -> PlainValue {
    match (value, declared.map(SchemaType::unwrap)) {
        (PlainValue::String(s), Some(SchemaType::Integer))
        | (PlainValue::String(s), Some(SchemaType::Number)) => match s.parse::<f64>() {
            Ok(n) => PlainValue::Number(n),
            Err(_) => PlainValue::String(s),
        },
        (PlainValue::String(s), Some(SchemaType::Boolean)) => match s.as_str() {
            "true" => PlainValue::Bool(true),
            "false" => PlainValue::Bool(false),
            _ => PlainValue::String(s),
        },
        (value, _) => value,
    }
}

pub(crate) fn json_to_plain(value: serde_json::Value) -> PlainValue {
    match value {
        serde_json::Value::Null => PlainValue::Null,
        serde_json::Value::Bool(b) => PlainValue::Bool(b),
        serde_json::Value::Number(n) => PlainValue::Number(n.as_f64().unwrap_or_default()),
        serde_json::Value::String(s) => PlainValue::String(s),
        serde_json::Value::Array(items) => {
            PlainValue::List(items.into_iter().map(json_to_plain).collect())
        }
        serde_json::Value::Object(map) => PlainValue::Object(
            map.into_iter()
                .map(|(k, v)| (k, json_to_plain(v)))
                .collect(),
        ),
    }
}

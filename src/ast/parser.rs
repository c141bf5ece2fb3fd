//! Folds the document tree into the typed template model.
//!
//! Each record decl is driven by a static field table: recognized fields are
//! matched case-insensitively, non-canonical casing warns, and unknown fields
//! warn with a suggestion drawn from the closest valid name. Parsing is
//! recoverable: a decl that fails still leaves its siblings intact.

use tracing::debug;

use crate::ast::expr::*;
use crate::ast::interpolate::{self, RawPart};
use crate::ast::*;
use crate::diags::suggestion::{closest, ExistingFieldFormatter};
use crate::diags::{Diagnostic, Diagnostics};
use crate::syntax::loader::load_document;
use crate::syntax::{Node, NodeValue, ObjectEntry, SourcePos, SourceRange};

/// Loads and parses a template from YAML or JSON text. Returns `None` when
/// the document failed to produce a usable template.
pub fn load_template(filename: &str, source: &str) -> (Option<TemplateDecl>, Diagnostics) {
    let (node, mut diags) = load_document(filename, source);
    let Some(node) = node else {
        return (None, diags);
    };
    let (template, parse_diags) = parse_template(&node);
    diags.extend(parse_diags);
    if diags.has_errors() {
        return (None, diags);
    }
    (Some(template), diags)
}

/// Parses a template from an already-loaded document node.
pub fn parse_template(node: &Node) -> (TemplateDecl, Diagnostics) {
    let mut parser = TemplateParser::new();
    let template = parser.parse_template(node);
    debug!(
        resources = template.resources.len(),
        variables = template.variables.len(),
        errors = parser.diags.has_errors(),
        "parsed template"
    );
    (template, parser.diags)
}

const TEMPLATE_FIELDS: &[&str] = &[
    "name",
    "namespace",
    "description",
    "configuration",
    "config",
    "variables",
    "resources",
    "outputs",
    "sdks",
    "components",
    "runtime",
];

const CONFIG_PARAM_FIELDS: &[&str] = &["type", "name", "secret", "default", "value", "items"];

const RESOURCE_FIELDS: &[&str] = &[
    "type",
    "name",
    "defaultProvider",
    "properties",
    "options",
    "get",
];

const RESOURCE_OPTION_FIELDS: &[&str] = &[
    "additionalSecretOutputs",
    "aliases",
    "customTimeouts",
    "deleteBeforeReplace",
    "dependsOn",
    "ignoreChanges",
    "import",
    "parent",
    "protect",
    "provider",
    "providers",
    "version",
    "pluginDownloadURL",
    "replaceOnChanges",
    "retainOnDelete",
    "deletedWith",
];

const CUSTOM_TIMEOUT_FIELDS: &[&str] = &["create", "update", "delete"];

const GET_FIELDS: &[&str] = &["id", "state"];

const INVOKE_FIELDS: &[&str] = &["function", "arguments", "return", "options"];

const INVOKE_OPTION_FIELDS: &[&str] =
    &["dependsOn", "parent", "provider", "version", "pluginDownloadURL"];

const COMPONENT_FIELDS: &[&str] = &[
    "name",
    "description",
    "inputs",
    "variables",
    "resources",
    "outputs",
];

struct TemplateParser {
    next_id: ExprId,
    diags: Diagnostics,
}

impl TemplateParser {
    fn new() -> Self {
        // Id 0 is reserved for checker-seeded types.
        Self {
            next_id: 1,
            diags: Diagnostics::new(),
        }
    }

    fn fresh_id(&mut self) -> ExprId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn error(&mut self, range: &SourceRange, summary: impl Into<String>, detail: impl Into<String>) {
        self.diags
            .push(Diagnostic::error(Some(range.clone()), summary, detail));
    }

    fn warning(
        &mut self,
        range: &SourceRange,
        summary: impl Into<String>,
        detail: impl Into<String>,
    ) {
        self.diags
            .push(Diagnostic::warning(Some(range.clone()), summary, detail));
    }

    /// Matches one object key against a field table. Returns the canonical
    /// field name on a hit; warns on casing drift and on unknown fields.
    fn match_field(
        &mut self,
        object_name: &str,
        fields: &'static [&'static str],
        key: &Node,
    ) -> Option<&'static str> {
        let raw = key.as_str()?;
        for field in fields {
            if field.eq_ignore_ascii_case(raw) {
                if *field != raw {
                    self.warning(
                        &key.range,
                        format!("unexpected casing: '{}'", raw),
                        format!("did you mean '{}'?", field),
                    );
                }
                return Some(field);
            }
        }
        let fmtr = ExistingFieldFormatter::new(
            format!("Object '{}'", object_name),
            fields.iter().map(|f| format!("'{}'", f)).collect(),
        );
        let (summary, mut detail) = fmtr.message_with_detail(&format!("Field '{}'", raw));
        if let Some(candidate) = closest(raw, fields.iter().copied()) {
            detail = format!("did you mean '{}'? {}", candidate, detail);
        }
        self.warning(&key.range, summary, detail);
        None
    }

    fn expect_object<'n>(&mut self, name: &str, node: &'n Node) -> Option<&'n [ObjectEntry]> {
        match node.as_object() {
            Some(entries) => Some(entries),
            None => {
                self.error(&node.range, format!("{} must be an object", name), "");
                None
            }
        }
    }

    fn expect_list<'n>(&mut self, name: &str, node: &'n Node) -> Option<&'n [Node]> {
        match node.as_list() {
            Some(items) => Some(items),
            None => {
                self.error(&node.range, format!("{} must be a list", name), "");
                None
            }
        }
    }

    fn string_field(&mut self, name: &str, node: &Node) -> Option<StringExpr> {
        match &node.value {
            NodeValue::String(s) => Some(StringExpr {
                value: s.clone(),
                range: node.range.clone(),
            }),
            _ => {
                self.error(&node.range, format!("{} must be a string", name), "");
                None
            }
        }
    }

    fn bool_field(&mut self, name: &str, node: &Node) -> Option<BoolExpr> {
        match &node.value {
            NodeValue::Bool(b) => Some(BoolExpr {
                value: *b,
                range: node.range.clone(),
            }),
            _ => {
                self.error(&node.range, format!("{} must be a boolean value", name), "");
                None
            }
        }
    }

    fn string_list(&mut self, name: &str, node: &Node) -> Option<StringListDecl> {
        let items = self.expect_list(name, node)?;
        let mut elements = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            if let Some(s) = self.string_field(&format!("{}[{}]", name, i), item) {
                elements.push(s);
            }
        }
        Some(StringListDecl {
            range: Some(node.range.clone()),
            elements,
        })
    }

    fn key_expr(&mut self, key: &Node) -> StringExpr {
        StringExpr {
            value: key.as_str().unwrap_or_default().to_string(),
            range: key.range.clone(),
        }
    }

    fn parse_template(&mut self, node: &Node) -> TemplateDecl {
        let mut template = TemplateDecl {
            range: Some(node.range.clone()),
            ..Default::default()
        };
        let Some(entries) = self.expect_object("template", node) else {
            return template;
        };
        for entry in entries {
            let Some(field) = self.match_field("template", TEMPLATE_FIELDS, &entry.key) else {
                continue;
            };
            match field {
                "name" => template.name = self.string_field("name", &entry.value),
                "namespace" => template.namespace = self.string_field("namespace", &entry.value),
                "description" => {
                    template.description = self.string_field("description", &entry.value)
                }
                "configuration" => {
                    template.configuration = self.parse_config_map("configuration", &entry.value)
                }
                "config" => template.config = self.parse_config_map("config", &entry.value),
                "variables" => template.variables = self.parse_variables(&entry.value),
                "resources" => template.resources = self.parse_resources(&entry.value),
                "outputs" => template.outputs = self.parse_property_map("outputs", &entry.value),
                "sdks" => template.sdks = self.parse_sdks(&entry.value),
                "components" => template.components = self.parse_components(&entry.value),
                // The runtime block is host configuration, not program text.
                "runtime" => {}
                _ => unreachable!(),
            }
        }
        template
    }

    fn parse_config_map(&mut self, name: &str, node: &Node) -> Vec<ConfigEntry> {
        let Some(entries) = self.expect_object(name, node) else {
            return Vec::new();
        };
        let mut out = Vec::with_capacity(entries.len());
        for entry in entries {
            let key = self.key_expr(&entry.key);
            let param = if entry.value.as_object().is_some() {
                self.parse_config_param(&format!("{}.{}", name, key.value), &entry.value)
            } else {
                // Bare-value shorthand.
                ConfigParamDecl {
                    range: Some(entry.value.range.clone()),
                    value: Some(self.parse_expr(&entry.value)),
                    ..Default::default()
                }
            };
            out.push(ConfigEntry { key, param });
        }
        out
    }

    fn parse_config_param(&mut self, name: &str, node: &Node) -> ConfigParamDecl {
        let mut param = ConfigParamDecl {
            range: Some(node.range.clone()),
            ..Default::default()
        };
        let Some(entries) = self.expect_object(name, node) else {
            return param;
        };
        for entry in entries {
            let Some(field) = self.match_field(name, CONFIG_PARAM_FIELDS, &entry.key) else {
                continue;
            };
            match field {
                "type" => param.ty = self.string_field("type", &entry.value),
                "name" => param.name = self.string_field("name", &entry.value),
                "secret" => param.secret = self.bool_field("secret", &entry.value),
                "default" => param.default = Some(self.parse_expr(&entry.value)),
                "value" => param.value = Some(self.parse_expr(&entry.value)),
                "items" => {
                    param.items = Some(Box::new(
                        self.parse_config_param(&format!("{}.items", name), &entry.value),
                    ))
                }
                _ => unreachable!(),
            }
        }
        param
    }

    fn parse_variables(&mut self, node: &Node) -> Vec<VariableEntry> {
        let Some(entries) = self.expect_object("variables", node) else {
            return Vec::new();
        };
        entries
            .iter()
            .map(|entry| VariableEntry {
                key: self.key_expr(&entry.key),
                value: self.parse_expr(&entry.value),
            })
            .collect()
    }

    fn parse_property_map(&mut self, name: &str, node: &Node) -> Vec<PropertyEntry> {
        let Some(entries) = self.expect_object(name, node) else {
            return Vec::new();
        };
        entries
            .iter()
            .map(|entry| PropertyEntry {
                key: self.key_expr(&entry.key),
                value: self.parse_expr(&entry.value),
            })
            .collect()
    }

    fn parse_resources(&mut self, node: &Node) -> Vec<ResourceEntry> {
        let Some(entries) = self.expect_object("resources", node) else {
            return Vec::new();
        };
        let mut out = Vec::with_capacity(entries.len());
        for entry in entries {
            let key = self.key_expr(&entry.key);
            if let Some(decl) = self.parse_resource(&key, &entry.value) {
                out.push(ResourceEntry { key, decl });
            }
        }
        out
    }

    fn parse_resource(&mut self, key: &StringExpr, node: &Node) -> Option<ResourceDecl> {
        let name = format!("resources.{}", key.value);
        let entries = self.expect_object(&name, node)?;

        let mut ty = None;
        let mut logical_name = None;
        let mut default_provider = None;
        let mut properties = None;
        let mut options = ResourceOptionsDecl::default();
        let mut get = None;

        for entry in entries {
            let Some(field) = self.match_field(&name, RESOURCE_FIELDS, &entry.key) else {
                continue;
            };
            match field {
                "type" => ty = self.string_field("type", &entry.value),
                "name" => logical_name = self.string_field("name", &entry.value),
                "defaultProvider" => {
                    default_provider = self.bool_field("defaultProvider", &entry.value)
                }
                "properties" => properties = Some(self.parse_property_map_or_expr(&entry.value)),
                "options" => options = self.parse_resource_options(&entry.value),
                "get" => get = Some(self.parse_get(&entry.value)),
                _ => unreachable!(),
            }
        }

        let Some(ty) = ty else {
            self.error(
                &node.range,
                format!("Required field 'type' is missing on resource \"{}\"", key.value),
                "",
            );
            return None;
        };

        if properties.is_some() && get.is_some() {
            self.error(
                &key.range,
                "Resource fields properties and get are mutually exclusive",
                "Properties is used to describe a resource managed by this program.\n\
                 Get is used to read a resource managed outside of this program.",
            );
        }

        Some(ResourceDecl {
            range: node.range.clone(),
            ty,
            name: logical_name,
            default_provider,
            properties,
            options,
            get,
        })
    }

    fn parse_property_map_or_expr(&mut self, node: &Node) -> PropertyMapOrExpr {
        if node.as_object().is_some() {
            PropertyMapOrExpr::Map(self.parse_property_map("properties", node))
        } else {
            PropertyMapOrExpr::Expr(Box::new(self.parse_expr(node)))
        }
    }

    fn parse_resource_options(&mut self, node: &Node) -> ResourceOptionsDecl {
        let mut options = ResourceOptionsDecl {
            range: Some(node.range.clone()),
            ..Default::default()
        };
        let Some(entries) = self.expect_object("options", node) else {
            return options;
        };
        for entry in entries {
            let Some(field) = self.match_field("resource options", RESOURCE_OPTION_FIELDS, &entry.key)
            else {
                continue;
            };
            let value = &entry.value;
            match field {
                "additionalSecretOutputs" => {
                    options.additional_secret_outputs =
                        self.string_list("additionalSecretOutputs", value)
                }
                "aliases" => options.aliases = self.string_list("aliases", value),
                "customTimeouts" => {
                    options.custom_timeouts = Some(self.parse_custom_timeouts(value))
                }
                "deleteBeforeReplace" => {
                    options.delete_before_replace = self.bool_field("deleteBeforeReplace", value)
                }
                "dependsOn" => options.depends_on = Some(self.parse_expr(value)),
                "ignoreChanges" => options.ignore_changes = self.string_list("ignoreChanges", value),
                "import" => options.import = self.string_field("import", value),
                "parent" => options.parent = Some(self.parse_expr(value)),
                "protect" => options.protect = Some(self.parse_expr(value)),
                "provider" => options.provider = Some(self.parse_expr(value)),
                "providers" => options.providers = Some(self.parse_expr(value)),
                "version" => options.version = self.string_field("version", value),
                "pluginDownloadURL" => {
                    options.plugin_download_url = self.string_field("pluginDownloadURL", value)
                }
                "replaceOnChanges" => {
                    options.replace_on_changes = self.string_list("replaceOnChanges", value)
                }
                "retainOnDelete" => {
                    options.retain_on_delete = self.bool_field("retainOnDelete", value)
                }
                "deletedWith" => options.deleted_with = Some(self.parse_expr(value)),
                _ => unreachable!(),
            }
        }
        options
    }

    fn parse_custom_timeouts(&mut self, node: &Node) -> CustomTimeoutsDecl {
        let mut timeouts = CustomTimeoutsDecl {
            range: Some(node.range.clone()),
            ..Default::default()
        };
        let Some(entries) = self.expect_object("customTimeouts", node) else {
            return timeouts;
        };
        for entry in entries {
            let Some(field) = self.match_field("customTimeouts", CUSTOM_TIMEOUT_FIELDS, &entry.key)
            else {
                continue;
            };
            match field {
                "create" => timeouts.create = self.string_field("create", &entry.value),
                "update" => timeouts.update = self.string_field("update", &entry.value),
                "delete" => timeouts.delete = self.string_field("delete", &entry.value),
                _ => unreachable!(),
            }
        }
        timeouts
    }

    fn parse_get(&mut self, node: &Node) -> GetResourceDecl {
        let mut get = GetResourceDecl {
            range: Some(node.range.clone()),
            ..Default::default()
        };
        let Some(entries) = self.expect_object("get", node) else {
            return get;
        };
        for entry in entries {
            let Some(field) = self.match_field("get", GET_FIELDS, &entry.key) else {
                continue;
            };
            match field {
                "id" => get.id = Some(self.parse_expr(&entry.value)),
                "state" => get.state = self.parse_property_map("state", &entry.value),
                _ => unreachable!(),
            }
        }
        get
    }

    fn parse_sdks(&mut self, node: &Node) -> Vec<PackageDescriptor> {
        let Some(items) = self.expect_list("sdks", node) else {
            return Vec::new();
        };
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            match &item.value {
                NodeValue::String(name) => out.push(PackageDescriptor::new(name.clone())),
                NodeValue::Object(entries) => {
                    let mut descriptor = PackageDescriptor::new("");
                    for entry in entries {
                        match entry.key.as_str() {
                            Some("name") => {
                                if let Some(s) = self.string_field("name", &entry.value) {
                                    descriptor.name = s.value;
                                }
                            }
                            Some("version") => {
                                descriptor.version =
                                    self.string_field("version", &entry.value).map(|s| s.value)
                            }
                            _ => self.warning(
                                &entry.key.range,
                                "sdk entries accept only 'name' and 'version'",
                                "",
                            ),
                        }
                    }
                    if descriptor.name.is_empty() {
                        self.error(&item.range, "sdk entries must name a package", "");
                    } else {
                        out.push(descriptor);
                    }
                }
                _ => self.error(&item.range, "sdks entries must be objects or strings", ""),
            }
        }
        out
    }

    fn parse_components(&mut self, node: &Node) -> Vec<ComponentEntry> {
        let Some(entries) = self.expect_object("components", node) else {
            return Vec::new();
        };
        let mut out = Vec::with_capacity(entries.len());
        for entry in entries {
            let key = self.key_expr(&entry.key);
            let name = format!("components.{}", key.value);
            let Some(fields) = self.expect_object(&name, &entry.value) else {
                continue;
            };
            let mut decl = ComponentDecl {
                range: Some(entry.value.range.clone()),
                name: Some(key.clone()),
                ..Default::default()
            };
            for field_entry in fields {
                let Some(field) = self.match_field(&name, COMPONENT_FIELDS, &field_entry.key)
                else {
                    continue;
                };
                match field {
                    "name" => decl.name = self.string_field("name", &field_entry.value),
                    "description" => {
                        decl.description = self.string_field("description", &field_entry.value)
                    }
                    "inputs" => {
                        decl.inputs =
                            self.parse_config_map(&format!("{}.inputs", name), &field_entry.value)
                    }
                    "variables" => decl.variables = self.parse_variables(&field_entry.value),
                    "resources" => decl.resources = self.parse_resources(&field_entry.value),
                    "outputs" => {
                        decl.outputs = self.parse_property_map("outputs", &field_entry.value)
                    }
                    _ => unreachable!(),
                }
            }
            out.push(ComponentEntry { key, decl });
        }
        out
    }

    // ---- expressions ----

    fn parse_expr(&mut self, node: &Node) -> Expr {
        let id = self.fresh_id();
        let range = node.range.clone();
        let kind = match &node.value {
            NodeValue::Null => ExprKind::Null,
            NodeValue::Bool(b) => ExprKind::Boolean(*b),
            NodeValue::Number(n) => ExprKind::Number(*n),
            NodeValue::String(s) => self.parse_string_expr(s, &range),
            NodeValue::List(items) => {
                ExprKind::List(items.iter().map(|item| self.parse_expr(item)).collect())
            }
            NodeValue::Object(entries) => {
                if let [entry] = entries.as_slice() {
                    if let Some(name) = entry.key.as_str() {
                        if let Some(builtin) = name.strip_prefix("fn::") {
                            return Expr {
                                id,
                                range: range.clone(),
                                kind: self.parse_builtin(builtin, entry),
                            };
                        }
                    }
                }
                ExprKind::Object(
                    entries
                        .iter()
                        .map(|entry| ObjectProperty {
                            key: self.parse_expr(&entry.key),
                            value: self.parse_expr(&entry.value),
                        })
                        .collect(),
                )
            }
        };
        Expr { id, range, kind }
    }

    fn parse_string_expr(&mut self, source: &str, range: &SourceRange) -> ExprKind {
        let parts = match interpolate::parse_parts(source) {
            Ok(parts) => parts,
            Err(err) => {
                let mut at = range.clone();
                at.start = SourcePos::new(at.start.line, at.start.col + err.offset);
                self.error(&at, err.message, "");
                return ExprKind::String(source.to_string());
            }
        };
        match parts.as_slice() {
            [RawPart { text, access: None }] => ExprKind::String(text.clone()),
            [RawPart {
                text,
                access: Some(access),
            }] if text.is_empty() => ExprKind::Symbol(access.clone()),
            _ => ExprKind::Interpolate(
                parts
                    .into_iter()
                    .map(|part| InterpolationPart {
                        text: part.text,
                        access: part.access,
                    })
                    .collect(),
            ),
        }
    }

    fn parse_builtin(&mut self, name: &str, entry: &ObjectEntry) -> ExprKind {
        let arg = &entry.value;
        let builtin = match name {
            "join" => self.parse_binary_builtin("fn::join", arg, |a, b| BuiltinExpr::Join {
                delimiter: a,
                values: b,
            }),
            "split" => self.parse_binary_builtin("fn::split", arg, |a, b| BuiltinExpr::Split {
                delimiter: a,
                source: b,
            }),
            "select" => self.parse_binary_builtin("fn::select", arg, |a, b| BuiltinExpr::Select {
                index: a,
                values: b,
            }),
            "toJSON" => Some(BuiltinExpr::ToJson {
                value: self.parse_expr(arg),
            }),
            "toBase64" => Some(BuiltinExpr::ToBase64 {
                value: self.parse_expr(arg),
            }),
            "fromBase64" => Some(BuiltinExpr::FromBase64 {
                value: self.parse_expr(arg),
            }),
            "secret" => Some(BuiltinExpr::Secret {
                value: self.parse_expr(arg),
            }),
            "readFile" => Some(BuiltinExpr::ReadFile {
                path: self.parse_expr(arg),
            }),
            "invoke" => self.parse_invoke(arg),
            "stringAsset" => Some(BuiltinExpr::StringAsset {
                text: self.parse_expr(arg),
            }),
            "fileAsset" => Some(BuiltinExpr::FileAsset {
                path: self.parse_expr(arg),
            }),
            "remoteAsset" => Some(BuiltinExpr::RemoteAsset {
                uri: self.parse_expr(arg),
            }),
            "assetArchive" => Some(BuiltinExpr::AssetArchive {
                entries: self.parse_expr(arg),
            }),
            "fileArchive" => Some(BuiltinExpr::FileArchive {
                path: self.parse_expr(arg),
            }),
            "remoteArchive" => Some(BuiltinExpr::RemoteArchive {
                uri: self.parse_expr(arg),
            }),
            other => {
                self.error(
                    &entry.key.range,
                    format!("unrecognized builtin function 'fn::{}'", other),
                    "",
                );
                None
            }
        };
        match builtin {
            Some(builtin) => ExprKind::Builtin(Box::new(builtin)),
            None => {
                // Recover with the raw argument so downstream walks still
                // see a node here.
                ExprKind::Object(vec![ObjectProperty {
                    key: self.parse_expr(&entry.key),
                    value: self.parse_expr(arg),
                }])
            }
        }
    }

    fn parse_binary_builtin(
        &mut self,
        name: &str,
        node: &Node,
        build: impl FnOnce(Expr, Expr) -> BuiltinExpr,
    ) -> Option<BuiltinExpr> {
        let Some(items) = node.as_list() else {
            self.error(
                &node.range,
                format!("{} must be a two-element list", name),
                "",
            );
            return None;
        };
        if items.len() != 2 {
            self.error(
                &node.range,
                format!("{} must be a two-element list", name),
                format!("found {} elements", items.len()),
            );
            return None;
        }
        let first = self.parse_expr(&items[0]);
        let second = self.parse_expr(&items[1]);
        Some(build(first, second))
    }

    fn parse_invoke(&mut self, node: &Node) -> Option<BuiltinExpr> {
        let entries = self.expect_object("fn::invoke", node)?;
        let mut token = None;
        let mut args = None;
        let mut ret = None;
        let mut options = InvokeOptionsDecl::default();
        for entry in entries {
            let Some(field) = self.match_field("fn::invoke", INVOKE_FIELDS, &entry.key) else {
                continue;
            };
            match field {
                "function" => token = Some(self.parse_expr(&entry.value)),
                "arguments" => args = Some(self.parse_expr(&entry.value)),
                "return" => ret = Some(self.parse_expr(&entry.value)),
                "options" => options = self.parse_invoke_options(&entry.value),
                _ => unreachable!(),
            }
        }
        let Some(token) = token else {
            self.error(&node.range, "fn::invoke requires a 'function' field", "");
            return None;
        };
        Some(BuiltinExpr::Invoke {
            token,
            args,
            ret,
            options,
        })
    }

    fn parse_invoke_options(&mut self, node: &Node) -> InvokeOptionsDecl {
        let mut options = InvokeOptionsDecl::default();
        let Some(entries) = self.expect_object("fn::invoke options", node) else {
            return options;
        };
        for entry in entries {
            let Some(field) =
                self.match_field("fn::invoke options", INVOKE_OPTION_FIELDS, &entry.key)
            else {
                continue;
            };
            match field {
                "dependsOn" => options.depends_on = Some(self.parse_expr(&entry.value)),
                "parent" => options.parent = Some(self.parse_expr(&entry.value)),
                "provider" => options.provider = Some(self.parse_expr(&entry.value)),
                "version" => options.version = self.string_field("version", &entry.value),
                "pluginDownloadURL" => {
                    options.plugin_download_url =
                        self.string_field("pluginDownloadURL", &entry.value)
                }
                _ => unreachable!(),
            }
        }
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> (TemplateDecl, Diagnostics) {
        let (node, diags) = load_document("<stdin>", text);
        assert!(!diags.has_errors(), "loader failed: {}", diags);
        parse_template(&node.unwrap())
    }

    #[test]
    fn parses_the_basic_shape() {
        let (template, diags) = parse(
            "name: test-program\n\
             runtime: yaml\n\
             resources:\n  res-a:\n    type: test:resource:type\n    properties:\n      foo: oof\n\
             outputs:\n  foo: ${res-a.foo}\n",
        );
        assert!(!diags.has_errors(), "{}", diags);
        assert_eq!(template.name.as_ref().unwrap().value, "test-program");
        assert_eq!(template.resources.len(), 1);
        let resource = &template.resources[0];
        assert_eq!(resource.decl.ty.value, "test:resource:type");
        assert!(matches!(
            template.outputs[0].value.kind,
            ExprKind::Symbol(_)
        ));
    }

    #[test]
    fn resource_that_is_not_an_object_errors() {
        let (_, diags) = parse("name: t\nresources: {badResource}\n");
        assert!(diags.has_errors());
        let rendered = diags.to_string();
        assert!(
            rendered.contains("resources.badResource must be an object"),
            "{}",
            rendered
        );
    }

    #[test]
    fn missing_resource_type_errors() {
        let (_, diags) = parse("name: t\nresources:\n  my-resource:\n    foo: bar\n");
        assert!(diags.has_errors());
        assert!(diags
            .to_string()
            .contains("Required field 'type' is missing on resource \"my-resource\""));
    }

    #[test]
    fn properties_and_get_are_mutually_exclusive() {
        let (_, diags) = parse(
            "name: t\nresources:\n  bucket:\n    type: test:read:Resource\n    properties:\n      foo: bar\n    get:\n      state:\n        fizz: buzz\n",
        );
        assert!(diags.has_errors());
        assert!(diags
            .to_string()
            .contains("Resource fields properties and get are mutually exclusive"));
    }

    #[test]
    fn unknown_fields_warn_with_suggestion() {
        let (_, diags) = parse(
            "name: t\nresources:\n  r:\n    type: test:resource:type\n    options:\n      dependson: []\n",
        );
        assert!(!diags.has_errors());
        let rendered = diags.to_string();
        assert!(rendered.contains("unexpected casing: 'dependson'"), "{}", rendered);
        assert!(rendered.contains("did you mean 'dependsOn'?"), "{}", rendered);
    }

    #[test]
    fn unknown_field_gets_fuzzy_match() {
        let (_, diags) = parse(
            "name: t\nresources:\n  r:\n    type: test:resource:type\n    propertees:\n      foo: 1\n",
        );
        let rendered = diags.to_string();
        assert!(
            rendered.contains("did you mean 'properties'?"),
            "{}",
            rendered
        );
    }

    #[test]
    fn empty_interpolation_is_an_error() {
        let (_, diags) = parse("name: test-empty\nvariables:\n  empty: ${}\n");
        assert!(diags.has_errors());
        assert!(diags
            .to_string()
            .contains("Property access expressions cannot be empty"));
    }

    #[test]
    fn builtin_objects_parse() {
        let (template, diags) = parse(
            "name: t\nvariables:\n  joined:\n    fn::join:\n      - '-'\n      - [a, b]\n",
        );
        assert!(!diags.has_errors(), "{}", diags);
        let ExprKind::Builtin(b) = &template.variables[0].value.kind else {
            panic!("expected builtin");
        };
        assert!(matches!(**b, BuiltinExpr::Join { .. }));
    }

    #[test]
    fn invoke_parses_function_arguments_and_return() {
        let (template, diags) = parse(
            "name: t\nvariables:\n  vpcId:\n    fn::invoke:\n      function: test:fn\n      arguments:\n        yesArg: true\n      return: outString\n",
        );
        assert!(!diags.has_errors(), "{}", diags);
        let ExprKind::Builtin(b) = &template.variables[0].value.kind else {
            panic!("expected builtin");
        };
        let BuiltinExpr::Invoke { token, args, ret, .. } = &**b else {
            panic!("expected invoke");
        };
        assert_eq!(token.as_string_literal(), Some("test:fn"));
        assert!(args.is_some());
        assert_eq!(ret.as_ref().unwrap().as_string_literal(), Some("outString"));
    }

    #[test]
    fn config_shorthand_binds_bare_values() {
        let (template, diags) = parse("name: t\nconfig:\n  region: us-west-2\n  sizes: {}\n");
        assert!(!diags.has_errors(), "{}", diags);
        assert!(template.config[0].param.value.is_some());
        assert!(template.config[1].param.value.is_none());
    }

    #[test]
    fn sdks_accept_strings_and_objects() {
        let (template, diags) =
            parse("name: t\nsdks:\n  - aws\n  - name: docker\n    version: 4.0.0\n");
        assert!(!diags.has_errors(), "{}", diags);
        assert_eq!(template.sdks[0].name, "aws");
        assert_eq!(template.sdks[1].version.as_deref(), Some("4.0.0"));
    }

    #[test]
    fn components_parse_like_nested_templates() {
        let (template, diags) = parse(
            "name: t\ncomponents:\n  web:\n    description: a web server\n    inputs:\n      port:\n        type: integer\n        default: 80\n    resources:\n      srv:\n        type: test:resource:type\n",
        );
        assert!(!diags.has_errors(), "{}", diags);
        let component = &template.components[0];
        assert_eq!(component.key.value, "web");
        assert_eq!(component.decl.inputs.len(), 1);
        assert_eq!(component.decl.resources.len(), 1);
    }
}

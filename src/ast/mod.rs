//! Typed template model.
//!
//! A second, strongly-typed pass folds the document tree into these decls.
//! The tree is immutable after parsing; decl fields keep the source ranges of
//! the nodes they were read from so every later phase can point at the exact
//! spot in the program.

pub mod expr;
pub mod interpolate;
pub mod parser;

pub use expr::{
    BoolExpr, BuiltinExpr, Expr, ExprId, ExprKind, InterpolationPart, InvokeOptionsDecl,
    ObjectProperty, PropertyAccess, PropertyAccessor, StringExpr,
};

use serde::{Deserialize, Serialize};

use crate::syntax::SourceRange;

/// A list of plain strings (`aliases`, `ignoreChanges`, ...).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StringListDecl {
    pub range: Option<SourceRange>,
    pub elements: Vec<StringExpr>,
}

impl StringListDecl {
    pub fn values(&self) -> Vec<String> {
        self.elements.iter().map(|e| e.value.clone()).collect()
    }
}

/// A named configuration input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigParamDecl {
    pub range: Option<SourceRange>,
    pub ty: Option<StringExpr>,
    pub name: Option<StringExpr>,
    pub secret: Option<BoolExpr>,
    pub default: Option<Expr>,
    /// Bare-value shorthand: `config: { region: us-west-2 }`.
    pub value: Option<Expr>,
    pub items: Option<Box<ConfigParamDecl>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConfigEntry {
    pub key: StringExpr,
    pub param: ConfigParamDecl,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableEntry {
    pub key: StringExpr,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyEntry {
    pub key: StringExpr,
    pub value: Expr,
}

/// `properties:` is either a map of named inputs or a single expression whose
/// value must be an object.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyMapOrExpr {
    Map(Vec<PropertyEntry>),
    Expr(Box<Expr>),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomTimeoutsDecl {
    pub range: Option<SourceRange>,
    pub create: Option<StringExpr>,
    pub update: Option<StringExpr>,
    pub delete: Option<StringExpr>,
}

/// Recognized resource options. Unknown options warn at parse time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceOptionsDecl {
    pub range: Option<SourceRange>,
    pub additional_secret_outputs: Option<StringListDecl>,
    pub aliases: Option<StringListDecl>,
    pub custom_timeouts: Option<CustomTimeoutsDecl>,
    pub delete_before_replace: Option<BoolExpr>,
    pub depends_on: Option<Expr>,
    pub ignore_changes: Option<StringListDecl>,
    pub import: Option<StringExpr>,
    pub parent: Option<Expr>,
    pub protect: Option<Expr>,
    pub provider: Option<Expr>,
    pub providers: Option<Expr>,
    pub version: Option<StringExpr>,
    pub plugin_download_url: Option<StringExpr>,
    pub replace_on_changes: Option<StringListDecl>,
    pub retain_on_delete: Option<BoolExpr>,
    pub deleted_with: Option<Expr>,
}

impl ResourceOptionsDecl {
    /// Expressions held by the options, for dependency discovery and
    /// expression walks.
    pub fn expressions(&self) -> Vec<&Expr> {
        let mut exprs = Vec::new();
        exprs.extend(self.depends_on.iter());
        exprs.extend(self.parent.iter());
        exprs.extend(self.protect.iter());
        exprs.extend(self.provider.iter());
        exprs.extend(self.providers.iter());
        exprs.extend(self.deleted_with.iter());
        exprs
    }
}

/// External-read block: adopt the state of a resource managed outside this
/// program instead of registering it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GetResourceDecl {
    pub range: Option<SourceRange>,
    pub id: Option<Expr>,
    pub state: Vec<PropertyEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDecl {
    pub range: SourceRange,
    pub ty: StringExpr,
    pub name: Option<StringExpr>,
    pub default_provider: Option<BoolExpr>,
    pub properties: Option<PropertyMapOrExpr>,
    pub options: ResourceOptionsDecl,
    pub get: Option<GetResourceDecl>,
}

impl ResourceDecl {
    /// Every expression in the resource body, options included.
    pub fn expressions(&self) -> Vec<&Expr> {
        let mut exprs = Vec::new();
        match &self.properties {
            Some(PropertyMapOrExpr::Map(entries)) => {
                exprs.extend(entries.iter().map(|e| &e.value))
            }
            Some(PropertyMapOrExpr::Expr(e)) => exprs.push(e),
            None => {}
        }
        exprs.extend(self.options.expressions());
        if let Some(get) = &self.get {
            exprs.extend(get.id.iter());
            exprs.extend(get.state.iter().map(|e| &e.value));
        }
        exprs
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceEntry {
    pub key: StringExpr,
    pub decl: ResourceDecl,
}

/// A declared package SDK dependency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl PackageDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
        }
    }
}

/// A reusable component: a nested template body published under a name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComponentDecl {
    pub range: Option<SourceRange>,
    pub name: Option<StringExpr>,
    pub description: Option<StringExpr>,
    pub inputs: Vec<ConfigEntry>,
    pub variables: Vec<VariableEntry>,
    pub resources: Vec<ResourceEntry>,
    pub outputs: Vec<PropertyEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComponentEntry {
    pub key: StringExpr,
    pub decl: ComponentDecl,
}

/// The top-level program.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateDecl {
    pub range: Option<SourceRange>,
    pub name: Option<StringExpr>,
    pub namespace: Option<StringExpr>,
    pub description: Option<StringExpr>,
    pub configuration: Vec<ConfigEntry>,
    pub config: Vec<ConfigEntry>,
    pub variables: Vec<VariableEntry>,
    pub resources: Vec<ResourceEntry>,
    pub outputs: Vec<PropertyEntry>,
    pub sdks: Vec<PackageDescriptor>,
    pub components: Vec<ComponentEntry>,
}

impl TemplateDecl {
    /// The `configuration` and `config` blocks form one namespace.
    pub fn config_entries(&self) -> impl Iterator<Item = &ConfigEntry> {
        self.configuration.iter().chain(self.config.iter())
    }

    /// Merges another template into this one. Singular attributes must not be
    /// set on both sides; config and component entries concatenate.
    pub fn merge(&mut self, other: TemplateDecl) -> Result<(), String> {
        fn merge_field<T>(
            ours: &mut Option<T>,
            theirs: Option<T>,
            what: &str,
        ) -> Result<(), String> {
            match (ours.is_some(), theirs) {
                (false, theirs) => {
                    *ours = theirs;
                    Ok(())
                }
                (true, None) => Ok(()),
                (true, Some(_)) => Err(format!("cannot merge templates with different {}", what)),
            }
        }
        merge_field(&mut self.name, other.name, "names")?;
        merge_field(&mut self.description, other.description, "descriptions")?;
        merge_field(&mut self.namespace, other.namespace, "namespaces")?;
        self.config.extend(other.config);
        self.components.extend(other.components);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::SourceRange;

    fn string_expr(value: &str) -> StringExpr {
        StringExpr {
            value: value.into(),
            range: SourceRange::default(),
        }
    }

    #[test]
    fn merge_concatenates_config_and_components() {
        let mut a = TemplateDecl {
            name: Some(string_expr("prog")),
            ..Default::default()
        };
        let b = TemplateDecl {
            config: vec![ConfigEntry {
                key: string_expr("region"),
                param: ConfigParamDecl::default(),
            }],
            ..Default::default()
        };
        a.merge(b).unwrap();
        assert_eq!(a.config.len(), 1);
        assert_eq!(a.name.as_ref().unwrap().value, "prog");
    }

    #[test]
    fn merge_rejects_conflicting_names() {
        let mut a = TemplateDecl {
            name: Some(string_expr("one")),
            ..Default::default()
        };
        let b = TemplateDecl {
            name: Some(string_expr("two")),
            ..Default::default()
        };
        let err = a.merge(b).unwrap_err();
        assert!(err.contains("different names"));
    }
}

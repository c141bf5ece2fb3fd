//! Provider package interface.
//!
//! The core never loads schemas itself: it consumes a [`PackageLoader`] that
//! can produce [`Package`] handles, and resolves user-written type tokens
//! through them. Token resolution tries the verbatim token, then the
//! `pkg:index:Name` expansion, then the legacy `pkg:mod/lowerName:Name`
//! spelling that classic providers registered.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::ast::{PackageDescriptor, TemplateDecl};
use crate::diags::{Diagnostic, Diagnostics};
use crate::error::PackageError;
use crate::schema::{FunctionType, ResourceType};

/// Canonical name of a resource within a package.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceTypeToken(pub String);

impl ResourceTypeToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceTypeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Canonical name of a function within a package.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionTypeToken(pub String);

impl FunctionTypeToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FunctionTypeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A loaded provider package: enough surface to resolve tokens and fetch
/// structural type hints for its resources and functions.
pub trait Package: Send + Sync {
    fn name(&self) -> &str;

    fn version(&self) -> Option<&str>;

    /// Resolves a user-written resource token to its canonical form.
    fn resolve_resource(&self, token: &str) -> Result<ResourceTypeToken, PackageError>;

    /// Resolves a user-written function token to its canonical form.
    fn resolve_function(&self, token: &str) -> Result<FunctionTypeToken, PackageError>;

    /// Structural description of a resource's inputs and outputs.
    fn resource_type_hint(&self, token: &ResourceTypeToken) -> Option<ResourceType>;

    /// Structural description of a function's inputs and outputs.
    fn function_type_hint(&self, token: &FunctionTypeToken) -> Option<FunctionType>;

    fn is_component(&self, token: &ResourceTypeToken) -> Result<bool, PackageError>;

    fn is_resource_property_secret(&self, token: &ResourceTypeToken, property: &str) -> bool;

    /// Provider-injected constant inputs for a resource type.
    fn resource_constants(&self, token: &ResourceTypeToken) -> HashMap<String, serde_json::Value>;
}

/// Produces packages on demand. Loading may involve plugin RPC, so it is
/// async; the returned handles are cheap to clone and query.
#[async_trait]
pub trait PackageLoader: Send + Sync {
    async fn load_package(
        &self,
        descriptor: &PackageDescriptor,
    ) -> Result<Arc<dyn Package>, PackageError>;
}

/// The reserved token namespace for explicit provider resources:
/// `pulumi:providers:<pkg>` is always a valid resource type.
const PROVIDERS_NAMESPACE: (&str, &str) = ("pulumi", "providers");

/// The package a type token belongs to. `pulumi:providers:aws` belongs to
/// `aws`, everything else to its first label.
pub fn package_name_of(token: &str) -> Result<&str, PackageError> {
    let parts: Vec<&str> = token.split(':').collect();
    if parts.len() < 2 || parts.len() > 3 {
        return Err(PackageError::InvalidToken {
            token: token.to_string(),
        });
    }
    if parts.len() == 3 && parts[0] == PROVIDERS_NAMESPACE.0 && parts[1] == PROVIDERS_NAMESPACE.1 {
        return Ok(parts[2]);
    }
    Ok(parts[0])
}

/// Loads the package owning `token` and resolves the token to its canonical
/// resource name.
pub async fn resolve_resource(
    loader: &dyn PackageLoader,
    token: &str,
) -> Result<(Arc<dyn Package>, ResourceTypeToken), PackageError> {
    let package = load_for_token(loader, token).await?;
    let canonical = package.resolve_resource(token)?;
    debug!(token, canonical = %canonical, "resolved resource token");
    Ok((package, canonical))
}

/// Loads the package owning `token` and resolves the token to its canonical
/// function name.
pub async fn resolve_function(
    loader: &dyn PackageLoader,
    token: &str,
) -> Result<(Arc<dyn Package>, FunctionTypeToken), PackageError> {
    let package = load_for_token(loader, token).await?;
    let canonical = package.resolve_function(token)?;
    Ok((package, canonical))
}

async fn load_for_token(
    loader: &dyn PackageLoader,
    token: &str,
) -> Result<Arc<dyn Package>, PackageError> {
    let name = package_name_of(token)?;
    loader
        .load_package(&PackageDescriptor::new(name))
        .await
        .map_err(|err| match err {
            PackageError::PackageNotFound { name } => PackageError::LoadFailure {
                reason: format!("package {:?} not found", name),
                name,
            },
            other => other,
        })
}

/// A plugin the program requires: package name plus optional version and
/// download URL taken from resource options.
#[derive(Debug, Clone, PartialEq)]
pub struct PluginSpec {
    pub package: String,
    pub version: Option<String>,
    pub plugin_download_url: Option<String>,
}

/// Computes the set of provider plugins referenced by a template's
/// resources. Conflicting versions or download URLs for one package are
/// diagnostics.
pub fn referenced_plugins(template: &TemplateDecl) -> (Vec<PluginSpec>, Diagnostics) {
    let mut diags = Diagnostics::new();
    let mut order: Vec<String> = Vec::new();
    let mut plugins: HashMap<String, PluginSpec> = HashMap::new();

    for entry in &template.resources {
        let options = &entry.decl.options;
        let version = options.version.as_ref().map(|v| v.value.clone());
        let download_url = options.plugin_download_url.as_ref().map(|v| v.value.clone());
        let package = match package_name_of(&entry.decl.ty.value) {
            Ok(name) => name.to_string(),
            Err(_) => continue, // the checker reports invalid tokens
        };

        let existing = plugins.entry(package.clone()).or_insert_with(|| {
            order.push(package.clone());
            PluginSpec {
                package,
                version: None,
                plugin_download_url: None,
            }
        });
        match (&existing.version, &version) {
            (Some(have), Some(want)) if have != want => {
                diags.push(Diagnostic::error(
                    options.version.as_ref().map(|v| v.range.clone()),
                    format!(
                        "Provider {} already declared with a conflicting version: {}",
                        existing.package, have
                    ),
                    "",
                ));
            }
            (None, Some(_)) => existing.version = version.clone(),
            _ => {}
        }
        match (&existing.plugin_download_url, &download_url) {
            (Some(have), Some(want)) if have != want => {
                diags.push(Diagnostic::error(
                    options.plugin_download_url.as_ref().map(|v| v.range.clone()),
                    format!(
                        "Provider {} already declared with a conflicting plugin download URL: {}",
                        existing.package, have
                    ),
                    "",
                ));
            }
            (None, Some(_)) => existing.plugin_download_url = download_url.clone(),
            _ => {}
        }
    }

    if diags.has_errors() {
        return (Vec::new(), diags);
    }
    let specs = order
        .into_iter()
        .map(|name| plugins.remove(&name).expect("plugin recorded"))
        .collect();
    (specs, diags)
}

/// Splits a token into its labels, validating the 2-or-3 label shape.
pub fn token_labels(token: &str) -> Result<Vec<&str>, PackageError> {
    let parts: Vec<&str> = token.split(':').collect();
    if parts.len() < 2 || parts.len() > 3 {
        return Err(PackageError::InvalidToken {
            token: token.to_string(),
        });
    }
    Ok(parts)
}

/// The resolution fallbacks for a token against a set of known canonical
/// names: verbatim, `pkg:index:Name`, then legacy `pkg:mod/lowerName:Name`.
pub fn resolution_candidates(token: &str) -> Result<Vec<String>, PackageError> {
    let parts = token_labels(token)?;
    let mut candidates = vec![token.to_string()];
    let expanded: Vec<String> = if parts.len() == 2 {
        let alternate = format!("{}:index:{}", parts[0], parts[1]);
        candidates.push(alternate);
        vec![
            parts[0].to_string(),
            "index".to_string(),
            parts[1].to_string(),
        ]
    } else {
        parts.iter().map(|s| s.to_string()).collect()
    };
    let lowered = lower_camel(&expanded[2]);
    candidates.push(format!(
        "{}:{}/{}:{}",
        expanded[0], expanded[1], lowered, expanded[2]
    ));
    Ok(candidates)
}

fn lower_camel(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

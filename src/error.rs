//! Library-level error types.
//!
//! User-program problems are never represented here; those flow through
//! [`crate::diags::Diagnostics`]. These enums cover failures of the
//! machinery the core talks to: package/schema lookup and the orchestrator.

use thiserror::Error;

/// Failures while resolving tokens against provider packages.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PackageError {
    #[error("invalid type token {token:?}")]
    InvalidToken { token: String },

    #[error("unable to find resource type {token:?} in resource provider {package:?}")]
    UnknownResource { token: String, package: String },

    #[error("unable to find function {token:?} in resource provider {package:?}")]
    UnknownFunction { token: String, package: String },

    #[error("package {name:?} not found")]
    PackageNotFound { name: String },

    #[error("internal error loading package {name:?}: {reason}")]
    LoadFailure { name: String, reason: String },
}

/// Failures reported by the orchestrator. The message is surfaced verbatim
/// on the originating node's diagnostic.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OrchestratorError {
    #[error("{message}")]
    Register { message: String },

    #[error("{message}")]
    Read { message: String },

    #[error("{message}")]
    Call { message: String },

    #[error("{message}")]
    Export { message: String },

    #[error("operation cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, PackageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_errors_render_like_lookups() {
        let err = PackageError::UnknownResource {
            token: "test:resource:missing".into(),
            package: "test".into(),
        };
        assert_eq!(
            err.to_string(),
            "unable to find resource type \"test:resource:missing\" in resource provider \"test\""
        );
    }

    #[test]
    fn orchestrator_errors_surface_verbatim() {
        let err = OrchestratorError::Call {
            message: "Don't eat the poison".into(),
        };
        assert_eq!(err.to_string(), "Don't eat the poison");
    }
}

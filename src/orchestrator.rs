//! The consumed orchestrator surface.
//!
//! The orchestrator owns the life-cycle of cloud resources; the evaluator
//! only issues four operations against it: register a resource, read an
//! externally-managed resource, call a provider function, and export a
//! program output. Responses are eventual values; during preview they may
//! be unknown.

use std::collections::BTreeSet;

use async_trait::async_trait;
use indexmap::IndexMap;

use crate::error::OrchestratorError;
use crate::eval::value::Value;
use crate::package::{FunctionTypeToken, ResourceTypeToken};

/// Per-operation timeout strings forwarded as metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomTimeouts {
    pub create: Option<String>,
    pub update: Option<String>,
    pub delete: Option<String>,
}

/// Evaluated resource options, forwarded with a registration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceOptions {
    pub additional_secret_outputs: Vec<String>,
    pub aliases: Vec<String>,
    pub custom_timeouts: Option<CustomTimeouts>,
    pub delete_before_replace: Option<bool>,
    pub ignore_changes: Vec<String>,
    pub import_id: Option<String>,
    pub parent: Option<String>,
    pub protect: Option<bool>,
    pub provider: Option<String>,
    pub providers: Vec<String>,
    pub version: Option<String>,
    pub plugin_download_url: Option<String>,
    pub replace_on_changes: Vec<String>,
    pub retain_on_delete: Option<bool>,
    pub deleted_with: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegisterRequest {
    pub token: ResourceTypeToken,
    pub name: String,
    /// False for component resources.
    pub custom: bool,
    pub inputs: IndexMap<String, Value>,
    pub options: ResourceOptions,
    /// Logical names of resources that must be live before this one.
    pub dependencies: BTreeSet<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegisterResponse {
    pub id: Option<String>,
    pub urn: String,
    pub outputs: IndexMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadRequest {
    pub token: ResourceTypeToken,
    pub name: String,
    pub id: String,
    pub state: IndexMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadResponse {
    pub urn: String,
    pub outputs: IndexMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallRequest {
    pub token: FunctionTypeToken,
    pub args: IndexMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallResponse {
    pub outputs: IndexMap<String, Value>,
}

/// External process that provisions resources. All operations are logically
/// blocking; everything else in the evaluator is pure.
#[async_trait]
pub trait Orchestrator: Send + Sync {
    async fn register_resource(
        &self,
        request: RegisterRequest,
    ) -> Result<RegisterResponse, OrchestratorError>;

    async fn read_resource(&self, request: ReadRequest)
        -> Result<ReadResponse, OrchestratorError>;

    async fn call(&self, request: CallRequest) -> Result<CallResponse, OrchestratorError>;

    async fn export(&self, name: &str, value: Value) -> Result<(), OrchestratorError>;
}

//! Shared test doubles: a package loader with a fixed schema map and a
//! recording orchestrator.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use indexmap::IndexMap;

use tessell::ast::PackageDescriptor;
use tessell::error::{OrchestratorError, PackageError};
use tessell::eval::value::{PlainValue, Value};
use tessell::eval::{EvalOptions, Evaluator};
use tessell::orchestrator::{
    CallRequest, CallResponse, Orchestrator, ReadRequest, ReadResponse, RegisterRequest,
    RegisterResponse,
};
use tessell::package::{FunctionTypeToken, Package, PackageLoader, ResourceTypeToken};
use tessell::schema::{FunctionType, ObjectType, Property, ResourceType, SchemaType};
use tessell::{Diagnostics, TemplateDecl};

pub const TEST_RESOURCE_TOKEN: &str = "test:resource:type";
pub const TEST_COMPONENT_TOKEN: &str = "test:component:type";

pub struct MockPackage;

fn string_props(names: &[(&str, bool)]) -> Vec<Property> {
    names
        .iter()
        .map(|(name, required)| {
            if *required {
                Property::new(*name, SchemaType::String)
            } else {
                Property::optional(*name, SchemaType::String)
            }
        })
        .collect()
}

impl Package for MockPackage {
    fn name(&self) -> &str {
        "test"
    }

    fn version(&self) -> Option<&str> {
        None
    }

    fn resolve_resource(&self, token: &str) -> Result<ResourceTypeToken, PackageError> {
        Ok(ResourceTypeToken(token.to_string()))
    }

    fn resolve_function(&self, token: &str) -> Result<FunctionTypeToken, PackageError> {
        Ok(FunctionTypeToken(token.to_string()))
    }

    fn resource_type_hint(&self, token: &ResourceTypeToken) -> Option<ResourceType> {
        let mut resource = ResourceType::new(token.as_str());
        match token.as_str() {
            TEST_RESOURCE_TOKEN => {
                resource.inputs = string_props(&[("foo", true), ("bar", false)]);
                resource.outputs = string_props(&[("foo", true), ("bar", false)]);
            }
            TEST_COMPONENT_TOKEN => {
                resource.inputs = string_props(&[("foo", true)]);
            }
            "test:read:Resource" | "test:resource:not-run" => {
                resource.inputs = string_props(&[("foo", true)]);
                resource.outputs = string_props(&[("foo", true)]);
            }
            "test:resource:with-secret" => {
                resource.inputs = string_props(&[("foo", true), ("bar", true)]);
                resource.outputs = vec![
                    Property::new("foo", SchemaType::String),
                    Property::new("bar", SchemaType::String).secret(),
                ];
            }
            "test:resource:with-list-input" => {
                resource.inputs = vec![Property::new(
                    "listInput",
                    SchemaType::array(SchemaType::String),
                )];
            }
            "test:resource:with-alias" => {
                resource.aliases = vec!["test:resource:old-with-alias".to_string()];
            }
            "test:resource:with-constants" => {
                resource.inputs = string_props(&[("foo", true), ("region", false)]);
            }
            _ => {}
        }
        Some(resource)
    }

    fn function_type_hint(&self, token: &FunctionTypeToken) -> Option<FunctionType> {
        let (inputs, outputs) = match token.as_str() {
            "test:fn" => (
                vec![
                    Property::new("yesArg", SchemaType::String),
                    Property::optional("someSuchArg", SchemaType::String),
                ],
                vec![Property::new("outString", SchemaType::String)],
            ),
            "test:invoke:poison" => (
                vec![Property::new("foo", SchemaType::String)],
                vec![Property::new("value", SchemaType::String)],
            ),
            _ => (Vec::new(), Vec::new()),
        };
        Some(FunctionType {
            token: token.as_str().to_string(),
            inputs: Some(ObjectType {
                token: String::new(),
                properties: inputs,
            }),
            outputs: Some(ObjectType {
                token: String::new(),
                properties: outputs,
            }),
        })
    }

    fn is_component(&self, token: &ResourceTypeToken) -> Result<bool, PackageError> {
        Ok(token.as_str() == TEST_COMPONENT_TOKEN)
    }

    fn is_resource_property_secret(&self, token: &ResourceTypeToken, property: &str) -> bool {
        token.as_str() == "test:resource:with-secret" && property == "bar"
    }

    fn resource_constants(&self, token: &ResourceTypeToken) -> HashMap<String, serde_json::Value> {
        let mut constants = HashMap::new();
        if token.as_str() == "test:resource:with-constants" {
            constants.insert(
                "region".to_string(),
                serde_json::Value::String("us-west-2".to_string()),
            );
        }
        constants
    }
}

pub struct MockPackageLoader;

#[async_trait]
impl PackageLoader for MockPackageLoader {
    async fn load_package(
        &self,
        descriptor: &PackageDescriptor,
    ) -> Result<Arc<dyn Package>, PackageError> {
        match descriptor.name.as_str() {
            "test" | "aws" | "docker" | "pulumi" => Ok(Arc::new(MockPackage)),
            other => Err(PackageError::PackageNotFound {
                name: other.to_string(),
            }),
        }
    }
}

#[derive(Default)]
pub struct MockOrchestrator {
    pub dry_run: bool,
    pub registrations: Mutex<Vec<RegisterRequest>>,
    pub reads: Mutex<Vec<ReadRequest>>,
    pub calls: Mutex<Vec<CallRequest>>,
    pub exports: Mutex<IndexMap<String, Value>>,
}

impl MockOrchestrator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn preview() -> Arc<Self> {
        Arc::new(Self {
            dry_run: true,
            ..Default::default()
        })
    }

    pub fn export_of(&self, name: &str) -> Option<Value> {
        self.exports.lock().unwrap().get(name).cloned()
    }

    pub fn registered_tokens(&self) -> Vec<String> {
        self.registrations
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.token.as_str().to_string())
            .collect()
    }
}

fn object(entries: &[(&str, PlainValue)]) -> PlainValue {
    PlainValue::Object(
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect(),
    )
}

#[async_trait]
impl Orchestrator for MockOrchestrator {
    async fn register_resource(
        &self,
        request: RegisterRequest,
    ) -> Result<RegisterResponse, OrchestratorError> {
        let token = request.token.as_str().to_string();
        let name = request.name.clone();
        let inputs = request.inputs.clone();
        self.registrations.lock().unwrap().push(request);

        let urn = format!("urn:stack::{}::{}", token, name);
        if self.dry_run {
            return Ok(RegisterResponse {
                id: None,
                urn,
                outputs: IndexMap::new(),
            });
        }

        let outputs: IndexMap<String, Value> = match token.as_str() {
            TEST_RESOURCE_TOKEN => [
                ("foo", PlainValue::String("qux".into())),
                ("bar", PlainValue::String("oof".into())),
                ("out", PlainValue::String("tuo".into())),
                ("outSep", PlainValue::String("1-2-3-4".into())),
                ("outNum", PlainValue::Number(1.0)),
                (
                    "outList",
                    PlainValue::List(vec![
                        object(&[("value", PlainValue::Number(42.0))]),
                        object(&[("value", PlainValue::Number(24.0))]),
                    ]),
                ),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), Value::Plain(v)))
            .collect(),
            TEST_COMPONENT_TOKEN => IndexMap::new(),
            _ => inputs,
        };
        let id = match token.as_str() {
            TEST_RESOURCE_TOKEN => Some("someID".to_string()),
            TEST_COMPONENT_TOKEN => None,
            _ => Some(name),
        };
        Ok(RegisterResponse { id, urn, outputs })
    }

    async fn read_resource(
        &self,
        request: ReadRequest,
    ) -> Result<ReadResponse, OrchestratorError> {
        let token = request.token.as_str().to_string();
        let id = request.id.clone();
        let name = request.name.clone();
        self.reads.lock().unwrap().push(request);
        let urn = format!("urn:stack::{}::{}", token, name);
        if id == "unknown-state" {
            // The external state is not available yet; everything about the
            // resource resolves later.
            return Ok(ReadResponse {
                urn,
                outputs: [("tags".to_string(), Value::Eventual(Default::default()))]
                    .into_iter()
                    .collect(),
            });
        }
        let answer = if id.starts_with("eventual-") {
            "definitely"
        } else {
            "yes"
        };
        Ok(ReadResponse {
            urn,
            outputs: [(
                "tags".to_string(),
                Value::Plain(object(&[("isRight", PlainValue::String(answer.into()))])),
            )]
            .into_iter()
            .collect(),
        })
    }

    async fn call(&self, request: CallRequest) -> Result<CallResponse, OrchestratorError> {
        let token = request.token.as_str().to_string();
        self.calls.lock().unwrap().push(request);
        match token.as_str() {
            "test:invoke:poison" => Err(OrchestratorError::Call {
                message: "Don't eat the poison".to_string(),
            }),
            "test:fn" => Ok(CallResponse {
                outputs: [(
                    "outString".to_string(),
                    Value::Plain(PlainValue::String("isAString".into())),
                )]
                .into_iter()
                .collect(),
            }),
            _ => Ok(CallResponse::default()),
        }
    }

    async fn export(&self, name: &str, value: Value) -> Result<(), OrchestratorError> {
        self.exports
            .lock()
            .unwrap()
            .insert(name.to_string(), value);
        Ok(())
    }
}

pub fn parse(text: &str) -> TemplateDecl {
    let (template, diags) = tessell::load_template("<stdin>", text);
    assert!(!diags.has_errors(), "template failed to parse: {}", diags);
    template.expect("expected a template")
}

/// Parses and evaluates a program against fresh mocks, returning the
/// evaluator, its diagnostics, and the orchestrator for inspection.
pub async fn evaluate(text: &str) -> (Evaluator, Diagnostics, Arc<MockOrchestrator>) {
    evaluate_with(text, EvalOptions::default(), MockOrchestrator::new()).await
}

pub async fn evaluate_with(
    text: &str,
    options: EvalOptions,
    orchestrator: Arc<MockOrchestrator>,
) -> (Evaluator, Diagnostics, Arc<MockOrchestrator>) {
    let template = parse(text);
    let mut evaluator = Evaluator::new(
        template,
        Arc::new(MockPackageLoader),
        orchestrator.clone(),
        options,
    );
    let diags = evaluator.evaluate().await;
    (evaluator, diags, orchestrator)
}

/// The known plain contents of a value, panicking on unknown/poison.
pub fn known(value: &Value) -> &PlainValue {
    value
        .as_plain()
        .unwrap_or_else(|| panic!("expected a known value, got {:?}", value))
}

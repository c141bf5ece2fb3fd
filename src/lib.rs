//! # Tessell: Declarative Infrastructure Program Runtime
//!
//! Tessell executes declarative infrastructure programs written as YAML or
//! JSON documents. A program names cloud resources, variables, configuration
//! and outputs, and wires them together with a small expression language
//! (interpolation, property access, a fixed set of built-in functions, and
//! invocations of provider functions). The runtime validates the program
//! against provider schemas, orders its nodes by dependency, evaluates every
//! expression, and drives provisioning by registering each resource with an
//! external orchestrator.
//!
//! ## Processing Pipeline
//!
//! ```text
//! Document → Syntax Tree → Decl Tree → Type Check → Plan → Evaluate
//! ```
//!
//! ### Stage 1: Loading
//!
//! The [`syntax`] module holds the untyped document tree; its loader parses
//! YAML 1.2 (and therefore JSON) and attaches a source range to every node.
//!
//! ### Stage 2: Decl Parsing
//!
//! The [`ast`] module folds the document tree into the typed template model:
//! decls for configuration, variables, resources, outputs, components, and
//! SDKs, plus the expression tree with `${...}` interpolation.
//!
//! ### Stage 3: Type Checking
//!
//! The [`type_checker`] module computes a structural type for every
//! expression against the provider schemas exposed through [`package`], and
//! checks resource inputs and invoke arguments property-by-property.
//!
//! ### Stage 4: Planning
//!
//! The [`runner`] module discovers inter-node references, rejects duplicate
//! and colliding names, and produces a topological evaluation order.
//!
//! ### Stage 5: Evaluation
//!
//! The [`eval`] module materializes each node in order: expressions become
//! eventual values, resources become registrations against the
//! [`orchestrator`], and outputs are exported. Failed expressions poison
//! their consumers instead of cascading diagnostics.
//!
//! ## Diagnostics
//!
//! All phases report through [`diags`]: structured diagnostics with
//! severities, source ranges, and optional detail. Reaching an error stops
//! evaluation after the current node; the collection renders as
//! `no diagnostics` when nothing was reported.

pub mod ast;
pub mod diags;
pub mod error;
pub mod eval;
pub mod orchestrator;
pub mod package;
pub mod runner;
pub mod schema;
pub mod syntax;
pub mod type_checker;

// Re-exports
pub use ast::parser::load_template;
pub use ast::TemplateDecl;
pub use diags::{Diagnostic, Diagnostics, Severity};
pub use error::{OrchestratorError, PackageError};
pub use eval::value::{PlainValue, Value};
pub use eval::{ConfigValue, EvalOptions, Evaluator};
pub use orchestrator::Orchestrator;
pub use package::{Package, PackageLoader};
pub use type_checker::{type_check, TypeCache};

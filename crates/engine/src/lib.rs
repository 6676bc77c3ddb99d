//! # BPMN IO Engine
//!
//! Resolves the runtime input and output of a workflow activity from its declarative extension
//! elements, and exposes the result as a stateful activation the host engine can read, mutate,
//! snapshot and resume.
//!
//! ## Key Features
//!
//! - **Parameters**: literal, name-only, expression, script, list and map sources evaluated in
//!   declaration order against an accumulating scope
//! - **Forms**: declared form fields with expression defaults and labels, or keyed forms whose
//!   fields are created on demand
//! - **ioSpecification**: formal data ports wired to a shared data-object store
//! - **Connectors**: positional service arguments and `result[n]` remapping
//! - **Loops**: sequential and parallel multi-instance iterations with ordered aggregation
//! - **State**: a stable snapshot format that survives declaration drift
//!
//! ## Usage
//!
//! ```rust
//! use bpmn_io_engine::{ActivationContext, ActivityExtensions, Environment, ParentActivity};
//! use bpmn_io_types::{ActivityDeclaration, InputOutputDeclaration, ParameterDeclaration};
//! use serde_json::json;
//!
//! let mut declaration = ActivityDeclaration::new("task");
//! declaration.input_output = Some(InputOutputDeclaration {
//!     input_parameters: vec![ParameterDeclaration::with_value("input", "${variables.input}")],
//!     output_parameters: vec![ParameterDeclaration::with_value("status", "${result.status}")],
//! });
//!
//! let extensions = ActivityExtensions::load(&declaration, Environment::default())?;
//! let mut activation = extensions.activate(
//!     &ParentActivity::new("task"),
//!     ActivationContext::with_variables(json!({"input": 1})),
//! )?;
//!
//! assert_eq!(activation.input().get("input"), Some(&json!(1)));
//! activation.set_result(json!({"status": "done"}));
//! assert_eq!(activation.output()?.get("status"), Some(&json!("done")));
//! # Ok::<(), bpmn_io_engine::ActivationError>(())
//! ```
//!
//! ## Architecture
//!
//! - **`activity`**: compiled extensions and the activation handle
//! - **`parameter`** / **`input_output`**: parameter sources and ordered parameter sets
//! - **`form`**: fields and forms
//! - **`io_specification`**: data ports and data-object associations
//! - **`connector`** / **`properties`**: connector remapping and activity properties
//! - **`loop_context`**: per-iteration contexts and loop execution
//! - **`resolve`** / **`script`**: expression and script seams with default implementations
//! - **`environment`** / **`config`**: shared collaborators and engine configuration

pub mod activity;
pub mod config;
pub mod connector;
pub mod context;
pub mod environment;
pub mod error;
pub mod form;
pub mod input_output;
pub mod io_specification;
pub mod loop_context;
pub mod parameter;
pub mod properties;
pub mod resolve;
pub mod script;

pub use activity::{Activation, ActivityExtensions};
pub use config::{EngineConfig, WritePolicy, load_config, load_config_from_path};
pub use context::{ActivationContext, ParentActivity, Scope};
pub use environment::{DataObjectStore, Environment};
pub use error::{ActivationError, ActivationResult};
pub use form::{Form, FormField};
pub use loop_context::{IterationExecutor, LoopActivationContext, LoopOutcome};
pub use parameter::{Parameter, ParameterSource};
pub use resolve::{ExpressionResolver, TemplateResolver};
pub use script::{ExpressionScriptRunner, ScriptRunner};

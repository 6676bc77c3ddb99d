//! Ordered input/output parameter sets.
//!
//! Inputs are resolved strictly left to right and every defined value is folded back into the
//! scope under its parameter name, so later parameters can reference earlier ones. Outputs are
//! resolved the same way against a scope that also carries `result` and `output`, the outputs
//! computed so far. A result object with its own `output` entry keeps that entry visible
//! instead.

use bpmn_io_types::{InputOutputDeclaration, ParameterDeclaration};
use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::config::EngineConfig;
use crate::context::Scope;
use crate::environment::Environment;
use crate::error::ActivationResult;
use crate::parameter::{Parameter, ParameterSource};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputOutput {
    input_parameters: Vec<Parameter>,
    output_parameters: Vec<Parameter>,
}

impl InputOutput {
    pub fn compile(activity_id: &str, declaration: &InputOutputDeclaration, config: &EngineConfig) -> ActivationResult<Self> {
        Ok(Self {
            input_parameters: compile_all(activity_id, &declaration.input_parameters, config)?,
            output_parameters: compile_all(activity_id, &declaration.output_parameters, config)?,
        })
    }

    /// Synthesizes `<result_variable> = ${result}` as the only output parameter.
    pub fn for_result_variable(result_variable: &str) -> Self {
        Self {
            input_parameters: Vec::new(),
            output_parameters: vec![Parameter::new(
                result_variable,
                ParameterSource::Expression("${result}".to_string()),
            )],
        }
    }

    pub fn has_input_parameters(&self) -> bool {
        !self.input_parameters.is_empty()
    }

    pub fn has_output_parameters(&self) -> bool {
        !self.output_parameters.is_empty()
    }

    pub fn input_parameters(&self) -> &[Parameter] {
        &self.input_parameters
    }

    /// Resolves inputs in declaration order, folding each defined value into `scope`.
    pub fn resolve_input(&self, scope: &mut Scope, environment: &Environment) -> ActivationResult<IndexMap<String, Value>> {
        let mut input = IndexMap::new();
        for parameter in &self.input_parameters {
            if let Some(value) = parameter.resolve(scope, environment)? {
                scope.insert(parameter.name(), value.clone());
                input.insert(parameter.name().to_string(), value);
            }
        }
        Ok(input)
    }

    /// Resolves outputs in declaration order. `scope` must already expose `result`.
    pub fn resolve_output(&self, scope: &mut Scope, environment: &Environment) -> ActivationResult<IndexMap<String, Value>> {
        let mut output = IndexMap::new();
        let track_output = !scope
            .get("result")
            .and_then(Value::as_object)
            .is_some_and(|result| result.contains_key("output"));
        if track_output {
            scope.insert("output", Value::Object(Map::new()));
        }
        for parameter in &self.output_parameters {
            if let Some(value) = parameter.resolve(scope, environment)? {
                output.insert(parameter.name().to_string(), value);
                if track_output {
                    scope.insert("output", to_object(&output));
                }
            }
        }
        Ok(output)
    }
}

fn compile_all(activity_id: &str, declarations: &[ParameterDeclaration], config: &EngineConfig) -> ActivationResult<Vec<Parameter>> {
    declarations
        .iter()
        .map(|declaration| Parameter::compile(activity_id, declaration, config))
        .collect()
}

pub(crate) fn to_object(values: &IndexMap<String, Value>) -> Value {
    Value::Object(values.iter().map(|(key, value)| (key.clone(), value.clone())).collect())
}

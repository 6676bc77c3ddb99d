//! Connector argument and result remapping.
//!
//! A connector's input parameters become the positional invocation arguments, in declaration
//! order. The call outcome is exposed to the connector's output parameters as `result`, so
//! `${result[0]}` addresses the first positional outcome and `${result[-1]}` the last one. The
//! remapped object then becomes the activity result.

use bpmn_io_types::ConnectorDeclaration;
use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

use crate::config::EngineConfig;
use crate::context::Scope;
use crate::environment::Environment;
use crate::error::ActivationResult;
use crate::input_output::{InputOutput, to_object};

#[derive(Debug, Clone, PartialEq)]
pub struct Connector {
    connector_id: String,
    io: InputOutput,
}

impl Connector {
    pub fn compile(activity_id: &str, declaration: &ConnectorDeclaration, config: &EngineConfig) -> ActivationResult<Self> {
        let io = match &declaration.input_output {
            Some(io) => InputOutput::compile(activity_id, io, config)?,
            None => InputOutput::default(),
        };
        Ok(Self {
            connector_id: declaration.connector_id.clone(),
            io,
        })
    }

    pub fn connector_id(&self) -> &str {
        &self.connector_id
    }

    /// Positional invocation arguments.
    ///
    /// Unresolved parameters keep their position as `null`. Without connector inputs the single
    /// argument is the whole scope.
    pub fn arguments(&self, scope: &Scope, environment: &Environment) -> ActivationResult<Vec<Value>> {
        if !self.io.has_input_parameters() {
            return Ok(vec![scope.to_value()]);
        }
        let mut running_scope = scope.clone();
        let mut arguments = Vec::new();
        for parameter in self.io.input_parameters() {
            let value = parameter.resolve(&running_scope, environment)?;
            if let Some(value) = &value {
                running_scope.insert(parameter.name(), value.clone());
            }
            arguments.push(value.unwrap_or(Value::Null));
        }
        debug!(connector_id = %self.connector_id, argument_count = arguments.len(), "connector arguments resolved");
        Ok(arguments)
    }

    /// Remaps the raw call outcome through the connector outputs.
    pub fn remap(&self, result: Value, scope: &Scope, environment: &Environment) -> ActivationResult<Value> {
        if !self.io.has_output_parameters() {
            return Ok(result);
        }
        let mut output_scope = scope.clone();
        output_scope.insert("result", result.clone());
        output_scope.spread(&result);
        let remapped: IndexMap<String, Value> = self.io.resolve_output(&mut output_scope, environment)?;
        Ok(to_object(&remapped))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bpmn_io_types::{InputOutputDeclaration, ParameterDeclaration};
    use serde_json::json;

    fn connector(inputs: Vec<ParameterDeclaration>, outputs: Vec<ParameterDeclaration>) -> Connector {
        Connector::compile(
            "task",
            &ConnectorDeclaration {
                connector_id: "ping".into(),
                input_output: Some(InputOutputDeclaration {
                    input_parameters: inputs,
                    output_parameters: outputs,
                }),
            },
            &EngineConfig::default(),
        )
        .expect("compile")
    }

    #[test]
    fn arguments_are_positional() {
        let connector = connector(
            vec![
                ParameterDeclaration::with_value("url", "${variables.url}"),
                ParameterDeclaration::named("missing"),
                ParameterDeclaration::with_value("method", "GET"),
            ],
            vec![],
        );
        let mut scope = Scope::default();
        scope.insert("variables", json!({"url": "http://example.com"}));
        let arguments = connector.arguments(&scope, &Environment::default()).expect("arguments");
        assert_eq!(arguments, vec![json!("http://example.com"), Value::Null, json!("GET")]);
    }

    #[test]
    fn without_inputs_the_scope_is_the_argument() {
        let connector = Connector::compile(
            "task",
            &ConnectorDeclaration {
                connector_id: "ping".into(),
                input_output: None,
            },
            &EngineConfig::default(),
        )
        .expect("compile");
        let mut scope = Scope::default();
        scope.insert("variables", json!({"a": 1}));
        let arguments = connector.arguments(&scope, &Environment::default()).expect("arguments");
        assert_eq!(arguments, vec![json!({"variables": {"a": 1}})]);
        assert_eq!(connector.remap(json!([1]), &scope, &Environment::default()).expect("remap"), json!([1]));
    }

    #[test]
    fn remap_addresses_first_and_last_outcomes() {
        let connector = connector(
            vec![ParameterDeclaration::named("a"), ParameterDeclaration::named("b")],
            vec![
                ParameterDeclaration::with_value("first", "${result[0].statusCode}"),
                ParameterDeclaration::with_value("last", "${result[-1].statusCode}"),
                ParameterDeclaration::with_value("pinged", "${true}"),
            ],
        );
        let remapped = connector
            .remap(
                json!([{"statusCode": 200}, {"statusCode": 201}, {"statusCode": 204}]),
                &Scope::default(),
                &Environment::default(),
            )
            .expect("remap");
        assert_eq!(remapped, json!({"first": 200, "last": 204, "pinged": true}));
    }
}

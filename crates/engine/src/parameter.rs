//! Input and output parameters.
//!
//! A declaration is compiled once into a [`Parameter`] carrying a [`ParameterSource`]; each
//! source kind has exactly one evaluation rule.
//!
//! Compatibility quirk: a list definition without items, or a map definition without entries,
//! does not produce an empty collection. It falls back to looking the parameter name up in the
//! scope, exactly like a name-only parameter. Existing declarations rely on this.

use bpmn_io_types::{DefinitionDeclaration, DefinitionKind, ParameterDeclaration};
use serde_json::{Map, Value};

use crate::config::EngineConfig;
use crate::context::Scope;
use crate::environment::Environment;
use crate::error::{ActivationError, ActivationResult};

/// Where a parameter's value comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterSource {
    /// Returned verbatim.
    Literal(Value),
    /// Text containing `${`, handed to the expression resolver.
    Expression(String),
    /// Looks the parameter name up in the scope.
    NameOnly,
    Script { format: String, source: String },
    /// Item expressions evaluated into an ordered array.
    List(Vec<String>),
    /// Entry expressions evaluated into an object keyed by entry key.
    Map(Vec<(String, String)>),
    /// Empty or unknown definition; never contributes a value.
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    name: String,
    source: ParameterSource,
}

impl Parameter {
    /// Compiles a declaration, failing on unsupported script formats and malformed shapes.
    pub fn compile(activity_id: &str, declaration: &ParameterDeclaration, config: &EngineConfig) -> ActivationResult<Self> {
        let name = declaration.name.trim();
        if name.is_empty() {
            return Err(ActivationError::malformed(activity_id, "parameter without a name"));
        }
        let source = match (&declaration.definition, &declaration.value) {
            (Some(definition), _) => compile_definition(activity_id, name, definition, config)?,
            (None, Some(Value::String(text))) if text.contains("${") => ParameterSource::Expression(text.clone()),
            (None, Some(value)) => ParameterSource::Literal(value.clone()),
            (None, None) => ParameterSource::NameOnly,
        };
        Ok(Self {
            name: name.to_string(),
            source,
        })
    }

    pub fn new(name: impl Into<String>, source: ParameterSource) -> Self {
        Self { name: name.into(), source }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &ParameterSource {
        &self.source
    }

    /// Resolves the parameter against `scope`. `None` means the value is undefined.
    pub fn resolve(&self, scope: &Scope, environment: &Environment) -> ActivationResult<Option<Value>> {
        match &self.source {
            ParameterSource::Literal(value) => Ok(Some(value.clone())),
            ParameterSource::Expression(expression) => environment.resolve_expression(expression, &scope.to_value()),
            ParameterSource::NameOnly => Ok(scope.get(&self.name).cloned()),
            ParameterSource::Script { source, .. } => environment.run_script(&self.name, source, &scope.to_value()).map(Some),
            ParameterSource::List(items) => {
                let scope_value = scope.to_value();
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(environment.resolve_expression(item, &scope_value)?.unwrap_or(Value::Null));
                }
                Ok(Some(Value::Array(values)))
            }
            ParameterSource::Map(entries) => {
                let scope_value = scope.to_value();
                let mut object = Map::new();
                for (key, expression) in entries {
                    if let Some(value) = environment.resolve_expression(expression, &scope_value)? {
                        object.insert(key.clone(), value);
                    }
                }
                Ok(Some(Value::Object(object)))
            }
            ParameterSource::Empty => Ok(None),
        }
    }
}

fn compile_definition(
    activity_id: &str,
    name: &str,
    definition: &DefinitionDeclaration,
    config: &EngineConfig,
) -> ActivationResult<ParameterSource> {
    let source = match definition.kind {
        Some(DefinitionKind::Script) => {
            let format = definition
                .script_format
                .as_deref()
                .map(str::trim)
                .filter(|format| !format.is_empty())
                .ok_or_else(|| ActivationError::malformed(activity_id, format!("script parameter {name} has no scriptFormat")))?;
            if !config.supports_script_format(format) {
                return Err(ActivationError::UnsupportedScriptFormat {
                    activity_id: activity_id.to_string(),
                    parameter: name.to_string(),
                    format: format.to_string(),
                });
            }
            ParameterSource::Script {
                format: format.to_string(),
                source: definition.value.clone().unwrap_or_default(),
            }
        }
        Some(DefinitionKind::List) => match &definition.items {
            Some(items) if !items.is_empty() => ParameterSource::List(items.iter().map(|item| item.value.clone()).collect()),
            _ => ParameterSource::NameOnly,
        },
        Some(DefinitionKind::Map) => match &definition.entries {
            Some(entries) if !entries.is_empty() => {
                ParameterSource::Map(entries.iter().map(|entry| (entry.key.clone(), entry.value.clone())).collect())
            }
            _ => ParameterSource::NameOnly,
        },
        Some(DefinitionKind::Expression) => match &definition.value {
            Some(expression) => ParameterSource::Expression(expression.clone()),
            None => ParameterSource::Empty,
        },
        Some(DefinitionKind::Unknown) | None => ParameterSource::Empty,
    };
    Ok(source)
}

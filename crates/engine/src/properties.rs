//! Activity properties: ordered name/value pairs whose values are expressions.

use bpmn_io_types::PropertyDeclaration;
use indexmap::IndexMap;
use serde_json::Value;

use crate::context::Scope;
use crate::environment::Environment;
use crate::error::ActivationResult;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    entries: Vec<PropertyDeclaration>,
}

impl Properties {
    pub fn compile(declarations: &[PropertyDeclaration]) -> Self {
        Self {
            entries: declarations.to_vec(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolves every property; properties without a value or resolving to nothing are omitted.
    pub fn resolve(&self, scope: &Scope, environment: &Environment) -> ActivationResult<IndexMap<String, Value>> {
        let scope_value = scope.to_value();
        let mut resolved = IndexMap::new();
        for property in &self.entries {
            let Some(expression) = &property.value else {
                continue;
            };
            if let Some(value) = environment.resolve_expression(expression, &scope_value)? {
                resolved.insert(property.name.clone(), value);
            }
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn values_are_resolved_as_expressions() {
        let properties = Properties::compile(&[
            PropertyDeclaration {
                name: "color".into(),
                value: Some("${variables.color}".into()),
            },
            PropertyDeclaration {
                name: "static".into(),
                value: Some("fixed".into()),
            },
            PropertyDeclaration {
                name: "empty".into(),
                value: None,
            },
        ]);
        let mut scope = Scope::default();
        scope.insert("variables", json!({"color": "blue"}));
        let resolved = properties.resolve(&scope, &Environment::default()).expect("resolve");
        assert_eq!(resolved.get("color"), Some(&json!("blue")));
        assert_eq!(resolved.get("static"), Some(&json!("fixed")));
        assert!(!resolved.contains_key("empty"));
    }
}

use bpmn_io_types::{FieldState, FormFieldDeclaration};
use serde_json::Value;

use crate::context::Scope;
use crate::environment::Environment;
use crate::error::ActivationResult;
use crate::resolve::format_json_value;

/// A single form value slot.
///
/// The default value is derived from an expression evaluated against the activation scope; an
/// assigned value (from [`FormField::set`] or a resumed state) takes precedence over it.
#[derive(Debug, Clone, PartialEq)]
pub struct FormField {
    id: String,
    label: Option<String>,
    value_type: Option<String>,
    default_expression: Option<String>,
    default_value: Option<Value>,
    assigned: Option<Value>,
}

impl FormField {
    /// Builds a field from its declaration, resolving label and default against `scope`.
    pub fn build(declaration: &FormFieldDeclaration, environment: &Environment, scope: &Scope) -> ActivationResult<Self> {
        let scope_value = scope.to_value();
        let label = match &declaration.label {
            Some(expression) => environment
                .resolve_expression(expression, &scope_value)?
                .map(|label| format_json_value(&label)),
            None => None,
        };
        let mut field = Self {
            id: declaration.id.clone(),
            label,
            value_type: declaration.value_type.clone(),
            default_expression: declaration.default_value.clone(),
            default_value: None,
            assigned: None,
        };
        field.default_value = field.resolve_default(environment, scope)?;
        Ok(field)
    }

    /// Field created on demand by id, without label or default.
    pub fn keyed(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: None,
            value_type: None,
            default_expression: None,
            default_value: None,
            assigned: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn value_type(&self) -> Option<&str> {
        self.value_type.as_deref()
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default_value.as_ref()
    }

    pub fn is_assigned(&self) -> bool {
        self.assigned.is_some()
    }

    pub fn get(&self) -> Option<&Value> {
        self.assigned.as_ref().or(self.default_value.as_ref())
    }

    pub fn set(&mut self, value: Value) -> bool {
        self.assigned = Some(value);
        true
    }

    /// Drops any assigned value and re-evaluates the default against `scope`.
    pub fn reset(&mut self, environment: &Environment, scope: &Scope) -> ActivationResult<()> {
        self.assigned = None;
        self.default_value = self.resolve_default(environment, scope)?;
        Ok(())
    }

    pub fn state(&self) -> FieldState {
        FieldState {
            id: self.id.clone(),
            label: self.label.clone(),
            value_type: self.value_type.clone(),
            value: self.assigned.clone(),
        }
    }

    pub fn resume(&mut self, state: &FieldState) {
        if let Some(value) = &state.value {
            self.assigned = Some(value.clone());
        }
    }

    fn resolve_default(&self, environment: &Environment, scope: &Scope) -> ActivationResult<Option<Value>> {
        match &self.default_expression {
            Some(expression) => environment.resolve_expression(expression, &scope.to_value()),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn declaration() -> FormFieldDeclaration {
        FormFieldDeclaration {
            id: "surname".into(),
            label: Some("Surname for ${variables.name}".into()),
            default_value: Some("${variables.surname}".into()),
            value_type: Some("string".into()),
        }
    }

    fn scope(surname: &str) -> Scope {
        let mut scope = Scope::default();
        scope.insert("variables", json!({"name": "Ada", "surname": surname}));
        scope
    }

    #[test]
    fn default_and_label_are_resolved() {
        let field = FormField::build(&declaration(), &Environment::default(), &scope("Lovelace")).expect("field");
        assert_eq!(field.label(), Some("Surname for Ada"));
        assert_eq!(field.get(), Some(&json!("Lovelace")));
        assert!(!field.is_assigned());
        assert_eq!(field.state().value, None);
    }

    #[test]
    fn set_overrides_default_and_reset_restores_it() {
        let environment = Environment::default();
        let mut field = FormField::build(&declaration(), &environment, &scope("Lovelace")).expect("field");
        assert!(field.set(json!("Byron")));
        assert_eq!(field.get(), Some(&json!("Byron")));
        assert_eq!(field.state().value, Some(json!("Byron")));

        field.reset(&environment, &scope("King")).expect("reset");
        assert_eq!(field.get(), Some(&json!("King")));
        assert!(!field.is_assigned());
    }

    #[test]
    fn field_without_default_is_undefined() {
        let field = FormField::keyed("note");
        assert_eq!(field.get(), None);
        assert_eq!(field.state(), FieldState {
            id: "note".into(),
            ..Default::default()
        });
    }

    #[test]
    fn resume_restores_assigned_value() {
        let mut field = FormField::keyed("note");
        field.resume(&FieldState {
            id: "note".into(),
            value: Some(Value::Null),
            ..Default::default()
        });
        assert_eq!(field.get(), Some(&Value::Null));
        assert!(field.is_assigned());
    }
}

//! Forms bound to an activation.
//!
//! Two flavors exist. A declared form comes from explicit form data and owns a fixed, ordered
//! field list built when the activation is created. A keyed form only carries a resolved form
//! key; its fields are created on demand whenever a value is assigned by id.
//!
//! Saved state only carries fields that are interesting to persist: fields with an assigned
//! value or a label. Saved fields that no longer exist in a declared form are ignored on resume.

mod field;

pub use field::FormField;

use bpmn_io_types::{ActivityDeclaration, FieldState, FormFieldDeclaration, FormState};
use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

use crate::context::Scope;
use crate::environment::Environment;
use crate::error::ActivationResult;
use crate::resolve::format_json_value;

/// Compiled form declaration shared by every activation of an activity.
#[derive(Debug, Clone, PartialEq)]
pub enum FormDefinition {
    Declared {
        id: Option<String>,
        fields: Vec<FormFieldDeclaration>,
    },
    Keyed {
        form_key: String,
    },
}

impl FormDefinition {
    /// Form data with at least one field wins over a form key. Empty form data is no form.
    pub fn from_declaration(declaration: &ActivityDeclaration) -> Option<Self> {
        if let Some(form) = &declaration.form
            && !form.fields.is_empty()
        {
            return Some(Self::Declared {
                id: form.id.clone(),
                fields: form.fields.clone(),
            });
        }
        declaration
            .form_key
            .as_ref()
            .filter(|form_key| !form_key.trim().is_empty())
            .map(|form_key| Self::Keyed {
                form_key: form_key.clone(),
            })
    }

    /// Materializes the form for one activation.
    pub fn build(&self, environment: &Environment, scope: Scope) -> ActivationResult<Form> {
        let (kind, fields) = match self {
            Self::Declared { id, fields } => {
                let fields = fields
                    .iter()
                    .map(|declaration| FormField::build(declaration, environment, &scope))
                    .collect::<ActivationResult<Vec<_>>>()?;
                debug!(form_id = ?id, field_count = fields.len(), "form fields loaded");
                (FormKind::Declared { id: id.clone() }, fields)
            }
            Self::Keyed { form_key } => {
                let resolved = environment
                    .resolve_expression(form_key, &scope.to_value())?
                    .map(|key| format_json_value(&key));
                debug!(form_key = ?resolved, "form key resolved");
                (FormKind::Keyed { form_key: resolved }, Vec::new())
            }
        };
        Ok(Form {
            kind,
            fields,
            environment: environment.clone(),
            scope,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum FormKind {
    Declared { id: Option<String> },
    Keyed { form_key: Option<String> },
}

#[derive(Debug, Clone)]
pub struct Form {
    kind: FormKind,
    fields: Vec<FormField>,
    environment: Environment,
    scope: Scope,
}

impl Form {
    /// Form data id, or the resolved form key for keyed forms.
    pub fn id(&self) -> Option<&str> {
        match &self.kind {
            FormKind::Declared { id } => id.as_deref(),
            FormKind::Keyed { form_key } => form_key.as_deref(),
        }
    }

    pub fn form_key(&self) -> Option<&str> {
        match &self.kind {
            FormKind::Keyed { form_key } => form_key.as_deref(),
            FormKind::Declared { .. } => None,
        }
    }

    pub fn is_keyed(&self) -> bool {
        matches!(self.kind, FormKind::Keyed { .. })
    }

    pub fn field(&self, id: &str) -> Option<&FormField> {
        self.fields.iter().find(|field| field.id() == id)
    }

    /// Mutable access by id. Keyed forms create the field when it does not exist yet.
    pub fn field_mut(&mut self, id: &str) -> Option<&mut FormField> {
        let position = match self.fields.iter().position(|field| field.id() == id) {
            Some(position) => position,
            None if self.is_keyed() => {
                self.fields.push(FormField::keyed(id));
                self.fields.len() - 1
            }
            None => return None,
        };
        self.fields.get_mut(position)
    }

    pub fn fields(&self) -> Vec<FormField> {
        self.fields.clone()
    }

    /// Returns `false` when a declared form has no field with this id.
    pub fn set_field_value(&mut self, id: &str, value: Value) -> bool {
        match self.field_mut(id) {
            Some(field) => field.set(value),
            None => false,
        }
    }

    pub fn field_value(&self, id: &str) -> Option<Value> {
        self.field(id).and_then(|field| field.get().cloned())
    }

    /// Every field id with its current value, undefined values included.
    pub fn input(&self) -> IndexMap<String, Option<Value>> {
        self.fields
            .iter()
            .map(|field| (field.id().to_string(), field.get().cloned()))
            .collect()
    }

    /// Fields with a defined value.
    pub fn output(&self) -> IndexMap<String, Value> {
        self.fields
            .iter()
            .filter_map(|field| field.get().map(|value| (field.id().to_string(), value.clone())))
            .collect()
    }

    /// Re-derives every field's default against the activation scope.
    pub fn reset(&mut self) -> ActivationResult<()> {
        for field in &mut self.fields {
            field.reset(&self.environment, &self.scope)?;
        }
        Ok(())
    }

    /// `None` when a declared form has no field worth persisting.
    pub fn state(&self) -> Option<FormState> {
        let fields: Vec<FieldState> = self
            .fields
            .iter()
            .filter(|field| field.is_assigned() || field.label().is_some())
            .map(FormField::state)
            .collect();
        let fields = (!fields.is_empty()).then_some(fields);
        match &self.kind {
            FormKind::Declared { .. } => fields.map(|fields| FormState {
                form_key: None,
                fields: Some(fields),
            }),
            FormKind::Keyed { form_key } => Some(FormState {
                form_key: form_key.clone(),
                fields,
            }),
        }
    }

    pub fn resume(&mut self, state: &FormState) {
        debug!(form_id = ?self.id(), "resume form");
        if let FormKind::Keyed { form_key } = &mut self.kind
            && state.form_key.is_some()
        {
            *form_key = state.form_key.clone();
        }
        let Some(saved_fields) = &state.fields else {
            return;
        };
        for saved_field in saved_fields {
            if let Some(field) = self.field_mut(&saved_field.id) {
                field.resume(saved_field);
            }
        }
    }
}

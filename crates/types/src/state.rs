//! Persisted activation state.
//!
//! The shape is a compatibility contract: saved states are resumed by later versions of the
//! engine against possibly edited declarations, so fields are only ever added, never renamed.
//!
//! ```json
//! { "io": { "ioSpecification": { "input": {} },
//!           "form": { "formKey": "...", "fields": [{ "id": "...", "label": "...", "valueType": "...", "value": 1 }] } } }
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;

/// Snapshot of a single activation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ActivationState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub io: Option<IoState>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct IoState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub io_specification: Option<IoSpecificationState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form: Option<FormState>,
    /// Legacy placement of the resolved form key; only read on resume.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_key: Option<String>,
    /// Result injected by the host before the snapshot was taken.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<JsonValue>,
}

impl IoState {
    pub fn is_empty(&self) -> bool {
        self.io_specification.is_none() && self.form.is_none() && self.form_key.is_none() && self.result.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct IoSpecificationState {
    #[serde(default)]
    pub input: IndexMap<String, JsonValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct FormState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<FieldState>>,
}

/// State of one form field. `value` is present only when the field was assigned.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct FieldState {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "deserialize_present")]
    pub value: Option<JsonValue>,
}

/// Keeps an explicit `"value": null` distinct from an absent key.
fn deserialize_present<'de, D>(deserializer: D) -> Result<Option<JsonValue>, D::Error>
where
    D: Deserializer<'de>,
{
    JsonValue::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn field_state_keeps_explicit_null_value() {
        let assigned: FieldState = serde_json::from_value(json!({"id": "a", "value": null})).expect("parse");
        assert_eq!(assigned.value, Some(JsonValue::Null));

        let unassigned: FieldState = serde_json::from_value(json!({"id": "a", "label": "A"})).expect("parse");
        assert_eq!(unassigned.value, None);
        assert_eq!(serde_json::to_value(&unassigned).expect("serialize"), json!({"id": "a", "label": "A"}));
    }

    #[test]
    fn empty_state_serializes_without_io() {
        assert_eq!(serde_json::to_value(ActivationState::default()).expect("serialize"), json!({}));
    }

    #[test]
    fn io_state_uses_camel_case_keys() {
        let state = ActivationState {
            io: Some(IoState {
                io_specification: Some(IoSpecificationState {
                    input: IndexMap::from([("input".to_string(), json!(1))]),
                }),
                form: Some(FormState {
                    form_key: Some("form1".into()),
                    fields: None,
                }),
                ..Default::default()
            }),
        };
        assert_eq!(
            serde_json::to_value(&state).expect("serialize"),
            json!({"io": {"ioSpecification": {"input": {"input": 1}}, "form": {"formKey": "form1"}}})
        );
    }
}

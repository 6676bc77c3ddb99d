//! Activation context and evaluation scope.
//!
//! An [`ActivationContext`] is assembled by the host for every activity run or loop iteration.
//! It is flattened into a [`Scope`], the single JSON object handed to expressions and scripts.
//! The scope then accumulates resolved values while parameters are evaluated in order.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identity of the activity that owns an activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentActivity {
    pub id: String,
}

impl ParentActivity {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Execution context bound to one activation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationContext {
    /// Process variables.
    #[serde(default = "empty_object")]
    pub variables: Value,
    /// Output of the previous sequential iteration, or the host's running output.
    #[serde(default)]
    pub output: Option<Value>,
    /// Current collection element in a loop iteration.
    #[serde(default)]
    pub item: Option<Value>,
    /// Zero-based loop iteration index.
    #[serde(default)]
    pub index: Option<usize>,
    #[serde(default)]
    pub is_loop_context: bool,
    #[serde(default)]
    pub parent_output: Option<Value>,
    /// Extra top-level name bound to `item`.
    #[serde(default)]
    pub element_variable: Option<String>,
    /// Additional top-level scope entries supplied by the host (services, helpers).
    #[serde(default, flatten)]
    pub extras: IndexMap<String, Value>,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

impl Default for ActivationContext {
    fn default() -> Self {
        Self {
            variables: empty_object(),
            output: None,
            item: None,
            index: None,
            is_loop_context: false,
            parent_output: None,
            element_variable: None,
            extras: IndexMap::new(),
        }
    }
}

impl ActivationContext {
    pub fn with_variables(variables: Value) -> Self {
        Self {
            variables,
            ..Default::default()
        }
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extras.insert(key.into(), value);
        self
    }

    /// Flattens the context into an evaluation scope.
    pub fn scope(&self) -> Scope {
        let mut scope = Scope::default();
        scope.insert("variables", self.variables.clone());
        if let Some(output) = &self.output {
            scope.insert("output", output.clone());
        }
        if let Some(item) = &self.item {
            scope.insert("item", item.clone());
        }
        if let Some(index) = self.index {
            scope.insert("index", Value::from(index));
        }
        scope.insert("isLoopContext", Value::Bool(self.is_loop_context));
        if let Some(parent_output) = &self.parent_output {
            scope.insert("parentOutput", parent_output.clone());
        }
        if let (Some(name), Some(item)) = (&self.element_variable, &self.item) {
            scope.insert(name.as_str(), item.clone());
        }
        for (key, value) in &self.extras {
            scope.insert(key.as_str(), value.clone());
        }
        scope
    }
}

/// JSON object used as the evaluation scope.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scope {
    entries: Map<String, Value>,
}

impl Scope {
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.entries.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Inserts every entry of `values`.
    pub fn extend<'a, I>(&mut self, values: I)
    where
        I: IntoIterator<Item = (&'a String, &'a Value)>,
    {
        for (key, value) in values {
            self.entries.insert(key.clone(), value.clone());
        }
    }

    /// Spreads the entries of `value` when it is an object; other values are ignored.
    pub fn spread(&mut self, value: &Value) {
        if let Value::Object(object) = value {
            self.extend(object);
        }
    }

    pub fn entries(&self) -> &Map<String, Value> {
        &self.entries
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.entries.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn loop_context_exposes_item_index_and_element_variable() {
        let context = ActivationContext {
            item: Some(json!(7)),
            index: Some(3),
            is_loop_context: true,
            element_variable: Some("inputVar".into()),
            ..ActivationContext::with_variables(json!({"list": [1, 2, 3, 7]}))
        };
        let scope = context.scope();
        assert_eq!(scope.get("item"), Some(&json!(7)));
        assert_eq!(scope.get("inputVar"), Some(&json!(7)));
        assert_eq!(scope.get("index"), Some(&json!(3)));
        assert_eq!(scope.get("isLoopContext"), Some(&json!(true)));
        assert_eq!(scope.get("variables"), Some(&json!({"list": [1, 2, 3, 7]})));
    }

    #[test]
    fn plain_context_omits_loop_entries() {
        let scope = ActivationContext::default().with_extra("services", json!({})).scope();
        assert!(scope.get("item").is_none());
        assert!(scope.get("index").is_none());
        assert_eq!(scope.get("isLoopContext"), Some(&json!(false)));
        assert_eq!(scope.get("services"), Some(&json!({})));
    }

    #[test]
    fn context_deserializes_host_extras() {
        let context: ActivationContext =
            serde_json::from_value(json!({"variables": {"input": 1}, "index": 2, "isLoopContext": true, "services": {}}))
                .expect("context");
        assert_eq!(context.index, Some(2));
        assert!(context.is_loop_context);
        assert_eq!(context.extras.get("services"), Some(&json!({})));
    }

    #[test]
    fn spread_ignores_non_objects() {
        let mut scope = Scope::default();
        scope.spread(&json!([1, 2]));
        assert!(scope.entries().is_empty());
        scope.spread(&json!({"api": "x"}));
        assert_eq!(scope.get("api"), Some(&json!("x")));
    }
}

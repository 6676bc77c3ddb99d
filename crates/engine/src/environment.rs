//! Shared collaborators handed to every activation.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

use crate::config::{EngineConfig, WritePolicy};
use crate::error::{ActivationError, ActivationResult};
use crate::resolve::{ExpressionResolver, TemplateResolver};
use crate::script::{ExpressionScriptRunner, ScriptRunner};

/// Process-level data objects shared by every activation of a process instance.
///
/// Clones share the same table. Writes are serialized through one lock; how repeated writes to
/// the same id are treated is decided by the store's [`WritePolicy`].
#[derive(Debug, Clone, Default)]
pub struct DataObjectStore {
    inner: Arc<Mutex<StoreState>>,
    policy: WritePolicy,
}

#[derive(Debug, Default)]
struct StoreState {
    values: IndexMap<String, Value>,
    written: HashSet<String>,
}

impl DataObjectStore {
    pub fn new(policy: WritePolicy) -> Self {
        Self {
            inner: Arc::default(),
            policy,
        }
    }

    /// Creates a store seeded with initial values. Seeding does not count as a write.
    pub fn with_values<I, K>(policy: WritePolicy, values: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let store = Self::new(policy);
        {
            let mut state = store.state();
            for (id, value) in values {
                state.values.insert(id.into(), value);
            }
        }
        store
    }

    pub fn policy(&self) -> WritePolicy {
        self.policy
    }

    pub fn get(&self, id: &str) -> Option<Value> {
        self.state().values.get(id).cloned()
    }

    pub fn set(&self, id: &str, value: Value) -> ActivationResult<()> {
        let mut state = self.state();
        if self.policy == WritePolicy::RejectOverwrite && state.written.contains(id) {
            return Err(ActivationError::WriteConflict {
                data_object_id: id.to_string(),
            });
        }
        debug!(data_object_id = %id, "data object written");
        state.written.insert(id.to_string());
        state.values.insert(id.to_string(), value);
        Ok(())
    }

    pub fn snapshot(&self) -> IndexMap<String, Value> {
        self.state().values.clone()
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Expression resolver, script runner, data objects and configuration for a process.
#[derive(Clone)]
pub struct Environment {
    config: Arc<EngineConfig>,
    resolver: Arc<dyn ExpressionResolver>,
    scripts: Arc<dyn ScriptRunner>,
    data_objects: DataObjectStore,
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Environment")
            .field("config", &self.config)
            .field("data_objects", &self.data_objects)
            .finish_non_exhaustive()
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Environment {
    pub fn new(config: EngineConfig) -> Self {
        let data_objects = DataObjectStore::new(config.write_policy);
        Self {
            config: Arc::new(config),
            resolver: Arc::new(TemplateResolver),
            scripts: Arc::new(ExpressionScriptRunner),
            data_objects,
        }
    }

    pub fn with_resolver(mut self, resolver: impl ExpressionResolver + 'static) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    pub fn with_script_runner(mut self, runner: impl ScriptRunner + 'static) -> Self {
        self.scripts = Arc::new(runner);
        self
    }

    pub fn with_data_objects(mut self, data_objects: DataObjectStore) -> Self {
        self.data_objects = data_objects;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn data_objects(&self) -> &DataObjectStore {
        &self.data_objects
    }

    /// Resolves an expression, mapping resolver failures to [`ActivationError::Expression`].
    pub fn resolve_expression(&self, expression: &str, scope: &Value) -> ActivationResult<Option<Value>> {
        self.resolver
            .resolve(expression, scope)
            .map_err(|error| ActivationError::expression(expression, error))
    }

    pub fn run_script(&self, parameter: &str, source: &str, scope: &Value) -> ActivationResult<Value> {
        self.scripts
            .run(source, scope)
            .map_err(|error| ActivationError::script(parameter, error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn last_write_wins_by_default() {
        let store = DataObjectStore::with_values(WritePolicy::LastWriteWins, [("surname", json!("von Rosen"))]);
        store.set("surname", json!("a")).expect("first write");
        store.set("surname", json!("b")).expect("second write");
        assert_eq!(store.get("surname"), Some(json!("b")));
    }

    #[test]
    fn reject_overwrite_surfaces_conflict() {
        let store = DataObjectStore::with_values(WritePolicy::RejectOverwrite, [("surname", json!("seed"))]);
        store.set("surname", json!("a")).expect("seeded value may be written once");
        let error = store.set("surname", json!("b")).expect_err("conflict");
        assert!(matches!(error, ActivationError::WriteConflict { ref data_object_id } if data_object_id == "surname"));
        assert_eq!(store.get("surname"), Some(json!("a")));
    }

    #[test]
    fn clones_share_the_table() {
        let store = DataObjectStore::default();
        let clone = store.clone();
        clone.set("id", json!(1)).expect("write");
        assert_eq!(store.snapshot().get("id"), Some(&json!(1)));
    }

    #[test]
    fn environment_maps_resolver_errors() {
        let environment = Environment::default().with_resolver(FailingResolver);
        let error = environment.resolve_expression("${boom}", &json!({})).expect_err("failure");
        assert!(matches!(error, ActivationError::Expression { .. }));
    }

    struct FailingResolver;

    impl ExpressionResolver for FailingResolver {
        fn resolve(&self, _expression: &str, _scope: &Value) -> anyhow::Result<Option<Value>> {
            anyhow::bail!("boom")
        }
    }
}

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bpmn_io_engine::{
    Activation, ActivationContext, ActivationError, ActivityExtensions, DataObjectStore, Environment, IterationExecutor, ParentActivity,
};
use bpmn_io_types::ActivityDeclaration;
use serde_json::{Value, json};

fn load(id: &str, environment: Environment) -> Arc<ActivityExtensions> {
    let fixture = include_str!("data/activities.yaml");
    let mut declarations: HashMap<String, ActivityDeclaration> = serde_yaml::from_str(fixture).expect("parse fixture");
    let declaration = declarations.remove(id).unwrap_or_else(|| panic!("fixture {id} present"));
    ActivityExtensions::load(&declaration, environment).expect("load extensions")
}

fn input_i64(activation: &Activation, name: &str) -> Option<i64> {
    activation.input().get(name).and_then(Value::as_i64)
}

/// Adds the item to the previous iteration's sum.
#[derive(Default)]
struct Summing {
    started: AtomicUsize,
}

#[async_trait]
impl IterationExecutor for Summing {
    async fn execute(&self, activation: &mut Activation) -> anyhow::Result<Value> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let previous = input_i64(activation, "previous").unwrap_or(0);
        let value = input_i64(activation, "value").unwrap_or_default();
        Ok(json!([previous + value]))
    }
}

#[tokio::test]
async fn sequential_loop_feeds_previous_output() {
    let extensions = load("sequentialLoop", Environment::default());
    let parent = ParentActivity::new("sequentialLoop");
    let executor = Summing::default();

    let outcome = extensions
        .run_loop(&parent, ActivationContext::with_variables(json!({"list": [1, 2, 3, 7]})), &executor)
        .await
        .expect("loop");

    assert_eq!(executor.started.load(Ordering::SeqCst), 4);
    assert_eq!(outcome.result(), json!([[1], [3], [6], [13]]));
    assert_eq!(outcome.outputs.last().and_then(|output| output.get("sum")), Some(&json!(13)));

    let sum_parent = load("sumParent", Environment::default());
    let mut activation = sum_parent
        .activate(&ParentActivity::new("sumParent"), ActivationContext::default())
        .expect("activate");
    activation.set_result(outcome.result());
    assert_eq!(activation.output().expect("output").get("sum"), Some(&json!(13)));
}

/// Later iterations finish first.
struct Staggered {
    iterations: usize,
}

#[async_trait]
impl IterationExecutor for Staggered {
    async fn execute(&self, activation: &mut Activation) -> anyhow::Result<Value> {
        let index = activation.context().index.unwrap_or_default();
        for _ in 0..(self.iterations - index) * 3 {
            tokio::task::yield_now().await;
        }
        Ok(activation.input().get("value").cloned().unwrap_or(Value::Null))
    }
}

#[tokio::test]
async fn parallel_loop_keeps_collection_order() {
    let extensions = load("parallelLoop", Environment::default());
    let parent = ParentActivity::new("parallelLoop");

    let outcome = extensions
        .run_loop(
            &parent,
            ActivationContext::with_variables(json!({"list": ["a", "b", "c", "d"]})),
            &Staggered { iterations: 4 },
        )
        .await
        .expect("loop");

    assert_eq!(outcome.result(), json!(["a", "b", "c", "d"]));
    assert_eq!(outcome.outputs.len(), 4);
}

#[test]
fn element_variable_is_bound_per_iteration() {
    let extensions = load("parallelLoop", Environment::default());
    let context = ActivationContext {
        item: Some(json!("b")),
        index: Some(1),
        is_loop_context: true,
        element_variable: Some("inputVar".into()),
        ..ActivationContext::default()
    };
    let activation = extensions.activate(&ParentActivity::new("parallelLoop"), context).expect("activate");
    assert_eq!(activation.input().get("value"), Some(&json!("b")));
}

struct GivenNames;

#[async_trait]
impl IterationExecutor for GivenNames {
    async fn execute(&self, activation: &mut Activation) -> anyhow::Result<Value> {
        let index = input_i64(activation, "index").ok_or_else(|| anyhow::anyhow!("index missing"))?;
        Ok(json!({"givenName": format!("Jr {index}")}))
    }
}

#[tokio::test]
async fn cardinality_loop_saves_one_array_per_data_object() {
    let store = DataObjectStore::default();
    let extensions = load("cardinalityLoop", Environment::default().with_data_objects(store.clone()));

    let outcome = extensions
        .run_loop(&ParentActivity::new("cardinalityLoop"), ActivationContext::default(), &GivenNames)
        .await
        .expect("loop");

    assert_eq!(outcome.results.len(), 3);
    assert_eq!(store.get("givenNameObject"), Some(json!(["Jr 0", "Jr 1", "Jr 2"])));
}

/// Assigns the form fields of every iteration and completes without a result.
struct FillForm;

#[async_trait]
impl IterationExecutor for FillForm {
    async fn execute(&self, activation: &mut Activation) -> anyhow::Result<Value> {
        let index = activation.context().index.ok_or_else(|| anyhow::anyhow!("index missing"))?;
        anyhow::ensure!(activation.set_field_value("givenName", json!(format!("Jr {index}"))), "givenName missing");
        anyhow::ensure!(activation.set_field_value("age", json!(index)), "age missing");
        Ok(Value::Null)
    }
}

#[tokio::test]
async fn form_fields_assigned_per_iteration_are_saved_on_loop_end() {
    let store = DataObjectStore::default();
    let extensions = load("formLoop", Environment::default().with_data_objects(store.clone()));

    let outcome = extensions
        .run_loop(&ParentActivity::new("formLoop"), ActivationContext::default(), &FillForm)
        .await
        .expect("loop");

    assert_eq!(outcome.outputs.len(), 2);
    assert_eq!(outcome.outputs[1].get("givenName"), Some(&json!("Jr 1")));
    assert_eq!(store.get("givenNameObject"), Some(json!(["Jr 0", "Jr 1"])));
    assert_eq!(store.get("ageObject"), Some(json!([0, 1])));
}

struct Failing;

#[async_trait]
impl IterationExecutor for Failing {
    async fn execute(&self, activation: &mut Activation) -> anyhow::Result<Value> {
        match activation.context().index {
            Some(2) => anyhow::bail!("service unavailable"),
            _ => Ok(Value::Null),
        }
    }
}

#[tokio::test]
async fn iteration_failure_stops_the_loop() {
    let extensions = load("sequentialLoop", Environment::default());
    let error = extensions
        .run_loop(
            &ParentActivity::new("sequentialLoop"),
            ActivationContext::with_variables(json!({"list": [1, 2, 3, 4]})),
            &Failing,
        )
        .await
        .expect_err("third iteration fails");
    assert!(matches!(error, ActivationError::Service { ref activity_id, .. } if activity_id == "sequentialLoop"));
}

#[tokio::test]
async fn empty_collection_runs_nothing() {
    let extensions = load("parallelLoop", Environment::default());
    let executor = Summing::default();
    let outcome = extensions
        .run_loop(
            &ParentActivity::new("parallelLoop"),
            ActivationContext::with_variables(json!({"list": []})),
            &executor,
        )
        .await
        .expect("loop");
    assert_eq!(executor.started.load(Ordering::SeqCst), 0);
    assert_eq!(outcome.result(), json!([]));
}

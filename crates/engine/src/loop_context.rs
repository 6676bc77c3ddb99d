//! Multi-instance loop iterations.
//!
//! A [`LoopActivationContext`] derives one [`ActivationContext`] per iteration from the base
//! context: `item` is the collection element, `index` the zero-based position and
//! `isLoopContext` is set. Each iteration gets a fresh activation, so iterations never share
//! field or parameter state.

use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use bpmn_io_types::LoopDeclaration;
use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, warn};

use crate::activity::{Activation, ActivityExtensions};
use crate::context::{ActivationContext, ParentActivity};
use crate::environment::Environment;
use crate::error::{ActivationError, ActivationResult};
use crate::input_output::to_object;

/// Performs the activity's work for one iteration and returns the raw outcome.
///
/// The activation is handed over mutably so form-bound iterations can assign their fields
/// before completing. The returned value goes through connector remapping before it is stored
/// as the iteration result.
#[async_trait]
pub trait IterationExecutor: Send + Sync {
    async fn execute(&self, activation: &mut Activation) -> anyhow::Result<Value>;
}

/// Per-iteration results and outputs, in collection order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoopOutcome {
    pub results: Vec<Value>,
    pub outputs: Vec<IndexMap<String, Value>>,
}

impl LoopOutcome {
    /// Ordered list of iteration results; set this as the parent activity's result.
    pub fn result(&self) -> Value {
        Value::Array(self.results.clone())
    }

    fn push(&mut self, iteration: IterationOutcome) {
        self.results.push(iteration.result);
        self.outputs.push(iteration.output);
    }
}

#[derive(Debug)]
struct IterationOutcome {
    result: Value,
    output: IndexMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoopActivationContext {
    base: ActivationContext,
    collection: Option<Vec<Value>>,
    element_variable: Option<String>,
    cardinality: Option<usize>,
}

impl LoopActivationContext {
    pub fn new(
        base: ActivationContext,
        collection: Option<Vec<Value>>,
        element_variable: Option<String>,
        cardinality: Option<usize>,
    ) -> Self {
        Self {
            base,
            collection,
            element_variable,
            cardinality,
        }
    }

    /// Resolves the collection expression against the base context.
    pub fn from_declaration(base: ActivationContext, characteristics: &LoopDeclaration, environment: &Environment) -> ActivationResult<Self> {
        let collection = match &characteristics.collection {
            Some(expression) => match environment.resolve_expression(expression, &base.scope().to_value())? {
                Some(Value::Array(items)) => Some(items),
                Some(other) => {
                    return Err(ActivationError::expression(
                        expression,
                        anyhow!("loop collection resolved to {other}, expected an array"),
                    ));
                }
                None => None,
            },
            None => None,
        };
        Ok(Self::new(
            base,
            collection,
            characteristics.element_variable.clone(),
            characteristics.cardinality,
        ))
    }

    /// Collection length, capped by the cardinality when both are present.
    pub fn iteration_count(&self) -> usize {
        match (&self.collection, self.cardinality) {
            (Some(collection), Some(cardinality)) => collection.len().min(cardinality),
            (Some(collection), None) => collection.len(),
            (None, Some(cardinality)) => cardinality,
            (None, None) => 0,
        }
    }

    /// Context of iteration `index`; `previous_output` is exposed as `output`.
    pub fn iteration(&self, index: usize, previous_output: Option<Value>) -> ActivationContext {
        let mut context = self.base.clone();
        context.item = self.collection.as_ref().and_then(|collection| collection.get(index).cloned());
        context.index = Some(index);
        context.is_loop_context = true;
        context.element_variable = self.element_variable.clone();
        if previous_output.is_some() {
            context.output = previous_output;
        }
        context
    }

    pub async fn run_sequential(
        &self,
        extensions: &Arc<ActivityExtensions>,
        parent: &ParentActivity,
        executor: &dyn IterationExecutor,
    ) -> ActivationResult<LoopOutcome> {
        let mut outcome = LoopOutcome::default();
        let mut previous_output = None;
        for index in 0..self.iteration_count() {
            let context = self.iteration(index, previous_output.take());
            let iteration = run_iteration(extensions, parent, index, context, executor).await?;
            previous_output = Some(to_object(&iteration.output));
            outcome.push(iteration);
        }
        Ok(outcome)
    }

    pub async fn run_parallel(
        &self,
        extensions: &Arc<ActivityExtensions>,
        parent: &ParentActivity,
        executor: &dyn IterationExecutor,
    ) -> ActivationResult<LoopOutcome> {
        let mut pending: FuturesUnordered<_> = (0..self.iteration_count())
            .map(|index| {
                let context = self.iteration(index, None);
                async move { (index, run_iteration(extensions, parent, index, context, executor).await) }
            })
            .collect();

        let mut completed = Vec::with_capacity(self.iteration_count());
        while let Some((index, iteration)) = pending.next().await {
            completed.push((index, iteration?));
        }
        completed.sort_by_key(|(index, _)| *index);

        let mut outcome = LoopOutcome::default();
        for (_, iteration) in completed {
            outcome.push(iteration);
        }
        Ok(outcome)
    }
}

async fn run_iteration(
    extensions: &Arc<ActivityExtensions>,
    parent: &ParentActivity,
    index: usize,
    context: ActivationContext,
    executor: &dyn IterationExecutor,
) -> ActivationResult<IterationOutcome> {
    let mut activation = extensions.activate(parent, context)?;
    debug!(activity_id = %parent.id, index, "loop iteration started");
    let raw = match executor.execute(&mut activation).await {
        Ok(raw) => raw,
        Err(error) => {
            warn!(activity_id = %parent.id, index, error = %error, "loop iteration failed");
            return Err(ActivationError::service(&parent.id, error));
        }
    };
    activation.apply_connector_result(raw)?;
    let output = activation.output()?;
    let result = activation.outcome().cloned().unwrap_or(Value::Null);
    Ok(IterationOutcome { result, output })
}

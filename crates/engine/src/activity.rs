//! Activity extensions and their activations.
//!
//! [`ActivityExtensions`] is compiled once per activity definition and shared behind an `Arc`.
//! Every activity run, and every loop iteration, calls [`ActivityExtensions::activate`] to get an
//! independent [`Activation`] bound to its own context.
//!
//! Input is resolved when the activation is created: ioSpecification ports first, then the
//! input parameters in declaration order, then the form fields, which see both. Output is
//! computed on demand and memoized until the result changes.

use std::sync::Arc;

use bpmn_io_types::{ActivationState, ActivityDeclaration, IoSpecificationState, IoState, LoopDeclaration};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::connector::Connector;
use crate::context::{ActivationContext, ParentActivity, Scope};
use crate::environment::Environment;
use crate::error::{ActivationError, ActivationResult};
use crate::form::{Form, FormDefinition, FormField};
use crate::input_output::{InputOutput, to_object};
use crate::io_specification::IoSpecification;
use crate::loop_context::{IterationExecutor, LoopActivationContext, LoopOutcome};
use crate::properties::Properties;

/// Compiled extension declaration of one activity.
#[derive(Debug)]
pub struct ActivityExtensions {
    id: String,
    environment: Environment,
    io: Option<InputOutput>,
    form: Option<FormDefinition>,
    io_specification: Option<IoSpecification>,
    properties: Properties,
    connector: Option<Connector>,
    loop_characteristics: Option<LoopDeclaration>,
    allow_return_input_context: bool,
}

impl ActivityExtensions {
    /// Compiles `declaration`, failing fast on declaration errors.
    pub fn load(declaration: &ActivityDeclaration, environment: Environment) -> ActivationResult<Arc<Self>> {
        let allow_return_input_context = environment.config().allow_return_input_context;
        Self::compile(declaration, environment, allow_return_input_context).map(Arc::new)
    }

    /// Loads a script task; without declared input parameters its input is the whole scope.
    pub fn load_script_task(declaration: &ActivityDeclaration, environment: Environment) -> ActivationResult<Arc<Self>> {
        Self::compile(declaration, environment, true).map(Arc::new)
    }

    fn compile(declaration: &ActivityDeclaration, environment: Environment, allow_return_input_context: bool) -> ActivationResult<Self> {
        let activity_id = declaration.id.as_str();
        let config = environment.config();

        let io = match (&declaration.input_output, &declaration.result_variable) {
            (Some(io), _) => Some(InputOutput::compile(activity_id, io, config)?),
            (None, Some(result_variable)) if !result_variable.trim().is_empty() => Some(InputOutput::for_result_variable(result_variable.trim())),
            _ => None,
        };
        let connector = declaration
            .connector
            .as_ref()
            .map(|connector| Connector::compile(activity_id, connector, config))
            .transpose()?;
        if let Some(characteristics) = &declaration.loop_characteristics
            && characteristics.collection.is_none()
            && characteristics.cardinality.is_none()
        {
            return Err(ActivationError::malformed(activity_id, "loop characteristics need a collection or a cardinality"));
        }

        debug!(
            activity_id = %activity_id,
            has_io = io.is_some(),
            has_connector = connector.is_some(),
            has_io_specification = declaration.io_specification.is_some(),
            "activity extensions loaded"
        );

        Ok(Self {
            id: declaration.id.clone(),
            io,
            form: FormDefinition::from_declaration(declaration),
            io_specification: declaration.io_specification.as_ref().map(IoSpecification::compile),
            properties: Properties::compile(&declaration.properties),
            connector,
            loop_characteristics: declaration.loop_characteristics.clone(),
            allow_return_input_context,
            environment,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn has_form(&self) -> bool {
        self.form.is_some()
    }

    pub fn connector(&self) -> Option<&Connector> {
        self.connector.as_ref()
    }

    pub fn loop_characteristics(&self) -> Option<&LoopDeclaration> {
        self.loop_characteristics.as_ref()
    }

    /// Binds the extensions to one execution context.
    pub fn activate(self: &Arc<Self>, parent: &ParentActivity, context: ActivationContext) -> ActivationResult<Activation> {
        let io_specification_input = match &self.io_specification {
            Some(io_specification) => io_specification.resolve_input(&context.scope(), self.environment.data_objects()),
            None => IndexMap::new(),
        };
        let mut activation = Activation {
            extensions: Arc::clone(self),
            parent: parent.clone(),
            context,
            io_specification_input,
            parameter_input: IndexMap::new(),
            input_scope: Scope::default(),
            form: None,
            result: None,
            output: None,
        };
        activation.resolve_input()?;
        activation.form = match &self.form {
            Some(form) => Some(form.build(&self.environment, activation.input_scope.clone())?),
            None => None,
        };

        debug!(
            activity_id = %parent.id,
            is_loop_context = activation.context.is_loop_context,
            index = ?activation.context.index,
            "activated"
        );
        Ok(activation)
    }

    /// Runs every loop iteration through `executor` and saves ioSpecification outputs.
    ///
    /// Sequential loops run in collection order and expose the previous iteration's output as
    /// `output`. Parallel loops start all iterations at once; the outcome is re-ordered by index.
    pub async fn run_loop(
        self: &Arc<Self>,
        parent: &ParentActivity,
        base: ActivationContext,
        executor: &dyn IterationExecutor,
    ) -> ActivationResult<LoopOutcome> {
        let Some(characteristics) = &self.loop_characteristics else {
            return Err(ActivationError::malformed(&self.id, "activity has no loop characteristics"));
        };
        let loop_context = LoopActivationContext::from_declaration(base, characteristics, &self.environment)?;
        info!(
            activity_id = %parent.id,
            iterations = loop_context.iteration_count(),
            is_sequential = characteristics.is_sequential,
            "loop started"
        );
        let outcome = if characteristics.is_sequential {
            loop_context.run_sequential(self, parent, executor).await?
        } else {
            loop_context.run_parallel(self, parent, executor).await?
        };
        if let Some(io_specification) = &self.io_specification {
            io_specification.save_loop(&outcome.outputs, self.environment.data_objects())?;
        }
        info!(activity_id = %parent.id, iterations = outcome.results.len(), "loop completed");
        Ok(outcome)
    }
}

/// Mutable, per-run binding of [`ActivityExtensions`] to an execution context.
#[derive(Debug, Clone)]
pub struct Activation {
    extensions: Arc<ActivityExtensions>,
    parent: ParentActivity,
    context: ActivationContext,
    io_specification_input: IndexMap<String, Value>,
    parameter_input: IndexMap<String, Value>,
    /// Context scope plus every resolved input; expressions of fields, properties, the
    /// connector and output parameters evaluate against it.
    input_scope: Scope,
    form: Option<Form>,
    result: Option<Value>,
    output: Option<IndexMap<String, Value>>,
}

impl Activation {
    pub fn parent(&self) -> &ParentActivity {
        &self.parent
    }

    pub fn context(&self) -> &ActivationContext {
        &self.context
    }

    /// Resolved input: ioSpecification ports, input parameters, then defined form values.
    pub fn input(&self) -> IndexMap<String, Value> {
        let mut input = self.io_specification_input.clone();
        input.extend(self.parameter_input.iter().map(|(key, value)| (key.clone(), value.clone())));
        if let Some(form) = &self.form {
            input.extend(form.input().into_iter().filter_map(|(id, value)| value.map(|value| (id, value))));
        }
        input
    }

    /// Output computed from the current result. Memoized until the result or a field changes.
    pub fn output(&mut self) -> ActivationResult<IndexMap<String, Value>> {
        if let Some(output) = &self.output {
            return Ok(output.clone());
        }

        let mut output = self.io_specification_output();
        if let Some(form) = &self.form {
            output.extend(form.output());
        }
        if let Some(io) = &self.extensions.io {
            let mut scope = self.input_scope.clone();
            if let Some(result) = &self.result {
                scope.insert("result", result.clone());
                scope.spread(result);
            }
            output.extend(io.resolve_output(&mut scope, &self.extensions.environment)?);
        }

        self.output = Some(output.clone());
        Ok(output)
    }

    /// Replaces the activity result.
    pub fn set_result(&mut self, result: Value) {
        self.result = Some(result);
        self.output = None;
    }

    /// Accumulates one named value into an object result.
    ///
    /// A result that is set but is not an object is replaced by a fresh object.
    pub fn set_output_value(&mut self, name: impl Into<String>, value: Value) {
        let result = self.result.get_or_insert_with(|| Value::Object(Map::new()));
        if !result.is_object() {
            debug!(activity_id = %self.parent.id, discarded = %result, "non-object result replaced by output value");
            *result = Value::Object(Map::new());
        }
        if let Value::Object(object) = result {
            object.insert(name.into(), value);
        }
        self.output = None;
    }

    /// Result as set by the host, after connector remapping.
    pub fn outcome(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    pub fn form(&self) -> Option<&Form> {
        self.form.as_ref()
    }

    pub fn form_mut(&mut self) -> Option<&mut Form> {
        self.output = None;
        self.form.as_mut()
    }

    pub fn field(&self, id: &str) -> Option<&FormField> {
        self.form.as_ref().and_then(|form| form.field(id))
    }

    pub fn fields(&self) -> Vec<FormField> {
        self.form.as_ref().map(Form::fields).unwrap_or_default()
    }

    pub fn field_value(&self, id: &str) -> Option<Value> {
        self.form.as_ref().and_then(|form| form.field_value(id))
    }

    /// Returns `false` for unknown fields and for activities without a form.
    pub fn set_field_value(&mut self, id: &str, value: Value) -> bool {
        let Some(form) = &mut self.form else {
            return false;
        };
        let assigned = form.set_field_value(id, value);
        if assigned {
            self.output = None;
        }
        assigned
    }

    pub fn properties(&self) -> ActivationResult<IndexMap<String, Value>> {
        self.extensions.properties.resolve(&self.input_scope, &self.extensions.environment)
    }

    /// Positional arguments for the activity's service call.
    ///
    /// Without a connector the single argument is the resolved input.
    pub fn connector_arguments(&self) -> ActivationResult<Vec<Value>> {
        match &self.extensions.connector {
            Some(connector) => connector.arguments(&self.input_scope, &self.extensions.environment),
            None => Ok(vec![to_object(&self.input())]),
        }
    }

    /// Stores a raw service outcome as the result, remapped through the connector when present.
    pub fn apply_connector_result(&mut self, raw: Value) -> ActivationResult<()> {
        let result = match &self.extensions.connector {
            Some(connector) => connector.remap(raw, &self.input_scope, &self.extensions.environment)?,
            None => raw,
        };
        self.set_result(result);
        Ok(())
    }

    pub fn state(&self) -> ActivationState {
        let io = IoState {
            io_specification: self.extensions.io_specification.as_ref().map(|_| IoSpecificationState {
                input: self.io_specification_input.clone(),
            }),
            form: self.form.as_ref().and_then(Form::state),
            form_key: None,
            result: self.result.clone(),
        };
        ActivationState {
            io: (!io.is_empty()).then_some(io),
        }
    }

    /// Restores a saved state. Parts the current declaration does not have are ignored.
    pub fn resume(&mut self, state: &ActivationState) -> ActivationResult<()> {
        let Some(io) = &state.io else {
            return Ok(());
        };
        debug!(activity_id = %self.parent.id, "resume");

        if self.extensions.io_specification.is_some()
            && let Some(saved) = &io.io_specification
        {
            self.io_specification_input = saved.input.clone();
            self.resolve_input()?;
            self.rebuild_form()?;
        }
        if let Some(form) = &mut self.form {
            let mut form_state = io.form.clone().unwrap_or_default();
            if form_state.form_key.is_none() {
                form_state.form_key = io.form_key.clone();
            }
            form.resume(&form_state);
        }
        if let Some(result) = &io.result {
            self.result = Some(result.clone());
        }
        self.output = None;
        Ok(())
    }

    /// Restores every form field to its default.
    pub fn reset(&mut self) -> ActivationResult<()> {
        if let Some(form) = &mut self.form {
            form.reset()?;
        }
        self.output = None;
        Ok(())
    }

    /// Writes associated ioSpecification outputs to the data-object store.
    pub fn save(&self) -> ActivationResult<()> {
        let Some(io_specification) = &self.extensions.io_specification else {
            return Ok(());
        };
        io_specification.save(&self.io_specification_output(), self.extensions.environment.data_objects())
    }

    /// Rebuilds the form against the current input scope, dropping assigned values.
    fn rebuild_form(&mut self) -> ActivationResult<()> {
        let extensions = Arc::clone(&self.extensions);
        self.form = match &extensions.form {
            Some(form) => Some(form.build(&extensions.environment, self.input_scope.clone())?),
            None => None,
        };
        Ok(())
    }

    fn resolve_input(&mut self) -> ActivationResult<()> {
        let environment = &self.extensions.environment;
        let mut scope = self.context.scope();
        scope.extend(&self.io_specification_input);
        self.parameter_input = match &self.extensions.io {
            Some(io) if io.has_input_parameters() => io.resolve_input(&mut scope, environment)?,
            _ if self.extensions.allow_return_input_context => {
                scope.entries().iter().map(|(key, value)| (key.clone(), value.clone())).collect()
            }
            _ => IndexMap::new(),
        };
        self.input_scope = scope;
        Ok(())
    }

    /// ioSpecification outputs picked from the result entries and the form output.
    fn io_specification_output(&self) -> IndexMap<String, Value> {
        let Some(io_specification) = &self.extensions.io_specification else {
            return IndexMap::new();
        };
        let mut source: IndexMap<String, Value> = match &self.result {
            Some(Value::Object(object)) => object.iter().map(|(key, value)| (key.clone(), value.clone())).collect(),
            _ => IndexMap::new(),
        };
        if let Some(form) = &self.form {
            source.extend(form.output());
        }
        io_specification.resolve_output(&source)
    }
}

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use bpmn_io_engine::{
    Activation, ActivationContext, ActivityExtensions, DataObjectStore, EngineConfig, Environment, IterationExecutor, ParentActivity,
    load_config, load_config_from_path,
};
use bpmn_io_types::{ActivationState, ActivityDeclaration};
use clap::{Args, Parser, Subcommand};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{Level, info};

#[derive(Debug, Parser)]
#[command(name = "bpmn-io", version, about = "Resolve activity input and output from extension declarations")]
struct Cli {
    /// Engine configuration file; falls back to BPMN_IO_CONFIG and the user config directory.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Compile a declaration and report declaration errors.
    Validate {
        #[arg(long, short = 'd')]
        declaration: PathBuf,
        #[arg(long)]
        script_task: bool,
    },
    /// Activate once and print input, output, properties and state.
    Resolve(ResolveArgs),
    /// Run every loop iteration, echoing each iteration's input as its result.
    Loop(ActivationArgs),
}

#[derive(Debug, Args)]
struct ActivationArgs {
    /// Activity declaration (YAML or JSON).
    #[arg(long, short = 'd')]
    declaration: PathBuf,
    /// Activation context; `{"variables": {...}}` and friends.
    #[arg(long, short = 'c')]
    context: Option<PathBuf>,
    /// Initial data-object values keyed by data object id.
    #[arg(long)]
    data_objects: Option<PathBuf>,
    /// Load as a script task.
    #[arg(long)]
    script_task: bool,
}

#[derive(Debug, Args)]
struct ResolveArgs {
    #[command(flatten)]
    activation: ActivationArgs,
    /// Result injected before output is computed.
    #[arg(long, short = 'r')]
    result: Option<PathBuf>,
    /// Saved state to resume from.
    #[arg(long, short = 's')]
    state: Option<PathBuf>,
    /// Write ioSpecification outputs to the data-object store and print it.
    #[arg(long)]
    save: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => load_config_from_path(path)?,
        None => load_config()?,
    };

    match cli.command {
        Command::Validate { declaration, script_task } => {
            let declaration: ActivityDeclaration = read_document(&declaration)?;
            load_extensions(&declaration, Environment::new(config), script_task)?;
            println!("{} is valid", declaration.id);
            Ok(())
        }
        Command::Resolve(args) => resolve(config, args),
        Command::Loop(args) => run_loop(config, args).await,
    }
}

fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::INFO)
        .with_writer(std::io::stderr)
        .try_init();
}

fn resolve(config: EngineConfig, args: ResolveArgs) -> Result<()> {
    let (extensions, parent, context) = prepare(config, &args.activation)?;
    let mut activation = extensions.activate(&parent, context)?;

    if let Some(path) = &args.state {
        let state: ActivationState = read_document(path)?;
        activation.resume(&state)?;
    }
    if let Some(path) = &args.result {
        let result: Value = read_document(path)?;
        activation.apply_connector_result(result)?;
    }

    let output = activation.output()?;
    let mut report = json!({
        "input": activation.input(),
        "output": output,
        "properties": activation.properties()?,
        "state": activation.state(),
    });
    if extensions.connector().is_some() {
        report["connectorArguments"] = Value::Array(activation.connector_arguments()?);
    }
    if args.save {
        activation.save()?;
        report["dataObjects"] = json!(extensions.environment().data_objects().snapshot());
    }
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Resolves nothing on its own; each iteration's result is its resolved input.
struct EchoInput;

#[async_trait]
impl IterationExecutor for EchoInput {
    async fn execute(&self, activation: &mut Activation) -> Result<Value> {
        Ok(json!(activation.input()))
    }
}

async fn run_loop(config: EngineConfig, args: ActivationArgs) -> Result<()> {
    let (extensions, parent, context) = prepare(config, &args)?;
    let outcome = extensions.run_loop(&parent, context, &EchoInput).await?;
    info!(activity_id = %parent.id, iterations = outcome.results.len(), "loop finished");

    let report = json!({
        "result": outcome.result(),
        "outputs": outcome.outputs,
        "dataObjects": extensions.environment().data_objects().snapshot(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn prepare(config: EngineConfig, args: &ActivationArgs) -> Result<(Arc<ActivityExtensions>, ParentActivity, ActivationContext)> {
    let declaration: ActivityDeclaration = read_document(&args.declaration)?;
    let data_objects = match &args.data_objects {
        Some(path) => read_document::<IndexMap<String, Value>>(path)?,
        None => IndexMap::new(),
    };
    let store = DataObjectStore::with_values(config.write_policy, data_objects);
    let environment = Environment::new(config).with_data_objects(store);
    let extensions = load_extensions(&declaration, environment, args.script_task)?;

    let context = match &args.context {
        Some(path) => read_document(path)?,
        None => ActivationContext::default(),
    };
    Ok((extensions, ParentActivity::new(declaration.id), context))
}

fn load_extensions(declaration: &ActivityDeclaration, environment: Environment, script_task: bool) -> Result<Arc<ActivityExtensions>> {
    let extensions = if script_task {
        ActivityExtensions::load_script_task(declaration, environment)
    } else {
        ActivityExtensions::load(declaration, environment)
    };
    extensions.with_context(|| format!("loading extensions of {}", declaration.id))
}

/// Reads JSON when the extension says so, YAML otherwise.
fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let is_json = path.extension().and_then(|extension| extension.to_str()) == Some("json");
    let parsed = if is_json {
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?
    } else {
        serde_yaml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?
    };
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::io::Write;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn documents_are_read_by_extension() {
        let mut yaml = tempfile::Builder::new().suffix(".yaml").tempfile().expect("tempfile");
        writeln!(yaml, "variables:\n  input: 1").expect("write");
        let context: ActivationContext = read_document(yaml.path()).expect("yaml");
        assert_eq!(context.variables, json!({"input": 1}));

        let mut json_file = tempfile::Builder::new().suffix(".json").tempfile().expect("tempfile");
        write!(json_file, r#"{{"id": "task"}}"#).expect("write");
        let declaration: ActivityDeclaration = read_document(json_file.path()).expect("json");
        assert_eq!(declaration.id, "task");
    }

    #[test]
    fn echo_input_loop_collects_items() {
        let runtime = tokio::runtime::Runtime::new().expect("runtime");
        let declaration: ActivityDeclaration = serde_yaml::from_str(
            "id: task\nloopCharacteristics:\n  isSequential: true\n  collection: ${variables.list}\ninputOutput:\n  inputParameters:\n    - name: item\n      value: ${item}\n",
        )
        .expect("declaration");
        let extensions = ActivityExtensions::load(&declaration, Environment::default()).expect("load");
        let outcome = runtime
            .block_on(extensions.run_loop(
                &ParentActivity::new("task"),
                ActivationContext::with_variables(json!({"list": ["a", "b"]})),
                &EchoInput,
            ))
            .expect("loop");
        assert_eq!(outcome.result(), json!([{"item": "a"}, {"item": "b"}]));
    }
}

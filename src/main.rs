use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sqlx::SqlitePool;
use sqlx::sqlite::SqliteConnectOptions;

use trellis_config::WorkflowDef;
use trellis_engine::WorkflowEngine;
use trellis_executor::{Collaborators, ExecutorRegistry};
use trellis_store::SqliteStore;

/// Trellis - a durable, resumable workflow engine
#[derive(Parser)]
#[command(name = "trellis")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.trellis)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Register a workflow definition from a JSON file
  Register {
    /// Path to the workflow definition file
    workflow_file: PathBuf,
  },

  /// Start a run of a registered workflow; the payload is read from stdin
  Start {
    /// Workflow name
    name: String,

    /// User id to record as the run's creator
    #[arg(long)]
    user: Option<String>,
  },

  /// Resume a suspended run; the resume data is read from stdin
  Resume {
    /// Workflow instance id
    instance_id: String,
  },

  /// Submit a form for a waiting form node; fields are read from stdin
  SubmitForm {
    /// Node instance id of the waiting form node
    node_instance_id: String,

    /// User id of the submitter
    #[arg(long)]
    user: Option<String>,
  },

  /// Record an approval decision
  Decide {
    /// Approval id
    approval_id: String,

    /// Record a rejection instead of an approval
    #[arg(long)]
    reject: bool,

    /// Optional comments
    #[arg(long)]
    comments: Option<String>,

    /// User id of the decider
    #[arg(long)]
    user: Option<String>,
  },

  /// Deliver a signed document to a waiting pdf node
  SubmitDocument {
    /// Node instance id of the waiting pdf node
    node_instance_id: String,

    /// URL of the signed document
    url: String,

    /// Email of the signer
    #[arg(long)]
    signer: Option<String>,
  },

  /// Show a run's status, node instances, and execution log
  Status {
    /// Workflow instance id
    instance_id: String,
  },
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .with_writer(io::stderr)
    .init();

  let cli = Cli::parse();

  let data_dir = cli.data_dir.unwrap_or_else(|| {
    dirs::home_dir()
      .expect("could not determine home directory")
      .join(".trellis")
  });

  let Some(command) = cli.command else {
    println!("trellis - use --help to see available commands");
    return Ok(());
  };

  let rt = tokio::runtime::Runtime::new()?;
  rt.block_on(async { run_command(command, data_dir).await })
}

async fn run_command(command: Commands, data_dir: PathBuf) -> Result<()> {
  let engine = open_engine(&data_dir).await?;

  match command {
    Commands::Register { workflow_file } => {
      let content = tokio::fs::read_to_string(&workflow_file)
        .await
        .with_context(|| format!("failed to read workflow file: {}", workflow_file.display()))?;
      let def: WorkflowDef = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse workflow file: {}", workflow_file.display()))?;

      let record = engine
        .register_workflow(def)
        .await
        .context("failed to register workflow")?;
      eprintln!("Registered workflow '{}' v{}", record.name, record.version);
      println!("{}", record.workflow_id);
    }

    Commands::Start { name, user } => {
      let payload = read_payload_from_stdin()?;
      let instance = engine
        .start_workflow(&name, payload, user.as_deref())
        .await
        .context("failed to start workflow")?;
      print_instance(&instance)?;
    }

    Commands::Resume { instance_id } => {
      let resume_data = read_payload_from_stdin()?;
      let instance = engine
        .continue_workflow(&instance_id, resume_data)
        .await
        .context("failed to resume workflow")?;
      print_instance(&instance)?;
    }

    Commands::SubmitForm {
      node_instance_id,
      user,
    } => {
      let submission = read_payload_from_stdin()?;
      let instance = engine
        .submit_form(&node_instance_id, submission, user.as_deref())
        .await
        .context("failed to submit form")?;
      print_instance(&instance)?;
    }

    Commands::Decide {
      approval_id,
      reject,
      comments,
      user,
    } => {
      let instance = engine
        .submit_approval_decision(&approval_id, !reject, comments.as_deref(), user.as_deref())
        .await
        .context("failed to record approval decision")?;
      print_instance(&instance)?;
    }

    Commands::SubmitDocument {
      node_instance_id,
      url,
      signer,
    } => {
      let instance = engine
        .submit_signed_document(&node_instance_id, &url, signer.as_deref())
        .await
        .context("failed to submit signed document")?;
      print_instance(&instance)?;
    }

    Commands::Status { instance_id } => {
      let status = engine
        .get_workflow_status(&instance_id)
        .await
        .context("failed to load workflow status")?;
      let output = serde_json::json!({
        "instance": status.instance,
        "nodes": status.nodes,
        "logs": status.logs,
      });
      println!("{}", serde_json::to_string_pretty(&output)?);
    }
  }

  Ok(())
}

async fn open_engine(data_dir: &PathBuf) -> Result<WorkflowEngine> {
  tokio::fs::create_dir_all(data_dir)
    .await
    .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;

  let db_path = data_dir.join("trellis.db");
  let options = SqliteConnectOptions::new()
    .filename(&db_path)
    .create_if_missing(true);
  let pool = SqlitePool::connect_with(options)
    .await
    .with_context(|| format!("failed to open database: {}", db_path.display()))?;

  let store = Arc::new(SqliteStore::new(pool));
  store.migrate().await.context("failed to run migrations")?;

  Ok(WorkflowEngine::new(
    store,
    ExecutorRegistry::standard(),
    Collaborators::logging(),
  ))
}

fn print_instance(instance: &trellis_store::WorkflowInstance) -> Result<()> {
  eprintln!(
    "Instance {}: {:?}, current node: {}",
    instance.instance_id,
    instance.status,
    instance.current_node_id.as_deref().unwrap_or("-")
  );
  println!("{}", serde_json::to_string_pretty(instance)?);
  Ok(())
}

fn read_payload_from_stdin() -> Result<serde_json::Value> {
  use std::io::IsTerminal;

  if io::stdin().is_terminal() {
    // No stdin pipe, use empty object
    Ok(serde_json::json!({}))
  } else {
    let mut input = String::new();
    io::stdin()
      .read_to_string(&mut input)
      .context("failed to read payload from stdin")?;
    if input.trim().is_empty() {
      Ok(serde_json::json!({}))
    } else {
      serde_json::from_str(input.trim()).context("payload must be valid JSON")
    }
  }
}

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use meridian_config::OrchestratorSettings;
use meridian_store::{SqliteStore, Store};

/// Meridian - multi-cloud workflow orchestration
#[derive(Parser)]
#[command(name = "meridian")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.meridian)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Inspect persisted workflows
  Workflows {
    #[command(subcommand)]
    action: WorkflowsAction,
  },

  /// Work with orchestrator settings files
  Config {
    #[command(subcommand)]
    action: ConfigAction,
  },
}

#[derive(Subcommand)]
enum WorkflowsAction {
  /// List every persisted workflow
  List,

  /// Print the snapshot of one workflow as JSON
  Show {
    /// The workflow ID
    workflow_id: String,
  },
}

#[derive(Subcommand)]
enum ConfigAction {
  /// Parse and validate a settings file
  Check {
    /// Path to the settings file (JSON)
    settings_file: PathBuf,
  },
}

fn main() -> Result<()> {
  tracing_subscriber::registry()
    .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
    .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
    .init();

  let cli = Cli::parse();

  let data_dir = match cli.data_dir {
    Some(dir) => dir,
    None => dirs::home_dir()
      .context("could not determine home directory")?
      .join(".meridian"),
  };

  let rt = tokio::runtime::Runtime::new()?;
  match cli.command {
    Some(Commands::Workflows { action }) => match action {
      WorkflowsAction::List => rt.block_on(list_workflows(&data_dir)),
      WorkflowsAction::Show { workflow_id } => {
        rt.block_on(show_workflow(&data_dir, &workflow_id))
      }
    },
    Some(Commands::Config { action }) => match action {
      ConfigAction::Check { settings_file } => rt.block_on(check_config(&settings_file)),
    },
    None => {
      println!("meridian - use --help to see available commands");
      Ok(())
    }
  }
}

async fn open_store(data_dir: &Path) -> Result<SqliteStore> {
  tokio::fs::create_dir_all(data_dir)
    .await
    .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;

  let path = data_dir.join("meridian.db");
  debug!(path = %path.display(), "opening workflow store");
  SqliteStore::open(&path)
    .await
    .with_context(|| format!("failed to open workflow store: {}", path.display()))
}

async fn list_workflows(data_dir: &Path) -> Result<()> {
  let store = open_store(data_dir).await?;
  let workflows = store
    .list_workflows()
    .await
    .context("failed to list workflows")?;

  if workflows.is_empty() {
    eprintln!("No workflows found");
    return Ok(());
  }

  for workflow in workflows {
    println!(
      "{}\tsites={}\tnodes={}\tstorage={}\tstitches={}\tupdated={}",
      workflow.workflow_id,
      workflow.sites.len(),
      workflow.node_count,
      workflow.storage_count,
      workflow.stitch_count,
      workflow.updated_at.to_rfc3339(),
    );
  }

  Ok(())
}

async fn show_workflow(data_dir: &Path, workflow_id: &str) -> Result<()> {
  let store = open_store(data_dir).await?;
  let snapshot = store
    .load_workflow(workflow_id)
    .await
    .with_context(|| format!("failed to load workflow: {workflow_id}"))?;

  println!("{}", serde_json::to_string_pretty(&snapshot)?);
  Ok(())
}

async fn check_config(settings_file: &Path) -> Result<()> {
  let content = tokio::fs::read_to_string(settings_file)
    .await
    .with_context(|| format!("failed to read settings file: {}", settings_file.display()))?;

  let settings = OrchestratorSettings::from_json_str(&content)
    .with_context(|| format!("invalid settings file: {}", settings_file.display()))?;

  eprintln!("Settings OK");
  eprintln!("  connecting site: {}", settings.connecting_site);
  eprintln!("  stitch ports: {}", settings.stitch_ports.len());
  eprintln!("  reconcile interval: {}s", settings.reconcile_interval_secs);
  eprintln!(
    "  teardown: {} rounds, {}ms apart",
    settings.teardown.max_rounds, settings.teardown.delay_ms
  );
  Ok(())
}

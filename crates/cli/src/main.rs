//! `agentflow` CLI entry-point.
//!
//! Available sub-commands:
//! - `serve`    — run the API, the trigger matcher, and the scheduler.
//! - `migrate`  — run pending database migrations.
//! - `validate` — check a workflow definition file and print its batches.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use bus::{InMemoryBus, MessageBus};
use db::models::CapabilityRow;
use db::{MemoryStore, PgStore, Store};
use engine::{ApprovalGate, EngineConfig, TriggerMatcher, WorkflowDefinition, WorkflowExecutor};
use sandbox::{CircuitBreaker, GuardedBackend, ProcessBackend};

#[derive(Parser)]
#[command(name = "agentflow", about = "Agent workflow orchestration engine", version)]
struct Cli {
    /// Engine configuration (TOML). Every setting has a default.
    #[arg(long, global = true, env = "AGENTFLOW_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the REST API, the trigger matcher and the scheduler.
    Serve {
        #[arg(long, env = "AGENTFLOW_BIND", default_value = "0.0.0.0:8080")]
        bind: String,
        /// Postgres URL; without it state is kept in memory.
        #[arg(long, env = "DATABASE_URL")]
        database_url: Option<String>,
        /// Directory holding the agent executables entry references point at.
        #[arg(long, env = "AGENTFLOW_AGENTS_DIR", default_value = "agents")]
        agents_dir: PathBuf,
        /// JSON array of capabilities to register on startup.
        #[arg(long)]
        capabilities: Option<PathBuf>,
    },
    /// Run pending database migrations.
    Migrate {
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
    },
    /// Validate a workflow definition JSON file.
    Validate {
        /// Path to the workflow JSON file.
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Serve { bind, database_url, agents_dir, capabilities } => {
            serve(config, &bind, database_url.as_deref(), agents_dir, capabilities.as_deref()).await
        }
        Command::Migrate { database_url } => {
            info!("Running migrations");
            let pool = db::pool::create_pool(&database_url, 2)
                .await
                .context("failed to connect to database")?;
            db::pool::run_migrations(&pool).await.context("migration failed")?;
            info!("Migrations applied successfully");
            Ok(())
        }
        Command::Validate { path } => validate(&path),
    }
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read config {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("invalid config {}", path.display()))
}

async fn serve(
    config: EngineConfig,
    bind: &str,
    database_url: Option<&str>,
    agents_dir: PathBuf,
    capabilities: Option<&Path>,
) -> Result<()> {
    let store: Arc<dyn Store> = match database_url {
        Some(url) => {
            let pool = db::pool::create_pool(url, 10)
                .await
                .context("failed to connect to database")?;
            Arc::new(PgStore::new(pool))
        }
        None => {
            warn!("DATABASE_URL not set; keeping state in memory");
            Arc::new(MemoryStore::new())
        }
    };

    if let Some(path) = capabilities {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read capabilities {}", path.display()))?;
        let rows: Vec<CapabilityRow> = serde_json::from_str(&text)
            .with_context(|| format!("invalid capabilities {}", path.display()))?;
        for row in rows {
            info!(agent = %row.agent_name, action = %row.action, "registering capability");
            store.register_capability(row).await?;
        }
    }

    let bus: Arc<dyn MessageBus> = Arc::new(InMemoryBus::new());
    let breaker = Arc::new(CircuitBreaker::new(config.breaker_config()));
    let backend = GuardedBackend::new(Arc::new(ProcessBackend::new(agents_dir)), breaker);
    let gate = ApprovalGate::new(store.clone(), bus.clone(), config.approval_config());
    let executor = Arc::new(WorkflowExecutor::new(
        store.clone(),
        backend,
        gate,
        config.executor_config(),
    ));
    let matcher = Arc::new(TriggerMatcher::new(
        store.clone(),
        bus.clone(),
        executor,
        config.trigger.subjects.clone(),
    ));

    let listener = tokio::spawn(Arc::clone(&matcher).listen());
    let state = api::AppState { store, bus, matcher };

    info!("Starting API server on {bind}");
    tokio::select! {
        served = api::serve(bind, state) => served.context("API server failed")?,
        listened = listener => match listened {
            Ok(Ok(())) => warn!("trigger listener stopped"),
            Ok(Err(e)) => return Err(e).context("trigger listener failed"),
            Err(e) => error!(error = %e, "trigger listener aborted"),
        },
    }
    Ok(())
}

fn validate(path: &Path) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read file {}", path.display()))?;
    let definition: WorkflowDefinition =
        serde_json::from_str(&content).context("invalid workflow definition")?;

    match definition.validate() {
        Ok(batches) => {
            println!("✅ Workflow '{}' is valid.", definition.name);
            for (index, batch) in batches.iter().enumerate() {
                println!("  batch {index}: {}", batch.join(", "));
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("❌ Validation failed: {e}");
            std::process::exit(1);
        }
    }
}

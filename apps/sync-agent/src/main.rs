use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::FmtSubscriber;

use pocketledger_core::sync::PendingChangeStoreTrait;
use pocketledger_storage_sqlite::{close_local_store, open_local_store};
use pocketledger_sync_agent::config::{AgentConfig, Args, Command};
use pocketledger_sync_agent::runtime::{local_status, AgentRuntime};

fn main() -> Result<()> {
    // A missing .env file is fine; real environment variables still apply.
    let _ = dotenvy::dotenv();
    let args = Args::parse();
    set_up_logger();

    let tokio_runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Could not create tokio runtime")?;

    let result = tokio_runtime.block_on(run_command(args));
    tokio_runtime.shutdown_timeout(tokio::time::Duration::from_secs(10));
    result
}

async fn run_command(args: Args) -> Result<()> {
    let config = AgentConfig::from(&args);

    let result = match args.command {
        Command::Run => run_agent(&config).await,
        Command::Drain => {
            let runtime = AgentRuntime::initialize(&config)?;
            let report = runtime.drain_now().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Command::Status => {
            let store = open_local_store(&config.data_dir_str())?;
            let status = local_status(&store)?;
            println!("{}", serde_json::to_string_pretty(&status)?);
            Ok(())
        }
        Command::Login { token } => {
            let token = token.trim();
            if token.is_empty() {
                anyhow::bail!("Token must not be empty");
            }
            open_local_store(&config.data_dir_str())?
                .credentials()
                .store(token);
            info!("Stored API token");
            Ok(())
        }
        Command::Logout => {
            open_local_store(&config.data_dir_str())?.credentials().clear();
            info!("Removed API token");
            Ok(())
        }
        Command::ClearQueue => {
            let store = open_local_store(&config.data_dir_str())?;
            let repository = store.sync_repository();
            let dropped = repository.pending_change_count()?;
            repository.clear_pending_changes().await?;
            info!("Dropped {} queued change(s)", dropped);
            Ok(())
        }
    };

    close_local_store();
    result
}

async fn run_agent(config: &AgentConfig) -> Result<()> {
    let runtime = AgentRuntime::initialize(config)?;
    if runtime.engine().credentials().load().is_none() {
        warn!("No API token stored; queued changes without one will wait for `login`");
    }

    runtime.start().await;
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Shutting down");
    runtime.stop().await;
    Ok(())
}

/// Configure logger to use ISO-8601, of which rfc3339 is a subset. Install
/// global collector configured based on RUST_LOG env var. Records from the
/// `log` facade used by the library crates are forwarded as well.
fn set_up_logger() {
    let installed = FmtSubscriber::builder()
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,hyper=warn,reqwest=warn")),
        )
        .with_thread_ids(true)
        .try_init();
    if installed.is_err() {
        eprintln!("Unable to set global default subscriber");
    }
}

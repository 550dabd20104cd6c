mod cli;
mod commands;
mod logging;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;

use omd_client::config::Settings;
use omd_client::session::SessionStore;
use omd_client::state::AppState;
use omd_client::storage::{FileLocalStore, LocalStore};

use cli::Cli;
use commands::{Context, Output};
use logging::LogConfig;

// OMD_* settings can live in a .env next to the binary's working directory
fn load_env() {
    let _ = dotenv::dotenv();
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    let settings = match &cli.config {
        Some(path) => Settings::load(Some(path.as_path()), |key| std::env::var(key).ok())?,
        None => Settings::new()?,
    };
    Ok(settings)
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    let cli = Cli::parse();

    let log_config = if cli.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::default()
    }
    .with_log_file(cli.log_file.clone());
    logging::init_logging(&log_config)?;

    let settings = load_settings(&cli)?;
    tracing::debug!("Using backend {} (schema {})", settings.backend.url, settings.backend.schema);

    let store: Arc<dyn LocalStore> = Arc::new(FileLocalStore::new()?);
    let state = AppState::new(&settings, store);

    let sessions = SessionStore::new()?;
    if let Some(session) = sessions.load()? {
        state.auth.restore(session);
    }

    // Ctrl-C cancels in-flight requests and uploads
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, cancelling");
            on_interrupt.cancel();
        }
    });

    let ctx = Context {
        state,
        sessions,
        out: Output { json: cli.json },
        cancel,
    };
    commands::run(&ctx, cli.command).await
}

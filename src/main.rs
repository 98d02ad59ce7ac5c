//! favcards is a CLI tool that turns saved translation favorites into Anki
//! notes.
//!
//! Every run:
//! 1. reads the favorites list with a saved session,
//! 2. skips favorites that already became notes,
//! 3. enriches the new ones with an LLM and adds them through AnkiConnect,
//! 4. records them as processed and removes them from the favorites list.

use anyhow::Result;
use clap::Parser;
use log::{LevelFilter, error, info};

use favcards::{
    RunOptions, RunSummary,
    config::Config,
    constants::{BATCH_LIMIT_ENV_NAME, DEFAULT_BATCH_LIMIT, LOG_LEVEL_ENV_NAME},
    logging, run_once,
    scrape::manual_login,
    wrapper::with_flashcard_app,
};

/// A CLI tool to turn saved translation favorites into flashcards
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[allow(clippy::struct_excessive_bools)]
struct Cli {
    /// Capture the favorites site session interactively and save it
    #[arg(long)]
    manual_login: bool,

    /// Process one batch and exit instead of repeating every interval
    #[arg(long)]
    once: bool,

    /// Maximum number of new favorites per batch
    #[arg(long, env = BATCH_LIMIT_ENV_NAME, default_value_t = DEFAULT_BATCH_LIMIT)]
    limit: usize,

    /// Log what would be added without touching Anki, the ID store or the favorites
    #[arg(long)]
    dry_run: bool,

    /// Read favorites from the local fixture file instead of the website
    #[arg(long)]
    skip_browser: bool,

    /// Start the flashcard application before the batch and quit it afterwards
    #[arg(long)]
    with_app: bool,

    /// Log level: error, warn, info, debug or trace
    #[arg(long, env = LOG_LEVEL_ENV_NAME, default_value = "info")]
    log_level: LevelFilter,
}

#[tokio::main]
async fn main() -> Result<()> {
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    logging::init(cli.log_level, &config.log_path)?;
    if let Ok(path) = dotenv {
        info!("Loaded environment from {}", path.display());
    }

    if cli.manual_login {
        return manual_login(&config).await.inspect_err(|e| error!("Login failed: {e:#}"));
    }

    let options = RunOptions {
        limit: cli.limit,
        dry_run: cli.dry_run,
        skip_browser: cli.skip_browser,
    };

    if cli.once {
        run_batch(&config, options, cli.with_app).await?;
        return Ok(());
    }

    info!(
        "Running continuously, one batch every {} minutes",
        config.run_interval.as_secs() / 60
    );
    loop {
        run_batch(&config, options, cli.with_app).await?;
        tokio::time::sleep(config.run_interval).await;
    }
}

async fn run_batch(config: &Config, options: RunOptions, with_app: bool) -> Result<RunSummary> {
    let job = || async move {
        run_once(config, options).await.map_err(|e| {
            error!("Run aborted: {e}");
            anyhow::Error::from(e)
        })
    };

    if with_app {
        with_flashcard_app(&config.app, job).await
    } else {
        job().await
    }
}

//! Brackets a run with the flashcard application: start it, give it time to
//! bring up the AnkiConnect add-on, run, then quit it without saving.

use anyhow::{Context, Result};
use log::{info, warn};
use std::future::Future;
use tokio::process::Command;

use crate::config::AppControl;

fn shell(command: &str) -> Command {
    let mut shell = Command::new("sh");
    shell.arg("-c").arg(command);
    shell
}

/// Starts the application, runs `job` after the warm-up delay and quits the
/// application again, whatever the job returned.
///
/// # Errors
///
/// Returns an error if the application cannot be started; otherwise the job's
/// own result is returned. A failing quit command is only logged.
pub async fn with_flashcard_app<F, Fut, T>(app: &AppControl, job: F) -> Result<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    info!("Starting flashcard application: {}", app.launch_command);
    let mut launched = shell(&app.launch_command)
        .spawn()
        .with_context(|| format!("Unable to run '{}'", app.launch_command))?;

    info!("Waiting {}s for the application to start", app.warmup.as_secs());
    tokio::time::sleep(app.warmup).await;

    if let Ok(Some(status)) = launched.try_wait()
        && !status.success()
    {
        warn!("Launch command exited with {status}");
    }

    info!("Running batch");
    let result = job().await;
    match &result {
        Ok(_) => info!("Batch finished"),
        Err(e) => warn!("Batch failed: {e:#}"),
    }

    info!("Quitting flashcard application: {}", app.quit_command);
    match shell(&app.quit_command).status().await {
        Ok(status) if status.success() => info!("Flashcard application closed"),
        Ok(status) => warn!("Quit command exited with {status}"),
        Err(e) => warn!("Unable to run '{}': {e}", app.quit_command),
    }

    result
}

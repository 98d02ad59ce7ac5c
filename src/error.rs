//! Error taxonomy of a batch run.
//!
//! [`RunError`] aborts the whole run and needs the operator's attention.
//! [`ItemFailure`] only affects one favorite item, which stays eligible for
//! the next run.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RunError {
    #[error("Authentication state not found at {path}; run `favcards --manual-login` to capture a new session")]
    AuthMissing { path: PathBuf },
    #[error("Authentication state at {path} is unusable ({reason}); run `favcards --manual-login` to capture a new session")]
    AuthInvalid { path: PathBuf, reason: String },
    #[error("Favorites session has expired; run `favcards --manual-login` to capture a new session")]
    AuthExpired,
    #[error("Favorites source unavailable: {0}")]
    SourceUnavailable(String),
    #[error("Processed-ID store failure: {0:#}")]
    Store(anyhow::Error),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RunError {
    /// Whether the operator has to repeat the interactive login.
    pub fn needs_login(&self) -> bool {
        matches!(
            self,
            Self::AuthMissing { .. } | Self::AuthInvalid { .. } | Self::AuthExpired
        )
    }
}

/// Per-item failure; the item is left unprocessed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ItemFailure {
    #[error("enrichment failed: {0}")]
    Enrichment(String),
    #[error("registration failed: {0}")]
    Registration(String),
}

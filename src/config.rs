//! Typed runtime configuration assembled from environment variables.
//!
//! Values come from a key lookup so the same code reads the process environment
//! (after `.env` has been loaded) and plain maps in tests.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use url::Url;

use crate::ItemKind;
use crate::constants::{
    ANKICONNECT_URL_ENV_NAME, AUTH_STATE_FILE, DATA_DIR_ENV_NAME, DEFAULT_ANKICONNECT_URL,
    DEFAULT_DATA_DIR, DEFAULT_DECK_NAME, DEFAULT_FAVORITES_URL, DEFAULT_LAUNCH_COMMAND,
    DEFAULT_MODEL, DEFAULT_NOTE_TYPE, DEFAULT_QUIT_COMMAND, DEFAULT_RUN_INTERVAL_MINUTES,
    DEFAULT_USER_AGENT, DEFAULT_WARMUP_SECS, FAVORITES_URL_ENV_NAME, FIXTURE_FILE,
    FIXTURE_PATH_ENV_NAME, LAUNCH_COMMAND_ENV_NAME, LOG_FILE, MODEL_API_KEY_ENV_NAME,
    MODEL_ENV_NAME, MODEL_RPM_ENV_NAME, PROCESSED_IDS_FILE, QUIT_COMMAND_ENV_NAME,
    RUN_INTERVAL_ENV_NAME, SELECTORS_FILE, SELECTORS_PATH_ENV_NAME, SENTENCE_DECK_ENV_NAME,
    SENTENCE_NOTE_TYPE_ENV_NAME, USER_AGENT_ENV_NAME, WARMUP_SECS_ENV_NAME, WORD_DECK_ENV_NAME,
    WORD_NOTE_TYPE_ENV_NAME,
};

/// Deck and note-type names per card kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CardTargets {
    pub word_deck: String,
    pub word_note_type: String,
    pub sentence_deck: String,
    pub sentence_note_type: String,
}

impl CardTargets {
    /// Returns `(deck, note type)` for the given card kind.
    pub fn for_kind(&self, kind: ItemKind) -> (&str, &str) {
        match kind {
            ItemKind::Word => (&self.word_deck, &self.word_note_type),
            ItemKind::Sentence => (&self.sentence_deck, &self.sentence_note_type),
        }
    }
}

impl Default for CardTargets {
    fn default() -> Self {
        Self {
            word_deck: DEFAULT_DECK_NAME.to_owned(),
            word_note_type: DEFAULT_NOTE_TYPE.to_owned(),
            sentence_deck: DEFAULT_DECK_NAME.to_owned(),
            sentence_note_type: DEFAULT_NOTE_TYPE.to_owned(),
        }
    }
}

/// Commands used to bracket a run with the flashcard application.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppControl {
    pub launch_command: String,
    pub quit_command: String,
    pub warmup: Duration,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub data_dir: PathBuf,
    pub auth_state_path: PathBuf,
    pub processed_ids_path: PathBuf,
    pub log_path: PathBuf,
    pub selectors_path: PathBuf,
    pub fixture_path: PathBuf,
    pub favorites_url: Url,
    pub user_agent: String,
    pub model: String,
    pub model_api_key: Option<String>,
    pub model_rpm: Option<u32>,
    pub ankiconnect_url: Url,
    pub targets: CardTargets,
    pub app: AppControl,
    pub run_interval: Duration,
}

impl Config {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to a value of the wrong shape
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    ///
    /// Unset and blank keys fall back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// * A URL variable is not a valid URL
    /// * A numeric variable is not a number
    /// * The run interval does not fit in a duration
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_owned());

        let data_dir = PathBuf::from(or(DATA_DIR_ENV_NAME, DEFAULT_DATA_DIR));
        let in_data_dir = |key: &str, file: &str| {
            get(key)
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir.join(file))
        };

        let run_interval_minutes: u64 = get(RUN_INTERVAL_ENV_NAME)
            .map(|value| parse_number(RUN_INTERVAL_ENV_NAME, &value))
            .transpose()?
            .unwrap_or(DEFAULT_RUN_INTERVAL_MINUTES);
        let run_interval_secs = run_interval_minutes
            .checked_mul(60)
            .with_context(|| format!("{RUN_INTERVAL_ENV_NAME} is too large: {run_interval_minutes}"))?;

        Ok(Self {
            auth_state_path: data_dir.join(AUTH_STATE_FILE),
            processed_ids_path: data_dir.join(PROCESSED_IDS_FILE),
            log_path: data_dir.join(LOG_FILE),
            selectors_path: in_data_dir(SELECTORS_PATH_ENV_NAME, SELECTORS_FILE),
            fixture_path: in_data_dir(FIXTURE_PATH_ENV_NAME, FIXTURE_FILE),
            favorites_url: parse_url(
                FAVORITES_URL_ENV_NAME,
                &or(FAVORITES_URL_ENV_NAME, DEFAULT_FAVORITES_URL),
            )?,
            user_agent: or(USER_AGENT_ENV_NAME, DEFAULT_USER_AGENT),
            model: or(MODEL_ENV_NAME, DEFAULT_MODEL),
            model_api_key: get(MODEL_API_KEY_ENV_NAME),
            model_rpm: get(MODEL_RPM_ENV_NAME)
                .map(|value| parse_number(MODEL_RPM_ENV_NAME, &value))
                .transpose()?,
            ankiconnect_url: parse_url(
                ANKICONNECT_URL_ENV_NAME,
                &or(ANKICONNECT_URL_ENV_NAME, DEFAULT_ANKICONNECT_URL),
            )?,
            targets: CardTargets {
                word_deck: or(WORD_DECK_ENV_NAME, DEFAULT_DECK_NAME),
                word_note_type: or(WORD_NOTE_TYPE_ENV_NAME, DEFAULT_NOTE_TYPE),
                sentence_deck: or(SENTENCE_DECK_ENV_NAME, DEFAULT_DECK_NAME),
                sentence_note_type: or(SENTENCE_NOTE_TYPE_ENV_NAME, DEFAULT_NOTE_TYPE),
            },
            app: AppControl {
                launch_command: or(LAUNCH_COMMAND_ENV_NAME, DEFAULT_LAUNCH_COMMAND),
                quit_command: or(QUIT_COMMAND_ENV_NAME, DEFAULT_QUIT_COMMAND),
                warmup: Duration::from_secs(
                    get(WARMUP_SECS_ENV_NAME)
                        .map(|value| parse_number(WARMUP_SECS_ENV_NAME, &value))
                        .transpose()?
                        .unwrap_or(DEFAULT_WARMUP_SECS),
                ),
            },
            run_interval: Duration::from_secs(run_interval_secs),
            data_dir,
        })
    }
}

fn parse_url(key: &str, value: &str) -> Result<Url> {
    Url::parse(value).with_context(|| format!("{key} is not a valid URL: {value}"))
}

fn parse_number<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("{key} is not a valid number: {value}"))
}

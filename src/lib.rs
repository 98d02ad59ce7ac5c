//! The favcards library moves saved translation favorites into a flashcard
//! collection: it reads the favorites list, enriches every new entry with an
//! LLM, registers the result as an Anki note and removes the entry from the
//! favorites list.

pub mod anki;
pub mod batch;
pub mod config;
pub mod constants;
pub mod enrich;
pub mod error;
pub mod logging;
pub mod scrape;
pub mod selectors;
pub mod storage;
pub mod wrapper;

/// Kind of card an entry becomes, as classified during enrichment.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum ItemKind {
    /// A word or short phrase
    Word,
    /// A complete sentence
    Sentence,
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Word => write!(formatter, "word"),
            Self::Sentence => write!(formatter, "sentence"),
        }
    }
}

/// Options of a single batch run.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct RunOptions {
    /// Maximum number of new favorites handled in one run
    pub limit: usize,
    /// Log intended registrations without touching Anki, the ID store or the source
    pub dry_run: bool,
    /// Read favorites from the local fixture instead of the website
    pub skip_browser: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            limit: constants::DEFAULT_BATCH_LIMIT,
            dry_run: false,
            skip_browser: false,
        }
    }
}

pub use anki::{AnkiConnect, CardRegistrar, NotePayload};
pub use batch::{BatchProcessor, ItemOutcome, RunSummary, run_once};
pub use enrich::{EnrichedCard, Enricher, LlmEnricher};
pub use error::{ItemFailure, RunError};
pub use scrape::{FavoriteItem, FavoritesSource, OfflineFavorites, WebFavorites};
pub use storage::{AuthState, ProcessedIds};

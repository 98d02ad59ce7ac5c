//! The batch module runs one pass over the favorites list: every new favorite
//! is enriched, registered as a note, recorded as processed and removed from
//! the list.
//!
//! A favorite is recorded as processed only after its note was added, and the
//! record is flushed before the favorite is deleted from the source, so an
//! interrupted run never produces a second card for the same favorite.

use log::{info, warn};
use std::collections::HashSet;
use std::fmt;

use crate::RunOptions;
use crate::anki::{AnkiConnect, CardRegistrar, NotePayload};
use crate::config::{CardTargets, Config};
use crate::enrich::{Enricher, LlmEnricher};
use crate::error::{ItemFailure, RunError};
use crate::scrape::{FavoriteItem, FavoritesSource, OfflineFavorites, WebFavorites};
use crate::storage::ProcessedIds;

/// What happened to a single favorite.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ItemOutcome {
    /// The note was added and the favorite recorded as processed
    Registered {
        note_id: u64,
        /// Whether the favorite was removed from the source as well
        source_deleted: bool,
    },
    /// Dry run: the note was built but not added
    Simulated,
    /// An earlier entry of the same run already covered this favorite
    AlreadyProcessed,
    /// The favorite was skipped and stays eligible for the next run
    Failed(ItemFailure),
}

/// Counters of a run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub fetched: usize,
    pub already_processed: usize,
    pub eligible: usize,
    /// Eligible favorites left for a later run because of the limit
    pub deferred: usize,
    pub registered: usize,
    pub simulated: usize,
    pub enrichment_failed: usize,
    pub registration_failed: usize,
    /// Registered favorites that could not be removed from the source
    pub deletion_failed: usize,
}

impl RunSummary {
    pub fn record(&mut self, outcome: &ItemOutcome) {
        match outcome {
            ItemOutcome::Registered { source_deleted, .. } => {
                self.registered += 1;
                if !source_deleted {
                    self.deletion_failed += 1;
                }
            }
            ItemOutcome::Simulated => self.simulated += 1,
            ItemOutcome::AlreadyProcessed => self.already_processed += 1,
            ItemOutcome::Failed(ItemFailure::Enrichment(_)) => self.enrichment_failed += 1,
            ItemOutcome::Failed(ItemFailure::Registration(_)) => self.registration_failed += 1,
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "fetched={} already_processed={} eligible={} deferred={} registered={} simulated={} enrichment_failed={} registration_failed={} deletion_failed={}",
            self.fetched,
            self.already_processed,
            self.eligible,
            self.deferred,
            self.registered,
            self.simulated,
            self.enrichment_failed,
            self.registration_failed,
            self.deletion_failed,
        )
    }
}

/// Runs a batch over the favorites of a source.
pub struct BatchProcessor<'a, S, E, R> {
    source: &'a mut S,
    enricher: &'a E,
    registrar: &'a R,
    store: &'a mut ProcessedIds,
    targets: &'a CardTargets,
    options: RunOptions,
    ready_decks: HashSet<String>,
}

impl<'a, S, E, R> BatchProcessor<'a, S, E, R>
where
    S: FavoritesSource,
    E: Enricher,
    R: CardRegistrar,
{
    pub fn new(
        source: &'a mut S,
        enricher: &'a E,
        registrar: &'a R,
        store: &'a mut ProcessedIds,
        targets: &'a CardTargets,
        options: RunOptions,
    ) -> Self {
        Self {
            source,
            enricher,
            registrar,
            store,
            targets,
            options,
            ready_decks: HashSet::new(),
        }
    }

    /// Processes up to `options.limit` new favorites in source order.
    ///
    /// # Errors
    ///
    /// Returns a [`RunError`] if the favorites cannot be read or the processed
    /// IDs cannot be saved; failures of single favorites are counted in the
    /// summary instead
    pub async fn run(&mut self) -> Result<RunSummary, RunError> {
        let mut summary = RunSummary::default();

        let favorites = self.source.fetch_favorites().await?;
        summary.fetched = favorites.len();

        let eligible: Vec<FavoriteItem> = favorites
            .into_iter()
            .filter(|item| !self.store.contains(&item.id))
            .collect();
        summary.already_processed = summary.fetched - eligible.len();
        summary.eligible = eligible.len();
        summary.deferred = eligible.len().saturating_sub(self.options.limit);

        info!(
            "Found {} new items to process ({} already processed)",
            summary.eligible, summary.already_processed
        );
        if summary.deferred > 0 {
            info!(
                "Limit of {} reached, leaving {} items for a later run",
                self.options.limit, summary.deferred
            );
        }

        let batch_len = summary.eligible - summary.deferred;
        for (index, item) in eligible.iter().take(self.options.limit).enumerate() {
            info!(
                "Processing item {}/{batch_len}: {} - {}",
                index + 1,
                item.text,
                item.translation
            );
            let outcome = self.process_item(item).await?;
            summary.record(&outcome);
        }

        self.store.flush().map_err(RunError::Store)?;

        info!("Run finished: {summary}");
        Ok(summary)
    }

    async fn process_item(&mut self, item: &FavoriteItem) -> Result<ItemOutcome, RunError> {
        if self.store.contains(&item.id) {
            info!("Item {} was covered earlier in this run, skipping", item.id);
            return Ok(ItemOutcome::AlreadyProcessed);
        }

        let card = match self.enricher.enrich(item).await {
            Ok(card) => card,
            Err(e) => return Ok(skip(item, ItemFailure::Enrichment(format!("{e:#}")))),
        };
        let note = NotePayload::from_card(&card, self.targets);

        if self.options.dry_run {
            info!(
                "DRY RUN - {} note (deck: {}, model: {}): {:?}",
                card.kind(),
                note.deck_name,
                note.model_name,
                note.fields
            );
            info!("DRY RUN - would mark {} as processed and delete it", item.id);
            return Ok(ItemOutcome::Simulated);
        }

        self.ensure_deck(&note.deck_name).await;

        let note_id = match self.registrar.add_note(&note).await {
            Ok(note_id) => note_id,
            Err(e) => return Ok(skip(item, ItemFailure::Registration(format!("{e:#}")))),
        };
        info!("Added note {note_id} for '{}'", item.text);

        self.store.insert(&item.id);
        self.store.flush().map_err(RunError::Store)?;

        let source_deleted = match self.source.delete_favorite(item).await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    "Note {note_id} added but favorite '{}' could not be deleted: {e:#}",
                    item.text
                );
                false
            }
        };

        Ok(ItemOutcome::Registered {
            note_id,
            source_deleted,
        })
    }

    async fn ensure_deck(&mut self, deck: &str) {
        if self.ready_decks.contains(deck) {
            return;
        }

        match self.registrar.ensure_deck(deck).await {
            Ok(()) => {
                self.ready_decks.insert(deck.to_owned());
            }
            Err(e) => warn!("Unable to ensure deck '{deck}': {e:#}"),
        }
    }
}

fn skip(item: &FavoriteItem, failure: ItemFailure) -> ItemOutcome {
    warn!("Skipping '{}' ({}): {failure}", item.text, item.id);
    ItemOutcome::Failed(failure)
}

/// Runs a single batch with the collaborators described by the configuration.
///
/// The processed IDs and the saved session are checked before any enrichment
/// or registration service is contacted.
///
/// # Errors
///
/// Returns a [`RunError`] for anything that aborts the run, see
/// [`BatchProcessor::run`]
pub async fn run_once(config: &Config, options: RunOptions) -> Result<RunSummary, RunError> {
    info!("Starting a single run (limit {}, dry run {})", options.limit, options.dry_run);

    let mut store = ProcessedIds::load(&config.processed_ids_path).map_err(RunError::Store)?;
    info!("Loaded {} already processed items", store.len());

    if options.skip_browser {
        let mut source = OfflineFavorites::new(&config.fixture_path);
        run_with_source(config, options, &mut source, &mut store).await
    } else {
        let mut source = WebFavorites::new(config)?;
        run_with_source(config, options, &mut source, &mut store).await
    }
}

async fn run_with_source<S: FavoritesSource>(
    config: &Config,
    options: RunOptions,
    source: &mut S,
    store: &mut ProcessedIds,
) -> Result<RunSummary, RunError> {
    let enricher = LlmEnricher::from_config(config)?;
    let registrar = AnkiConnect::new(config.ankiconnect_url.clone())
        .map_err(|e| RunError::Config(format!("{e:#}")))?;

    if !options.dry_run {
        match registrar.version().await {
            Ok(version) => info!("AnkiConnect reachable (API version {version})"),
            Err(e) => warn!("AnkiConnect is not answering, registrations will fail: {e:#}"),
        }
    }

    BatchProcessor::new(source, &enricher, &registrar, store, &config.targets, options)
        .run()
        .await
}

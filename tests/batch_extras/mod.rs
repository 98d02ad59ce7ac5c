use std::cell::RefCell;
use std::collections::HashSet;

use favcards::{
    BatchProcessor, CardRegistrar, EnrichedCard, Enricher, FavoriteItem, FavoritesSource,
    NotePayload, ProcessedIds, RunError, RunOptions, RunSummary,
    config::CardTargets,
    enrich::{SentenceCard, WordCard},
};

/// Favorites list kept in memory; deleted entries disappear from later fetches.
#[derive(Default)]
pub(crate) struct StubSource {
    pub items: Vec<FavoriteItem>,
    pub failing_deletes: HashSet<String>,
    pub deleted: Vec<String>,
}

impl StubSource {
    pub fn new(items: Vec<FavoriteItem>) -> Self {
        StubSource {
            items,
            ..Default::default()
        }
    }
}

impl FavoritesSource for StubSource {
    async fn fetch_favorites(&mut self) -> Result<Vec<FavoriteItem>, RunError> {
        Ok(self.items.clone())
    }

    async fn delete_favorite(&mut self, item: &FavoriteItem) -> anyhow::Result<()> {
        if self.failing_deletes.contains(&item.id) {
            anyhow::bail!("delete control not found");
        }
        self.deleted.push(item.id.clone());
        self.items.retain(|listed| listed.id != item.id);
        Ok(())
    }
}

/// Enriches texts containing a space as sentences and everything else as words.
#[derive(Default)]
pub(crate) struct StubEnricher {
    pub failing: HashSet<String>,
    pub calls: RefCell<Vec<String>>,
}

impl Enricher for StubEnricher {
    async fn enrich(&self, item: &FavoriteItem) -> anyhow::Result<EnrichedCard> {
        self.calls.borrow_mut().push(item.id.clone());
        if self.failing.contains(&item.id) {
            anyhow::bail!("LLM error: quota exceeded.");
        }

        Ok(if item.text.contains(' ') {
            EnrichedCard::Sentence(SentenceCard {
                english_sentence: item.text.clone(),
                japanese_sentence: item.translation.clone(),
            })
        } else {
            EnrichedCard::Word(WordCard {
                english_word: item.text.clone(),
                example_sentence: format!("I like the word {}.", item.text),
                japanese_meaning: item.translation.clone(),
                example_translation: format!("{}という言葉が好きです。", item.translation),
            })
        })
    }
}

/// Accepts notes unless one of their field values is listed in `failing`.
#[derive(Default)]
pub(crate) struct StubRegistrar {
    pub failing: HashSet<String>,
    pub notes: RefCell<Vec<NotePayload>>,
    pub decks: RefCell<Vec<String>>,
}

impl CardRegistrar for StubRegistrar {
    async fn ensure_deck(&self, deck: &str) -> anyhow::Result<()> {
        self.decks.borrow_mut().push(deck.to_owned());
        Ok(())
    }

    async fn add_note(&self, note: &NotePayload) -> anyhow::Result<u64> {
        if note.fields.values().any(|value| self.failing.contains(value)) {
            anyhow::bail!("AnkiConnect error for action 'addNote': model was not found");
        }
        let mut notes = self.notes.borrow_mut();
        notes.push(note.clone());
        Ok(1000 + notes.len() as u64)
    }
}

pub(crate) fn favorites(texts: &[&str]) -> Vec<FavoriteItem> {
    texts
        .iter()
        .map(|text| FavoriteItem::new(*text, format!("{text}の訳")))
        .collect()
}

pub(crate) fn options(limit: usize, dry_run: bool) -> RunOptions {
    RunOptions {
        limit,
        dry_run,
        skip_browser: false,
    }
}

pub(crate) async fn run_batch(
    source: &mut StubSource,
    enricher: &StubEnricher,
    registrar: &StubRegistrar,
    store: &mut ProcessedIds,
    options: RunOptions,
) -> Result<RunSummary, RunError> {
    let targets = CardTargets {
        word_deck: "Vocabulary".to_owned(),
        word_note_type: "Vocab".to_owned(),
        sentence_deck: "Sentences".to_owned(),
        sentence_note_type: "Basic".to_owned(),
    };
    BatchProcessor::new(source, enricher, registrar, store, &targets, options)
        .run()
        .await
}

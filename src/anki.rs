//! Client for the AnkiConnect add-on, which exposes the local Anki collection
//! over JSON-over-HTTP.

use anyhow::{Context, Result};
use log::{debug, info};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;

use crate::config::CardTargets;
use crate::constants::{
    ANKICONNECT_TIMEOUT_SECS, ANKICONNECT_VERSION, SENTENCE_BACK_FIELD, SENTENCE_FRONT_FIELD,
    WORD_AUDIO_FIELD, WORD_EXAMPLE_AUDIO_FIELD, WORD_EXAMPLE_FIELD, WORD_EXAMPLE_MEANING_FIELD,
    WORD_FIELD, WORD_MEANING_FIELD,
};
use crate::enrich::EnrichedCard;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteOptions {
    pub allow_duplicate: bool,
}

/// A note as AnkiConnect's `addNote` expects it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotePayload {
    pub deck_name: String,
    pub model_name: String,
    pub fields: BTreeMap<String, String>,
    pub options: NoteOptions,
}

impl NotePayload {
    /// Builds the note for enriched content, picking deck and note type by kind.
    pub fn from_card(card: &EnrichedCard, targets: &CardTargets) -> Self {
        let (deck_name, model_name) = targets.for_kind(card.kind());

        let fields: Vec<(&str, &str)> = match card {
            EnrichedCard::Word(word) => vec![
                (WORD_FIELD, word.english_word.as_str()),
                (WORD_EXAMPLE_FIELD, word.example_sentence.as_str()),
                (WORD_MEANING_FIELD, word.japanese_meaning.as_str()),
                (WORD_EXAMPLE_MEANING_FIELD, word.example_translation.as_str()),
                (WORD_AUDIO_FIELD, ""),
                (WORD_EXAMPLE_AUDIO_FIELD, ""),
            ],
            EnrichedCard::Sentence(sentence) => vec![
                (SENTENCE_FRONT_FIELD, sentence.japanese_sentence.as_str()),
                (SENTENCE_BACK_FIELD, sentence.english_sentence.as_str()),
            ],
        };

        Self {
            deck_name: deck_name.to_owned(),
            model_name: model_name.to_owned(),
            fields: fields
                .into_iter()
                .map(|(name, value)| (name.to_owned(), value.to_owned()))
                .collect(),
            options: NoteOptions {
                allow_duplicate: true,
            },
        }
    }
}

/// Something that can create cards.
#[allow(async_fn_in_trait)]
pub trait CardRegistrar {
    /// Creates the deck if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the deck cannot be created
    async fn ensure_deck(&self, deck: &str) -> Result<()>;

    /// Adds a note and returns its ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the note is rejected or no ID comes back
    async fn add_note(&self, note: &NotePayload) -> Result<u64>;
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    result: Option<T>,
    error: Option<String>,
}

/// AnkiConnect endpoint of a running Anki.
pub struct AnkiConnect {
    client: reqwest::Client,
    endpoint: Url,
}

impl AnkiConnect {
    /// Creates a client for the add-on listening at the specified URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built
    pub fn new(endpoint: Url) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(ANKICONNECT_TIMEOUT_SECS))
            .build()
            .context("Unable to build HTTP client")?;

        Ok(Self { client, endpoint })
    }

    async fn invoke<T: DeserializeOwned>(
        &self,
        action: &str,
        params: Option<serde_json::Value>,
    ) -> Result<Option<T>> {
        let mut body = serde_json::Map::new();
        body.insert("action".to_owned(), action.into());
        body.insert("version".to_owned(), ANKICONNECT_VERSION.into());
        if let Some(params) = params {
            body.insert("params".to_owned(), params);
        }

        let response: ApiResponse<T> = self
            .client
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await
            .with_context(|| format!("AnkiConnect unreachable at {}", self.endpoint))?
            .error_for_status()
            .with_context(|| format!("AnkiConnect rejected action '{action}'"))?
            .json()
            .await
            .with_context(|| format!("Invalid AnkiConnect response for action '{action}'"))?;

        if let Some(error) = response.error {
            anyhow::bail!("AnkiConnect error for action '{action}': {error}");
        }

        Ok(response.result)
    }

    /// Returns the add-on's API version; useful as a reachability check.
    ///
    /// # Errors
    ///
    /// Returns an error if the add-on cannot be reached
    pub async fn version(&self) -> Result<u32> {
        self.invoke("version", None)
            .await?
            .context("AnkiConnect returned no version")
    }
}

impl CardRegistrar for AnkiConnect {
    async fn ensure_deck(&self, deck: &str) -> Result<()> {
        let deck_id: Option<u64> = self
            .invoke("createDeck", Some(serde_json::json!({ "deck": deck })))
            .await?;
        debug!("Deck '{deck}' ready (ID: {deck_id:?})");
        Ok(())
    }

    async fn add_note(&self, note: &NotePayload) -> Result<u64> {
        info!(
            "Adding note to AnkiConnect: deck='{}', model='{}'",
            note.deck_name, note.model_name
        );

        let note_id = self
            .invoke::<u64>("addNote", Some(serde_json::json!({ "note": note })))
            .await?
            .context("AnkiConnect returned no ID for the added note")?;

        info!("Added note {note_id}");
        Ok(note_id)
    }
}

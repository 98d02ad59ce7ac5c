//! The enrich module turns a raw favorite into card content with an LLM model:
//! it decides whether the text is a word or a sentence and fills in meaning,
//! example and translations.

use anyhow::{Context, Result};
use llm::LLMProvider;
use llm::builder::{LLMBackend, LLMBuilder};
use llm::chat::{ChatMessage, ChatProvider};
use log::{debug, info};
use once_cell::sync::Lazy;
use rate_guard::{RateLimit, StdTokenBucket, TokenBucketBuilder};
use regex::Regex;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

use crate::ItemKind;
use crate::config::Config;
use crate::constants::{
    CODE_FENCE_STRIPPER, ENRICH_PROMPT_TEMPLATE, MODEL_API_KEY_ENV_NAME, THINK_STRIPPER,
};
use crate::error::RunError;
use crate::scrape::FavoriteItem;

static THINK_STRIPPER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(THINK_STRIPPER).expect("Failed to compile THINK_STRIPPER regex"));

static CODE_FENCE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(CODE_FENCE_STRIPPER).expect("Failed to compile CODE_FENCE_STRIPPER regex")
});

/// Card content for a word or phrase.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct WordCard {
    pub english_word: String,
    pub example_sentence: String,
    pub japanese_meaning: String,
    pub example_translation: String,
}

/// Card content for a complete sentence.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct SentenceCard {
    pub english_sentence: String,
    pub japanese_sentence: String,
}

/// Enriched content of a favorite, in the shape the model is asked to answer with:
/// `{"type": "word" | "sentence", "data": {...}}`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum EnrichedCard {
    Word(WordCard),
    Sentence(SentenceCard),
}

impl EnrichedCard {
    pub fn kind(&self) -> ItemKind {
        match self {
            Self::Word(_) => ItemKind::Word,
            Self::Sentence(_) => ItemKind::Sentence,
        }
    }

    /// Field names and values, in answer order.
    fn fields(&self) -> Vec<(&'static str, &str)> {
        match self {
            Self::Word(word) => vec![
                ("english_word", word.english_word.as_str()),
                ("example_sentence", word.example_sentence.as_str()),
                ("japanese_meaning", word.japanese_meaning.as_str()),
                ("example_translation", word.example_translation.as_str()),
            ],
            Self::Sentence(sentence) => vec![
                ("english_sentence", sentence.english_sentence.as_str()),
                ("japanese_sentence", sentence.japanese_sentence.as_str()),
            ],
        }
    }
}

/// Something that can enrich a favorite into card content.
#[allow(async_fn_in_trait)]
pub trait Enricher {
    /// Enriches a single favorite.
    ///
    /// # Errors
    ///
    /// Returns an error if the service fails or answers with unusable content
    async fn enrich(&self, item: &FavoriteItem) -> Result<EnrichedCard>;
}

/// Shared data for enrichment requests
pub struct EnrichContext<'a> {
    /// LLM model to ask
    pub model: &'a dyn ChatProvider,
    /// Rate limiter for controlling request frequency
    pub rate_limiter: Option<&'a StdTokenBucket>,
}

/// Enricher backed by an `llm` model.
pub struct LlmEnricher {
    model: Box<dyn LLMProvider>,
    rate_limiter: Option<StdTokenBucket>,
}

impl LlmEnricher {
    /// Builds the model named by the configuration.
    ///
    /// The model is given as `backend://model`, e.g. `google://gemini-2.0-flash`.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Config`] if the model URL is invalid, the API key is
    /// missing or the model fails to build
    pub fn from_config(config: &Config) -> Result<Self, RunError> {
        let api_key = config.model_api_key.clone().ok_or_else(|| {
            RunError::Config(format!("{MODEL_API_KEY_ENV_NAME} is not set"))
        })?;

        let model = build_model(&config.model, api_key)
            .map_err(|e| RunError::Config(format!("{e:#}")))?;
        info!("Using enrichment model {}", config.model);

        Ok(Self {
            model,
            rate_limiter: config.model_rpm.and_then(rate_limiter),
        })
    }
}

impl Enricher for LlmEnricher {
    async fn enrich(&self, item: &FavoriteItem) -> Result<EnrichedCard> {
        let ctx = EnrichContext {
            model: self.model.as_ref(),
            rate_limiter: self.rate_limiter.as_ref(),
        };
        enrich_item(item, &ctx).await
    }
}

fn build_model(model: &str, api_key: String) -> Result<Box<dyn LLMProvider>> {
    let model_url = Url::parse(model).map_err(|e| anyhow::anyhow!("Invalid model URL: {}", e))?;

    LLMBuilder::new()
        .backend(
            LLMBackend::from_str(model_url.scheme())
                .map_err(|e| anyhow::anyhow!("Invalid LLM backend: {}", e))?,
        )
        .model(
            [
                model_url
                    .host_str()
                    .context("Specify model name as host URL.")?,
                model_url.username(),
            ]
            .iter()
            .filter(|x| !x.is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join(":"),
        )
        .api_key(api_key)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build LLM model: {}", e))
}

fn rate_limiter(rpm: u32) -> Option<StdTokenBucket> {
    let capacity = u64::from(rpm.max(1));
    let refill_interval = Duration::from_secs_f64(60.0 / capacity as f64);

    TokenBucketBuilder::builder()
        .capacity(capacity)
        .refill_amount(1_u64)
        .refill_every(refill_interval)
        .with_time(rate_guard::StdTimeSource::new())
        .with_precision::<rate_guard::Nanos>()
        .build()
        .ok()
}

/// Enriches a single favorite by asking the model and parsing its answer.
///
/// # Arguments
///
/// * `item` - The favorite to enrich
/// * `ctx` - Context containing model and rate limiter
///
/// # Errors
///
/// Returns an error if:
/// * LLM chat operation fails
/// * The answer is not a complete card, see [`parse_enrichment`]
pub async fn enrich_item(item: &FavoriteItem, ctx: &EnrichContext<'_>) -> Result<EnrichedCard> {
    let prompt = ENRICH_PROMPT_TEMPLATE
        .replace("{text}", &item.text)
        .replace("{translation}", &item.translation);
    let messages = vec![ChatMessage::user().content(prompt).build()];

    if let Some(limiter) = ctx.rate_limiter {
        while limiter.try_acquire(1).is_err() {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    let response = ctx
        .model
        .chat(&messages)
        .await
        .map_err(|err| anyhow::anyhow!("LLM error: {err}."))?
        .to_string();
    debug!("Enrichment answer for {}: {response}", item.id);

    parse_enrichment(&response)
}

/// Parses a model answer into card content.
///
/// Reasoning blocks and a surrounding Markdown code fence are ignored.
///
/// # Errors
///
/// Returns an error if the answer is empty, is not the expected JSON object,
/// names an unknown type, or leaves any field blank
pub fn parse_enrichment(response: &str) -> Result<EnrichedCard> {
    let answer = THINK_STRIPPER_REGEX.replace_all(response, "");
    let answer = answer.trim();
    let answer = CODE_FENCE_REGEX
        .captures(answer)
        .and_then(|captures| captures.get(1))
        .map_or(answer, |json| json.as_str())
        .trim();

    if answer.is_empty() {
        anyhow::bail!("Malformed enrichment: empty answer");
    }

    let card: EnrichedCard = serde_json::from_str(answer)
        .map_err(|e| anyhow::anyhow!("Malformed enrichment: {e}; answer was: {answer}"))?;

    if let Some((name, _)) = card.fields().into_iter().find(|(_, value)| value.trim().is_empty()) {
        anyhow::bail!("Malformed enrichment: {name} is empty");
    }

    Ok(card)
}

//! CSS selectors describing the favorites page.
//!
//! They live in a JSON file next to the other data files so that a change in
//! the page structure only needs a new file, not a new build.

use anyhow::{Context, Result};
use log::info;
use scraper::Selector as ScraperSelector;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// Selector strings as they are stored on disk.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Present when the page lists at least one favorite
    pub favorites_container: String,
    /// Present when the favorites list is empty
    pub empty_state_indicator: String,
    /// One element per favorite
    pub favorite_item: String,
    /// Saved text, relative to the item
    pub favorite_item_text: String,
    /// Translation shown next to the text, relative to the item
    pub favorite_item_translation: String,
    /// Element carrying the delete action, relative to the item
    pub favorite_item_delete_button: String,
    /// Attribute of the delete element holding the action URL
    pub delete_url_attribute: String,
    /// Attribute of the item holding a stable ID, if the page exposes one
    pub favorite_item_id_attribute: Option<String>,
    /// Present when the site shows a sign-in page instead of the list
    pub login_indicator: Option<String>,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            favorites_container: ".saved-list".to_owned(),
            empty_state_indicator: ".saved-empty".to_owned(),
            favorite_item: ".saved-item".to_owned(),
            favorite_item_text: ".saved-source".to_owned(),
            favorite_item_translation: ".saved-translation".to_owned(),
            favorite_item_delete_button: ".saved-delete".to_owned(),
            delete_url_attribute: "href".to_owned(),
            favorite_item_id_attribute: None,
            login_indicator: Some("input[type=email], form[action*=signin]".to_owned()),
        }
    }
}

impl SelectorConfig {
    /// Loads selectors from the specified file, falling back to the built-in
    /// ones when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content)
                .with_context(|| format!("Invalid selector file {}", path.display())),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!("No selector file at {}, using built-in selectors", path.display());
                Ok(Self::default())
            }
            Err(err) => Err(err).with_context(|| format!("Unable to read {}", path.display())),
        }
    }

    /// Parses every selector string.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first selector that is not valid CSS
    pub fn compile(&self) -> Result<Selectors> {
        Ok(Selectors {
            container: parse("favorites_container", &self.favorites_container)?,
            empty_state: parse("empty_state_indicator", &self.empty_state_indicator)?,
            item: parse("favorite_item", &self.favorite_item)?,
            text: parse("favorite_item_text", &self.favorite_item_text)?,
            translation: parse("favorite_item_translation", &self.favorite_item_translation)?,
            delete_button: parse(
                "favorite_item_delete_button",
                &self.favorite_item_delete_button,
            )?,
            delete_url_attribute: self.delete_url_attribute.clone(),
            id_attribute: self.favorite_item_id_attribute.clone(),
            login: self
                .login_indicator
                .as_deref()
                .map(|query| parse("login_indicator", query))
                .transpose()?,
        })
    }
}

/// Compiled form of [`SelectorConfig`].
#[derive(Debug, Clone)]
pub struct Selectors {
    pub container: ScraperSelector,
    pub empty_state: ScraperSelector,
    pub item: ScraperSelector,
    pub text: ScraperSelector,
    pub translation: ScraperSelector,
    pub delete_button: ScraperSelector,
    pub delete_url_attribute: String,
    pub id_attribute: Option<String>,
    pub login: Option<ScraperSelector>,
}

fn parse(name: &str, query: &str) -> Result<ScraperSelector> {
    ScraperSelector::parse(query)
        .map_err(|e| anyhow::anyhow!("Invalid CSS selector for {name} ({query}): {e}"))
}

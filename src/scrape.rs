//! The scrape module reads the favorites list of the translation site over an
//! authenticated session and removes entries from it.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use reqwest::header::{COOKIE, SET_COOKIE};
use scraper::{ElementRef, Html};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use url::Url;

use crate::config::Config;
use crate::constants::SOURCE_TIMEOUT_SECS;
use crate::error::RunError;
use crate::selectors::{SelectorConfig, Selectors};
use crate::storage::AuthState;

/// A saved entry of the favorites list.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FavoriteItem {
    pub id: String,
    pub text: String,
    pub translation: String,
}

impl FavoriteItem {
    /// Creates an item whose ID is derived from its content.
    pub fn new(text: impl Into<String>, translation: impl Into<String>) -> Self {
        let (text, translation) = (text.into(), translation.into());
        Self {
            id: content_id(&text, &translation),
            text,
            translation,
        }
    }
}

/// Stable ID of an entry without one of its own: hex SHA-256 of `text-translation`.
pub fn content_id(text: &str, translation: &str) -> String {
    hex::encode(Sha256::digest(format!("{text}-{translation}").as_bytes()))
}

/// Where favorites come from and where processed ones are removed.
#[allow(async_fn_in_trait)]
pub trait FavoritesSource {
    /// Returns the current favorites in source order.
    ///
    /// # Errors
    ///
    /// Returns a [`RunError`] when the session is not valid or the source
    /// cannot be read; both abort the run
    async fn fetch_favorites(&mut self) -> Result<Vec<FavoriteItem>, RunError>;

    /// Removes a favorite from the source.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry cannot be found or the removal is refused
    async fn delete_favorite(&mut self, item: &FavoriteItem) -> Result<()>;
}

/// An item as listed on the page, with the link that removes it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListedFavorite {
    pub item: FavoriteItem,
    pub delete_href: Option<String>,
}

/// What a favorites page turned out to contain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FavoritesPage {
    Listed(Vec<ListedFavorite>),
    Empty,
    SignIn,
    Unrecognised,
}

/// Classifies a favorites page and extracts its entries.
///
/// Entries without text or translation are skipped.
pub fn parse_favorites_page(html: &str, selectors: &Selectors) -> FavoritesPage {
    let document = Html::parse_document(html);

    if document.select(&selectors.empty_state).next().is_some() {
        return FavoritesPage::Empty;
    }

    if document.select(&selectors.container).next().is_none() {
        let sign_in = selectors
            .login
            .as_ref()
            .is_some_and(|login| document.select(login).next().is_some());
        return if sign_in {
            FavoritesPage::SignIn
        } else {
            FavoritesPage::Unrecognised
        };
    }

    let mut listed = Vec::new();
    for (index, element) in document.select(&selectors.item).enumerate() {
        let text = inner_text(element, &selectors.text);
        let translation = inner_text(element, &selectors.translation);

        let (text, translation) = match (text, translation) {
            (Some(text), Some(translation)) => (text, translation),
            (text, translation) => {
                warn!(
                    "Skipping favorite #{index} with missing text or translation: text={text:?}, translation={translation:?}"
                );
                continue;
            }
        };

        let own_id = selectors
            .id_attribute
            .as_deref()
            .and_then(|attribute| element.value().attr(attribute))
            .map(str::trim)
            .filter(|id| !id.is_empty());

        let item = match own_id {
            Some(id) => FavoriteItem {
                id: id.to_owned(),
                text,
                translation,
            },
            None => FavoriteItem::new(text, translation),
        };

        let delete_href = element
            .select(&selectors.delete_button)
            .next()
            .and_then(|button| button.value().attr(&selectors.delete_url_attribute))
            .map(str::to_owned);

        listed.push(ListedFavorite { item, delete_href });
    }

    FavoritesPage::Listed(listed)
}

fn inner_text(element: ElementRef<'_>, selector: &scraper::Selector) -> Option<String> {
    let text = element
        .select(selector)
        .next()?
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    (!text.is_empty()).then_some(text)
}

/// Favorites read from the live website with a saved session.
pub struct WebFavorites {
    client: reqwest::Client,
    url: Url,
    selectors: Selectors,
    auth: AuthState,
    auth_path: PathBuf,
    /// Set when the site refreshed cookies that are not saved yet
    auth_refreshed: bool,
}

impl WebFavorites {
    /// Opens the favorites source described by the configuration.
    ///
    /// The saved session is checked first, before anything else is touched.
    ///
    /// # Errors
    ///
    /// Returns:
    /// * [`RunError::AuthMissing`] or [`RunError::AuthInvalid`] for an unusable session
    /// * [`RunError::Config`] for a broken selector file or HTTP client setup
    pub fn new(config: &Config) -> Result<Self, RunError> {
        let auth = AuthState::load(&config.auth_state_path)?;
        let selectors = SelectorConfig::load(&config.selectors_path)
            .and_then(|selectors| selectors.compile())
            .map_err(|e| RunError::Config(format!("{e:#}")))?;

        Self::with_auth(
            config.favorites_url.clone(),
            &config.user_agent,
            selectors,
            auth,
            config.auth_state_path.clone(),
        )
        .map_err(|e| RunError::Config(format!("{e:#}")))
    }

    /// Creates a source from already loaded parts.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built
    pub fn with_auth(
        url: Url,
        user_agent: &str,
        selectors: Selectors,
        auth: AuthState,
        auth_path: PathBuf,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(SOURCE_TIMEOUT_SECS))
            .build()
            .context("Unable to build HTTP client")?;

        Ok(Self {
            client,
            url,
            selectors,
            auth,
            auth_path,
            auth_refreshed: false,
        })
    }

    pub fn auth(&self) -> &AuthState {
        &self.auth
    }

    /// Saves the session if the site refreshed any cookie.
    ///
    /// # Errors
    ///
    /// Returns an error if the session file cannot be written
    pub fn persist_auth(&mut self) -> Result<()> {
        if self.auth_refreshed {
            self.auth.save(&self.auth_path)?;
            self.auth_refreshed = false;
        }
        Ok(())
    }

    fn domain(&self) -> String {
        self.url.host_str().unwrap_or_default().to_owned()
    }

    fn absorb_cookies(&mut self, response: &reqwest::Response) {
        let domain = self.domain();
        for header in response.headers().get_all(SET_COOKIE) {
            if let Ok(header) = header.to_str() {
                self.auth_refreshed |= self.auth.absorb_set_cookie(header, &domain);
            }
        }
    }

    fn persist_auth_or_warn(&mut self) {
        if let Err(e) = self.persist_auth() {
            warn!("Unable to save refreshed auth state: {e:#}");
        }
    }

    /// Loads the favorites page and classifies it.
    async fn load_page(&mut self) -> Result<(Url, FavoritesPage), RunError> {
        info!("Navigating to favorites page {}", self.url);
        let response = self
            .client
            .get(self.url.clone())
            .header(COOKIE, self.auth.cookie_header())
            .send()
            .await
            .map_err(|e| RunError::SourceUnavailable(format!("{}: {e}", self.url)))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(RunError::AuthExpired);
        }
        if !status.is_success() {
            return Err(RunError::SourceUnavailable(format!("{} answered {status}", self.url)));
        }

        let final_url = response.url().clone();
        self.absorb_cookies(&response);

        let html = response
            .text()
            .await
            .map_err(|e| RunError::SourceUnavailable(format!("{}: {e}", self.url)))?;
        debug!("Loaded {} bytes from {final_url}", html.len());

        let page = parse_favorites_page(&html, &self.selectors);
        match page {
            FavoritesPage::SignIn => Err(RunError::AuthExpired),
            FavoritesPage::Unrecognised if final_url.host_str() != self.url.host_str() => {
                warn!("Favorites page redirected to {final_url}");
                Err(RunError::AuthExpired)
            }
            FavoritesPage::Unrecognised => Err(RunError::SourceUnavailable(format!(
                "{final_url} shows neither favorites nor an empty list; the selectors may be outdated"
            ))),
            page => Ok((final_url, page)),
        }
    }
}

impl FavoritesSource for WebFavorites {
    async fn fetch_favorites(&mut self) -> Result<Vec<FavoriteItem>, RunError> {
        let (_, page) = self.load_page().await?;
        self.persist_auth_or_warn();

        let FavoritesPage::Listed(listed) = page else {
            info!("Favorites list is empty");
            return Ok(Vec::new());
        };

        info!("Found {} favorite items", listed.len());
        Ok(listed.into_iter().map(|listed| listed.item).collect())
    }

    async fn delete_favorite(&mut self, item: &FavoriteItem) -> Result<()> {
        let (page_url, page) = self.load_page().await?;
        self.persist_auth_or_warn();

        let FavoritesPage::Listed(listed) = page else {
            anyhow::bail!("Favorite {} is no longer listed", item.id);
        };
        let href = listed
            .into_iter()
            .find(|listed| listed.item.id == item.id)
            .with_context(|| format!("Favorite {} is no longer listed", item.id))?
            .delete_href
            .with_context(|| format!("Favorite {} has no delete control", item.id))?;

        let delete_url = page_url
            .join(&href)
            .with_context(|| format!("Invalid delete URL {href}"))?;

        let response = self
            .client
            .post(delete_url.clone())
            .header(COOKIE, self.auth.cookie_header())
            .send()
            .await
            .with_context(|| format!("Unable to reach {delete_url}"))?;
        self.absorb_cookies(&response);
        self.persist_auth_or_warn();

        response
            .error_for_status()
            .with_context(|| format!("Deletion of favorite {} refused", item.id))?;

        info!("Deleted favorite {} ({})", item.id, item.text);
        Ok(())
    }
}

/// Entry of the offline fixture file.
#[derive(Debug, Deserialize)]
struct FixtureEntry {
    id: Option<String>,
    text: String,
    translation: String,
}

/// Favorites read from a local JSON fixture, for working without the website.
///
/// Deletions are only logged.
pub struct OfflineFavorites {
    path: PathBuf,
}

impl OfflineFavorites {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_fixture(path: &Path) -> Result<Vec<FixtureEntry>> {
        match fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content)
                .with_context(|| format!("Invalid fixture file {}", path.display())),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(err).with_context(|| format!("Unable to read {}", path.display())),
        }
    }
}

impl FavoritesSource for OfflineFavorites {
    async fn fetch_favorites(&mut self) -> Result<Vec<FavoriteItem>, RunError> {
        let entries = Self::read_fixture(&self.path)
            .map_err(|e| RunError::SourceUnavailable(format!("{e:#}")))?;

        info!(
            "Skipping browser; read {} favorites from {}",
            entries.len(),
            self.path.display()
        );
        Ok(entries
            .into_iter()
            .map(|entry| match entry.id {
                Some(id) => FavoriteItem {
                    id,
                    text: entry.text,
                    translation: entry.translation,
                },
                None => FavoriteItem::new(entry.text, entry.translation),
            })
            .collect())
    }

    async fn delete_favorite(&mut self, item: &FavoriteItem) -> Result<()> {
        info!("Skipping browser; not deleting favorite {} ({})", item.id, item.text);
        Ok(())
    }
}

/// Captures a session interactively and saves it once it has been verified.
///
/// The operator pastes the `Cookie` header of a signed-in browser tab.
///
/// # Errors
///
/// Returns an error if:
/// * Nothing usable was pasted
/// * The favorites page does not accept the session
/// * The session file cannot be written
pub async fn manual_login(config: &Config) -> Result<()> {
    println!(
        "Sign in to {} in your browser, open the developer tools and copy the Cookie request header of the page.",
        config.favorites_url
    );
    println!("Paste it here and press Enter:");

    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .context("Unable to read from stdin")?;
    let line = line.trim().trim_start_matches("Cookie:").trim();

    let domain = config.favorites_url.host_str().unwrap_or_default();
    let auth = AuthState::from_cookie_header(line, domain);
    if auth.cookies.is_empty() {
        anyhow::bail!("No cookies found in the pasted header");
    }

    let selectors = SelectorConfig::load(&config.selectors_path)?.compile()?;
    let mut source = WebFavorites::with_auth(
        config.favorites_url.clone(),
        &config.user_agent,
        selectors,
        auth,
        config.auth_state_path.clone(),
    )?;

    let items = source
        .fetch_favorites()
        .await
        .context("The pasted session was not accepted")?;
    info!("Session verified, {} favorites visible", items.len());

    let mut auth = source.auth().clone();
    auth.save(&config.auth_state_path)
}

//! The storage module keeps the two files a run depends on: the set of
//! favorite IDs already turned into cards and the saved session of the
//! favorites site.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::RunError;

/// ProcessedIds is the durable record of favorite IDs that already have a card.
///
/// The file is a JSON array of strings, kept sorted. IDs are only ever added.
#[derive(Debug)]
pub struct ProcessedIds {
    path: PathBuf,
    ids: BTreeSet<String>,
    /// Set when `ids` has entries that are not on disk yet
    dirty: bool,
}

impl ProcessedIds {
    /// Loads the store from the specified path.
    ///
    /// A missing file is an empty store.
    ///
    /// # Arguments
    ///
    /// * `path` - Path of the JSON file holding processed IDs
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or is not a JSON
    /// array of strings
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let ids = match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str::<Vec<String>>(&content)
                .with_context(|| format!("{} is not a JSON list of IDs", path.display()))?
                .into_iter()
                .collect(),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!("ID file not found at {}, starting empty", path.display());
                BTreeSet::new()
            }
            Err(err) => {
                return Err(err).with_context(|| format!("Unable to read {}", path.display()));
            }
        };

        debug!("Loaded {} processed IDs from {}", ids.len(), path.display());
        Ok(Self {
            path,
            ids,
            dirty: false,
        })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Marks an ID as processed. Returns `false` if it already was.
    pub fn insert(&mut self, id: &str) -> bool {
        let added = self.ids.insert(id.to_owned());
        self.dirty |= added;
        added
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the store to disk if it has unsaved entries.
    ///
    /// The file is replaced atomically so a crash never leaves a truncated list.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the file cannot
    /// be written
    pub fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }

        let ids: Vec<&String> = self.ids.iter().collect();
        write_atomically(&self.path, &serde_json::to_string_pretty(&ids)?)?;
        self.dirty = false;

        debug!("Saved {} processed IDs to {}", self.ids.len(), self.path.display());
        Ok(())
    }
}

/// A single session cookie of the favorites site.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Expiry as Unix seconds; absent or non-positive for session cookies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<f64>,
}

impl SessionCookie {
    fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires {
            Some(expires) if expires > 0.0 => expires < now.timestamp() as f64,
            _ => false,
        }
    }
}

/// Persisted session of the favorites site.
///
/// The layout matches browser "storage state" exports, so one can be dropped in
/// as-is; keys other than `cookies` are ignored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuthState {
    pub cookies: Vec<SessionCookie>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
}

impl AuthState {
    /// Builds a state from a raw `Cookie` request header such as `a=1; b=2`.
    pub fn from_cookie_header(header: &str, domain: &str) -> Self {
        let cookies = header
            .split(';')
            .filter_map(|pair| pair.split_once('='))
            .map(|(name, value)| (name.trim(), value.trim()))
            .filter(|(name, _)| !name.is_empty())
            .map(|(name, value)| SessionCookie {
                name: name.to_owned(),
                value: value.to_owned(),
                domain: domain.to_owned(),
                path: Some("/".to_owned()),
                expires: None,
            })
            .collect();

        Self {
            cookies,
            saved_at: None,
        }
    }

    /// Loads and validates the state saved at the specified path.
    ///
    /// # Errors
    ///
    /// Returns:
    /// * [`RunError::AuthMissing`] if the file does not exist
    /// * [`RunError::AuthInvalid`] if it cannot be read or parsed, holds no cookies,
    ///   or every cookie with an expiry has expired
    pub fn load(path: &Path) -> Result<Self, RunError> {
        let invalid = |reason: String| RunError::AuthInvalid {
            path: path.to_path_buf(),
            reason,
        };

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(RunError::AuthMissing {
                    path: path.to_path_buf(),
                });
            }
            Err(err) => return Err(invalid(err.to_string())),
        };

        let state: Self = serde_json::from_str(&content).map_err(|err| invalid(err.to_string()))?;

        if state.cookies.is_empty() {
            return Err(invalid("no cookies".to_owned()));
        }
        if state.is_expired_at(Utc::now()) {
            return Err(invalid("all cookies have expired".to_owned()));
        }

        info!(
            "Loaded auth state with {} cookies from {}",
            state.cookies.len(),
            path.display()
        );
        Ok(state)
    }

    /// Saves the state, stamping it with the current time.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written
    pub fn save(&mut self, path: &Path) -> Result<()> {
        self.saved_at = Some(Utc::now());
        write_atomically(path, &serde_json::to_string_pretty(self)?)?;
        info!("Saved auth state to {}", path.display());
        Ok(())
    }

    /// True when every cookie that carries an expiry is past it.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        let mut expiring = self
            .cookies
            .iter()
            .filter(|cookie| cookie.expires.is_some_and(|expires| expires > 0.0))
            .peekable();

        expiring.peek().is_some() && expiring.all(|cookie| cookie.is_expired_at(now))
    }

    /// Renders the cookies as a `Cookie` request header.
    pub fn cookie_header(&self) -> String {
        self.cookies
            .iter()
            .map(|cookie| format!("{}={}", cookie.name, cookie.value))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Applies a `Set-Cookie` response header to the state.
    ///
    /// Returns `true` if a cookie value changed or a cookie was added.
    pub fn absorb_set_cookie(&mut self, header: &str, domain: &str) -> bool {
        let mut parts = header.split(';');
        let Some((name, value)) = parts.next().and_then(|pair| pair.split_once('=')) else {
            return false;
        };
        let (name, value) = (name.trim(), value.trim());
        if name.is_empty() {
            return false;
        }

        let expires = parts
            .filter_map(|attr| attr.split_once('='))
            .find(|(key, _)| key.trim().eq_ignore_ascii_case("max-age"))
            .and_then(|(_, max_age)| max_age.trim().parse::<i64>().ok())
            .map(|max_age| (Utc::now().timestamp() + max_age) as f64);

        match self.cookies.iter_mut().find(|cookie| cookie.name == name) {
            Some(cookie) if cookie.value == value => false,
            Some(cookie) => {
                cookie.value = value.to_owned();
                if expires.is_some() {
                    cookie.expires = expires;
                }
                true
            }
            None => {
                self.cookies.push(SessionCookie {
                    name: name.to_owned(),
                    value: value.to_owned(),
                    domain: domain.to_owned(),
                    path: Some("/".to_owned()),
                    expires,
                });
                true
            }
        }
    }
}

fn write_atomically(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Unable to create directory {}", parent.display()))?;
    }

    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, content)
        .with_context(|| format!("Unable to write {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .with_context(|| format!("Unable to replace {}", path.display()))?;

    Ok(())
}

//! Durable subscription store.
//!
//! The full subscription set is serialized as a single JSON document at a
//! well-known path, mirroring how a browser client would keep it under one
//! localStorage key. Single-user, single-writer: every mutation rewrites the
//! whole file synchronously (write-to-temp-then-rename) before returning.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::util::{canonical_feed_url, UrlError};

/// Seed set for first-ever access: new users start with content rather than
/// an empty list.
const DEFAULT_SUBSCRIPTIONS: &[(&str, &str)] = &[
    ("Hacker News", "https://hnrss.org/frontpage"),
    ("BBC World News", "https://feeds.bbci.co.uk/news/world/rss.xml"),
    ("The Verge", "https://www.theverge.com/rss/index.xml"),
];

/// One subscribed feed source.
///
/// The `id` is the canonicalized URL; the URL is the natural unique key and
/// no separate identity scheme exists. Immutable once created: a
/// subscription is either present or absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "addedAt")]
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// The URL is already subscribed (user-correctable).
    #[error("already subscribed to {0}")]
    Duplicate(String),
    /// The URL failed validation.
    #[error(transparent)]
    InvalidUrl(#[from] UrlError),
    /// Reading or writing the subscription file failed.
    #[error("subscription storage failed: {0}")]
    Io(#[from] std::io::Error),
    /// Serializing the subscription set failed.
    #[error("failed to encode subscriptions: {0}")]
    Encode(#[source] serde_json::Error),
    /// The file exists but is not a valid subscription list. Not silently
    /// discarded: reseeding would destroy the user's list.
    #[error("subscription file {path} is corrupt ({source}); fix or delete it to start over")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// File-backed store of [`Subscription`]s, constructed once at startup and
/// passed to whatever needs subscription data.
#[derive(Debug)]
pub struct SubscriptionStore {
    path: PathBuf,
    subscriptions: Vec<Subscription>,
}

impl SubscriptionStore {
    /// Opens the store at `path`, seeding the default subscription set on
    /// first-ever access (no file present).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corrupt`] when the file exists but does not
    /// parse, and [`StoreError::Io`] when it cannot be read or the seed set
    /// cannot be persisted.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();

        match std::fs::read(&path) {
            Ok(bytes) => {
                let subscriptions =
                    serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
                        path: path.clone(),
                        source,
                    })?;
                Ok(Self {
                    path,
                    subscriptions,
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let subscriptions: Vec<Subscription> = DEFAULT_SUBSCRIPTIONS
                    .iter()
                    .map(|(name, url)| Subscription {
                        id: (*url).to_owned(),
                        url: (*url).to_owned(),
                        name: Some((*name).to_owned()),
                        added_at: Utc::now(),
                    })
                    .collect();

                let store = Self {
                    path,
                    subscriptions,
                };
                store.persist()?;
                tracing::info!(
                    path = %store.path.display(),
                    count = store.subscriptions.len(),
                    "Seeded default subscriptions"
                );
                Ok(store)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// All subscriptions, in insertion order.
    pub fn list(&self) -> &[Subscription] {
        &self.subscriptions
    }

    /// Subscribes to a feed URL.
    ///
    /// The URL is canonicalized before use as the key, so two spellings of
    /// the same endpoint (host case, default port) collide as duplicates.
    ///
    /// # Errors
    ///
    /// [`StoreError::Duplicate`] when already subscribed,
    /// [`StoreError::InvalidUrl`] on an unparseable or non-http(s) URL, and
    /// [`StoreError::Io`] when the updated set cannot be persisted (the
    /// in-memory set is rolled back).
    pub fn add(&mut self, url: &str, name: Option<&str>) -> Result<Subscription, StoreError> {
        let id = canonical_feed_url(url)?.to_string();

        if self.subscriptions.iter().any(|s| s.id == id) {
            return Err(StoreError::Duplicate(id));
        }

        let subscription = Subscription {
            id: id.clone(),
            url: id,
            name: name.map(str::to_owned),
            added_at: Utc::now(),
        };

        self.subscriptions.push(subscription.clone());
        if let Err(e) = self.persist() {
            self.subscriptions.pop();
            return Err(e);
        }

        Ok(subscription)
    }

    /// Removes a subscription by id (its URL). No-op when absent.
    pub fn remove(&mut self, id: &str) -> Result<(), StoreError> {
        // Accept an uncanonicalized spelling of the stored id
        let target = canonical_feed_url(id)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| id.to_owned());

        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| s.id != target);

        if self.subscriptions.len() == before {
            return Ok(());
        }
        self.persist()
    }

    /// Writes the full set to disk atomically: serialize, write to a temp
    /// file, fsync, rename over the destination.
    fn persist(&self) -> Result<(), StoreError> {
        let json =
            serde_json::to_vec_pretty(&self.subscriptions).map_err(StoreError::Encode)?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let tmp = self.path.with_extension("json.tmp");
        write_and_sync(&tmp, &json).inspect_err(|_| {
            let _ = std::fs::remove_file(&tmp);
        })?;
        std::fs::rename(&tmp, &self.path).inspect_err(|_| {
            let _ = std::fs::remove_file(&tmp);
        })?;

        Ok(())
    }
}

fn write_and_sync(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    use std::io::Write;

    let mut file = std::fs::File::create(path)?;
    file.write_all(bytes)?;
    // Data must hit disk before the rename makes it visible
    file.sync_all()
}

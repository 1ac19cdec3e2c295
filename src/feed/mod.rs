pub mod rss;
pub mod types;

use crate::config::FeedConfig;
use crate::error::{RefreshError, Result};
use crate::health::SourceStatus;
use crate::state::{JsonStore, FEED_CACHE_FILE, FEED_ROTATION_FILE};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use types::{FeedEntry, FeedItem};

#[async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch_entries(&self, url: &str) -> Result<Vec<FeedEntry>>;
}

/// Index of the item shown by the last successful rotating fetch.
/// `None` until the first one, so rotation starts at index 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RotationState {
    pub last_index: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedOutcome {
    pub item: FeedItem,
    pub status: SourceStatus,
}

pub fn next_index(last: Option<usize>, len: usize) -> usize {
    match last {
        Some(i) if len > 0 => (i + 1) % len,
        _ => 0,
    }
}

/// Remote feed with one-item-per-fetch rotation and a last-good cache.
pub struct FeedSource {
    fetcher: Box<dyn FeedFetcher>,
    rotation: JsonStore<RotationState>,
    cache: JsonStore<FeedItem>,
    timeout: Duration,
    max_items: usize,
}

impl FeedSource {
    pub fn new(fetcher: Box<dyn FeedFetcher>, state_dir: &Path, config: &FeedConfig) -> Self {
        Self {
            fetcher,
            rotation: JsonStore::new(state_dir.join(FEED_ROTATION_FILE)),
            cache: JsonStore::new(state_dir.join(FEED_CACHE_FILE)),
            timeout: Duration::from_millis(config.request_timeout_ms),
            max_items: config.max_items.max(1),
        }
    }

    pub fn cursor(&self) -> Option<usize> {
        self.rotation.load().unwrap_or_default().last_index
    }

    pub fn cached(&self) -> Option<FeedItem> {
        self.cache.load()
    }

    /// Forget the rotation position, e.g. after the feed URL changed.
    pub fn reset_rotation(&self) -> Result<()> {
        self.rotation.save(&RotationState::default())
    }

    /// Rotating fetch: advance the cursor and refresh the cache on success,
    /// degrade to the cache (or a placeholder) on any failure.
    pub async fn fetch(&self, url: Option<&str>) -> FeedOutcome {
        match self.fetch_live(url).await {
            Ok(entries) => {
                let index = next_index(self.cursor(), entries.len());
                let item = FeedItem::from_entry(&entries[index]);
                if let Err(e) = self.cache.save(&item) {
                    tracing::warn!(error = %e, "failed to write feed cache");
                }
                if let Err(e) = self.rotation.save(&RotationState { last_index: Some(index) }) {
                    tracing::warn!(error = %e, "failed to persist feed rotation");
                }
                tracing::debug!(index, total = entries.len(), title = %item.title, "feed item selected");
                FeedOutcome {
                    item,
                    status: SourceStatus::Live,
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "feed fetch failed");
                match self.cache.load() {
                    Some(item) => {
                        tracing::info!("using cached feed item");
                        FeedOutcome {
                            item,
                            status: SourceStatus::Cached,
                        }
                    }
                    None => FeedOutcome {
                        item: FeedItem::placeholder(),
                        status: SourceStatus::Unavailable,
                    },
                }
            }
        }
    }

    /// Preview the item the next rotating fetch would show.
    /// Touches neither the cursor nor the cache.
    pub async fn peek(&self, url: Option<&str>) -> Result<FeedItem> {
        let entries = self.fetch_live(url).await?;
        let index = next_index(self.cursor(), entries.len());
        Ok(FeedItem::from_entry(&entries[index]))
    }

    /// Non-empty list of at most `max_items` entries, or the reason there is none.
    async fn fetch_live(&self, url: Option<&str>) -> Result<Vec<FeedEntry>> {
        let url = url
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| RefreshError::SourceUnavailable("no feed URL configured".to_string()))?;

        let mut entries = tokio::time::timeout(self.timeout, self.fetcher.fetch_entries(url))
            .await
            .map_err(|_| RefreshError::Timeout {
                what: "feed fetch",
                budget: self.timeout,
            })??;

        if entries.is_empty() {
            return Err(RefreshError::SourceEmpty(format!("feed {} has no items", url)));
        }
        entries.truncate(self.max_items);
        Ok(entries)
    }
}

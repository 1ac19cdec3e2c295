//! Small JSON files under the state directory.
//!
//! Every store is read-modify-write and tolerant of missing or corrupt
//! content: readers fall back to a hardcoded default instead of failing.

pub mod interval;
pub mod mode;

pub use interval::{clamp_interval, IntervalStore, MAX_INTERVAL_MINUTES, MIN_INTERVAL_MINUTES};
pub use mode::{DisplayMode, ModeStore};

use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::path::PathBuf;

pub const MODE_FILE: &str = "displayMode.json";
pub const INTERVAL_FILE: &str = "scheduler.json";
pub const FEED_ROTATION_FILE: &str = "feedState.json";
pub const FEED_CACHE_FILE: &str = "feedCache.json";
pub const NOTES_CACHE_FILE: &str = "todos-cache.json";
pub const SLIDESHOW_FILE: &str = "slideshow.json";

pub struct JsonStore<T> {
    path: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Serialize + DeserializeOwned> JsonStore<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _marker: PhantomData,
        }
    }

    /// `None` when the file is missing or unreadable as `T`.
    pub fn load(&self) -> Option<T> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to read state file");
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "corrupt state file, ignoring");
                None
            }
        }
    }

    /// Write via a sibling temp file so a crash never leaves half a document.
    pub fn save(&self, value: &T) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(value)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

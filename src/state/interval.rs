use super::JsonStore;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const MIN_INTERVAL_MINUTES: u32 = 5;
pub const MAX_INTERVAL_MINUTES: u32 = 180;

pub fn clamp_interval(minutes: i64) -> u32 {
    minutes.clamp(MIN_INTERVAL_MINUTES as i64, MAX_INTERVAL_MINUTES as i64) as u32
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IntervalFile {
    interval_minutes: i64,
}

/// Refresh cadence in minutes, always within [5, 180].
pub struct IntervalStore {
    store: JsonStore<IntervalFile>,
    default_minutes: u32,
}

impl IntervalStore {
    pub fn new(path: impl Into<PathBuf>, default_minutes: u32) -> Self {
        Self {
            store: JsonStore::new(path),
            default_minutes: clamp_interval(default_minutes as i64),
        }
    }

    pub fn read(&self) -> u32 {
        self.store
            .load()
            .map(|f| clamp_interval(f.interval_minutes))
            .unwrap_or(self.default_minutes)
    }

    /// Persist the clamped value and return it.
    pub fn write(&self, minutes: i64) -> Result<u32> {
        let clamped = clamp_interval(minutes);
        self.store.save(&IntervalFile {
            interval_minutes: clamped as i64,
        })?;
        Ok(clamped)
    }
}

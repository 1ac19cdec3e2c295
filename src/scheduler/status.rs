use crate::feed::types::FeedItem;
use crate::health::SourceHealth;
use crate::state::DisplayMode;
use chrono::{DateTime, Local};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerState {
    #[default]
    Idle,
    Rendering,
}

/// Snapshot of the scheduler for administrative readers.
///
/// Only the tick path writes it. `last_success_at` is the start time of the
/// most recent successful tick, so it never exceeds `last_run_at`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStatus {
    pub state: SchedulerState,
    pub last_run_at: Option<DateTime<Local>>,
    pub last_success_at: Option<DateTime<Local>>,
    pub last_error: Option<String>,
    pub current_title: Option<String>,
    pub current_image: Option<String>,
    pub current_feed_item: Option<FeedItem>,
    pub mode: DisplayMode,
    pub interval_minutes: u32,
    pub feed: SourceHealth,
    pub notes: SourceHealth,
    pub network: SourceHealth,
    pub consecutive_offline: u32,
}

impl SchedulerStatus {
    pub fn is_rendering(&self) -> bool {
        self.state == SchedulerState::Rendering
    }

    /// Human-readable age of the last run, e.g. `3m ago`.
    pub fn last_run_age(&self, now: DateTime<Local>) -> String {
        match self.last_run_at {
            None => "never".to_string(),
            Some(at) => {
                let secs = (now - at).num_seconds().max(0);
                if secs < 60 {
                    format!("{}s ago", secs)
                } else if secs < 3600 {
                    format!("{}m ago", secs / 60)
                } else {
                    format!("{}h {:02}m ago", secs / 3600, (secs % 3600) / 60)
                }
            }
        }
    }
}

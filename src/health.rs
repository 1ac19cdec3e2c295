use chrono::{DateTime, Local};
use serde::Serialize;

/// Last observed condition of an external source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    #[default]
    Unknown,
    /// Feed fetched live.
    Live,
    /// Notes read from the mounted backup.
    Connected,
    /// Live read failed, last good result served.
    Cached,
    /// Live read failed and nothing was cached.
    Unavailable,
    Online,
    Offline,
}

impl std::fmt::Display for SourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SourceStatus::Unknown => "unknown",
            SourceStatus::Live => "live",
            SourceStatus::Connected => "connected",
            SourceStatus::Cached => "cached",
            SourceStatus::Unavailable => "unavailable",
            SourceStatus::Online => "online",
            SourceStatus::Offline => "offline",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceHealth {
    pub status: SourceStatus,
    pub last_update: Option<DateTime<Local>>,
}

impl SourceHealth {
    pub fn observed(status: SourceStatus) -> Self {
        Self {
            status,
            last_update: Some(Local::now()),
        }
    }
}

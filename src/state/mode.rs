use super::JsonStore;
use crate::error::{RefreshError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// What the right-hand pane of the display shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    #[default]
    #[serde(alias = "rss")]
    Feed,
    Slideshow,
}

impl fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayMode::Feed => write!(f, "feed"),
            DisplayMode::Slideshow => write!(f, "slideshow"),
        }
    }
}

impl FromStr for DisplayMode {
    type Err = RefreshError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "feed" | "rss" => Ok(DisplayMode::Feed),
            "slideshow" => Ok(DisplayMode::Slideshow),
            other => Err(RefreshError::InvalidInput(format!("unknown display mode: {}", other))),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ModeFile {
    mode: DisplayMode,
}

pub struct ModeStore {
    store: JsonStore<ModeFile>,
}

impl ModeStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            store: JsonStore::new(path),
        }
    }

    pub fn read(&self) -> DisplayMode {
        self.store.load().map(|f| f.mode).unwrap_or_default()
    }

    pub fn write(&self, mode: DisplayMode) -> Result<()> {
        self.store.save(&ModeFile { mode })
    }
}

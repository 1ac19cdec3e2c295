pub mod reader;

pub use reader::{parse_checklist, weekday_name, BackupNoteReader, NoteReader, Todo};

use crate::config::NotesConfig;
use crate::error::{RefreshError, Result};
use crate::health::SourceStatus;
use crate::state::{JsonStore, NOTES_CACHE_FILE};
use chrono::{Datelike, Weekday};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct NotesOutcome {
    pub todos: Vec<Todo>,
    pub status: SourceStatus,
}

/// Today's checklist with a hard wall-clock budget and a last-good cache.
pub struct NotesSource {
    reader: Arc<dyn NoteReader>,
    cache: JsonStore<Vec<Todo>>,
    budget: Duration,
    // Set while a blocking read is running, including one abandoned at the budget.
    in_flight: Arc<AtomicBool>,
}

/// Releases the in-flight slot when the blocking read ends, even by panic.
struct ReadSlot(Arc<AtomicBool>);

impl Drop for ReadSlot {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl NotesSource {
    pub fn new(reader: Arc<dyn NoteReader>, state_dir: &Path, config: &NotesConfig) -> Self {
        Self {
            reader,
            cache: JsonStore::new(state_dir.join(NOTES_CACHE_FILE)),
            budget: Duration::from_millis(config.budget_ms),
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    pub async fn fetch(&self) -> NotesOutcome {
        self.fetch_for(chrono::Local::now().weekday()).await
    }

    pub async fn fetch_for(&self, day: Weekday) -> NotesOutcome {
        match self.read_live(day).await {
            Ok(todos) => {
                if let Err(e) = self.cache.save(&todos) {
                    tracing::warn!(error = %e, "failed to write todo cache");
                }
                NotesOutcome {
                    todos,
                    status: SourceStatus::Connected,
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "notes read failed");
                match self.cache.load() {
                    Some(todos) => NotesOutcome {
                        todos,
                        status: SourceStatus::Cached,
                    },
                    None => NotesOutcome {
                        todos: Vec::new(),
                        status: SourceStatus::Unavailable,
                    },
                }
            }
        }
    }

    /// A read that misses the budget is a failure even if it later completes;
    /// the blocking thread is abandoned, not awaited. While an abandoned read is
    /// still stuck no new one is started, so a hung mount holds one thread at most.
    async fn read_live(&self, day: Weekday) -> Result<Vec<Todo>> {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            return Err(RefreshError::SourceUnavailable(
                "previous notes read still in progress".to_string(),
            ));
        }
        let slot = ReadSlot(Arc::clone(&self.in_flight));
        let reader = Arc::clone(&self.reader);
        let task = tokio::task::spawn_blocking(move || {
            let _slot = slot;
            reader.read(day)
        });
        match tokio::time::timeout(self.budget, task).await {
            Err(_) => Err(RefreshError::Timeout {
                what: "notes read",
                budget: self.budget,
            }),
            Ok(Err(join_err)) => Err(RefreshError::SourceUnavailable(format!(
                "notes reader aborted: {}",
                join_err
            ))),
            Ok(Ok(result)) => result,
        }
    }
}

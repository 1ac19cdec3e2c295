use crate::error::{RefreshError, Result};
use chrono::Weekday;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    pub text: String,
    pub done: bool,
}

/// English full weekday name, the prefix of each day's note file.
pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Checkbox lines after the metadata header become todos; everything else is dropped.
pub fn parse_checklist(content: &str, metadata_lines: usize) -> Vec<Todo> {
    content
        .lines()
        .skip(metadata_lines)
        .map(str::trim)
        .filter_map(|line| {
            if let Some(rest) = line.strip_prefix("- [x]") {
                Some(Todo {
                    text: rest.trim().to_string(),
                    done: true,
                })
            } else {
                line.strip_prefix("- [ ]").map(|rest| Todo {
                    text: rest.trim().to_string(),
                    done: false,
                })
            }
        })
        .collect()
}

/// Blocking read of the day's checklist. Runs on a blocking thread because
/// the backup directory is usually a network mount that can stall.
pub trait NoteReader: Send + Sync + 'static {
    fn read(&self, day: Weekday) -> Result<Vec<Todo>>;
}

/// Reads `<backup>/<latest dated folder>/<subdir>/<Weekday>*.md`.
pub struct BackupNoteReader {
    backup_dir: PathBuf,
    subdir: PathBuf,
    metadata_lines: usize,
}

impl BackupNoteReader {
    pub fn new(backup_dir: impl Into<PathBuf>, subdir: impl Into<PathBuf>, metadata_lines: usize) -> Self {
        Self {
            backup_dir: backup_dir.into(),
            subdir: subdir.into(),
            metadata_lines,
        }
    }

    fn latest_folder(&self) -> Result<PathBuf> {
        let entries = std::fs::read_dir(&self.backup_dir).map_err(|e| {
            RefreshError::SourceUnavailable(format!(
                "backup directory {} unavailable: {}",
                self.backup_dir.display(),
                e
            ))
        })?;
        let mut folders = sorted_names(entries);
        folders.retain(|name| !name.starts_with('.'));
        let latest = folders.pop().ok_or_else(|| {
            RefreshError::SourceEmpty(format!("backup directory {} is empty", self.backup_dir.display()))
        })?;
        Ok(self.backup_dir.join(latest))
    }
}

impl NoteReader for BackupNoteReader {
    fn read(&self, day: Weekday) -> Result<Vec<Todo>> {
        let notes_dir = self.latest_folder()?.join(&self.subdir);
        let entries = std::fs::read_dir(&notes_dir).map_err(|e| {
            RefreshError::SourceUnavailable(format!("notes directory {} missing: {}", notes_dir.display(), e))
        })?;

        let prefix = weekday_name(day);
        let file = sorted_names(entries)
            .into_iter()
            .find(|name| name.starts_with(prefix) && name.ends_with(".md"))
            .ok_or_else(|| RefreshError::SourceEmpty(format!("no note for {}", prefix)))?;

        let content = std::fs::read_to_string(notes_dir.join(&file))?;
        let todos = parse_checklist(&content, self.metadata_lines);
        tracing::debug!(file = %file, count = todos.len(), "todos read");
        Ok(todos)
    }
}

fn sorted_names(entries: std::fs::ReadDir) -> Vec<String> {
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

use crate::error::{RefreshError, Result};
use crate::state::JsonStore;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// Result of picking the next slide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slide {
    Image(String),
    /// The directory holds no images; not an error.
    NoImages,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CursorFile {
    cursor: usize,
}

#[derive(Default)]
struct Rotation {
    cursor: usize,
    pinned: Option<String>,
    last_shown: Option<String>,
}

/// Local image rotation in filename order, with a one-shot pin.
pub struct SlideshowSource {
    dir: PathBuf,
    store: JsonStore<CursorFile>,
    rotation: Mutex<Rotation>,
}

fn lock(m: &Mutex<Rotation>) -> MutexGuard<'_, Rotation> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn is_image(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}

/// Bare file names only; anything that could escape the directory is refused.
fn validate_name(filename: &str) -> Result<()> {
    if filename.is_empty() || filename.contains("..") || filename.contains('/') || filename.contains('\\') {
        return Err(RefreshError::InvalidInput(format!("invalid filename: {}", filename)));
    }
    Ok(())
}

impl SlideshowSource {
    pub fn new(dir: impl Into<PathBuf>, cursor_path: impl Into<PathBuf>) -> Self {
        let store: JsonStore<CursorFile> = JsonStore::new(cursor_path);
        let cursor = store.load().unwrap_or_default().cursor;
        Self {
            dir: dir.into(),
            store,
            rotation: Mutex::new(Rotation {
                cursor,
                ..Rotation::default()
            }),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, filename: &str) -> PathBuf {
        self.dir.join(filename)
    }

    pub fn cursor(&self) -> usize {
        lock(&self.rotation).cursor
    }

    pub fn pinned(&self) -> Option<String> {
        lock(&self.rotation).pinned.clone()
    }

    /// Image file names sorted by name; the sort order is the rotation order.
    /// A missing directory lists as empty.
    pub fn list(&self) -> Result<Vec<String>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(dir = %self.dir.display(), "slideshow directory missing");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };
        let mut files: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| is_image(name))
            .collect();
        files.sort();
        Ok(files)
    }

    /// Pin a file for the next pick. Fails unless it is in the current listing.
    pub fn pin(&self, filename: &str) -> Result<()> {
        validate_name(filename)?;
        if !self.list()?.iter().any(|f| f == filename) {
            return Err(RefreshError::InvalidInput(format!("no such slideshow image: {}", filename)));
        }
        self.set_override(filename);
        Ok(())
    }

    /// Unchecked pin; silently ignored at pick time if the file is gone.
    pub fn set_override(&self, filename: &str) {
        lock(&self.rotation).pinned = Some(filename.to_string());
    }

    pub fn reset_cursor(&self) -> Result<()> {
        lock(&self.rotation).cursor = 0;
        self.store.save(&CursorFile { cursor: 0 })
    }

    /// Pick the slide to render.
    ///
    /// A present pin wins and is consumed without moving the cursor. Otherwise
    /// `list[cursor % len]` is returned and the cursor advances by one. With
    /// `advance == false` the slide shown last is repeated if it still exists.
    pub fn pick_next(&self, advance: bool) -> Result<Slide> {
        let files = self.list()?;
        let mut rotation = lock(&self.rotation);

        if files.is_empty() {
            rotation.last_shown = None;
            return Ok(Slide::NoImages);
        }

        if let Some(pinned) = rotation.pinned.take() {
            if files.contains(&pinned) {
                rotation.last_shown = Some(pinned.clone());
                return Ok(Slide::Image(pinned));
            }
            tracing::warn!(file = %pinned, "pinned image no longer present, ignoring pin");
        }

        if !advance {
            if let Some(last) = rotation.last_shown.clone().filter(|f| files.contains(f)) {
                return Ok(Slide::Image(last));
            }
        }

        let index = rotation.cursor % files.len();
        let file = files[index].clone();
        if advance {
            rotation.cursor = (index + 1) % files.len();
            if let Err(e) = self.store.save(&CursorFile { cursor: rotation.cursor }) {
                tracing::warn!(error = %e, "failed to persist slideshow cursor");
            }
        }
        rotation.last_shown = Some(file.clone());
        Ok(Slide::Image(file))
    }

    /// Delete an image from the slideshow directory.
    pub fn remove(&self, filename: &str) -> Result<()> {
        validate_name(filename)?;
        let path = self.path_for(filename);
        if !path.is_file() {
            return Err(RefreshError::InvalidInput(format!("no such slideshow image: {}", filename)));
        }
        std::fs::remove_file(&path)?;
        let mut rotation = lock(&self.rotation);
        if rotation.pinned.as_deref() == Some(filename) {
            rotation.pinned = None;
        }
        tracing::info!(file = %filename, "slideshow image removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source_with(files: &[&str]) -> (tempfile::TempDir, SlideshowSource) {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("slides");
        std::fs::create_dir_all(&dir).unwrap();
        for f in files {
            std::fs::write(dir.join(f), b"img").unwrap();
        }
        let source = SlideshowSource::new(&dir, tmp.path().join("slideshow.json"));
        (tmp, source)
    }

    #[test]
    fn test_list_filters_and_sorts() {
        let (_tmp, source) = source_with(&["b.png", "a.PNG", "notes.txt", "c.jpg"]);
        assert_eq!(source.list().unwrap(), vec!["a.PNG", "b.png", "c.jpg"]);
    }

    #[test]
    fn test_missing_directory_lists_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let source = SlideshowSource::new(tmp.path().join("nope"), tmp.path().join("s.json"));
        assert!(source.list().unwrap().is_empty());
        assert_eq!(source.pick_next(true).unwrap(), Slide::NoImages);
    }

    #[test]
    fn test_rotation_wraps() {
        let (_tmp, source) = source_with(&["a.png", "b.png"]);
        assert_eq!(source.pick_next(true).unwrap(), Slide::Image("a.png".into()));
        assert_eq!(source.pick_next(true).unwrap(), Slide::Image("b.png".into()));
        assert_eq!(source.pick_next(true).unwrap(), Slide::Image("a.png".into()));
        assert_eq!(source.cursor(), 1);
    }

    #[test]
    fn test_pin_is_one_shot_and_keeps_cursor() {
        let (_tmp, source) = source_with(&["a.png", "b.png", "x.png"]);
        source.pin("x.png").unwrap();
        assert_eq!(source.pick_next(true).unwrap(), Slide::Image("x.png".into()));
        assert_eq!(source.cursor(), 0);
        assert!(source.pinned().is_none());
        assert_eq!(source.pick_next(true).unwrap(), Slide::Image("a.png".into()));
        assert_eq!(source.cursor(), 1);
    }

    #[test]
    fn test_pin_rejects_absent_or_unsafe_names() {
        let (_tmp, source) = source_with(&["a.png"]);
        assert!(source.pin("missing.png").unwrap_err().is_user_error());
        assert!(source.pin("../a.png").unwrap_err().is_user_error());
        assert!(source.pinned().is_none());
    }

    #[test]
    fn test_cursor_taken_modulo_after_deletions() {
        let (tmp, source) = source_with(&["a.png", "b.png", "c.png"]);
        source.pick_next(true).unwrap();
        source.pick_next(true).unwrap();
        assert_eq!(source.cursor(), 2);
        std::fs::remove_file(tmp.path().join("slides/c.png")).unwrap();
        std::fs::remove_file(tmp.path().join("slides/b.png")).unwrap();
        assert_eq!(source.pick_next(true).unwrap(), Slide::Image("a.png".into()));
    }

    #[test]
    fn test_no_advance_repeats_last_shown() {
        let (_tmp, source) = source_with(&["a.png", "b.png"]);
        source.pick_next(true).unwrap();
        assert_eq!(source.pick_next(false).unwrap(), Slide::Image("a.png".into()));
        assert_eq!(source.cursor(), 1);
    }

    #[test]
    fn test_cursor_persists_across_instances() {
        let (tmp, source) = source_with(&["a.png", "b.png", "c.png"]);
        source.pick_next(true).unwrap();
        drop(source);
        let reopened = SlideshowSource::new(tmp.path().join("slides"), tmp.path().join("slideshow.json"));
        assert_eq!(reopened.cursor(), 1);
        assert_eq!(reopened.pick_next(true).unwrap(), Slide::Image("b.png".into()));
    }

    #[test]
    fn test_remove_image() {
        let (_tmp, source) = source_with(&["a.png", "b.png"]);
        source.pin("b.png").unwrap();
        source.remove("b.png").unwrap();
        assert!(source.pinned().is_none());
        assert_eq!(source.list().unwrap(), vec!["a.png"]);
        assert!(source.remove("b.png").unwrap_err().is_user_error());
        assert!(source.remove("..\\evil.png").unwrap_err().is_user_error());
    }
}

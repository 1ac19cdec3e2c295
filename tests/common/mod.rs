// Shared fakes for the scheduler integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Weekday;
use inky_refresh::config::Config;
use inky_refresh::display::{DisplayRenderer, Payload};
use inky_refresh::error::{RefreshError, Result};
use inky_refresh::feed::types::FeedEntry;
use inky_refresh::feed::{FeedFetcher, FeedSource};
use inky_refresh::network::{NetworkProbe, Rebooter};
use inky_refresh::notes::{NoteReader, NotesSource, Todo};
use inky_refresh::scheduler::Scheduler;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

pub const FEED_URL: &str = "http://feed.test/rss";

pub struct StaticFeed {
    pub entries: Vec<FeedEntry>,
    pub fail: AtomicBool,
}

#[async_trait]
impl FeedFetcher for StaticFeed {
    async fn fetch_entries(&self, _url: &str) -> Result<Vec<FeedEntry>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(RefreshError::SourceUnavailable("feed down".to_string()));
        }
        Ok(self.entries.clone())
    }
}

pub struct FixedNotes;

impl NoteReader for FixedNotes {
    fn read(&self, _day: Weekday) -> Result<Vec<Todo>> {
        Ok(vec![Todo {
            text: "Water plants".to_string(),
            done: false,
        }])
    }
}

#[derive(Default)]
pub struct ToggleProbe {
    pub offline: AtomicBool,
}

#[async_trait]
impl NetworkProbe for ToggleProbe {
    async fn probe(&self) -> bool {
        !self.offline.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct CountingRebooter {
    pub calls: AtomicUsize,
}

#[async_trait]
impl Rebooter for CountingRebooter {
    async fn reboot(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Records every payload and the peak number of concurrent renders.
#[derive(Default)]
pub struct RecordingDisplay {
    pub payloads: Mutex<Vec<Payload>>,
    pub active: AtomicUsize,
    pub max_active: AtomicUsize,
    pub delay: Duration,
    pub fail: AtomicBool,
}

impl RecordingDisplay {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn render_count(&self) -> usize {
        self.payloads.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<Payload> {
        self.payloads.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl DisplayRenderer for RecordingDisplay {
    async fn render(&self, payload: &Payload) -> Result<()> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(RefreshError::RenderFailure("panel busy".to_string()));
        }
        self.payloads.lock().unwrap().push(payload.clone());
        Ok(())
    }

    async fn boot_message(&self, _text: &str) -> Result<()> {
        Ok(())
    }
}

pub struct Harness {
    pub tmp: TempDir,
    pub config: Config,
    pub scheduler: Arc<Scheduler>,
    pub display: Arc<RecordingDisplay>,
    pub feed: Arc<StaticFeed>,
    pub probe: Arc<ToggleProbe>,
    pub rebooter: Arc<CountingRebooter>,
}

impl Harness {
    pub fn slides_dir(&self) -> PathBuf {
        self.config.paths.slideshow_dir.clone()
    }

    pub fn add_slides(&self, names: &[&str]) {
        let dir = self.slides_dir();
        std::fs::create_dir_all(&dir).unwrap();
        for name in names {
            std::fs::write(dir.join(name), b"img").unwrap();
        }
    }
}

struct SharedFeed(Arc<StaticFeed>);

#[async_trait]
impl FeedFetcher for SharedFeed {
    async fn fetch_entries(&self, url: &str) -> Result<Vec<FeedEntry>> {
        self.0.fetch_entries(url).await
    }
}

pub fn entries(titles: &[&str]) -> Vec<FeedEntry> {
    titles
        .iter()
        .map(|t| FeedEntry {
            title: t.to_string(),
            body: format!("<p>About {}</p>", t),
        })
        .collect()
}

pub fn test_config(tmp: &TempDir) -> Config {
    let mut config = Config::default();
    config.paths.state_dir = tmp.path().join("state");
    config.paths.slideshow_dir = tmp.path().join("slides");
    config.paths.notes_backup_dir = tmp.path().join("joplin");
    config.paths.env_file = tmp.path().join(".env");
    config.network.reboot_threshold = 3;
    config.feed.url = Some(FEED_URL.to_string());
    config
}

pub fn harness(render_delay: Duration) -> Harness {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(&tmp);
    build(tmp, config, render_delay)
}

pub fn build(tmp: TempDir, config: Config, render_delay: Duration) -> Harness {
    let display = Arc::new(RecordingDisplay::with_delay(render_delay));
    let feed = Arc::new(StaticFeed {
        entries: entries(&["Alpha", "Beta", "Gamma"]),
        fail: AtomicBool::new(false),
    });
    let probe = Arc::new(ToggleProbe::default());
    let rebooter = Arc::new(CountingRebooter::default());
    let state_dir = config.paths.state_dir.clone();

    let scheduler = Scheduler::from_config(&config, display.clone())
        .unwrap()
        .with_feed(FeedSource::new(
            Box::new(SharedFeed(feed.clone())),
            &state_dir,
            &config.feed,
        ))
        .with_notes(NotesSource::new(Arc::new(FixedNotes), &state_dir, &config.notes))
        .with_probe(probe.clone())
        .with_rebooter(rebooter.clone())
        .with_hostname("inky.local")
        .with_feed_url(Some(FEED_URL.to_string()));

    Harness {
        tmp,
        config,
        scheduler: Arc::new(scheduler),
        display,
        feed,
        probe,
        rebooter,
    }
}

/// Poll `cond` until it holds or two seconds pass.
pub async fn wait_for(cond: impl Fn() -> bool) -> bool {
    for _ in 0..200 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}

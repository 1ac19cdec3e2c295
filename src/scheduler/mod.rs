pub mod control;
pub mod status;

pub use control::{Command, ControlLoop, LoopOptions, SchedulerHandle};
pub use status::{SchedulerState, SchedulerStatus};

use crate::config::Config;
use crate::display::{display_time, local_ipv4, DisplayRenderer, PanelContent, Payload};
use crate::error::{RefreshError, Result};
use crate::feed::rss::HttpFeedFetcher;
use crate::feed::types::FeedItem;
use crate::feed::FeedSource;
use crate::health::{SourceHealth, SourceStatus};
use crate::network::{CommandRebooter, DnsProbe, Escalation, NetworkMonitor, NetworkProbe, Rebooter};
use crate::notes::{BackupNoteReader, NotesSource};
use crate::slideshow::{Slide, SlideshowSource};
use crate::state::{DisplayMode, IntervalStore, ModeStore, INTERVAL_FILE, MODE_FILE, SLIDESHOW_FILE};
use chrono::Local;
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

const SLIDESHOW_TITLE: &str = "Slideshow";

/// What a call to [`Scheduler::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Rendered,
    /// Failure recorded in `last_error`.
    Failed,
    /// A render was already in flight; the request will run right after it.
    Latched,
    /// The offline threshold was crossed and the device reboot was issued.
    RebootIssued,
}

/// Render guard and latch. Both flags change under one lock so a request
/// made while a render is finishing cannot be dropped.
#[derive(Debug, Default)]
struct TickGate {
    rendering: bool,
    requested: bool,
}

impl TickGate {
    /// Claim the render slot, or latch a rerun if it is taken.
    fn enter(&mut self) -> bool {
        if self.rendering {
            self.requested = true;
            false
        } else {
            self.rendering = true;
            true
        }
    }

    /// Called by the slot holder after a render. Returns true when a latched
    /// request is pending, in which case the holder keeps the slot and reruns.
    fn finish(&mut self) -> bool {
        if std::mem::take(&mut self.requested) {
            true
        } else {
            self.rendering = false;
            false
        }
    }
}

/// Decides what the panel shows and guarantees at most one render in flight.
pub struct Scheduler {
    modes: ModeStore,
    intervals: IntervalStore,
    feed: FeedSource,
    notes: NotesSource,
    slideshow: SlideshowSource,
    probe: Arc<dyn NetworkProbe>,
    rebooter: Arc<dyn Rebooter>,
    display: Arc<dyn DisplayRenderer>,
    hostname: Option<String>,
    feed_url: RwLock<Option<String>>,
    monitor: Mutex<NetworkMonitor>,
    gate: Mutex<TickGate>,
    // Set by refresh_now; the next slideshow pick repeats instead of advancing.
    hold_rotation: AtomicBool,
    status: watch::Sender<SchedulerStatus>,
}

impl Scheduler {
    pub fn from_config(config: &Config, display: Arc<dyn DisplayRenderer>) -> Result<Self> {
        let state_dir = config.paths.state_dir.as_path();
        let fetcher = HttpFeedFetcher::new(Duration::from_millis(config.feed.request_timeout_ms))?;
        let reader = BackupNoteReader::new(
            &config.paths.notes_backup_dir,
            &config.notes.subdir,
            config.notes.metadata_lines,
        );
        let (status, _) = watch::channel(SchedulerStatus::default());

        Ok(Self {
            modes: ModeStore::new(state_dir.join(MODE_FILE)),
            intervals: IntervalStore::new(
                state_dir.join(INTERVAL_FILE),
                config.scheduler.default_interval_minutes,
            ),
            feed: FeedSource::new(Box::new(fetcher), state_dir, &config.feed),
            notes: NotesSource::new(Arc::new(reader), state_dir, &config.notes),
            slideshow: SlideshowSource::new(&config.paths.slideshow_dir, state_dir.join(SLIDESHOW_FILE)),
            probe: Arc::new(DnsProbe::new(&config.network)),
            rebooter: Arc::new(CommandRebooter::new(config.network.reboot_command.clone())),
            display,
            hostname: None,
            feed_url: RwLock::new(config.feed_url()),
            monitor: Mutex::new(NetworkMonitor::new(config.network.reboot_threshold)),
            gate: Mutex::new(TickGate::default()),
            hold_rotation: AtomicBool::new(false),
            status,
        })
    }

    pub fn with_feed(mut self, feed: FeedSource) -> Self {
        self.feed = feed;
        self
    }

    pub fn with_notes(mut self, notes: NotesSource) -> Self {
        self.notes = notes;
        self
    }

    pub fn with_probe(mut self, probe: Arc<dyn NetworkProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_rebooter(mut self, rebooter: Arc<dyn Rebooter>) -> Self {
        self.rebooter = rebooter;
        self
    }

    /// Fixed header hostname instead of detecting the local address each tick.
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    pub fn with_feed_url(self, url: Option<String>) -> Self {
        *self.feed_url.write().unwrap_or_else(|p| p.into_inner()) = url;
        self
    }

    pub fn status(&self) -> SchedulerStatus {
        let mut snapshot = self.status.borrow().clone();
        snapshot.mode = self.modes.read();
        snapshot.interval_minutes = self.intervals.read();
        snapshot
    }

    pub fn subscribe(&self) -> watch::Receiver<SchedulerStatus> {
        self.status.subscribe()
    }

    pub fn mode(&self) -> DisplayMode {
        self.modes.read()
    }

    pub fn interval_minutes(&self) -> u32 {
        self.intervals.read()
    }

    pub fn feed_url(&self) -> Option<String> {
        self.feed_url.read().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn feed(&self) -> &FeedSource {
        &self.feed
    }

    /// Persist the mode. Entering slideshow restarts rotation at the first image.
    pub fn set_mode(&self, mode: DisplayMode) -> Result<()> {
        self.modes.write(mode)?;
        if mode == DisplayMode::Slideshow {
            self.slideshow.reset_cursor()?;
        }
        tracing::info!(%mode, "display mode set");
        Ok(())
    }

    /// Persist the interval clamped to [5, 180] and return the applied value.
    /// Re-arming the timer is the control loop's job.
    pub fn set_interval(&self, minutes: i64) -> Result<u32> {
        let applied = self.intervals.write(minutes)?;
        if applied as i64 != minutes {
            tracing::warn!(requested = minutes, applied, "interval clamped");
        }
        Ok(applied)
    }

    pub fn pin_image(&self, filename: &str) -> Result<()> {
        self.slideshow.pin(filename)?;
        tracing::info!(file = %filename, "slideshow image pinned");
        Ok(())
    }

    pub fn remove_image(&self, filename: &str) -> Result<()> {
        self.slideshow.remove(filename)
    }

    pub fn list_images(&self) -> Result<Vec<String>> {
        self.slideshow.list()
    }

    /// Next feed item without advancing rotation or touching the cache.
    pub async fn preview_feed(&self) -> Result<FeedItem> {
        let url = self.feed_url();
        self.feed.peek(url.as_deref()).await
    }

    /// Pick up a reloaded config. Returns whether the feed URL changed,
    /// in which case feed rotation starts over.
    pub fn apply_config(&self, config: &Config) -> Result<bool> {
        let url = config.feed_url();
        {
            let mut current = self.feed_url.write().unwrap_or_else(|p| p.into_inner());
            if *current == url {
                return Ok(false);
            }
            *current = url;
        }
        tracing::info!("feed URL changed, resetting rotation");
        self.feed.reset_rotation()?;
        Ok(true)
    }

    /// Run a tick on the runtime without waiting for it.
    pub fn spawn_tick(self: &Arc<Self>) -> JoinHandle<TickOutcome> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.tick().await })
    }

    /// Refresh immediately if idle, otherwise latch behind the in-flight render.
    /// `image` is a one-shot override for the next slideshow pick.
    pub fn refresh_now(self: &Arc<Self>, image: Option<&str>) -> JoinHandle<TickOutcome> {
        if let Some(image) = image {
            self.slideshow.set_override(image);
        }
        self.hold_rotation.store(true, Ordering::Release);
        tracing::info!(image = ?image, "immediate refresh requested");
        self.spawn_tick()
    }

    /// Guarded, non-reentrant entry point. Never fails; errors end up in the status.
    pub async fn tick(&self) -> TickOutcome {
        let entered = self.lock_gate().enter();
        if !entered {
            tracing::info!("render in flight, refresh latched");
            return TickOutcome::Latched;
        }

        let outcome = self.run_tick().await;

        loop {
            let rerun = self.lock_gate().finish();
            if !rerun {
                break;
            }
            tracing::info!("running latched refresh");
            self.run_tick().await;
        }

        outcome
    }

    fn lock_gate(&self) -> MutexGuard<'_, TickGate> {
        self.gate.lock().unwrap_or_else(|p| p.into_inner())
    }

    async fn run_tick(&self) -> TickOutcome {
        let started = Local::now();
        self.status.send_modify(|s| {
            s.state = SchedulerState::Rendering;
            s.last_run_at = Some(started);
        });
        tracing::info!("tick started");

        let result = AssertUnwindSafe(self.refresh()).catch_unwind().await;

        let outcome = match result {
            Ok(Ok(())) => {
                self.status.send_modify(|s| {
                    s.last_success_at = Some(started);
                    s.last_error = None;
                });
                tracing::info!("display updated");
                TickOutcome::Rendered
            }
            Ok(Err(RefreshError::FatalNetworkLoss { .. })) => TickOutcome::RebootIssued,
            Ok(Err(e)) => {
                tracing::error!(error = %e, "tick failed");
                self.status.send_modify(|s| s.last_error = Some(e.to_string()));
                TickOutcome::Failed
            }
            Err(_) => {
                tracing::error!("tick panicked");
                self.status
                    .send_modify(|s| s.last_error = Some("internal error during refresh".to_string()));
                TickOutcome::Failed
            }
        };

        self.status.send_modify(|s| s.state = SchedulerState::Idle);
        outcome
    }

    /// Probe, read sources, build the payload, render. Strictly sequential.
    async fn refresh(&self) -> Result<()> {
        let online = self.probe.probe().await;
        let (escalation, offline_count) = {
            let mut monitor = self.monitor.lock().unwrap_or_else(|p| p.into_inner());
            (monitor.record(online), monitor.consecutive_failures())
        };
        self.status.send_modify(|s| {
            s.network = SourceHealth::observed(if online {
                SourceStatus::Online
            } else {
                SourceStatus::Offline
            });
            s.consecutive_offline = offline_count;
        });

        if let Escalation::Reboot { failures } = escalation {
            tracing::error!(failures, "network unreachable too long, rebooting device");
            if let Err(e) = self.rebooter.reboot().await {
                tracing::error!(error = %e, "reboot command failed");
            }
            return Err(RefreshError::FatalNetworkLoss { failures });
        }
        if !online {
            tracing::warn!(consecutive = offline_count, "network offline, sources may serve cached data");
        }

        let mode = self.modes.read();

        let notes = self.notes.fetch().await;
        self.status.send_modify(|s| s.notes = SourceHealth::observed(notes.status));

        let hold = self.hold_rotation.swap(false, Ordering::AcqRel);
        let content = match mode {
            DisplayMode::Slideshow => self.next_slide(!hold)?,
            DisplayMode::Feed => self.next_feed_item().await,
        };

        let payload = Payload {
            hostname: self.hostname.clone().unwrap_or_else(local_ipv4),
            time: display_time(Local::now()),
            todos: notes.todos,
            content,
        };
        self.display.render(&payload).await
    }

    fn next_slide(&self, advance: bool) -> Result<PanelContent> {
        let slide = self.slideshow.pick_next(advance)?;
        let (image, content) = match slide {
            Slide::Image(name) => {
                let path = self.slideshow.path_for(&name);
                (Some(name), PanelContent::Image(path))
            }
            Slide::NoImages => {
                tracing::warn!(dir = %self.slideshow.dir().display(), "slideshow has no images");
                (None, PanelContent::NoImages)
            }
        };
        self.status.send_modify(|s| {
            s.current_title = Some(SLIDESHOW_TITLE.to_string());
            s.current_image = image;
        });
        Ok(content)
    }

    async fn next_feed_item(&self) -> PanelContent {
        let url = self.feed_url();
        let outcome = self.feed.fetch(url.as_deref()).await;
        self.status.send_modify(|s| {
            s.feed = SourceHealth::observed(outcome.status);
            s.current_title = Some(outcome.item.title.clone());
            s.current_feed_item = Some(outcome.item.clone());
        });
        PanelContent::Feed(outcome.item)
    }
}

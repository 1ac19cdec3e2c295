use super::{Scheduler, SchedulerStatus};
use crate::config::Config;
use crate::error::{RefreshError, Result};
use crate::feed::types::FeedItem;
use crate::state::DisplayMode;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};

/// Requests accepted by the control loop. Commands that can be rejected
/// carry a reply channel; the rejection never affects a running tick.
#[derive(Debug)]
pub enum Command {
    RefreshNow {
        image: Option<String>,
    },
    SetMode {
        mode: DisplayMode,
        reply: oneshot::Sender<Result<()>>,
    },
    SetInterval {
        minutes: i64,
        reply: oneshot::Sender<Result<u32>>,
    },
    PinImage {
        filename: String,
        reply: oneshot::Sender<Result<()>>,
    },
    RemoveImage {
        filename: String,
        reply: oneshot::Sender<Result<()>>,
    },
    SetFeedUrl {
        url: String,
        reply: oneshot::Sender<Result<()>>,
    },
    ReloadConfig {
        reply: oneshot::Sender<Result<bool>>,
    },
    Stop,
}

#[derive(Debug, Clone)]
pub struct LoopOptions {
    /// Length of one interval unit. Tests shrink it.
    pub minute: Duration,
    /// Re-read on `ReloadConfig`; `None` keeps the startup config.
    pub config_path: Option<PathBuf>,
}

impl Default for LoopOptions {
    fn default() -> Self {
        Self {
            minute: Duration::from_secs(60),
            config_path: None,
        }
    }
}

/// Owns the periodic timer. All re-arming happens on this one task, so a
/// changed interval replaces the timer instead of stacking a second one.
pub struct ControlLoop {
    scheduler: Arc<Scheduler>,
    config: Config,
    options: LoopOptions,
    rx: mpsc::Receiver<Command>,
}

impl ControlLoop {
    /// Start the loop: arm the timer and run one immediate tick.
    pub fn spawn(
        scheduler: Arc<Scheduler>,
        config: Config,
        options: LoopOptions,
    ) -> (SchedulerHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel::<Command>(16);
        let handle = SchedulerHandle {
            tx,
            scheduler: Arc::clone(&scheduler),
        };
        let control = ControlLoop {
            scheduler,
            config,
            options,
            rx,
        };
        (handle, tokio::spawn(control.run()))
    }

    fn arm(&self, minutes: u32) -> Interval {
        let period = self.options.minute * minutes;
        let mut timer = tokio::time::interval_at(Instant::now() + period, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        timer
    }

    async fn run(mut self) {
        let minutes = self.scheduler.interval_minutes();
        tracing::info!(minutes, mode = %self.scheduler.mode(), "scheduler started");
        let mut timer = self.arm(minutes);
        self.scheduler.spawn_tick();

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    self.scheduler.spawn_tick();
                }
                cmd = self.rx.recv() => {
                    let Some(cmd) = cmd else { break };
                    if matches!(cmd, Command::Stop) {
                        break;
                    }
                    if let Some(minutes) = self.handle(cmd) {
                        timer = self.arm(minutes);
                        tracing::info!(minutes, "refresh timer re-armed");
                    }
                }
            }
        }

        tracing::info!("scheduler stopped");
    }

    /// Apply one command. Returns a new interval when the timer must be re-armed.
    fn handle(&mut self, cmd: Command) -> Option<u32> {
        match cmd {
            Command::RefreshNow { image } => {
                self.scheduler.refresh_now(image.as_deref());
                None
            }
            Command::SetMode { mode, reply } => {
                let result = self.scheduler.set_mode(mode);
                if result.is_ok() {
                    self.scheduler.spawn_tick();
                }
                let _ = reply.send(result);
                None
            }
            Command::SetInterval { minutes, reply } => {
                let result = self.scheduler.set_interval(minutes);
                let applied = result.as_ref().ok().copied();
                let _ = reply.send(result);
                applied
            }
            Command::PinImage { filename, reply } => {
                let result = self.scheduler.pin_image(&filename);
                if result.is_ok() {
                    self.scheduler.refresh_now(None);
                }
                let _ = reply.send(result);
                None
            }
            Command::RemoveImage { filename, reply } => {
                let result = self.scheduler.remove_image(&filename);
                if result.is_ok() {
                    self.scheduler.refresh_now(None);
                }
                let _ = reply.send(result);
                None
            }
            Command::SetFeedUrl { url, reply } => {
                let result = self
                    .config
                    .save_feed_url(&url)
                    .and_then(|()| self.reload())
                    .map(|_| ());
                if result.is_ok() {
                    self.scheduler.refresh_now(None);
                }
                let _ = reply.send(result);
                None
            }
            Command::ReloadConfig { reply } => {
                let _ = reply.send(self.reload());
                None
            }
            Command::Stop => None,
        }
    }

    fn reload(&mut self) -> Result<bool> {
        if let Some(path) = &self.options.config_path {
            self.config = Config::resolve(path)
                .map_err(|e| RefreshError::InvalidInput(format!("config reload failed: {:#}", e)))?;
        }
        Config::load_env_file(&self.config.paths.env_file, true);
        self.config.apply_env_overrides();
        self.scheduler.apply_config(&self.config)
    }
}

/// Cloneable front door to a running control loop.
#[derive(Clone)]
pub struct SchedulerHandle {
    tx: mpsc::Sender<Command>,
    scheduler: Arc<Scheduler>,
}

impl SchedulerHandle {
    pub fn status(&self) -> SchedulerStatus {
        self.scheduler.status()
    }

    pub fn subscribe(&self) -> watch::Receiver<SchedulerStatus> {
        self.scheduler.subscribe()
    }

    pub fn list_images(&self) -> Result<Vec<String>> {
        self.scheduler.list_images()
    }

    pub async fn preview_feed(&self) -> Result<FeedItem> {
        self.scheduler.preview_feed().await
    }

    /// Returns once the request is queued, not when the render finishes.
    pub async fn refresh_now(&self, image: Option<String>) -> Result<()> {
        self.send(Command::RefreshNow { image }).await
    }

    pub async fn set_mode(&self, mode: DisplayMode) -> Result<()> {
        self.request(|reply| Command::SetMode { mode, reply }).await
    }

    pub async fn set_interval(&self, minutes: i64) -> Result<u32> {
        self.request(|reply| Command::SetInterval { minutes, reply }).await
    }

    pub async fn pin_image(&self, filename: impl Into<String>) -> Result<()> {
        let filename = filename.into();
        self.request(|reply| Command::PinImage { filename, reply }).await
    }

    pub async fn remove_image(&self, filename: impl Into<String>) -> Result<()> {
        let filename = filename.into();
        self.request(|reply| Command::RemoveImage { filename, reply }).await
    }

    pub async fn set_feed_url(&self, url: impl Into<String>) -> Result<()> {
        let url = url.into();
        self.request(|reply| Command::SetFeedUrl { url, reply }).await
    }

    /// Returns whether the feed URL changed.
    pub async fn reload_config(&self) -> Result<bool> {
        self.request(|reply| Command::ReloadConfig { reply }).await
    }

    /// Cancel the timer. A render already in flight is left to finish.
    pub async fn stop(&self) -> Result<()> {
        self.send(Command::Stop).await
    }

    async fn send(&self, cmd: Command) -> Result<()> {
        self.tx.send(cmd).await.map_err(|_| RefreshError::SchedulerStopped)
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<Result<T>>) -> Command) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.send(make(reply)).await?;
        rx.await.map_err(|_| RefreshError::SchedulerStopped)?
    }
}

//! Boundary to the e-paper panel.
//!
//! Drawing itself happens in an external renderer; this module owns the
//! payload shape and the single FIFO queue every device write goes through.

use crate::config::DisplayConfig;
use crate::error::{RefreshError, Result};
use crate::feed::types::FeedItem;
use crate::notes::Todo;
use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Right-hand pane: a feed item or a slideshow image, never both.
#[derive(Debug, Clone, PartialEq)]
pub enum PanelContent {
    Feed(FeedItem),
    Image(PathBuf),
    /// Slideshow mode with an empty directory; the pane stays blank.
    NoImages,
}

/// Everything one render needs. Built and consumed within a single tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    pub hostname: String,
    pub time: String,
    pub todos: Vec<Todo>,
    pub content: PanelContent,
}

/// JSON shape understood by the renderer script.
#[derive(Serialize)]
struct WirePayload<'a> {
    hostname: &'a str,
    time: &'a str,
    todos: &'a [Todo],
    #[serde(skip_serializing_if = "Option::is_none")]
    rss: Option<&'a FeedItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<&'a PathBuf>,
}

impl Payload {
    pub fn to_json(&self) -> Result<String> {
        let (rss, image) = match &self.content {
            PanelContent::Feed(item) => (Some(item), None),
            PanelContent::Image(path) => (None, Some(path)),
            PanelContent::NoImages => (None, None),
        };
        Ok(serde_json::to_string(&WirePayload {
            hostname: &self.hostname,
            time: &self.time,
            todos: &self.todos,
            rss,
            image,
        })?)
    }
}

/// Header clock, e.g. `18 Oct 14:05`.
pub fn display_time(now: DateTime<Local>) -> String {
    now.format("%d %b %H:%M").to_string()
}

/// First non-loopback IPv4 address on any interface, shown so the settings
/// page can be found. A LAN address counts even without a default route.
pub fn local_ipv4() -> String {
    first_ipv4(interface_ipv4s())
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "offline".to_string())
}

fn first_ipv4(addrs: impl IntoIterator<Item = Ipv4Addr>) -> Option<Ipv4Addr> {
    addrs
        .into_iter()
        .find(|ip| !ip.is_loopback() && !ip.is_unspecified())
}

#[cfg(unix)]
fn interface_ipv4s() -> Vec<Ipv4Addr> {
    match nix::ifaddrs::getifaddrs() {
        Ok(ifaddrs) => ifaddrs
            .filter_map(|ifa| ifa.address.as_ref().and_then(|a| a.as_sockaddr_in()).map(|sin| sin.ip()))
            .collect(),
        Err(e) => {
            tracing::warn!(error = %e, "failed to list network interfaces");
            Vec::new()
        }
    }
}

#[cfg(not(unix))]
fn interface_ipv4s() -> Vec<Ipv4Addr> {
    Vec::new()
}

#[async_trait]
pub trait DisplayRenderer: Send + Sync {
    async fn render(&self, payload: &Payload) -> Result<()>;
    async fn boot_message(&self, text: &str) -> Result<()>;
}

/// Spawns `<program> <script> <mode> <json>` per draw; exit status 0 means drawn.
pub struct EpdProcessRenderer {
    program: String,
    script: PathBuf,
}

impl EpdProcessRenderer {
    pub fn new(config: &DisplayConfig) -> Self {
        Self {
            program: config.program.clone(),
            script: config.script.clone(),
        }
    }

    async fn run(&self, mode: &str, json: String) -> Result<()> {
        let output = tokio::process::Command::new(&self.program)
            .arg(&self.script)
            .arg(mode)
            .arg(json)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| RefreshError::RenderFailure(format!("failed to start renderer: {}", e)))?;

        for line in String::from_utf8_lossy(&output.stderr).lines().filter(|l| !l.trim().is_empty()) {
            tracing::warn!(target: "inky_refresh::epd", "{}", line);
        }

        if !output.status.success() {
            return Err(RefreshError::RenderFailure(format!(
                "renderer exited with {}",
                output.status
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl DisplayRenderer for EpdProcessRenderer {
    async fn render(&self, payload: &Payload) -> Result<()> {
        self.run("render", payload.to_json()?).await
    }

    async fn boot_message(&self, text: &str) -> Result<()> {
        let json = serde_json::json!({ "message": text }).to_string();
        self.run("boot", json).await
    }
}

/// Serializes every device write through one FIFO queue and bounds each
/// render with a watchdog. Clones share the queue.
#[derive(Clone)]
pub struct SerializedDisplay {
    inner: Arc<dyn DisplayRenderer>,
    queue: Arc<Mutex<()>>,
    render_timeout: Duration,
}

impl SerializedDisplay {
    pub fn new(inner: Arc<dyn DisplayRenderer>, render_timeout: Duration) -> Self {
        Self {
            inner,
            queue: Arc::new(Mutex::new(())),
            render_timeout,
        }
    }

    fn watchdog_expired(&self) -> RefreshError {
        RefreshError::RenderFailure(format!("render exceeded watchdog of {:?}", self.render_timeout))
    }
}

#[async_trait]
impl DisplayRenderer for SerializedDisplay {
    async fn render(&self, payload: &Payload) -> Result<()> {
        let _turn = self.queue.lock().await;
        tokio::time::timeout(self.render_timeout, self.inner.render(payload))
            .await
            .map_err(|_| self.watchdog_expired())?
    }

    async fn boot_message(&self, text: &str) -> Result<()> {
        let _turn = self.queue.lock().await;
        tokio::time::timeout(self.render_timeout, self.inner.boot_message(text))
            .await
            .map_err(|_| self.watchdog_expired())?
    }
}

use crate::config::NetworkConfig;
use crate::error::{RefreshError, Result};
use async_trait::async_trait;
use std::time::Duration;

#[async_trait]
pub trait NetworkProbe: Send + Sync {
    /// One bounded reachability check.
    async fn probe(&self) -> bool;
}

/// Resolves a well-known host; name resolution is enough to tell online from offline.
pub struct DnsProbe {
    host: String,
    timeout: Duration,
}

impl DnsProbe {
    pub fn new(config: &NetworkConfig) -> Self {
        Self {
            host: config.probe_host.clone(),
            timeout: Duration::from_millis(config.probe_timeout_ms),
        }
    }
}

#[async_trait]
impl NetworkProbe for DnsProbe {
    async fn probe(&self) -> bool {
        match tokio::time::timeout(self.timeout, tokio::net::lookup_host(self.host.as_str())).await {
            Ok(Ok(mut addrs)) => addrs.next().is_some(),
            Ok(Err(e)) => {
                tracing::debug!(host = %self.host, error = %e, "probe lookup failed");
                false
            }
            Err(_) => {
                tracing::debug!(host = %self.host, "probe timed out");
                false
            }
        }
    }
}

#[async_trait]
pub trait Rebooter: Send + Sync {
    async fn reboot(&self) -> Result<()>;
}

/// Runs the configured reboot command, e.g. `sudo /sbin/reboot`.
pub struct CommandRebooter {
    command: Vec<String>,
}

impl CommandRebooter {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }
}

#[async_trait]
impl Rebooter for CommandRebooter {
    async fn reboot(&self) -> Result<()> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| RefreshError::InvalidInput("empty reboot command".to_string()))?;
        let status = tokio::process::Command::new(program).args(args).status().await?;
        if !status.success() {
            return Err(RefreshError::SourceUnavailable(format!(
                "reboot command exited with {}",
                status
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escalation {
    None,
    Reboot { failures: u32 },
}

/// Consecutive-offline counter. Crossing the threshold asks for a reboot
/// once per episode; any online probe ends the episode.
#[derive(Debug)]
pub struct NetworkMonitor {
    threshold: u32,
    consecutive_failures: u32,
    reboot_requested: bool,
}

impl NetworkMonitor {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            consecutive_failures: 0,
            reboot_requested: false,
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn record(&mut self, online: bool) -> Escalation {
        if online {
            self.consecutive_failures = 0;
            self.reboot_requested = false;
            return Escalation::None;
        }
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        if self.consecutive_failures >= self.threshold && !self.reboot_requested {
            self.reboot_requested = true;
            return Escalation::Reboot {
                failures: self.consecutive_failures,
            };
        }
        Escalation::None
    }
}

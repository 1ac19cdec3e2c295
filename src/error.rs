use std::io;
use std::time::Duration;

/// Failure classes seen by the refresh path.
///
/// Source failures are degraded locally (cache, placeholder, empty list);
/// only render failures surface in the scheduler status.
#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("source empty: {0}")]
    SourceEmpty(String),

    #[error("{what} exceeded {budget:?}")]
    Timeout { what: &'static str, budget: Duration },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("render failed: {0}")]
    RenderFailure(String),

    #[error("network unreachable for {failures} consecutive probes")]
    FatalNetworkLoss { failures: u32 },

    #[error("scheduler is not running")]
    SchedulerStopped,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RefreshError {
    /// Whether this error was caused by caller input rather than a source.
    pub fn is_user_error(&self) -> bool {
        matches!(self, RefreshError::InvalidInput(_))
    }

    /// Timeouts are handled exactly like an unreachable source.
    pub fn is_source_unavailable(&self) -> bool {
        matches!(
            self,
            RefreshError::SourceUnavailable(_) | RefreshError::Timeout { .. } | RefreshError::Io(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, RefreshError>;

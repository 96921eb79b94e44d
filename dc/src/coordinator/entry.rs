//! Active-update entries and their cancellation handles

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Caller-supplied cancellation callback, invoked at most once
pub struct CancelHandle(Box<dyn FnOnce() + Send + Sync + 'static>);

impl CancelHandle {
    /// Wrap an arbitrary cancellation callback
    pub fn new(f: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self(Box::new(f))
    }

    /// Consume the handle, running the callback
    pub(crate) fn invoke(self) {
        (self.0)()
    }
}

impl From<CancellationToken> for CancelHandle {
    fn from(token: CancellationToken) -> Self {
        Self::new(move || token.cancel())
    }
}

impl fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CancelHandle")
    }
}

/// An admitted update for one device key
#[derive(Debug)]
pub(crate) struct ActiveUpdate {
    pub started_at: Instant,
    pub cancel: Option<CancelHandle>,
}

impl ActiveUpdate {
    pub fn new(cancel: Option<CancelHandle>) -> Self {
        Self {
            started_at: Instant::now(),
            cancel,
        }
    }

    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started_at)
    }

    /// Fresh entries are strictly younger than the threshold
    pub fn is_stale(&self, now: Instant, staleness: Duration) -> bool {
        self.age(now) >= staleness
    }
}

// src/engine/ticker.rs

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Paces a polling loop.
///
/// [`Ticker::wait`] sleeps for one interval, returns early when woken, and
/// reports whether the loop should go on. Cancellation is only observed
/// here, between iterations.
#[derive(Debug, Clone)]
pub struct Ticker {
    interval: Duration,
    cancel: CancellationToken,
    wake: Option<Arc<Notify>>,
}

impl Ticker {
    pub fn new(interval: Duration, cancel: CancellationToken) -> Self {
        Self {
            interval,
            cancel,
            wake: None,
        }
    }

    /// Also end the wait when `wake` is notified.
    pub fn with_wake(mut self, wake: Arc<Notify>) -> Self {
        self.wake = Some(wake);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// `false` once a stop was requested.
    pub async fn wait(&self) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(self.interval) => true,
            _ = wake_signal(self.wake.as_deref()) => {
                debug!("woken early by vault change");
                true
            }
        }
    }
}

async fn wake_signal(wake: Option<&Notify>) {
    match wake {
        Some(notify) => notify.notified().await,
        None => std::future::pending::<()>().await,
    }
}

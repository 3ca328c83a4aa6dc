// Package shutdown cancels in-flight work on SIGINT and drains pending
// observer notifications before the process exits.

use std::time::Duration;
use tokio::signal;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
#[error("notification drain timeout exceeded")]
pub struct TimeoutError;

#[derive(Clone)]
pub struct GracefulShutdown {
    token: CancellationToken,
    tracker: TaskTracker,
    timeout: Duration,
}

impl GracefulShutdown {
    pub fn new(token: CancellationToken, tracker: TaskTracker, timeout: Duration) -> Self {
        Self {
            token,
            tracker,
            timeout,
        }
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn tracker(&self) -> TaskTracker {
        self.tracker.clone()
    }

    /// Cancels the token on the first SIGINT. Returns once either the signal
    /// arrives or the token is cancelled elsewhere.
    pub fn listen_for_signal(&self) -> tokio::task::JoinHandle<()> {
        let token = self.token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = signal::ctrl_c() => {
                    info!(
                        component = "graceful-shutdown",
                        event = "os_signal",
                        signal = "SIGINT",
                        "cancellation started"
                    );
                    token.cancel();
                }
                _ = token.cancelled() => {}
            }
        })
    }

    /// Closes the tracker and waits for spawned notifications to finish.
    pub async fn drain(&self) -> Result<(), TimeoutError> {
        self.tracker.close();

        match timeout(self.timeout, self.tracker.wait()).await {
            Ok(()) => {
                info!(
                    component = "graceful-shutdown",
                    event = "drain_success",
                    "pending notifications delivered"
                );
                Ok(())
            }
            Err(_) => {
                warn!(
                    component = "graceful-shutdown",
                    event = "drain_timeout",
                    timeout = %humantime::format_duration(self.timeout),
                    pending = self.tracker.len(),
                    "not all notifications were delivered within timeout"
                );
                Err(TimeoutError)
            }
        }
    }

    /// Stops the signal listener and drains.
    pub async fn finish(&self) -> Result<(), TimeoutError> {
        self.token.cancel();
        self.drain().await
    }
}

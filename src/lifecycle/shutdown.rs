//! Shutdown watchdog.
//!
//! Bounds the time spent waiting for a service instance to stop. A stop that
//! does not finish before the deadline is reported as [`ShutdownTimeout`],
//! which the process entry point must turn into an immediate exit.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinError;

/// Deadline used when none is configured.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(3);

/// A stop operation did not complete within its deadline.
///
/// This is a fatal fault: the caller must not continue supervising.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("service did not close within {deadline:?}")]
pub struct ShutdownTimeout {
    pub deadline: Duration,
}

/// Timed guard around a stop operation.
#[derive(Debug, Clone, Copy)]
pub struct ShutdownWatchdog {
    deadline: Duration,
}

impl ShutdownWatchdog {
    pub fn new(deadline: Duration) -> Self {
        Self { deadline }
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Drive `stop` to completion unless the deadline elapses first.
    ///
    /// The stop runs on its own task, so a stop that blocks its worker
    /// thread still cannot hold back the deadline on a multi-thread
    /// runtime. A stop that has finished by the time the deadline fires
    /// wins. The deadline is never extended and the stop is never retried;
    /// after a timeout the stop task is left detached.
    pub async fn guard<F>(&self, stop: F) -> Result<F::Output, ShutdownTimeout>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let mut task = tokio::spawn(stop);

        tokio::select! {
            biased;
            joined = &mut task => return self.finish(joined),
            _ = tokio::time::sleep(self.deadline) => {}
        }

        tokio::task::yield_now().await;
        if task.is_finished() {
            return self.finish(task.await);
        }

        tracing::error!(deadline = ?self.deadline, "Service did not close before the deadline");
        Err(ShutdownTimeout {
            deadline: self.deadline,
        })
    }

    fn finish<T>(&self, joined: Result<T, JoinError>) -> Result<T, ShutdownTimeout> {
        match joined {
            Ok(output) => Ok(output),
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => {
                tracing::error!(error = %e, "Stop task was cancelled");
                Err(ShutdownTimeout {
                    deadline: self.deadline,
                })
            }
        }
    }
}

impl Default for ShutdownWatchdog {
    fn default() -> Self {
        Self::new(DEFAULT_SHUTDOWN_TIMEOUT)
    }
}

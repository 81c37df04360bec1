//! OS signal handling.
//!
//! # Responsibilities
//! - Register signal handlers (SIGTERM, SIGINT, SIGHUP)
//! - Translate signals to internal events
//! - Hand events to the supervisor through a single-slot queue
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - SIGTERM/SIGINT map to `Terminate`, SIGHUP maps to `Reload`
//! - The queue holds one pending event: a newer event replaces an
//!   unconsumed one, but a pending `Terminate` is never replaced by `Reload`
//! - The listener is the only producer besides the config watcher

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::service::StartupError;

/// Supervisor-level notification derived from an OS signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalEvent {
    /// The process should exit.
    Terminate,
    /// The configuration should be re-read and swapped in.
    Reload,
}

impl SignalEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalEvent::Terminate => "terminate",
            SignalEvent::Reload => "reload",
        }
    }
}

impl fmt::Display for SignalEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct Shared {
    slot: Mutex<Option<SignalEvent>>,
    notify: Notify,
    senders: AtomicUsize,
}

impl Shared {
    fn lock(&self) -> std::sync::MutexGuard<'_, Option<SignalEvent>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_closed(&self) -> bool {
        self.senders.load(Ordering::Acquire) == 0
    }
}

/// Create a connected sender/receiver pair sharing one event slot.
pub fn signal_queue() -> (SignalSender, SignalReceiver) {
    let shared = Arc::new(Shared {
        slot: Mutex::new(None),
        notify: Notify::new(),
        senders: AtomicUsize::new(1),
    });
    (
        SignalSender {
            shared: shared.clone(),
        },
        SignalReceiver { shared },
    )
}

/// Producer side of the signal queue. Cloneable; never blocks.
pub struct SignalSender {
    shared: Arc<Shared>,
}

impl SignalSender {
    /// Offer an event, coalescing with whatever is still pending.
    pub fn send(&self, event: SignalEvent) {
        {
            let mut slot = self.shared.lock();
            match (*slot, event) {
                (Some(SignalEvent::Terminate), SignalEvent::Reload) => {
                    tracing::debug!("Reload dropped, terminate already pending");
                    return;
                }
                (Some(pending), _) => {
                    tracing::debug!(pending = %pending, event = %event, "Coalescing pending signal");
                }
                (None, _) => {}
            }
            *slot = Some(event);
        }
        self.shared.notify.notify_one();
    }
}

impl Clone for SignalSender {
    fn clone(&self) -> Self {
        self.shared.senders.fetch_add(1, Ordering::AcqRel);
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl Drop for SignalSender {
    fn drop(&mut self) {
        if self.shared.senders.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.shared.notify.notify_one();
        }
    }
}

/// Consumer side of the signal queue, owned by the supervisor.
pub struct SignalReceiver {
    shared: Arc<Shared>,
}

impl SignalReceiver {
    /// Wait for the next event. Returns `None` once every sender is gone
    /// and nothing is pending.
    pub async fn recv(&mut self) -> Option<SignalEvent> {
        loop {
            if let Some(event) = self.shared.lock().take() {
                return Some(event);
            }
            if self.shared.is_closed() {
                return None;
            }
            self.shared.notify.notified().await;
        }
    }

    /// Wait until a `Terminate` is pending and consume it, leaving a pending
    /// `Reload` in place. Returns `None` once every sender is gone.
    pub async fn recv_terminate(&mut self) -> Option<SignalEvent> {
        loop {
            {
                let mut slot = self.shared.lock();
                if *slot == Some(SignalEvent::Terminate) {
                    return slot.take();
                }
            }
            if self.shared.is_closed() {
                return None;
            }
            self.shared.notify.notified().await;
        }
    }

    /// Take the pending event without waiting.
    pub fn try_recv(&mut self) -> Option<SignalEvent> {
        self.shared.lock().take()
    }
}

/// Background task forwarding OS signals into a [`SignalSender`].
///
/// Unsubscribes from the OS when dropped.
pub struct SignalListener {
    task: JoinHandle<()>,
}

impl SignalListener {
    /// Register the OS handlers and start forwarding.
    #[cfg(unix)]
    pub fn spawn(sender: SignalSender) -> Result<Self, StartupError> {
        use tokio::signal::unix::{signal, SignalKind};

        let mut interrupt = signal(SignalKind::interrupt()).map_err(StartupError::Signals)?;
        let mut terminate = signal(SignalKind::terminate()).map_err(StartupError::Signals)?;
        let mut hangup = signal(SignalKind::hangup()).map_err(StartupError::Signals)?;

        let task = tokio::spawn(async move {
            loop {
                let (name, event) = tokio::select! {
                    Some(()) = interrupt.recv() => ("SIGINT", SignalEvent::Terminate),
                    Some(()) = terminate.recv() => ("SIGTERM", SignalEvent::Terminate),
                    Some(()) = hangup.recv() => ("SIGHUP", SignalEvent::Reload),
                    else => break,
                };
                tracing::info!(signal = name, event = %event, "Signal received");
                crate::observability::metrics::record_signal(event);
                sender.send(event);
            }
        });

        tracing::info!("Signal handlers registered (SIGINT, SIGTERM, SIGHUP)");
        Ok(Self { task })
    }

    /// Register the OS handlers and start forwarding.
    #[cfg(not(unix))]
    pub fn spawn(sender: SignalSender) -> Result<Self, StartupError> {
        let task = tokio::spawn(async move {
            loop {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %e, "Ctrl-C handler failed");
                    break;
                }
                tracing::info!(signal = "ctrl-c", "Signal received");
                crate::observability::metrics::record_signal(SignalEvent::Terminate);
                sender.send(SignalEvent::Terminate);
            }
        });

        tracing::info!("Signal handler registered (Ctrl-C)");
        Ok(Self { task })
    }

    /// Stop forwarding. The sender held by the listener is released once
    /// the task has wound down. Dropping the listener has the same effect.
    pub fn stop(self) {
        self.task.abort();
    }
}

impl Drop for SignalListener {
    fn drop(&mut self) {
        self.task.abort();
    }
}

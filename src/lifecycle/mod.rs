//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Supervisor (supervisor.rs):
//!     Acquire config → Validate → Instantiate (startup.rs) → Wait for signal
//!
//!     Reload:    Validate new config → Stop old instance → Instantiate new
//!                (invalid config: log, keep waiting on the old instance)
//!     Terminate: Stop instance → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Terminate
//!     SIGHUP → Reload
//!
//! Shutdown (shutdown.rs):
//!     Cancel token → Stop instance, raced against the watchdog deadline
//! ```
//!
//! # Design Decisions
//! - Never two instances running at once
//! - A working instance is never torn down for an unvalidated config
//! - Shutdown has timeout: forced exit after deadline

pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod supervisor;

pub use shutdown::{ShutdownTimeout, ShutdownWatchdog, DEFAULT_SHUTDOWN_TIMEOUT};
pub use signals::{signal_queue, SignalEvent, SignalListener, SignalReceiver, SignalSender};
pub use supervisor::{Exit, Supervisor, SupervisorError, SupervisorOptions};

//! Service supervisor.
//!
//! # Responsibilities
//! - Own the single active service instance for the life of the process
//! - Run the create → run → await-signal → reload-or-exit cycle
//! - Validate a reloaded configuration before touching the running instance
//! - Stop every instance under the shutdown watchdog
//!
//! # Design Decisions
//! - One task drives both loops; there is never more than one instance
//! - An instance is fully stopped before the next one is created
//! - The configuration that passed reload validation is the one the next
//!   instance is built from; it is not read a second time
//! - A failed reload validation is logged and the old instance keeps serving

use std::time::{Duration, Instant};

use thiserror::Error;

use crate::config::loader::ConfigError;
use crate::config::provider::ConfigProvider;
use crate::lifecycle::shutdown::{ShutdownTimeout, ShutdownWatchdog, DEFAULT_SHUTDOWN_TIMEOUT};
use crate::lifecycle::signals::{SignalEvent, SignalReceiver};
use crate::lifecycle::startup::instantiate;
use crate::observability::metrics;
use crate::service::{ServiceFactory, ServiceHandle, StartupError};

/// Tunables for [`Supervisor`].
#[derive(Debug, Clone)]
pub struct SupervisorOptions {
    /// Deadline for one instance to stop before the process is torn down.
    pub shutdown_timeout: Duration,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

/// Errors that end supervision.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Startup(#[from] StartupError),

    /// Fatal fault: the caller must exit the process immediately.
    #[error(transparent)]
    ShutdownTimeout(#[from] ShutdownTimeout),
}

impl SupervisorError {
    /// Whether the process must exit without any further cleanup.
    pub fn is_fatal_fault(&self) -> bool {
        matches!(self, SupervisorError::ShutdownTimeout(_))
    }
}

/// How supervision ended when it ended cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// A terminate request stopped the last instance.
    Terminated,
}

enum Transition<C> {
    Reload(C),
    Terminate,
}

/// Drives one service instance at a time through its lifecycle.
pub struct Supervisor<P: ConfigProvider, F> {
    provider: P,
    factory: F,
    signals: SignalReceiver,
    watchdog: ShutdownWatchdog,
    initial: Option<P::Config>,
    next_instance: u64,
}

impl<P, F> Supervisor<P, F>
where
    P: ConfigProvider,
    F: ServiceFactory<Config = P::Config>,
    F::Service: Send + 'static,
{
    pub fn new(provider: P, factory: F, signals: SignalReceiver, options: SupervisorOptions) -> Self {
        Self {
            provider,
            factory,
            signals,
            watchdog: ShutdownWatchdog::new(options.shutdown_timeout),
            initial: None,
            next_instance: 1,
        }
    }

    /// Use an already acquired configuration for the first instance instead
    /// of acquiring one. It is still validated.
    pub fn with_initial_config(mut self, config: P::Config) -> Self {
        self.initial = Some(config);
        self
    }

    /// Supervise until a terminate request, or until a fatal error.
    ///
    /// Errors acquiring or starting an instance are returned as-is; a
    /// [`SupervisorError::ShutdownTimeout`] must be turned into an immediate
    /// process exit by the caller.
    pub async fn run_forever(mut self) -> Result<Exit, SupervisorError> {
        let mut config = match self.initial.take() {
            Some(config) => config,
            None => self.provider.acquire()?,
        };
        self.provider.validate(&config)?;

        loop {
            let id = self.next_instance;
            self.next_instance += 1;

            let handle = instantiate(&self.factory, id, config, &mut self.signals).await?;

            match self.serve(handle).await? {
                Transition::Reload(next) => config = next,
                Transition::Terminate => {
                    tracing::info!("Supervisor exiting");
                    return Ok(Exit::Terminated);
                }
            }
        }
    }

    /// Wait on the running instance until it has to be replaced or stopped.
    /// The instance is stopped when this returns `Ok`.
    async fn serve(
        &mut self,
        handle: ServiceHandle<F::Service>,
    ) -> Result<Transition<P::Config>, SupervisorError> {
        loop {
            let event = match self.signals.recv().await {
                Some(event) => event,
                None => {
                    tracing::warn!("Signal queue closed, treating as terminate");
                    SignalEvent::Terminate
                }
            };

            match event {
                SignalEvent::Reload => match self.provider.check() {
                    Ok(next) => {
                        metrics::record_reload("applied");
                        tracing::info!(instance = handle.id(), "Configuration validated, replacing instance");
                        self.shutdown(handle, event).await?;
                        return Ok(Transition::Reload(next));
                    }
                    Err(e) => {
                        metrics::record_reload("rejected");
                        tracing::error!(
                            instance = handle.id(),
                            error = %e,
                            "Reload rejected, keeping current instance"
                        );
                    }
                },
                SignalEvent::Terminate => {
                    self.shutdown(handle, event).await?;
                    return Ok(Transition::Terminate);
                }
            }
        }
    }

    async fn shutdown(
        &self,
        handle: ServiceHandle<F::Service>,
        reason: SignalEvent,
    ) -> Result<(), ShutdownTimeout> {
        let id = handle.id();
        tracing::info!(instance = id, reason = %reason, "Stopping service instance");

        let started = Instant::now();
        self.watchdog.guard(handle.stop()).await?;
        let elapsed = started.elapsed();

        metrics::record_instance_stopped(elapsed);
        tracing::info!(
            instance = id,
            elapsed_ms = elapsed.as_millis() as u64,
            "Service instance stopped"
        );
        Ok(())
    }
}

//! Startup orchestration.
//!
//! # Responsibilities
//! - Create a service instance from a configuration and a fresh token
//! - Start the instance
//! - Abort startup if a terminate request arrives while it is starting
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal to the caller
//! - A failed or interrupted start cancels the instance token before the
//!   instance is dropped
//! - A reload arriving during startup is left queued for the running instance

use tokio_util::sync::CancellationToken;

use crate::lifecycle::signals::SignalReceiver;
use crate::observability::metrics;
use crate::service::{ServiceFactory, ServiceHandle, StartupError};

/// Create and start instance `id` from `config`.
pub async fn instantiate<F: ServiceFactory>(
    factory: &F,
    id: u64,
    config: F::Config,
    signals: &mut SignalReceiver,
) -> Result<ServiceHandle<F::Service>, StartupError> {
    let token = CancellationToken::new();
    let service = match factory.create(config, token.clone()) {
        Ok(service) => service,
        Err(e) => {
            token.cancel();
            return Err(e);
        }
    };

    let mut handle = ServiceHandle::new(id, service, token);
    tracing::debug!(instance = id, "Service instance created");

    let started = tokio::select! {
        biased;
        result = handle.start() => result,
        Some(event) = signals.recv_terminate() => {
            tracing::warn!(instance = id, event = %event, "Signal received during startup");
            Err(StartupError::Interrupted(event))
        }
    };

    if let Err(e) = started {
        handle.cancel();
        return Err(e);
    }

    metrics::record_instance_started();
    tracing::info!(instance = id, "Service instance running");
    Ok(handle)
}

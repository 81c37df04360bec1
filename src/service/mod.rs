//! Managed service boundary.
//!
//! # Data Flow
//! ```text
//! ServiceConfig + CancellationToken
//!     → ServiceFactory::create  (Created)
//!     → ServiceHandle::start    (Running)
//!     → ServiceHandle::stop     (Stopping → Stopped, handle consumed)
//! ```
//!
//! # Design Decisions
//! - One token per instance; it is cancelled before `Service::stop` runs
//! - `stop` consumes the handle, so a stopped instance cannot be retained
//! - The supervisor never looks inside a service

pub mod http;

use std::future::Future;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::lifecycle::signals::SignalEvent;

pub use self::http::{HttpService, HttpServiceFactory};

/// Error type for instance construction and start.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("create service: {0}")]
    Create(String),

    #[error("bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("start service: {0}")]
    Start(String),

    #[error("startup interrupted by {0} signal")]
    Interrupted(SignalEvent),

    #[error("register signal handlers: {0}")]
    Signals(#[source] std::io::Error),
}

/// One running (or runnable) unit of work.
pub trait Service {
    /// Begin serving. Called exactly once, after creation.
    fn start(&mut self) -> impl Future<Output = Result<(), StartupError>> + Send;

    /// Tear down and wait for internal work to finish. The instance's
    /// token is already cancelled when this is called.
    fn stop(&mut self) -> impl Future<Output = ()> + Send;
}

/// Builds service instances from configuration.
pub trait ServiceFactory {
    type Config;
    type Service: Service;

    fn create(
        &self,
        config: Self::Config,
        token: CancellationToken,
    ) -> Result<Self::Service, StartupError>;
}

/// Lifecycle state of a [`ServiceHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Created,
    Running,
    Stopping,
    Stopped,
}

/// Exclusive owner of one service instance and its cancellation token.
pub struct ServiceHandle<S> {
    id: u64,
    service: S,
    token: CancellationToken,
    state: ServiceState,
}

impl<S: Service> ServiceHandle<S> {
    pub fn new(id: u64, service: S, token: CancellationToken) -> Self {
        Self {
            id,
            service,
            token,
            state: ServiceState::Created,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> ServiceState {
        self.state
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Start the instance; only valid in `Created`.
    pub async fn start(&mut self) -> Result<(), StartupError> {
        if self.state != ServiceState::Created {
            return Err(StartupError::Start(format!(
                "instance {} is {:?}, not Created",
                self.id, self.state
            )));
        }
        self.service.start().await?;
        self.state = ServiceState::Running;
        Ok(())
    }

    /// Trigger the instance's token. Idempotent.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Cancel, then stop and wait for the instance. Consumes the handle.
    pub async fn stop(mut self) -> ServiceState {
        self.token.cancel();
        self.state = ServiceState::Stopping;
        self.service.stop().await;
        self.state = ServiceState::Stopped;
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Probe {
        starts: u32,
        cancelled_at_stop: Option<bool>,
        token: CancellationToken,
    }

    struct ProbeService(Arc<Mutex<Probe>>);

    impl Service for ProbeService {
        async fn start(&mut self) -> Result<(), StartupError> {
            self.0.lock().unwrap().starts += 1;
            Ok(())
        }

        async fn stop(&mut self) {
            let mut probe = self.0.lock().unwrap();
            probe.cancelled_at_stop = Some(probe.token.is_cancelled());
        }
    }

    fn handle() -> (ServiceHandle<ProbeService>, Arc<Mutex<Probe>>) {
        let token = CancellationToken::new();
        let probe = Arc::new(Mutex::new(Probe {
            token: token.clone(),
            ..Probe::default()
        }));
        (ServiceHandle::new(1, ProbeService(probe.clone()), token), probe)
    }

    #[tokio::test]
    async fn test_handle_transitions() {
        let (mut handle, probe) = handle();
        assert_eq!(handle.state(), ServiceState::Created);

        handle.start().await.unwrap();
        assert_eq!(handle.state(), ServiceState::Running);
        assert!(!handle.is_cancelled());

        assert_eq!(handle.stop().await, ServiceState::Stopped);
        assert_eq!(probe.lock().unwrap().cancelled_at_stop, Some(true));
    }

    #[tokio::test]
    async fn test_start_twice_is_rejected() {
        let (mut handle, probe) = handle();
        handle.start().await.unwrap();
        assert!(matches!(handle.start().await, Err(StartupError::Start(_))));
        assert_eq!(probe.lock().unwrap().starts, 1);
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let (handle, _probe) = handle();
        handle.cancel();
        handle.cancel();
        assert!(handle.is_cancelled());
    }
}

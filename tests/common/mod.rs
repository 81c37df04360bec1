//! Shared utilities for supervisor integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use proxy_supervisor::config::{ConfigError, ConfigProvider, ValidationError};
use proxy_supervisor::lifecycle::{signal_queue, Exit, SignalSender, Supervisor, SupervisorError, SupervisorOptions};
use proxy_supervisor::service::{Service, ServiceFactory, StartupError};

/// Configuration value handed out by [`ScriptedProvider`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestConfig {
    pub generation: u32,
    pub valid: bool,
}

impl TestConfig {
    pub fn valid(generation: u32) -> Self {
        Self { generation, valid: true }
    }

    pub fn invalid(generation: u32) -> Self {
        Self { generation, valid: false }
    }
}

#[derive(Default)]
struct ProviderState {
    current: Option<TestConfig>,
    acquired: u32,
    validated: u32,
}

/// In-memory config source whose content tests can change at any time.
#[derive(Clone, Default)]
pub struct ScriptedProvider {
    state: Arc<Mutex<ProviderState>>,
}

impl ScriptedProvider {
    pub fn new(config: TestConfig) -> Self {
        let provider = Self::default();
        provider.set(config);
        provider
    }

    pub fn unreadable() -> Self {
        Self::default()
    }

    pub fn set(&self, config: TestConfig) {
        self.state.lock().unwrap().current = Some(config);
    }

    pub fn set_unreadable(&self) {
        self.state.lock().unwrap().current = None;
    }

    pub fn acquired(&self) -> u32 {
        self.state.lock().unwrap().acquired
    }

    pub fn validated(&self) -> u32 {
        self.state.lock().unwrap().validated
    }
}

impl ConfigProvider for ScriptedProvider {
    type Config = TestConfig;

    fn acquire(&self) -> Result<TestConfig, ConfigError> {
        let mut state = self.state.lock().unwrap();
        state.acquired += 1;
        state.current.clone().ok_or(ConfigError::NoSources)
    }

    fn validate(&self, config: &TestConfig) -> Result<(), ConfigError> {
        self.state.lock().unwrap().validated += 1;
        if config.valid {
            Ok(())
        } else {
            Err(ConfigError::Validation(vec![ValidationError::ZeroRequestTimeout]))
        }
    }
}

/// Lifecycle events observed by [`Recorder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Created { instance: u32, generation: u32 },
    Started { instance: u32 },
    StopCalled { instance: u32, cancelled: bool },
    Stopped { instance: u32 },
}

#[derive(Default)]
struct RecorderInner {
    events: Mutex<Vec<Event>>,
    next_instance: AtomicU32,
    running: AtomicUsize,
    max_running: AtomicUsize,
    hang_on_stop: AtomicBool,
    fail_start: AtomicBool,
    start_delay: Mutex<Option<Duration>>,
}

/// Service factory that records every lifecycle step of its instances.
#[derive(Clone, Default)]
pub struct Recorder {
    inner: Arc<RecorderInner>,
}

impl Recorder {
    pub fn events(&self) -> Vec<Event> {
        self.inner.events.lock().unwrap().clone()
    }

    /// Instances currently between `Started` and `Stopped`.
    pub fn running(&self) -> usize {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously running instances ever seen.
    pub fn max_running(&self) -> usize {
        self.inner.max_running.load(Ordering::SeqCst)
    }

    pub fn hang_on_stop(&self) {
        self.inner.hang_on_stop.store(true, Ordering::SeqCst);
    }

    pub fn fail_start(&self) {
        self.inner.fail_start.store(true, Ordering::SeqCst);
    }

    pub fn delay_start(&self, delay: Duration) {
        *self.inner.start_delay.lock().unwrap() = Some(delay);
    }

    pub fn count(&self, matches: impl Fn(&Event) -> bool) -> usize {
        self.events().iter().filter(|e| matches(e)).count()
    }

    /// Poll until `done` holds for the recorded events, or panic after 5s.
    pub async fn wait_for(&self, done: impl Fn(&[Event]) -> bool) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while !done(&self.events()) {
            assert!(
                tokio::time::Instant::now() < deadline,
                "condition not reached, events: {:?}",
                self.events()
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    pub async fn wait_started(&self, instance: u32) {
        self.wait_for(|events| events.contains(&Event::Started { instance })).await;
    }

    fn record(&self, event: Event) {
        self.inner.events.lock().unwrap().push(event);
    }
}

impl ServiceFactory for Recorder {
    type Config = TestConfig;
    type Service = RecordingService;

    fn create(&self, config: TestConfig, token: CancellationToken) -> Result<RecordingService, StartupError> {
        let instance = self.inner.next_instance.fetch_add(1, Ordering::SeqCst) + 1;
        self.record(Event::Created {
            instance,
            generation: config.generation,
        });
        Ok(RecordingService {
            instance,
            token,
            recorder: self.clone(),
            running: false,
        })
    }
}

pub struct RecordingService {
    instance: u32,
    token: CancellationToken,
    recorder: Recorder,
    running: bool,
}

impl Service for RecordingService {
    async fn start(&mut self) -> Result<(), StartupError> {
        let delay = *self.recorder.inner.start_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.recorder.inner.fail_start.load(Ordering::SeqCst) {
            return Err(StartupError::Start("scripted failure".into()));
        }

        let inner = &self.recorder.inner;
        let now = inner.running.fetch_add(1, Ordering::SeqCst) + 1;
        inner.max_running.fetch_max(now, Ordering::SeqCst);
        self.running = true;
        self.recorder.record(Event::Started {
            instance: self.instance,
        });
        Ok(())
    }

    async fn stop(&mut self) {
        self.recorder.record(Event::StopCalled {
            instance: self.instance,
            cancelled: self.token.is_cancelled(),
        });
        if self.recorder.inner.hang_on_stop.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.running {
            self.recorder.inner.running.fetch_sub(1, Ordering::SeqCst);
            self.running = false;
        }
        self.recorder.record(Event::Stopped {
            instance: self.instance,
        });
    }
}

pub type SupervisorTask = JoinHandle<Result<Exit, SupervisorError>>;

/// Spawn a supervisor over the scripted collaborators.
pub fn spawn_supervisor(
    provider: ScriptedProvider,
    recorder: Recorder,
    shutdown_timeout: Duration,
) -> (SignalSender, SupervisorTask) {
    let (sender, receiver) = signal_queue();
    let supervisor = Supervisor::new(
        provider,
        recorder,
        receiver,
        SupervisorOptions { shutdown_timeout },
    );
    (sender, tokio::spawn(supervisor.run_forever()))
}

/// Await the supervisor, failing the test if it does not finish in time.
pub async fn join(task: SupervisorTask) -> Result<Exit, SupervisorError> {
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("supervisor did not finish")
        .expect("supervisor task panicked")
}

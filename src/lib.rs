//! Process supervisor for a reloadable HTTP service.
//!
//! # Architecture Overview
//!
//! ```text
//!   OS signals ──▶ lifecycle::signals ──┐        config::watcher
//!   (INT/TERM/HUP)   (single-slot queue) │◀──────── (file changes)
//!                                        ▼
//!                              lifecycle::supervisor
//!                     ┌──────────────┼──────────────────┐
//!                     ▼              ▼                  ▼
//!              config::provider  lifecycle::startup  lifecycle::shutdown
//!              (acquire/validate) (create + start)   (watchdog)
//!                                        │
//!                                        ▼
//!                                 service::http
//!                              (one running instance)
//! ```

pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod service;

pub use config::{ConfigProvider, FileConfigProvider, ServiceConfig};
pub use lifecycle::{Supervisor, SupervisorOptions};
pub use service::{HttpServiceFactory, ServiceFactory};

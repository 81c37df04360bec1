//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config files / directories / stdin (TOML or JSON)
//!     → loader.rs (resolve, parse, deep-merge, deserialize)
//!     → validation.rs (semantic checks)
//!     → ServiceConfig (immutable, owned by one service instance)
//!
//! On reload signal (SIGHUP or watcher.rs):
//!     → provider.rs acquires and validates a fresh config
//!     → supervisor replaces the instance only if validation passed
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a new instance
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod provider;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{ConfigError, ConfigSources};
pub use provider::{ConfigProvider, FileConfigProvider};
pub use schema::{ListenerConfig, LogConfig, RouteConfig, ServiceConfig, TimeoutConfig};
pub use validation::ValidationError;

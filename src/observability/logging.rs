//! Structured logging.
//!
//! # Responsibilities
//! - Initialize logging subsystem
//! - Configure log level from config and environment
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, pretty format for development
//! - `RUST_LOG` overrides the configured level
//! - Initialized once per process; reloads do not change it

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::schema::LogConfig;

/// Filter used when `RUST_LOG` is not set.
pub fn default_directives(config: &LogConfig) -> String {
    let level = config.level.to_ascii_lowercase();
    format!("proxy_supervisor={level},tower_http={level}")
}

/// Install the global tracing subscriber.
pub fn init(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(config)));
    let registry = tracing_subscriber::registry().with(filter);

    if config.json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry
            .with(fmt::layer().with_ansi(!config.disable_color))
            .init();
    }
}

//! Configuration file watcher for hot reload.
//!
//! Turns file changes into `Reload` events. The reload itself goes through
//! the supervisor's validation gate exactly like a SIGHUP.

use std::path::PathBuf;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};

use crate::lifecycle::signals::{SignalEvent, SignalSender};

/// A watcher that monitors configuration sources for changes.
pub struct ConfigWatcher {
    targets: Vec<(PathBuf, bool)>,
    sender: SignalSender,
}

impl ConfigWatcher {
    /// Create a new ConfigWatcher over `(path, recursive)` targets.
    pub fn new(targets: Vec<(PathBuf, bool)>, sender: SignalSender) -> Self {
        Self { targets, sender }
    }

    /// Start watching in notify's background thread.
    ///
    /// Watching stops when the returned watcher is dropped.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let sender = self.sender;

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    tracing::info!(paths = ?event.paths, "Config change detected, requesting reload");
                    sender.send(SignalEvent::Reload);
                }
                Ok(_) => {}
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        for (path, recursive) in &self.targets {
            let mode = if *recursive {
                RecursiveMode::Recursive
            } else {
                RecursiveMode::NonRecursive
            };
            watcher.watch(path, mode)?;
            tracing::info!(path = ?path, recursive, "Config watcher started");
        }
        Ok(watcher)
    }
}

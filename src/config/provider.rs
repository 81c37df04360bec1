//! Configuration provider boundary used by the supervisor.

use crate::config::loader::{load_config, ConfigError, ConfigSources};
use crate::config::schema::ServiceConfig;
use crate::config::validation::validate_config;

/// Produces and checks configuration values.
///
/// The supervisor treats the configuration as opaque: it only needs to
/// acquire a value and ask whether that value is acceptable.
pub trait ConfigProvider {
    /// The structured configuration value.
    type Config;

    /// Read and merge all sources into one configuration value.
    fn acquire(&self) -> Result<Self::Config, ConfigError>;

    /// Check a configuration value without side effects.
    fn validate(&self, config: &Self::Config) -> Result<(), ConfigError>;

    /// Acquire a fresh value and validate it.
    fn check(&self) -> Result<Self::Config, ConfigError> {
        let config = self.acquire()?;
        self.validate(&config)?;
        Ok(config)
    }
}

/// Provider reading `ServiceConfig` from files, directories or stdin.
#[derive(Debug, Clone)]
pub struct FileConfigProvider {
    sources: ConfigSources,
    disable_color: bool,
}

impl FileConfigProvider {
    pub fn new(sources: ConfigSources) -> Self {
        Self {
            sources,
            disable_color: false,
        }
    }

    /// Force `log.disable_color` on every acquired configuration.
    pub fn with_disable_color(mut self, disable_color: bool) -> Self {
        self.disable_color = disable_color;
        self
    }

    pub fn sources(&self) -> &ConfigSources {
        &self.sources
    }
}

impl ConfigProvider for FileConfigProvider {
    type Config = ServiceConfig;

    fn acquire(&self) -> Result<ServiceConfig, ConfigError> {
        let mut config = load_config(&self.sources)?;
        if self.disable_color {
            config.log.disable_color = true;
        }
        Ok(config)
    }

    fn validate(&self, config: &ServiceConfig) -> Result<(), ConfigError> {
        validate_config(config).map_err(ConfigError::Validation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_check_reads_then_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[timeouts]\nrequest_secs = 0\n").unwrap();

        let provider = FileConfigProvider::new(ConfigSources::from_path(&path));
        assert_eq!(provider.acquire().unwrap().timeouts.request_secs, 0);
        assert!(matches!(provider.check(), Err(ConfigError::Validation(_))));

        fs::write(&path, "[timeouts]\nrequest_secs = 10\n").unwrap();
        assert_eq!(provider.check().unwrap().timeouts.request_secs, 10);
    }

    #[test]
    fn test_disable_color_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[log]\ndisable_color = false\n").unwrap();

        let provider = FileConfigProvider::new(ConfigSources::from_path(&path)).with_disable_color(true);
        assert!(provider.acquire().unwrap().log.disable_color);
    }
}

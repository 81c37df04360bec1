//! Configuration loading from disk or standard input.
//!
//! # Responsibilities
//! - Resolve the configured files and directories into an ordered file list
//! - Decode each file (TOML, or JSON by extension)
//! - Deep-merge all documents, later files winning
//! - Deserialize the merged document into a `ServiceConfig`
//!
//! # Design Decisions
//! - One file and many files go through the same merge path
//! - Directory entries are visited in name order so merges are reproducible
//! - Loading never validates; see `validation.rs`

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::schema::ServiceConfig;
use crate::config::validation::ValidationError;

/// Path that selects standard input instead of a file.
pub const STDIN_SOURCE: &str = "stdin";

/// Error type for configuration loading and checking.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no config file found")]
    NoSources,

    #[error("read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parse {path}: {message}")]
    Parse { path: String, message: String },

    #[error("decode config: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Where configuration documents are read from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigSources {
    /// Explicit files (or directories), merged in the given order.
    pub paths: Vec<PathBuf>,

    /// Directories whose `*.toml` / `*.json` files are merged after `paths`.
    pub directories: Vec<PathBuf>,

    /// Descend into sub-directories of every directory source.
    pub recursive: bool,
}

impl ConfigSources {
    /// Sources consisting of a single file.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            paths: vec![path.into()],
            ..Self::default()
        }
    }

    /// Whether the configuration is read from standard input.
    pub fn is_stdin(&self) -> bool {
        self.directories.is_empty()
            && self.paths.len() == 1
            && self.paths[0] == Path::new(STDIN_SOURCE)
    }

    /// Resolve all sources into the ordered list of files to merge.
    pub fn resolve(&self) -> Result<Vec<PathBuf>, ConfigError> {
        let mut files = Vec::new();
        for path in &self.paths {
            if path.is_dir() {
                collect_directory(path, self.recursive, &mut files)?;
            } else {
                files.push(path.clone());
            }
        }
        for directory in &self.directories {
            collect_directory(directory, self.recursive, &mut files)?;
        }
        Ok(files)
    }

    /// Paths a file watcher should observe, with their recursion mode.
    pub fn watch_targets(&self) -> Vec<(PathBuf, bool)> {
        if self.is_stdin() {
            return Vec::new();
        }
        self.paths
            .iter()
            .map(|path| (path.clone(), path.is_dir() && self.recursive))
            .chain(
                self.directories
                    .iter()
                    .map(|directory| (directory.clone(), self.recursive)),
            )
            .collect()
    }
}

fn collect_directory(
    directory: &Path,
    recursive: bool,
    files: &mut Vec<PathBuf>,
) -> Result<(), ConfigError> {
    let io_error = |source| ConfigError::Io {
        path: directory.display().to_string(),
        source,
    };

    let mut entries = fs::read_dir(directory)
        .map_err(io_error)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(io_error)?;
    entries.sort();

    for entry in entries {
        if entry.is_dir() {
            if recursive {
                collect_directory(&entry, recursive, files)?;
            }
        } else if SourceFormat::from_extension(&entry).is_some() {
            files.push(entry);
        }
    }
    Ok(())
}

/// Encoding of one configuration document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Toml,
    Json,
}

impl SourceFormat {
    /// Format implied by a recognised file extension.
    pub fn from_extension(path: &Path) -> Option<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Some(Self::Toml),
            Some("json") => Some(Self::Json),
            _ => None,
        }
    }

    /// Format of an explicitly named file; anything not `.json` is TOML.
    fn for_path(path: &Path) -> Self {
        Self::from_extension(path).unwrap_or(Self::Toml)
    }

    /// Format of content without a name, guessed from its first character.
    fn sniff(content: &str) -> Self {
        if content.trim_start().starts_with('{') {
            Self::Json
        } else {
            Self::Toml
        }
    }
}

/// Parse one document into a generic value.
pub fn parse_document(origin: &str, content: &str, format: SourceFormat) -> Result<Value, ConfigError> {
    let parsed = match format {
        SourceFormat::Toml => toml::from_str::<Value>(content).map_err(|e| e.to_string()),
        SourceFormat::Json => serde_json::from_str::<Value>(content).map_err(|e| e.to_string()),
    };
    parsed.map_err(|message| ConfigError::Parse {
        path: origin.to_string(),
        message,
    })
}

/// Merge `overlay` into `base`: objects merge key by key, anything else is replaced.
pub fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Load and merge configuration from the given sources.
pub fn load_config(sources: &ConfigSources) -> Result<ServiceConfig, ConfigError> {
    let merged = if sources.is_stdin() {
        let mut content = String::new();
        std::io::stdin()
            .read_to_string(&mut content)
            .map_err(|source| ConfigError::Io {
                path: STDIN_SOURCE.to_string(),
                source,
            })?;
        if content.trim().is_empty() {
            return Err(ConfigError::NoSources);
        }
        parse_document(STDIN_SOURCE, &content, SourceFormat::sniff(&content))?
    } else {
        let files = sources.resolve()?;
        if files.is_empty() {
            return Err(ConfigError::NoSources);
        }
        let mut merged = Value::Object(Map::new());
        for file in &files {
            merge_values(&mut merged, read_document(file)?);
        }
        tracing::debug!(files = ?files, "Configuration files merged");
        merged
    };

    Ok(serde_json::from_value(merged)?)
}

fn read_document(path: &Path) -> Result<Value, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_document(&path.display().to_string(), &content, SourceFormat::for_path(path))
}

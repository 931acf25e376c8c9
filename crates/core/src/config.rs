//! KV configuration
//!
//! Backend selection, loadable from a YAML file

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Which backend to open
    #[serde(default)]
    pub backend: StoreBackend,
}

impl StoreConfig {
    pub fn new(backend: StoreBackend) -> Self {
        Self { backend }
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Load configuration from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }
}

/// Backend type
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreBackend {
    /// Process-local map, nothing persisted
    #[default]
    Memory,

    /// One file per key inside `dir`
    Folder { dir: PathBuf },

    /// Whole map mirrored to `<dir>/<name>.json`
    JsonFile {
        dir: PathBuf,
        name: String,
        #[serde(default)]
        options: JsonFileOptions,
    },
}

impl StoreBackend {
    pub fn memory() -> Self {
        Self::Memory
    }

    pub fn folder(dir: impl Into<PathBuf>) -> Self {
        Self::Folder { dir: dir.into() }
    }

    pub fn json_file(dir: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self::JsonFile {
            dir: dir.into(),
            name: name.into(),
            options: JsonFileOptions::default(),
        }
    }

    /// Short backend name used in error contexts and logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Memory => "rwmap",
            Self::Folder { .. } => "folder",
            Self::JsonFile { .. } => "jsonf",
        }
    }

    /// Whether data written through this backend outlives the process
    pub fn is_persistent(&self) -> bool {
        !matches!(self, Self::Memory)
    }
}

/// JSON-file backend options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonFileOptions {
    #[serde(default)]
    pub write: WriteStrategy,

    #[serde(default)]
    pub on_corrupt: CorruptPolicy,

    /// Indent the on-disk JSON
    #[serde(default)]
    pub pretty: bool,
}

/// How a mutation reaches the file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteStrategy {
    /// Rewind and truncate the open handle, then write
    #[default]
    Truncate,
    /// Write a sibling temp file and rename it over the target
    AtomicRename,
}

/// What to do when the file exists but does not decode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorruptPolicy {
    /// Overwrite with `{}` and start empty
    #[default]
    Reset,
    /// Refuse to open and leave the file untouched
    Fail,
}

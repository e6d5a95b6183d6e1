//! Configuration System
//!
//! Layered configuration for the store backend, console logging and per-artifact
//! log files. Sources, lowest precedence first: built-in defaults, the global
//! config file, `config/config.toml` and `config/{MEMOGEN_ENV}.toml` in the
//! workspace, then `MEMOGEN__SECTION__KEY` environment variables.

use crate::error::DispenseError;
use crate::logging::LoggingConfig;
use crate::store::{ArtifactStore, FsStore, MemoryStore, SledArtifactStore, LOG_EXTENSION};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

mod sources;

pub use sources::global_file::global_config_path;

/// Prefix of environment overrides (`MEMOGEN__STORE__BACKEND=sled`)
pub const ENV_PREFIX: &str = "MEMOGEN";

const DEFAULT_STORE_ROOT: &str = ".memogen/store";

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemogenConfig {
    /// Artifact store settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Console logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Per-artifact log files
    #[serde(default)]
    pub artifact_log: ArtifactLogConfig,
}

/// Store backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// One JSON file per record
    Fs,
    /// Embedded sled database
    Sled,
    /// Process-local map, nothing survives exit
    Memory,
    /// No store: every request generates
    None,
}

impl Default for StoreBackend {
    fn default() -> Self {
        StoreBackend::Fs
    }
}

/// Artifact store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Store root; relative paths are taken from the workspace root
    #[serde(default = "default_store_root")]
    pub root: PathBuf,
}

fn default_store_root() -> PathBuf {
    PathBuf::from(DEFAULT_STORE_ROOT)
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            root: default_store_root(),
        }
    }
}

impl StoreConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.backend != StoreBackend::None && self.root.as_os_str().is_empty() {
            return Err("Store root cannot be empty".to_string());
        }
        Ok(())
    }

    /// Store root resolved against `workspace_root`
    pub fn root_in(&self, workspace_root: &Path) -> PathBuf {
        if self.root.is_absolute() {
            self.root.clone()
        } else {
            workspace_root.join(&self.root)
        }
    }

    /// Open the configured backend. `None` means no store.
    pub fn open(&self, workspace_root: &Path) -> Result<Option<Arc<dyn ArtifactStore>>, DispenseError> {
        let root = self.root_in(workspace_root);
        let store: Arc<dyn ArtifactStore> = match self.backend {
            StoreBackend::Fs => Arc::new(FsStore::new(&root)?),
            StoreBackend::Sled => Arc::new(SledArtifactStore::new(&root)?),
            StoreBackend::Memory => Arc::new(MemoryStore::new(&root)),
            StoreBackend::None => return Ok(None),
        };
        Ok(Some(store))
    }
}

/// Per-artifact log file settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactLogConfig {
    /// Write a log file beside each persisted artifact
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Extension appended to the record digest
    #[serde(default = "default_log_extension")]
    pub extension: String,
}

fn default_true() -> bool {
    true
}

fn default_log_extension() -> String {
    LOG_EXTENSION.to_string()
}

impl Default for ArtifactLogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            extension: default_log_extension(),
        }
    }
}

impl ArtifactLogConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !self.extension.starts_with('.') || self.extension.len() < 2 {
            return Err(format!(
                "Extension must start with '.' and name a suffix, got '{}'",
                self.extension
            ));
        }
        if self.extension.contains(['/', '\\']) {
            return Err(format!("Extension cannot contain path separators: '{}'", self.extension));
        }
        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    Store(String),
    Logging(String),
    ArtifactLog(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Store(msg) => write!(f, "Store: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
            ValidationError::ArtifactLog(msg) => write!(f, "Artifact log: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl MemogenConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = self.store.validate() {
            errors.push(ValidationError::Store(e));
        }

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            errors.push(ValidationError::Logging(format!(
                "Unknown format '{}' (expected text or json)",
                self.logging.format
            )));
        }
        if !matches!(self.logging.output.as_str(), "stdout" | "stderr" | "file") {
            errors.push(ValidationError::Logging(format!(
                "Unknown output '{}' (expected stdout, stderr or file)",
                self.logging.output
            )));
        }

        if let Err(e) = self.artifact_log.validate() {
            errors.push(ValidationError::ArtifactLog(e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate, folding all problems into one configuration error
    pub fn validated(self) -> Result<Self, DispenseError> {
        self.validate().map_err(|errors| {
            let msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            DispenseError::Configuration(format!(
                "Configuration validation failed:\n{}",
                msgs.join("\n")
            ))
        })?;
        Ok(self)
    }

    /// Render as TOML, the format of the config files
    pub fn to_toml(&self) -> Result<String, DispenseError> {
        toml::to_string_pretty(self)
            .map_err(|e| DispenseError::Configuration(format!("Failed to render config: {}", e)))
    }
}

/// Builds a `MemogenConfig` from the layered sources.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for `workspace_root` from every source
    pub fn load(workspace_root: &Path) -> Result<MemogenConfig, ConfigError> {
        let builder = builder_with_defaults()?;
        let builder = sources::global_file::add_to_builder(builder)?;
        let builder = sources::workspace_file::add_to_builder(builder, workspace_root)?;
        Self::finish(builder)
    }

    /// Load configuration from a single file (still subject to env overrides)
    pub fn load_from_file(path: &Path) -> Result<MemogenConfig, ConfigError> {
        let builder = builder_with_defaults()?.add_source(File::from(path.to_path_buf()).required(true));
        Self::finish(builder)
    }

    fn finish(builder: ConfigBuilder<DefaultState>) -> Result<MemogenConfig, ConfigError> {
        builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("store.backend", "fs")?
        .set_default("store.root", DEFAULT_STORE_ROOT)?
        .set_default("artifact_log.enabled", true)?
        .set_default("artifact_log.extension", LOG_EXTENSION)
}

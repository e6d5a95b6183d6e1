//! Error types for the memogen generation engine.

use thiserror::Error;

/// Storage-related errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("No stored artifact for {dataname} with identity {key}")]
    NotFound { dataname: String, key: String },

    #[error("Invalid store path: {0}")]
    InvalidPath(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors surfaced by parameter resolution, identity computation and generation.
///
/// Errors raised by a setup during generation travel through unchanged.
#[derive(Debug, Error)]
pub enum DispenseError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("No setup found for dataname '{dataname}' (tried: {tried})")]
    PluginNotFound { dataname: String, tried: String },

    #[error("Missing parameter '{parameter}' for dataname '{dataname}'")]
    MissingParameter { dataname: String, parameter: String },

    #[error("Parameter '{parameter}' for dataname '{dataname}' should be {expected}, got {found}")]
    InvalidParameter {
        dataname: String,
        parameter: String,
        expected: String,
        found: String,
    },

    #[error("Setup '{setup}' does not know dataname '{dataname}'")]
    UnknownDataname { setup: String, dataname: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Cyclic prerequisite chain: {0}")]
    CyclicDependency(String),

    #[error("Generation of '{dataname}' failed: {message}")]
    Generation { dataname: String, message: String },
}

impl From<config::ConfigError> for DispenseError {
    fn from(err: config::ConfigError) -> Self {
        DispenseError::Configuration(err.to_string())
    }
}

impl DispenseError {
    /// Shorthand for a setup reporting a dataname it does not serve.
    pub fn unknown_dataname(setup: impl Into<String>, dataname: impl Into<String>) -> Self {
        DispenseError::UnknownDataname {
            setup: setup.into(),
            dataname: dataname.into(),
        }
    }

    /// Shorthand for a setup-side generation failure.
    pub fn generation(dataname: impl Into<String>, message: impl Into<String>) -> Self {
        DispenseError::Generation {
            dataname: dataname.into(),
            message: message.into(),
        }
    }
}

//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::{DispenseError, StorageError};

/// Map domain errors to a string for CLI output.
pub fn map_error(e: &DispenseError) -> String {
    match e {
        DispenseError::Storage(StorageError::NotFound { dataname, key }) => {
            format!("No record for '{}' with identity {}", dataname, key)
        }
        other => other.to_string(),
    }
}

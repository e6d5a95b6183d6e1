//! Artifact Store
//!
//! Keyed persistence for generated artifacts. A record is addressed by its
//! dataname and identity parameters; the engine never looks inside the
//! payload. Every store also derives deterministic filesystem paths for files
//! that live next to a record, such as its generation log.

pub mod files;
pub mod memory;
pub mod persistence;

pub use files::FsStore;
pub use memory::MemoryStore;
pub use persistence::SledArtifactStore;

use crate::error::StorageError;
use crate::params::{self, IdPars};
use crate::setup::Artifact;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Extension of artifact log files
pub const LOG_EXTENSION: &str = ".log";

/// Store interface consumed by the generation engine
pub trait ArtifactStore: Send + Sync {
    fn exists(&self, dataname: &str, idpars: &IdPars) -> Result<bool, StorageError>;

    /// Fetch a stored artifact; `StorageError::NotFound` if absent.
    fn fetch(&self, dataname: &str, idpars: &IdPars) -> Result<Artifact, StorageError>;

    /// Store an artifact, overwriting any existing record for the same key.
    fn store(&self, artifact: &Artifact, dataname: &str, idpars: &IdPars) -> Result<(), StorageError>;

    /// Deterministic path for a file belonging to the record `(dataname, idpars)`.
    fn path_for(&self, dataname: &str, idpars: &IdPars, extension: &str) -> Result<PathBuf, StorageError>;

    /// Summaries of every stored record, sorted by dataname then digest.
    fn list(&self) -> Result<Vec<RecordInfo>, StorageError>;
}

/// A stored artifact with its key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub dataname: String,
    pub idpars: IdPars,
    pub digest: String,
    pub stored_at: DateTime<Utc>,
    pub artifact: Artifact,
}

impl StoredRecord {
    pub fn new(artifact: &Artifact, dataname: &str, idpars: &IdPars) -> Self {
        Self {
            dataname: dataname.to_string(),
            idpars: idpars.clone(),
            digest: params::digest(dataname, idpars),
            stored_at: Utc::now(),
            artifact: artifact.clone(),
        }
    }

    pub fn info(&self) -> RecordInfo {
        RecordInfo {
            dataname: self.dataname.clone(),
            idpars: self.idpars.clone(),
            digest: self.digest.clone(),
            stored_at: self.stored_at,
        }
    }
}

/// Record metadata without the payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordInfo {
    pub dataname: String,
    pub idpars: IdPars,
    pub digest: String,
    pub stored_at: DateTime<Utc>,
}

/// Reject datanames that would escape or confuse the directory layout.
pub fn check_dataname(dataname: &str) -> Result<(), StorageError> {
    let invalid = dataname.is_empty()
        || dataname.starts_with('.')
        || dataname.contains(|c: char| c == '/' || c == '\\' || c == '\0');
    if invalid {
        return Err(StorageError::InvalidPath(format!(
            "Dataname {:?} cannot be used as a directory name",
            dataname
        )));
    }
    Ok(())
}

/// Record path layout shared by all stores:
/// `{root}/{dataname}/{digest[0..2]}/{digest}{extension}`
///
/// The two-character fan-out keeps directories small when a dataname has
/// many records.
pub fn layout_path(
    root: &Path,
    dataname: &str,
    idpars: &IdPars,
    extension: &str,
) -> Result<PathBuf, StorageError> {
    check_dataname(dataname)?;
    let digest = params::digest(dataname, idpars);
    Ok(root
        .join(dataname)
        .join(&digest[0..2])
        .join(format!("{}{}", digest, extension)))
}

pub(crate) fn not_found(dataname: &str, idpars: &IdPars) -> StorageError {
    StorageError::NotFound {
        dataname: dataname.to_string(),
        key: idpars.to_canonical_json(),
    }
}

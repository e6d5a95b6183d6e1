//! Filesystem artifact store
//!
//! Records are JSON files at
//! `{root}/{dataname}/{digest[0..2]}/{digest}.json`, and logs sit beside them
//! with the `.log` extension. The digest is derived from the dataname and the
//! identity parameters, so the same key always lands on the same path.

use crate::error::StorageError;
use crate::params::IdPars;
use crate::setup::Artifact;
use crate::store::{layout_path, not_found, ArtifactStore, RecordInfo, StoredRecord};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Extension of record files
pub const RECORD_EXTENSION: &str = ".json";

/// Directory-backed store
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Open (creating if needed) a store rooted at `root`
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self, StorageError> {
        let root = root.as_ref();
        fs::create_dir_all(root).map_err(|e| {
            StorageError::IoError(std::io::Error::new(
                e.kind(),
                format!("Failed to create store directory at {:?}: {}", root, e),
            ))
        })?;
        let root = dunce::canonicalize(root)?;
        Ok(Self { root })
    }

    /// Get the root path of this store
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, dataname: &str, idpars: &IdPars) -> Result<PathBuf, StorageError> {
        layout_path(&self.root, dataname, idpars, RECORD_EXTENSION)
    }

    fn read_record(path: &Path) -> Result<StoredRecord, StorageError> {
        let bytes = fs::read(path).map_err(|e| {
            StorageError::IoError(std::io::Error::new(
                e.kind(),
                format!("Failed to read record from {:?}: {}", path, e),
            ))
        })?;
        serde_json::from_slice(&bytes).map_err(|e| {
            StorageError::Serialization(format!("Failed to decode record {:?}: {}", path, e))
        })
    }
}

impl ArtifactStore for FsStore {
    fn exists(&self, dataname: &str, idpars: &IdPars) -> Result<bool, StorageError> {
        Ok(self.record_path(dataname, idpars)?.exists())
    }

    fn fetch(&self, dataname: &str, idpars: &IdPars) -> Result<Artifact, StorageError> {
        let path = self.record_path(dataname, idpars)?;
        if !path.exists() {
            return Err(not_found(dataname, idpars));
        }
        let record = Self::read_record(&path)?;
        if record.dataname != dataname
            || record.idpars.to_canonical_json() != idpars.to_canonical_json()
        {
            return Err(StorageError::Serialization(format!(
                "Record at {:?} belongs to a different key",
                path
            )));
        }
        debug!(dataname, path = %path.display(), "Fetched artifact");
        Ok(record.artifact)
    }

    /// Write via a temporary file and rename, so readers never see a partial record.
    fn store(&self, artifact: &Artifact, dataname: &str, idpars: &IdPars) -> Result<(), StorageError> {
        let path = self.record_path(dataname, idpars)?;
        let temp_path = path.with_extension("json.tmp");

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                StorageError::IoError(std::io::Error::new(
                    e.kind(),
                    format!("Failed to create parent directory {:?}: {}", parent, e),
                ))
            })?;
        }

        let record = StoredRecord::new(artifact, dataname, idpars);
        let serialized = serde_json::to_vec_pretty(&record)
            .map_err(|e| StorageError::Serialization(format!("Failed to encode record: {}", e)))?;

        fs::write(&temp_path, &serialized).map_err(|e| {
            StorageError::IoError(std::io::Error::new(
                e.kind(),
                format!("Failed to write record to {:?}: {}", temp_path, e),
            ))
        })?;

        fs::rename(&temp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            StorageError::IoError(std::io::Error::new(
                e.kind(),
                format!("Failed to rename temp file to {:?}: {}", path, e),
            ))
        })?;

        debug!(dataname, path = %path.display(), "Stored artifact");
        Ok(())
    }

    fn path_for(&self, dataname: &str, idpars: &IdPars, extension: &str) -> Result<PathBuf, StorageError> {
        layout_path(&self.root, dataname, idpars, extension)
    }

    fn list(&self) -> Result<Vec<RecordInfo>, StorageError> {
        let mut records = Vec::new();
        for entry in WalkDir::new(&self.root).min_depth(3).max_depth(3) {
            let entry = entry.map_err(|e| {
                StorageError::IoError(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    format!("Failed to walk store: {}", e),
                ))
            })?;
            let is_record = entry.file_type().is_file()
                && entry
                    .file_name()
                    .to_str()
                    .map(|n| n.ends_with(RECORD_EXTENSION))
                    .unwrap_or(false);
            if !is_record {
                continue;
            }
            match Self::read_record(entry.path()) {
                Ok(record) => records.push(record.info()),
                Err(e) => warn!(path = %entry.path().display(), "Skipping unreadable record: {}", e),
            }
        }
        records.sort_by(|a, b| (&a.dataname, &a.digest).cmp(&(&b.dataname, &b.digest)));
        Ok(records)
    }
}

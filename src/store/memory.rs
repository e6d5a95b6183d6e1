//! In-memory artifact store
//!
//! Keeps records in a map for the lifetime of the process. Log files still go
//! to disk, under the directory given at construction.

use crate::error::StorageError;
use crate::params::{self, IdPars};
use crate::setup::Artifact;
use crate::store::{layout_path, not_found, ArtifactStore, RecordInfo, StoredRecord};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub struct MemoryStore {
    records: RwLock<HashMap<String, StoredRecord>>,
    log_root: PathBuf,
}

impl MemoryStore {
    pub fn new<P: AsRef<Path>>(log_root: P) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            log_root: log_root.as_ref().to_path_buf(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl ArtifactStore for MemoryStore {
    fn exists(&self, dataname: &str, idpars: &IdPars) -> Result<bool, StorageError> {
        Ok(self.records.read().contains_key(&params::digest(dataname, idpars)))
    }

    fn fetch(&self, dataname: &str, idpars: &IdPars) -> Result<Artifact, StorageError> {
        self.records
            .read()
            .get(&params::digest(dataname, idpars))
            .map(|record| record.artifact.clone())
            .ok_or_else(|| not_found(dataname, idpars))
    }

    fn store(&self, artifact: &Artifact, dataname: &str, idpars: &IdPars) -> Result<(), StorageError> {
        let record = StoredRecord::new(artifact, dataname, idpars);
        self.records.write().insert(record.digest.clone(), record);
        Ok(())
    }

    fn path_for(&self, dataname: &str, idpars: &IdPars, extension: &str) -> Result<PathBuf, StorageError> {
        layout_path(&self.log_root, dataname, idpars, extension)
    }

    fn list(&self) -> Result<Vec<RecordInfo>, StorageError> {
        let mut records: Vec<RecordInfo> = self.records.read().values().map(StoredRecord::info).collect();
        records.sort_by(|a, b| (&a.dataname, &a.digest).cmp(&(&b.dataname, &b.digest)));
        Ok(records)
    }
}

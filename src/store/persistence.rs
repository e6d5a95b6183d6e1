//! Sled-backed artifact store
//!
//! Records live in a sled database under `{root}/records`, keyed by the record
//! digest. Log files are placed under `{root}/logs` with the shared layout.

use crate::error::StorageError;
use crate::params::{self, IdPars};
use crate::setup::Artifact;
use crate::store::{layout_path, not_found, ArtifactStore, RecordInfo, StoredRecord};
use bincode;
use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sled;
use std::path::{Path, PathBuf};

/// On-disk envelope. Open-ended values are kept as JSON text because bincode
/// cannot decode self-describing data.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    dataname: String,
    digest: String,
    stored_at_millis: i64,
    idpars_json: String,
    artifact_json: String,
}

impl Envelope {
    fn encode(record: &StoredRecord) -> Result<Vec<u8>, StorageError> {
        let envelope = Envelope {
            dataname: record.dataname.clone(),
            digest: record.digest.clone(),
            stored_at_millis: record.stored_at.timestamp_millis(),
            idpars_json: serde_json::to_string(&record.idpars).map_err(|e| {
                StorageError::Serialization(format!("Failed to encode identity parameters: {}", e))
            })?,
            artifact_json: serde_json::to_string(&record.artifact).map_err(|e| {
                StorageError::Serialization(format!("Failed to encode artifact: {}", e))
            })?,
        };
        bincode::serialize(&envelope)
            .map_err(|e| StorageError::Serialization(format!("Failed to encode record: {}", e)))
    }

    fn decode(bytes: &[u8]) -> Result<StoredRecord, StorageError> {
        let envelope: Envelope = bincode::deserialize(bytes)
            .map_err(|e| StorageError::Serialization(format!("Failed to decode record: {}", e)))?;
        let idpars: IdPars = serde_json::from_str(&envelope.idpars_json).map_err(|e| {
            StorageError::Serialization(format!("Failed to decode identity parameters: {}", e))
        })?;
        let artifact: Artifact = serde_json::from_str(&envelope.artifact_json)
            .map_err(|e| StorageError::Serialization(format!("Failed to decode artifact: {}", e)))?;
        let stored_at = Utc
            .timestamp_millis_opt(envelope.stored_at_millis)
            .single()
            .ok_or_else(|| {
                StorageError::Serialization(format!(
                    "Invalid timestamp {} in record {}",
                    envelope.stored_at_millis, envelope.digest
                ))
            })?;
        Ok(StoredRecord {
            dataname: envelope.dataname,
            idpars,
            digest: envelope.digest,
            stored_at,
            artifact,
        })
    }
}

fn db_error(context: &str, e: sled::Error) -> StorageError {
    StorageError::Database(format!("{}: {}", context, e))
}

/// Sled-based implementation of ArtifactStore
pub struct SledArtifactStore {
    db: sled::Db,
    log_root: PathBuf,
}

impl SledArtifactStore {
    /// Open (creating if needed) a store rooted at `root`
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self, StorageError> {
        let root = root.as_ref();
        std::fs::create_dir_all(root)?;
        let db = sled::open(root.join("records"))
            .map_err(|e| db_error("Failed to open sled database", e))?;
        Ok(Self {
            db,
            log_root: root.join("logs"),
        })
    }

    /// Flush all pending writes to disk
    pub fn flush(&self) -> Result<(), StorageError> {
        self.db
            .flush()
            .map_err(|e| db_error("Failed to flush database", e))?;
        Ok(())
    }

    fn record(&self, dataname: &str, idpars: &IdPars) -> Result<Option<StoredRecord>, StorageError> {
        let key = params::digest(dataname, idpars);
        match self
            .db
            .get(key.as_bytes())
            .map_err(|e| db_error("Failed to get record", e))?
        {
            Some(bytes) => Ok(Some(Envelope::decode(&bytes)?)),
            None => Ok(None),
        }
    }
}

impl ArtifactStore for SledArtifactStore {
    fn exists(&self, dataname: &str, idpars: &IdPars) -> Result<bool, StorageError> {
        let key = params::digest(dataname, idpars);
        self.db
            .contains_key(key.as_bytes())
            .map_err(|e| db_error("Failed to check record existence", e))
    }

    fn fetch(&self, dataname: &str, idpars: &IdPars) -> Result<Artifact, StorageError> {
        self.record(dataname, idpars)?
            .map(|record| record.artifact)
            .ok_or_else(|| not_found(dataname, idpars))
    }

    fn store(&self, artifact: &Artifact, dataname: &str, idpars: &IdPars) -> Result<(), StorageError> {
        let record = StoredRecord::new(artifact, dataname, idpars);
        let value = Envelope::encode(&record)?;
        self.db
            .insert(record.digest.as_bytes(), value)
            .map_err(|e| db_error("Failed to put record", e))?;
        self.flush()
    }

    fn path_for(&self, dataname: &str, idpars: &IdPars, extension: &str) -> Result<PathBuf, StorageError> {
        layout_path(&self.log_root, dataname, idpars, extension)
    }

    fn list(&self) -> Result<Vec<RecordInfo>, StorageError> {
        let mut records = Vec::new();
        for item in self.db.iter() {
            let (_, value) = item.map_err(|e| db_error("Failed to iterate store", e))?;
            records.push(Envelope::decode(&value)?.info());
        }
        records.sort_by(|a, b| (&a.dataname, &a.digest).cmp(&(&b.dataname, &b.digest)));
        Ok(records)
    }
}

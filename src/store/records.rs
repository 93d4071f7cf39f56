//! Persistent store for local file records.

use crate::error::{Error, Result};
use crate::record::LocalFileRecord;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// File extension for persisted record files.
const RECORD_EXT: &str = "rec";

/// Store of [`LocalFileRecord`]s, keyed by generated id.
///
/// `save` is a full overwrite of the record; callers read the entire
/// record, mutate it and save it back. There is no partial-field update
/// and no optimistic concurrency check, so concurrent writers to one id
/// must serialise externally.
pub struct RecordStore {
    dir: PathBuf,
    records: RwLock<HashMap<Uuid, LocalFileRecord>>,
}

impl RecordStore {
    /// Open the store rooted at `dir`, loading any persisted records.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or read.
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;

        let mut records = HashMap::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXT) {
                continue;
            }
            match Self::load_record(&path) {
                Ok(record) => {
                    records.insert(record.id, record);
                }
                Err(e) => {
                    // A corrupt entry must not take the whole store down.
                    warn!("Skipping unreadable record file {}: {e}", path.display());
                }
            }
        }
        debug!("Record store opened with {} records", records.len());

        Ok(Self {
            dir: dir.to_path_buf(),
            records: RwLock::new(records),
        })
    }

    /// Create a new record, assigning it a fresh id.
    ///
    /// The builder receives the generated id so callers can derive
    /// id-dependent fields (such as the local byte path).
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be persisted.
    pub fn create<F>(&self, build: F) -> Result<LocalFileRecord>
    where
        F: FnOnce(Uuid) -> LocalFileRecord,
    {
        let id = self.fresh_id();
        let record = build(id);
        self.persist(&record)?;
        self.records.write().insert(id, record.clone());
        debug!("Created local file record {id}");
        Ok(record)
    }

    /// Look up a record by its id.
    #[must_use]
    pub fn find_by_id(&self, id: Uuid) -> Option<LocalFileRecord> {
        self.records.read().get(&id).cloned()
    }

    /// Look up a record by the external id the storage network assigned it.
    #[must_use]
    pub fn find_by_dds_id(&self, dds_id: &str) -> Option<LocalFileRecord> {
        self.records
            .read()
            .values()
            .find(|record| record.dds_id.as_deref() == Some(dds_id))
            .cloned()
    }

    /// Overwrite the stored record keyed by its id.
    ///
    /// Last write wins; there is no version check.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be persisted.
    pub fn save(&self, record: LocalFileRecord) -> Result<LocalFileRecord> {
        self.persist(&record)?;
        self.records.write().insert(record.id, record.clone());
        Ok(record)
    }

    /// Number of records in the store.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns true if the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    fn fresh_id(&self) -> Uuid {
        // Ids are never reused; v4 collisions are vanishingly unlikely but
        // the loop keeps the invariant unconditional.
        let records = self.records.read();
        loop {
            let id = Uuid::new_v4();
            if !records.contains_key(&id) {
                return id;
            }
        }
    }

    fn record_path(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{id}.{RECORD_EXT}"))
    }

    fn persist(&self, record: &LocalFileRecord) -> Result<()> {
        let encoded =
            rmp_serde::to_vec_named(record).map_err(|e| Error::Serialization(e.to_string()))?;
        std::fs::write(self.record_path(record.id), encoded)?;
        Ok(())
    }

    fn load_record(path: &Path) -> Result<LocalFileRecord> {
        let bytes = std::fs::read(path)?;
        rmp_serde::from_slice(&bytes).map_err(|e| Error::Serialization(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::record::NewFileRecord;
    use chrono::Utc;

    fn sample_record(id: Uuid) -> LocalFileRecord {
        LocalFileRecord::new(
            id,
            NewFileRecord {
                name: "data.bin".to_string(),
                extension: "bin".to_string(),
                mime_type: "application/octet-stream".to_string(),
                metadata: serde_json::json!({}),
                keep_until: Utc::now(),
                price: 5.0,
                data_validator_address: "0xvalidator".to_string(),
            },
            PathBuf::from(format!("/tmp/{id}")),
            "0xservice".to_string(),
        )
    }

    #[test]
    fn test_create_assigns_id_and_finds() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open(dir.path()).unwrap();

        let record = store.create(sample_record).unwrap();
        let found = store.find_by_id(record.id).unwrap();
        assert_eq!(found.name, "data.bin");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_find_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open(dir.path()).unwrap();
        assert!(store.find_by_id(Uuid::new_v4()).is_none());
        assert!(store.find_by_dds_id("dds-missing").is_none());
    }

    #[test]
    fn test_save_overwrites_whole_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open(dir.path()).unwrap();

        let mut record = store.create(sample_record).unwrap();
        record.size = 42;
        record.dds_id = Some("dds-1".to_string());
        store.save(record.clone()).unwrap();

        let found = store.find_by_id(record.id).unwrap();
        assert_eq!(found.size, 42);
        assert_eq!(store.find_by_dds_id("dds-1").unwrap().id, record.id);
    }

    #[test]
    fn test_records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let id = {
            let store = RecordStore::open(dir.path()).unwrap();
            let mut record = store.create(sample_record).unwrap();
            record.dds_id = Some("dds-persist".to_string());
            store.save(record.clone()).unwrap();
            record.id
        };

        let reopened = RecordStore::open(dir.path()).unwrap();
        let found = reopened.find_by_id(id).unwrap();
        assert_eq!(found.dds_id.as_deref(), Some("dds-persist"));
    }

    #[test]
    fn test_corrupt_record_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = RecordStore::open(dir.path()).unwrap();
            store.create(sample_record).unwrap();
        }
        std::fs::write(dir.path().join("broken.rec"), b"not msgpack").unwrap();

        let reopened = RecordStore::open(dir.path()).unwrap();
        assert_eq!(reopened.len(), 1);
    }
}

// ============================================================================
// STORE - Persistence seam for records and frameworks, plus the file store
// ============================================================================

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{Framework, ReflectionRecord, builtin_frameworks};

const MAX_FILE_SIZE: u64 = 50 * 1024 * 1024; // 50 MB max per file

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record {0} not found")]
    NotFound(String),
    #[error("record {0} belongs to another user")]
    Forbidden(String),
    #[error("unknown framework: {0}")]
    UnknownFramework(String),
    #[error("data exceeds maximum size limit")]
    TooLarge,
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("encoding error (file may be corrupted): {0}")]
    Encoding(#[from] bincode::Error),
}

/// Fields the editor supplies for a new record; ids and timestamps come from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    pub owner: String,
    pub framework_id: String,
    pub date: String,
    pub content: HashMap<String, String>,
}

pub trait ReflectionStore {
    fn list_frameworks(&self) -> Result<Vec<Framework>, StoreError>;

    fn list_records(&self, owner: &str) -> Result<Vec<ReflectionRecord>, StoreError>;

    fn create_record(&mut self, record: NewRecord) -> Result<ReflectionRecord, StoreError>;

    /// Replace the whole content of an existing record.
    fn update_record(
        &mut self,
        id: &str,
        owner: &str,
        content: HashMap<String, String>,
    ) -> Result<ReflectionRecord, StoreError>;

    fn delete_record(&mut self, id: &str, owner: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreData {
    frameworks: Vec<Framework>,
    records: Vec<ReflectionRecord>,
}

/// Bincode-backed store in a single file.
pub struct FileStore {
    path: PathBuf,
    data: StoreData,
}

impl FileStore {
    /// Open the store, seeding the built-in frameworks when the file is new.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let data = if path.exists() {
            let metadata = fs::metadata(&path)?;
            if metadata.len() > MAX_FILE_SIZE {
                return Err(StoreError::TooLarge);
            }
            let bytes = fs::read(&path)?;
            let mut data: StoreData = bincode::deserialize(&bytes)?;
            if data.frameworks.is_empty() {
                data.frameworks = builtin_frameworks();
            }
            info!("Loaded {} reflections from {:?}", data.records.len(), path);
            data
        } else {
            info!("No store at {:?}, starting with built-in frameworks", path);
            StoreData {
                frameworks: builtin_frameworks(),
                records: Vec::new(),
            }
        };
        Ok(Self { path, data })
    }

    fn persist(&self) -> Result<(), StoreError> {
        let serialized = bincode::serialize(&self.data)?;
        if serialized.len() > MAX_FILE_SIZE as usize {
            return Err(StoreError::TooLarge);
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        // Write to temporary file first, then atomic rename
        let temp_path = self.path.with_extension("bin.tmp");
        fs::write(&temp_path, serialized)?;
        fs::rename(temp_path, &self.path)?;
        debug!("Persisted {} reflections", self.data.records.len());
        Ok(())
    }

    fn owned_index(&self, id: &str, owner: &str) -> Result<usize, StoreError> {
        let idx = self
            .data
            .records
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if self.data.records[idx].owner != owner {
            return Err(StoreError::Forbidden(id.to_string()));
        }
        Ok(idx)
    }
}

impl ReflectionStore for FileStore {
    fn list_frameworks(&self) -> Result<Vec<Framework>, StoreError> {
        Ok(self.data.frameworks.clone())
    }

    fn list_records(&self, owner: &str) -> Result<Vec<ReflectionRecord>, StoreError> {
        let mut records: Vec<ReflectionRecord> = self
            .data
            .records
            .iter()
            .filter(|r| r.owner == owner)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.date.cmp(&a.date).then(b.created_at.cmp(&a.created_at)));
        Ok(records)
    }

    fn create_record(&mut self, record: NewRecord) -> Result<ReflectionRecord, StoreError> {
        if !self.data.frameworks.iter().any(|f| f.id == record.framework_id) {
            return Err(StoreError::UnknownFramework(record.framework_id));
        }
        let now = Utc::now();
        let created = ReflectionRecord {
            id: Uuid::new_v4().to_string(),
            owner: record.owner,
            framework_id: record.framework_id,
            content: record.content,
            date: record.date,
            created_at: now,
            updated_at: now,
        };
        self.data.records.push(created.clone());
        if let Err(e) = self.persist() {
            self.data.records.pop();
            return Err(e);
        }
        info!("Created reflection {} for {}", created.id, created.date);
        Ok(created)
    }

    fn update_record(
        &mut self,
        id: &str,
        owner: &str,
        content: HashMap<String, String>,
    ) -> Result<ReflectionRecord, StoreError> {
        let idx = self.owned_index(id, owner)?;
        let previous = self.data.records[idx].clone();
        {
            let record = &mut self.data.records[idx];
            record.content = content;
            record.updated_at = Utc::now();
        }
        if let Err(e) = self.persist() {
            self.data.records[idx] = previous;
            return Err(e);
        }
        info!("Updated reflection {}", id);
        Ok(self.data.records[idx].clone())
    }

    fn delete_record(&mut self, id: &str, owner: &str) -> Result<(), StoreError> {
        let idx = self.owned_index(id, owner)?;
        let removed = self.data.records.remove(idx);
        if let Err(e) = self.persist() {
            self.data.records.insert(idx, removed);
            return Err(e);
        }
        info!("Deleted reflection {}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_record(owner: &str, date: &str) -> NewRecord {
        NewRecord {
            owner: owner.to_string(),
            framework_id: "ywt".to_string(),
            date: date.to_string(),
            content: HashMap::from([("y".to_string(), "shipped it".to_string())]),
        }
    }

    #[test]
    fn test_create_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reflections.bin");

        let mut store = FileStore::open(&path).unwrap();
        assert_eq!(store.list_frameworks().unwrap().len(), builtin_frameworks().len());
        let created = store.create_record(new_record("alice", "2024-11-05")).unwrap();
        store.create_record(new_record("bob", "2024-11-06")).unwrap();

        let reopened = FileStore::open(&path).unwrap();
        let records = reopened.list_records("alice").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0], created);
    }

    #[test]
    fn test_unknown_framework_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::open(dir.path().join("r.bin")).unwrap();
        let mut record = new_record("alice", "2024-11-05");
        record.framework_id = "nope".to_string();
        assert!(matches!(store.create_record(record), Err(StoreError::UnknownFramework(_))));
    }

    #[test]
    fn test_update_replaces_content_and_checks_owner() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::open(dir.path().join("r.bin")).unwrap();
        let created = store.create_record(new_record("alice", "2024-11-05")).unwrap();

        let content = HashMap::from([("w".to_string(), "learned".to_string())]);
        assert!(matches!(
            store.update_record(&created.id, "bob", content.clone()),
            Err(StoreError::Forbidden(_))
        ));

        let updated = store.update_record(&created.id, "alice", content.clone()).unwrap();
        assert_eq!(updated.content, content);
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.framework_id, created.framework_id);
        assert!(updated.updated_at >= created.updated_at);
    }

    #[test]
    fn test_delete() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::open(dir.path().join("r.bin")).unwrap();
        let created = store.create_record(new_record("alice", "2024-11-05")).unwrap();

        assert!(matches!(store.delete_record("missing", "alice"), Err(StoreError::NotFound(_))));
        assert!(matches!(store.delete_record(&created.id, "bob"), Err(StoreError::Forbidden(_))));
        store.delete_record(&created.id, "alice").unwrap();
        assert!(store.list_records("alice").unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("r.bin");
        fs::write(&path, b"\xFF\xFF\xFF\xFF\xFF\xFF\xFF\xFF\xFF").unwrap();
        assert!(matches!(FileStore::open(&path), Err(StoreError::Encoding(_))));
    }
}

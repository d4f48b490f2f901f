//! Operation Store
//!
//! Durable, crash-safe key/value log of Operation records. The file-backed
//! implementation keeps the whole set in memory and flushes a full snapshot
//! on every write:
//!
//! 1. Serialize everything to `operations.json.tmp`
//! 2. Copy the previous `operations.json` to `operations.json.bak` (best effort)
//! 3. `fs::rename` the temp file into place (atomic)
//!
//! A crash mid-write leaves either the previous snapshot or the new one,
//! never a torn file. Loading falls back to the backup when the primary
//! fails to parse.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use super::types::{Operation, OperationId};

const PRIMARY_FILE: &str = "operations.json";
const TEMP_FILE: &str = "operations.json.tmp";
const BACKUP_FILE: &str = "operations.json.bak";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store io error: {0}")]
    Io(#[from] io::Error),

    #[error("store serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Shared store abstraction, injected into the orchestrator
pub trait OperationStore: Send + Sync {
    fn get(&self, id: OperationId) -> Result<Option<Operation>, StoreError>;
    fn put(&self, op: &Operation) -> Result<(), StoreError>;
    fn scan(&self) -> Result<Vec<Operation>, StoreError>;
    fn remove(&self, id: OperationId) -> Result<bool, StoreError>;
}

/// On-disk snapshot document
#[derive(Serialize, Deserialize)]
struct StoreDocument {
    format_version: u32,
    operations: BTreeMap<String, Operation>,
}

/// File-backed store with atomic whole-snapshot writes
pub struct FileStore {
    dir: PathBuf,
    operations: Mutex<BTreeMap<String, Operation>>,
}

impl FileStore {
    /// Open (or create) a store under `dir`
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let operations = Self::load(&dir)?;
        info!(
            dir = %dir.display(),
            count = operations.len(),
            "Operation store opened"
        );

        Ok(Self {
            dir,
            operations: Mutex::new(operations),
        })
    }

    fn load(dir: &Path) -> Result<BTreeMap<String, Operation>, StoreError> {
        let primary = dir.join(PRIMARY_FILE);
        if !primary.exists() {
            return Ok(BTreeMap::new());
        }

        match Self::read_document(&primary) {
            Ok(doc) => Ok(doc.operations),
            Err(e) => {
                warn!(
                    path = %primary.display(),
                    "Primary snapshot unreadable ({}), trying backup", e
                );
                let backup = dir.join(BACKUP_FILE);
                let doc = Self::read_document(&backup)?;
                Ok(doc.operations)
            }
        }
    }

    fn read_document(path: &Path) -> Result<StoreDocument, StoreError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Flush the full snapshot. Caller holds the operations lock.
    fn flush(&self, operations: &BTreeMap<String, Operation>) -> Result<(), StoreError> {
        let doc = StoreDocument {
            format_version: 1,
            operations: operations.clone(),
        };

        let tmp = self.dir.join(TEMP_FILE);
        let primary = self.dir.join(PRIMARY_FILE);
        let backup = self.dir.join(BACKUP_FILE);

        fs::write(&tmp, serde_json::to_string_pretty(&doc)?)?;

        // Best-effort backup of the previous snapshot
        if primary.exists() {
            if let Err(e) = fs::copy(&primary, &backup) {
                warn!("Failed to keep snapshot backup: {}", e);
            }
        }

        fs::rename(&tmp, &primary)?;
        Ok(())
    }
}

impl OperationStore for FileStore {
    fn get(&self, id: OperationId) -> Result<Option<Operation>, StoreError> {
        let operations = self.operations.lock().unwrap();
        Ok(operations.get(&id.to_string()).cloned())
    }

    fn put(&self, op: &Operation) -> Result<(), StoreError> {
        let mut operations = self.operations.lock().unwrap();
        operations.insert(op.id.to_string(), op.clone());
        self.flush(&operations)
    }

    fn scan(&self) -> Result<Vec<Operation>, StoreError> {
        let operations = self.operations.lock().unwrap();
        Ok(operations.values().cloned().collect())
    }

    fn remove(&self, id: OperationId) -> Result<bool, StoreError> {
        let mut operations = self.operations.lock().unwrap();
        let removed = operations.remove(&id.to_string()).is_some();
        if removed {
            self.flush(&operations)?;
        }
        Ok(removed)
    }
}

/// In-memory store, used in tests and as a non-durable fallback
#[derive(Default)]
pub struct MemoryStore {
    operations: Mutex<BTreeMap<String, Operation>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OperationStore for MemoryStore {
    fn get(&self, id: OperationId) -> Result<Option<Operation>, StoreError> {
        Ok(self.operations.lock().unwrap().get(&id.to_string()).cloned())
    }

    fn put(&self, op: &Operation) -> Result<(), StoreError> {
        self.operations
            .lock()
            .unwrap()
            .insert(op.id.to_string(), op.clone());
        Ok(())
    }

    fn scan(&self) -> Result<Vec<Operation>, StoreError> {
        Ok(self.operations.lock().unwrap().values().cloned().collect())
    }

    fn remove(&self, id: OperationId) -> Result<bool, StoreError> {
        Ok(self
            .operations
            .lock()
            .unwrap()
            .remove(&id.to_string())
            .is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::state::OperationState;
    use crate::operation::types::{Asset, TransferRequest};
    use rust_decimal::Decimal;

    fn test_dir(tag: &str) -> PathBuf {
        PathBuf::from(format!("target/test_store_{}_{}", tag, std::process::id()))
    }

    fn sample_op() -> Operation {
        Operation::new(&TransferRequest::new(
            "src",
            "dst",
            Decimal::from(10),
            Asset::Usdc,
        ))
    }

    #[test]
    fn test_put_get_scan_remove() {
        let dir = test_dir("crud");
        let _ = fs::remove_dir_all(&dir);

        let store = FileStore::open(&dir).unwrap();
        let op = sample_op();

        store.put(&op).unwrap();
        assert_eq!(store.get(op.id).unwrap().unwrap().id, op.id);
        assert_eq!(store.scan().unwrap().len(), 1);

        assert!(store.remove(op.id).unwrap());
        assert!(!store.remove(op.id).unwrap());
        assert!(store.get(op.id).unwrap().is_none());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_survives_reopen() {
        let dir = test_dir("reopen");
        let _ = fs::remove_dir_all(&dir);

        let mut op = sample_op();
        op.state = OperationState::Depositing;
        op.pool_address = Some("pool".to_string());

        {
            let store = FileStore::open(&dir).unwrap();
            store.put(&op).unwrap();
        }

        let store = FileStore::open(&dir).unwrap();
        let loaded = store.get(op.id).unwrap().unwrap();
        assert_eq!(loaded.state, OperationState::Depositing);
        assert_eq!(loaded.pool_address.as_deref(), Some("pool"));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_corrupt_primary_falls_back_to_backup() {
        let dir = test_dir("backup");
        let _ = fs::remove_dir_all(&dir);

        let op = sample_op();
        {
            let store = FileStore::open(&dir).unwrap();
            store.put(&op).unwrap();
            // Second write creates the backup of the first snapshot
            let mut updated = op.clone();
            updated.state = OperationState::Depositing;
            store.put(&updated).unwrap();
        }

        // Simulate a torn primary write
        fs::write(dir.join(PRIMARY_FILE), "{\"format_version\":1,\"opera").unwrap();

        let store = FileStore::open(&dir).unwrap();
        let loaded = store.get(op.id).unwrap().unwrap();
        // Backup holds the first snapshot
        assert_eq!(loaded.state, OperationState::Pending);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_dir_created() {
        let dir = test_dir("fresh").join("nested");
        let _ = fs::remove_dir_all(&dir);

        let store = FileStore::open(&dir).unwrap();
        assert!(store.scan().unwrap().is_empty());

        let _ = fs::remove_dir_all(dir.parent().unwrap());
    }
}

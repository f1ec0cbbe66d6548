//! Status store — durable per-resource status records.
//!
//! File storage format: one JSON record per resource key,
//!   <dir>/<key>.json = {"status": {...}, "hash": "<sha256 of status JSON>"}
//!
//! Rules:
//!   - write to a temp file, fsync, then rename over the record
//!   - hash verified on every load; mismatch is reported as corruption
//!   - keys must match [A-Za-z0-9_.-]+ and may not start with '.'

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::resource::ResourceStatus;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt status record for {key:?}: hash mismatch")]
    Corrupt { key: String },

    #[error("Invalid resource key {0:?}: must match [A-Za-z0-9_.-]+")]
    InvalidKey(String),
}

/// Where the driver keeps resource status between passes.
pub trait StatusStore {
    /// `Ok(None)` means the resource has never been recorded.
    fn load(&self, key: &str) -> Result<Option<ResourceStatus>, StoreError>;

    fn save(&mut self, key: &str, status: &ResourceStatus) -> Result<(), StoreError>;
}

/// Resource keys become file names.
pub fn validate_key(key: &str) -> Result<(), StoreError> {
    let valid = !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' || ch == '.');
    if !valid {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Write `content` to `tmp`, fsync, then rename over `path`. `tmp` is
/// removed if any step fails.
fn write_atomic(tmp: &Path, path: &Path, content: &[u8]) -> io::Result<()> {
    let written = File::create(tmp)
        .and_then(|mut file| {
            file.write_all(content)?;
            file.sync_all()
        })
        .and_then(|()| fs::rename(tmp, path));
    if written.is_err() {
        fs::remove_file(tmp).ok();
    }
    written
}

fn status_hash(status_json: &str) -> String {
    let digest = Sha256::digest(status_json.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// On-disk record.
#[derive(Serialize, Deserialize)]
struct StatusRecord {
    status: ResourceStatus,
    hash: String,
}

// ---------------------------------------------------------------------------
// FileStatusStore
// ---------------------------------------------------------------------------

/// Directory of JSON status records.
#[derive(Debug, Clone)]
pub struct FileStatusStore {
    dir: PathBuf,
}

impl FileStatusStore {
    /// Open or create a store rooted at `dir`.
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    /// Keys of every stored record, sorted.
    pub fn keys(&self) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let name = entry?.file_name();
            let name = name.to_string_lossy();
            if let Some(key) = name.strip_suffix(".json") {
                if validate_key(key).is_ok() {
                    keys.push(key.to_string());
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}

impl StatusStore for FileStatusStore {
    fn load(&self, key: &str) -> Result<Option<ResourceStatus>, StoreError> {
        validate_key(key)?;
        let path = self.record_path(key);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)?;
        let record: StatusRecord = serde_json::from_str(&content)?;
        let status_json = serde_json::to_string(&record.status)?;
        if status_hash(&status_json) != record.hash {
            return Err(StoreError::Corrupt {
                key: key.to_string(),
            });
        }
        Ok(Some(record.status))
    }

    fn save(&mut self, key: &str, status: &ResourceStatus) -> Result<(), StoreError> {
        validate_key(key)?;
        let status_json = serde_json::to_string(status)?;
        let record = StatusRecord {
            status: status.clone(),
            hash: status_hash(&status_json),
        };
        let content = serde_json::to_string(&record)?;

        let path = self.record_path(key);
        let tmp = self.dir.join(format!(".{}.json.tmp", key));
        write_atomic(&tmp, &path, content.as_bytes())?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryStatusStore
// ---------------------------------------------------------------------------

/// In-process store, for tests and drivers that persist elsewhere.
#[derive(Debug, Clone, Default)]
pub struct MemoryStatusStore {
    records: BTreeMap<String, ResourceStatus>,
}

impl MemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl StatusStore for MemoryStatusStore {
    fn load(&self, key: &str) -> Result<Option<ResourceStatus>, StoreError> {
        validate_key(key)?;
        Ok(self.records.get(key).cloned())
    }

    fn save(&mut self, key: &str, status: &ResourceStatus) -> Result<(), StoreError> {
        validate_key(key)?;
        self.records.insert(key.to_string(), status.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys() {
        assert!(validate_key("default.cluster-1").is_ok());
        assert!(validate_key("under_score").is_ok());
        for bad in ["", ".hidden", "a/b", "../up", "white space"] {
            assert!(
                matches!(validate_key(bad), Err(StoreError::InvalidKey(_))),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn memory_store_round_trip() {
        let mut store = MemoryStatusStore::new();
        assert!(store.load("r1").unwrap().is_none());

        let status = ResourceStatus {
            reconcile_version: Some(3),
            ..ResourceStatus::default()
        };
        store.save("r1", &status).unwrap();
        assert_eq!(store.load("r1").unwrap(), Some(status));
        assert_eq!(store.len(), 1);
        assert!(store.save("a/b", &ResourceStatus::default()).is_err());
    }

    #[test]
    fn failed_write_leaves_no_temp_file() {
        let dir = std::env::temp_dir()
            .join("reconcile_runtime_unit")
            .join("failed_write");
        if dir.exists() {
            fs::remove_dir_all(&dir).ok();
        }
        let mut store = FileStatusStore::open(&dir).unwrap();

        // A directory where the record should go makes the rename fail.
        fs::create_dir_all(dir.join("r.json").join("occupied")).unwrap();
        let err = store.save("r", &ResourceStatus::default()).unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
        assert!(!dir.join(".r.json.tmp").exists());

        fs::remove_dir_all(dir.join("r.json")).unwrap();
        store.save("r", &ResourceStatus::default()).unwrap();
        assert!(!dir.join(".r.json.tmp").exists());
        assert_eq!(store.load("r").unwrap(), Some(ResourceStatus::default()));
    }
}

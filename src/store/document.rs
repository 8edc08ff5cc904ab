use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{ChatError, Result};

/// Whole-document JSON persistence.
///
/// `read` never fails: a missing or unparsable document is the empty object.
/// `write` replaces the document in one visible step, so a concurrent reader
/// sees either the old image or the new one.
pub trait DocumentStore: Send + Sync {
    fn read(&self, path: &Path) -> Value;

    fn write(&self, path: &Path, doc: &Value) -> Result<()>;

    fn exists(&self, path: &Path) -> bool;
}

/// Read the sequence stored under `key`, skipping entries that do not decode.
///
/// An object keyed by index (`{"0": .., "2": ..}`), as left behind by older
/// boards after a removal, is read as a sequence in numeric key order.
pub fn read_sequence<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    path: &Path,
    key: &str,
) -> Vec<T> {
    let doc = store.read(path);
    let items: Vec<&Value> = match doc.get(key) {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(Value::Object(keyed)) => {
            let mut pairs: Vec<(&String, &Value)> = keyed.iter().collect();
            pairs.sort_by_key(|(k, _)| k.parse::<u64>().unwrap_or(u64::MAX));
            pairs.into_iter().map(|(_, v)| v).collect()
        }
        _ => return vec![],
    };
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item.clone()) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(path = %path.display(), key, error = %e, "skipping undecodable entry");
                None
            }
        })
        .collect()
}

/// Persist `items` as `{ key: [...] }`.
pub fn write_sequence<T: serde::Serialize>(
    store: &dyn DocumentStore,
    path: &Path,
    key: &str,
    items: &[T],
) -> Result<()> {
    let mut doc = Map::new();
    doc.insert(key.to_string(), serde_json::to_value(items)?);
    store.write(path, &Value::Object(doc))
}

fn empty_document() -> Value {
    Value::Object(Map::new())
}

// ---------------------------------------------------------------------------
// Filesystem
// ---------------------------------------------------------------------------

/// Documents on the local filesystem, replaced via temp file + rename.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsDocumentStore;

impl FsDocumentStore {
    fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
        // Temp file lives next to the target so the rename stays on one filesystem.
        let parent = path.parent().unwrap_or(Path::new("."));
        fs::create_dir_all(parent)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp_path = parent.join(format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4()));

        let result = (|| {
            let mut f = fs::File::create(&tmp_path)?;
            f.write_all(data)?;
            f.sync_data()?;
            fs::rename(&tmp_path, path)
        })();
        if result.is_err() {
            let _ = fs::remove_file(&tmp_path);
        }
        result
    }
}

impl DocumentStore for FsDocumentStore {
    fn read(&self, path: &Path) -> Value {
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "unreadable document, treating as empty");
                }
                return empty_document();
            }
        };
        match serde_json::from_str::<Value>(&content) {
            Ok(v @ Value::Object(_)) => v,
            Ok(_) => {
                warn!(path = %path.display(), "document is not an object, treating as empty");
                empty_document()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "corrupt document, treating as empty");
                empty_document()
            }
        }
    }

    fn write(&self, path: &Path, doc: &Value) -> Result<()> {
        let json = serde_json::to_string_pretty(doc)?;
        Self::write_atomic(path, json.as_bytes()).map_err(|e| {
            warn!(path = %path.display(), error = %e, "document write failed");
            ChatError::StorageFailure(path.display().to_string())
        })?;
        debug!(path = %path.display(), bytes = json.len(), "document written");
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// Documents held in memory. Used by tests and embedders that do not want a
/// filesystem.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    docs: Mutex<HashMap<PathBuf, Value>>,
    fail_writes: AtomicBool,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `write` fail with a storage failure.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Store a raw document, bypassing validation.
    pub fn insert_raw(&self, path: impl Into<PathBuf>, doc: Value) {
        self.lock_docs().insert(path.into(), doc);
    }

    fn lock_docs(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, Value>> {
        // A panic while holding this mutex cannot leave a half-written map entry.
        self.docs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn read(&self, path: &Path) -> Value {
        match self.lock_docs().get(path) {
            Some(v @ Value::Object(_)) => v.clone(),
            _ => empty_document(),
        }
    }

    fn write(&self, path: &Path, doc: &Value) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ChatError::StorageFailure(path.display().to_string()));
        }
        self.lock_docs().insert(path.to_path_buf(), doc.clone());
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.lock_docs().contains_key(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn missing_file_reads_as_empty_object() {
        let dir = tempdir().unwrap();
        let doc = FsDocumentStore.read(&dir.path().join("absent.json"));
        assert_eq!(doc, json!({}));
    }

    #[test]
    fn corrupt_file_reads_as_empty_object() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("messages.json");
        fs::write(&path, "{not json").unwrap();
        assert_eq!(FsDocumentStore.read(&path), json!({}));

        fs::write(&path, "[1, 2, 3]").unwrap();
        assert_eq!(FsDocumentStore.read(&path), json!({}));
    }

    #[test]
    fn write_replaces_document_and_leaves_no_temp_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("users.json");
        FsDocumentStore
            .write(&path, &json!({"users": [{"name": "a"}]}))
            .unwrap();
        FsDocumentStore.write(&path, &json!({"users": []})).unwrap();

        assert_eq!(FsDocumentStore.read(&path), json!({"users": []}));
        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["users.json".to_string()]);
    }

    #[test]
    fn write_into_unwritable_location_reports_storage_failure() {
        let dir = tempdir().unwrap();
        // A regular file where a directory is expected.
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "").unwrap();
        let err = FsDocumentStore
            .write(&blocker.join("messages.json"), &json!({}))
            .unwrap_err();
        assert!(matches!(err, ChatError::StorageFailure(_)));
    }

    #[test]
    fn read_sequence_skips_bad_entries_and_missing_key() {
        #[derive(serde::Deserialize, Debug, PartialEq)]
        struct Item {
            n: u32,
        }
        let store = MemoryDocumentStore::new();
        let path = Path::new("/mem/items.json");
        assert!(read_sequence::<Item>(&store, path, "items").is_empty());

        store.insert_raw(path, json!({"items": [{"n": 1}, {"n": "x"}, {"n": 3}]}));
        let items: Vec<Item> = read_sequence(&store, path, "items");
        assert_eq!(items, vec![Item { n: 1 }, Item { n: 3 }]);

        store.insert_raw(path, json!({"other": []}));
        assert!(read_sequence::<Item>(&store, path, "items").is_empty());
    }

    #[test]
    fn read_sequence_accepts_index_keyed_object() {
        #[derive(serde::Deserialize, Debug, PartialEq)]
        struct Item {
            n: u32,
        }
        let store = MemoryDocumentStore::new();
        let path = Path::new("/mem/users.json");
        store.insert_raw(
            path,
            json!({"users": {"10": {"n": 10}, "0": {"n": 0}, "2": {"n": 2}}}),
        );
        let items: Vec<Item> = read_sequence(&store, path, "users");
        assert_eq!(items, vec![Item { n: 0 }, Item { n: 2 }, Item { n: 10 }]);
    }

    #[test]
    fn memory_store_can_simulate_failed_writes() {
        let store = MemoryDocumentStore::new();
        let path = Path::new("/mem/users.json");
        store.set_fail_writes(true);
        assert!(store.write(path, &json!({"users": []})).is_err());
        assert!(!store.exists(path));

        store.set_fail_writes(false);
        write_sequence::<String>(&store, path, "users", &[]).unwrap();
        assert!(store.exists(path));
        assert_eq!(store.read(path), json!({"users": []}));
    }
}

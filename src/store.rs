//! Persistence for user-entered final values.
//!
//! Reconciliation output is only a default; the user gets the last word on
//! every (entity, feature) cell. Those decisions outlive a single command
//! invocation, so they live in a key-value store backed by a JSON file that
//! is rewritten on every mutation — an edit is durable the moment it is made.
//!
//! Key layout:
//!
//! - `finalData_{entity}_{feature}` — the final value for a row.
//! - `colData_{entity}_{feature}_{sourceIndex}` — a per-column replacement
//!   for one source's raw cell, display-only.
//!
//! Stored values belong to one particular load of source files, identified
//! by a SHA-256 fingerprint over the source bytes. Opening the store against
//! a different load clears every key: final values reconcile *these* inputs,
//! not whichever inputs happen to come next.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<&str>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
    fn keys(&self) -> Vec<String>;
    fn clear(&mut self) -> Result<()>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredValue {
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    fingerprint: Option<String>,
    #[serde(default)]
    entries: BTreeMap<String, StoredValue>,
}

/// JSON-file-backed key-value store. Every mutation rewrites the file.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    contents: StoreFile,
}

impl JsonFileStore {
    pub fn open(path: &Path) -> Result<Self> {
        let contents = if path.exists() {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("Reading store file {path:?}"))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("Parsing store file {path:?}"))?
        } else {
            StoreFile::default()
        };
        Ok(Self {
            path: path.to_path_buf(),
            contents,
        })
    }

    pub fn fingerprint(&self) -> Option<&str> {
        self.contents.fingerprint.as_deref()
    }

    pub fn set_fingerprint(&mut self, fingerprint: &str) -> Result<()> {
        self.contents.fingerprint = Some(fingerprint.to_string());
        self.persist()
    }

    pub fn updated_at(&self, key: &str) -> Option<DateTime<Utc>> {
        self.contents.entries.get(key).map(|entry| entry.updated_at)
    }

    fn persist(&self) -> Result<()> {
        let serialized =
            serde_json::to_string_pretty(&self.contents).context("Serializing store contents")?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Writing store file {:?}", self.path))
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<&str> {
        self.contents
            .entries
            .get(key)
            .map(|entry| entry.value.as_str())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.contents.entries.insert(
            key.to_string(),
            StoredValue {
                value: value.to_string(),
                updated_at: Utc::now(),
            },
        );
        self.persist()
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        if self.contents.entries.remove(key).is_some() {
            self.persist()?;
        }
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        self.contents.entries.keys().cloned().collect()
    }

    fn clear(&mut self) -> Result<()> {
        if self.contents.entries.is_empty() {
            return Ok(());
        }
        self.contents.entries.clear();
        self.persist()
    }
}

/// The override store proper: owns the key layout, delegates persistence.
#[derive(Debug)]
pub struct FinalStore<S: KeyValueStore> {
    inner: S,
}

impl<S: KeyValueStore> FinalStore<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn final_key(entity: &str, feature: &str) -> String {
        format!("finalData_{entity}_{feature}")
    }

    fn column_key(entity: &str, feature: &str, source_index: usize) -> String {
        format!("colData_{entity}_{feature}_{source_index}")
    }

    pub fn final_value(&self, entity: &str, feature: &str) -> Option<&str> {
        self.inner.get(&Self::final_key(entity, feature))
    }

    pub fn set_final(&mut self, entity: &str, feature: &str, value: &str) -> Result<()> {
        self.inner.set(&Self::final_key(entity, feature), value)
    }

    pub fn clear_final(&mut self, entity: &str, feature: &str) -> Result<()> {
        self.inner.remove(&Self::final_key(entity, feature))
    }

    pub fn column_value(&self, entity: &str, feature: &str, source_index: usize) -> Option<&str> {
        self.inner
            .get(&Self::column_key(entity, feature, source_index))
    }

    pub fn set_column(
        &mut self,
        entity: &str,
        feature: &str,
        source_index: usize,
        value: &str,
    ) -> Result<()> {
        self.inner
            .set(&Self::column_key(entity, feature, source_index), value)
    }

    pub fn clear_column(&mut self, entity: &str, feature: &str, source_index: usize) -> Result<()> {
        self.inner
            .remove(&Self::column_key(entity, feature, source_index))
    }

    pub fn keys(&self) -> Vec<String> {
        self.inner.keys()
    }

    pub fn reset(&mut self) -> Result<()> {
        self.inner.clear()
    }
}

/// Opens the file-backed store and binds it to the given load fingerprint,
/// clearing any values left over from a different load.
pub fn open_store(path: &Path, fingerprint: &str) -> Result<FinalStore<JsonFileStore>> {
    let mut inner = JsonFileStore::open(path)?;
    if inner.fingerprint() != Some(fingerprint) {
        inner.clear()?;
        inner.set_fingerprint(fingerprint)?;
    }
    Ok(FinalStore::new(inner))
}

/// Opens the file-backed store without a load fingerprint, for store
/// management commands that run outside any load.
pub fn open_store_unchecked(path: &Path) -> Result<FinalStore<JsonFileStore>> {
    Ok(FinalStore::new(JsonFileStore::open(path)?))
}

/// SHA-256 over source paths and contents. Identifies one load: same files,
/// same bytes, same fingerprint.
pub fn load_fingerprint(paths: &[PathBuf]) -> Result<String> {
    let mut hasher = Sha256::new();
    for path in paths {
        hasher.update(path.to_string_lossy().as_bytes());
        hasher.update([0u8]);
        let bytes =
            fs::read(path).with_context(|| format!("Reading source file {path:?}"))?;
        hasher.update(&bytes);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MemoryStore {
        entries: HashMap<String, String>,
    }

    impl KeyValueStore for MemoryStore {
        fn get(&self, key: &str) -> Option<&str> {
            self.entries.get(key).map(String::as_str)
        }

        fn set(&mut self, key: &str, value: &str) -> Result<()> {
            self.entries.insert(key.to_string(), value.to_string());
            Ok(())
        }

        fn remove(&mut self, key: &str) -> Result<()> {
            self.entries.remove(key);
            Ok(())
        }

        fn keys(&self) -> Vec<String> {
            self.entries.keys().cloned().collect()
        }

        fn clear(&mut self) -> Result<()> {
            self.entries.clear();
            Ok(())
        }
    }

    #[test]
    fn final_store_uses_documented_key_layout() {
        let mut store = FinalStore::new(MemoryStore::default());
        store.set_final("CarA", "engine", "V6").unwrap();
        store.set_column("CarA", "engine", 2, "V8").unwrap();

        assert_eq!(store.inner().get("finalData_CarA_engine"), Some("V6"));
        assert_eq!(store.inner().get("colData_CarA_engine_2"), Some("V8"));
        assert_eq!(store.final_value("CarA", "engine"), Some("V6"));
        assert_eq!(store.column_value("CarA", "engine", 2), Some("V8"));

        store.clear_final("CarA", "engine").unwrap();
        assert_eq!(store.final_value("CarA", "engine"), None);
    }

    #[test]
    fn json_store_persists_across_reopens() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("store.json");

        let mut store = JsonFileStore::open(&path).unwrap();
        store.set("finalData_CarA_engine", "V6").unwrap();
        drop(store);

        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(reopened.get("finalData_CarA_engine"), Some("V6"));
        assert!(reopened.updated_at("finalData_CarA_engine").is_some());
    }

    #[test]
    fn open_store_clears_entries_from_another_load() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("store.json");

        let mut store = open_store(&path, "load-a").unwrap();
        store.set_final("CarA", "engine", "V6").unwrap();
        drop(store);

        // Same load: values survive.
        let store = open_store(&path, "load-a").unwrap();
        assert_eq!(store.final_value("CarA", "engine"), Some("V6"));
        drop(store);

        // Different load: wiped.
        let store = open_store(&path, "load-b").unwrap();
        assert_eq!(store.final_value("CarA", "engine"), None);
    }

    #[test]
    fn load_fingerprint_tracks_content_changes() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("a.csv");
        fs::write(&path, "Feature,CarA\nengine,V6\n").unwrap();
        let first = load_fingerprint(std::slice::from_ref(&path)).unwrap();

        fs::write(&path, "Feature,CarA\nengine,V8\n").unwrap();
        let second = load_fingerprint(std::slice::from_ref(&path)).unwrap();
        assert_ne!(first, second);
    }
}

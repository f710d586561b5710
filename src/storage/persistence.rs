//! Snapshot file for the in-memory document store.

use crate::core::{AppError, AppResult};
use crate::storage::document::Document;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Every collection's documents, keyed by collection name.
pub type StoreSnapshot = BTreeMap<String, Vec<Document>>;

pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Writes the snapshot to a sibling temp file, then renames it into place.
    pub fn save(&self, snapshot: &StoreSnapshot) -> AppResult<()> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)?;

        // Documents travel as JSON values so ids and timestamps keep their text form.
        let encoded: BTreeMap<&str, Vec<Value>> = snapshot
            .iter()
            .map(|(name, docs)| (name.as_str(), docs.iter().map(Document::to_json).collect()))
            .collect();
        let bytes = rmp_serde::to_vec_named(&encoded)?;

        let mut temp = NamedTempFile::new_in(&parent)?;
        temp.write_all(&bytes)?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path)
            .map_err(|err| AppError::storage(format!("failed to replace snapshot: {err}")))?;
        Ok(())
    }

    pub fn load(&self) -> AppResult<Option<StoreSnapshot>> {
        if !self.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&self.path)?;
        let encoded: BTreeMap<String, Vec<Value>> = rmp_serde::from_slice(&bytes)?;

        let mut snapshot = StoreSnapshot::new();
        for (name, values) in encoded {
            let docs = values
                .into_iter()
                .map(serde_json::from_value::<Document>)
                .collect::<Result<Vec<_>, _>>()
                .map_err(|err| {
                    AppError::storage(format!("corrupt document in collection '{name}': {err}"))
                })?;
            snapshot.insert(name, docs);
        }
        Ok(Some(snapshot))
    }

    pub fn delete(&self) -> AppResult<()> {
        if self.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DocId;
    use chrono::Utc;
    use serde_json::{Map, json};
    use tempfile::TempDir;

    #[test]
    fn save_and_load_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let file = SnapshotFile::new(temp_dir.path().join("nested").join("store.snapshot"));
        assert!(file.load().unwrap().is_none());

        let now = Utc::now();
        let mut fields = Map::new();
        fields.insert("username".to_string(), json!("alice"));
        fields.insert("tags".to_string(), json!(["a", { "b": 1 }]));
        let doc = Document {
            id: DocId::new(),
            date_created: now,
            date_updated: now,
            fields,
        };

        let mut snapshot = StoreSnapshot::new();
        snapshot.insert("users".to_string(), vec![doc.clone()]);
        file.save(&snapshot).unwrap();
        assert!(file.exists());

        let loaded = file.load().unwrap().unwrap();
        assert_eq!(loaded["users"], vec![doc]);

        file.delete().unwrap();
        assert!(!file.exists());
    }

    #[test]
    fn garbage_is_a_storage_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.snapshot");
        fs::write(&path, b"\xc1\xc1 not messagepack").unwrap();

        let err = SnapshotFile::new(&path).load().unwrap_err();
        assert!(matches!(err, AppError::Storage(_)), "{err:?}");
    }
}

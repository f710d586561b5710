use crate::core::AppResult;
use crate::storage::document::Document;
use crate::storage::filter::Filter;
use crate::storage::persistence::{SnapshotFile, StoreSnapshot};
use crate::storage::store::DocumentStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

type Partition = Arc<RwLock<Vec<Document>>>;

/// Document store kept in process memory.
///
/// Each collection has its own lock; the partition map is only locked to
/// look up or create a partition. Optionally backed by a snapshot file that is
/// read on `open` and rewritten on `flush`.
#[derive(Default)]
pub struct MemoryStore {
    partitions: RwLock<HashMap<String, Partition>>,
    snapshot: Option<SnapshotFile>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a store over a snapshot file, loading it when it exists.
    pub fn open<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let snapshot = SnapshotFile::new(path);
        let mut partitions = HashMap::new();
        if let Some(loaded) = snapshot.load()? {
            for (name, docs) in loaded {
                debug!(collection = %name, documents = docs.len(), "restored collection");
                partitions.insert(name, Arc::new(RwLock::new(docs)));
            }
            info!(path = %snapshot.path().display(), collections = partitions.len(), "snapshot loaded");
        }

        Ok(Self {
            partitions: RwLock::new(partitions),
            snapshot: Some(snapshot),
        })
    }

    /// Writes every collection to the snapshot file. No-op without one.
    pub async fn flush(&self) -> AppResult<()> {
        let Some(file) = &self.snapshot else {
            return Ok(());
        };

        let handles: Vec<(String, Partition)> = self
            .partitions
            .read()
            .await
            .iter()
            .map(|(name, partition)| (name.clone(), Arc::clone(partition)))
            .collect();

        let mut snapshot = StoreSnapshot::new();
        for (name, partition) in handles {
            snapshot.insert(name, partition.read().await.clone());
        }
        file.save(&snapshot)?;
        info!(path = %file.path().display(), collections = snapshot.len(), "snapshot written");
        Ok(())
    }

    async fn partition(&self, name: &str) -> Partition {
        if let Some(partition) = self.partitions.read().await.get(name) {
            return Arc::clone(partition);
        }
        let mut partitions = self.partitions.write().await;
        Arc::clone(partitions.entry(name.to_string()).or_default())
    }
}

/// Indices of matching documents, in filter order.
fn ordered_matches(docs: &[Document], filter: &Filter) -> Vec<usize> {
    let mut indices: Vec<usize> = docs
        .iter()
        .enumerate()
        .filter(|(_, doc)| filter.matches(doc))
        .map(|(index, _)| index)
        .collect();
    if filter.sort().is_some() {
        indices.sort_by(|a, b| filter.compare(&docs[*a], &docs[*b]));
    }
    indices
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert(&self, collection: &str, document: Document) -> AppResult<()> {
        let partition = self.partition(collection).await;
        partition.write().await.push(document);
        Ok(())
    }

    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        limit: Option<usize>,
    ) -> AppResult<Vec<Document>> {
        let partition = self.partition(collection).await;
        let docs = partition.read().await;
        let found = ordered_matches(&docs, filter)
            .into_iter()
            .take(limit.unwrap_or(usize::MAX))
            .map(|index| docs[index].clone())
            .collect();
        Ok(found)
    }

    async fn update_first(
        &self,
        collection: &str,
        filter: &Filter,
        mutate: &mut (dyn for<'d> FnMut(&'d mut Document) -> AppResult<()> + Send),
    ) -> AppResult<Option<Document>> {
        let partition = self.partition(collection).await;
        let mut docs = partition.write().await;
        let Some(index) = ordered_matches(&docs, filter).into_iter().next() else {
            return Ok(None);
        };

        let mut candidate = docs[index].clone();
        mutate(&mut candidate)?;
        docs[index] = candidate.clone();
        Ok(Some(candidate))
    }

    async fn delete(
        &self,
        collection: &str,
        filter: &Filter,
        limit: Option<usize>,
    ) -> AppResult<usize> {
        let partition = self.partition(collection).await;
        let mut docs = partition.write().await;
        let mut doomed: Vec<usize> = ordered_matches(&docs, filter)
            .into_iter()
            .take(limit.unwrap_or(usize::MAX))
            .collect();
        doomed.sort_unstable_by(|a, b| b.cmp(a));
        for index in &doomed {
            docs.remove(*index);
        }
        Ok(doomed.len())
    }

    async fn count(&self, collection: &str, filter: &Filter) -> AppResult<usize> {
        let partition = self.partition(collection).await;
        let docs = partition.read().await;
        Ok(docs.iter().filter(|doc| filter.matches(doc)).count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{AppError, DocId};
    use crate::storage::filter::SortOrder;
    use chrono::Utc;
    use serde_json::{Map, Value, json};
    use tempfile::TempDir;

    fn doc(n: i64) -> Document {
        let now = Utc::now();
        let mut fields = Map::new();
        fields.insert("n".to_string(), json!(n));
        fields.insert("parity".to_string(), json!(if n % 2 == 0 { "even" } else { "odd" }));
        Document {
            id: DocId::new(),
            date_created: now,
            date_updated: now,
            fields,
        }
    }

    #[tokio::test]
    async fn partitions_are_isolated() {
        let store = MemoryStore::new();
        store.insert("a", doc(1)).await.unwrap();
        store.insert("b", doc(2)).await.unwrap();

        assert_eq!(store.count("a", &Filter::all()).await.unwrap(), 1);
        assert_eq!(store.count("c", &Filter::all()).await.unwrap(), 0);
        assert_eq!(store.count("b", &Filter::all().eq("n", 1)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn find_respects_sort_and_limit() {
        let store = MemoryStore::new();
        for n in [3, 1, 2] {
            store.insert("nums", doc(n)).await.unwrap();
        }

        let unsorted = store.find("nums", &Filter::all(), None).await.unwrap();
        let order: Vec<_> = unsorted.iter().map(|d| d.fields["n"].clone()).collect();
        assert_eq!(order, vec![json!(3), json!(1), json!(2)]);

        let sorted = Filter::all().sort_by("n", SortOrder::Descending);
        let top = store.find("nums", &sorted, Some(2)).await.unwrap();
        let order: Vec<_> = top.iter().map(|d| d.fields["n"].clone()).collect();
        assert_eq!(order, vec![json!(3), json!(2)]);
    }

    #[tokio::test]
    async fn failed_mutation_leaves_document_untouched() {
        let store = MemoryStore::new();
        let original = doc(1);
        store.insert("nums", original.clone()).await.unwrap();

        let mut mutate = |d: &mut Document| -> AppResult<()> {
            d.fields.insert("n".to_string(), json!(99));
            Err(AppError::bad_request("nope"))
        };
        let err = store
            .update_first("nums", &Filter::all(), &mut mutate)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let stored = store.find("nums", &Filter::all(), None).await.unwrap();
        assert_eq!(stored, vec![original]);
    }

    #[tokio::test]
    async fn one_mutator_serves_repeated_updates() {
        let store = MemoryStore::new();
        store.insert("nums", doc(1)).await.unwrap();

        let mut bump = |d: &mut Document| -> AppResult<()> {
            let n = d.fields["n"].as_i64().unwrap_or_default();
            d.fields.insert("n".to_string(), json!(n + 1));
            Ok(())
        };
        for _ in 0..3 {
            store
                .update_first("nums", &Filter::all(), &mut bump)
                .await
                .unwrap();
        }

        let updated = store
            .update_first("nums", &Filter::all(), &mut bump)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.fields["n"], json!(5));
    }

    #[tokio::test]
    async fn delete_honours_limit() {
        let store = MemoryStore::new();
        for n in 0..6 {
            store.insert("nums", doc(n)).await.unwrap();
        }
        let evens = Filter::all().eq("parity", "even");
        assert_eq!(store.delete("nums", &evens, Some(1)).await.unwrap(), 1);
        assert_eq!(store.delete("nums", &evens, None).await.unwrap(), 2);
        assert_eq!(store.delete("nums", &evens, None).await.unwrap(), 0);
        assert_eq!(store.count("nums", &Filter::all()).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn flush_and_reopen_restores_documents() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("store.snapshot");

        let store = MemoryStore::open(&path).unwrap();
        let first = doc(7);
        store.insert("nums", first.clone()).await.unwrap();
        store.flush().await.unwrap();

        let reopened = MemoryStore::open(&path).unwrap();
        let found = reopened.find("nums", &Filter::id(first.id), None).await.unwrap();
        assert_eq!(found, vec![first]);
        assert_eq!(found[0].fields.get("n"), Some(&Value::from(7)));
    }
}

//! Typed collection over a `DocumentStore` partition.
//!
//! `DocCollection<T>` owns identity and lifecycle bookkeeping for every
//! concept: ids are generated here, `dateCreated` is stamped once and
//! `dateUpdated` advances on every mutation. Payload types only describe
//! their own fields.

use crate::core::clock::next_timestamp;
use crate::core::{AppError, AppResult, DocId};
use crate::storage::document::{Document, is_reserved_field};
use crate::storage::filter::Filter;
use crate::storage::store::DocumentStore;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// A stored document with its payload decoded as `T`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Doc<T> {
    #[serde(rename = "_id")]
    pub id: DocId,
    #[serde(rename = "dateCreated")]
    pub date_created: DateTime<Utc>,
    #[serde(rename = "dateUpdated")]
    pub date_updated: DateTime<Utc>,
    #[serde(flatten)]
    pub body: T,
}

impl<T: DeserializeOwned> Doc<T> {
    fn decode(collection: &str, document: Document) -> AppResult<Self> {
        let body = serde_json::from_value(Value::Object(document.fields)).map_err(|err| {
            AppError::storage(format!(
                "document {} in '{collection}' does not match its schema: {err}",
                document.id
            ))
        })?;
        Ok(Self {
            id: document.id,
            date_created: document.date_created,
            date_updated: document.date_updated,
            body,
        })
    }
}

pub struct DocCollection<T> {
    name: String,
    store: Arc<dyn DocumentStore>,
    _payload: PhantomData<fn() -> T>,
}

impl<T> Clone for DocCollection<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            store: Arc::clone(&self.store),
            _payload: PhantomData,
        }
    }
}

impl<T> fmt::Debug for DocCollection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocCollection")
            .field("name", &self.name)
            .finish()
    }
}

impl<T> DocCollection<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            name: name.into(),
            store,
            _payload: PhantomData,
        }
    }

    /// Stores `payload` under a fresh id and returns that id.
    pub async fn create_one(&self, payload: &T) -> AppResult<DocId> {
        let mut fields = self.encode(payload)?;
        fields.retain(|key, _| !is_reserved_field(key));

        let now = next_timestamp(None);
        let document = Document {
            id: DocId::new(),
            date_created: now,
            date_updated: now,
            fields,
        };
        let id = document.id;
        self.store.insert(&self.name, document).await?;
        Ok(id)
    }

    /// First match, or `None`. Absence is for the caller to judge.
    pub async fn read_one(&self, filter: &Filter) -> AppResult<Option<Doc<T>>> {
        let mut found = self.store.find(&self.name, filter, Some(1)).await?;
        match found.pop() {
            Some(document) => Doc::decode(&self.name, document).map(Some),
            None => Ok(None),
        }
    }

    pub async fn read_many(&self, filter: &Filter) -> AppResult<Vec<Doc<T>>> {
        self.store
            .find(&self.name, filter, None)
            .await?
            .into_iter()
            .map(|document| Doc::decode(&self.name, document))
            .collect()
    }

    /// Overwrites the given top-level fields of the first match.
    ///
    /// Reserved fields in `partial` are ignored. The merged payload must still
    /// decode as `T`, otherwise the update is rejected with `BadRequest` and
    /// the stored document is left as it was.
    pub async fn update_one(&self, filter: &Filter, partial: Map<String, Value>) -> AppResult<Doc<T>> {
        let name = self.name.clone();
        let mut apply = |document: &mut Document| -> AppResult<()> {
            let mut merged = document.fields.clone();
            for (key, value) in &partial {
                if !is_reserved_field(key) {
                    merged.insert(key.clone(), value.clone());
                }
            }
            serde_json::from_value::<T>(Value::Object(merged.clone())).map_err(|err| {
                AppError::bad_request(format!("Invalid update for {name}: {err}"))
            })?;
            document.fields = merged;
            document.date_updated = next_timestamp(Some(document.date_updated));
            Ok(())
        };
        self.finish_update(self.store.update_first(&self.name, filter, &mut apply).await?)
    }

    /// Atomic read-modify-write of the first match's payload.
    pub async fn update_one_with<F>(&self, filter: &Filter, edit: F) -> AppResult<Doc<T>>
    where
        F: FnOnce(&mut T) -> AppResult<()> + Send,
    {
        let name = self.name.clone();
        let mut edit = Some(edit);
        let mut apply = |document: &mut Document| -> AppResult<()> {
            let edit = edit
                .take()
                .ok_or_else(|| AppError::internal("update closure invoked twice"))?;
            let mut body: T = serde_json::from_value(Value::Object(document.fields.clone()))
                .map_err(|err| {
                    AppError::storage(format!("document in '{name}' does not match its schema: {err}"))
                })?;
            edit(&mut body)?;
            let mut fields = match serde_json::to_value(&body) {
                Ok(Value::Object(fields)) => fields,
                Ok(_) => {
                    return Err(AppError::internal(format!(
                        "payload for '{name}' must serialize to an object"
                    )));
                }
                Err(err) => return Err(AppError::internal(err.to_string())),
            };
            fields.retain(|key, _| !is_reserved_field(key));
            document.fields = fields;
            document.date_updated = next_timestamp(Some(document.date_updated));
            Ok(())
        };
        self.finish_update(self.store.update_first(&self.name, filter, &mut apply).await?)
    }

    pub async fn delete_one(&self, filter: &Filter) -> AppResult<usize> {
        self.store.delete(&self.name, filter, Some(1)).await
    }

    pub async fn delete_many(&self, filter: &Filter) -> AppResult<usize> {
        self.store.delete(&self.name, filter, None).await
    }

    pub async fn count(&self, filter: &Filter) -> AppResult<usize> {
        self.store.count(&self.name, filter).await
    }

    fn finish_update(&self, updated: Option<Document>) -> AppResult<Doc<T>> {
        match updated {
            Some(document) => Doc::decode(&self.name, document),
            None => Err(AppError::not_found(format!(
                "No matching document in {}",
                self.name
            ))),
        }
    }

    fn encode(&self, payload: &T) -> AppResult<Map<String, Value>> {
        match serde_json::to_value(payload) {
            Ok(Value::Object(fields)) => Ok(fields),
            Ok(_) => Err(AppError::internal(format!(
                "payload for '{}' must serialize to an object",
                self.name
            ))),
            Err(err) => Err(AppError::internal(err.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStore;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        title: String,
        votes: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tag: Option<String>,
    }

    fn notes() -> DocCollection<Note> {
        DocCollection::new("notes", Arc::new(MemoryStore::new()))
    }

    fn note(title: &str) -> Note {
        Note {
            title: title.to_string(),
            votes: 0,
            tag: None,
        }
    }

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[tokio::test]
    async fn create_assigns_identity_and_stamps() {
        let notes = notes();
        let id = notes.create_one(&note("a")).await.unwrap();

        let stored = notes.read_one(&Filter::id(id)).await.unwrap().unwrap();
        assert_eq!(stored.id, id);
        assert_eq!(stored.body, note("a"));
        assert_eq!(stored.date_created, stored.date_updated);
    }

    #[tokio::test]
    async fn read_one_reports_absence_without_error() {
        let notes = notes();
        assert!(notes.read_one(&Filter::id(DocId::new())).await.unwrap().is_none());
        assert!(notes.read_many(&Filter::all().eq("title", "x")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_on_no_match_is_not_found() {
        let notes = notes();
        notes.create_one(&note("a")).await.unwrap();

        let err = notes
            .update_one(&Filter::id(DocId::new()), object(json!({ "title": "b" })))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)), "{err:?}");
    }

    #[tokio::test]
    async fn update_touches_only_the_matching_document() {
        let notes = notes();
        let a = notes.create_one(&note("a")).await.unwrap();
        let b = notes.create_one(&note("b")).await.unwrap();
        let before = notes.read_one(&Filter::id(a)).await.unwrap().unwrap();
        let untouched = notes.read_one(&Filter::id(b)).await.unwrap().unwrap();

        let updated = notes
            .update_one(&Filter::id(a), object(json!({ "tag": "x", "_id": "ignored" })))
            .await
            .unwrap();

        assert_eq!(updated.id, a);
        assert_eq!(updated.body.title, "a");
        assert_eq!(updated.body.tag.as_deref(), Some("x"));
        assert_eq!(updated.date_created, before.date_created);
        assert!(updated.date_updated > before.date_updated);
        assert_eq!(notes.read_one(&Filter::id(b)).await.unwrap().unwrap(), untouched);
    }

    #[tokio::test]
    async fn update_that_breaks_schema_is_rejected() {
        let notes = notes();
        let id = notes.create_one(&note("a")).await.unwrap();
        let before = notes.read_one(&Filter::id(id)).await.unwrap().unwrap();

        let err = notes
            .update_one(&Filter::id(id), object(json!({ "votes": "many" })))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)), "{err:?}");
        assert_eq!(notes.read_one(&Filter::id(id)).await.unwrap().unwrap(), before);
    }

    #[tokio::test]
    async fn update_with_is_a_read_modify_write() {
        let notes = notes();
        let id = notes.create_one(&note("a")).await.unwrap();

        for _ in 0..3 {
            notes
                .update_one_with(&Filter::id(id), |n| {
                    n.votes += 1;
                    Ok(())
                })
                .await
                .unwrap();
        }
        let stored = notes.read_one(&Filter::id(id)).await.unwrap().unwrap();
        assert_eq!(stored.body.votes, 3);

        let err = notes
            .update_one_with(&Filter::id(id), |_| Err(AppError::conflict("no")))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(notes.read_one(&Filter::id(id)).await.unwrap().unwrap(), stored);
    }

    #[tokio::test]
    async fn concurrent_read_modify_writes_are_not_lost() {
        let notes = notes();
        let id = notes.create_one(&note("a")).await.unwrap();

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let notes = notes.clone();
                tokio::spawn(async move {
                    notes
                        .update_one_with(&Filter::id(id), |n| {
                            n.votes += 1;
                            Ok(())
                        })
                        .await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let stored = notes.read_one(&Filter::id(id)).await.unwrap().unwrap();
        assert_eq!(stored.body.votes, 16);
    }

    #[tokio::test]
    async fn deletes_report_counts() {
        let notes = notes();
        for title in ["a", "a", "b"] {
            notes.create_one(&note(title)).await.unwrap();
        }
        let same_title = Filter::all().eq("title", "a");
        assert_eq!(notes.delete_one(&same_title).await.unwrap(), 1);
        assert_eq!(notes.count(&Filter::all()).await.unwrap(), 2);
        assert_eq!(notes.delete_many(&Filter::all()).await.unwrap(), 2);
        assert_eq!(notes.delete_many(&Filter::all()).await.unwrap(), 0);
    }

    #[test]
    fn doc_serializes_flat() {
        let now = Utc::now();
        let doc = Doc {
            id: DocId::new(),
            date_created: now,
            date_updated: now,
            body: note("flat"),
        };
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["title"], json!("flat"));
        assert_eq!(value["_id"], json!(doc.id.to_string()));
        assert!(value.get("body").is_none());
    }
}

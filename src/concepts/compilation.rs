//! Ordered lists of content ids.
//!
//! A compilation is addressed by (owner, kind, name). Personal compilations
//! are owned by a user; headline and recents compilations are owned by a
//! group and carry the group's name.

use crate::core::{AppError, AppResult, DocId};
use crate::storage::{Doc, DocCollection, DocumentStore, Filter};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompilationKind {
    Personal,
    Headline,
    Recents,
}

impl CompilationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Personal => "personal",
            Self::Headline => "headline",
            Self::Recents => "recents",
        }
    }
}

impl fmt::Display for CompilationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompilationRecord {
    pub owner: DocId,
    pub kind: CompilationKind,
    pub name: String,
    #[serde(default)]
    pub items: Vec<DocId>,
}

pub type CompilationDoc = Doc<CompilationRecord>;

/// Identifies one compilation.
#[derive(Debug, Clone, Copy)]
pub struct CompilationKey<'a> {
    pub owner: DocId,
    pub kind: CompilationKind,
    pub name: &'a str,
}

impl CompilationKey<'_> {
    fn filter(&self) -> Filter {
        Filter::all()
            .eq("owner", self.owner)
            .eq("kind", self.kind.as_str())
            .eq("name", self.name)
    }

    fn missing(&self) -> AppError {
        AppError::not_found(format!("{} compilation {} does not exist!", self.kind, self.name))
    }
}

pub struct CompilationConcept {
    compilations: DocCollection<CompilationRecord>,
}

impl CompilationConcept {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            compilations: DocCollection::new("compilations", store),
        }
    }

    pub async fn create(&self, key: CompilationKey<'_>) -> AppResult<CompilationDoc> {
        if key.name.is_empty() {
            return Err(AppError::bad_request("Compilation name must be non-empty!"));
        }
        if self.compilations.count(&key.filter()).await? > 0 {
            return Err(AppError::conflict(format!(
                "{} compilation {} already exists!",
                key.kind, key.name
            )));
        }
        self.compilations
            .create_one(&CompilationRecord {
                owner: key.owner,
                kind: key.kind,
                name: key.name.to_string(),
                items: Vec::new(),
            })
            .await?;
        self.get(key).await
    }

    pub async fn get(&self, key: CompilationKey<'_>) -> AppResult<CompilationDoc> {
        self.compilations
            .read_one(&key.filter())
            .await?
            .ok_or_else(|| key.missing())
    }

    /// Deletes compilation `id`, which must belong to `owner`.
    pub async fn delete_by_id(&self, id: DocId, owner: DocId) -> AppResult<()> {
        let found = self
            .compilations
            .read_one(&Filter::id(id))
            .await?
            .ok_or_else(|| AppError::not_found(format!("Compilation {id} does not exist!")))?;
        if found.body.owner != owner {
            return Err(AppError::forbidden(format!(
                "Compilation {id} is not owned by {owner}!"
            )));
        }
        self.compilations.delete_one(&Filter::id(id)).await?;
        Ok(())
    }

    pub async fn delete(&self, key: CompilationKey<'_>) -> AppResult<()> {
        if self.compilations.delete_one(&key.filter()).await? == 0 {
            return Err(key.missing());
        }
        Ok(())
    }

    pub async fn add_item(&self, key: CompilationKey<'_>, item: DocId) -> AppResult<CompilationDoc> {
        self.edit(key, |record| {
            if record.items.contains(&item) {
                return Err(AppError::conflict(format!(
                    "{item} is already in compilation {}!",
                    record.name
                )));
            }
            record.items.push(item);
            Ok(())
        })
        .await
    }

    pub async fn remove_item(
        &self,
        key: CompilationKey<'_>,
        item: DocId,
    ) -> AppResult<CompilationDoc> {
        self.edit(key, |record| {
            let index = position_of(record, item)?;
            record.items.remove(index);
            Ok(())
        })
        .await
    }

    /// Moves `item` to `position`, clamped to the list bounds.
    pub async fn reorder(
        &self,
        key: CompilationKey<'_>,
        item: DocId,
        position: i64,
    ) -> AppResult<CompilationDoc> {
        self.edit(key, |record| {
            let index = position_of(record, item)?;
            let moved = record.items.remove(index);
            let last = record.items.len();
            let target = usize::try_from(position.max(0)).unwrap_or(usize::MAX).min(last);
            record.items.insert(target, moved);
            Ok(())
        })
        .await
    }

    async fn edit<F>(&self, key: CompilationKey<'_>, edit: F) -> AppResult<CompilationDoc>
    where
        F: FnOnce(&mut CompilationRecord) -> AppResult<()> + Send,
    {
        self.get(key).await?;
        self.compilations.update_one_with(&key.filter(), edit).await
    }
}

fn position_of(record: &CompilationRecord, item: DocId) -> AppResult<usize> {
    record
        .items
        .iter()
        .position(|existing| *existing == item)
        .ok_or_else(|| {
            AppError::not_found(format!("{item} is not in compilation {}!", record.name))
        })
}

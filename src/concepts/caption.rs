use crate::core::{AppError, AppResult, DocId};
use crate::storage::{Doc, DocCollection, DocumentStore, Filter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A named caption attached to a piece of media.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionRecord {
    pub media: DocId,
    pub name: String,
}

pub type CaptionDoc = Doc<CaptionRecord>;

pub struct CaptionConcept {
    captions: DocCollection<CaptionRecord>,
}

impl CaptionConcept {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            captions: DocCollection::new("captions", store),
        }
    }

    pub async fn create(&self, media: DocId, name: &str) -> AppResult<CaptionDoc> {
        if name.is_empty() {
            return Err(AppError::bad_request("Caption must be non-empty!"));
        }
        let id = self
            .captions
            .create_one(&CaptionRecord {
                media,
                name: name.to_string(),
            })
            .await?;
        self.get_caption_by_id(id).await
    }

    pub async fn get_caption_by_id(&self, id: DocId) -> AppResult<CaptionDoc> {
        self.captions
            .read_one(&Filter::id(id))
            .await?
            .ok_or_else(|| AppError::not_found(format!("Caption {id} does not exist!")))
    }

    pub async fn get_captions_by_media(&self, media: DocId) -> AppResult<Vec<CaptionDoc>> {
        self.captions
            .read_many(&Filter::all().eq("media", media))
            .await
    }
}

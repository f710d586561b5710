use crate::core::{AppError, AppResult, DocId};
use crate::storage::{Doc, DocCollection, DocumentStore, Filter};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoBannerRecord {
    pub item: DocId,
    #[serde(rename = "photoUrl")]
    pub photo_url: String,
}

pub type PhotoBannerDoc = Doc<PhotoBannerRecord>;

pub struct PhotoBannerConcept {
    banners: DocCollection<PhotoBannerRecord>,
}

impl PhotoBannerConcept {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            banners: DocCollection::new("photobanners", store),
        }
    }

    /// Sets the banner of `item`, replacing any earlier one.
    pub async fn set_photo(&self, item: DocId, photo_url: &str) -> AppResult<PhotoBannerDoc> {
        if photo_url.is_empty() {
            return Err(AppError::bad_request("Photo link must be non-empty!"));
        }

        let mut update = Map::new();
        update.insert("photoUrl".to_string(), Value::String(photo_url.to_string()));
        match self.banners.update_one(&by_item(item), update).await {
            Ok(updated) => Ok(updated),
            Err(AppError::NotFound(_)) => {
                self.banners
                    .create_one(&PhotoBannerRecord {
                        item,
                        photo_url: photo_url.to_string(),
                    })
                    .await?;
                self.get_item_photo_banner(item).await
            }
            Err(err) => Err(err),
        }
    }

    pub async fn get_item_photo_banner(&self, item: DocId) -> AppResult<PhotoBannerDoc> {
        self.banners
            .read_one(&by_item(item))
            .await?
            .ok_or_else(|| AppError::not_found("Photo not found!"))
    }
}

fn by_item(item: DocId) -> Filter {
    Filter::all().eq("item", item)
}

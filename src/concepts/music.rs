use crate::core::{AppError, AppResult, DocId};
use crate::storage::{Doc, DocCollection, DocumentStore, Filter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MusicRecord {
    #[serde(rename = "audioLink")]
    pub audio_link: String,
    pub artist: String,
    pub name: String,
    /// Length in seconds.
    pub duration: u32,
}

pub type MusicDoc = Doc<MusicRecord>;

pub struct MusicConcept {
    music: DocCollection<MusicRecord>,
}

impl MusicConcept {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            music: DocCollection::new("music", store),
        }
    }

    pub async fn add(
        &self,
        audio_link: &str,
        artist: &str,
        name: &str,
        duration: i64,
    ) -> AppResult<MusicDoc> {
        if audio_link.is_empty() || artist.is_empty() || name.is_empty() {
            return Err(AppError::bad_request(
                "Audio link, artist and name must be non-empty!",
            ));
        }
        let duration = u32::try_from(duration).map_err(|_| {
            AppError::bad_request(format!("Duration must be a non-negative number of seconds, got {duration}"))
        })?;

        let id = self
            .music
            .create_one(&MusicRecord {
                audio_link: audio_link.to_string(),
                artist: artist.to_string(),
                name: name.to_string(),
                duration,
            })
            .await?;
        self.get_by_id(id).await
    }

    pub async fn get_all(&self) -> AppResult<Vec<MusicDoc>> {
        self.music.read_many(&Filter::all()).await
    }

    pub async fn get_by_id(&self, id: DocId) -> AppResult<MusicDoc> {
        self.music
            .read_one(&Filter::id(id))
            .await?
            .ok_or_else(|| AppError::not_found(format!("Music {id} does not exist!")))
    }

    pub async fn get_by_artist(&self, artist: &str) -> AppResult<Vec<MusicDoc>> {
        self.music.read_many(&Filter::all().eq("artist", artist)).await
    }

    pub async fn get_by_name(&self, name: &str) -> AppResult<Vec<MusicDoc>> {
        self.music.read_many(&Filter::all().eq("name", name)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[tokio::test]
    async fn add_validates_and_lookups_filter() {
        let music = MusicConcept::new(Arc::new(MemoryStore::new()));
        let song = music
            .add("https://a/1.mp3", "Miles", "So What", 562)
            .await
            .unwrap();
        music.add("https://a/2.mp3", "Miles", "Blue in Green", 337).await.unwrap();
        music.add("https://a/3.mp3", "Bill", "Peace Piece", 400).await.unwrap();

        assert_eq!(music.get_by_id(song.id).await.unwrap().body.duration, 562);
        assert_eq!(music.get_by_artist("Miles").await.unwrap().len(), 2);
        assert_eq!(music.get_by_name("Peace Piece").await.unwrap().len(), 1);
        assert_eq!(music.get_all().await.unwrap().len(), 3);

        assert!(matches!(
            music.add("https://a/4.mp3", "X", "Y", -1).await,
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            music.add("", "X", "Y", 10).await,
            Err(AppError::BadRequest(_))
        ));
    }
}

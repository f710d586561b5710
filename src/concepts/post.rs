use crate::core::{AppError, AppResult, DocId};
use crate::storage::{Doc, DocCollection, DocumentStore, Filter};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PostOptions {
    #[serde(
        rename = "backgroundColor",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub background_color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PostRecord {
    pub author: DocId,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<PostOptions>,
}

pub type PostDoc = Doc<PostRecord>;

/// Fields a post's author may change.
const EDITABLE_FIELDS: [&str; 2] = ["content", "options"];

pub struct PostConcept {
    posts: DocCollection<PostRecord>,
}

impl PostConcept {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            posts: DocCollection::new("posts", store),
        }
    }

    pub async fn create(
        &self,
        author: DocId,
        content: &str,
        options: Option<PostOptions>,
    ) -> AppResult<PostDoc> {
        let record = PostRecord {
            author,
            content: content.to_string(),
            options,
        };
        let id = self.posts.create_one(&record).await?;
        self.get_post(id).await
    }

    pub async fn get_post(&self, id: DocId) -> AppResult<PostDoc> {
        self.posts
            .read_one(&Filter::id(id))
            .await?
            .ok_or_else(|| AppError::not_found(format!("Post {id} does not exist!")))
    }

    /// Every post, newest first.
    pub async fn get_posts(&self) -> AppResult<Vec<PostDoc>> {
        self.posts.read_many(&newest_first(Filter::all())).await
    }

    pub async fn get_by_author(&self, author: DocId) -> AppResult<Vec<PostDoc>> {
        self.posts
            .read_many(&newest_first(Filter::all().eq("author", author)))
            .await
    }

    pub async fn update(&self, id: DocId, update: Map<String, Value>) -> AppResult<PostDoc> {
        if update.contains_key("author") {
            return Err(AppError::forbidden("Cannot update 'author' field!"));
        }
        if let Some(field) = update
            .keys()
            .find(|key| !EDITABLE_FIELDS.contains(&key.as_str()))
        {
            return Err(AppError::bad_request(format!("Cannot update '{field}' field!")));
        }
        self.posts.update_one(&Filter::id(id), update).await
    }

    pub async fn delete(&self, id: DocId) -> AppResult<()> {
        self.posts.delete_one(&Filter::id(id)).await?;
        Ok(())
    }

    /// Succeeds only when `user` wrote post `id`.
    pub async fn is_author(&self, user: DocId, id: DocId) -> AppResult<()> {
        let post = self.get_post(id).await?;
        if post.body.author != user {
            return Err(AppError::forbidden(format!(
                "{user} is not the author of post {id}!"
            )));
        }
        Ok(())
    }
}

fn newest_first(filter: Filter) -> Filter {
    filter.sort_by("dateUpdated", crate::storage::SortOrder::Descending)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use serde_json::json;

    fn posts() -> PostConcept {
        PostConcept::new(Arc::new(MemoryStore::new()))
    }

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[tokio::test]
    async fn update_is_limited_to_editable_fields() {
        let posts = posts();
        let author = DocId::new();
        let post = posts.create(author, "first", None).await.unwrap();

        let err = posts
            .update(post.id, object(json!({ "author": DocId::new().to_string() })))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let err = posts
            .update(post.id, object(json!({ "likes": 3 })))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let updated = posts
            .update(
                post.id,
                object(json!({ "content": "edited", "options": { "backgroundColor": "red" } })),
            )
            .await
            .unwrap();
        assert_eq!(updated.body.content, "edited");
        assert_eq!(
            updated.body.options.unwrap().background_color.as_deref(),
            Some("red")
        );
        assert_eq!(updated.body.author, author);
    }

    #[tokio::test]
    async fn is_author_distinguishes_missing_and_foreign() {
        let posts = posts();
        let author = DocId::new();
        let post = posts.create(author, "x", None).await.unwrap();

        posts.is_author(author, post.id).await.unwrap();
        assert!(matches!(
            posts.is_author(DocId::new(), post.id).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            posts.is_author(author, DocId::new()).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn lists_newest_first_and_by_author() {
        let posts = posts();
        let a = DocId::new();
        let b = DocId::new();
        posts.create(a, "one", None).await.unwrap();
        posts.create(b, "two", None).await.unwrap();
        posts.create(a, "three", None).await.unwrap();

        let all: Vec<_> = posts
            .get_posts()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.body.content)
            .collect();
        assert_eq!(all, vec!["three", "two", "one"]);
        assert_eq!(posts.get_by_author(a).await.unwrap().len(), 2);
    }
}

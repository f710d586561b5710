use crate::core::{AppError, AppResult, DocId};
use crate::storage::{Doc, DocCollection, DocumentStore, Filter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Running vote tally of one post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub post: DocId,
    #[serde(rename = "voteCount")]
    pub vote_count: i64,
}

pub type VoteDoc = Doc<VoteRecord>;

pub struct VoteConcept {
    vote_counts: DocCollection<VoteRecord>,
}

impl VoteConcept {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            vote_counts: DocCollection::new("voteCounts", store),
        }
    }

    pub async fn initialize_post_votes(&self, post: DocId) -> AppResult<VoteDoc> {
        if self.vote_counts.count(&by_post(post)).await? > 0 {
            return Err(AppError::conflict(format!("Votes for post {post} already exist!")));
        }
        self.vote_counts
            .create_one(&VoteRecord {
                post,
                vote_count: 0,
            })
            .await?;
        self.get_post_rating(post).await
    }

    pub async fn get_post_rating(&self, post: DocId) -> AppResult<VoteDoc> {
        self.vote_counts
            .read_one(&by_post(post))
            .await?
            .ok_or_else(not_found)
    }

    pub async fn upvote_post(&self, post: DocId) -> AppResult<VoteDoc> {
        self.shift(post, 1).await
    }

    pub async fn downvote_post(&self, post: DocId) -> AppResult<VoteDoc> {
        self.shift(post, -1).await
    }

    pub async fn delete_post_votes(&self, post: DocId) -> AppResult<()> {
        self.vote_counts.delete_many(&by_post(post)).await?;
        Ok(())
    }

    async fn shift(&self, post: DocId, delta: i64) -> AppResult<VoteDoc> {
        self.vote_counts
            .update_one_with(&by_post(post), |tally| {
                tally.vote_count += delta;
                Ok(())
            })
            .await
            .map_err(|err| match err {
                AppError::NotFound(_) => not_found(),
                other => other,
            })
    }
}

fn by_post(post: DocId) -> Filter {
    Filter::all().eq("post", post)
}

fn not_found() -> AppError {
    AppError::not_found("Post not found!")
}

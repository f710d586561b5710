//! Response shaping: user ids in outgoing documents become usernames.

use crate::concepts::UserConcept;
use crate::concepts::friend::FriendRequestDoc;
use crate::concepts::post::PostDoc;
use crate::core::{AppError, AppResult, DocId};
use serde::Serialize;
use serde_json::Value;

fn to_json<T: Serialize>(value: &T) -> AppResult<Value> {
    serde_json::to_value(value).map_err(|err| AppError::internal(err.to_string()))
}

/// Serializes `docs`, replacing each id field in `fields` by a username.
async fn with_usernames<T: Serialize>(
    users: &UserConcept,
    docs: &[T],
    fields: &[&str],
    ids_of: impl Fn(&T) -> Vec<DocId>,
) -> AppResult<Vec<Value>> {
    let ids: Vec<DocId> = docs.iter().flat_map(&ids_of).collect();
    let mut names = users.ids_to_usernames(&ids).await?.into_iter();

    let mut out = Vec::with_capacity(docs.len());
    for doc in docs {
        let mut value = to_json(doc)?;
        for field in fields {
            let name = names.next().unwrap_or_default();
            if let Some(slot) = value.get_mut(*field) {
                *slot = Value::String(name);
            }
        }
        out.push(value);
    }
    Ok(out)
}

pub async fn post(users: &UserConcept, post: &PostDoc) -> AppResult<Value> {
    let mut shaped = with_usernames(users, std::slice::from_ref(post), &["author"], |post| {
        vec![post.body.author]
    })
    .await?;
    Ok(shaped.pop().unwrap_or(Value::Null))
}

pub async fn posts(users: &UserConcept, posts: &[PostDoc]) -> AppResult<Value> {
    let shaped = with_usernames(users, posts, &["author"], |post| vec![post.body.author]).await?;
    Ok(Value::Array(shaped))
}

pub async fn friend_requests(users: &UserConcept, requests: &[FriendRequestDoc]) -> AppResult<Value> {
    let shaped = with_usernames(users, requests, &["from", "to"], |request| {
        vec![request.body.from, request.body.to]
    })
    .await?;
    Ok(Value::Array(shaped))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concepts::{FriendConcept, PostConcept};
    use crate::storage::{DocumentStore, MemoryStore};
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn posts_show_author_names() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let users = UserConcept::new(Arc::clone(&store), 4);
        let posts_concept = PostConcept::new(store);
        let alice = users.create("alice", "pw").await.unwrap();

        let created = posts_concept.create(alice.id, "hello", None).await.unwrap();
        let shaped = post(&users, &created).await.unwrap();
        assert_eq!(shaped["author"], json!("alice"));
        assert_eq!(shaped["content"], json!("hello"));
        assert_eq!(shaped["_id"], json!(created.id.to_string()));
    }

    #[tokio::test]
    async fn friend_requests_show_both_names() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let users = UserConcept::new(Arc::clone(&store), 4);
        let friends = FriendConcept::new(store);
        let a = users.create("a", "pw").await.unwrap();
        let b = users.create("b", "pw").await.unwrap();
        friends.send_request(a.id, b.id).await.unwrap();

        let shaped = friend_requests(&users, &friends.get_requests(a.id).await.unwrap())
            .await
            .unwrap();
        assert_eq!(shaped[0]["from"], json!("a"));
        assert_eq!(shaped[0]["to"], json!("b"));
        assert_eq!(shaped[0]["status"], json!("pending"));
    }
}

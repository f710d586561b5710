use crate::core::{AppError, AppResult, DocId};
use crate::storage::{Doc, DocCollection, DocumentStore, Filter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FriendshipRecord {
    pub user1: DocId,
    pub user2: DocId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Rejected,
}

impl RequestStatus {
    fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FriendRequestRecord {
    pub from: DocId,
    pub to: DocId,
    pub status: RequestStatus,
}

pub type FriendRequestDoc = Doc<FriendRequestRecord>;

pub struct FriendConcept {
    friends: DocCollection<FriendshipRecord>,
    requests: DocCollection<FriendRequestRecord>,
}

impl FriendConcept {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            friends: DocCollection::new("friends", Arc::clone(&store)),
            requests: DocCollection::new("friendRequests", store),
        }
    }

    /// Ids of everyone `user` is friends with.
    pub async fn get_friends(&self, user: DocId) -> AppResult<Vec<DocId>> {
        let friendships = self.friends.read_many(&involving(user, "user1", "user2")).await?;
        Ok(friendships
            .into_iter()
            .map(|doc| {
                if doc.body.user1 == user {
                    doc.body.user2
                } else {
                    doc.body.user1
                }
            })
            .collect())
    }

    /// Requests sent or received by `user`, in any status.
    pub async fn get_requests(&self, user: DocId) -> AppResult<Vec<FriendRequestDoc>> {
        self.requests.read_many(&involving(user, "from", "to")).await
    }

    pub async fn send_request(&self, from: DocId, to: DocId) -> AppResult<FriendRequestDoc> {
        if from == to {
            return Err(AppError::bad_request("Cannot send a friend request to yourself!"));
        }
        self.ensure_not_friends(from, to).await?;
        self.ensure_no_pending(from, to).await?;

        let id = self
            .requests
            .create_one(&FriendRequestRecord {
                from,
                to,
                status: RequestStatus::Pending,
            })
            .await?;
        self.requests
            .read_one(&Filter::id(id))
            .await?
            .ok_or_else(|| AppError::internal("friend request vanished after insert"))
    }

    pub async fn remove_request(&self, from: DocId, to: DocId) -> AppResult<()> {
        let removed = self.requests.delete_one(&pending(from, to)).await?;
        if removed == 0 {
            return Err(no_pending(from, to));
        }
        Ok(())
    }

    pub async fn accept_request(&self, from: DocId, to: DocId) -> AppResult<()> {
        self.settle(from, to, RequestStatus::Accepted).await?;
        // A crossed request in the other direction is now moot.
        self.requests.delete_many(&pending(to, from)).await?;
        self.friends
            .create_one(&FriendshipRecord {
                user1: from,
                user2: to,
            })
            .await?;
        Ok(())
    }

    pub async fn reject_request(&self, from: DocId, to: DocId) -> AppResult<()> {
        self.settle(from, to, RequestStatus::Rejected).await
    }

    pub async fn remove_friend(&self, user: DocId, friend: DocId) -> AppResult<()> {
        let removed = self.friends.delete_one(&friendship(user, friend)).await?;
        if removed == 0 {
            return Err(AppError::not_found(format!(
                "Friendship between {user} and {friend} does not exist!"
            )));
        }
        Ok(())
    }

    async fn settle(&self, from: DocId, to: DocId, status: RequestStatus) -> AppResult<()> {
        self.requests
            .update_one_with(&pending(from, to), |request| {
                request.status = status;
                Ok(())
            })
            .await
            .map_err(|err| match err {
                AppError::NotFound(_) => no_pending(from, to),
                other => other,
            })?;
        Ok(())
    }

    async fn ensure_not_friends(&self, u1: DocId, u2: DocId) -> AppResult<()> {
        if self.friends.count(&friendship(u1, u2)).await? > 0 {
            return Err(AppError::conflict(format!("{u1} and {u2} are already friends!")));
        }
        Ok(())
    }

    async fn ensure_no_pending(&self, u1: DocId, u2: DocId) -> AppResult<()> {
        let either_way = Filter::all()
            .eq("status", RequestStatus::Pending.as_str())
            .any_of(vec![
                Filter::all().eq("from", u1).eq("to", u2),
                Filter::all().eq("from", u2).eq("to", u1),
            ]);
        if self.requests.count(&either_way).await? > 0 {
            return Err(AppError::conflict(format!(
                "Pending friend request between {u1} and {u2} already exists!"
            )));
        }
        Ok(())
    }
}

fn involving(user: DocId, left: &str, right: &str) -> Filter {
    Filter::all().any_of(vec![
        Filter::all().eq(left, user),
        Filter::all().eq(right, user),
    ])
}

fn friendship(u1: DocId, u2: DocId) -> Filter {
    Filter::all().any_of(vec![
        Filter::all().eq("user1", u1).eq("user2", u2),
        Filter::all().eq("user1", u2).eq("user2", u1),
    ])
}

fn pending(from: DocId, to: DocId) -> Filter {
    Filter::all()
        .eq("from", from)
        .eq("to", to)
        .eq("status", RequestStatus::Pending.as_str())
}

fn no_pending(from: DocId, to: DocId) -> AppError {
    AppError::not_found(format!("Friend request from {from} to {to} does not exist!"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn friends() -> FriendConcept {
        FriendConcept::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn request_accept_remove_cycle() {
        let friends = friends();
        let (a, b) = (DocId::new(), DocId::new());

        let request = friends.send_request(a, b).await.unwrap();
        assert_eq!(request.body.status, RequestStatus::Pending);
        assert!(matches!(friends.send_request(b, a).await, Err(AppError::Conflict(_))));

        friends.accept_request(a, b).await.unwrap();
        assert_eq!(friends.get_friends(a).await.unwrap(), vec![b]);
        assert_eq!(friends.get_friends(b).await.unwrap(), vec![a]);
        assert!(matches!(friends.send_request(b, a).await, Err(AppError::Conflict(_))));

        let requests = friends.get_requests(b).await.unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].body.status, RequestStatus::Accepted);

        friends.remove_friend(b, a).await.unwrap();
        assert!(friends.get_friends(a).await.unwrap().is_empty());
        assert!(matches!(friends.remove_friend(a, b).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn self_requests_and_missing_requests() {
        let friends = friends();
        let (a, b) = (DocId::new(), DocId::new());
        assert!(matches!(friends.send_request(a, a).await, Err(AppError::BadRequest(_))));
        assert!(matches!(friends.accept_request(a, b).await, Err(AppError::NotFound(_))));
        assert!(matches!(friends.remove_request(a, b).await, Err(AppError::NotFound(_))));

        friends.send_request(a, b).await.unwrap();
        friends.reject_request(a, b).await.unwrap();
        assert!(matches!(friends.reject_request(a, b).await, Err(AppError::NotFound(_))));
        // A rejected request does not block a new one.
        friends.send_request(a, b).await.unwrap();
        friends.remove_request(a, b).await.unwrap();
    }
}

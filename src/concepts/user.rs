use crate::core::{AppError, AppResult, DocId};
use crate::storage::{Doc, DocCollection, DocumentStore, Filter};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserRecord {
    pub username: String,
    /// bcrypt hash; never leaves this module.
    pub password: String,
}

/// A user as returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserView {
    #[serde(rename = "_id")]
    pub id: DocId,
    pub username: String,
    #[serde(rename = "dateCreated")]
    pub date_created: DateTime<Utc>,
    #[serde(rename = "dateUpdated")]
    pub date_updated: DateTime<Utc>,
}

impl From<Doc<UserRecord>> for UserView {
    fn from(doc: Doc<UserRecord>) -> Self {
        Self {
            id: doc.id,
            username: doc.body.username,
            date_created: doc.date_created,
            date_updated: doc.date_updated,
        }
    }
}

pub struct UserConcept {
    users: DocCollection<UserRecord>,
    bcrypt_cost: u32,
}

impl UserConcept {
    pub fn new(store: Arc<dyn DocumentStore>, bcrypt_cost: u32) -> Self {
        Self {
            users: DocCollection::new("users", store),
            bcrypt_cost,
        }
    }

    fn hash_password(&self, password: &str) -> AppResult<String> {
        Ok(bcrypt::hash(password, self.bcrypt_cost)?)
    }

    fn verify_password(password: &str, hash: &str) -> bool {
        bcrypt::verify(password, hash).unwrap_or(false)
    }

    pub async fn create(&self, username: &str, password: &str) -> AppResult<UserView> {
        if username.is_empty() || password.is_empty() {
            return Err(AppError::bad_request("Username and password must be non-empty!"));
        }
        self.ensure_username_free(username).await?;

        let record = UserRecord {
            username: username.to_string(),
            password: self.hash_password(password)?,
        };
        let id = self.users.create_one(&record).await?;
        self.get_user_by_id(id).await
    }

    pub async fn get_user_by_id(&self, id: DocId) -> AppResult<UserView> {
        self.users
            .read_one(&Filter::id(id))
            .await?
            .map(UserView::from)
            .ok_or_else(|| AppError::not_found(format!("User with id {id} does not exist!")))
    }

    pub async fn get_user_by_username(&self, username: &str) -> AppResult<UserView> {
        self.users
            .read_one(&Filter::all().eq("username", username))
            .await?
            .map(UserView::from)
            .ok_or_else(|| AppError::not_found(format!("User {username} does not exist!")))
    }

    /// All users, or only those whose name matches `username` exactly.
    pub async fn get_users(&self, username: Option<&str>) -> AppResult<Vec<UserView>> {
        let filter = match username {
            Some(name) => Filter::all().eq("username", name),
            None => Filter::all(),
        };
        Ok(self
            .users
            .read_many(&filter)
            .await?
            .into_iter()
            .map(UserView::from)
            .collect())
    }

    /// Usernames for `ids`, in the same order. Unknown ids render as `DELETED_USER`.
    pub async fn ids_to_usernames(&self, ids: &[DocId]) -> AppResult<Vec<String>> {
        let found = self.users.read_many(&Filter::all().is_in("_id", ids.iter().copied())).await?;
        let names: HashMap<DocId, String> = found
            .into_iter()
            .map(|doc| (doc.id, doc.body.username))
            .collect();
        Ok(ids
            .iter()
            .map(|id| names.get(id).cloned().unwrap_or_else(|| "DELETED_USER".to_string()))
            .collect())
    }

    pub async fn authenticate(&self, username: &str, password: &str) -> AppResult<UserView> {
        let invalid = || AppError::unauthorized("Username or password is incorrect.");
        let Some(doc) = self
            .users
            .read_one(&Filter::all().eq("username", username))
            .await?
        else {
            return Err(invalid());
        };
        if !Self::verify_password(password, &doc.body.password) {
            return Err(invalid());
        }
        Ok(doc.into())
    }

    /// Applies a partial update. A new password is hashed before storing.
    pub async fn update(&self, id: DocId, mut update: Map<String, Value>) -> AppResult<UserView> {
        if let Some(value) = update.get("username") {
            let Some(username) = value.as_str().filter(|name| !name.is_empty()) else {
                return Err(AppError::bad_request("Username must be a non-empty string"));
            };
            let taken = self
                .users
                .read_one(&Filter::all().eq("username", username))
                .await?
                .is_some_and(|existing| existing.id != id);
            if taken {
                return Err(AppError::conflict(format!(
                    "User with username {username} already exists!"
                )));
            }
        }
        if let Some(value) = update.get("password") {
            let Some(password) = value.as_str().filter(|pw| !pw.is_empty()) else {
                return Err(AppError::bad_request("Password must be a non-empty string"));
            };
            let hashed = self.hash_password(password)?;
            update.insert("password".to_string(), Value::String(hashed));
        }

        let updated = self.users.update_one(&Filter::id(id), update).await?;
        Ok(updated.into())
    }

    pub async fn delete(&self, id: DocId) -> AppResult<()> {
        self.users.delete_one(&Filter::id(id)).await?;
        Ok(())
    }

    async fn ensure_username_free(&self, username: &str) -> AppResult<()> {
        let existing = self.users.count(&Filter::all().eq("username", username)).await?;
        if existing > 0 {
            return Err(AppError::conflict(format!(
                "User with username {username} already exists!"
            )));
        }
        Ok(())
    }
}

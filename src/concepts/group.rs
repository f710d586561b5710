use crate::core::{AppError, AppResult, DocId};
use crate::storage::{Doc, DocCollection, DocumentStore, Filter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRecord {
    pub name: String,
    #[serde(default)]
    pub members: Vec<DocId>,
}

pub type GroupDoc = Doc<GroupRecord>;

pub struct GroupConcept {
    groups: DocCollection<GroupRecord>,
}

impl GroupConcept {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            groups: DocCollection::new("groups", store),
        }
    }

    pub async fn create(&self, name: &str) -> AppResult<GroupDoc> {
        if name.is_empty() {
            return Err(AppError::bad_request("Group name must be non-empty!"));
        }
        if self.groups.count(&by_name(name)).await? > 0 {
            return Err(AppError::conflict(format!("Group {name} already exists!")));
        }
        self.groups
            .create_one(&GroupRecord {
                name: name.to_string(),
                members: Vec::new(),
            })
            .await?;
        self.get_group_by_name(name).await
    }

    pub async fn get_group_by_name(&self, name: &str) -> AppResult<GroupDoc> {
        self.groups
            .read_one(&by_name(name))
            .await?
            .ok_or_else(|| AppError::not_found(format!("Group {name} does not exist!")))
    }

    pub async fn get_groups(&self) -> AppResult<Vec<GroupDoc>> {
        self.groups.read_many(&Filter::all()).await
    }

    pub async fn register_member(&self, user: DocId, name: &str) -> AppResult<GroupDoc> {
        self.edit_members(name, |group| {
            if group.members.contains(&user) {
                return Err(AppError::conflict(format!(
                    "User {user} is already a member of {}!",
                    group.name
                )));
            }
            group.members.push(user);
            Ok(())
        })
        .await
    }

    pub async fn remove_member(&self, user: DocId, name: &str) -> AppResult<GroupDoc> {
        self.edit_members(name, |group| {
            let before = group.members.len();
            group.members.retain(|member| *member != user);
            if group.members.len() == before {
                return Err(AppError::not_found(format!(
                    "User {user} is not a member of {}!",
                    group.name
                )));
            }
            Ok(())
        })
        .await
    }

    /// Fails with `Forbidden` unless `user` belongs to group `name`.
    pub async fn ensure_member(&self, user: DocId, name: &str) -> AppResult<GroupDoc> {
        let group = self.get_group_by_name(name).await?;
        if !group.body.members.contains(&user) {
            return Err(AppError::forbidden(format!(
                "User {user} is not a member of {name}!"
            )));
        }
        Ok(group)
    }

    async fn edit_members<F>(&self, name: &str, edit: F) -> AppResult<GroupDoc>
    where
        F: FnOnce(&mut GroupRecord) -> AppResult<()> + Send,
    {
        // Resolve first so a missing group reports its name.
        self.get_group_by_name(name).await?;
        self.groups.update_one_with(&by_name(name), edit).await
    }
}

fn by_name(name: &str) -> Filter {
    Filter::all().eq("name", name)
}

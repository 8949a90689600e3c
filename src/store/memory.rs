use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Store, StoreError};
use crate::{
    tags::repo_types::Tag,
    users::repo_types::{NewUser, User, UserChanges},
};

/// Process-local store. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    by_email: HashMap<String, Uuid>,
    tokens: HashMap<String, Uuid>,
    token_of: HashMap<Uuid, String>,
    tags: Vec<Tag>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn set_active(&self, id: Uuid, active: bool) {
        if let Some(user) = self.inner.write().await.users.get_mut(&id) {
            user.is_active = active;
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner
            .by_email
            .get(email)
            .and_then(|id| inner.users.get(id))
            .cloned())
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut inner = self.inner.write().await;
        if inner.by_email.contains_key(&user.email) {
            return Err(StoreError::EmailTaken);
        }
        let record = User {
            id: Uuid::new_v4(),
            email: user.email,
            password_hash: user.password_hash,
            name: user.name,
            is_active: true,
            created_at: OffsetDateTime::now_utc(),
        };
        inner.by_email.insert(record.email.clone(), record.id);
        inner.users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_user(&self, id: Uuid, changes: UserChanges) -> anyhow::Result<Option<User>> {
        let mut inner = self.inner.write().await;
        let Some(user) = inner.users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = changes.name {
            user.name = name;
        }
        if let Some(hash) = changes.password_hash {
            user.password_hash = hash;
        }
        Ok(Some(user.clone()))
    }

    async fn get_or_create_token(&self, user_id: Uuid, candidate: &str) -> anyhow::Result<String> {
        let mut inner = self.inner.write().await;
        anyhow::ensure!(inner.users.contains_key(&user_id), "no user {user_id}");
        if let Some(existing) = inner.token_of.get(&user_id) {
            return Ok(existing.clone());
        }
        inner.tokens.insert(candidate.to_string(), user_id);
        inner.token_of.insert(user_id, candidate.to_string());
        Ok(candidate.to_string())
    }

    async fn find_user_by_token(&self, key: &str) -> anyhow::Result<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner
            .tokens
            .get(key)
            .and_then(|id| inner.users.get(id))
            .cloned())
    }

    async fn insert_tag(&self, user_id: Uuid, name: &str) -> anyhow::Result<Tag> {
        let mut inner = self.inner.write().await;
        anyhow::ensure!(inner.users.contains_key(&user_id), "no user {user_id}");
        let tag = Tag {
            id: Uuid::new_v4(),
            user_id,
            name: name.to_string(),
            created_at: OffsetDateTime::now_utc(),
        };
        inner.tags.push(tag.clone());
        Ok(tag)
    }

    async fn list_tags_by_user(&self, user_id: Uuid) -> anyhow::Result<Vec<Tag>> {
        let inner = self.inner.read().await;
        let mut tags: Vec<Tag> = inner
            .tags
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        tags.sort_by(|a, b| {
            b.name
                .cmp(&a.name)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        Ok(tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.into(),
            password_hash: "hash".into(),
            name: "user".into(),
        }
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected_without_overwrite() {
        let store = MemoryStore::new();
        let first = store.insert_user(new_user("a@b.com")).await.unwrap();

        let mut again = new_user("a@b.com");
        again.name = "intruder".into();
        let err = store.insert_user(again).await.unwrap_err();
        assert!(matches!(err, StoreError::EmailTaken));

        let stored = store.find_user_by_email("a@b.com").await.unwrap().unwrap();
        assert_eq!(stored.id, first.id);
        assert_eq!(stored.name, "user");
    }

    #[tokio::test]
    async fn token_is_created_once_per_user() {
        let store = MemoryStore::new();
        let user = store.insert_user(new_user("a@b.com")).await.unwrap();

        let t1 = store.get_or_create_token(user.id, "first").await.unwrap();
        let t2 = store.get_or_create_token(user.id, "second").await.unwrap();
        assert_eq!(t1, "first");
        assert_eq!(t2, "first");
        assert!(store.find_user_by_token("second").await.unwrap().is_none());
        assert_eq!(
            store.find_user_by_token("first").await.unwrap().unwrap().id,
            user.id
        );
    }

    #[tokio::test]
    async fn partial_update_keeps_absent_fields() {
        let store = MemoryStore::new();
        let user = store.insert_user(new_user("a@b.com")).await.unwrap();

        let updated = store
            .update_user(
                user.id,
                UserChanges {
                    name: Some("renamed".into()),
                    password_hash: None,
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.name, "renamed");
        assert_eq!(updated.password_hash, "hash");

        assert!(store
            .update_user(Uuid::new_v4(), UserChanges::default())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn tags_are_scoped_and_sorted_descending() {
        let store = MemoryStore::new();
        let u1 = store.insert_user(new_user("one@b.com")).await.unwrap();
        let u2 = store.insert_user(new_user("two@b.com")).await.unwrap();

        for name in ["Dessert", "Vegan", "apple", "Breakfast"] {
            store.insert_tag(u1.id, name).await.unwrap();
        }
        store.insert_tag(u2.id, "Fruit").await.unwrap();

        let names: Vec<String> = store
            .list_tags_by_user(u1.id)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, ["apple", "Vegan", "Dessert", "Breakfast"]);

        let other = store.list_tags_by_user(u2.id).await.unwrap();
        assert_eq!(other.len(), 1);
        assert_eq!(other[0].name, "Fruit");
    }

    #[tokio::test]
    async fn tag_needs_an_existing_owner() {
        let store = MemoryStore::new();
        assert!(store.insert_tag(Uuid::new_v4(), "orphan").await.is_err());
    }
}

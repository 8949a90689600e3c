use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    tags::repo_types::Tag,
    users::repo_types::{NewUser, User, UserChanges},
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("email already registered")]
    EmailTaken,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Persistence for users, their tokens and their tags.
///
/// Every method is a single atomic operation against the backend.
#[async_trait]
pub trait Store: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;

    /// Fails with [`StoreError::EmailTaken`] when the email is already in use.
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError>;

    /// Returns `None` when the user no longer exists.
    async fn update_user(&self, id: Uuid, changes: UserChanges) -> anyhow::Result<Option<User>>;

    /// Stores `candidate` as the user's token unless one exists already, and
    /// returns whichever token the user ends up with.
    async fn get_or_create_token(&self, user_id: Uuid, candidate: &str) -> anyhow::Result<String>;

    async fn find_user_by_token(&self, key: &str) -> anyhow::Result<Option<User>>;

    async fn insert_tag(&self, user_id: Uuid, name: &str) -> anyhow::Result<Tag>;

    /// The user's tags, name descending.
    async fn list_tags_by_user(&self, user_id: Uuid) -> anyhow::Result<Vec<Tag>>;
}

use anyhow::Context;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::{info, warn};
use uuid::Uuid;

use super::{Store, StoreError};
use crate::{
    tags::repo_types::Tag,
    users::repo_types::{NewUser, User, UserChanges},
};

#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("connect to database")?;
        Ok(Self { db })
    }

    /// Applies `migrations/`; a failure is logged and startup continues.
    pub async fn migrate(&self) {
        match sqlx::migrate!("./migrations").run(&self.db).await {
            Ok(()) => info!("migrations applied"),
            Err(e) => warn!(error = %e, "migration failed; continuing"),
        }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, name, is_active, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by email")?;
        Ok(user)
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let res = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, password_hash, name)
            VALUES ($1, $2, $3, $4)
            RETURNING id, email, password_hash, name, is_active, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.name)
        .fetch_one(&self.db)
        .await;

        match res {
            Ok(u) => Ok(u),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StoreError::EmailTaken)
            }
            Err(e) => Err(anyhow::Error::new(e).context("insert user").into()),
        }
    }

    async fn update_user(&self, id: Uuid, changes: UserChanges) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
               SET name = COALESCE($2, name),
                   password_hash = COALESCE($3, password_hash)
             WHERE id = $1
            RETURNING id, email, password_hash, name, is_active, created_at
            "#,
        )
        .bind(id)
        .bind(changes.name)
        .bind(changes.password_hash)
        .fetch_optional(&self.db)
        .await
        .context("update user")?;
        Ok(user)
    }

    async fn get_or_create_token(&self, user_id: Uuid, candidate: &str) -> anyhow::Result<String> {
        let mut tx = self.db.begin().await.context("begin tx")?;
        sqlx::query(
            r#"
            INSERT INTO auth_tokens (key, user_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(candidate)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .context("insert token")?;

        let key: String = sqlx::query_scalar(r#"SELECT key FROM auth_tokens WHERE user_id = $1"#)
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await
            .context("select token")?;
        tx.commit().await.context("commit tx")?;
        Ok(key)
    }

    async fn find_user_by_token(&self, key: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT u.id, u.email, u.password_hash, u.name, u.is_active, u.created_at
              FROM auth_tokens t
              JOIN users u ON u.id = t.user_id
             WHERE t.key = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.db)
        .await
        .context("find user by token")?;
        Ok(user)
    }

    async fn insert_tag(&self, user_id: Uuid, name: &str) -> anyhow::Result<Tag> {
        let tag = sqlx::query_as::<_, Tag>(
            r#"
            INSERT INTO tags (id, user_id, name)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, name, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(name)
        .fetch_one(&self.db)
        .await
        .context("insert tag")?;
        Ok(tag)
    }

    async fn list_tags_by_user(&self, user_id: Uuid) -> anyhow::Result<Vec<Tag>> {
        // COLLATE "C" keeps the ordering byte-wise and case-sensitive
        let rows = sqlx::query_as::<_, Tag>(
            r#"
            SELECT id, user_id, name, created_at
              FROM tags
             WHERE user_id = $1
             ORDER BY name COLLATE "C" DESC, created_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await
        .context("list tags by user")?;
        Ok(rows)
    }
}

use tracing::{info, warn};

use super::{
    dto::{RegisterRequest, UpdateProfileRequest},
    repo_types::{NewUser, User, UserChanges},
};
use crate::{
    auth::password::{hash_password, verify_password},
    error::{ApiError, FieldErrors},
    store::{Store, StoreError},
    validate,
};

const EMAIL_TAKEN: &str = "user with this email already exists.";

/// Validates every field, then stores the user with a hashed password.
/// Nothing is written when any field is rejected.
pub async fn create_user(store: &dyn Store, req: RegisterRequest) -> Result<User, ApiError> {
    let mut errors = FieldErrors::new();
    let email = validate::email(&mut errors, req.email.as_deref());
    let password = validate::new_password(&mut errors, req.password.as_deref());
    let name = validate::required_text(&mut errors, "name", req.name.as_deref());

    if let Some(email) = &email {
        if store.find_user_by_email(email).await?.is_some() {
            errors.add("email", EMAIL_TAKEN);
        }
    }
    let (email, password, name) = match (email, password, name) {
        (Some(email), Some(password), Some(name)) if errors.is_empty() => (email, password, name),
        _ => {
            warn!(?errors, "registration rejected");
            return Err(ApiError::Validation(errors));
        }
    };

    let password_hash = hash_password(password)?;
    match store
        .insert_user(NewUser {
            email,
            password_hash,
            name,
        })
        .await
    {
        Ok(user) => {
            info!(
                user_id = %user.id,
                email = %user.email,
                created_at = %user.created_at,
                "user registered"
            );
            Ok(user)
        }
        Err(StoreError::EmailTaken) => Err(ApiError::AlreadyExists {
            field: "email",
            message: EMAIL_TAKEN.into(),
        }),
        Err(StoreError::Other(e)) => Err(e.into()),
    }
}

/// Same error for unknown email, wrong password and inactive account.
pub async fn authenticate(store: &dyn Store, email: &str, password: &str) -> Result<User, ApiError> {
    let email = validate::normalize_email(email);
    let Some(user) = store.find_user_by_email(&email).await? else {
        warn!(email = %email, "login unknown email");
        return Err(ApiError::InvalidCredentials);
    };
    if !verify_password(password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(ApiError::InvalidCredentials);
    }
    if !user.is_active {
        warn!(user_id = %user.id, "login inactive user");
        return Err(ApiError::InvalidCredentials);
    }
    Ok(user)
}

pub async fn update_profile(
    store: &dyn Store,
    user: User,
    req: UpdateProfileRequest,
) -> Result<User, ApiError> {
    let mut errors = FieldErrors::new();
    let name = req
        .name
        .as_deref()
        .and_then(|n| validate::required_text(&mut errors, "name", Some(n)));
    let password = req
        .password
        .as_deref()
        .and_then(|p| validate::new_password(&mut errors, Some(p)));
    errors.into_result()?;

    let changes = UserChanges {
        name,
        password_hash: password.map(hash_password).transpose()?,
    };
    if changes.is_empty() {
        return Ok(user);
    }

    let updated = store
        .update_user(user.id, changes)
        .await?
        .ok_or(ApiError::Unauthenticated("User inactive or deleted."))?;
    info!(user_id = %updated.id, "profile updated");
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use axum::{http::StatusCode, response::IntoResponse};
    use uuid::Uuid;

    use super::*;
    use crate::{store::MemoryStore, tags::repo_types::Tag};

    /// Another request registers the same email between the lookup and the
    /// insert: the lookup sees nothing, the unique index fires.
    struct LostInsertRace;

    #[async_trait]
    impl Store for LostInsertRace {
        async fn find_user_by_email(&self, _email: &str) -> anyhow::Result<Option<User>> {
            Ok(None)
        }
        async fn insert_user(&self, _user: NewUser) -> Result<User, StoreError> {
            Err(StoreError::EmailTaken)
        }
        async fn update_user(&self, _id: Uuid, _c: UserChanges) -> anyhow::Result<Option<User>> {
            unimplemented!()
        }
        async fn get_or_create_token(&self, _id: Uuid, _candidate: &str) -> anyhow::Result<String> {
            unimplemented!()
        }
        async fn find_user_by_token(&self, _key: &str) -> anyhow::Result<Option<User>> {
            unimplemented!()
        }
        async fn insert_tag(&self, _id: Uuid, _name: &str) -> anyhow::Result<Tag> {
            unimplemented!()
        }
        async fn list_tags_by_user(&self, _id: Uuid) -> anyhow::Result<Vec<Tag>> {
            unimplemented!()
        }
    }

    fn register(email: &str, password: &str, name: &str) -> RegisterRequest {
        RegisterRequest {
            email: Some(email.into()),
            password: Some(password.into()),
            name: Some(name.into()),
        }
    }

    #[tokio::test]
    async fn stores_hash_not_plaintext() {
        let store = MemoryStore::new();
        let user = create_user(&store, register("Test@Test.com", "somepassword", "user1"))
            .await
            .unwrap();
        assert_eq!(user.email, "test@test.com");
        assert_ne!(user.password_hash, "somepassword");
        assert!(user.created_at <= time::OffsetDateTime::now_utc());

        let authed = authenticate(&store, "test@test.com", "somepassword")
            .await
            .unwrap();
        assert_eq!(authed.id, user.id);
    }

    #[tokio::test]
    async fn short_password_creates_nothing() {
        let store = MemoryStore::new();
        let err = create_user(&store, register("test@test.com", "pw", "user1"))
            .await
            .unwrap_err();
        let ApiError::Validation(errors) = err else {
            panic!("expected validation error, got {err:?}");
        };
        assert!(errors.get("password").is_some());
        assert!(store.find_user_by_email("test@test.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reports_every_bad_field() {
        let store = MemoryStore::new();
        let err = create_user(&store, RegisterRequest::default()).await.unwrap_err();
        let ApiError::Validation(errors) = err else {
            panic!("expected validation error, got {err:?}");
        };
        for field in ["email", "password", "name"] {
            assert!(errors.get(field).is_some(), "missing error for {field}");
        }
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let store = MemoryStore::new();
        create_user(&store, register("test@test.com", "somepassword", "user1"))
            .await
            .unwrap();
        let err = create_user(&store, register("TEST@test.com", "otherpassword", "user2"))
            .await
            .unwrap_err();
        let ApiError::Validation(errors) = err else {
            panic!("expected validation error, got {err:?}");
        };
        assert_eq!(errors.get("email").unwrap(), [EMAIL_TAKEN]);

        let kept = authenticate(&store, "test@test.com", "somepassword").await.unwrap();
        assert_eq!(kept.name, "user1");
    }

    #[tokio::test]
    async fn unique_violation_on_insert_is_a_field_error() {
        let err = create_user(&LostInsertRace, register("test@test.com", "somepassword", "user1"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::AlreadyExists { field: "email", .. }));

        let res = err.into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "email": ["user with this email already exists."] })
        );
    }

    #[tokio::test]
    async fn authenticate_fails_uniformly() {
        let store = MemoryStore::new();
        let user = create_user(&store, register("test@test.com", "somepassword", "user1"))
            .await
            .unwrap();

        let wrong = authenticate(&store, "test@test.com", "wrongpassword").await;
        let unknown = authenticate(&store, "test@aaaa.com", "somepassword").await;
        assert!(matches!(wrong, Err(ApiError::InvalidCredentials)));
        assert!(matches!(unknown, Err(ApiError::InvalidCredentials)));

        store.set_active(user.id, false).await;
        let inactive = authenticate(&store, "test@test.com", "somepassword").await;
        assert!(matches!(inactive, Err(ApiError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn update_touches_only_given_fields() {
        let store = MemoryStore::new();
        let user = create_user(&store, register("test@test.com", "somepassword", "user1"))
            .await
            .unwrap();

        let renamed = update_profile(
            &store,
            user,
            UpdateProfileRequest {
                name: Some("doejohn".into()),
                password: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(renamed.name, "doejohn");
        authenticate(&store, "test@test.com", "somepassword").await.unwrap();

        let repassed = update_profile(
            &store,
            renamed,
            UpdateProfileRequest {
                name: None,
                password: Some("newpassword".into()),
            },
        )
        .await
        .unwrap();
        assert_eq!(repassed.name, "doejohn");
        authenticate(&store, "test@test.com", "newpassword").await.unwrap();
        assert!(authenticate(&store, "test@test.com", "somepassword").await.is_err());
    }

    #[tokio::test]
    async fn update_rejects_bad_values() {
        let store = MemoryStore::new();
        let user = create_user(&store, register("test@test.com", "somepassword", "user1"))
            .await
            .unwrap();

        let err = update_profile(
            &store,
            user,
            UpdateProfileRequest {
                name: Some("   ".into()),
                password: Some("short".into()),
            },
        )
        .await
        .unwrap_err();
        let ApiError::Validation(errors) = err else {
            panic!("expected validation error, got {err:?}");
        };
        assert!(errors.get("name").is_some());
        assert!(errors.get("password").is_some());

        let unchanged = authenticate(&store, "test@test.com", "somepassword").await.unwrap();
        assert_eq!(unchanged.name, "user1");
    }
}

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};

use super::dto::{CreateTagRequest, TagResponse};
use crate::{
    auth::{protected_method_not_allowed, AuthUser},
    error::{ApiError, FieldErrors},
    state::AppState,
    validate,
};

pub fn tag_routes() -> Router<AppState> {
    Router::new().route(
        "/tags/",
        get(list_tags)
            .post(create_tag)
            .fallback(protected_method_not_allowed),
    )
}

/// Only the caller's tags, name descending.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn list_tags(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<TagResponse>>, ApiError> {
    let tags = state.store.list_tags_by_user(user.id).await?;
    Ok(Json(tags.into_iter().map(TagResponse::from).collect()))
}

/// The owner is always the caller; the body cannot set it.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn create_tag(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    payload: Result<Json<CreateTagRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TagResponse>), ApiError> {
    let Json(payload) = payload?;

    let mut errors = FieldErrors::new();
    let Some(name) = validate::required_text(&mut errors, "name", payload.name.as_deref()) else {
        return Err(ApiError::Validation(errors));
    };

    let tag = state.store.insert_tag(user.id, &name).await?;
    info!(tag_id = %tag.id, name = %tag, "tag created");
    Ok((StatusCode::CREATED, Json(tag.into())))
}

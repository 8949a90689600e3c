use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};

use super::{
    dto::{RegisterRequest, TokenRequest, TokenResponse, UpdateProfileRequest, UserResponse},
    services,
};
use crate::{
    auth::{protected_method_not_allowed, token::issue_token, AuthUser},
    error::{method_not_allowed, ApiError, FieldErrors},
    state::AppState,
    validate,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users/", post(register).fallback(method_not_allowed))
        .route("/users/auth", post(obtain_token).fallback(method_not_allowed))
        .route(
            "/users/me",
            get(get_profile)
                .patch(update_profile)
                .fallback(protected_method_not_allowed),
        )
}

#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let Json(payload) = payload?;
    let user = services::create_user(state.store.as_ref(), payload).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[instrument(skip_all)]
pub async fn obtain_token(
    State(state): State<AppState>,
    payload: Result<Json<TokenRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, ApiError> {
    let Json(payload) = payload?;

    let mut errors = FieldErrors::new();
    let email = validate::required_text(&mut errors, "email", payload.email.as_deref());
    let password = validate::given_password(&mut errors, payload.password.as_deref());
    let (email, password) = match (email, password) {
        (Some(e), Some(p)) => (e, p),
        _ => return Err(ApiError::Validation(errors)),
    };

    let user = services::authenticate(state.store.as_ref(), &email, password).await?;
    let token = issue_token(state.store.as_ref(), &user).await?;
    info!(user_id = %user.id, "user logged in");
    Ok(Json(TokenResponse { token }))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn get_profile(AuthUser(user): AuthUser) -> Json<UserResponse> {
    Json(user.into())
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    payload: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Result<Json<UserResponse>, ApiError> {
    let Json(payload) = payload?;
    let user = services::update_profile(state.store.as_ref(), user, payload).await?;
    Ok(Json(user.into()))
}

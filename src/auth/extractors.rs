use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, Method},
};
use tracing::warn;

use super::token::resolve_token;
use crate::{error::ApiError, state::AppState, users::repo_types::User};

/// The authenticated caller. Rejects with 401 before the handler runs.
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(header) = parts.headers.get(AUTHORIZATION) else {
            return Err(ApiError::Unauthenticated(
                "Authentication credentials were not provided.",
            ));
        };

        let key = header
            .to_str()
            .ok()
            .and_then(token_from_header)
            .ok_or_else(|| {
                warn!("malformed Authorization header");
                ApiError::Unauthenticated("Invalid token.")
            })?;

        let user = resolve_token(state.store.as_ref(), key).await?;
        Ok(AuthUser(user))
    }
}

/// 405 for protected resources, but only once the caller is authenticated;
/// anonymous requests get the extractor's 401.
pub async fn protected_method_not_allowed(_: AuthUser, method: Method) -> ApiError {
    ApiError::MethodNotAllowed(method)
}

/// Accepts `Token <key>` and `Bearer <key>`, scheme case-insensitive.
fn token_from_header(value: &str) -> Option<&str> {
    let (scheme, key) = value.trim().split_once(' ')?;
    let known = scheme.eq_ignore_ascii_case("token") || scheme.eq_ignore_ascii_case("bearer");
    let key = key.trim();
    if !known || key.is_empty() || key.contains(char::is_whitespace) {
        return None;
    }
    Some(key)
}

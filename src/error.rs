use std::collections::BTreeMap;

use axum::{
    extract::rejection::JsonRejection,
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::error;

pub const INVALID_CREDENTIALS: &str = "Unable to authenticate with provided credentials.";

/// Per-field validation messages, rendered as `{"field": ["msg", ...]}`.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<&'static str, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &'static str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[cfg(test)]
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// `Ok(())` when nothing was recorded.
    pub fn into_result(self) -> Result<(), ApiError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(self))
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("validation failed: {0:?}")]
    Validation(FieldErrors),

    #[error("{field}: {message}")]
    AlreadyExists { field: &'static str, message: String },

    #[error("{}", INVALID_CREDENTIALS)]
    InvalidCredentials,

    #[error("{0}")]
    Unauthenticated(&'static str),

    #[error("Method \"{0}\" not allowed.")]
    MethodNotAllowed(Method),

    #[error("{0}")]
    MalformedBody(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::MalformedBody(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(errors) => (StatusCode::BAD_REQUEST, Json(errors)).into_response(),
            ApiError::AlreadyExists { field, message } => (
                StatusCode::BAD_REQUEST,
                Json(FieldErrors::single(field, message)),
            )
                .into_response(),
            ApiError::InvalidCredentials => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "non_field_errors": [INVALID_CREDENTIALS] })),
            )
                .into_response(),
            ApiError::Unauthenticated(detail) => {
                let mut res =
                    (StatusCode::UNAUTHORIZED, Json(json!({ "detail": detail }))).into_response();
                res.headers_mut()
                    .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Token"));
                res
            }
            err @ ApiError::MethodNotAllowed(_) => (
                StatusCode::METHOD_NOT_ALLOWED,
                Json(json!({ "detail": err.to_string() })),
            )
                .into_response(),
            ApiError::MalformedBody(detail) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "detail": detail }))).into_response()
            }
            ApiError::Internal(e) => {
                error!(error = ?e, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "detail": "Internal server error." })),
                )
                    .into_response()
            }
        }
    }
}

/// Fallback for verbs a resource does not support.
pub async fn method_not_allowed(method: Method) -> ApiError {
    ApiError::MethodNotAllowed(method)
}

use std::collections::BTreeMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Serialize;

use crate::utils::{error_codes, error_to_api_response, error_with_data_to_api_response};

/// Key under which errors that belong to no single field are reported.
pub const NON_FIELD_ERRORS: &str = "__all__";

/// Field name to messages, in the order fields were checked.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// `Ok(value)` when no error was recorded.
    pub fn into_result<T>(self, value: T) -> Result<T, FieldErrors> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("validation failed: {0:?}")]
    Validation(FieldErrors),

    #[error("resource not found")]
    NotFound,

    /// No live session. `next` is the path and query to come back to after
    /// login.
    #[error("authentication required")]
    AuthenticationRequired { next: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl From<FieldErrors> for AppError {
    fn from(errors: FieldErrors) -> Self {
        AppError::Validation(errors)
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(e: bcrypt::BcryptError) -> Self {
        AppError::Internal(format!("password hashing failed: {}", e))
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        AppError::Internal(format!("token signing failed: {}", e))
    }
}

/// True for a Postgres unique-constraint violation (SQLSTATE 23505).
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23505"),
        _ => false,
    }
}

/// Login URL that brings the user back to `next` (path and query)
/// afterwards. `next` is percent-encoded as a single query value.
pub fn login_redirect(next: &str) -> Redirect {
    if next.is_empty() || next == "/" {
        return Redirect::to("/login");
    }
    match serde_urlencoded::to_string([("next", next)]) {
        Ok(query) => Redirect::to(&format!("/login?{}", query)),
        Err(e) => {
            tracing::warn!(error = %e, next, "Could not encode login return path");
            Redirect::to("/login")
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Validation(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                error_with_data_to_api_response(
                    error_codes::VALIDATION_ERROR,
                    "입력값을 확인해 주세요".to_string(),
                    errors,
                ),
            )
                .into_response(),
            AppError::NotFound => (
                StatusCode::NOT_FOUND,
                error_to_api_response::<()>(
                    error_codes::NOT_FOUND,
                    "페이지를 찾을 수 없습니다".to_string(),
                ),
            )
                .into_response(),
            AppError::AuthenticationRequired { next } => login_redirect(&next).into_response(),
            AppError::Database(e) => {
                tracing::error!(error = %e, "Database error");
                internal_error_response()
            }
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                internal_error_response()
            }
        }
    }
}

fn internal_error_response() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        error_to_api_response::<()>(error_codes::INTERNAL_ERROR, "내부 서버 오류".to_string()),
    )
        .into_response()
}

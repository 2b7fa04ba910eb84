use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use common_auth::{AuthError, GuardError};

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad credentials. One message for unknown email and wrong password,
    /// so callers cannot enumerate accounts.
    #[error("invalid credentials")]
    AuthFailed,
    #[error("token rejected")]
    Token(#[from] AuthError),
    #[error("insufficient role")]
    Forbidden,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("email already registered")]
    DuplicateEmail,
    #[error("franchise name already taken")]
    DuplicateFranchise,
    #[error("no registered user for '{0}'")]
    UnknownUser(String),
    #[error("bad request: {0}")]
    BadRequest(&'static str),
    /// Any credential-store fault. The detail is logged at the call site;
    /// the response body stays generic.
    #[error("internal error")]
    Internal,
}

impl ApiError {
    pub fn internal<E: std::fmt::Display>(err: E) -> Self {
        tracing::error!(error = %err, "store fault");
        ApiError::Internal
    }
}

impl From<GuardError> for ApiError {
    fn from(_: GuardError) -> Self {
        ApiError::Forbidden
    }
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::AuthFailed => (
                StatusCode::UNAUTHORIZED,
                "auth_failed",
                "invalid credentials".to_string(),
            ),
            ApiError::Token(err) => return err.into_response(),
            ApiError::Forbidden => (
                StatusCode::FORBIDDEN,
                "forbidden",
                "unauthorized".to_string(),
            ),
            ApiError::NotFound(what) => {
                (StatusCode::NOT_FOUND, "not_found", format!("{what} not found"))
            }
            ApiError::DuplicateEmail => (
                StatusCode::CONFLICT,
                "duplicate_email",
                "email already registered".to_string(),
            ),
            ApiError::DuplicateFranchise => (
                StatusCode::CONFLICT,
                "duplicate_franchise",
                "franchise name already taken".to_string(),
            ),
            ApiError::UnknownUser(email) => (
                StatusCode::BAD_REQUEST,
                "unknown_user",
                format!("no registered user for '{email}'"),
            ),
            ApiError::BadRequest(detail) => {
                (StatusCode::BAD_REQUEST, "bad_request", detail.to_string())
            }
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "internal server error".to_string(),
            ),
        };

        let body = ErrorBody { code, message };
        (status, Json(body)).into_response()
    }
}

/// Maps Postgres unique violations (SQLSTATE 23505) to a domain conflict.
pub fn on_unique_violation(err: sqlx::Error, conflict: ApiError) -> ApiError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23505") {
            return conflict;
        }
    }
    ApiError::internal(err)
}

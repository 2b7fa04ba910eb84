use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authorization header missing")]
    MissingAuthorization,
    #[error("authorization header malformed")]
    InvalidAuthorization,
    #[error("token malformed: {0}")]
    Malformed(String),
    #[error("token expired")]
    Expired,
    #[error("token signature invalid")]
    BadSignature,
    #[error("token has been revoked")]
    Revoked,
    #[error("invalid claim '{0}' with value '{1}'")]
    InvalidClaim(&'static str, String),
    #[error("malformed claim payload: {0}")]
    InvalidJson(String),
    #[error("failed to sign token: {0}")]
    Signing(String),
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(value: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match value.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidSignature => Self::BadSignature,
            _ => Self::Malformed(value.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: &'static str,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        // Every token problem collapses to a generic 401 for the caller;
        // the variant is only for logs and tests.
        let (status, code, message) = match &self {
            AuthError::MissingAuthorization | AuthError::InvalidAuthorization => {
                (StatusCode::UNAUTHORIZED, "auth_header", "unauthorized")
            }
            AuthError::Malformed(_)
            | AuthError::Expired
            | AuthError::BadSignature
            | AuthError::Revoked
            | AuthError::InvalidClaim(_, _)
            | AuthError::InvalidJson(_) => (StatusCode::UNAUTHORIZED, "auth_token", "unauthorized"),
            AuthError::Signing(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "auth_internal",
                "internal error",
            ),
        };

        let body = ErrorBody { code, message };
        (status, Json(body)).into_response()
    }
}

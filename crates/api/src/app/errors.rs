use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use tenantry_auth::AuthError;
use tenantry_infra::RateLimited;

/// Handler-level failure, rendered as `{"error": code, "message": ...}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{1}")]
    Conflict(&'static str, String),

    #[error(transparent)]
    RateLimited(#[from] RateLimited),

    #[error("background task failed: {0}")]
    Task(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }
}

pub fn auth_status(err: &AuthError) -> StatusCode {
    match err {
        AuthError::InvalidToken
        | AuthError::ExpiredToken
        | AuthError::BlacklistedToken
        | AuthError::MissingAuthorization
        | AuthError::MalformedAuthorization
        | AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,

        AuthError::UserInactive
        | AuthError::TenantSuspended
        | AuthError::Unauthorized(_)
        | AuthError::TenantRequired
        | AuthError::UnauthorizedTenant => StatusCode::FORBIDDEN,

        AuthError::UserLocked => StatusCode::LOCKED,
        AuthError::TooManyAttempts => StatusCode::TOO_MANY_REQUESTS,
        AuthError::TenantNotFound => StatusCode::NOT_FOUND,
        AuthError::EmailAlreadyExists | AuthError::UsernameAlreadyExists => StatusCode::CONFLICT,

        AuthError::Signing(_)
        | AuthError::Store(_)
        | AuthError::Repository(_)
        | AuthError::PasswordHash(_)
        | AuthError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn auth_error_to_response(err: AuthError) -> Response {
    if err.is_internal() {
        error!(code = err.code(), error = %err, "internal error");
        return json_error(StatusCode::INTERNAL_SERVER_ERROR, err.code(), "internal server error");
    }
    json_error(auth_status(&err), err.code(), err.to_string())
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Auth(err) => auth_error_to_response(err),
            ApiError::BadRequest(msg) => json_error(StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::NotFound(what) => {
                json_error(StatusCode::NOT_FOUND, "not_found", format!("{what} not found"))
            }
            ApiError::Conflict(code, msg) => json_error(StatusCode::CONFLICT, code, msg),
            ApiError::Task(msg) => {
                error!(error = %msg, "blocking task failed");
                json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "internal server error")
            }
            ApiError::RateLimited(limited) => {
                let retry_after = limited.retry_after.as_secs().max(1);
                let mut res =
                    json_error(StatusCode::TOO_MANY_REQUESTS, "rate_limited", limited.to_string());
                res.headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
                res
            }
        }
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

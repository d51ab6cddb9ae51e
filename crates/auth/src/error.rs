//! Authentication / authorization error taxonomy.
//!
//! Every failure the core can report is a variant here. The HTTP layer maps
//! variants to status codes; nothing inside the core branches on them beyond
//! ordinary `?` propagation.

use thiserror::Error;

use crate::repository::{RepositoryError, UniqueField};
use crate::store::StoreError;

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    // Credential errors.
    #[error("invalid token")]
    InvalidToken,

    #[error("token has expired")]
    ExpiredToken,

    #[error("token has been revoked")]
    BlacklistedToken,

    #[error("missing authorization header")]
    MissingAuthorization,

    #[error("malformed authorization header")]
    MalformedAuthorization,

    // Identity errors.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("user account is inactive")]
    UserInactive,

    #[error("user account is locked")]
    UserLocked,

    #[error("tenant not found")]
    TenantNotFound,

    #[error("tenant is suspended")]
    TenantSuspended,

    #[error("too many failed login attempts, try again later")]
    TooManyAttempts,

    // Registration / privilege.
    #[error("email already exists")]
    EmailAlreadyExists,

    #[error("username already exists")]
    UsernameAlreadyExists,

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    // Isolation errors.
    #[error("tenant context required")]
    TenantRequired,

    #[error("access to another tenant's data is not allowed")]
    UnauthorizedTenant,

    // Infrastructure.
    #[error("token signing failed: {0}")]
    Signing(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("repository error: {0}")]
    Repository(RepositoryError),

    #[error("password hashing failed: {0}")]
    PasswordHash(String),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Uniqueness clashes are caller errors; everything else is infrastructure.
impl From<RepositoryError> for AuthError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict(UniqueField::Email) => AuthError::EmailAlreadyExists,
            RepositoryError::Conflict(UniqueField::Username) => AuthError::UsernameAlreadyExists,
            other => AuthError::Repository(other),
        }
    }
}

impl AuthError {
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    /// Stable machine-readable code for API responses and logs.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidToken => "invalid_token",
            AuthError::ExpiredToken => "expired_token",
            AuthError::BlacklistedToken => "blacklisted_token",
            AuthError::MissingAuthorization => "missing_authorization",
            AuthError::MalformedAuthorization => "malformed_authorization",
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::UserInactive => "user_inactive",
            AuthError::UserLocked => "user_locked",
            AuthError::TenantNotFound => "tenant_not_found",
            AuthError::TenantSuspended => "tenant_suspended",
            AuthError::TooManyAttempts => "too_many_attempts",
            AuthError::EmailAlreadyExists => "email_already_exists",
            AuthError::UsernameAlreadyExists => "username_already_exists",
            AuthError::Unauthorized(_) => "unauthorized",
            AuthError::TenantRequired => "tenant_required",
            AuthError::UnauthorizedTenant => "unauthorized_tenant",
            AuthError::Signing(_) => "signing_error",
            AuthError::Store(_) => "store_error",
            AuthError::Repository(_) => "repository_error",
            AuthError::PasswordHash(_) => "password_hash_error",
            AuthError::Config(_) => "config_error",
        }
    }

    /// True for failures of supporting infrastructure rather than of the caller.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            AuthError::Signing(_)
                | AuthError::Store(_)
                | AuthError::Repository(_)
                | AuthError::PasswordHash(_)
                | AuthError::Config(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniqueness_conflicts_map_to_caller_errors() {
        assert_eq!(
            AuthError::from(RepositoryError::Conflict(UniqueField::Email)),
            AuthError::EmailAlreadyExists
        );
        assert_eq!(
            AuthError::from(RepositoryError::Conflict(UniqueField::Username)),
            AuthError::UsernameAlreadyExists
        );

        let err = AuthError::from(RepositoryError::Conflict(UniqueField::TenantCode));
        assert!(err.is_internal());
        assert!(AuthError::from(RepositoryError::NotFound).is_internal());
    }
}

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tenantry_core::{TenantId, UserId};

use crate::user::User;
use crate::{AuthError, Role};

/// Which lifecycle a token belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

impl core::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The identity an access token is minted for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSubject {
    pub user_id: UserId,
    pub username: String,
    pub email: String,
    /// `None` for system administrators.
    pub tenant_id: Option<TenantId>,
    pub roles: BTreeSet<Role>,
    pub is_admin: bool,
}

impl TokenSubject {
    /// Subject for the current state of a user record.
    pub fn from_user(user: &User) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            tenant_id: user.tenant_id,
            roles: user.roles.iter().cloned().collect(),
            is_admin: user.is_system_admin(),
        }
    }
}

/// Signed token payload.
///
/// Immutable once signed; a `TokenClaims` value only ever comes out of
/// `TokenService::validate` after the signature checked out. Timestamps are
/// whole seconds on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (user id).
    pub sub: UserId,

    /// Tenant the token is scoped to; `None` means system administrator.
    pub tenant_id: Option<TenantId>,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub email: String,

    /// Granted role names. Always empty on refresh tokens.
    #[serde(default)]
    pub roles: BTreeSet<Role>,

    #[serde(default)]
    pub is_admin: bool,

    pub token_type: TokenKind,

    #[serde(rename = "iat", with = "chrono::serde::ts_seconds")]
    pub issued_at: DateTime<Utc>,

    #[serde(rename = "exp", with = "chrono::serde::ts_seconds")]
    pub expires_at: DateTime<Utc>,

    #[serde(rename = "nbf", with = "chrono::serde::ts_seconds")]
    pub not_before: DateTime<Utc>,

    #[serde(rename = "iss")]
    pub issuer: String,

    /// Unique token id; keeps two tokens minted in the same second distinct.
    pub jti: Uuid,
}

impl TokenClaims {
    pub fn is_access(&self) -> bool {
        self.token_type == TokenKind::Access
    }

    pub fn is_refresh(&self) -> bool {
        self.token_type == TokenKind::Refresh
    }

    /// Time left before expiry (zero once expired).
    pub fn remaining(&self, now: DateTime<Utc>) -> chrono::Duration {
        (self.expires_at - now).max(chrono::Duration::zero())
    }
}

/// Deterministically validate the time window of decoded claims.
///
/// Signature verification happens before this in `TokenService`; here only the
/// timestamps are checked, with zero clock-skew tolerance.
pub fn validate_claims(claims: &TokenClaims, now: DateTime<Utc>) -> Result<(), AuthError> {
    if claims.expires_at <= claims.issued_at {
        return Err(AuthError::InvalidToken);
    }
    if now < claims.not_before {
        return Err(AuthError::InvalidToken);
    }
    if now >= claims.expires_at {
        return Err(AuthError::ExpiredToken);
    }
    Ok(())
}

//! Signed bearer tokens: issuance, validation and revocation.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SubsecRound, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use tenantry_core::{Clock, TenantId, UserId};

use crate::claims::{TokenClaims, TokenKind, TokenSubject, validate_claims};
use crate::store::{BLACKLIST_SENTINEL, RevocationStore, blacklist_key};
use crate::{AuthError, AuthResult};

pub const DEFAULT_ISSUER: &str = "tenantry";
pub const DEFAULT_ACCESS_TTL: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_REFRESH_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Signing secret and expiry policy.
#[derive(Clone)]
pub struct TokenConfig {
    pub secret: String,
    pub issuer: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl TokenConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            issuer: DEFAULT_ISSUER.to_string(),
            access_ttl: DEFAULT_ACCESS_TTL,
            refresh_ttl: DEFAULT_REFRESH_TTL,
        }
    }
}

impl core::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish()
    }
}

/// Access + refresh token pair handed to a client after login or refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access-token lifetime in seconds.
    pub expires_in: i64,
}

/// Issues, validates and revokes HMAC-signed tokens.
///
/// Owns the signing secret and the expiry policy. Blacklist lookups go through
/// the injected [`RevocationStore`]; `validate` itself never touches the store.
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    access_ttl: chrono::Duration,
    refresh_ttl: chrono::Duration,
    store: Arc<dyn RevocationStore>,
    clock: Arc<dyn Clock>,
}

impl TokenService {
    /// Build the service. A missing secret is a startup error, never a
    /// per-request one.
    pub fn new(
        config: TokenConfig,
        store: Arc<dyn RevocationStore>,
        clock: Arc<dyn Clock>,
    ) -> AuthResult<Self> {
        if config.secret.trim().is_empty() {
            return Err(AuthError::Config("token signing secret is not configured".to_string()));
        }

        let access_ttl = to_chrono(config.access_ttl, "access ttl")?;
        let refresh_ttl = to_chrono(config.refresh_ttl, "refresh ttl")?;
        if access_ttl <= chrono::Duration::zero() || refresh_ttl <= chrono::Duration::zero() {
            return Err(AuthError::Config("token ttls must be positive".to_string()));
        }

        // Expiry and not-before are checked by `validate_claims` against the
        // injected clock, not by jsonwebtoken against the wall clock.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.leeway = 0;
        validation.set_issuer(&[config.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "nbf", "sub", "iss"]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            issuer: config.issuer,
            access_ttl,
            refresh_ttl,
            store,
            clock,
        })
    }

    pub fn access_ttl(&self) -> chrono::Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> chrono::Duration {
        self.refresh_ttl
    }

    pub fn ttl_for(&self, kind: TokenKind) -> chrono::Duration {
        match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn issue_access_token(&self, subject: &TokenSubject) -> AuthResult<String> {
        let now = self.now();
        let claims = TokenClaims {
            sub: subject.user_id,
            tenant_id: subject.tenant_id,
            username: subject.username.clone(),
            email: subject.email.clone(),
            roles: subject.roles.clone(),
            is_admin: subject.is_admin,
            token_type: TokenKind::Access,
            issued_at: now,
            expires_at: now + self.access_ttl,
            not_before: now,
            issuer: self.issuer.clone(),
            jti: Uuid::now_v7(),
        };
        self.sign(&claims)
    }

    /// Refresh tokens carry no roles; they are re-resolved at refresh time.
    pub fn issue_refresh_token(
        &self,
        user_id: UserId,
        tenant_id: Option<TenantId>,
    ) -> AuthResult<String> {
        let now = self.now();
        let claims = TokenClaims {
            sub: user_id,
            tenant_id,
            username: String::new(),
            email: String::new(),
            roles: BTreeSet::new(),
            is_admin: false,
            token_type: TokenKind::Refresh,
            issued_at: now,
            expires_at: now + self.refresh_ttl,
            not_before: now,
            issuer: self.issuer.clone(),
            jti: Uuid::now_v7(),
        };
        self.sign(&claims)
    }

    pub fn issue_pair(&self, subject: &TokenSubject) -> AuthResult<TokenPair> {
        Ok(TokenPair {
            access_token: self.issue_access_token(subject)?,
            refresh_token: self.issue_refresh_token(subject.user_id, subject.tenant_id)?,
            token_type: "Bearer".to_string(),
            expires_in: self.access_ttl.num_seconds(),
        })
    }

    /// Verify signature, shape and expiry.
    ///
    /// Does **not** consult the blacklist; callers that need revocation
    /// semantics follow up with [`TokenService::check_blacklist`].
    pub fn validate(&self, token: &str) -> AuthResult<TokenClaims> {
        let claims = self.decode(token)?;
        validate_claims(&claims, self.clock.now())?;
        Ok(claims)
    }

    /// Fails with `BlacklistedToken` if the token was revoked.
    ///
    /// Fails open: if the store is unreachable the token is treated as not
    /// revoked.
    pub fn check_blacklist(&self, token: &str) -> AuthResult<()> {
        match self.store.exists(&blacklist_key(token)) {
            Ok(true) => Err(AuthError::BlacklistedToken),
            Ok(false) => Ok(()),
            Err(e) => {
                warn!(error = %e, "blacklist lookup failed; treating token as not revoked");
                Ok(())
            }
        }
    }

    /// Blacklist a token for the rest of its natural lifetime.
    ///
    /// The entry TTL is the remaining validity, capped at the TTL of the
    /// token's kind, so entries never outlive the token they block. Already
    /// expired tokens need no entry.
    pub fn revoke(&self, token: &str) -> AuthResult<()> {
        let claims = self.decode(token)?;
        let now = self.clock.now();

        let remaining = claims.remaining(now).min(self.ttl_for(claims.token_type));
        if remaining <= chrono::Duration::zero() {
            debug!(kind = %claims.token_type, "token already expired; nothing to revoke");
            return Ok(());
        }

        let ttl = remaining
            .to_std()
            .map_err(|e| AuthError::Config(format!("revocation ttl out of range: {e}")))?;
        self.store
            .set_ex(&blacklist_key(token), BLACKLIST_SENTINEL, ttl)?;

        debug!(
            user_id = %claims.sub,
            kind = %claims.token_type,
            ttl_secs = ttl.as_secs(),
            "token revoked"
        );
        Ok(())
    }

    fn sign(&self, claims: &TokenClaims) -> AuthResult<String> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }

    fn decode(&self, token: &str) -> AuthResult<TokenClaims> {
        jsonwebtoken::decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!(error = %e, "token rejected");
                AuthError::InvalidToken
            })
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now().trunc_subsecs(0)
    }
}

fn to_chrono(d: Duration, what: &str) -> AuthResult<chrono::Duration> {
    chrono::Duration::from_std(d).map_err(|e| AuthError::Config(format!("{what}: {e}")))
}

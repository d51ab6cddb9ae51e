//! Per-request authentication pipeline.
//!
//! `Unauthenticated → TokenExtracted → TokenValidated → IdentityResolved →
//! Authorized`, or a rejection at any stage. Checks run cheapest first:
//! signature and expiry, then the blacklist, then the repository lookups.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{error, instrument, warn};

use tenantry_core::{TenantId, UserId};

use crate::claims::TokenClaims;
use crate::repository::{TenantRepository, UserRepository};
use crate::token::TokenService;
use crate::user::{Tenant, User, UserStatus};
use crate::{AuthError, AuthResult, AuthorizationContext};

/// Routes reachable without a credential.
pub const DEFAULT_PUBLIC_ROUTES: &[&str] = &["/health", "/auth/login", "/auth/register", "/auth/refresh"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStage {
    Unauthenticated,
    TokenExtracted,
    TokenValidated,
    IdentityResolved,
    Authorized,
}

impl AuthStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthStage::Unauthenticated => "unauthenticated",
            AuthStage::TokenExtracted => "token_extracted",
            AuthStage::TokenValidated => "token_validated",
            AuthStage::IdentityResolved => "identity_resolved",
            AuthStage::Authorized => "authorized",
        }
    }
}

impl core::fmt::Display for AuthStage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exact-match allow-list of public paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicRoutes(BTreeSet<String>);

impl PublicRoutes {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(paths.into_iter().map(Into::into).collect())
    }

    pub fn is_public(&self, path: &str) -> bool {
        let path = match path.strip_suffix('/') {
            Some(p) if !p.is_empty() => p,
            _ => path,
        };
        self.0.contains(path)
    }
}

impl Default for PublicRoutes {
    fn default() -> Self {
        Self::new(DEFAULT_PUBLIC_ROUTES.iter().copied())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Public route; no context was built.
    Public,
    Authorized(AuthorizationContext),
}

/// Pull the token out of an `Authorization: Bearer <token>` header value.
pub fn extract_bearer(header: Option<&str>) -> AuthResult<&str> {
    let header = header.ok_or(AuthError::MissingAuthorization)?;

    let (scheme, token) = header
        .trim()
        .split_once(' ')
        .ok_or(AuthError::MalformedAuthorization)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::MalformedAuthorization);
    }

    let token = token.trim();
    if token.is_empty() || token.contains(char::is_whitespace) {
        return Err(AuthError::MalformedAuthorization);
    }

    Ok(token)
}

/// Re-reads the user and tenant a credential names, so deactivations after
/// issuance take effect immediately.
#[derive(Clone)]
pub struct IdentityResolver {
    users: Arc<dyn UserRepository>,
    tenants: Arc<dyn TenantRepository>,
}

impl IdentityResolver {
    pub fn new(users: Arc<dyn UserRepository>, tenants: Arc<dyn TenantRepository>) -> Self {
        Self { users, tenants }
    }

    /// Resolve `user_id` and check the account and its tenant are active.
    ///
    /// `token_tenant` is the tenant the credential was minted for; a user
    /// whose record no longer matches it is treated as an unknown subject.
    pub fn resolve(
        &self,
        user_id: UserId,
        token_tenant: Option<TenantId>,
    ) -> AuthResult<(User, Option<Tenant>)> {
        let user = self
            .users
            .get_by_id(user_id)?
            .ok_or(AuthError::InvalidToken)?;

        if user.tenant_id != token_tenant {
            warn!(%user_id, "token tenant does not match user record");
            return Err(AuthError::InvalidToken);
        }

        check_user_status(&user)?;

        let tenant = match user.tenant_id {
            Some(tenant_id) => Some(self.active_tenant(tenant_id)?),
            None => None,
        };

        Ok((user, tenant))
    }

    pub fn active_tenant(&self, tenant_id: TenantId) -> AuthResult<Tenant> {
        let tenant = self
            .tenants
            .get_by_id(tenant_id)?
            .ok_or(AuthError::TenantNotFound)?;
        if !tenant.is_active() {
            return Err(AuthError::TenantSuspended);
        }
        Ok(tenant)
    }
}

pub(crate) fn check_user_status(user: &User) -> AuthResult<()> {
    match user.status {
        UserStatus::Active => Ok(()),
        UserStatus::Inactive => Err(AuthError::UserInactive),
        UserStatus::Locked => Err(AuthError::UserLocked),
    }
}

/// Middleware entry point: turns a path and an authorization header into an
/// [`AuthorizationContext`] or a typed rejection.
pub struct RequestAuthenticator {
    tokens: Arc<TokenService>,
    identities: IdentityResolver,
    public_routes: PublicRoutes,
}

impl RequestAuthenticator {
    pub fn new(
        tokens: Arc<TokenService>,
        users: Arc<dyn UserRepository>,
        tenants: Arc<dyn TenantRepository>,
    ) -> Self {
        Self {
            tokens,
            identities: IdentityResolver::new(users, tenants),
            public_routes: PublicRoutes::default(),
        }
    }

    pub fn with_public_routes(mut self, routes: PublicRoutes) -> Self {
        self.public_routes = routes;
        self
    }

    pub fn public_routes(&self) -> &PublicRoutes {
        &self.public_routes
    }

    #[instrument(name = "authenticate", skip(self, authorization))]
    pub fn authenticate(&self, path: &str, authorization: Option<&str>) -> AuthResult<AuthOutcome> {
        if self.public_routes.is_public(path) {
            return Ok(AuthOutcome::Public);
        }

        let mut stage = AuthStage::Unauthenticated;
        match self.run(&mut stage, authorization) {
            Ok(ctx) => Ok(AuthOutcome::Authorized(ctx)),
            Err(e) if e.is_internal() => {
                error!(%stage, code = e.code(), error = %e, "authentication failed");
                Err(e)
            }
            Err(e) => {
                warn!(%stage, code = e.code(), "authentication rejected");
                Err(e)
            }
        }
    }

    fn run(&self, stage: &mut AuthStage, authorization: Option<&str>) -> AuthResult<AuthorizationContext> {
        let token = extract_bearer(authorization)?;
        *stage = AuthStage::TokenExtracted;

        let claims = self.validate_access(token)?;
        *stage = AuthStage::TokenValidated;

        let (user, tenant) = self.identities.resolve(claims.sub, claims.tenant_id)?;
        *stage = AuthStage::IdentityResolved;

        let ctx = AuthorizationContext::new(user, tenant, claims);
        *stage = AuthStage::Authorized;
        Ok(ctx)
    }

    fn validate_access(&self, token: &str) -> AuthResult<TokenClaims> {
        let claims = self.tokens.validate(token)?;
        if !claims.is_access() {
            return Err(AuthError::InvalidToken);
        }
        self.tokens.check_blacklist(token)?;
        Ok(claims)
    }
}

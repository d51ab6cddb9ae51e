//! Login, refresh, logout and registration flows.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use tenantry_core::TenantId;

use crate::authenticator::{check_user_status, IdentityResolver};
use crate::claims::TokenSubject;
use crate::password::PasswordHasher;
use crate::repository::{TenantRepository, UserRepository};
use crate::throttle::LoginThrottle;
use crate::token::{TokenPair, TokenService};
use crate::user::{Tenant, User};
use crate::{AuthError, AuthResult, Role};

/// Credential flows built on top of the token service, the throttle and the
/// repositories.
pub struct SessionService {
    tokens: Arc<TokenService>,
    throttle: Arc<LoginThrottle>,
    hasher: PasswordHasher,
    users: Arc<dyn UserRepository>,
    identities: IdentityResolver,
    tenants: Arc<dyn TenantRepository>,
}

impl SessionService {
    pub fn new(
        tokens: Arc<TokenService>,
        throttle: Arc<LoginThrottle>,
        users: Arc<dyn UserRepository>,
        tenants: Arc<dyn TenantRepository>,
    ) -> Self {
        Self {
            tokens,
            throttle,
            hasher: PasswordHasher::new(),
            identities: IdentityResolver::new(users.clone(), tenants.clone()),
            users,
            tenants,
        }
    }

    pub fn hasher(&self) -> &PasswordHasher {
        &self.hasher
    }

    /// Password login. `tenant_code == None` logs in a system administrator.
    #[instrument(skip(self, password))]
    pub fn login(
        &self,
        tenant_code: Option<&str>,
        email: &str,
        password: &str,
    ) -> AuthResult<TokenPair> {
        let tenant_id = match tenant_code {
            Some(code) => Some(self.active_tenant_by_code(code)?.id),
            None => None,
        };

        let Some(mut user) = self.users.get_by_email(tenant_id, email)? else {
            warn!(tenant = ?tenant_code, "login for unknown email");
            return Err(AuthError::InvalidCredentials);
        };

        self.throttle.check_allowed(user.id)?;
        check_user_status(&user)?;

        if !self.hasher.verify(password, &user.password_hash)? {
            let attempts = self.throttle.record_failure(user.id);
            warn!(user_id = %user.id, ?attempts, "login failed: wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        self.throttle.clear(user.id);
        user.last_login_at = Some(self.tokens.clock().now());
        self.users.update(&user)?;

        let pair = self.tokens.issue_pair(&TokenSubject::from_user(&user))?;
        info!(user_id = %user.id, tenant_id = ?user.tenant_id, "login succeeded");
        Ok(pair)
    }

    /// Exchange a refresh token for a new pair and revoke the presented one.
    ///
    /// Roles come from the current user record, never from the old token.
    #[instrument(skip_all)]
    pub fn refresh(&self, refresh_token: &str) -> AuthResult<TokenPair> {
        let claims = self.tokens.validate(refresh_token)?;
        if !claims.is_refresh() {
            return Err(AuthError::InvalidToken);
        }
        self.tokens.check_blacklist(refresh_token)?;

        let (user, _tenant) = self.identities.resolve(claims.sub, claims.tenant_id)?;

        let pair = self.tokens.issue_pair(&TokenSubject::from_user(&user))?;
        self.tokens.revoke(refresh_token)?;

        info!(user_id = %user.id, "refresh token rotated");
        Ok(pair)
    }

    /// Revoke the access token and, when given, the refresh token.
    ///
    /// The refresh token must be a refresh token issued to the same subject.
    /// Both are checked before anything is revoked, so a rejected logout
    /// leaves both tokens untouched.
    #[instrument(skip_all)]
    pub fn logout(&self, access_token: &str, refresh_token: Option<&str>) -> AuthResult<()> {
        let access = self.tokens.validate(access_token)?;
        if !access.is_access() {
            return Err(AuthError::InvalidToken);
        }

        if let Some(refresh_token) = refresh_token {
            let refresh = self.tokens.validate(refresh_token)?;
            if !refresh.is_refresh() || refresh.sub != access.sub {
                warn!(user_id = %access.sub, "logout with a refresh token not owned by the caller");
                return Err(AuthError::InvalidToken);
            }
        }

        self.tokens.revoke(access_token)?;
        if let Some(refresh_token) = refresh_token {
            self.tokens.revoke(refresh_token)?;
        }
        info!(user_id = %access.sub, with_refresh = refresh_token.is_some(), "logged out");
        Ok(())
    }

    /// Create an active tenant user with the default role.
    #[instrument(skip(self, password))]
    pub fn register(
        &self,
        tenant_code: &str,
        username: &str,
        email: &str,
        password: &str,
    ) -> AuthResult<User> {
        let tenant = self.active_tenant_by_code(tenant_code)?;
        self.provision_user(Some(tenant.id), username, email, password, [Role::USER])
    }

    /// Create an active user in `tenant_id` (or a system administrator for
    /// `None`) after checking uniqueness within that scope.
    ///
    /// The target tenant must exist and be active. The lookups up front only
    /// skip hashing for obvious clashes; the repository insert is what
    /// enforces uniqueness.
    #[instrument(skip(self, password, roles))]
    pub fn provision_user(
        &self,
        tenant_id: Option<TenantId>,
        username: &str,
        email: &str,
        password: &str,
        roles: impl IntoIterator<Item = Role>,
    ) -> AuthResult<User> {
        if let Some(tenant_id) = tenant_id {
            self.identities.active_tenant(tenant_id)?;
        }

        if self.users.get_by_email(tenant_id, email)?.is_some() {
            return Err(AuthError::EmailAlreadyExists);
        }
        if self.users.get_by_username(tenant_id, username)?.is_some() {
            return Err(AuthError::UsernameAlreadyExists);
        }

        let hash = self.hasher.hash(password)?;
        let user = match tenant_id {
            Some(tenant_id) => User::new(tenant_id, username, email, hash),
            None => User::system_admin(username, email, hash),
        }
        .with_roles(roles);
        let user = self.users.create(user)?;

        info!(user_id = %user.id, tenant_id = ?user.tenant_id, "user provisioned");
        Ok(user)
    }

    fn active_tenant_by_code(&self, code: &str) -> AuthResult<Tenant> {
        let tenant = self
            .tenants
            .get_by_code(code)?
            .ok_or(AuthError::TenantNotFound)?;
        if !tenant.is_active() {
            return Err(AuthError::TenantSuspended);
        }
        Ok(tenant)
    }
}

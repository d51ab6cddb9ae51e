//! Service wiring shared by every handler.

use std::sync::Arc;

use tracing::info;

use tenantry_auth::{
    AuthError, AuthResult, InMemoryTenantRepository, InMemoryUserRepository, LoginThrottle,
    RepositoryError, RequestAuthenticator, RevocationStore, Role, SessionService, Tenant,
    TenantIsolationFilter, TenantRepository, TokenService, UniqueField, User, UserRepository,
};
use tenantry_core::{Clock, SystemClock};
use tenantry_infra::{AppConfig, BootstrapAdmin, RequestRateLimiter, build_revocation_store};

use crate::app::errors::{ApiError, ApiResult};

pub struct AppServices {
    pub tokens: Arc<TokenService>,
    pub authenticator: Arc<RequestAuthenticator>,
    pub sessions: Arc<SessionService>,
    pub isolation: TenantIsolationFilter,
    pub users: Arc<InMemoryUserRepository>,
    pub tenants: Arc<InMemoryTenantRepository>,
    pub limiter: Arc<RequestRateLimiter>,
}

impl AppServices {
    /// Wire everything around an already chosen store and clock.
    pub fn new(
        config: &AppConfig,
        store: Arc<dyn RevocationStore>,
        clock: Arc<dyn Clock>,
    ) -> AuthResult<Self> {
        let tokens = Arc::new(TokenService::new(config.token.clone(), store.clone(), clock)?);
        let throttle = Arc::new(LoginThrottle::new(store, config.throttle));

        let users = Arc::new(InMemoryUserRepository::new());
        let tenants = Arc::new(InMemoryTenantRepository::new());
        let user_repo: Arc<dyn UserRepository> = users.clone();
        let tenant_repo: Arc<dyn TenantRepository> = tenants.clone();

        let authenticator = Arc::new(RequestAuthenticator::new(
            tokens.clone(),
            user_repo.clone(),
            tenant_repo.clone(),
        ));
        let sessions = Arc::new(SessionService::new(
            tokens.clone(),
            throttle,
            user_repo,
            tenant_repo,
        ));

        Ok(Self {
            tokens,
            authenticator,
            sessions,
            isolation: TenantIsolationFilter::default(),
            users,
            tenants,
            limiter: Arc::new(RequestRateLimiter::new(config.rate_limit)),
        })
    }

    /// Production wiring: store from `REDIS_URL`, wall clock.
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let store = build_revocation_store(
            config.redis_url.as_deref(),
            config.redis_timeout,
            clock.clone(),
        )?;
        Ok(Self::new(config, store, clock)?)
    }

    /// Create a tenant. `None` when the code is already taken.
    pub fn create_tenant(&self, code: &str, name: &str) -> AuthResult<Option<Tenant>> {
        match TenantRepository::create(self.tenants.as_ref(), Tenant::new(code, name)) {
            Ok(tenant) => {
                info!(tenant_id = %tenant.id, code, "tenant created");
                Ok(Some(tenant))
            }
            Err(RepositoryError::Conflict(UniqueField::TenantCode)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Ensure the configured system administrator exists.
    pub fn bootstrap_admin(&self, admin: &BootstrapAdmin) -> AuthResult<User> {
        if let Some(existing) = self.users.get_by_email(None, &admin.email)? {
            return Ok(existing);
        }
        match self.sessions.provision_user(
            None,
            &admin.username,
            &admin.email,
            &admin.password,
            [Role::ADMIN],
        ) {
            Ok(user) => {
                info!(user_id = %user.id, "bootstrap system admin created");
                Ok(user)
            }
            Err(AuthError::UsernameAlreadyExists) => Err(AuthError::Config(format!(
                "bootstrap admin username '{}' is taken",
                admin.username
            ))),
            Err(e) => Err(e),
        }
    }
}

/// Run a core call on the blocking pool.
///
/// Store round-trips and Argon2 both block; nothing that can touch them runs
/// on an async worker.
pub async fn run_blocking<T, F>(services: &Arc<AppServices>, f: F) -> ApiResult<T>
where
    F: FnOnce(&AppServices) -> AuthResult<T> + Send + 'static,
    T: Send + 'static,
{
    let services = services.clone();
    tokio::task::spawn_blocking(move || f(&services))
        .await
        .map_err(|e| ApiError::Task(e.to_string()))?
        .map_err(ApiError::from)
}

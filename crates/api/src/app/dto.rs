use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tenantry_auth::{AuthorizationContext, Tenant, TenantStatus, User, UserStatus};
use tenantry_core::{TenantId, UserId};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Omitted for system administrators.
    #[serde(default)]
    pub tenant_code: Option<String>,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub tenant_code: String,
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct LogoutRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTenantRequest {
    pub code: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct WhoAmI {
    pub user_id: UserId,
    pub tenant_id: Option<TenantId>,
    pub username: String,
    pub roles: Vec<String>,
    pub is_system_admin: bool,
}

impl From<&AuthorizationContext> for WhoAmI {
    fn from(ctx: &AuthorizationContext) -> Self {
        let user = ctx.current_user();
        Self {
            user_id: user.id,
            tenant_id: user.tenant_id,
            username: user.username.clone(),
            roles: user.roles.iter().map(|r| r.as_str().to_string()).collect(),
            is_system_admin: ctx.is_system_admin(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserView {
    pub id: UserId,
    pub tenant_id: Option<TenantId>,
    pub username: String,
    pub email: String,
    pub roles: Vec<String>,
    pub status: UserStatus,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            tenant_id: user.tenant_id,
            username: user.username,
            email: user.email,
            roles: user.roles.iter().map(|r| r.as_str().to_string()).collect(),
            status: user.status,
            last_login_at: user.last_login_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TenantView {
    pub id: TenantId,
    pub code: String,
    pub name: String,
    pub status: TenantStatus,
}

impl From<Tenant> for TenantView {
    fn from(t: Tenant) -> Self {
        Self {
            id: t.id,
            code: t.code,
            name: t.name,
            status: t.status,
        }
    }
}

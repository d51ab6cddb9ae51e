use std::collections::BTreeSet;

use tenantry_core::{TenantId, UserId};

use crate::claims::TokenClaims;
use crate::user::{Tenant, User};
use crate::Role;

/// Request-scoped result of a successful authentication.
///
/// Built once per request by `RequestAuthenticator` from the *current* user
/// and tenant records (not from the token claims), then only read. Nothing
/// mutates it after construction and it is never shared across requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationContext {
    user: User,
    tenant: Option<Tenant>,
    claims: TokenClaims,
    is_system_admin: bool,
}

impl AuthorizationContext {
    /// The system-admin flag is derived from the resolved user: a user with no
    /// tenant affiliation is a system administrator.
    pub fn new(user: User, tenant: Option<Tenant>, claims: TokenClaims) -> Self {
        let is_system_admin = user.is_system_admin();
        Self {
            user,
            tenant,
            claims,
            is_system_admin,
        }
    }

    pub fn current_user(&self) -> &User {
        &self.user
    }

    pub fn current_tenant(&self) -> Option<&Tenant> {
        self.tenant.as_ref()
    }

    pub fn claims(&self) -> &TokenClaims {
        &self.claims
    }

    pub fn user_id(&self) -> UserId {
        self.user.id
    }

    /// The caller's own tenant (`None` for system administrators).
    pub fn tenant_id(&self) -> Option<TenantId> {
        self.user.tenant_id
    }

    /// Roles re-resolved from the user record.
    pub fn roles(&self) -> BTreeSet<&Role> {
        self.user.roles.iter().collect()
    }

    pub fn has_role(&self, name: &str) -> bool {
        self.user.roles.iter().any(|r| r.as_str() == name)
    }

    pub fn is_system_admin(&self) -> bool {
        self.is_system_admin
    }

    pub fn require_role(&self, name: &str) -> crate::AuthResult<()> {
        crate::authorize::require_role(self, name)
    }

    pub fn require_system_admin(&self) -> crate::AuthResult<()> {
        crate::authorize::require_system_admin(self)
    }
}

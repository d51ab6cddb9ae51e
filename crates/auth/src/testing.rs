//! Test doubles shared by the unit tests of this crate.

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use uuid::Uuid;

use crate::claims::{TokenClaims, TokenKind};
use crate::store::{RevocationStore, StoreError};
use crate::user::{Tenant, User};
use crate::{AuthorizationContext, Role};

/// Store whose every call fails, simulating an outage.
pub(crate) struct UnavailableStore;

fn down() -> StoreError {
    StoreError::Unavailable("connection refused".to_string())
}

impl RevocationStore for UnavailableStore {
    fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Err(down())
    }

    fn set_ex(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), StoreError> {
        Err(down())
    }

    fn incr(&self, _key: &str) -> Result<i64, StoreError> {
        Err(down())
    }

    fn expire(&self, _key: &str, _ttl: Duration) -> Result<bool, StoreError> {
        Err(down())
    }

    fn delete(&self, _key: &str) -> Result<(), StoreError> {
        Err(down())
    }
}

pub(crate) fn access_claims_for(user: &User) -> TokenClaims {
    let now = Utc::now();
    TokenClaims {
        sub: user.id,
        tenant_id: user.tenant_id,
        username: user.username.clone(),
        email: user.email.clone(),
        roles: user.roles.iter().cloned().collect::<BTreeSet<_>>(),
        is_admin: user.is_system_admin(),
        token_type: TokenKind::Access,
        issued_at: now,
        expires_at: now + ChronoDuration::hours(1),
        not_before: now,
        issuer: "tenantry".to_string(),
        jti: Uuid::now_v7(),
    }
}

/// Context for a user of `tenant` holding `roles`.
pub(crate) fn tenant_context(tenant: &Tenant, roles: &[&str]) -> AuthorizationContext {
    let user = User::new(tenant.id, "alice", "alice@example.com", "h")
        .with_roles(roles.iter().map(|r| Role::from(*r)));
    let claims = access_claims_for(&user);
    AuthorizationContext::new(user, Some(tenant.clone()), claims)
}

/// Context for a system administrator with no explicit roles.
pub(crate) fn admin_context() -> AuthorizationContext {
    let user = User::system_admin("root", "root@example.com", "h").with_roles([]);
    let claims = access_claims_for(&user);
    AuthorizationContext::new(user, None, claims)
}

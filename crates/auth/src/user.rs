//! Identity entities read by the auth boundary.
//!
//! Users and tenants are owned and persisted by the CRUD layer. The auth core
//! only reads them (through the repositories) to decide whether a credential
//! still names an active account, and writes back through `UserRepository`
//! for login bookkeeping and registration.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tenantry_core::{DomainError, Entity, TenantId, UserId};

use crate::Role;

// ─────────────────────────────────────────────────────────────────────────────
// User Status
// ─────────────────────────────────────────────────────────────────────────────

/// User account status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    /// User can authenticate.
    #[default]
    Active,
    /// Deactivated by an administrator.
    Inactive,
    /// Locked (e.g. by an administrator after abuse).
    Locked,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Inactive => "inactive",
            UserStatus::Locked => "locked",
        }
    }
}

impl core::fmt::Display for UserStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(UserStatus::Active),
            "inactive" => Ok(UserStatus::Inactive),
            "locked" => Ok(UserStatus::Locked),
            other => Err(DomainError::unknown_variant("user status", other)),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tenant Status
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TenantStatus {
    #[default]
    Active,
    Suspended,
    Disabled,
}

impl TenantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TenantStatus::Active => "active",
            TenantStatus::Suspended => "suspended",
            TenantStatus::Disabled => "disabled",
        }
    }
}

impl core::fmt::Display for TenantStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TenantStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(TenantStatus::Active),
            "suspended" => Ok(TenantStatus::Suspended),
            "disabled" => Ok(TenantStatus::Disabled),
            other => Err(DomainError::unknown_variant("tenant status", other)),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// User
// ─────────────────────────────────────────────────────────────────────────────

/// A user account.
///
/// # Invariants
/// - `tenant_id == None` means the user is a system administrator.
/// - `tenant_id` never changes after creation.
/// - Email and username are unique within a tenant scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub tenant_id: Option<TenantId>,
    pub username: String,
    pub email: String,
    /// Never serialized; reads back as empty.
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub roles: Vec<Role>,
    pub status: UserStatus,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl User {
    /// A new active tenant user.
    pub fn new(
        tenant_id: TenantId,
        username: impl Into<String>,
        email: impl Into<String>,
        password_hash: impl Into<String>,
    ) -> Self {
        Self {
            id: UserId::new(),
            tenant_id: Some(tenant_id),
            username: username.into(),
            email: normalize_email(&email.into()),
            password_hash: password_hash.into(),
            roles: vec![Role::USER],
            status: UserStatus::Active,
            last_login_at: None,
        }
    }

    /// A new active system administrator (no tenant affiliation).
    pub fn system_admin(
        username: impl Into<String>,
        email: impl Into<String>,
        password_hash: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: None,
            roles: vec![Role::ADMIN],
            ..Self::new(TenantId::new(), username, email, password_hash)
        }
    }

    pub fn with_roles(mut self, roles: impl IntoIterator<Item = Role>) -> Self {
        self.roles = roles.into_iter().collect();
        self
    }

    pub fn with_status(mut self, status: UserStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_system_admin(&self) -> bool {
        self.tenant_id.is_none()
    }

    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }
}

impl Entity for User {
    type Id = UserId;

    fn id(&self) -> UserId {
        self.id
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tenant
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    /// Short unique code used at login (e.g. "acme").
    pub code: String,
    pub name: String,
    pub status: TenantStatus,
}

impl Tenant {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: TenantId::new(),
            code: code.into(),
            name: name.into(),
            status: TenantStatus::Active,
        }
    }

    pub fn with_status(mut self, status: TenantStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == TenantStatus::Active
    }
}

impl Entity for Tenant {
    type Id = TenantId;

    fn id(&self) -> TenantId {
        self.id
    }
}

/// Emails compare case-insensitively and ignore surrounding whitespace.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

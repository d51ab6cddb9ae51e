//! Collaborator interfaces for identity freshness lookups.
//!
//! The storage format belongs to the CRUD layer; the core only needs these
//! narrow lookups. In-memory implementations back the tests and dev mode.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use thiserror::Error;

use tenantry_core::{TenantId, UserId};

use crate::user::{Tenant, User, normalize_email};

/// Column whose uniqueness a write would break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniqueField {
    Email,
    Username,
    TenantCode,
}

impl core::fmt::Display for UniqueField {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            UniqueField::Email => "email",
            UniqueField::Username => "username",
            UniqueField::TenantCode => "tenant code",
        })
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("record not found")]
    NotFound,

    #[error("{0} already exists")]
    Conflict(UniqueField),

    #[error("storage error: {0}")]
    Storage(String),
}

/// User lookups and writes consumed by the auth core.
pub trait UserRepository: Send + Sync {
    fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError>;

    /// Find a user by email within a tenant scope (`None` = system administrators).
    fn get_by_email(
        &self,
        tenant_id: Option<TenantId>,
        email: &str,
    ) -> Result<Option<User>, RepositoryError>;

    fn get_by_username(
        &self,
        tenant_id: Option<TenantId>,
        username: &str,
    ) -> Result<Option<User>, RepositoryError>;

    /// Insert a new user. Email and username uniqueness within the tenant
    /// scope is checked atomically with the insert; a clash is
    /// `Conflict(Email)` or `Conflict(Username)`.
    fn create(&self, user: User) -> Result<User, RepositoryError>;

    /// Replace an existing user record. Fails with `NotFound` if absent.
    fn update(&self, user: &User) -> Result<(), RepositoryError>;
}

/// Tenant lookups consumed by the auth core.
pub trait TenantRepository: Send + Sync {
    fn get_by_id(&self, id: TenantId) -> Result<Option<Tenant>, RepositoryError>;

    fn get_by_code(&self, code: &str) -> Result<Option<Tenant>, RepositoryError>;

    /// Insert a new tenant; a taken code is `Conflict(TenantCode)`.
    fn create(&self, tenant: Tenant) -> Result<Tenant, RepositoryError>;
}

impl<R> UserRepository for Arc<R>
where
    R: UserRepository + ?Sized,
{
    fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        (**self).get_by_id(id)
    }

    fn get_by_email(
        &self,
        tenant_id: Option<TenantId>,
        email: &str,
    ) -> Result<Option<User>, RepositoryError> {
        (**self).get_by_email(tenant_id, email)
    }

    fn get_by_username(
        &self,
        tenant_id: Option<TenantId>,
        username: &str,
    ) -> Result<Option<User>, RepositoryError> {
        (**self).get_by_username(tenant_id, username)
    }

    fn create(&self, user: User) -> Result<User, RepositoryError> {
        (**self).create(user)
    }

    fn update(&self, user: &User) -> Result<(), RepositoryError> {
        (**self).update(user)
    }
}

impl<R> TenantRepository for Arc<R>
where
    R: TenantRepository + ?Sized,
{
    fn get_by_id(&self, id: TenantId) -> Result<Option<Tenant>, RepositoryError> {
        (**self).get_by_id(id)
    }

    fn get_by_code(&self, code: &str) -> Result<Option<Tenant>, RepositoryError> {
        (**self).get_by_code(code)
    }

    fn create(&self, tenant: Tenant) -> Result<Tenant, RepositoryError> {
        (**self).create(tenant)
    }
}

fn poisoned() -> RepositoryError {
    RepositoryError::Storage("lock poisoned".to_string())
}

// ─────────────────────────────────────────────────────────────────────────────
// In-memory users
// ─────────────────────────────────────────────────────────────────────────────

/// In-memory user repository for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryUserRepository {
    inner: RwLock<HashMap<UserId, User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UserRepository for InMemoryUserRepository {
    fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map.get(&id).cloned())
    }

    fn get_by_email(
        &self,
        tenant_id: Option<TenantId>,
        email: &str,
    ) -> Result<Option<User>, RepositoryError> {
        let email = normalize_email(email);
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map
            .values()
            .find(|u| u.tenant_id == tenant_id && u.email == email)
            .cloned())
    }

    fn get_by_username(
        &self,
        tenant_id: Option<TenantId>,
        username: &str,
    ) -> Result<Option<User>, RepositoryError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map
            .values()
            .find(|u| u.tenant_id == tenant_id && u.username == username)
            .cloned())
    }

    fn create(&self, mut user: User) -> Result<User, RepositoryError> {
        user.email = normalize_email(&user.email);
        let mut map = self.inner.write().map_err(|_| poisoned())?;

        for existing in map.values().filter(|u| u.tenant_id == user.tenant_id) {
            if existing.email == user.email {
                return Err(RepositoryError::Conflict(UniqueField::Email));
            }
            if existing.username == user.username {
                return Err(RepositoryError::Conflict(UniqueField::Username));
            }
        }

        map.insert(user.id, user.clone());
        Ok(user)
    }

    fn update(&self, user: &User) -> Result<(), RepositoryError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        match map.get_mut(&user.id) {
            Some(existing) => {
                *existing = user.clone();
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// In-memory tenants
// ─────────────────────────────────────────────────────────────────────────────

/// In-memory tenant repository for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryTenantRepository {
    inner: RwLock<HashMap<TenantId, Tenant>>,
}

impl InMemoryTenantRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a tenant (seeding; tenant CRUD lives elsewhere).
    pub fn upsert(&self, tenant: Tenant) -> Result<(), RepositoryError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        map.insert(tenant.id, tenant);
        Ok(())
    }
}

impl TenantRepository for InMemoryTenantRepository {
    fn get_by_id(&self, id: TenantId) -> Result<Option<Tenant>, RepositoryError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map.get(&id).cloned())
    }

    fn get_by_code(&self, code: &str) -> Result<Option<Tenant>, RepositoryError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map.values().find(|t| t.code == code).cloned())
    }

    fn create(&self, tenant: Tenant) -> Result<Tenant, RepositoryError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        if map.values().any(|t| t.code == tenant.code) {
            return Err(RepositoryError::Conflict(UniqueField::TenantCode));
        }
        map.insert(tenant.id, tenant.clone());
        Ok(tenant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_lookup_is_scoped_by_tenant() {
        let repo = InMemoryUserRepository::new();
        let tenant_a = TenantId::new();
        let tenant_b = TenantId::new();

        let user = repo
            .create(User::new(tenant_a, "alice", "alice@example.com", "h"))
            .unwrap();

        let found = repo.get_by_email(Some(tenant_a), "ALICE@example.com").unwrap();
        assert_eq!(found.map(|u| u.id), Some(user.id));

        assert!(repo.get_by_email(Some(tenant_b), "alice@example.com").unwrap().is_none());
        assert!(repo.get_by_email(None, "alice@example.com").unwrap().is_none());
    }

    #[test]
    fn update_of_unknown_user_is_not_found() {
        let repo = InMemoryUserRepository::new();
        let user = User::new(TenantId::new(), "ghost", "ghost@example.com", "h");
        assert_eq!(repo.update(&user), Err(RepositoryError::NotFound));
    }

    #[test]
    fn tenant_lookup_by_code() {
        let repo = InMemoryTenantRepository::new();
        let tenant = Tenant::new("acme", "Acme Inc");
        repo.upsert(tenant.clone()).unwrap();

        assert_eq!(repo.get_by_code("acme").unwrap(), Some(tenant.clone()));
        assert_eq!(repo.get_by_id(tenant.id).unwrap(), Some(tenant));
        assert!(repo.get_by_code("globex").unwrap().is_none());
    }

    #[test]
    fn create_rejects_duplicates_within_a_tenant_only() {
        let repo = InMemoryUserRepository::new();
        let tenant_a = TenantId::new();
        let tenant_b = TenantId::new();
        repo.create(User::new(tenant_a, "alice", "alice@example.com", "h")).unwrap();

        assert_eq!(
            repo.create(User::new(tenant_a, "alice2", "Alice@Example.com", "h")),
            Err(RepositoryError::Conflict(UniqueField::Email))
        );
        assert_eq!(
            repo.create(User::new(tenant_a, "alice", "other@example.com", "h")),
            Err(RepositoryError::Conflict(UniqueField::Username))
        );
        assert!(repo.create(User::new(tenant_b, "alice", "alice@example.com", "h")).is_ok());
    }

    #[test]
    fn concurrent_creates_with_one_email_admit_exactly_one() {
        let repo = Arc::new(InMemoryUserRepository::new());
        let tenant = TenantId::new();
        let barrier = Arc::new(std::sync::Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let repo = repo.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    repo.create(User::new(tenant, format!("u{i}"), "dup@example.com", "h"))
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| *e == RepositoryError::Conflict(UniqueField::Email)));
    }

    #[test]
    fn tenant_codes_are_unique() {
        let repo = Arc::new(InMemoryTenantRepository::new());
        let barrier = Arc::new(std::sync::Barrier::new(4));

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let repo = repo.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    repo.create(Tenant::new("acme", format!("Acme {i}")))
                })
            })
            .collect();

        let created = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(Result::is_ok)
            .count();
        assert_eq!(created, 1);
        assert_eq!(
            repo.create(Tenant::new("acme", "Again")),
            Err(RepositoryError::Conflict(UniqueField::TenantCode))
        );
    }
}

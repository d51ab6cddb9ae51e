//! Shared key/value store with per-key expiry.
//!
//! This is the only shared mutable state the auth core touches: revoked-token
//! entries and failed-login counters. Every operation is a single-key atomic
//! operation on the backing store; the core holds no locks of its own around
//! these calls.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use tenantry_core::UserId;

/// Key prefix for revoked tokens: `jwt_blacklist:<token>`.
pub const BLACKLIST_PREFIX: &str = "jwt_blacklist:";

/// Key prefix for failed login counters: `login_attempts:<user id>`.
pub const LOGIN_ATTEMPTS_PREFIX: &str = "login_attempts:";

/// Value stored for blacklist entries (presence is what matters).
pub const BLACKLIST_SENTINEL: &str = "1";

pub fn blacklist_key(token: &str) -> String {
    format!("{BLACKLIST_PREFIX}{token}")
}

pub fn login_attempts_key(user_id: UserId) -> String {
    format!("{LOGIN_ATTEMPTS_PREFIX}{user_id}")
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached (connection refused, timeout).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The store answered but the command failed (e.g. INCR on a non-integer).
    #[error("store command failed: {0}")]
    Command(String),
}

/// Injected store interface (in-memory for tests, Redis in production).
pub trait RevocationStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Set `key` to `value`, expiring after `ttl`.
    fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Atomically increment an integer counter (missing keys start at 0).
    fn incr(&self, key: &str) -> Result<i64, StoreError>;

    /// (Re)set the expiry of an existing key. Returns false if the key is absent.
    fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError>;

    fn delete(&self, key: &str) -> Result<(), StoreError>;

    fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.get(key)?.is_some())
    }

    /// Increment and refresh the expiry in one step.
    ///
    /// Backends that can do both atomically (Redis MULTI) should override this.
    fn incr_with_ttl(&self, key: &str, ttl: Duration) -> Result<i64, StoreError> {
        let count = self.incr(key)?;
        self.expire(key, ttl)?;
        Ok(count)
    }
}

impl<S> RevocationStore for Arc<S>
where
    S: RevocationStore + ?Sized,
{
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key)
    }

    fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        (**self).set_ex(key, value, ttl)
    }

    fn incr(&self, key: &str) -> Result<i64, StoreError> {
        (**self).incr(key)
    }

    fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        (**self).expire(key, ttl)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        (**self).delete(key)
    }

    fn exists(&self, key: &str) -> Result<bool, StoreError> {
        (**self).exists(key)
    }

    fn incr_with_ttl(&self, key: &str, ttl: Duration) -> Result<i64, StoreError> {
        (**self).incr_with_ttl(key, ttl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_patterns() {
        let user_id = UserId::new();
        assert_eq!(blacklist_key("abc.def.ghi"), "jwt_blacklist:abc.def.ghi");
        assert_eq!(login_attempts_key(user_id), format!("login_attempts:{user_id}"));
    }
}

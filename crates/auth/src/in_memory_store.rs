use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};

use tenantry_core::{Clock, SystemClock};

use crate::store::{RevocationStore, StoreError};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

/// In-memory store for tests/dev.
///
/// Expiry is evaluated against the injected clock, so tests can move time
/// forward instead of sleeping. Expired entries are dropped lazily on access
/// and in bulk by [`InMemoryRevocationStore::purge_expired`].
pub struct InMemoryRevocationStore {
    inner: Mutex<HashMap<String, Entry>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryRevocationStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Drop every expired entry; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let Ok(mut map) = self.inner.lock() else {
            return 0;
        };
        let before = map.len();
        map.retain(|_, e| e.is_live(now));
        before - map.len()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.inner
            .lock()
            .map(|map| map.values().filter(|e| e.is_live(now)).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Entry>>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }

    fn deadline(&self, ttl: Duration) -> Result<DateTime<Utc>, StoreError> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| StoreError::Command(format!("ttl out of range: {e}")))?;
        Ok(self.clock.now() + ttl)
    }
}

impl Default for InMemoryRevocationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryRevocationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryRevocationStore")
            .field("entries", &self.len())
            .finish()
    }
}

/// Bump a counter under an already held lock. `new_expiry == None` keeps
/// the current expiry (or none for a fresh key).
fn increment(
    map: &mut HashMap<String, Entry>,
    key: &str,
    now: DateTime<Utc>,
    new_expiry: Option<DateTime<Utc>>,
) -> Result<i64, StoreError> {
    let (count, expires_at) = match map.get(key).filter(|e| e.is_live(now)) {
        Some(entry) => {
            let n: i64 = entry
                .value
                .parse()
                .map_err(|_| StoreError::Command(format!("value at '{key}' is not an integer")))?;
            (n + 1, new_expiry.or(entry.expires_at))
        }
        None => (1, new_expiry),
    };

    map.insert(
        key.to_string(),
        Entry {
            value: count.to_string(),
            expires_at,
        },
    );
    Ok(count)
}

impl RevocationStore for InMemoryRevocationStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = self.clock.now();
        let mut map = self.lock()?;
        match map.get(key) {
            Some(entry) if entry.is_live(now) => Ok(Some(entry.value.clone())),
            Some(_) => {
                map.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let expires_at = self.deadline(ttl)?;
        let mut map = self.lock()?;
        map.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Some(expires_at),
            },
        );
        Ok(())
    }

    fn incr(&self, key: &str) -> Result<i64, StoreError> {
        let now = self.clock.now();
        let mut map = self.lock()?;
        increment(&mut map, key, now, None)
    }

    fn incr_with_ttl(&self, key: &str, ttl: Duration) -> Result<i64, StoreError> {
        let now = self.clock.now();
        let expires_at = self.deadline(ttl)?;
        let mut map = self.lock()?;
        increment(&mut map, key, now, Some(expires_at))
    }

    fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        let now = self.clock.now();
        let expires_at = self.deadline(ttl)?;
        let mut map = self.lock()?;
        match map.get_mut(key) {
            Some(entry) if entry.is_live(now) => {
                entry.expires_at = Some(expires_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.lock()?.remove(key);
        Ok(())
    }
}

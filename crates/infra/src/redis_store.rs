//! Redis-backed [`RevocationStore`].
//!
//! Every operation is a single Redis command except `incr_with_ttl`, which
//! runs `INCR` + `EXPIRE` in one `MULTI` so the counter never lives without
//! an expiry.
//!
//! Connect, read and write are all bounded by one timeout, so an unreachable
//! server costs at most that long before the caller's fail-open policy kicks in.

use std::sync::Arc;
use std::time::Duration;

use tracing::instrument;

use tenantry_auth::{RevocationStore, StoreError};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct RedisRevocationStore {
    client: Arc<redis::Client>,
    timeout: Duration,
}

impl RedisRevocationStore {
    /// Parse the URL; no connection is made until the first command.
    pub fn new(redis_url: impl AsRef<str>) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| StoreError::Unavailable(format!("invalid redis url: {e}")))?;
        Ok(Self {
            client: Arc::new(client),
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Bound connect, read and write to `timeout` (zero is clamped to 1ms).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout.max(Duration::from_millis(1));
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Round-trip a `PING`.
    pub fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        let _: String = redis::cmd("PING").query(&mut conn).map_err(map_err)?;
        Ok(())
    }

    fn conn(&self) -> Result<redis::Connection, StoreError> {
        let conn = self
            .client
            .get_connection_with_timeout(self.timeout)
            .map_err(map_err)?;
        conn.set_read_timeout(Some(self.timeout)).map_err(map_err)?;
        conn.set_write_timeout(Some(self.timeout)).map_err(map_err)?;
        Ok(conn)
    }
}

fn map_err(e: redis::RedisError) -> StoreError {
    if e.is_io_error() || e.is_connection_refusal() || e.is_timeout() || e.is_connection_dropped() {
        StoreError::Unavailable(e.to_string())
    } else {
        StoreError::Command(e.to_string())
    }
}

/// Redis expiries are whole seconds and must be positive.
fn ttl_secs(ttl: Duration) -> u64 {
    let secs = ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0);
    secs.max(1)
}

impl RevocationStore for RedisRevocationStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn()?;
        redis::cmd("GET").arg(key).query(&mut conn).map_err(map_err)
    }

    #[instrument(skip(self, key, value), fields(ttl_secs = ttl_secs(ttl)), err)]
    fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl_secs(ttl))
            .query(&mut conn)
            .map_err(map_err)
    }

    fn incr(&self, key: &str) -> Result<i64, StoreError> {
        let mut conn = self.conn()?;
        redis::cmd("INCR").arg(key).query(&mut conn).map_err(map_err)
    }

    fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        let mut conn = self.conn()?;
        redis::cmd("EXPIRE")
            .arg(key)
            .arg(ttl_secs(ttl))
            .query(&mut conn)
            .map_err(map_err)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        let _: i64 = redis::cmd("DEL").arg(key).query(&mut conn).map_err(map_err)?;
        Ok(())
    }

    fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn()?;
        redis::cmd("EXISTS").arg(key).query(&mut conn).map_err(map_err)
    }

    fn incr_with_ttl(&self, key: &str, ttl: Duration) -> Result<i64, StoreError> {
        let mut conn = self.conn()?;
        let (count,): (i64,) = redis::pipe()
            .atomic()
            .cmd("INCR")
            .arg(key)
            .cmd("EXPIRE")
            .arg(key)
            .arg(ttl_secs(ttl))
            .ignore()
            .query(&mut conn)
            .map_err(map_err)?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_rounds_up_to_whole_seconds() {
        assert_eq!(ttl_secs(Duration::from_secs(900)), 900);
        assert_eq!(ttl_secs(Duration::from_millis(1500)), 2);
        assert_eq!(ttl_secs(Duration::from_millis(1)), 1);
        assert_eq!(ttl_secs(Duration::ZERO), 1);
    }

    #[test]
    fn invalid_url_is_rejected() {
        assert!(matches!(
            RedisRevocationStore::new("not a url"),
            Err(StoreError::Unavailable(_))
        ));
    }

    #[test]
    fn timeout_is_never_zero() {
        let store = RedisRevocationStore::new("redis://127.0.0.1:6379/")
            .unwrap()
            .with_timeout(Duration::ZERO);
        assert_eq!(store.timeout(), Duration::from_millis(1));
        assert_eq!(
            RedisRevocationStore::new("redis://127.0.0.1:6379/").unwrap().timeout(),
            DEFAULT_TIMEOUT
        );
    }

    #[test]
    fn silent_server_fails_within_the_timeout() {
        // TEST-NET-1 is never routed; connects either hang or fail fast
        let store = RedisRevocationStore::new("redis://192.0.2.1:6379/")
            .unwrap()
            .with_timeout(Duration::from_millis(200));

        let started = std::time::Instant::now();
        assert!(matches!(store.exists("k"), Err(StoreError::Unavailable(_))));
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[test]
    fn unreachable_server_reports_unavailable() {
        // port 1 is reserved; nothing listens there
        let store = RedisRevocationStore::new("redis://127.0.0.1:1/").unwrap();
        assert!(matches!(store.get("k"), Err(StoreError::Unavailable(_))));
        assert!(matches!(store.ping(), Err(StoreError::Unavailable(_))));
    }
}

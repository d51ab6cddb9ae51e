//! Revocation store selection.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use tenantry_auth::{InMemoryRevocationStore, RevocationStore, StoreError};
use tenantry_core::Clock;

/// Pick the shared store: Redis when a URL is configured (and the `redis`
/// feature is compiled in), otherwise a process-local in-memory store.
///
/// `timeout` bounds every Redis round-trip; the in-memory store ignores it.
pub fn build_revocation_store(
    redis_url: Option<&str>,
    timeout: Duration,
    clock: Arc<dyn Clock>,
) -> Result<Arc<dyn RevocationStore>, StoreError> {
    match redis_url {
        #[cfg(feature = "redis")]
        Some(url) => {
            let store = crate::redis_store::RedisRevocationStore::new(url)?.with_timeout(timeout);
            if let Err(e) = store.ping() {
                warn!(error = %e, "redis not reachable at startup; store checks will fail open");
            }
            info!(timeout_ms = timeout.as_millis() as u64, "using redis revocation store");
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "redis"))]
        Some(_) => {
            let _ = timeout;
            warn!("REDIS_URL is set but the redis feature is disabled; using in-memory store");
            Ok(Arc::new(InMemoryRevocationStore::with_clock(clock)))
        }
        None => {
            info!("using in-memory revocation store");
            Ok(Arc::new(InMemoryRevocationStore::with_clock(clock)))
        }
    }
}

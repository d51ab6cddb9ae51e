//! Failed-login counting and temporary lockout.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use tenantry_core::UserId;

use crate::store::{RevocationStore, StoreError, login_attempts_key};
use crate::{AuthError, AuthResult};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_LOCKOUT_WINDOW: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleConfig {
    pub max_attempts: u32,
    /// Sliding window: refreshed on every failure.
    pub lockout_window: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            lockout_window: DEFAULT_LOCKOUT_WINDOW,
        }
    }
}

/// Caps failed login attempts per user.
///
/// Store outages fail open: an unreachable store never locks anyone out.
pub struct LoginThrottle {
    store: Arc<dyn RevocationStore>,
    config: ThrottleConfig,
}

impl LoginThrottle {
    pub fn new(store: Arc<dyn RevocationStore>, config: ThrottleConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> ThrottleConfig {
        self.config
    }

    /// Fails with `TooManyAttempts` once the counter reached the threshold.
    pub fn check_allowed(&self, user_id: UserId) -> AuthResult<()> {
        match self.attempts(user_id) {
            Ok(n) if n >= self.config.max_attempts => {
                warn!(%user_id, attempts = n, "login rejected: too many failed attempts");
                Err(AuthError::TooManyAttempts)
            }
            Ok(_) => Ok(()),
            Err(e) => {
                warn!(%user_id, error = %e, "login attempt counter unavailable; allowing attempt");
                Ok(())
            }
        }
    }

    /// Count a failed password check and slide the lockout window forward.
    ///
    /// Returns the new count, or `None` if the store could not be updated.
    pub fn record_failure(&self, user_id: UserId) -> Option<u32> {
        let key = login_attempts_key(user_id);
        match self.store.incr_with_ttl(&key, self.config.lockout_window) {
            Ok(n) => {
                let n = u32::try_from(n).unwrap_or(u32::MAX);
                if n == self.config.max_attempts {
                    warn!(
                        %user_id,
                        window_secs = self.config.lockout_window.as_secs(),
                        "login locked out after repeated failures"
                    );
                }
                Some(n)
            }
            Err(e) => {
                warn!(%user_id, error = %e, "failed to record login failure");
                None
            }
        }
    }

    /// Reset the counter after a successful login.
    pub fn clear(&self, user_id: UserId) {
        if let Err(e) = self.store.delete(&login_attempts_key(user_id)) {
            warn!(%user_id, error = %e, "failed to clear login attempt counter");
        }
    }

    /// Current failure count (0 when no counter exists).
    pub fn attempts(&self, user_id: UserId) -> Result<u32, StoreError> {
        let key = login_attempts_key(user_id);
        match self.store.get(&key)? {
            Some(raw) => raw
                .parse::<u32>()
                .map_err(|_| StoreError::Command(format!("value at '{key}' is not a counter"))),
            None => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory_store::InMemoryRevocationStore;
    use crate::testing::UnavailableStore;
    use chrono::Utc;
    use tenantry_core::ManualClock;

    fn throttle() -> (Arc<ManualClock>, LoginThrottle) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = Arc::new(InMemoryRevocationStore::with_clock(clock.clone()));
        (clock, LoginThrottle::new(store, ThrottleConfig::default()))
    }

    #[test]
    fn sixth_attempt_is_rejected_after_five_failures() {
        let (_clock, throttle) = throttle();
        let user_id = UserId::new();

        for expected in 1..=5 {
            assert_eq!(throttle.check_allowed(user_id), Ok(()));
            assert_eq!(throttle.record_failure(user_id), Some(expected));
        }

        assert_eq!(throttle.check_allowed(user_id), Err(AuthError::TooManyAttempts));
    }

    #[test]
    fn clear_resets_the_threshold() {
        let (_clock, throttle) = throttle();
        let user_id = UserId::new();

        for _ in 0..4 {
            throttle.record_failure(user_id);
        }
        throttle.clear(user_id);
        assert_eq!(throttle.attempts(user_id), Ok(0));

        for _ in 0..4 {
            throttle.record_failure(user_id);
        }
        assert_eq!(throttle.check_allowed(user_id), Ok(()));
    }

    #[test]
    fn window_slides_on_every_failure() {
        let (clock, throttle) = throttle();
        let user_id = UserId::new();

        for _ in 0..5 {
            throttle.record_failure(user_id);
            clock.advance(chrono::Duration::minutes(10));
        }
        // 50 minutes since the first failure, but only 10 since the last.
        assert_eq!(throttle.check_allowed(user_id), Err(AuthError::TooManyAttempts));

        clock.advance(chrono::Duration::minutes(5));
        assert_eq!(throttle.check_allowed(user_id), Ok(()));
    }

    #[test]
    fn counters_are_per_user() {
        let (_clock, throttle) = throttle();
        let a = UserId::new();
        let b = UserId::new();

        for _ in 0..5 {
            throttle.record_failure(a);
        }
        assert_eq!(throttle.check_allowed(a), Err(AuthError::TooManyAttempts));
        assert_eq!(throttle.check_allowed(b), Ok(()));
    }

    #[test]
    fn store_outage_fails_open() {
        let throttle = LoginThrottle::new(Arc::new(UnavailableStore), ThrottleConfig::default());
        let user_id = UserId::new();

        for _ in 0..10 {
            assert_eq!(throttle.record_failure(user_id), None);
        }
        assert_eq!(throttle.check_allowed(user_id), Ok(()));
        throttle.clear(user_id);
    }

    #[test]
    fn concurrent_failures_are_all_counted() {
        let (_clock, throttle) = throttle();
        let throttle = Arc::new(throttle);
        let user_id = UserId::new();

        let threads: Vec<_> = (0..12)
            .map(|_| {
                let throttle = throttle.clone();
                std::thread::spawn(move || throttle.record_failure(user_id))
            })
            .collect();
        let mut seen: Vec<u32> = threads
            .into_iter()
            .map(|t| t.join().unwrap().unwrap())
            .collect();
        seen.sort_unstable();

        assert_eq!(seen, (1..=12).collect::<Vec<_>>());
        assert_eq!(throttle.attempts(user_id), Ok(12));
        assert_eq!(throttle.check_allowed(user_id), Err(AuthError::TooManyAttempts));
    }
}

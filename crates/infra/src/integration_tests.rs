//! Integration tests for the wiring this crate provides.
//!
//! Tests: config → store selection → TokenService / LoginThrottle
//!
//! Verifies:
//! - Configured TTLs and thresholds reach the auth components
//! - Revocations and login counters share the selected store

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use chrono::Utc;

    use tenantry_auth::{AuthError, LoginThrottle, TokenService, TokenSubject};
    use tenantry_core::{ManualClock, TenantId, UserId};

    use crate::config::AppConfig;
    use crate::store::build_revocation_store;

    fn config(pairs: &[(&str, &str)]) -> AppConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_map(&vars).unwrap()
    }

    fn subject() -> TokenSubject {
        TokenSubject {
            user_id: UserId::new(),
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            tenant_id: Some(TenantId::new()),
            roles: Default::default(),
            is_admin: false,
        }
    }

    #[test]
    fn configured_ttl_and_threshold_take_effect() {
        let cfg = config(&[
            ("JWT_SECRET", "integration"),
            ("JWT_ACCESS_TTL_SECS", "60"),
            ("LOGIN_MAX_ATTEMPTS", "2"),
        ]);
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = build_revocation_store(None, cfg.redis_timeout, clock.clone()).unwrap();

        let tokens = TokenService::new(cfg.token.clone(), store.clone(), clock.clone()).unwrap();
        let token = tokens.issue_access_token(&subject()).unwrap();
        clock.advance(chrono::Duration::seconds(60));
        assert_eq!(tokens.validate(&token), Err(AuthError::ExpiredToken));

        let throttle = LoginThrottle::new(store, cfg.throttle);
        let user_id = UserId::new();
        throttle.record_failure(user_id);
        throttle.record_failure(user_id);
        assert_eq!(throttle.check_allowed(user_id), Err(AuthError::TooManyAttempts));
    }

    #[test]
    fn revocations_are_visible_through_a_second_service() {
        let cfg = config(&[("JWT_SECRET", "integration")]);
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = build_revocation_store(None, cfg.redis_timeout, clock.clone()).unwrap();

        let a = TokenService::new(cfg.token.clone(), store.clone(), clock.clone()).unwrap();
        let b = TokenService::new(cfg.token, store, clock).unwrap();

        let token = a.issue_access_token(&subject()).unwrap();
        a.revoke(&token).unwrap();
        assert_eq!(b.check_blacklist(&token), Err(AuthError::BlacklistedToken));
    }
}

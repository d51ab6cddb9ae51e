//! Infrastructure layer: configuration, shared store adapters, rate limiting.

pub mod config;
pub mod rate_limit;
pub mod store;

#[cfg(feature = "redis")]
pub mod redis_store;

mod integration_tests;

pub use config::{AppConfig, BootstrapAdmin, ConfigError};
pub use rate_limit::{RateLimitConfig, RateLimited, RequestRateLimiter, SweeperHandle, spawn_sweeper};
pub use store::build_revocation_store;

#[cfg(feature = "redis")]
pub use redis_store::RedisRevocationStore;

//! `tenantry-auth`: token lifecycle and tenant isolation boundary.
//!
//! This crate is intentionally decoupled from HTTP and from any concrete
//! storage: the shared key-value store and the user/tenant repositories are
//! injected through the traits in [`store`] and [`repository`].

pub mod authenticator;
pub mod authorize;
pub mod claims;
pub mod context;
pub mod error;
pub mod in_memory_store;
pub mod isolation;
pub mod password;
pub mod repository;
pub mod roles;
pub mod session;
pub mod store;
pub mod throttle;
pub mod token;
pub mod user;

#[cfg(test)]
mod testing;

pub use authenticator::{AuthOutcome, AuthStage, PublicRoutes, RequestAuthenticator, extract_bearer};
pub use authorize::{require_role, require_system_admin};
pub use claims::{TokenClaims, TokenKind, TokenSubject, validate_claims};
pub use context::AuthorizationContext;
pub use error::{AuthError, AuthResult};
pub use in_memory_store::InMemoryRevocationStore;
pub use isolation::{ScopeDecision, TableClass, TablePolicy, TenantIsolationFilter, TenantScopedRecord};
pub use password::PasswordHasher;
pub use repository::{
    InMemoryTenantRepository, InMemoryUserRepository, RepositoryError, TenantRepository,
    UniqueField, UserRepository,
};
pub use roles::Role;
pub use session::SessionService;
pub use store::{RevocationStore, StoreError};
pub use throttle::{LoginThrottle, ThrottleConfig};
pub use token::{TokenConfig, TokenPair, TokenService};
pub use user::{Tenant, TenantStatus, User, UserStatus};

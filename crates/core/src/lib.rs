//! `tenantry-core`: shared foundation types.
//!
//! Identifiers, the domain error model and the clock abstraction used by every
//! other crate. No IO lives here.

pub mod clock;
pub mod entity;
pub mod error;
pub mod id;

pub use clock::{Clock, ManualClock, SystemClock};
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{TenantId, UserId};

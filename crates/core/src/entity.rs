//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Users and tenants are entities owned by the excluded CRUD layer; the auth
/// boundary only needs to know how to identify them.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Debug + core::fmt::Display;

    /// Returns the entity identifier.
    fn id(&self) -> Self::Id;
}

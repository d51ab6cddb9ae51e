//! Role and privilege guards for downstream handlers.
//!
//! - No IO
//! - No panics
//! - Pure policy checks over an already-resolved context

use tracing::debug;

use crate::{AuthError, AuthResult, AuthorizationContext};

/// Passes if the caller holds `name`, or unconditionally for system admins.
pub fn require_role(ctx: &AuthorizationContext, name: &str) -> AuthResult<()> {
    if ctx.is_system_admin() || ctx.has_role(name) {
        return Ok(());
    }

    debug!(user_id = %ctx.user_id(), role = name, "missing required role");
    Err(AuthError::unauthorized(format!("missing role '{name}'")))
}

/// Passes only if the resolved user has no tenant affiliation.
pub fn require_system_admin(ctx: &AuthorizationContext) -> AuthResult<()> {
    if ctx.is_system_admin() {
        Ok(())
    } else {
        Err(AuthError::unauthorized("system administrator required"))
    }
}

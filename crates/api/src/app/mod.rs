//! Axum application wiring.
//!
//! - `services.rs`: token, session, isolation and rate limit wiring
//! - `routes/`: handlers, one file per area
//! - `dto.rs`: request bodies and response views
//! - `errors.rs`: `AuthError` to status code mapping

use std::sync::Arc;

use axum::{Extension, Router};
use tower::ServiceBuilder;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router.
///
/// Layer order (outermost first): rate limit, authentication, handler.
pub fn build_app(services: Arc<services::AppServices>) -> Router {
    routes::router().layer(
        ServiceBuilder::new()
            .layer(axum::middleware::from_fn_with_state(
                services.clone(),
                middleware::rate_limit_middleware,
            ))
            .layer(axum::middleware::from_fn_with_state(
                services.clone(),
                middleware::auth_middleware,
            ))
            .layer(Extension(services)),
    )
}

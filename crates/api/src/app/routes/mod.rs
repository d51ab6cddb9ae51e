use axum::{
    Router,
    routing::{get, post},
};

pub mod admin;
pub mod auth;
pub mod system;
pub mod tenants;
pub mod users;

/// Every route. Which ones need a token is decided by the authenticator's
/// public route list, not by how they are mounted here.
pub fn router() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .route("/whoami", get(system::whoami))
        .nest("/auth", auth::router())
        .route("/tenants/:id", get(tenants::get_tenant))
        .route("/users", post(users::create_user))
        .route("/users/:id", get(users::get_user))
        .nest("/admin", admin::router())
}

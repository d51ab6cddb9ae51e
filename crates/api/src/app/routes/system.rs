use axum::{Extension, Json, http::StatusCode};

use tenantry_auth::AuthorizationContext;

use crate::app::dto::WhoAmI;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(Extension(ctx): Extension<AuthorizationContext>) -> Json<WhoAmI> {
    Json(WhoAmI::from(&ctx))
}

use std::sync::Arc;

use axum::{Extension, Json, Router, http::StatusCode, routing::post};

use tenantry_auth::TokenPair;

use crate::app::dto::{LoginRequest, LogoutRequest, RefreshRequest, RegisterRequest, UserView};
use crate::app::errors::ApiResult;
use crate::app::services::{AppServices, run_blocking};
use crate::context::BearerToken;

pub fn router() -> Router {
    Router::new()
        .route("/login", post(login))
        .route("/register", post(register))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
}

async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<LoginRequest>,
) -> ApiResult<Json<TokenPair>> {
    let pair = run_blocking(&services, move |s| {
        s.sessions
            .login(body.tenant_code.as_deref(), &body.email, &body.password)
    })
    .await?;
    Ok(Json(pair))
}

async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<UserView>)> {
    let user = run_blocking(&services, move |s| {
        s.sessions
            .register(&body.tenant_code, &body.username, &body.email, &body.password)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(UserView::from(user))))
}

async fn refresh(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<RefreshRequest>,
) -> ApiResult<Json<TokenPair>> {
    let pair = run_blocking(&services, move |s| s.sessions.refresh(&body.refresh_token)).await?;
    Ok(Json(pair))
}

async fn logout(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(bearer): Extension<BearerToken>,
    body: Option<Json<LogoutRequest>>,
) -> ApiResult<StatusCode> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    run_blocking(&services, move |s| {
        s.sessions
            .logout(bearer.as_str(), body.refresh_token.as_deref())
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

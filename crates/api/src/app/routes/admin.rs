use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::Path,
    http::StatusCode,
    routing::{get, post},
};

use tenantry_auth::{AuthError, AuthorizationContext, TenantRepository, require_system_admin};

use crate::app::dto::{CreateTenantRequest, TenantView};
use crate::app::errors::{ApiError, ApiResult};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/tenants", post(create_tenant))
        .route("/tenants/:code", get(get_tenant_by_code))
}

async fn get_tenant_by_code(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthorizationContext>,
    Path(code): Path<String>,
) -> ApiResult<Json<TenantView>> {
    require_system_admin(&ctx)?;
    let tenant = services
        .tenants
        .get_by_code(&code)
        .map_err(AuthError::from)?
        .ok_or(ApiError::NotFound("tenant"))?;
    Ok(Json(TenantView::from(tenant)))
}

async fn create_tenant(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthorizationContext>,
    Json(body): Json<CreateTenantRequest>,
) -> ApiResult<(StatusCode, Json<TenantView>)> {
    require_system_admin(&ctx)?;
    services.isolation.scope(Some(&ctx), "tenants")?;

    let code = body.code.trim();
    if code.is_empty() {
        return Err(ApiError::bad_request("code is required"));
    }

    match services.create_tenant(code, body.name.trim())? {
        Some(tenant) => Ok((StatusCode::CREATED, Json(TenantView::from(tenant)))),
        None => Err(ApiError::Conflict(
            "tenant_code_exists",
            format!("tenant code '{code}' is already taken"),
        )),
    }
}

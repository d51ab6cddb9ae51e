use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::Path,
};

use tenantry_auth::{AuthorizationContext, TenantRepository};
use tenantry_core::TenantId;

use crate::app::dto::TenantView;
use crate::app::errors::{ApiError, ApiResult};
use crate::app::services::AppServices;

pub(crate) fn parse_tenant_id(raw: &str) -> ApiResult<TenantId> {
    raw.parse()
        .map_err(|_| ApiError::bad_request(format!("invalid tenant id '{raw}'")))
}

/// A tenant user may read only their own tenant.
pub async fn get_tenant(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthorizationContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<TenantView>> {
    let tenant_id = parse_tenant_id(&id)?;
    services.isolation.validate_access(&ctx, tenant_id)?;

    let tenant = services
        .tenants
        .get_by_id(tenant_id)
        .map_err(tenantry_auth::AuthError::from)?
        .ok_or(ApiError::NotFound("tenant"))?;
    Ok(Json(TenantView::from(tenant)))
}

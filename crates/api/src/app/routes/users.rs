use std::sync::Arc;

use axum::{Extension, Json, extract::Path, http::StatusCode};
use serde_json::{Map, Value};

use tenantry_auth::{
    AuthError, AuthorizationContext, Role, TenantScopedRecord, UserRepository, require_role,
    require_system_admin,
};
use tenantry_core::UserId;

use crate::app::dto::UserView;
use crate::app::errors::{ApiError, ApiResult};
use crate::app::services::{AppServices, run_blocking};

pub async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthorizationContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<UserView>> {
    let user_id: UserId = id
        .parse()
        .map_err(|_| ApiError::bad_request(format!("invalid user id '{id}'")))?;

    let user = services
        .users
        .get_by_id(user_id)
        .map_err(AuthError::from)?
        .ok_or(ApiError::NotFound("user"))?;

    match user.tenant_id {
        Some(owner) => services.isolation.validate_access(&ctx, owner)?,
        None => require_system_admin(&ctx)?,
    }
    Ok(Json(UserView::from(user)))
}

/// Admin user creation. The tenant is taken from the caller unless the
/// caller is a system administrator, who must name it in `tenant_id`.
pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthorizationContext>,
    Json(mut body): Json<Map<String, Value>>,
) -> ApiResult<(StatusCode, Json<UserView>)> {
    require_role(&ctx, Role::ADMIN.as_str())?;
    services
        .isolation
        .apply_insert_scoping(Some(&ctx), &mut body, "users")?;

    let tenant_id = body.tenant_id().ok_or(AuthError::TenantRequired)?;
    let username = required_str(&body, "username")?;
    let email = required_str(&body, "email")?;
    let password = required_str(&body, "password")?;
    let roles: Vec<Role> = match body.get("roles") {
        None | Some(Value::Null) => vec![Role::USER],
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| {
                v.as_str()
                    .map(|s| Role::new(s.to_string()))
                    .ok_or_else(|| ApiError::bad_request("roles must be strings"))
            })
            .collect::<Result<_, _>>()?,
        Some(_) => return Err(ApiError::bad_request("roles must be an array")),
    };

    let (username, email, password) =
        (username.to_owned(), email.to_owned(), password.to_owned());
    let user = run_blocking(&services, move |s| {
        s.sessions
            .provision_user(Some(tenant_id), &username, &email, &password, roles)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(UserView::from(user))))
}

fn required_str<'a>(body: &'a Map<String, Value>, field: &'static str) -> ApiResult<&'a str> {
    body.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request(format!("{field} is required")))
}

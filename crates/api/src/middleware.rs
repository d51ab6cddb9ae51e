use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::{IntoResponse, Response},
};

use tenantry_auth::{AuthError, AuthOutcome, extract_bearer};

use crate::app::errors::{ApiError, auth_error_to_response};
use crate::app::services::{AppServices, run_blocking};
use crate::context::{BearerToken, client_key};

/// Authenticate every request that is not on a public route.
///
/// On success the [`tenantry_auth::AuthorizationContext`] and the raw
/// [`BearerToken`] are inserted into the request extensions.
pub async fn auth_middleware(
    State(services): State<Arc<AppServices>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let header = match req.headers().get(header::AUTHORIZATION) {
        None => None,
        Some(value) => match value.to_str() {
            Ok(value) => Some(value.to_owned()),
            Err(_) => return auth_error_to_response(AuthError::MalformedAuthorization),
        },
    };
    let bearer = header
        .as_deref()
        .and_then(|h| extract_bearer(Some(h)).ok())
        .map(BearerToken::new);

    // Blacklist lookups can reach Redis.
    let path = req.uri().path().to_owned();
    let outcome = run_blocking(&services, move |s| {
        s.authenticator.authenticate(&path, header.as_deref())
    })
    .await;

    match outcome {
        Ok(AuthOutcome::Public) => next.run(req).await,
        Ok(AuthOutcome::Authorized(ctx)) => {
            req.extensions_mut().insert(ctx);
            if let Some(bearer) = bearer {
                req.extensions_mut().insert(bearer);
            }
            next.run(req).await
        }
        Err(e) => e.into_response(),
    }
}

/// Per-client sliding-window limit, applied before authentication.
pub async fn rate_limit_middleware(
    State(services): State<Arc<AppServices>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let client = client_key(&req);
    match services.limiter.check(&client) {
        Ok(()) => next.run(req).await,
        Err(limited) => {
            tracing::warn!(client, "rate limit exceeded");
            ApiError::from(limited).into_response()
        }
    }
}

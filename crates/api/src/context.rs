//! Request extensions populated by the middleware.
//!
//! The authenticated identity itself travels as
//! [`tenantry_auth::AuthorizationContext`]; this module only adds what the
//! HTTP layer needs on top of it.

use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::http::Request;

/// The raw bearer credential of the current request (needed for logout).
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("BearerToken(<redacted>)")
    }
}

/// Rate-limit key: first `X-Forwarded-For` hop, else the peer address.
pub fn client_key<B>(req: &Request<B>) -> String {
    let forwarded = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    if let Some(ip) = forwarded {
        return ip.to_string();
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forwarded_for_wins_over_peer() {
        let mut req = Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .body(())
            .unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 9000))));
        assert_eq!(client_key(&req), "203.0.113.7");
    }

    #[test]
    fn falls_back_to_peer_then_unknown() {
        let mut req = Request::builder().body(()).unwrap();
        assert_eq!(client_key(&req), "unknown");

        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([10, 1, 2, 3], 9000))));
        assert_eq!(client_key(&req), "10.1.2.3");
    }

    #[test]
    fn bearer_token_debug_is_redacted() {
        assert_eq!(format!("{:?}", BearerToken::new("abc")), "BearerToken(<redacted>)");
    }
}

//! Client IP and user agent extraction.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRef, FromRequestParts};
use axum::http::{HeaderMap, header::USER_AGENT, request::Parts};

use crate::domain::types::ClientContext;
use crate::state::AppState;

const UNKNOWN: &str = "unknown";

/// First hop of `x-forwarded-for`, then `x-real-ip`.
pub fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(ip) = forwarded {
        return Some(ip.to_owned());
    }
    headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

/// Whether forwarding headers are set by a trusted proxy. When false, callers
/// cannot pick their own rate-limit key by sending those headers.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrustForwarded(pub bool);

impl FromRef<AppState> for TrustForwarded {
    fn from_ref(state: &AppState) -> Self {
        Self(state.trust_forwarded_headers)
    }
}

/// Client context for audit rows and rate-limit keys. Never rejects: missing
/// values become `"unknown"`.
#[derive(Debug, Clone)]
pub struct ClientInfo(pub ClientContext);

impl<S> FromRequestParts<S> for ClientInfo
where
    TrustForwarded: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let TrustForwarded(trusted) = TrustForwarded::from_ref(state);
        let ip = trusted
            .then(|| forwarded_ip(&parts.headers))
            .flatten()
            .or_else(|| {
                parts
                    .extensions
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip().to_string())
            })
            .unwrap_or_else(|| UNKNOWN.to_owned());
        let user_agent = parts
            .headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .unwrap_or(UNKNOWN)
            .to_owned();

        async move { Ok(Self(ClientContext::new(ip, user_agent))) }
    }
}

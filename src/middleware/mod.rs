//! The ordered request-processing pipeline.
//!
//! Each unit is an axum layer or `middleware::from_fn`. The composition order
//! lives in [`crate::routes`]; requests pass through, in order: access log,
//! sanitization, CORS, security headers, rate limiting (under `/u`), response
//! throttling, body-size limits, cookie sessions, auth context and the
//! request timestamp, before reaching the route table.

pub mod access_log;
pub mod auth;
pub mod body_limit;
pub mod cors;
pub mod rate_limit;
pub mod received_at;
pub mod sanitize;
pub mod security_headers;
pub mod session;
pub mod slow_down;

use axum::extract::ConnectInfo;
use axum::http::HeaderMap;
use std::net::{IpAddr, SocketAddr};

/// Resolves the client IP for a request.
///
/// When `behind_proxy` is set the first `X-Forwarded-For` entry (or
/// `X-Real-IP`) wins; otherwise the socket peer address is used. Returns
/// `None` when neither is available, e.g. in tests without a real transport.
pub(crate) fn client_ip(
    headers: &HeaderMap,
    peer: Option<&ConnectInfo<SocketAddr>>,
    behind_proxy: bool,
) -> Option<IpAddr> {
    if behind_proxy {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|v| v.trim().parse().ok());

        if forwarded.is_some() {
            return forwarded;
        }

        let real_ip = headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok());

        if real_ip.is_some() {
            return real_ip;
        }
    }

    peer.map(|ConnectInfo(addr)| addr.ip())
}

//! Per-request access logging.

use axum::{
    extract::{ConnectInfo, Request},
    http::header,
    middleware::Next,
    response::Response,
};
use std::{net::SocketAddr, time::Instant};

/// Logs one line per request with client IP, method, path, status and latency.
///
/// The peer address is read from request extensions so the middleware also
/// works under test transports that carry no connection info.
pub async fn access_log_mw(req: Request, next: Next) -> Response {
    let start = Instant::now();

    let ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "-".to_string());

    let method = req.method().to_string();
    let path = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    let ua = req
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();

    let response = next.run(req).await;

    let status = response.status().as_u16();
    let ms = start.elapsed().as_millis();

    tracing::info!(
        r#"{ip} "{method} {path}" {status} {ms}ms "{ua}""#,
        ip = ip,
        method = method,
        path = path,
        status = status,
        ms = ms,
        ua = ua,
    );

    response
}

//! Fixed security response headers.
//!
//! Applied to every response, static assets included:
//!
//! - `Content-Security-Policy` with the storefront's allow-list (PayPal
//!   checkout, Google widgets, jsDelivr assets)
//! - `X-Frame-Options: DENY`
//! - `Referrer-Policy: no-referrer`
//! - `X-XSS-Protection: 1; mode=block`
//! - `Cross-Origin-Opener-Policy: same-origin-allow-popups`
//!
//! `Cross-Origin-Embedder-Policy` is intentionally absent: the PayPal and
//! Google iframes do not ship the headers COEP would demand.

use axum::{
    extract::Request,
    http::HeaderValue,
    middleware::Next,
    response::Response,
};

/// Content-Security-Policy sent with every response.
pub const CONTENT_SECURITY_POLICY: &str = "default-src 'self'; \
     script-src 'self' https://www.paypal.com https://www.sandbox.paypal.com \
     https://www.google.com https://www.gstatic.com https://cdn.jsdelivr.net 'unsafe-inline'; \
     frame-src 'self' https://www.paypal.com https://www.sandbox.paypal.com \
     https://www.google.com https://cdn.jsdelivr.net; \
     img-src 'self' data: https://www.paypalobjects.com https://www.google.com https://cdn.jsdelivr.net; \
     connect-src 'self' https://www.paypal.com https://www.sandbox.paypal.com \
     https://www.google.com https://cdn.jsdelivr.net; \
     object-src 'self' http://127.0.0.1:3000";

/// Adds the fixed security header set to the response.
pub async fn security_headers_mw(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    headers.insert(
        "content-security-policy",
        HeaderValue::from_static(CONTENT_SECURITY_POLICY),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert("referrer-policy", HeaderValue::from_static("no-referrer"));
    headers.insert(
        "x-xss-protection",
        HeaderValue::from_static("1; mode=block"),
    );
    headers.insert(
        "cross-origin-opener-policy",
        HeaderValue::from_static("same-origin-allow-popups"),
    );

    response
}

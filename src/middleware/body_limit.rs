//! Content-type aware request body limits.
//!
//! JSON bodies are capped at 300KB, urlencoded form bodies at 10KB. Other
//! content types pass through untouched; the gateway never parses them.
//!
//! This middleware is the `Content-Length` fast path and runs before the
//! sanitizer, so the limit is judged on the bytes the client sent, not on
//! the rewritten body. Chunked bodies without a declared length are caught
//! by the buffering backstop in [`crate::middleware::sanitize`], which reads
//! with the same limits.

use axum::{
    extract::Request,
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::error::AppError;

/// Maximum `application/json` body size in bytes.
pub const JSON_BODY_LIMIT: usize = 300 * 1024;

/// Maximum `application/x-www-form-urlencoded` body size in bytes.
pub const FORM_BODY_LIMIT: usize = 10 * 1024;

/// Body kinds the gateway parses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Json,
    Form,
}

impl BodyKind {
    pub fn limit(self) -> usize {
        match self {
            BodyKind::Json => JSON_BODY_LIMIT,
            BodyKind::Form => FORM_BODY_LIMIT,
        }
    }
}

/// Classifies the request body from its `Content-Type` header.
///
/// Parameters such as `; charset=utf-8` are ignored.
pub fn body_kind(req: &Request) -> Option<BodyKind> {
    let content_type = req
        .headers()
        .get(header::CONTENT_TYPE)?
        .to_str()
        .ok()?
        .split(';')
        .next()?
        .trim()
        .to_ascii_lowercase();

    match content_type.as_str() {
        "application/json" => Some(BodyKind::Json),
        "application/x-www-form-urlencoded" => Some(BodyKind::Form),
        _ => None,
    }
}

/// Rejects oversized JSON and form bodies with `413 Payload Too Large`.
pub async fn body_limit_mw(req: Request, next: Next) -> Response {
    if let Some(kind) = body_kind(&req) {
        let declared = req
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());

        if let Some(len) = declared
            && len > kind.limit()
        {
            return AppError::payload_too_large(
                "Request body exceeds the allowed size",
                json!({ "limit_bytes": kind.limit(), "content_length": len }),
            )
            .into_response();
        }
    }

    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request_with_content_type(ct: &str) -> Request {
        Request::builder()
            .header(header::CONTENT_TYPE, ct)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_body_kind_classification() {
        assert_eq!(
            body_kind(&request_with_content_type("application/json")),
            Some(BodyKind::Json)
        );
        assert_eq!(
            body_kind(&request_with_content_type("application/json; charset=utf-8")),
            Some(BodyKind::Json)
        );
        assert_eq!(
            body_kind(&request_with_content_type(
                "application/x-www-form-urlencoded"
            )),
            Some(BodyKind::Form)
        );
        assert_eq!(body_kind(&request_with_content_type("text/plain")), None);

        let no_type = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(body_kind(&no_type), None);
    }

    #[test]
    fn test_limits() {
        assert_eq!(BodyKind::Json.limit(), 300 * 1024);
        assert_eq!(BodyKind::Form.limit(), 10 * 1024);
    }
}

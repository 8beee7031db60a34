//! Input sanitization.
//!
//! Two guards, applied to the query string and to JSON / urlencoded bodies:
//!
//! - **Injection keys**: object keys beginning with `$` or containing `.`
//!   are dropped. Such keys are how operator-injection payloads reach a
//!   document store through naively-merged request data.
//! - **Reflected XSS**: `&`, `<`, `>`, `"` and `'` in string values are
//!   entity-escaped before anything downstream can echo them into HTML.
//!
//! Buffering a body here also enforces the size limits from
//! [`crate::middleware::body_limit`] for chunked requests that carry no
//! `Content-Length`.

use axum::{
    body::{Body, to_bytes},
    extract::Request,
    http::{Uri, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use url::form_urlencoded;

use crate::error::AppError;
use crate::middleware::body_limit::{BodyKind, body_kind};

/// True for keys usable in query-injection payloads.
fn is_injection_key(key: &str) -> bool {
    key.starts_with('$') || key.contains('.')
}

/// Entity-escapes HTML-significant characters.
fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

fn needs_escaping(input: &str) -> bool {
    input.contains(['&', '<', '>', '"', '\''])
}

/// Recursively scrubs a JSON value: drops injection keys, escapes strings.
fn scrub_json(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(key, _)| !is_injection_key(key))
                .map(|(key, value)| (key, scrub_json(value)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(scrub_json).collect()),
        Value::String(s) => {
            if needs_escaping(&s) {
                Value::String(escape_html(&s))
            } else {
                Value::String(s)
            }
        }
        other => other,
    }
}

/// Scrubs a urlencoded pair list, returning the re-encoded string.
fn scrub_form(raw: &[u8]) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in form_urlencoded::parse(raw) {
        if is_injection_key(&key) {
            continue;
        }
        serializer.append_pair(&key, &escape_html(&value));
    }
    serializer.finish()
}

/// Rebuilds the request URI with a scrubbed query string, if it changed.
fn scrub_uri(uri: &Uri) -> Option<Uri> {
    let query = uri.query()?;
    let scrubbed = scrub_form(query.as_bytes());
    if scrubbed == query {
        return None;
    }

    let path = uri.path();
    let path_and_query = if scrubbed.is_empty() {
        path.to_string()
    } else {
        format!("{path}?{scrubbed}")
    };

    let mut parts = uri.clone().into_parts();
    parts.path_and_query = path_and_query.parse().ok();
    Uri::from_parts(parts).ok()
}

/// Sanitizes the query string and any JSON / form body in place.
///
/// Invalid JSON in a JSON-typed body is a 400; a body over its size limit is
/// a 413 (backstop for chunked transfers).
pub async fn sanitize_mw(req: Request, next: Next) -> Response {
    let kind = body_kind(&req);
    let (mut parts, body) = req.into_parts();

    if let Some(scrubbed) = scrub_uri(&parts.uri) {
        parts.uri = scrubbed;
    }

    let body = match kind {
        None => body,
        Some(kind) => {
            let bytes = match to_bytes(body, kind.limit()).await {
                Ok(bytes) => bytes,
                Err(_) => {
                    return AppError::payload_too_large(
                        "Request body exceeds the allowed size",
                        json!({ "limit_bytes": kind.limit() }),
                    )
                    .into_response();
                }
            };

            if bytes.is_empty() {
                Body::empty()
            } else {
                let scrubbed = match kind {
                    BodyKind::Json => {
                        let value: Value = match serde_json::from_slice(&bytes) {
                            Ok(value) => value,
                            Err(e) => {
                                return AppError::bad_request(
                                    "Invalid JSON body",
                                    json!({ "parse_error": e.to_string() }),
                                )
                                .into_response();
                            }
                        };
                        serde_json::to_vec(&scrub_json(value))
                            .unwrap_or_else(|_| bytes.to_vec())
                    }
                    BodyKind::Form => scrub_form(&bytes).into_bytes(),
                };

                parts
                    .headers
                    .insert(header::CONTENT_LENGTH, scrubbed.len().into());
                Body::from(scrubbed)
            }
        }
    };

    next.run(Request::from_parts(parts, body)).await
}

//! Request arrival timestamp.

use axum::{extract::Request, middleware::Next, response::Response};
use chrono::{DateTime, Utc};

/// When the gateway first saw the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceivedAt(pub DateTime<Utc>);

/// Stamps the request with its arrival time for downstream handlers.
pub async fn received_at_mw(mut req: Request, next: Next) -> Response {
    req.extensions_mut().insert(ReceivedAt(Utc::now()));
    next.run(req).await
}

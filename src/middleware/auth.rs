//! Authentication context attachment.
//!
//! Runs after the session middleware and lifts the authenticated identity
//! out of the session's `passport.user` entry into a typed extension. No
//! route consumes it yet; mounted routers get an [`AuthContext`] without
//! having to know the cookie layout.

use axum::{extract::Request, middleware::Next, response::Response};
use serde_json::Value;
use std::sync::Arc;

use crate::middleware::session::Session;

/// Identity derived from the session, present on every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    /// The signed-in user, if the session carries one.
    pub user_id: Option<String>,
}

impl AuthContext {
    pub fn anonymous() -> Self {
        Self { user_id: None }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }
}

/// Extracts `passport.user` from a session.
///
/// Accepts both string and numeric user identifiers.
pub fn context_from_session(session: &Session) -> AuthContext {
    let user_id = session
        .get("passport")
        .and_then(|passport| passport.get("user"))
        .and_then(|user| match user {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        });

    AuthContext { user_id }
}

/// Attaches an [`AuthContext`] extension derived from the current session.
pub async fn auth_mw(mut req: Request, next: Next) -> Response {
    let context = req
        .extensions()
        .get::<Arc<Session>>()
        .map(|session| context_from_session(session))
        .unwrap_or_else(AuthContext::anonymous);

    req.extensions_mut().insert(context);
    next.run(req).await
}

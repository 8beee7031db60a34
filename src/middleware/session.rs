//! Signed cookie sessions.
//!
//! Client-held state in the `cookie-session` style: the `session` cookie
//! carries a base64 JSON payload, and `session.sig` carries an HMAC-SHA256
//! signature over `session=<value>`. The first configured key signs new
//! cookies; every key verifies, which allows rotation without logging
//! everyone out.
//!
//! The middleware attaches a [`Session`] to request extensions on every
//! request. Tampered, malformed or expired cookies are treated as absent and
//! replaced with a fresh session; downstream code never sees a cookie it
//! cannot trust. A handler writes its session back by placing a
//! [`PersistSession`] in response extensions; the middleware turns it into
//! the signed `Set-Cookie` pair.

use axum::{
    extract::{Request, State},
    http::{
        HeaderMap, HeaderValue,
        header::{COOKIE, SET_COOKIE},
    },
    middleware::Next,
    response::Response,
};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::Sha256;
use std::sync::Arc;

use crate::state::AppState;

type HmacSha256 = Hmac<Sha256>;

/// Cookie holding the session payload.
pub const SESSION_COOKIE: &str = "session";

/// Cookie holding the payload signature.
pub const SESSION_SIG_COOKIE: &str = "session.sig";

/// Client-held session state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    /// Issue time; sessions older than the configured max age are rejected.
    pub issued_at: DateTime<Utc>,
    /// Arbitrary session entries (e.g. `passport.user`).
    #[serde(default)]
    pub data: serde_json::Map<String, Value>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            issued_at: Utc::now(),
            data: serde_json::Map::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.data.insert(key.into(), value);
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Put into response extensions by a handler to persist its session.
#[derive(Debug, Clone)]
pub struct PersistSession(pub Session);

/// Signs, verifies and (de)serializes session cookies.
#[derive(Debug, Clone)]
pub struct SessionService {
    keys: Vec<String>,
    max_age: Duration,
}

impl SessionService {
    /// # Panics
    ///
    /// Never panics at runtime: key presence is enforced by config validation
    /// before the service is built.
    pub fn new(keys: Vec<String>, max_age_days: i64) -> Self {
        debug_assert!(!keys.is_empty(), "session keys validated at startup");
        Self {
            keys,
            max_age: Duration::days(max_age_days),
        }
    }

    /// Signs `session=<value>` with the primary key.
    fn sign(&self, cookie_value: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(self.keys[0].as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(format!("{SESSION_COOKIE}={cookie_value}").as_bytes());
        URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    }

    /// Verifies the signature against every configured key.
    fn verify(&self, cookie_value: &str, signature: &str) -> bool {
        let Ok(sig_bytes) = URL_SAFE_NO_PAD.decode(signature) else {
            return false;
        };

        self.keys.iter().any(|key| {
            let mut mac = HmacSha256::new_from_slice(key.as_bytes())
                .expect("HMAC accepts keys of any length");
            mac.update(format!("{SESSION_COOKIE}={cookie_value}").as_bytes());
            mac.verify_slice(&sig_bytes).is_ok()
        })
    }

    /// Encodes a session into its cookie value and signature.
    pub fn encode(&self, session: &Session) -> (String, String) {
        let payload = serde_json::to_vec(session).expect("session serializes to JSON");
        let value = URL_SAFE_NO_PAD.encode(payload);
        let sig = self.sign(&value);
        (value, sig)
    }

    /// Decodes and verifies the session cookies from a `Cookie` header.
    ///
    /// Returns `None` for missing, tampered, malformed or expired cookies.
    pub fn decode(&self, headers: &HeaderMap) -> Option<Session> {
        let value = cookie_value(headers, SESSION_COOKIE)?;
        let sig = cookie_value(headers, SESSION_SIG_COOKIE)?;

        if !self.verify(&value, &sig) {
            return None;
        }

        let payload = URL_SAFE_NO_PAD.decode(value).ok()?;
        let session: Session = serde_json::from_slice(&payload).ok()?;

        if Utc::now() - session.issued_at > self.max_age {
            return None;
        }

        Some(session)
    }

    /// `Set-Cookie` header values for a session, with the configured max age.
    pub fn set_cookie_headers(&self, session: &Session) -> [String; 2] {
        let (value, sig) = self.encode(session);
        let max_age = self.max_age.num_seconds();
        [
            format!(
                "{SESSION_COOKIE}={value}; Path=/; Max-Age={max_age}; HttpOnly; SameSite=Lax"
            ),
            format!(
                "{SESSION_SIG_COOKIE}={sig}; Path=/; Max-Age={max_age}; HttpOnly; SameSite=Lax"
            ),
        ]
    }
}

/// Extracts one cookie from the `Cookie` header.
fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(COOKIE)
        .and_then(|header| header.to_str().ok())
        .and_then(|cookies| {
            cookies.split(';').find_map(|cookie| {
                let mut parts = cookie.trim().splitn(2, '=');
                match (parts.next(), parts.next()) {
                    (Some(key), Some(value)) if key == name => Some(value.to_string()),
                    _ => None,
                }
            })
        })
}

/// Attaches a verified-or-fresh [`Session`] to every request and writes a
/// [`PersistSession`] left in the response back to the client.
///
/// Untouched sessions emit no cookies; only a handler that asks for
/// persistence produces a `Set-Cookie` pair.
pub async fn session_mw(State(st): State<AppState>, mut req: Request, next: Next) -> Response {
    let session = st
        .sessions
        .decode(req.headers())
        .unwrap_or_default();

    req.extensions_mut().insert(Arc::new(session));

    let mut response = next.run(req).await;

    if let Some(PersistSession(session)) = response.extensions_mut().remove::<PersistSession>() {
        for cookie in st.sessions.set_cookie_headers(&session) {
            let value = HeaderValue::from_str(&cookie)
                .expect("cookie values are base64url with ASCII attributes");
            response.headers_mut().append(SET_COOKIE, value);
        }
    }

    response
}

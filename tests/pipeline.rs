mod common;

use axum::body::to_bytes;
use axum::extract::Request;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum_test::TestServer;
use serde_json::json;
use storefront_gateway::middleware::auth::AuthContext;
use storefront_gateway::middleware::security_headers::CONTENT_SECURITY_POLICY;
use storefront_gateway::middleware::session::{PersistSession, Session, SessionService};
use storefront_gateway::routing::{Matcher, RouteTable, handler};

#[tokio::test]
async fn test_unmatched_path_returns_400_with_path_in_body() {
    let server = TestServer::new(common::test_app()).unwrap();

    let response = server.get("/no/such/page").await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body = response.text();
    assert!(body.contains("cannot find the path: /no/such/page on this server"));
}

#[tokio::test]
async fn test_every_method_hits_the_catch_all() {
    let server = TestServer::new(common::test_app()).unwrap();

    server
        .post("/orders")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    server
        .put("/orders/1")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    server
        .delete("/orders/1")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    server.patch("/x").await.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_security_headers_on_fallback_response() {
    let server = TestServer::new(common::test_app()).unwrap();

    let response = server.get("/missing").await;
    let headers = response.headers();

    assert_eq!(
        headers.get("content-security-policy").unwrap(),
        CONTENT_SECURITY_POLICY
    );
    assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
    assert_eq!(headers.get("referrer-policy").unwrap(), "no-referrer");
    assert_eq!(headers.get("x-xss-protection").unwrap(), "1; mode=block");
    assert_eq!(
        headers.get("cross-origin-opener-policy").unwrap(),
        "same-origin-allow-popups"
    );
    assert!(headers.get("cross-origin-embedder-policy").is_none());
}

#[tokio::test]
async fn test_static_asset_served_with_security_headers() {
    let server = TestServer::new(common::test_app()).unwrap();

    let response = server.get("/robots.txt").await;

    response.assert_status_ok();
    assert!(response.text().contains("Disallow: /u/"));

    // Every response carries the header set, static assets included.
    let headers = response.headers();
    assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
    assert_eq!(headers.get("referrer-policy").unwrap(), "no-referrer");
}

#[tokio::test]
async fn test_invalid_json_body_is_rejected() {
    let server = TestServer::new(common::test_app()).unwrap();

    let response = server
        .post("/anything")
        .content_type("application/json")
        .bytes("{not json".into())
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body = response.json::<serde_json::Value>();
    assert_eq!(body["error"]["code"], "bad_request");
    assert_eq!(body["error"]["message"], "Invalid JSON body");
}

#[tokio::test]
async fn test_json_body_is_sanitized_before_routes_see_it() {
    let echo = RouteTable::with_catch_all().route(
        Matcher::post("/echo"),
        handler(|req: Request| async move {
            let bytes = to_bytes(req.into_body(), 1024 * 1024)
                .await
                .unwrap_or_default();
            (StatusCode::OK, bytes)
        }),
    );
    let server = TestServer::new(common::test_app_with_routes(echo)).unwrap();

    let response = server
        .post("/echo")
        .json(&json!({
            "name": "<b>bob</b>",
            "$where": "this.password",
            "nested": { "role.admin": true, "ok": 1 }
        }))
        .await;

    response.assert_status_ok();
    let echoed: serde_json::Value = serde_json::from_str(&response.text()).unwrap();

    assert_eq!(echoed["name"], "&lt;b&gt;bob&lt;/b&gt;");
    assert!(echoed.get("$where").is_none());
    assert!(echoed["nested"].get("role.admin").is_none());
    assert_eq!(echoed["nested"]["ok"], 1);
}

#[tokio::test]
async fn test_query_string_is_sanitized() {
    let echo_query = RouteTable::with_catch_all().route(
        Matcher::get("/search"),
        handler(|req: Request| async move {
            let query = req.uri().query().unwrap_or("").to_string();
            (StatusCode::OK, query)
        }),
    );
    let server = TestServer::new(common::test_app_with_routes(echo_query)).unwrap();

    let response = server.get("/search?q=%3Cscript%3E&$gt=5").await;

    response.assert_status_ok();
    let query = response.text();
    assert!(!query.contains("%24gt"));
    assert!(!query.contains("$gt"));
    assert!(query.contains("q=%26lt%3Bscript%26gt%3B"));
}

#[tokio::test]
async fn test_valid_session_cookie_yields_auth_context() {
    let whoami = RouteTable::with_catch_all().route(
        Matcher::get("/whoami"),
        handler(|req: Request| async move {
            let user = req
                .extensions()
                .get::<AuthContext>()
                .and_then(|ctx| ctx.user_id.clone())
                .unwrap_or_else(|| "anonymous".to_string());
            (StatusCode::OK, user)
        }),
    );
    let server = TestServer::new(common::test_app_with_routes(whoami)).unwrap();

    let keys = common::TEST_SESSION_KEYS
        .iter()
        .map(|k| k.to_string())
        .collect();
    let sessions = SessionService::new(keys, 90);

    let mut session = Session::new();
    session.insert("passport", json!({ "user": "u-123" }));
    let (value, sig) = sessions.encode(&session);

    let response = server
        .get("/whoami")
        .add_header("cookie", format!("session={value}; session.sig={sig}"))
        .await;

    response.assert_status_ok();
    assert_eq!(response.text(), "u-123");
}

#[tokio::test]
async fn test_tampered_session_cookie_is_anonymous() {
    let whoami = RouteTable::with_catch_all().route(
        Matcher::get("/whoami"),
        handler(|req: Request| async move {
            let user = req
                .extensions()
                .get::<AuthContext>()
                .and_then(|ctx| ctx.user_id.clone())
                .unwrap_or_else(|| "anonymous".to_string());
            (StatusCode::OK, user)
        }),
    );
    let server = TestServer::new(common::test_app_with_routes(whoami)).unwrap();

    // Signed with a key the gateway does not know.
    let forged = SessionService::new(vec!["attacker-key".to_string()], 90);
    let mut session = Session::new();
    session.insert("passport", json!({ "user": "admin" }));
    let (value, sig) = forged.encode(&session);

    let response = server
        .get("/whoami")
        .add_header("cookie", format!("session={value}; session.sig={sig}"))
        .await;

    response.assert_status_ok();
    assert_eq!(response.text(), "anonymous");
}

#[tokio::test]
async fn test_persisted_session_is_written_back_as_signed_cookies() {
    let login = RouteTable::with_catch_all().route(
        Matcher::post("/login"),
        handler(|_req: Request| async move {
            let mut session = Session::new();
            session.insert("passport", json!({ "user": "u-9" }));

            let mut response = (StatusCode::OK, "signed in").into_response();
            response.extensions_mut().insert(PersistSession(session));
            response
        }),
    );
    let server = TestServer::new(common::test_app_with_routes(login)).unwrap();

    let response = server.post("/login").await;
    response.assert_status_ok();

    let cookies: Vec<String> = response
        .headers()
        .get_all("set-cookie")
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    assert_eq!(cookies.len(), 2);
    assert!(cookies[0].starts_with("session="));
    assert!(cookies[1].starts_with("session.sig="));
    assert!(cookies[0].contains("HttpOnly"));

    // The pair must round-trip through the verifying decoder.
    let value = cookies[0].split(';').next().unwrap();
    let sig = cookies[1].split(';').next().unwrap();
    let mut headers = HeaderMap::new();
    headers.insert("cookie", format!("{value}; {sig}").parse().unwrap());

    let keys = common::TEST_SESSION_KEYS
        .iter()
        .map(|k| k.to_string())
        .collect();
    let decoded = SessionService::new(keys, 90).decode(&headers).unwrap();
    assert_eq!(decoded.get("passport").unwrap()["user"], "u-9");
}

#[tokio::test]
async fn test_untouched_session_sets_no_cookies() {
    let server = TestServer::new(common::test_app()).unwrap();

    let response = server.get("/missing").await;

    assert!(response.headers().get("set-cookie").is_none());
}

#[tokio::test]
async fn test_cors_headers_present() {
    let server = TestServer::new(common::test_app()).unwrap();

    let response = server
        .get("/missing")
        .add_header("origin", "https://shop.example")
        .await;

    assert!(
        response
            .headers()
            .get("access-control-allow-origin")
            .is_some()
    );
}

//! Pipeline composition.
//!
//! # Request order
//!
//! 1. Access log
//! 2. Body-size limits (judged on the wire size, before any rewriting)
//! 3. Sanitization (query + body)
//! 4. CORS
//! 5. Security headers
//! 6. Response throttling (global)
//! 7. Cookie session decode
//! 8. Auth context
//! 9. Request timestamp
//! 10. Rate limiting (`/u` subtree only), then the route table
//!
//! Static assets are tried before the route table; everything the static
//! directory cannot serve falls through to the catch-all 400 page. All
//! layers wrap the static service too, so security headers and logging apply
//! to every response.

use axum::{
    Router,
    extract::{Request, State},
    middleware,
    response::Response,
    routing::any,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::services::ServeDir;

use crate::middleware::{
    access_log, auth, body_limit, cors, rate_limit, received_at, sanitize, security_headers,
    session, slow_down,
};
use crate::state::AppState;

/// Hands the request to the route table.
async fn dispatch_handler(State(st): State<AppState>, req: Request) -> Response {
    st.routes.dispatch(req).await
}

/// Constructs the application router with all routes and middleware.
pub fn app_router(state: AppState) -> Router {
    let behind_proxy = state.config.behind_proxy;
    let throttle = Arc::new(slow_down::SlowDown::with_defaults(behind_proxy));

    // The /u subtree shares the catch-all but adds the hourly limiter.
    let rate_limited = rate_limit::apply(Router::new().fallback(dispatch_handler), behind_proxy);

    // Non-GET methods must fall through to the catch-all, not a 405.
    let static_files = ServeDir::new(&state.config.static_dir)
        .call_fallback_on_method_not_allowed(true)
        .fallback(any(dispatch_handler).with_state(state.clone()));

    Router::new()
        .nest(rate_limit::RATE_LIMIT_PREFIX, rate_limited)
        .fallback_service(static_files)
        .with_state(state.clone())
        // ServiceBuilder applies top-down: the first layer runs first.
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(access_log::access_log_mw))
                .layer(middleware::from_fn(body_limit::body_limit_mw))
                .layer(middleware::from_fn(sanitize::sanitize_mw))
                .layer(cors::layer())
                .layer(middleware::from_fn(security_headers::security_headers_mw))
                .layer(middleware::from_fn_with_state(
                    throttle,
                    slow_down::slow_down_mw,
                ))
                .layer(middleware::from_fn_with_state(state, session::session_mw))
                .layer(middleware::from_fn(auth::auth_mw))
                .layer(middleware::from_fn(received_at::received_at_mw)),
        )
}

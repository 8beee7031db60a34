//! Cross-origin resource sharing.

use tower_http::cors::CorsLayer;

/// Permissive CORS: any origin, method and header.
///
/// The storefront's checkout widgets are served from third-party origins, so
/// the gateway mirrors whatever the browser asks for. Tighten this before
/// exposing authenticated routes.
pub fn layer() -> CorsLayer {
    CorsLayer::permissive()
}

//! Per-IP rate limiting for the `/u` subtree.

use axum::Router;
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use std::sync::Arc;
use std::time::Duration;
use tower_governor::{
    GovernorLayer,
    governor::GovernorConfigBuilder,
    key_extractor::{KeyExtractor, PeerIpKeyExtractor, SmartIpKeyExtractor},
};

/// Path prefix the limiter is scoped to.
pub const RATE_LIMIT_PREFIX: &str = "/u";

/// Requests allowed per window before rejection.
pub const MAX_REQUESTS: u32 = 100;

/// Replenish interval: one permit per 36s, i.e. 100 requests per hour.
pub const REPLENISH_PERIOD: Duration = Duration::from_secs(3600 / MAX_REQUESTS as u64);

/// A limiter layer keyed by `key_extractor`: a burst of [`MAX_REQUESTS`]
/// replenishing at [`REPLENISH_PERIOD`].
fn limit_layer<K>(
    key_extractor: K,
) -> GovernorLayer<K, NoOpMiddleware<QuantaInstant>, axum::body::Body>
where
    K: KeyExtractor,
{
    let conf = Arc::new(
        GovernorConfigBuilder::default()
            .period(REPLENISH_PERIOD)
            .burst_size(MAX_REQUESTS)
            .key_extractor(key_extractor)
            .finish()
            .expect("valid governor configuration"),
    );
    GovernorLayer::new(conf)
}

/// Wraps `router` in the per-IP limiter, so a client gets 100 requests per
/// hour and a `429 Too Many Requests` on the 101st.
///
/// # Key Extraction
///
/// With `behind_proxy` the client IP comes from `X-Forwarded-For` /
/// `X-Real-IP`; otherwise from the socket peer address.
pub fn apply<S>(router: Router<S>, behind_proxy: bool) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    if behind_proxy {
        router.layer(limit_layer(SmartIpKeyExtractor))
    } else {
        router.layer(limit_layer(PeerIpKeyExtractor))
    }
}

//! Response throttling: delay instead of reject.
//!
//! A softer companion to the `/u` rate limiter. Every client gets a fixed
//! 15-minute window; once it has made 100 requests within the window, each
//! further request is held for 500ms before processing. Counters reset when
//! the window rolls over.

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::middleware::client_ip;

/// Requests allowed per window before delays kick in.
pub const DELAY_AFTER: u32 = 100;

/// Fixed window length.
pub const WINDOW: Duration = Duration::from_secs(15 * 60);

/// Delay applied to each request above the threshold.
pub const DELAY: Duration = Duration::from_millis(500);

/// Entries above this count trigger an opportunistic sweep of stale windows.
const SWEEP_THRESHOLD: usize = 10_000;

struct Window {
    started: Instant,
    count: u32,
}

/// Per-IP fixed-window request counter.
pub struct SlowDown {
    windows: Mutex<HashMap<IpAddr, Window>>,
    window: Duration,
    delay_after: u32,
    delay: Duration,
    behind_proxy: bool,
}

impl SlowDown {
    pub fn new(window: Duration, delay_after: u32, delay: Duration, behind_proxy: bool) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            window,
            delay_after,
            delay,
            behind_proxy,
        }
    }

    /// The production policy: 100 requests per 15 minutes, then +500ms each.
    pub fn with_defaults(behind_proxy: bool) -> Self {
        Self::new(WINDOW, DELAY_AFTER, DELAY, behind_proxy)
    }

    /// Records one request for `ip` and returns the delay to apply, if any.
    fn register(&self, ip: IpAddr) -> Option<Duration> {
        let now = Instant::now();
        let mut windows = self.windows.lock().expect("slow-down mutex poisoned");

        if windows.len() > SWEEP_THRESHOLD {
            let window = self.window;
            windows.retain(|_, w| now.duration_since(w.started) < window);
        }

        let entry = windows.entry(ip).or_insert(Window {
            started: now,
            count: 0,
        });

        if now.duration_since(entry.started) >= self.window {
            entry.started = now;
            entry.count = 0;
        }

        entry.count += 1;
        if entry.count > self.delay_after {
            Some(self.delay)
        } else {
            None
        }
    }
}

/// Applies the throttling policy before handing the request on.
///
/// Requests without a resolvable client IP (possible only under test
/// transports) pass through undelayed.
pub async fn slow_down_mw(
    State(throttle): State<Arc<SlowDown>>,
    req: Request,
    next: Next,
) -> Response {
    let peer = req.extensions().get::<ConnectInfo<SocketAddr>>();
    if let Some(ip) = client_ip(req.headers(), peer, throttle.behind_proxy)
        && let Some(delay) = throttle.register(ip)
    {
        tracing::debug!(client = %ip, delay_ms = delay.as_millis() as u64, "Throttling request");
        tokio::time::sleep(delay).await;
    }

    next.run(req).await
}

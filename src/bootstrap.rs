//! Database connection bootstrap.
//!
//! The gateway refuses to accept traffic until its database is reachable.
//! Connection attempts follow bounded exponential backoff with jitter, and
//! progress is published through a [`watch`] channel as an explicit state
//! machine (`Connecting` → `Connected` | `Failed`) so startup is observable
//! instead of an opaque loop.

use crate::config::Config;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;
use tokio::sync::watch;
use tokio_retry::strategy::{ExponentialBackoff, jitter};

/// Observable bootstrap state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbStatus {
    /// An attempt is in flight. `attempt` is 1-based.
    Connecting { attempt: usize },
    Connected,
    /// All attempts were exhausted.
    Failed { attempts: usize },
}

/// Backoff schedule for connection attempts.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.db_connect_attempts,
            base_delay: Duration::from_millis(config.db_retry_base_ms),
            max_delay: Duration::from_millis(config.db_retry_max_ms),
        }
    }

    /// Delays between attempts: base, 2*base, 4*base, ... capped at `max_delay`,
    /// each multiplied by a random jitter factor.
    fn delays(&self) -> impl Iterator<Item = Duration> {
        ExponentialBackoff::from_millis(2)
            .factor((self.base_delay.as_millis() as u64 / 2).max(1))
            .max_delay(self.max_delay)
            .map(jitter)
            .take(self.max_attempts.saturating_sub(1))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("database unreachable after {attempts} attempts: {last_error}")]
    Exhausted { attempts: usize, last_error: String },
}

/// Runs the connect operation under the retry policy, publishing each state
/// transition on `status`.
///
/// Generic over the connect operation so the state machine can be exercised
/// without a live database.
///
/// # Errors
///
/// Returns [`BootstrapError::Exhausted`] once every attempt has failed. The
/// `Failed` state is published before returning.
pub async fn connect_with_retry<T, E, F, Fut>(
    mut connect: F,
    policy: &RetryPolicy,
    status: &watch::Sender<DbStatus>,
) -> Result<T, BootstrapError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut delays = policy.delays();
    let mut last_error = String::new();

    for attempt in 1..=policy.max_attempts {
        let _ = status.send(DbStatus::Connecting { attempt });

        match connect().await {
            Ok(value) => {
                let _ = status.send(DbStatus::Connected);
                return Ok(value);
            }
            Err(e) => {
                last_error = e.to_string();
                match delays.next() {
                    Some(delay) => {
                        tracing::warn!(
                            attempt,
                            max_attempts = policy.max_attempts,
                            retry_in_ms = delay.as_millis() as u64,
                            "Database connection failed: {last_error}"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None => break,
                }
            }
        }
    }

    let _ = status.send(DbStatus::Failed {
        attempts: policy.max_attempts,
    });
    Err(BootstrapError::Exhausted {
        attempts: policy.max_attempts,
        last_error,
    })
}

/// Opens the Postgres pool with the configured retry policy.
///
/// # Errors
///
/// Returns an error once the policy is exhausted; the caller is expected to
/// exit rather than serve traffic without a database.
pub async fn connect_postgres(
    config: &Config,
    status: &watch::Sender<DbStatus>,
) -> Result<PgPool, BootstrapError> {
    let policy = RetryPolicy::from_config(config);

    connect_with_retry(
        || {
            PgPoolOptions::new()
                .max_connections(config.db_max_connections)
                .connect(&config.database_url)
        },
        &policy,
        status,
    )
    .await
}

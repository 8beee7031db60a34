use sqlx::PgPool;
use std::sync::Arc;
use tokio::sync::watch;

use crate::bootstrap::DbStatus;
use crate::config::Config;
use crate::middleware::session::SessionService;
use crate::routing::RouteTable;

/// Shared application state injected into the pipeline and handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: PgPool,
    /// Readiness of the database bootstrap, observable at any time.
    pub db_status: watch::Receiver<DbStatus>,
    pub sessions: Arc<SessionService>,
    pub routes: RouteTable,
}

impl AppState {
    pub fn new(config: Arc<Config>, db: PgPool, db_status: watch::Receiver<DbStatus>) -> Self {
        let sessions = Arc::new(SessionService::new(
            config.session_keys.clone(),
            config.session_max_age_days,
        ));

        Self {
            config,
            db,
            db_status,
            sessions,
            routes: RouteTable::with_catch_all(),
        }
    }
}

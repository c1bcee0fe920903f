use crate::activity::ActivityLogger;
use crate::config::AppConfig;
use crate::core::rate_limit::KeyedRateLimiter;
use crate::core::shared::utils::DbPool;

/// Shared application state handed to every handler.
pub struct AppState {
    pub conn: DbPool,
    pub config: AppConfig,
    pub activity: ActivityLogger,
    pub auth_limiter: KeyedRateLimiter,
}

//! Per-IP rate limiting for the auth endpoints, using the governor library.

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use governor::{
    clock::DefaultClock,
    middleware::NoOpMiddleware,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::{collections::HashMap, net::SocketAddr, num::NonZeroU32, sync::Arc};
use tokio::sync::RwLock;

use crate::config::RateLimitConfig;
use crate::core::error::ApiError;
use crate::core::shared::state::AppState;

type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>;

/// Per-key rate limiter; keys are client IPs. In-memory only: counters
/// reset on process restart, and a multi-instance deployment would need a
/// shared external counter instead.
pub struct KeyedRateLimiter {
    limiters: RwLock<HashMap<String, Arc<Limiter>>>,
    quota: Quota,
    cleanup_threshold: usize,
    enabled: bool,
}

impl KeyedRateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        let quota = Quota::per_second(
            NonZeroU32::new(config.auth_rps).unwrap_or(NonZeroU32::MIN),
        )
        .allow_burst(NonZeroU32::new(config.auth_burst).unwrap_or(NonZeroU32::MIN));

        Self {
            limiters: RwLock::new(HashMap::new()),
            quota,
            cleanup_threshold: 10000,
            enabled: config.enabled,
        }
    }

    /// Check if a key may proceed.
    pub async fn check(&self, key: &str) -> bool {
        if !self.enabled {
            return true;
        }

        let limiter = {
            let limiters = self.limiters.read().await;
            limiters.get(key).cloned()
        };

        let limiter = match limiter {
            Some(l) => l,
            None => {
                let mut limiters = self.limiters.write().await;

                if limiters.len() > self.cleanup_threshold {
                    limiters.clear();
                }

                let new_limiter = Arc::new(RateLimiter::direct(self.quota));
                limiters.insert(key.to_string(), Arc::clone(&new_limiter));
                new_limiter
            }
        };

        limiter.check().is_ok()
    }
}

impl std::fmt::Debug for KeyedRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyedRateLimiter")
            .field("enabled", &self.enabled)
            .field("cleanup_threshold", &self.cleanup_threshold)
            .finish()
    }
}

/// Middleware guarding the `/api/auth` routes.
pub async fn auth_rate_limit(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.uri().path().starts_with("/api/auth")
        && !state.auth_limiter.check(&addr.ip().to_string()).await
    {
        return ApiError::RateLimited.into_response();
    }
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(rps: u32, burst: u32) -> KeyedRateLimiter {
        KeyedRateLimiter::new(&RateLimitConfig {
            auth_rps: rps,
            auth_burst: burst,
            enabled: true,
        })
    }

    #[tokio::test]
    async fn burst_is_honored_then_rejected() {
        let limiter = limiter(1, 3);
        assert!(limiter.check("10.0.0.1").await);
        assert!(limiter.check("10.0.0.1").await);
        assert!(limiter.check("10.0.0.1").await);
        assert!(!limiter.check("10.0.0.1").await);
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let limiter = limiter(1, 1);
        assert!(limiter.check("10.0.0.1").await);
        assert!(!limiter.check("10.0.0.1").await);
        assert!(limiter.check("10.0.0.2").await);
    }

    #[tokio::test]
    async fn disabled_limiter_always_allows() {
        let limiter = KeyedRateLimiter::new(&RateLimitConfig {
            auth_rps: 1,
            auth_burst: 1,
            enabled: false,
        });
        for _ in 0..10 {
            assert!(limiter.check("10.0.0.1").await);
        }
    }
}

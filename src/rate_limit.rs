//! Rate limiting for authentication endpoints.
//!
//! Uses a token bucket algorithm with per-IP tracking to prevent brute force attacks.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use std::{num::NonZeroU32, sync::Arc};
use tracing::warn;

use crate::gateway::client_ip;

/// Per-IP rate limiter.
pub type IpLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Login attempts allowed per IP per minute.
const LOGIN_PER_MIN: u32 = 10;

/// Burst of login attempts allowed before the per-minute rate applies.
const LOGIN_BURST: u32 = 5;

/// Registrations allowed per IP per minute.
const REGISTER_PER_MIN: u32 = 3;

/// Rate limiting configuration for the auth proxy routes.
#[derive(Clone)]
pub struct RateLimitConfig {
    /// Per-IP limiter for `/auth/login`
    pub login: Arc<IpLimiter>,
    /// Per-IP limiter for `/auth/register`
    pub register: Arc<IpLimiter>,
}

impl RateLimitConfig {
    /// Build limiters with explicit per-minute quotas. Zero is treated as one.
    pub fn per_minute(login: u32, login_burst: u32, register: u32) -> Self {
        let nonzero = |n: u32| NonZeroU32::new(n).unwrap_or(NonZeroU32::MIN);
        Self {
            login: Arc::new(RateLimiter::keyed(
                Quota::per_minute(nonzero(login)).allow_burst(nonzero(login_burst)),
            )),
            register: Arc::new(RateLimiter::keyed(Quota::per_minute(nonzero(register)))),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::per_minute(LOGIN_PER_MIN, LOGIN_BURST, REGISTER_PER_MIN)
    }
}

/// Middleware for rate limiting login attempts.
pub async fn rate_limit_login(
    State(config): State<RateLimitConfig>,
    request: Request,
    next: Next,
) -> Response {
    check(
        &config.login,
        request,
        next,
        "Too many login attempts. Please wait before trying again.",
    )
    .await
}

/// Middleware for rate limiting registrations.
pub async fn rate_limit_register(
    State(config): State<RateLimitConfig>,
    request: Request,
    next: Next,
) -> Response {
    check(
        &config.register,
        request,
        next,
        "Too many signup attempts. Please wait before trying again.",
    )
    .await
}

async fn check(
    limiter: &IpLimiter,
    request: Request,
    next: Next,
    message: &'static str,
) -> Response {
    let ip = client_ip(&request);

    match limiter.check_key(&ip) {
        Ok(_) => next.run(request).await,
        Err(_) => {
            warn!(ip = %ip, path = %request.uri().path(), "Rate limit exceeded");
            (StatusCode::TOO_MANY_REQUESTS, message).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_burst_then_limited() {
        let config = RateLimitConfig::per_minute(1, 3, 1);
        let ip = "203.0.113.7".to_string();

        for _ in 0..3 {
            assert!(config.login.check_key(&ip).is_ok());
        }
        assert!(config.login.check_key(&ip).is_err());

        // Other clients have their own bucket
        assert!(config.login.check_key(&"198.51.100.1".to_string()).is_ok());
    }

    #[test]
    fn test_zero_quota_is_clamped() {
        let config = RateLimitConfig::per_minute(0, 0, 0);
        let ip = "203.0.113.7".to_string();
        assert!(config.register.check_key(&ip).is_ok());
        assert!(config.register.check_key(&ip).is_err());
    }
}

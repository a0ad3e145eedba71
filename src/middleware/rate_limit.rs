//! Per-IP perimeter rate limiting using governor.
//!
//! This is the transport-level brake, separate from the persisted
//! per-(actor, organization) invite budget in [`crate::ratelimit`]. Two
//! tiers share one enforcement path: a general limiter over every route,
//! and a stricter one on the public acceptance endpoint since it is
//! reachable without credentials.

use axum::{
    body::Body,
    extract::{ConnectInfo, Request},
    http::{HeaderValue, Response, StatusCode},
    middleware::Next,
    response::IntoResponse,
};
use governor::{
    clock::{Clock, DefaultClock},
    middleware::NoOpMiddleware,
    state::keyed::DashMapStateStore,
    Quota, RateLimiter,
};
use serde::Serialize;
use std::{net::IpAddr, net::SocketAddr, num::NonZeroU32, sync::Arc, time::Duration};
use tracing::warn;

pub type KeyedRateLimiter =
    RateLimiter<IpAddr, DashMapStateStore<IpAddr>, DefaultClock, NoOpMiddleware>;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub requests_per_window: u32,
    pub window_secs: u64,
    pub enabled: bool,
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_window: 60,
            window_secs: 60,
            enabled: true,
            burst_size: 30,
        }
    }
}

impl RateLimitConfig {
    pub fn new(requests_per_window: u32, window_secs: u64) -> Self {
        Self {
            requests_per_window,
            window_secs,
            enabled: true,
            burst_size: requests_per_window / 2,
        }
    }

    /// Tightened quota for the unauthenticated onboarding surface.
    pub fn strict() -> Self {
        Self {
            requests_per_window: 20,
            window_secs: 60,
            enabled: true,
            burst_size: 10,
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    pub fn create_limiter(&self) -> Option<Arc<KeyedRateLimiter>> {
        if !self.enabled {
            return None;
        }

        // A zero rate is rejected at config load; the floor here keeps a
        // hand-built config from dividing by zero.
        let rate = self.requests_per_window.max(1);
        let replenish_interval_ns = (self.window_secs as u128 * 1_000_000_000) / rate as u128;
        let replenish_interval = Duration::from_nanos(replenish_interval_ns as u64);

        let quota = Quota::with_period(replenish_interval)
            .expect("Replenish interval should be valid")
            .allow_burst(
                NonZeroU32::new(self.burst_size.max(1)).expect("Burst size should be non-zero"),
            );

        Some(Arc::new(RateLimiter::dashmap(quota)))
    }
}

/// Which of the two quota tiers a route sits behind.
#[derive(Debug, Clone, Copy)]
enum LimiterTier {
    Perimeter,
    Accept,
}

impl LimiterTier {
    fn denial_message(self) -> &'static str {
        match self {
            LimiterTier::Perimeter => "Too many requests",
            LimiterTier::Accept => "Too many onboarding attempts",
        }
    }
}

#[derive(Clone)]
pub struct RateLimitState {
    pub global_limiter: Option<Arc<KeyedRateLimiter>>,
    pub accept_limiter: Option<Arc<KeyedRateLimiter>>,
    pub config: RateLimitConfig,
}

impl RateLimitState {
    pub fn new() -> Self {
        Self::with_config(RateLimitConfig::default(), RateLimitConfig::strict())
    }

    pub fn with_config(global_config: RateLimitConfig, accept_config: RateLimitConfig) -> Self {
        Self {
            global_limiter: global_config.create_limiter(),
            accept_limiter: accept_config.create_limiter(),
            config: global_config,
        }
    }

    pub fn disabled() -> Self {
        Self {
            global_limiter: None,
            accept_limiter: None,
            config: RateLimitConfig::disabled(),
        }
    }

    fn limiter_for(&self, tier: LimiterTier) -> Option<&Arc<KeyedRateLimiter>> {
        match tier {
            LimiterTier::Perimeter => self.global_limiter.as_ref(),
            LimiterTier::Accept => self.accept_limiter.as_ref(),
        }
    }
}

impl Default for RateLimitState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Serialize)]
pub struct RateLimitExceeded {
    pub error: String,
    pub retry_after_secs: u64,
}

impl IntoResponse for RateLimitExceeded {
    fn into_response(self) -> axum::response::Response {
        let body = serde_json::to_string(&self)
            .unwrap_or_else(|_| r#"{"error":"Rate limit exceeded"}"#.to_string());

        let mut response = Response::builder()
            .status(StatusCode::TOO_MANY_REQUESTS)
            .header("Content-Type", "application/json")
            .header("Retry-After", self.retry_after_secs.to_string())
            .body(Body::from(body))
            .unwrap();

        if let Ok(value) = HeaderValue::from_str(&self.retry_after_secs.to_string()) {
            response.headers_mut().insert("X-RateLimit-Reset", value);
        }

        response
    }
}

fn client_ip(req: &Request) -> IpAddr {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip())
        .unwrap_or(IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED))
}

async fn enforce(
    state: Option<RateLimitState>,
    tier: LimiterTier,
    request: Request,
    next: Next,
) -> Result<axum::response::Response, RateLimitExceeded> {
    let Some(state) = state else {
        return Ok(next.run(request).await);
    };
    let Some(limiter) = state.limiter_for(tier) else {
        return Ok(next.run(request).await);
    };

    let ip = client_ip(&request);

    match limiter.check_key(&ip) {
        Ok(_) => {
            let mut response = next.run(request).await;
            add_rate_limit_headers(&mut response, &state.config);
            Ok(response)
        }
        Err(not_until) => {
            let wait_duration = not_until.wait_time_from(DefaultClock::default().now());
            let retry_after = wait_duration.as_secs().max(1);

            warn!(ip = %ip, tier = ?tier, retry_after_secs = retry_after, "Rate limit exceeded");

            Err(RateLimitExceeded {
                error: tier.denial_message().to_string(),
                retry_after_secs: retry_after,
            })
        }
    }
}

pub async fn rate_limit_middleware(
    rate_limit_state: Option<axum::extract::Extension<RateLimitState>>,
    request: Request,
    next: Next,
) -> Result<axum::response::Response, RateLimitExceeded> {
    let state = rate_limit_state.map(|ext| ext.0);
    enforce(state, LimiterTier::Perimeter, request, next).await
}

/// Stricter limiter for the public invitation-acceptance endpoint.
pub async fn accept_rate_limit_middleware(
    rate_limit_state: Option<axum::extract::Extension<RateLimitState>>,
    request: Request,
    next: Next,
) -> Result<axum::response::Response, RateLimitExceeded> {
    let state = rate_limit_state.map(|ext| ext.0);
    enforce(state, LimiterTier::Accept, request, next).await
}

fn add_rate_limit_headers(response: &mut axum::response::Response, config: &RateLimitConfig) {
    if let Ok(value) = HeaderValue::from_str(&config.requests_per_window.to_string()) {
        response.headers_mut().insert("X-RateLimit-Limit", value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_config_disabled() {
        let config = RateLimitConfig::disabled();
        assert!(!config.enabled);
        assert!(config.create_limiter().is_none());
    }

    #[test]
    fn test_rate_limit_state_default() {
        let state = RateLimitState::default();
        assert!(state.global_limiter.is_some());
        assert!(state.accept_limiter.is_some());
    }

    #[test]
    fn test_zero_rate_does_not_panic() {
        let config = RateLimitConfig::new(0, 60);
        assert!(config.create_limiter().is_some());
    }

    #[test]
    fn test_tier_denial_messages_differ() {
        assert_ne!(
            LimiterTier::Perimeter.denial_message(),
            LimiterTier::Accept.denial_message()
        );
    }

    #[test]
    fn test_rate_limit_exceeded_response() {
        let exceeded = RateLimitExceeded {
            error: "Too many requests".to_string(),
            retry_after_secs: 60,
        };
        let response = exceeded.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn test_per_ip_keyed_limiter() {
        let config = RateLimitConfig {
            requests_per_window: 2,
            window_secs: 60,
            enabled: true,
            burst_size: 2,
        };
        let limiter = config.create_limiter().unwrap();

        let ip1: IpAddr = "1.2.3.4".parse().unwrap();
        let ip2: IpAddr = "5.6.7.8".parse().unwrap();

        // Both IPs get their own budget
        assert!(limiter.check_key(&ip1).is_ok());
        assert!(limiter.check_key(&ip1).is_ok());
        assert!(limiter.check_key(&ip1).is_err());

        assert!(limiter.check_key(&ip2).is_ok());
        assert!(limiter.check_key(&ip2).is_ok());
        assert!(limiter.check_key(&ip2).is_err());
    }
}

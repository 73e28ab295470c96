//! Rate limiting middleware.
//!
//! Two keyed governor limiters: authenticated requests are keyed by user id,
//! anonymous ones by client IP. Each caller may spend `rate_limit_burst`
//! requests at once, then one request per `window / limit`.
//!
//! The client IP is the socket peer unless `trust_proxy_headers` is set, in
//! which case `X-Forwarded-For` and then `X-Real-IP` win.

use crate::auth::AuthContext;
use crate::config::ApiConfig;
use crate::error::ApiError;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header::HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    clock::{Clock, DefaultClock},
    state::keyed::DashMapStateStore,
    Quota, RateLimiter,
};
use slotswap_core::UserId;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

type KeyedLimiter<K> = RateLimiter<K, DashMapStateStore<K>, DefaultClock>;

/// Checks between sweeps of keys whose quota has fully replenished.
const EVICT_EVERY: u64 = 1024;

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum RateLimitKey {
    Ip(IpAddr),
    User(UserId),
}

#[derive(Clone)]
pub struct RateLimitState {
    config: Arc<ApiConfig>,
    by_ip: Arc<KeyedLimiter<IpAddr>>,
    by_user: Arc<KeyedLimiter<UserId>>,
    checks: Arc<AtomicU64>,
}

impl RateLimitState {
    pub fn new(config: ApiConfig) -> Self {
        let by_ip = RateLimiter::dashmap(quota(&config, config.rate_limit_unauthenticated));
        let by_user = RateLimiter::dashmap(quota(&config, config.rate_limit_authenticated));
        Self {
            config: Arc::new(config),
            by_ip: Arc::new(by_ip),
            by_user: Arc::new(by_user),
            checks: Arc::new(AtomicU64::new(0)),
        }
    }

    fn limit_for(&self, key: &RateLimitKey) -> u32 {
        match key {
            RateLimitKey::Ip(_) => self.config.rate_limit_unauthenticated,
            RateLimitKey::User(_) => self.config.rate_limit_authenticated,
        }
    }

    /// Spend one request for `key`, or return the seconds until it may retry.
    fn check(&self, key: &RateLimitKey) -> Result<(), u64> {
        if self.checks.fetch_add(1, Ordering::Relaxed) % EVICT_EVERY == EVICT_EVERY - 1 {
            self.evict_idle();
        }

        let verdict = match key {
            RateLimitKey::Ip(ip) => self.by_ip.check_key(ip),
            RateLimitKey::User(user) => self.by_user.check_key(user),
        };
        verdict.map_err(|not_until| {
            not_until
                .wait_time_from(DefaultClock::default().now())
                .as_secs()
                .max(1)
        })
    }

    /// Forget callers whose quota has fully replenished.
    pub fn evict_idle(&self) {
        self.by_ip.retain_recent();
        self.by_user.retain_recent();
    }

    pub fn tracked_keys(&self) -> usize {
        self.by_ip.len() + self.by_user.len()
    }
}

/// `limit` requests per window, with zero values clamped to one.
fn quota(config: &ApiConfig, limit: u32) -> Quota {
    let limit = NonZeroU32::new(limit).unwrap_or(NonZeroU32::MIN);
    let burst = NonZeroU32::new(config.rate_limit_burst).unwrap_or(NonZeroU32::MIN);
    Quota::with_period(config.rate_limit_window / limit.get())
        .unwrap_or_else(|| Quota::per_second(limit))
        .allow_burst(burst)
}

/// Rejection carrying the seconds until the caller may retry.
#[derive(Debug)]
pub struct RateLimitError {
    pub retry_after: u64,
}

impl IntoResponse for RateLimitError {
    fn into_response(self) -> Response {
        let error = ApiError::too_many_requests(Some(self.retry_after));
        let mut response = (StatusCode::TOO_MANY_REQUESTS, axum::Json(error)).into_response();
        response.headers_mut().insert(
            HeaderName::from_static("retry-after"),
            HeaderValue::from_str(&self.retry_after.to_string())
                .unwrap_or_else(|_| HeaderValue::from_static("60")),
        );
        response
    }
}

/// Client IP for anonymous callers.
fn extract_client_ip(request: &Request, trust_proxy_headers: bool) -> IpAddr {
    let header_ip = |name: &str| {
        request
            .headers()
            .get(name)
            .and_then(|h| h.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|v| v.trim().parse::<IpAddr>().ok())
    };

    let forwarded = if trust_proxy_headers {
        header_ip("x-forwarded-for").or_else(|| header_ip("x-real-ip"))
    } else {
        None
    };

    forwarded
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip())
        })
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

/// Answers 429 with `Retry-After` once a caller exhausts its quota.
pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Result<Response, RateLimitError> {
    if !state.config.rate_limit_enabled {
        return Ok(next.run(request).await);
    }

    let key = match request.extensions().get::<AuthContext>() {
        Some(auth) => RateLimitKey::User(auth.user_id),
        None => RateLimitKey::Ip(extract_client_ip(
            &request,
            state.config.trust_proxy_headers,
        )),
    };

    match state.check(&key) {
        Ok(()) => {
            let mut response = next.run(request).await;
            response.headers_mut().insert(
                HeaderName::from_static("x-ratelimit-limit"),
                HeaderValue::from(state.limit_for(&key)),
            );
            Ok(response)
        }
        Err(retry_after) => {
            tracing::debug!(?key, retry_after, "Rate limit exceeded");
            Err(RateLimitError { retry_after })
        }
    }
}

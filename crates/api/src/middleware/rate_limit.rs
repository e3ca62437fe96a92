//! Rate limiting middleware.
//!
//! Requests are counted per tier and per caller. With Redis configured the
//! counters are shared between instances (fixed one-minute windows); without
//! it each process keeps one keyed governor limiter per tier, pruned of idle
//! callers as it goes.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use domain::models::AuthenticatedUser;
use governor::{
    clock::{Clock, DefaultClock},
    DefaultKeyedRateLimiter, Quota, RateLimiter as GovRateLimiter,
};
use redis::aio::ConnectionManager;
use std::{
    collections::HashMap,
    net::SocketAddr,
    num::NonZeroU32,
    sync::atomic::{AtomicU64, Ordering},
    time::{SystemTime, UNIX_EPOCH},
};
use tracing::{debug, info, warn};

use crate::app::AppState;
use crate::config::{mask_url_password, RateLimitConfig, RateLimitTiers};
use crate::error::ApiError;
use crate::middleware::metrics::record_rate_limit_rejection;

/// Length of one Redis counting window.
const WINDOW_SECS: u64 = 60;

/// Local checks between two sweeps of idle callers.
const PRUNE_EVERY_CHECKS: u64 = 1024;

/// Named request budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateLimitTier {
    /// Sign-up.
    AuthStrict,
    /// Sign-in.
    AuthMedium,
    /// Verification email resend.
    Password,
    /// Authenticated CRUD.
    Standard,
    /// Public reads.
    ReadHeavy,
}

impl RateLimitTier {
    pub const ALL: [RateLimitTier; 5] = [
        RateLimitTier::AuthStrict,
        RateLimitTier::AuthMedium,
        RateLimitTier::Password,
        RateLimitTier::Standard,
        RateLimitTier::ReadHeavy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RateLimitTier::AuthStrict => "auth_strict",
            RateLimitTier::AuthMedium => "auth_medium",
            RateLimitTier::Password => "password",
            RateLimitTier::Standard => "standard",
            RateLimitTier::ReadHeavy => "read_heavy",
        }
    }

    /// Requests per minute for this tier.
    pub fn limit(&self, tiers: &RateLimitTiers) -> u32 {
        match self {
            RateLimitTier::AuthStrict => tiers.auth_strict,
            RateLimitTier::AuthMedium => tiers.auth_medium,
            RateLimitTier::Password => tiers.password,
            RateLimitTier::Standard => tiers.standard,
            RateLimitTier::ReadHeavy => tiers.read_heavy,
        }
    }
}

/// In-process keyed limiters, one per tier.
struct LocalLimiter {
    limiters: HashMap<RateLimitTier, DefaultKeyedRateLimiter<String>>,
    checks: AtomicU64,
}

impl LocalLimiter {
    fn new(tiers: RateLimitTiers) -> Self {
        let limiters = RateLimitTier::ALL
            .into_iter()
            .map(|tier| {
                let per_minute = NonZeroU32::new(tier.limit(&tiers)).unwrap_or(NonZeroU32::MIN);
                (tier, GovRateLimiter::keyed(Quota::per_minute(per_minute)))
            })
            .collect();
        Self {
            limiters,
            checks: AtomicU64::new(0),
        }
    }

    fn check(&self, tier: RateLimitTier, identifier: &str) -> Result<(), u64> {
        let checked = self.checks.fetch_add(1, Ordering::Relaxed) + 1;
        if checked % PRUNE_EVERY_CHECKS == 0 {
            self.prune();
        }

        let Some(limiter) = self.limiters.get(&tier) else {
            return Ok(());
        };
        match limiter.check_key(&identifier.to_string()) {
            Ok(_) => Ok(()),
            Err(not_until) => {
                let wait_time = not_until.wait_time_from(DefaultClock::default().now());
                Err(wait_time.as_secs().max(1))
            }
        }
    }

    /// Drops callers whose budget has fully refilled.
    fn prune(&self) {
        let before = self.len();
        for limiter in self.limiters.values() {
            limiter.retain_recent();
            limiter.shrink_to_fit();
        }
        debug!(before, after = self.len(), "Pruned idle rate limit keys");
    }

    fn len(&self) -> usize {
        self.limiters.values().map(|limiter| limiter.len()).sum()
    }
}

/// Redis-backed fixed-window counters.
struct RedisLimiter {
    conn: ConnectionManager,
    key_prefix: String,
}

impl RedisLimiter {
    async fn check(
        &self,
        tier: RateLimitTier,
        identifier: &str,
        limit: u32,
    ) -> Result<Result<(), u64>, redis::RedisError> {
        let now = unix_now();
        let key = window_key(&self.key_prefix, tier, identifier, now);
        let mut conn = self.conn.clone();

        let count: u64 = redis::cmd("INCR").arg(&key).query_async(&mut conn).await?;
        if count == 1 {
            let _: () = redis::cmd("EXPIRE")
                .arg(&key)
                .arg(WINDOW_SECS)
                .query_async(&mut conn)
                .await?;
        }

        if count > u64::from(limit) {
            Ok(Err(seconds_until_next_window(now)))
        } else {
            Ok(Ok(()))
        }
    }

    async fn ping(&self) -> bool {
        let mut conn = self.conn.clone();
        let pong: Result<String, _> = redis::cmd("PING").query_async(&mut conn).await;
        pong.is_ok()
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Counter key for the window containing `now`.
fn window_key(prefix: &str, tier: RateLimitTier, identifier: &str, now: u64) -> String {
    format!(
        "{}:{}:{}:{}",
        prefix,
        tier.as_str(),
        identifier,
        now / WINDOW_SECS
    )
}

fn seconds_until_next_window(now: u64) -> u64 {
    (WINDOW_SECS - now % WINDOW_SECS).max(1)
}

/// Rate limiter state shared across all requests.
pub struct RateLimiterState {
    tiers: RateLimitTiers,
    local: LocalLimiter,
    redis: Option<RedisLimiter>,
}

impl RateLimiterState {
    /// In-process limiter with the given tier budgets.
    pub fn new(tiers: RateLimitTiers) -> Self {
        Self {
            tiers,
            local: LocalLimiter::new(tiers),
            redis: None,
        }
    }

    /// Builds the limiter from configuration, connecting to Redis when a URL
    /// is configured. An unreachable Redis falls back to in-process limits.
    pub async fn connect(config: &RateLimitConfig) -> Self {
        let mut state = Self::new(config.tiers);

        let Some(url) = config.redis_url.as_deref().filter(|u| !u.is_empty()) else {
            info!("Rate limiting uses in-process counters");
            return state;
        };

        let masked = mask_url_password(url);
        let connected = match redis::Client::open(url) {
            Ok(client) => ConnectionManager::new(client).await,
            Err(e) => Err(e),
        };

        match connected {
            Ok(conn) => {
                info!(redis_url = %masked, "Rate limiting uses Redis");
                state.redis = Some(RedisLimiter {
                    conn,
                    key_prefix: config.key_prefix.clone(),
                });
            }
            Err(e) => {
                warn!(
                    redis_url = %masked,
                    error = %e,
                    "Redis unavailable, falling back to in-process rate limiting"
                );
            }
        }

        state
    }

    /// Which backend counts requests.
    pub fn backend(&self) -> &'static str {
        if self.redis.is_some() {
            "redis"
        } else {
            "memory"
        }
    }

    /// `None` without Redis, otherwise whether it answers `PING`.
    pub async fn redis_healthy(&self) -> Option<bool> {
        match &self.redis {
            Some(redis) => Some(redis.ping().await),
            None => None,
        }
    }

    /// Check if a request should be allowed.
    /// Returns Err with retry-after seconds when the budget is spent.
    pub async fn check(&self, tier: RateLimitTier, identifier: &str) -> Result<(), u64> {
        match &self.redis {
            Some(redis) => match redis.check(tier, identifier, tier.limit(&self.tiers)).await {
                Ok(decision) => decision,
                Err(e) => {
                    warn!(
                        tier = tier.as_str(),
                        error = %e,
                        "Rate limit check failed, allowing request"
                    );
                    Ok(())
                }
            },
            None => self.local.check(tier, identifier),
        }
    }
}

impl std::fmt::Debug for RateLimiterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiterState")
            .field("backend", &self.backend())
            .field("tiers", &self.tiers)
            .field("active_limiters", &self.local.len())
            .finish()
    }
}

/// Caller identity used as the rate limit key.
///
/// Authenticated requests are keyed by local user; anonymous ones by client
/// address (first `X-Forwarded-For` hop, then `X-Real-IP`, then the socket).
pub fn client_identifier(req: &Request<Body>) -> String {
    if let Some(user) = req.extensions().get::<AuthenticatedUser>() {
        return format!("user:{}", user.user_id);
    }

    let socket = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string());

    match client_ip(req.headers()).or(socket) {
        Some(ip) => format!("ip:{}", ip),
        None => "ip:unknown".to_string(),
    }
}

fn client_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    forwarded.or_else(real_ip).map(str::to_string)
}

/// Middleware that applies one tier's budget.
///
/// On protected routes it must run after authentication so the caller is
/// keyed by user rather than by address.
pub async fn rate_limit_middleware(
    State((state, tier)): State<(AppState, RateLimitTier)>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let Some(rate_limiter) = state.rate_limiter.as_ref() else {
        return next.run(req).await;
    };

    let identifier = client_identifier(&req);
    if let Err(retry_after) = rate_limiter.check(tier, &identifier).await {
        record_rate_limit_rejection(tier.as_str());
        warn!(
            tier = tier.as_str(),
            identifier = %identifier,
            retry_after,
            "Rate limit exceeded"
        );
        return ApiError::RateLimited { retry_after }.into_response();
    }

    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, StatusCode};
    use uuid::Uuid;

    fn tiers(limit: u32) -> RateLimitTiers {
        RateLimitTiers {
            auth_strict: limit,
            auth_medium: limit,
            password: limit,
            standard: limit,
            read_heavy: limit,
        }
    }

    #[test]
    fn test_tier_names_and_limits() {
        let tiers = RateLimitTiers::default();
        assert_eq!(RateLimitTier::AuthStrict.as_str(), "auth_strict");
        assert_eq!(RateLimitTier::AuthStrict.limit(&tiers), 5);
        assert_eq!(RateLimitTier::AuthMedium.limit(&tiers), 10);
        assert_eq!(RateLimitTier::Password.limit(&tiers), 3);
        assert_eq!(RateLimitTier::Standard.limit(&tiers), 100);
        assert_eq!(RateLimitTier::ReadHeavy.limit(&tiers), 200);
    }

    #[tokio::test]
    async fn test_rate_limiter_exhaustion() {
        let state = RateLimiterState::new(tiers(1));
        assert!(state.check(RateLimitTier::Standard, "ip:1.2.3.4").await.is_ok());

        let result = state.check(RateLimitTier::Standard, "ip:1.2.3.4").await;
        assert!(result.unwrap_err() >= 1);
    }

    #[tokio::test]
    async fn test_rate_limiter_tier_budget() {
        let state = RateLimiterState::new(RateLimitTiers::default());
        for i in 0..3 {
            let result = state.check(RateLimitTier::Password, "ip:10.0.0.1").await;
            assert!(result.is_ok(), "Request {} should be allowed", i);
        }
        assert!(state.check(RateLimitTier::Password, "ip:10.0.0.1").await.is_err());
    }

    #[tokio::test]
    async fn test_rate_limiter_callers_independent() {
        let state = RateLimiterState::new(tiers(1));
        assert!(state.check(RateLimitTier::Standard, "user:a").await.is_ok());
        assert!(state.check(RateLimitTier::Standard, "user:b").await.is_ok());
        assert!(state.check(RateLimitTier::Standard, "user:a").await.is_err());
    }

    #[tokio::test]
    async fn test_rate_limiter_tiers_independent() {
        let state = RateLimiterState::new(tiers(1));
        assert!(state.check(RateLimitTier::AuthStrict, "ip:1.1.1.1").await.is_ok());
        assert!(state.check(RateLimitTier::AuthMedium, "ip:1.1.1.1").await.is_ok());
        assert!(state.check(RateLimitTier::AuthStrict, "ip:1.1.1.1").await.is_err());
    }

    #[test]
    fn test_local_keys_per_tier_and_caller() {
        let local = LocalLimiter::new(tiers(10));
        assert!(local.check(RateLimitTier::Standard, "user:x").is_ok());
        assert!(local.check(RateLimitTier::Standard, "user:x").is_ok());
        assert!(local.check(RateLimitTier::ReadHeavy, "user:x").is_ok());
        assert_eq!(local.len(), 2);
    }

    #[test]
    fn test_idle_callers_are_pruned() {
        // 60k per minute refills one cell per millisecond.
        let local = LocalLimiter::new(tiers(60_000));
        for i in 0..100 {
            assert!(local.check(RateLimitTier::ReadHeavy, &format!("ip:10.0.0.{}", i)).is_ok());
        }
        assert_eq!(local.len(), 100);

        std::thread::sleep(std::time::Duration::from_millis(20));
        local.prune();
        assert_eq!(local.len(), 0);
    }

    #[test]
    fn test_exhausted_callers_survive_pruning() {
        let local = LocalLimiter::new(tiers(1));
        assert!(local.check(RateLimitTier::Password, "ip:192.0.2.1").is_ok());
        local.prune();
        assert_eq!(local.len(), 1);
        assert!(local.check(RateLimitTier::Password, "ip:192.0.2.1").is_err());
    }

    #[test]
    fn test_pruning_runs_during_checks() {
        let local = LocalLimiter::new(tiers(60_000));
        for i in 0..PRUNE_EVERY_CHECKS - 1 {
            let _ = local.check(RateLimitTier::Standard, &format!("user:{}", i));
        }
        assert_eq!(local.len() as u64, PRUNE_EVERY_CHECKS - 1);

        std::thread::sleep(std::time::Duration::from_millis(20));
        assert!(local.check(RateLimitTier::Standard, "user:last").is_ok());
        assert!(local.len() <= 1);
    }

    #[tokio::test]
    async fn test_connect_without_redis_uses_memory() {
        let config = RateLimitConfig {
            enabled: true,
            redis_url: None,
            key_prefix: "test".to_string(),
            tiers: RateLimitTiers::default(),
        };
        let state = RateLimiterState::connect(&config).await;
        assert_eq!(state.backend(), "memory");
        assert_eq!(state.redis_healthy().await, None);
        assert!(format!("{:?}", state).contains("memory"));
    }

    #[tokio::test]
    async fn test_connect_with_invalid_redis_url_falls_back() {
        let config = RateLimitConfig {
            enabled: true,
            redis_url: Some("not-a-redis-url".to_string()),
            key_prefix: "test".to_string(),
            tiers: RateLimitTiers::default(),
        };
        let state = RateLimiterState::connect(&config).await;
        assert_eq!(state.backend(), "memory");
    }

    #[test]
    fn test_window_key() {
        assert_eq!(
            window_key("bulletin:ratelimit", RateLimitTier::ReadHeavy, "ip:1.2.3.4", 125),
            "bulletin:ratelimit:read_heavy:ip:1.2.3.4:2"
        );
    }

    #[test]
    fn test_seconds_until_next_window() {
        assert_eq!(seconds_until_next_window(120), 60);
        assert_eq!(seconds_until_next_window(179), 1);
        assert_eq!(seconds_until_next_window(150), 30);
    }

    #[test]
    fn test_client_identifier_prefers_user() {
        let user_id = Uuid::new_v4();
        let mut req = Request::builder()
            .header("x-forwarded-for", "203.0.113.9")
            .body(Body::empty())
            .unwrap();
        req.extensions_mut().insert(AuthenticatedUser {
            user_id,
            provider_user_id: Uuid::new_v4(),
            email: "a@example.com".into(),
            is_active: true,
            role: "authenticated".into(),
        });
        assert_eq!(client_identifier(&req), format!("user:{}", user_id));
    }

    #[test]
    fn test_client_identifier_forwarded_first_hop() {
        let req = Request::builder()
            .header("x-forwarded-for", " 203.0.113.9 , 10.0.0.1")
            .header("x-real-ip", "198.51.100.2")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_identifier(&req), "ip:203.0.113.9");
    }

    #[test]
    fn test_client_identifier_real_ip_then_socket() {
        let req = Request::builder()
            .header("x-real-ip", "198.51.100.2")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_identifier(&req), "ip:198.51.100.2");

        let mut req = Request::builder().body(Body::empty()).unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 7], 4321))));
        assert_eq!(client_identifier(&req), "ip:192.0.2.7");

        let req = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(client_identifier(&req), "ip:unknown");
    }

    #[test]
    fn test_rate_limited_response_format() {
        let response = ApiError::RateLimited { retry_after: 60 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "60");
    }
}

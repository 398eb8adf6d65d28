use std::{
    collections::HashMap,
    env,
    net::{IpAddr, SocketAddr},
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use axum::{
    body::Body,
    extract::{connect_info::ConnectInfo, MatchedPath, State},
    http::{HeaderName, HeaderValue, Method, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::ApiError;
use crate::metrics;

const DEFAULT_LIMIT_PER_MINUTE: u32 = 60;
const DEFAULT_HEALTH_LIMIT_PER_MINUTE: u32 = 10_000;
const DEFAULT_WINDOW_SECONDS: u64 = 60;
const ENDPOINT_LIMIT_ENV_PREFIX: &str = "RATE_LIMIT_ENDPOINT_";
/// Bucket count above which expired windows are swept
const DEFAULT_PRUNE_THRESHOLD: usize = 10_000;
/// Shared endpoint key for requests no route matched
const UNMATCHED_ENDPOINT_KEY: &str = "UNMATCHED";

/// Built-in per-endpoint limits, relative to the API prefix
const BUILTIN_ENDPOINT_LIMITS: [(Method, &str, u32); 5] = [
    (Method::GET, "/products/compare", 20),
    (Method::POST, "/products/compare", 20),
    (Method::GET, "/deals", 30),
    (Method::POST, "/deals", 30),
    (Method::GET, "/deals/campaigns", 20),
];

const HEADER_RATE_LIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const HEADER_RATE_LIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const HEADER_RATE_LIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Fixed-window limiter keyed by client IP and endpoint
#[derive(Clone)]
pub struct RateLimitState {
    config: Arc<RateLimitConfig>,
    buckets: Arc<Mutex<HashMap<BucketKey, BucketState>>>,
}

impl RateLimitState {
    pub fn from_env(api_prefix: &str) -> Self {
        Self::new(RateLimitConfig::from_env(api_prefix))
    }

    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config: Arc::new(config),
            buckets: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn check_request<B>(&self, request: &Request<B>) -> RateLimitDecision {
        let (limit, endpoint_key) = self.select_limit(request);
        let ip = extract_client_ip(request);
        let key = BucketKey {
            ip,
            endpoint_key: endpoint_key.clone(),
        };
        let now = Instant::now();

        let mut buckets = self
            .buckets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if buckets.len() >= self.config.prune_threshold {
            let window = self.config.window;
            buckets.retain(|_, bucket| now.duration_since(bucket.window_start) < window);
        }

        let bucket = buckets.entry(key).or_insert_with(|| BucketState {
            window_start: now,
            count: 0,
        });

        if now.duration_since(bucket.window_start) >= self.config.window {
            bucket.window_start = now;
            bucket.count = 0;
        }

        let remaining_window = self
            .config
            .window
            .saturating_sub(now.duration_since(bucket.window_start));
        let reset_seconds = ceil_duration_to_seconds(remaining_window).max(1);

        if bucket.count >= limit {
            return RateLimitDecision {
                allowed: false,
                limit,
                remaining: 0,
                reset_seconds,
                endpoint_key,
            };
        }

        bucket.count += 1;
        let remaining = limit.saturating_sub(bucket.count);

        RateLimitDecision {
            allowed: true,
            limit,
            remaining,
            reset_seconds,
            endpoint_key,
        }
    }

    fn select_limit<B>(&self, request: &Request<B>) -> (u32, String) {
        let method = request.method();
        let Some(matched_path) = request
            .extensions()
            .get::<MatchedPath>()
            .map(|p| p.as_str())
        else {
            return (self.config.default_limit, UNMATCHED_ENDPOINT_KEY.to_string());
        };
        let endpoint_key = endpoint_key(method, matched_path);

        if let Some(limit) = self.config.endpoint_limits.get(&endpoint_key) {
            return (*limit, endpoint_key);
        }

        if matched_path == "/health" || method == Method::OPTIONS {
            return (self.config.health_limit, endpoint_key);
        }

        (self.config.default_limit, endpoint_key)
    }

    fn describe_limit(&self, limit: u32) -> String {
        format!("{} per {} second", limit, self.config.window.as_secs())
    }
}

pub struct RateLimitConfig {
    default_limit: u32,
    health_limit: u32,
    window: Duration,
    endpoint_limits: HashMap<String, u32>,
    prune_threshold: usize,
}

impl RateLimitConfig {
    pub fn from_env(api_prefix: &str) -> Self {
        let default_limit = env_u32("RATE_LIMIT_PER_MINUTE", DEFAULT_LIMIT_PER_MINUTE);
        let health_limit = env_u32(
            "RATE_LIMIT_HEALTH_PER_MINUTE",
            DEFAULT_HEALTH_LIMIT_PER_MINUTE,
        );
        let window_seconds = env_u64("RATE_LIMIT_WINDOW_SECONDS", DEFAULT_WINDOW_SECONDS).max(1);

        let mut endpoint_limits = builtin_endpoint_limits(api_prefix);
        for (key, value) in env::vars() {
            let Some(endpoint_key) = key.strip_prefix(ENDPOINT_LIMIT_ENV_PREFIX) else {
                continue;
            };

            let Ok(limit) = value.parse::<u32>() else {
                tracing::warn!("Ignoring invalid endpoint rate limit `{key}`: `{value}`");
                continue;
            };
            if limit == 0 {
                tracing::warn!("Ignoring zero endpoint rate limit `{key}`");
                continue;
            }

            endpoint_limits.insert(endpoint_key.to_string(), limit);
        }

        tracing::info!(
            default_limit,
            health_limit,
            window_seconds,
            endpoint_limits = endpoint_limits.len(),
            "Rate limiter configured"
        );

        Self {
            default_limit,
            health_limit,
            window: Duration::from_secs(window_seconds),
            endpoint_limits,
            prune_threshold: DEFAULT_PRUNE_THRESHOLD,
        }
    }

    /// Limits without reading the environment
    pub fn fixed(
        api_prefix: &str,
        default_limit: u32,
        health_limit: u32,
        window: Duration,
    ) -> Self {
        Self {
            default_limit,
            health_limit,
            window,
            endpoint_limits: builtin_endpoint_limits(api_prefix),
            prune_threshold: DEFAULT_PRUNE_THRESHOLD,
        }
    }

    pub fn with_prune_threshold(mut self, prune_threshold: usize) -> Self {
        self.prune_threshold = prune_threshold.max(1);
        self
    }

    pub fn with_endpoint_limit(mut self, method: &Method, path: &str, limit: u32) -> Self {
        self.endpoint_limits.insert(endpoint_key(method, path), limit);
        self
    }
}

fn builtin_endpoint_limits(api_prefix: &str) -> HashMap<String, u32> {
    BUILTIN_ENDPOINT_LIMITS
        .iter()
        .map(|(method, path, limit)| {
            (endpoint_key(method, &format!("{api_prefix}{path}")), *limit)
        })
        .collect()
}

#[derive(Hash, Eq, PartialEq)]
struct BucketKey {
    ip: String,
    endpoint_key: String,
}

struct BucketState {
    window_start: Instant,
    count: u32,
}

struct RateLimitDecision {
    allowed: bool,
    limit: u32,
    remaining: u32,
    reset_seconds: u64,
    endpoint_key: String,
}

pub async fn rate_limit_middleware(
    State(rate_limiter): State<RateLimitState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let decision = rate_limiter.check_request(&request);

    if !decision.allowed {
        tracing::warn!(
            endpoint = %decision.endpoint_key,
            limit = decision.limit,
            "Rate limit exceeded"
        );
        metrics::RATE_LIMITED_TOTAL
            .with_label_values(&[&decision.endpoint_key])
            .inc();

        let mut response = ApiError::RateLimited {
            limit: rate_limiter.describe_limit(decision.limit),
            retry_after: Some(decision.reset_seconds),
        }
        .into_response();
        attach_rate_limit_headers(&mut response, &decision);
        return response;
    }

    let mut response = next.run(request).await;
    attach_rate_limit_headers(&mut response, &decision);
    response
}

fn attach_rate_limit_headers(response: &mut Response, decision: &RateLimitDecision) {
    response.headers_mut().insert(
        HEADER_RATE_LIMIT_LIMIT,
        HeaderValue::from_str(&decision.limit.to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("0")),
    );
    response.headers_mut().insert(
        HEADER_RATE_LIMIT_REMAINING,
        HeaderValue::from_str(&decision.remaining.to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("0")),
    );
    response.headers_mut().insert(
        HEADER_RATE_LIMIT_RESET,
        HeaderValue::from_str(&decision.reset_seconds.to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("1")),
    );
}

fn extract_client_ip<B>(request: &Request<B>) -> String {
    if let Some(ip) = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(parse_x_forwarded_for)
    {
        return ip.to_string();
    }

    if let Some(ip) = request
        .headers()
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .and_then(parse_ip_addr)
    {
        return ip.to_string();
    }

    if let Some(connect_info) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return connect_info.0.ip().to_string();
    }

    "unknown".to_string()
}

fn parse_x_forwarded_for(raw: &str) -> Option<IpAddr> {
    raw.split(',').map(str::trim).find_map(parse_ip_addr)
}

fn parse_ip_addr(raw: &str) -> Option<IpAddr> {
    raw.parse::<IpAddr>()
        .ok()
        .or_else(|| raw.parse::<SocketAddr>().ok().map(|addr| addr.ip()))
}

/// `GET /api/v1/deals/campaigns` becomes `GET_API_V1_DEALS_CAMPAIGNS`
pub fn endpoint_key(method: &Method, path: &str) -> String {
    let normalized_path = path
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect::<String>();

    let compact_path = normalized_path
        .split('_')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_");

    if compact_path.is_empty() {
        format!("{}_ROOT", method.as_str().to_ascii_uppercase())
    } else {
        format!("{}_{}", method.as_str().to_ascii_uppercase(), compact_path)
    }
}

fn env_u32(key: &str, default: u32) -> u32 {
    match env::var(key) {
        Ok(raw) => match raw.parse::<u32>() {
            Ok(value) if value > 0 => value,
            _ => {
                tracing::warn!("Invalid value for {key} (`{raw}`), using default {default}");
                default
            }
        },
        Err(_) => default,
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    match env::var(key) {
        Ok(raw) => match raw.parse::<u64>() {
            Ok(value) if value > 0 => value,
            _ => {
                tracing::warn!("Invalid value for {key} (`{raw}`), using default {default}");
                default
            }
        },
        Err(_) => default,
    }
}

fn ceil_duration_to_seconds(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        http::{header::RETRY_AFTER, StatusCode},
        middleware,
        routing::{get, post},
        Router,
    };
    use tower::Service;

    fn test_app(config: RateLimitConfig) -> Router<()> {
        let limiter = RateLimitState::new(config);

        Router::new()
            .route("/health", get(|| async { "ok" }))
            .route("/api/v1/products/compare", get(|| async { "compare" }))
            .route("/api/v1/deals", post(|| async { "deals" }))
            .route("/api/v1/other", get(|| async { "other" }))
            .layer(middleware::from_fn_with_state(
                limiter,
                rate_limit_middleware,
            ))
    }

    fn request(method: &str, uri: &str, ip: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .method(method)
            .header("x-forwarded-for", ip)
            .body(Body::empty())
            .unwrap()
    }

    async fn call(app: &Router<()>, request: Request<Body>) -> Response {
        let mut svc = app.clone();
        svc.call(request).await.unwrap()
    }

    #[test]
    fn endpoint_keys_are_normalized() {
        assert_eq!(
            endpoint_key(&Method::GET, "/api/v1/deals/campaigns"),
            "GET_API_V1_DEALS_CAMPAIGNS"
        );
        assert_eq!(endpoint_key(&Method::POST, "/"), "POST_ROOT");
    }

    #[tokio::test]
    async fn compare_endpoint_returns_429_on_21st_request() {
        let app = test_app(RateLimitConfig::fixed(
            "/api/v1",
            60,
            10_000,
            Duration::from_secs(60),
        ));

        for _ in 0..20 {
            let response = call(&app, request("GET", "/api/v1/products/compare", "203.0.113.10")).await;
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = call(&app, request("GET", "/api/v1/products/compare", "203.0.113.10")).await;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key(RETRY_AFTER));

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["code"], "RATE_LIMIT_EXCEEDED");
        assert_eq!(body["error"]["message"], "Rate limit exceeded: 20 per 60 second");
    }

    #[tokio::test]
    async fn clients_are_limited_independently() {
        let app = test_app(RateLimitConfig::fixed("/api/v1", 1, 10_000, Duration::from_secs(60)));

        let first = call(&app, request("GET", "/api/v1/other", "198.51.100.1")).await;
        assert_eq!(first.status(), StatusCode::OK);
        let limited = call(&app, request("GET", "/api/v1/other", "198.51.100.1")).await;
        assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);

        let other_client = call(&app, request("GET", "/api/v1/other", "198.51.100.2")).await;
        assert_eq!(other_client.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn includes_rate_limit_headers_on_success_and_429() {
        let app = test_app(RateLimitConfig::fixed("/api/v1", 1, 10_000, Duration::from_secs(60)));

        let ok_response = call(&app, request("GET", "/api/v1/other", "198.51.100.22")).await;
        assert_eq!(ok_response.status(), StatusCode::OK);
        assert_eq!(ok_response.headers()[HEADER_RATE_LIMIT_LIMIT], "1");
        assert_eq!(ok_response.headers()[HEADER_RATE_LIMIT_REMAINING], "0");
        assert!(ok_response.headers().contains_key(HEADER_RATE_LIMIT_RESET));

        let limited_response = call(&app, request("GET", "/api/v1/other", "198.51.100.22")).await;
        assert_eq!(limited_response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(limited_response.headers().contains_key(HEADER_RATE_LIMIT_LIMIT));
        assert!(limited_response.headers().contains_key(HEADER_RATE_LIMIT_RESET));
        assert!(limited_response.headers().contains_key(RETRY_AFTER));
    }

    #[tokio::test]
    async fn allows_requests_again_after_window_reset() {
        let app = test_app(RateLimitConfig::fixed("/api/v1", 1, 10_000, Duration::from_secs(1)));

        let first = call(&app, request("GET", "/api/v1/other", "192.0.2.44")).await;
        assert_eq!(first.status(), StatusCode::OK);

        let second = call(&app, request("GET", "/api/v1/other", "192.0.2.44")).await;
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);

        tokio::time::sleep(Duration::from_secs(2)).await;

        let third = call(&app, request("GET", "/api/v1/other", "192.0.2.44")).await;
        assert_eq!(third.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn endpoint_override_takes_precedence() {
        let config = RateLimitConfig::fixed("/api/v1", 60, 10_000, Duration::from_secs(60))
            .with_endpoint_limit(&Method::POST, "/api/v1/deals", 1);
        let app = test_app(config);

        let ok = call(&app, request("POST", "/api/v1/deals", "203.0.113.33")).await;
        assert_eq!(ok.status(), StatusCode::OK);
        let limited = call(&app, request("POST", "/api/v1/deals", "203.0.113.33")).await;
        assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn health_checks_have_high_dedicated_limit() {
        let app = test_app(RateLimitConfig::fixed("/api/v1", 1, 10, Duration::from_secs(60)));
        let ip = "198.51.100.99";

        for _ in 0..10 {
            let response = call(&app, request("GET", "/health", ip)).await;
            assert_eq!(response.status(), StatusCode::OK);
        }

        let limited = call(&app, request("GET", "/health", ip)).await;
        assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    fn tracked_buckets(limiter: &RateLimitState) -> usize {
        limiter.buckets.lock().unwrap().len()
    }

    #[tokio::test]
    async fn unmatched_paths_share_one_bucket() {
        let limiter = RateLimitState::new(RateLimitConfig::fixed(
            "/api/v1",
            1000,
            10_000,
            Duration::from_secs(60),
        ));
        let app = Router::new()
            .route("/health", get(|| async { "ok" }))
            .layer(middleware::from_fn_with_state(
                limiter.clone(),
                rate_limit_middleware,
            ));

        for i in 0..50 {
            let response = call(&app, request("GET", &format!("/junk/{i}"), "203.0.113.7")).await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
        }

        assert_eq!(tracked_buckets(&limiter), 1);
    }

    #[tokio::test]
    async fn expired_buckets_are_swept_once_over_threshold() {
        let limiter = RateLimitState::new(
            RateLimitConfig::fixed("/api/v1", 1000, 10_000, Duration::from_millis(50))
                .with_prune_threshold(10),
        );
        let app = Router::new()
            .route("/api/v1/other", get(|| async { "other" }))
            .layer(middleware::from_fn_with_state(
                limiter.clone(),
                rate_limit_middleware,
            ));

        for i in 0..10 {
            let ip = format!("198.51.100.{i}");
            call(&app, request("GET", "/api/v1/other", &ip)).await;
        }
        assert_eq!(tracked_buckets(&limiter), 10);

        tokio::time::sleep(Duration::from_millis(100)).await;

        let response = call(&app, request("GET", "/api/v1/other", "192.0.2.200")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(tracked_buckets(&limiter), 1);
    }

    #[tokio::test]
    async fn open_windows_survive_a_sweep() {
        let limiter = RateLimitState::new(
            RateLimitConfig::fixed("/api/v1", 1, 10_000, Duration::from_secs(60))
                .with_prune_threshold(2),
        );
        let app = Router::new()
            .route("/api/v1/other", get(|| async { "other" }))
            .layer(middleware::from_fn_with_state(
                limiter.clone(),
                rate_limit_middleware,
            ));

        for ip in ["198.51.100.1", "198.51.100.2", "198.51.100.3"] {
            call(&app, request("GET", "/api/v1/other", ip)).await;
        }
        assert_eq!(tracked_buckets(&limiter), 3);

        let limited = call(&app, request("GET", "/api/v1/other", "198.51.100.1")).await;
        assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}

use std::time::Instant;

use axum::{
    extract::{MatchedPath, Request, State},
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use crate::error::{apply_security_headers, ApiError};
use crate::metrics;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const PROCESSING_TIME_HEADER: &str = "x-processing-time";
const HSTS_VALUE: &str = "max-age=31536000; includeSubDomains";

const ALLOWED_BODY_TYPES: [&str; 3] = [
    "application/json",
    "application/x-www-form-urlencoded",
    "multipart/form-data",
];

const SUSPICIOUS_USER_AGENTS: [&str; 7] = [
    "bot",
    "crawler",
    "spider",
    "scraper",
    "curl",
    "wget",
    "python-requests",
];

/// Identity of the request currently being served
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub method: String,
    pub path: String,
}

tokio::task_local! {
    static REQUEST_CONTEXT: RequestContext;
}

impl RequestContext {
    /// Context of the enclosing request, if called inside [`request_context`]
    pub fn current() -> Option<RequestContext> {
        REQUEST_CONTEXT.try_with(|ctx| ctx.clone()).ok()
    }

    /// Run `fut` with `self` as the current context
    pub async fn scope<F: std::future::Future>(self, fut: F) -> F::Output {
        REQUEST_CONTEXT.scope(self, fut).await
    }
}

/// Reuse a caller-supplied id when it is short printable ASCII
fn incoming_request_id(req: &Request) -> Option<String> {
    let value = req.headers().get(REQUEST_ID_HEADER)?.to_str().ok()?.trim();
    let valid = !value.is_empty()
        && value.len() <= 128
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    valid.then(|| value.to_string())
}

/// Outermost layer: assigns the request id, scopes the context for the rest
/// of the stack and stamps `X-Request-ID` / `X-Processing-Time`.
pub async fn request_context(req: Request, next: Next) -> Response {
    let ctx = RequestContext {
        request_id: incoming_request_id(&req).unwrap_or_else(|| Uuid::new_v4().to_string()),
        method: req.method().to_string(),
        path: req.uri().path().to_string(),
    };
    let request_id = ctx.request_id.clone();
    let start = Instant::now();

    tracing::debug!(
        request_id = %request_id,
        method = %ctx.method,
        path = %ctx.path,
        user_agent = req
            .headers()
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown"),
        "request started"
    );

    let mut response = ctx.scope(next.run(req)).await;

    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        headers.insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
    let elapsed = format!("{:.3}s", start.elapsed().as_secs_f64());
    if let Ok(value) = HeaderValue::from_str(&elapsed) {
        headers.insert(HeaderName::from_static(PROCESSING_TIME_HEADER), value);
    }

    response
}

pub async fn request_logger(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let start = Instant::now();

    metrics::HTTP_IN_FLIGHT.inc();
    let response = next.run(req).await;
    metrics::HTTP_IN_FLIGHT.dec();

    let elapsed = start.elapsed();
    let status = response.status().as_u16();
    metrics::observe_http(method.as_str(), &route, status, elapsed.as_secs_f64());

    tracing::info!("{method} {uri} {status} {}ms", elapsed.as_millis());

    response
}

pub async fn security_headers(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    apply_security_headers(headers);
    headers.insert(
        header::STRICT_TRANSPORT_SECURITY,
        HeaderValue::from_static(HSTS_VALUE),
    );
    response
}

#[derive(Debug, Clone, Copy)]
pub struct GuardConfig {
    pub max_request_bytes: u64,
}

/// Size and content-type checks applied before any handler runs.
///
/// Suspicious user agents are only logged.
pub async fn request_guard(
    State(config): State<GuardConfig>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(length) = req.headers().get(header::CONTENT_LENGTH) {
        let length = length
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .ok_or(ApiError::InvalidContentLength)?;
        if length > config.max_request_bytes {
            return Err(ApiError::RequestTooLarge {
                max_bytes: config.max_request_bytes,
            });
        }
    }

    if matches!(*req.method(), Method::POST | Method::PUT | Method::PATCH) {
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_lowercase();
        if !ALLOWED_BODY_TYPES.iter().any(|t| content_type.contains(t)) {
            return Err(ApiError::UnsupportedMediaType(content_type));
        }
    }

    if let Some(agent) = req
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
    {
        let lowered = agent.to_lowercase();
        if let Some(pattern) = SUSPICIOUS_USER_AGENTS
            .into_iter()
            .find(|p| lowered.contains(p))
        {
            tracing::warn!(pattern, user_agent = agent, "Suspicious user agent detected");
            metrics::SUSPICIOUS_USER_AGENTS_TOTAL
                .with_label_values(&[pattern])
                .inc();
        }
    }

    Ok(next.run(req).await)
}

/// Give the router's bare 405 the JSON error envelope, keeping `Allow`
pub async fn method_not_allowed(req: Request, next: Next) -> Response {
    let response = next.run(req).await;
    if response.status() != StatusCode::METHOD_NOT_ALLOWED
        || response.headers().contains_key(header::CONTENT_TYPE)
    {
        return response;
    }

    let allow = response.headers().get(header::ALLOW).cloned();
    let mut enveloped = ApiError::Http {
        status: StatusCode::METHOD_NOT_ALLOWED,
        message: "Method not allowed".to_string(),
    }
    .into_response();
    if let Some(allow) = allow {
        enveloped.headers_mut().insert(header::ALLOW, allow);
    }
    enveloped
}

use std::backtrace::Backtrace;

use axum::{
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::app_error::AppError;
use crate::metrics;
use crate::request_middleware::RequestContext;
use crate::validation::FieldError;

/// Headers attached to every error response
pub const SECURITY_HEADERS: [(&str, &str); 5] = [
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "DENY"),
    ("x-xss-protection", "1; mode=block"),
    ("referrer-policy", "strict-origin-when-cross-origin"),
    ("content-security-policy", "default-src 'self'"),
];

pub fn apply_security_headers(headers: &mut HeaderMap) {
    for (name, value) in SECURITY_HEADERS {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }
}

/// Every error that can reach the HTTP boundary
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    App(#[from] AppError),

    /// Request body or query string did not match the expected schema
    #[error("request validation failed")]
    Schema(Vec<FieldError>),

    #[error("database error: {0}")]
    Data(#[from] sqlx::Error),

    #[error("rate limit exceeded: {limit}")]
    RateLimited {
        limit: String,
        retry_after: Option<u64>,
    },

    /// Routing-level rejection such as an unknown path
    #[error("{message}")]
    Http { status: StatusCode, message: String },

    #[error("request body larger than {max_bytes} bytes")]
    RequestTooLarge { max_bytes: u64 },

    #[error("invalid content-length header")]
    InvalidContentLength,

    #[error("unsupported content type: {0}")]
    UnsupportedMediaType(String),

    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

/// Wire shape of every error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    pub suggestions: Vec<String>,
    pub details: Map<String, Value>,
    pub timestamp: Option<String>,
    pub request_id: Option<String>,
}

/// How a data-layer failure is reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFailure {
    Integrity,
    Operational,
    Other,
}

impl DataFailure {
    pub fn classify(err: &sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => match db_err.kind() {
                sqlx::error::ErrorKind::UniqueViolation
                | sqlx::error::ErrorKind::ForeignKeyViolation
                | sqlx::error::ErrorKind::NotNullViolation
                | sqlx::error::ErrorKind::CheckViolation => DataFailure::Integrity,
                _ => DataFailure::Other,
            },
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => DataFailure::Operational,
            _ => DataFailure::Other,
        }
    }
}

fn sqlx_error_type(err: &sqlx::Error) -> &'static str {
    match err {
        sqlx::Error::Configuration(_) => "Configuration",
        sqlx::Error::Database(_) => "Database",
        sqlx::Error::Io(_) => "Io",
        sqlx::Error::Tls(_) => "Tls",
        sqlx::Error::Protocol(_) => "Protocol",
        sqlx::Error::RowNotFound => "RowNotFound",
        sqlx::Error::TypeNotFound { .. } => "TypeNotFound",
        sqlx::Error::ColumnIndexOutOfBounds { .. } => "ColumnIndexOutOfBounds",
        sqlx::Error::ColumnNotFound(_) => "ColumnNotFound",
        sqlx::Error::ColumnDecode { .. } => "ColumnDecode",
        sqlx::Error::Decode(_) => "Decode",
        sqlx::Error::PoolTimedOut => "PoolTimedOut",
        sqlx::Error::PoolClosed => "PoolClosed",
        sqlx::Error::WorkerCrashed => "WorkerCrashed",
        sqlx::Error::Migrate(_) => "Migrate",
        _ => "Other",
    }
}

fn http_error_code(status: StatusCode) -> &'static str {
    match status.as_u16() {
        400 => "BAD_REQUEST",
        401 => "UNAUTHORIZED",
        403 => "FORBIDDEN",
        404 => "NOT_FOUND",
        405 => "METHOD_NOT_ALLOWED",
        409 => "CONFLICT",
        422 => "UNPROCESSABLE_ENTITY",
        429 => "TOO_MANY_REQUESTS",
        500 => "INTERNAL_SERVER_ERROR",
        502 => "BAD_GATEWAY",
        503 => "SERVICE_UNAVAILABLE",
        _ => "HTTP_ERROR",
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Status, envelope fields and log severity for one error
struct Rendered {
    status: StatusCode,
    code: String,
    message: String,
    suggestions: Vec<String>,
    details: Map<String, Value>,
    retry_after: Option<u64>,
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::Http {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::App(err) => err.kind().status(),
            ApiError::Schema(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Data(err) => match DataFailure::classify(err) {
                DataFailure::Integrity => StatusCode::BAD_REQUEST,
                DataFailure::Operational | DataFailure::Other => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Http { status, .. } => *status,
            ApiError::RequestTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::InvalidContentLength => StatusCode::BAD_REQUEST,
            ApiError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Server-caused errors log at error level with a backtrace
    pub fn is_server_fault(&self) -> bool {
        self.status().is_server_error()
    }

    fn render(self) -> Rendered {
        let status = self.status();
        match self {
            ApiError::App(err) => {
                let retry_after = err
                    .details()
                    .get("retry_after")
                    .and_then(Value::as_u64);
                let (kind, message, suggestions, details) = err.into_parts();
                Rendered {
                    status,
                    code: kind.code().to_string(),
                    message,
                    suggestions,
                    details,
                    retry_after,
                }
            }
            ApiError::Schema(errors) => {
                let mut details = Map::new();
                details.insert("validation_errors".into(), json!(errors));
                Rendered {
                    status,
                    code: "VALIDATION_ERROR".into(),
                    message: "Request validation failed".into(),
                    suggestions: strings(&[
                        "Check required fields and data types",
                        "Ensure all parameters meet validation requirements",
                        "Review API documentation for correct format",
                    ]),
                    details,
                    retry_after: None,
                }
            }
            ApiError::Data(err) => {
                let mut details = Map::new();
                details.insert("error_type".into(), json!(sqlx_error_type(&err)));
                let (code, message, suggestions) = match DataFailure::classify(&err) {
                    DataFailure::Integrity => (
                        "DATABASE_INTEGRITY_ERROR",
                        "Data integrity constraint violation",
                        strings(&[
                            "Check for duplicate entries",
                            "Ensure foreign key references exist",
                            "Verify data constraints are met",
                        ]),
                    ),
                    DataFailure::Operational => (
                        "DATABASE_OPERATIONAL_ERROR",
                        "Database operation failed",
                        strings(&[
                            "Try again in a few moments",
                            "Check database connectivity",
                            "Contact support if the problem persists",
                        ]),
                    ),
                    DataFailure::Other => (
                        "DATABASE_ERROR",
                        "Database error occurred",
                        strings(&[
                            "Try again in a few moments",
                            "Contact support if the problem persists",
                        ]),
                    ),
                };
                Rendered {
                    status,
                    code: code.into(),
                    message: message.into(),
                    suggestions,
                    details,
                    retry_after: None,
                }
            }
            ApiError::RateLimited { limit, retry_after } => {
                let mut details = Map::new();
                details.insert("retry_after".into(), json!(retry_after));
                Rendered {
                    status,
                    code: "RATE_LIMIT_EXCEEDED".into(),
                    message: format!("Rate limit exceeded: {}", limit),
                    suggestions: strings(&[
                        "Wait before making another request",
                        "Reduce request frequency",
                        "Consider upgrading your plan for higher limits",
                    ]),
                    details,
                    retry_after,
                }
            }
            ApiError::Http { status, message } => {
                let suggestions = if status == StatusCode::NOT_FOUND {
                    strings(&[
                        "Check the request path",
                        "Review API documentation for available endpoints",
                    ])
                } else {
                    strings(&["Review API documentation for correct usage"])
                };
                Rendered {
                    status,
                    code: http_error_code(status).into(),
                    message,
                    suggestions,
                    details: Map::new(),
                    retry_after: None,
                }
            }
            ApiError::RequestTooLarge { max_bytes } => Rendered {
                status,
                code: "REQUEST_TOO_LARGE".into(),
                message: format!("Request body too large. Maximum size: {} bytes", max_bytes),
                suggestions: strings(&[
                    "Reduce the size of your request",
                    "Split large requests into smaller ones",
                ]),
                details: Map::new(),
                retry_after: None,
            },
            ApiError::InvalidContentLength => Rendered {
                status,
                code: "INVALID_CONTENT_LENGTH".into(),
                message: "Invalid Content-Length header".into(),
                suggestions: strings(&[
                    "Check your request headers",
                    "Ensure Content-Length is a valid number",
                ]),
                details: Map::new(),
                retry_after: None,
            },
            ApiError::UnsupportedMediaType(content_type) => Rendered {
                status,
                code: "UNSUPPORTED_MEDIA_TYPE".into(),
                message: format!("Unsupported content type: {}", content_type),
                suggestions: strings(&[
                    "Use application/json for JSON requests",
                    "Use application/x-www-form-urlencoded for form data",
                    "Check your Content-Type header",
                ]),
                details: Map::new(),
                retry_after: None,
            },
            ApiError::Unexpected(_) => {
                let mut details = Map::new();
                details.insert("error_type".into(), json!("UnhandledError"));
                Rendered {
                    status,
                    code: "INTERNAL_SERVER_ERROR".into(),
                    message: "An unexpected error occurred".into(),
                    suggestions: strings(&[
                        "Try again in a few moments",
                        "Contact support if the problem persists",
                    ]),
                    details,
                    retry_after: None,
                }
            }
        }
    }

    /// Build the envelope without touching logs or metrics
    pub fn to_envelope(self, request_id: Option<String>) -> (StatusCode, ErrorEnvelope) {
        let rendered = self.render();
        (rendered.status, envelope_from(&rendered, request_id))
    }

    fn log(&self, ctx: Option<&RequestContext>) {
        let method = ctx.map(|c| c.method.as_str()).unwrap_or("-");
        let path = ctx.map(|c| c.path.as_str()).unwrap_or("-");
        let request_id = ctx.map(|c| c.request_id.as_str()).unwrap_or("-");
        let status = self.status().as_u16();

        if self.is_server_fault() {
            tracing::error!(
                method,
                path,
                request_id,
                status,
                error = %self,
                backtrace = %Backtrace::force_capture(),
                "request failed with server error"
            );
        } else {
            tracing::warn!(
                method,
                path,
                request_id,
                status,
                error = %self,
                "request rejected"
            );
        }
    }
}

fn envelope_from(rendered: &Rendered, request_id: Option<String>) -> ErrorEnvelope {
    let suggestions = if rendered.suggestions.is_empty() {
        strings(&["Contact support if the problem persists"])
    } else {
        rendered.suggestions.clone()
    };
    ErrorEnvelope {
        error: ErrorBody {
            code: rendered.code.clone(),
            message: rendered.message.clone(),
            suggestions,
            details: rendered.details.clone(),
            timestamp: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
            request_id,
        },
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let ctx = RequestContext::current();
        self.log(ctx.as_ref());

        let rendered = self.render();
        let payload = envelope_from(&rendered, ctx.map(|c| c.request_id));
        metrics::observe_error_response(&payload.error.code, rendered.status.as_u16());

        let mut response = (rendered.status, Json(payload)).into_response();
        apply_security_headers(response.headers_mut());
        if let Some(seconds) = rendered.retry_after {
            if let Ok(value) = HeaderValue::from_str(&seconds.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_error::ErrorKind;

    async fn body_json(response: Response) -> ErrorEnvelope {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_every_kind_maps_to_its_status_and_code() {
        for kind in ErrorKind::ALL {
            let response = ApiError::from(AppError::new(kind, "boom")).into_response();
            assert_eq!(response.status(), kind.status(), "{}", kind);
            let envelope = body_json(response).await;
            assert_eq!(envelope.error.code, kind.code());
            assert!(!envelope.error.suggestions.is_empty());
            assert!(envelope.error.timestamp.is_some());
        }
    }

    #[tokio::test]
    async fn test_security_headers_on_error_response() {
        let response = ApiError::from(AppError::validation("bad")).into_response();
        let headers = response.headers();
        assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
        assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
        assert_eq!(headers.get("x-xss-protection").unwrap(), "1; mode=block");
        assert_eq!(
            headers.get("referrer-policy").unwrap(),
            "strict-origin-when-cross-origin"
        );
        assert_eq!(
            headers.get("content-security-policy").unwrap(),
            "default-src 'self'"
        );
    }

    #[tokio::test]
    async fn test_validation_envelope_shape() {
        let err = AppError::validation("Query too short").with_field("query");
        let response = ApiError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let envelope = body_json(response).await;
        assert_eq!(envelope.error.code, "VALIDATION_ERROR");
        assert_eq!(envelope.error.message, "Query too short");
        assert_eq!(envelope.error.details.get("field"), Some(&json!("query")));
        assert_eq!(envelope.error.request_id, None);
    }

    #[tokio::test]
    async fn test_schema_errors_are_422() {
        let response =
            ApiError::Schema(vec![FieldError::new("body", "missing field `product_name`")])
                .into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let envelope = body_json(response).await;
        assert_eq!(envelope.error.code, "VALIDATION_ERROR");
        assert_eq!(envelope.error.message, "Request validation failed");
        assert_eq!(
            envelope.error.details["validation_errors"][0]["field"],
            json!("body")
        );
    }

    #[tokio::test]
    async fn test_rate_limited_sets_retry_after() {
        let response = ApiError::RateLimited {
            limit: "20 per 60 second".into(),
            retry_after: Some(17),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "17");

        let unknown = ApiError::RateLimited {
            limit: "20 per 60 second".into(),
            retry_after: None,
        }
        .into_response();
        assert!(unknown.headers().get(header::RETRY_AFTER).is_none());
    }

    #[tokio::test]
    async fn test_domain_rate_limit_error_sets_retry_after() {
        let response =
            ApiError::from(AppError::rate_limit_exceeded("5 per minute", Some(9))).into_response();
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "9");
    }

    #[tokio::test]
    async fn test_data_errors() {
        let operational = ApiError::from(sqlx::Error::PoolTimedOut);
        assert_eq!(operational.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let envelope = body_json(operational.into_response()).await;
        assert_eq!(envelope.error.code, "DATABASE_OPERATIONAL_ERROR");
        assert_eq!(envelope.error.details["error_type"], json!("PoolTimedOut"));

        let other = ApiError::from(sqlx::Error::RowNotFound);
        let envelope = body_json(other.into_response()).await;
        assert_eq!(envelope.error.code, "DATABASE_ERROR");
    }

    #[derive(Debug)]
    struct ConstraintViolation(sqlx::error::ErrorKind);

    impl std::fmt::Display for ConstraintViolation {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("duplicate key value violates unique constraint")
        }
    }

    impl std::error::Error for ConstraintViolation {}

    impl sqlx::error::DatabaseError for ConstraintViolation {
        fn message(&self) -> &str {
            "duplicate key value violates unique constraint"
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> sqlx::error::ErrorKind {
            match self.0 {
                sqlx::error::ErrorKind::UniqueViolation => sqlx::error::ErrorKind::UniqueViolation,
                sqlx::error::ErrorKind::ForeignKeyViolation => {
                    sqlx::error::ErrorKind::ForeignKeyViolation
                }
                sqlx::error::ErrorKind::NotNullViolation => {
                    sqlx::error::ErrorKind::NotNullViolation
                }
                sqlx::error::ErrorKind::CheckViolation => sqlx::error::ErrorKind::CheckViolation,
                _ => sqlx::error::ErrorKind::Other,
            }
        }
    }

    fn database_error(kind: sqlx::error::ErrorKind) -> ApiError {
        ApiError::from(sqlx::Error::Database(Box::new(ConstraintViolation(kind))))
    }

    #[tokio::test]
    async fn test_integrity_violations_are_client_errors() {
        for kind in [
            sqlx::error::ErrorKind::UniqueViolation,
            sqlx::error::ErrorKind::ForeignKeyViolation,
            sqlx::error::ErrorKind::NotNullViolation,
            sqlx::error::ErrorKind::CheckViolation,
        ] {
            let err = database_error(kind);
            assert_eq!(err.status(), StatusCode::BAD_REQUEST);
            assert!(!err.is_server_fault());
            let (status, envelope) = err.to_envelope(None);
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(envelope.error.code, "DATABASE_INTEGRITY_ERROR");
            assert_eq!(envelope.error.message, "Data integrity constraint violation");
            assert_eq!(envelope.error.details["error_type"], json!("Database"));
        }

        let other = database_error(sqlx::error::ErrorKind::Other);
        assert_eq!(other.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let (_, envelope) = other.to_envelope(None);
        assert_eq!(envelope.error.code, "DATABASE_ERROR");
    }

    #[tokio::test]
    async fn test_unexpected_error_falls_back_to_500() {
        let response = ApiError::from(anyhow::anyhow!("secret internal detail")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let envelope = body_json(response).await;
        assert_eq!(envelope.error.code, "INTERNAL_SERVER_ERROR");
        assert_eq!(envelope.error.message, "An unexpected error occurred");
        assert!(!serde_json::to_string(&envelope).unwrap().contains("secret"));
    }

    #[tokio::test]
    async fn test_http_and_guard_errors() {
        let not_found = ApiError::not_found("Route not found");
        let (status, envelope) = not_found.to_envelope(Some("req-1".into()));
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(envelope.error.code, "NOT_FOUND");
        assert_eq!(envelope.error.request_id.as_deref(), Some("req-1"));

        assert_eq!(
            ApiError::RequestTooLarge { max_bytes: 10 }.status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(ApiError::InvalidContentLength.status(), StatusCode::BAD_REQUEST);
        let (status, envelope) =
            ApiError::UnsupportedMediaType("text/plain".into()).to_envelope(None);
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(envelope.error.code, "UNSUPPORTED_MEDIA_TYPE");

        let (_, teapot) = ApiError::Http {
            status: StatusCode::IM_A_TEAPOT,
            message: "short and stout".into(),
        }
        .to_envelope(None);
        assert_eq!(teapot.error.code, "HTTP_ERROR");
        assert!(!teapot.error.suggestions.is_empty());
    }
}

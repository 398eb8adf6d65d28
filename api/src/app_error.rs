//! Domain error taxonomy
//!
//! Every rejection raised by the validators or the handlers is an [`AppError`]
//! tagged with one [`ErrorKind`]. The kind fixes the machine-readable code,
//! the HTTP status and the canned remediation suggestions; callers only supply
//! the message and any structured details.

use axum::http::StatusCode;
use serde_json::{Map, Value};
use thiserror::Error;

/// Closed set of domain error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    QueryProcessing,
    Database,
    ProductNotFound,
    PlatformNotFound,
    RateLimitExceeded,
    InvalidQuery,
    Cache,
    ExternalService,
    Configuration,
    Authentication,
    Authorization,
    General,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 13] = [
        ErrorKind::Validation,
        ErrorKind::QueryProcessing,
        ErrorKind::Database,
        ErrorKind::ProductNotFound,
        ErrorKind::PlatformNotFound,
        ErrorKind::RateLimitExceeded,
        ErrorKind::InvalidQuery,
        ErrorKind::Cache,
        ErrorKind::ExternalService,
        ErrorKind::Configuration,
        ErrorKind::Authentication,
        ErrorKind::Authorization,
        ErrorKind::General,
    ];

    /// Stable machine-readable code
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::QueryProcessing => "QUERY_PROCESSING_ERROR",
            ErrorKind::Database => "DATABASE_ERROR",
            ErrorKind::ProductNotFound => "PRODUCT_NOT_FOUND",
            ErrorKind::PlatformNotFound => "PLATFORM_NOT_FOUND",
            ErrorKind::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            ErrorKind::InvalidQuery => "INVALID_QUERY_ERROR",
            ErrorKind::Cache => "CACHE_ERROR",
            ErrorKind::ExternalService => "EXTERNAL_SERVICE_ERROR",
            ErrorKind::Configuration => "CONFIGURATION_ERROR",
            ErrorKind::Authentication => "AUTHENTICATION_ERROR",
            ErrorKind::Authorization => "AUTHORIZATION_ERROR",
            ErrorKind::General => "GENERAL_ERROR",
        }
    }

    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::Validation | ErrorKind::QueryProcessing | ErrorKind::InvalidQuery => {
                StatusCode::BAD_REQUEST
            }
            ErrorKind::ProductNotFound | ErrorKind::PlatformNotFound => StatusCode::NOT_FOUND,
            ErrorKind::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::Authentication => StatusCode::UNAUTHORIZED,
            ErrorKind::Authorization => StatusCode::FORBIDDEN,
            ErrorKind::ExternalService => StatusCode::BAD_GATEWAY,
            ErrorKind::Database
            | ErrorKind::Cache
            | ErrorKind::Configuration
            | ErrorKind::General => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Suggestions used when the raiser does not supply its own
    pub fn default_suggestions(self) -> &'static [&'static str] {
        match self {
            ErrorKind::Validation => &[
                "Check input parameters",
                "Ensure all required fields are provided",
                "Verify data types and formats",
            ],
            ErrorKind::QueryProcessing => &[
                "Try rephrasing your query",
                "Use more specific product names",
                "Check spelling and grammar",
                "Try simpler query structure",
            ],
            ErrorKind::Database => &[
                "Try again in a few moments",
                "Check if the service is available",
                "Contact support if the problem persists",
            ],
            ErrorKind::ProductNotFound => &[
                "Check product name spelling",
                "Try using more general product terms",
                "Browse available categories",
                "Use partial product names",
            ],
            ErrorKind::PlatformNotFound => &[
                "Check platform name spelling",
                "Use supported platform names: Blinkit, Zepto, Instamart, BigBasket",
                "Try without specifying platform",
            ],
            ErrorKind::RateLimitExceeded => &[
                "Wait before making another request",
                "Reduce request frequency",
                "Consider upgrading your plan for higher limits",
            ],
            ErrorKind::InvalidQuery => &[
                "Simplify your query",
                "Use more specific terms",
                "Try breaking complex queries into parts",
            ],
            ErrorKind::Cache => &[
                "Request will proceed without cache",
                "Try again if performance is slow",
            ],
            ErrorKind::ExternalService => &[
                "Try again in a few moments",
                "Check service availability",
                "Contact support if the problem persists",
            ],
            ErrorKind::Configuration => &[
                "Check environment variables",
                "Verify configuration files",
                "Contact administrator",
            ],
            ErrorKind::Authentication => &[
                "Check your API key",
                "Ensure proper authentication headers",
                "Contact support for access issues",
            ],
            ErrorKind::Authorization => &[
                "Check your permissions",
                "Contact administrator for access",
                "Verify your subscription plan",
            ],
            ErrorKind::General => &[
                "Try again in a few moments",
                "Contact support if the problem persists",
            ],
        }
    }

    /// Whether the caller, rather than the service, caused the error
    pub fn is_client_error(self) -> bool {
        self.status().is_client_error()
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// A raised domain error: kind, message, suggestions and structured details
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct AppError {
    kind: ErrorKind,
    message: String,
    suggestions: Vec<String>,
    details: Map<String, Value>,
}

impl AppError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let mut message = message.into();
        if message.trim().is_empty() {
            message = format!("{} occurred", kind.code().to_lowercase().replace('_', " "));
        }
        Self {
            kind,
            message,
            suggestions: kind
                .default_suggestions()
                .iter()
                .map(|s| s.to_string())
                .collect(),
            details: Map::new(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn query_processing(message: impl Into<String>, query: Option<&str>) -> Self {
        Self::new(ErrorKind::QueryProcessing, message).with_optional_detail("original_query", query)
    }

    pub fn database(message: impl Into<String>, operation: Option<&str>) -> Self {
        Self::new(ErrorKind::Database, message).with_optional_detail("operation", operation)
    }

    pub fn product_not_found(product_name: &str) -> Self {
        Self::new(
            ErrorKind::ProductNotFound,
            format!("Product '{}' not found", product_name),
        )
        .with_detail("product_name", product_name)
    }

    pub fn platform_not_found(platform_name: &str) -> Self {
        Self::new(
            ErrorKind::PlatformNotFound,
            format!("Platform '{}' not found or inactive", platform_name),
        )
        .with_detail("platform_name", platform_name)
    }

    pub fn rate_limit_exceeded(limit: &str, retry_after: Option<u64>) -> Self {
        Self::new(
            ErrorKind::RateLimitExceeded,
            format!("Rate limit exceeded: {}", limit),
        )
        .with_detail("limit", limit)
        .with_detail("retry_after", retry_after)
    }

    pub fn invalid_query(message: impl Into<String>, generated_query: Option<&str>) -> Self {
        Self::new(ErrorKind::InvalidQuery, message)
            .with_optional_detail("generated_query", generated_query)
    }

    pub fn cache(message: impl Into<String>, operation: Option<&str>) -> Self {
        Self::new(ErrorKind::Cache, message).with_optional_detail("operation", operation)
    }

    pub fn external_service(service_name: &str, message: impl std::fmt::Display) -> Self {
        Self::new(
            ErrorKind::ExternalService,
            format!("External service '{}' error: {}", service_name, message),
        )
        .with_detail("service_name", service_name)
    }

    pub fn configuration(message: impl Into<String>, config_key: Option<&str>) -> Self {
        Self::new(ErrorKind::Configuration, message).with_optional_detail("config_key", config_key)
    }

    pub fn authentication(message: Option<&str>) -> Self {
        Self::new(
            ErrorKind::Authentication,
            message.unwrap_or("Authentication failed"),
        )
    }

    pub fn authorization(message: Option<&str>, resource: Option<&str>) -> Self {
        Self::new(ErrorKind::Authorization, message.unwrap_or("Access denied"))
            .with_optional_detail("resource", resource)
    }

    pub fn general(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::General, message)
    }

    /// Record which input field was rejected
    pub fn with_field(self, field: &str) -> Self {
        self.with_detail("field", field)
    }

    /// Replace the canned suggestions. An empty list keeps the defaults.
    pub fn with_suggestions<I, S>(mut self, suggestions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let suggestions: Vec<String> = suggestions.into_iter().map(Into::into).collect();
        if !suggestions.is_empty() {
            self.suggestions = suggestions;
        }
        self
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    fn with_optional_detail(self, key: &str, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.with_detail(key, v),
            None => self,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn suggestions(&self) -> &[String] {
        &self.suggestions
    }

    pub fn details(&self) -> &Map<String, Value> {
        &self.details
    }

    pub fn field(&self) -> Option<&str> {
        self.details.get("field").and_then(Value::as_str)
    }

    pub fn into_parts(self) -> (ErrorKind, String, Vec<String>, Map<String, Value>) {
        (self.kind, self.message, self.suggestions, self.details)
    }
}

pub type AppResult<T> = std::result::Result<T, AppError>;

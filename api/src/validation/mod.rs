//! Input Validation Module
//!
//! Every externally supplied value passes through here before it reaches the
//! catalog or a log line.
//!
//! # Overview
//!
//! 1. **Patterns** - compiled SQL-injection and XSS indicators, plus the
//!    registry of supported platforms
//! 2. **Sanitizers** - trimming, length bounds and markup escaping
//! 3. **Validators** - one function per field type, returning the canonical
//!    value or a `VALIDATION_ERROR`
//! 4. **Extractors** - `ValidatedJson<T>` / `ValidatedQuery<T>`, which run a
//!    request type's [`Validate`] impl inside the Axum extractor
//! 5. **Requests** - `Validate` impls for the wire request types
//!
//! # Usage
//!
//! ```ignore
//! pub async fn list_deals(
//!     State(state): State<AppState>,
//!     ValidatedQuery(filters): ValidatedQuery<DealsParams>,
//! ) -> ApiResult<Json<DealsResponse>> {
//!     // filters is a DealFilter with canonical platform names
//! }
//! ```
//!
//! # Error Responses
//!
//! A body or query string that does not deserialize is a 422:
//!
//! ```json
//! {
//!   "error": {
//!     "code": "VALIDATION_ERROR",
//!     "message": "Request validation failed",
//!     "suggestions": ["Check required fields and data types", "..."],
//!     "details": {"validation_errors": [{"field": "body", "message": "..."}]},
//!     "timestamp": "2026-02-20T10:30:00.000Z",
//!     "request_id": "..."
//!   }
//! }
//! ```
//!
//! A value that deserializes but fails a validator is a 400 with the rejected
//! field in `details.field`.

pub mod extractors;
pub mod patterns;
pub mod requests;
pub mod sanitizers;
pub mod validators;

pub use extractors::{FieldError, Validate, ValidatedJson, ValidatedQuery};
pub use patterns::{
    find_sql_injection, find_xss, matches_sql_injection, matches_xss, PlatformRegistry,
    DEFAULT_PLATFORMS,
};
pub use requests::ComparisonQuery;
pub use sanitizers::{escape_markup, sanitize_string, sanitize_url_parameter, SanitizeOptions};
pub use validators::{
    sanitize_user_id, validate_category_name, validate_context, validate_discount_percentage,
    validate_discount_range, validate_limit, validate_platform_list, validate_platform_list_in,
    validate_platform_name, validate_platform_name_in, validate_price_range,
    validate_product_name, validate_query_string,
};

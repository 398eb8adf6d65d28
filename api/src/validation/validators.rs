//! Field validators for input validation
//!
//! One function per external field type. Each returns the canonical value or
//! a `VALIDATION_ERROR` naming the rejected field; nothing is coerced or
//! dropped silently.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};

use super::patterns::{self, PlatformRegistry};
use super::sanitizers::{sanitize_string, SanitizeOptions};
use crate::app_error::{AppError, AppResult};
use crate::metrics;

pub const QUERY_MIN_LENGTH: usize = 3;
pub const QUERY_MAX_LENGTH: usize = 500;
pub const PRODUCT_NAME_MAX_LENGTH: usize = 200;
pub const CATEGORY_NAME_MAX_LENGTH: usize = 100;
pub const LIMIT_MIN: i64 = 1;
pub const LIMIT_MAX: i64 = 1000;
pub const MAX_PLATFORMS: usize = 10;
pub const USER_ID_MAX_LENGTH: usize = 100;
pub const CONTEXT_MAX_SERIALIZED: usize = 1000;
pub const CONTEXT_KEY_MAX_LENGTH: usize = 50;
pub const CONTEXT_VALUE_MAX_LENGTH: usize = 200;

lazy_static! {
    static ref PRODUCT_NAME_REGEX: Regex = Regex::new(r"^[a-zA-Z0-9 \-().,&%/]+$").unwrap();
    static ref CATEGORY_NAME_REGEX: Regex = Regex::new(r"^[a-zA-Z0-9 \-&]+$").unwrap();
    static ref USER_ID_REGEX: Regex = Regex::new(r"^[a-zA-Z0-9\-_]+$").unwrap();
}

/// Build a validation error for `field` and count the rejection
pub(crate) fn reject(field: &str, message: impl Into<String>) -> AppError {
    metrics::VALIDATION_REJECTIONS_TOTAL
        .with_label_values(&[field])
        .inc();
    AppError::validation(message).with_field(field)
}

fn char_len(value: &str) -> usize {
    value.chars().count()
}

/// Validate a free-text search query
pub fn validate_query_string(query: &str) -> AppResult<String> {
    if query.is_empty() {
        return Err(reject("query", "Query must be a non-empty string"));
    }

    let query = query.trim();
    if char_len(query) < QUERY_MIN_LENGTH {
        return Err(reject(
            "query",
            format!(
                "Query too short. Minimum {} characters required",
                QUERY_MIN_LENGTH
            ),
        ));
    }
    if char_len(query) > QUERY_MAX_LENGTH {
        return Err(reject(
            "query",
            format!(
                "Query too long. Maximum {} characters allowed",
                QUERY_MAX_LENGTH
            ),
        ));
    }

    if patterns::matches_sql_injection(query) {
        return Err(reject("query", "Invalid query format detected"));
    }

    sanitize_string(query, SanitizeOptions::max_length(QUERY_MAX_LENGTH))
        .map_err(|e| e.with_field("query"))
}

pub fn validate_product_name(product_name: &str) -> AppResult<String> {
    if product_name.is_empty() {
        return Err(reject("product_name", "Product name must be a non-empty string"));
    }

    let product_name = product_name.trim();
    if product_name.is_empty() {
        return Err(reject("product_name", "Product name cannot be empty"));
    }
    if char_len(product_name) > PRODUCT_NAME_MAX_LENGTH {
        return Err(reject(
            "product_name",
            format!(
                "Product name too long. Maximum {} characters allowed",
                PRODUCT_NAME_MAX_LENGTH
            ),
        ));
    }
    if !PRODUCT_NAME_REGEX.is_match(product_name) {
        return Err(reject("product_name", "Product name contains invalid characters"));
    }

    sanitize_string(
        product_name,
        SanitizeOptions::max_length(PRODUCT_NAME_MAX_LENGTH),
    )
    .map_err(|e| e.with_field("product_name"))
}

/// Resolve a platform name against the process-wide allow-list
pub fn validate_platform_name(platform_name: &str) -> AppResult<String> {
    validate_platform_name_in(PlatformRegistry::global(), platform_name)
}

/// Resolve a platform name to its canonical spelling in `registry`
pub fn validate_platform_name_in(
    registry: &PlatformRegistry,
    platform_name: &str,
) -> AppResult<String> {
    let trimmed = platform_name.trim();
    if trimmed.is_empty() {
        return Err(reject("platform", "Platform name must be a non-empty string"));
    }

    match registry.canonical(trimmed) {
        Some(canonical) => Ok(canonical.to_string()),
        None => {
            let supported = registry
                .names()
                .iter()
                .map(|n| n.to_lowercase())
                .collect::<Vec<_>>()
                .join(", ");
            Err(reject(
                "platform",
                format!("Invalid platform name. Supported platforms: {}", supported),
            ))
        }
    }
}

pub fn validate_category_name(category_name: &str) -> AppResult<String> {
    if category_name.is_empty() {
        return Err(reject("category", "Category name must be a non-empty string"));
    }

    let category_name = category_name.trim();
    if char_len(category_name) > CATEGORY_NAME_MAX_LENGTH {
        return Err(reject(
            "category",
            format!(
                "Category name too long. Maximum {} characters allowed",
                CATEGORY_NAME_MAX_LENGTH
            ),
        ));
    }
    if !CATEGORY_NAME_REGEX.is_match(category_name) {
        return Err(reject("category", "Category name contains invalid characters"));
    }

    sanitize_string(
        category_name,
        SanitizeOptions::max_length(CATEGORY_NAME_MAX_LENGTH),
    )
    .map_err(|e| e.with_field("category"))
}

/// Interpret a JSON number or numeric string as a finite float
fn as_finite_f64(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

/// Accepts a number or a numeric string in [0, 100]
pub fn validate_discount_percentage(discount: &Value) -> AppResult<f64> {
    let Some(discount) = as_finite_f64(discount) else {
        return Err(reject("discount", "Discount percentage must be a number"));
    };

    if discount < 0.0 {
        return Err(reject("discount", "Discount percentage cannot be negative"));
    }
    if discount > 100.0 {
        return Err(reject("discount", "Discount percentage cannot exceed 100%"));
    }

    Ok(discount)
}

/// Reject an inverted discount window
pub fn validate_discount_range(min_discount: f64, max_discount: Option<f64>) -> AppResult<()> {
    match max_discount {
        Some(max) if min_discount > max => Err(reject(
            "discount",
            "Minimum discount cannot be greater than maximum discount",
        )),
        _ => Ok(()),
    }
}

/// Accepts an integer or an integer string in [1, 1000]
pub fn validate_limit(limit: &Value) -> AppResult<i64> {
    let parsed = match limit {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && f.is_finite()).map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    let Some(limit) = parsed else {
        return Err(reject("limit", "Limit must be a valid integer"));
    };

    if limit < LIMIT_MIN {
        return Err(reject("limit", format!("Limit must be at least {}", LIMIT_MIN)));
    }
    if limit > LIMIT_MAX {
        return Err(reject("limit", format!("Limit cannot exceed {}", LIMIT_MAX)));
    }

    Ok(limit)
}

/// Accepts a comma-separated string or a list of strings.
///
/// Blank entries are skipped, order is preserved, and the first invalid
/// platform aborts validation.
pub fn validate_platform_list(platforms: &Value) -> AppResult<Vec<String>> {
    validate_platform_list_in(PlatformRegistry::global(), platforms)
}

pub fn validate_platform_list_in(
    registry: &PlatformRegistry,
    platforms: &Value,
) -> AppResult<Vec<String>> {
    let entries: Vec<&str> = match platforms {
        Value::String(csv) => csv.split(',').map(str::trim).filter(|p| !p.is_empty()).collect(),
        Value::Array(items) => {
            let mut entries = Vec::with_capacity(items.len());
            for item in items {
                let Value::String(s) = item else {
                    return Err(reject(
                        "platforms",
                        "Platforms must be a string or list of strings",
                    ));
                };
                let s = s.trim();
                if !s.is_empty() {
                    entries.push(s);
                }
            }
            entries
        }
        _ => {
            return Err(reject(
                "platforms",
                "Platforms must be a string or list of strings",
            ))
        }
    };

    if entries.is_empty() {
        return Err(reject("platforms", "At least one platform must be specified"));
    }
    if entries.len() > MAX_PLATFORMS {
        return Err(reject(
            "platforms",
            format!(
                "Too many platforms specified. Maximum {} allowed",
                MAX_PLATFORMS
            ),
        ));
    }

    entries
        .into_iter()
        .map(|p| validate_platform_name_in(registry, p).map_err(|e| e.with_field("platforms")))
        .collect()
}

/// Absent or empty ids pass through as `None`
pub fn sanitize_user_id(user_id: Option<&str>) -> AppResult<Option<String>> {
    let Some(user_id) = user_id.filter(|u| !u.is_empty()) else {
        return Ok(None);
    };

    let user_id = user_id.trim();
    if char_len(user_id) > USER_ID_MAX_LENGTH {
        return Err(reject(
            "user_id",
            format!(
                "User ID too long. Maximum {} characters allowed",
                USER_ID_MAX_LENGTH
            ),
        ));
    }
    if !USER_ID_REGEX.is_match(user_id) {
        return Err(reject("user_id", "User ID contains invalid characters"));
    }

    Ok(Some(user_id.to_string()))
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Validate a free-form context object of scalar values.
///
/// The size bound applies to the compact JSON serialization of the whole
/// object; string values are sanitized, numbers and booleans pass unchanged.
pub fn validate_context(context: Option<&Value>) -> AppResult<Option<Map<String, Value>>> {
    let context = match context {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Object(map)) => map,
        Some(_) => return Err(reject("context", "Context must be an object")),
    };

    let serialized_len = serde_json::to_string(context)
        .map(|s| char_len(&s))
        .unwrap_or(usize::MAX);
    if serialized_len > CONTEXT_MAX_SERIALIZED {
        return Err(reject(
            "context",
            format!(
                "Context data too large. Maximum {} characters allowed",
                CONTEXT_MAX_SERIALIZED
            ),
        ));
    }

    let mut validated = Map::with_capacity(context.len());
    for (key, value) in context {
        if char_len(key) > CONTEXT_KEY_MAX_LENGTH {
            return Err(reject(
                "context",
                format!(
                    "Context key too long. Maximum {} characters allowed",
                    CONTEXT_KEY_MAX_LENGTH
                ),
            ));
        }

        let value = match value {
            Value::String(s) => Value::String(
                sanitize_string(s, SanitizeOptions::max_length(CONTEXT_VALUE_MAX_LENGTH))
                    .map_err(|e| e.with_field("context"))?,
            ),
            Value::Number(_) | Value::Bool(_) => value.clone(),
            other => {
                return Err(reject(
                    "context",
                    format!("Unsupported context value type: {}", json_type_name(other)),
                ))
            }
        };
        validated.insert(key.clone(), value);
    }

    Ok(Some(validated))
}

fn validate_price_bound(value: Option<&Value>, field: &str, label: &str) -> AppResult<Option<f64>> {
    let value = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(v) => v,
    };
    let Some(price) = as_finite_f64(value) else {
        return Err(reject(field, format!("{} price must be a number", label)));
    };
    if price < 0.0 {
        return Err(reject(field, format!("{} price cannot be negative", label)));
    }
    Ok(Some(price))
}

pub fn validate_price_range(
    min_price: Option<&Value>,
    max_price: Option<&Value>,
) -> AppResult<(Option<f64>, Option<f64>)> {
    let min = validate_price_bound(min_price, "min_price", "Minimum")?;
    let max = validate_price_bound(max_price, "max_price", "Maximum")?;

    if let (Some(min), Some(max)) = (min, max) {
        if min > max {
            return Err(reject(
                "price_range",
                "Minimum price cannot be greater than maximum price",
            ));
        }
    }

    Ok((min, max))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validate_query_string_bounds() {
        assert!(validate_query_string("").is_err());
        assert!(validate_query_string("ab").is_err());
        assert!(validate_query_string("   ab   ").is_err());
        assert_eq!(validate_query_string("  milk  ").unwrap(), "milk");
        assert!(validate_query_string(&"a".repeat(500)).is_ok());
        assert!(validate_query_string(&"a".repeat(501)).is_err());
    }

    #[test]
    fn test_validate_query_string_rejects_sql_injection() {
        let err = validate_query_string("SELECT * FROM users; DROP TABLE products;").unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert_eq!(err.message(), "Invalid query format detected");
        assert_eq!(err.field(), Some("query"));
    }

    #[test]
    fn test_validate_query_string_rejects_xss() {
        assert!(validate_query_string("cheap javascript:alert(1) milk").is_err());
    }

    #[test]
    fn test_validate_query_string_plain_text_unchanged() {
        let q = "Which app has cheapest onions right now?";
        assert_eq!(validate_query_string(q).unwrap(), q);
    }

    #[test]
    fn test_validate_product_name() {
        assert_eq!(validate_product_name("  Amul Milk (1L)  ").unwrap(), "Amul Milk (1L)");
        assert_eq!(validate_product_name("Salt & Pepper").unwrap(), "Salt &amp; Pepper");
        assert_eq!(validate_product_name("Curd 50% off/2.5kg, fresh").unwrap(), "Curd 50% off/2.5kg, fresh");
        assert!(validate_product_name("").is_err());
        assert!(validate_product_name("   ").is_err());
        assert!(validate_product_name(&"a".repeat(201)).is_err());
        let err = validate_product_name("milk<script>").unwrap_err();
        assert_eq!(err.message(), "Product name contains invalid characters");
        assert!(validate_product_name("milk;").is_err());
    }

    #[test]
    fn test_validate_platform_name_canonicalizes() {
        assert_eq!(validate_platform_name("blinkit").unwrap(), "Blinkit");
        assert_eq!(validate_platform_name("BLINKIT").unwrap(), "Blinkit");
        assert_eq!(validate_platform_name(" instamart ").unwrap(), "Instamart");
        assert_eq!(validate_platform_name("BigBasket").unwrap(), "Bigbasket");
    }

    #[test]
    fn test_validate_platform_name_is_idempotent() {
        for name in patterns::DEFAULT_PLATFORMS {
            let once = validate_platform_name(&name.to_uppercase()).unwrap();
            let twice = validate_platform_name(&once).unwrap();
            assert_eq!(once, twice);
            assert_eq!(once, name);
        }
    }

    #[test]
    fn test_validate_platform_name_rejects_unknown() {
        let err = validate_platform_name("invalid_platform").unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert!(err.message().starts_with("Invalid platform name. Supported platforms: blinkit"));
        assert!(validate_platform_name("").is_err());
    }

    #[test]
    fn test_validate_platform_name_with_injected_registry() {
        let registry = PlatformRegistry::new(["JioMart"]);
        assert_eq!(validate_platform_name_in(&registry, "jiomart").unwrap(), "JioMart");
        assert!(validate_platform_name_in(&registry, "blinkit").is_err());
    }

    #[test]
    fn test_validate_category_name() {
        assert_eq!(validate_category_name(" Fruits & Vegetables ").unwrap(), "Fruits &amp; Vegetables");
        assert_eq!(validate_category_name("Dairy-Bakery").unwrap(), "Dairy-Bakery");
        assert!(validate_category_name("").is_err());
        assert!(validate_category_name(&"a".repeat(101)).is_err());
        assert!(validate_category_name("Snacks (Salty)").is_err());
    }

    #[test]
    fn test_validate_discount_percentage() {
        assert_eq!(validate_discount_percentage(&json!(0)).unwrap(), 0.0);
        assert_eq!(validate_discount_percentage(&json!(100)).unwrap(), 100.0);
        assert_eq!(validate_discount_percentage(&json!(12.5)).unwrap(), 12.5);
        assert_eq!(validate_discount_percentage(&json!(" 30 ")).unwrap(), 30.0);
        assert!(validate_discount_percentage(&json!(150)).is_err());
        assert!(validate_discount_percentage(&json!(-0.5)).is_err());
        assert!(validate_discount_percentage(&json!("ten")).is_err());
        assert!(validate_discount_percentage(&json!("NaN")).is_err());
        assert!(validate_discount_percentage(&json!(true)).is_err());
        assert!(validate_discount_percentage(&Value::Null).is_err());
    }

    #[test]
    fn test_validate_discount_range() {
        assert!(validate_discount_range(10.0, Some(20.0)).is_ok());
        assert!(validate_discount_range(10.0, None).is_ok());
        assert!(validate_discount_range(30.0, Some(20.0)).is_err());
    }

    #[test]
    fn test_validate_limit() {
        assert_eq!(validate_limit(&json!(1)).unwrap(), 1);
        assert_eq!(validate_limit(&json!(1000)).unwrap(), 1000);
        assert_eq!(validate_limit(&json!("50")).unwrap(), 50);
        assert_eq!(validate_limit(&json!(20.0)).unwrap(), 20);
        assert!(validate_limit(&json!(0)).is_err());
        assert!(validate_limit(&json!(1001)).is_err());
        assert!(validate_limit(&json!(2.5)).is_err());
        assert!(validate_limit(&json!("abc")).is_err());
        assert!(validate_limit(&json!([5])).is_err());
    }

    #[test]
    fn test_validate_platform_list_from_csv() {
        let platforms = validate_platform_list(&json!("blinkit,zepto,instamart")).unwrap();
        assert_eq!(platforms, vec!["Blinkit", "Zepto", "Instamart"]);

        let spaced = validate_platform_list(&json!(" zepto , , BLINKIT ")).unwrap();
        assert_eq!(spaced, vec!["Zepto", "Blinkit"]);
    }

    #[test]
    fn test_validate_platform_list_from_array() {
        let platforms = validate_platform_list(&json!(["amazon", " Flipkart "])).unwrap();
        assert_eq!(platforms, vec!["Amazon", "Flipkart"]);
        assert!(validate_platform_list(&json!(["amazon", 3])).is_err());
    }

    #[test]
    fn test_validate_platform_list_rejections() {
        assert!(validate_platform_list(&json!("")).is_err());
        assert!(validate_platform_list(&json!(" , ")).is_err());
        assert!(validate_platform_list(&json!([])).is_err());
        assert!(validate_platform_list(&json!(42)).is_err());

        let eleven = vec!["zepto"; 11].join(",");
        let err = validate_platform_list(&json!(eleven)).unwrap_err();
        assert_eq!(err.message(), "Too many platforms specified. Maximum 10 allowed");

        let err = validate_platform_list(&json!("blinkit,nope,zepto")).unwrap_err();
        assert!(err.message().starts_with("Invalid platform name"));
        assert_eq!(err.field(), Some("platforms"));
    }

    #[test]
    fn test_sanitize_user_id() {
        assert_eq!(
            sanitize_user_id(Some("user_123-abc")).unwrap(),
            Some("user_123-abc".to_string())
        );
        assert_eq!(sanitize_user_id(None).unwrap(), None);
        assert_eq!(sanitize_user_id(Some("")).unwrap(), None);
        assert!(sanitize_user_id(Some("user@123.com")).is_err());
        assert!(sanitize_user_id(Some(&"a".repeat(101))).is_err());
    }

    #[test]
    fn test_validate_context() {
        assert_eq!(validate_context(None).unwrap(), None);
        assert_eq!(validate_context(Some(&Value::Null)).unwrap(), None);

        let ctx = json!({"source": "<b>app</b>", "page": 2, "beta": true, "ratio": 0.5});
        let validated = validate_context(Some(&ctx)).unwrap().unwrap();
        assert_eq!(validated["source"], json!("&lt;b&gt;app&lt;/b&gt;"));
        assert_eq!(validated["page"], json!(2));
        assert_eq!(validated["beta"], json!(true));
    }

    #[test]
    fn test_validate_context_rejections() {
        assert!(validate_context(Some(&json!("not a map"))).is_err());
        assert!(validate_context(Some(&json!({"k": [1, 2]}))).is_err());
        assert!(validate_context(Some(&json!({"k": null}))).is_err());
        assert!(validate_context(Some(&json!({"k": {"nested": 1}}))).is_err());

        let long_key = "k".repeat(51);
        assert!(validate_context(Some(&json!({ long_key: 1 }))).is_err());

        let big = json!({"blob": "x".repeat(1000)});
        let err = validate_context(Some(&big)).unwrap_err();
        assert!(err.message().starts_with("Context data too large"));

        let long_value = json!({"note": "x".repeat(201)});
        assert!(validate_context(Some(&long_value)).is_err());
    }

    #[test]
    fn test_validate_price_range() {
        assert_eq!(validate_price_range(None, None).unwrap(), (None, None));
        assert_eq!(
            validate_price_range(Some(&json!(10)), Some(&json!("25.5"))).unwrap(),
            (Some(10.0), Some(25.5))
        );
        assert_eq!(
            validate_price_range(Some(&json!(10)), None).unwrap(),
            (Some(10.0), None)
        );
        assert!(validate_price_range(Some(&json!(-1)), None).is_err());
        assert!(validate_price_range(None, Some(&json!("cheap"))).is_err());
        let err = validate_price_range(Some(&json!(50)), Some(&json!(10))).unwrap_err();
        assert_eq!(err.message(), "Minimum price cannot be greater than maximum price");
    }
}

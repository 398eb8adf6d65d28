//! Custom Axum extractors for validated input
//!
//! `ValidatedJson<T>` and `ValidatedQuery<T>` deserialize a request type and
//! run its [`Validate`] impl, handing the handler the validated output.
//! Deserialization failures are schema errors (422); validator rejections
//! keep their own taxonomy status.

use axum::{
    async_trait,
    extract::{
        rejection::{JsonRejection, QueryRejection},
        FromRequest, FromRequestParts, Query, Request,
    },
    http::request::Parts,
    Json,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::app_error::AppResult;
use crate::error::ApiError;

/// A field-level schema error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Request types that turn into a validated value
pub trait Validate {
    type Output;

    fn validate(self) -> AppResult<Self::Output>;
}

fn json_rejection_message(err: &JsonRejection) -> String {
    match err {
        JsonRejection::JsonDataError(e) => format!("Invalid JSON data: {}", e.body_text()),
        JsonRejection::JsonSyntaxError(e) => format!("JSON syntax error: {}", e.body_text()),
        JsonRejection::MissingJsonContentType(_) => {
            "Content-Type must be application/json".to_string()
        }
        JsonRejection::BytesRejection(_) => "Failed to read request body".to_string(),
        _ => "Invalid JSON payload".to_string(),
    }
}

fn query_rejection_message(err: &QueryRejection) -> String {
    match err {
        QueryRejection::FailedToDeserializeQueryString(e) => {
            format!("Invalid query parameters: {}", e.body_text())
        }
        _ => "Invalid query string".to_string(),
    }
}

/// JSON body extractor yielding the validated form of `T`
///
/// ```ignore
/// pub async fn compare_products_post(
///     ValidatedJson(query): ValidatedJson<ProductComparisonRequest>,
/// ) -> ApiResult<Json<ProductComparisonResponse>> {
///     // query is a ComparisonQuery
/// }
/// ```
pub struct ValidatedJson<T: Validate>(pub T::Output);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(data) = Json::<T>::from_request(req, state)
            .await
            .map_err(|err| {
                ApiError::Schema(vec![FieldError::new("body", json_rejection_message(&err))])
            })?;

        Ok(ValidatedJson(data.validate()?))
    }
}

/// Query-string extractor yielding the validated form of `T`
pub struct ValidatedQuery<T: Validate>(pub T::Output);

#[async_trait]
impl<S, T> FromRequestParts<S> for ValidatedQuery<T>
where
    T: DeserializeOwned + Validate + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(params) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|err| {
                ApiError::Schema(vec![FieldError::new("query", query_rejection_message(&err))])
            })?;

        Ok(ValidatedQuery(params.validate()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_error::AppError;
    use axum::{
        body::Body,
        http::{header, StatusCode},
        response::IntoResponse,
        routing::{get, post},
        Router,
    };
    use tower::ServiceExt;

    #[derive(Deserialize)]
    struct Shout {
        word: String,
    }

    impl Validate for Shout {
        type Output = String;

        fn validate(self) -> AppResult<String> {
            if self.word.len() < 3 {
                return Err(AppError::validation("word too short").with_field("word"));
            }
            Ok(self.word.to_uppercase())
        }
    }

    async fn shout_json(ValidatedJson(word): ValidatedJson<Shout>) -> impl IntoResponse {
        word
    }

    async fn shout_query(ValidatedQuery(word): ValidatedQuery<Shout>) -> impl IntoResponse {
        word
    }

    fn app() -> Router {
        Router::new()
            .route("/json", post(shout_json))
            .route("/query", get(shout_query))
    }

    async fn send(req: axum::http::Request<Body>) -> (StatusCode, String) {
        let response = app().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    fn json_post(body: &str) -> axum::http::Request<Body> {
        axum::http::Request::builder()
            .method("POST")
            .uri("/json")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[test]
    fn test_field_error() {
        let error = FieldError::new("product_name", "is required");
        assert_eq!(error.field, "product_name");
        assert_eq!(error.message, "is required");
    }

    #[tokio::test]
    async fn test_validated_json_passes_output() {
        let (status, body) = send(json_post(r#"{"word":"milk"}"#)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "MILK");
    }

    #[tokio::test]
    async fn test_validated_json_schema_error_is_422() {
        let (status, body) = send(json_post(r#"{"other":1}"#)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body.contains("validation_errors"));

        let (status, _) = send(json_post("{not json")).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_validated_json_validator_error_is_400() {
        let (status, body) = send(json_post(r#"{"word":"ab"}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("word too short"));
    }

    #[tokio::test]
    async fn test_validated_query() {
        let ok = axum::http::Request::builder()
            .uri("/query?word=eggs")
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(ok).await, (StatusCode::OK, "EGGS".to_string()));

        let missing = axum::http::Request::builder()
            .uri("/query")
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(missing).await.0, StatusCode::UNPROCESSABLE_ENTITY);
    }
}

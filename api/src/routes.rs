use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware,
    routing::get,
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::{
    deal_handlers, handlers, metrics_handler, product_handlers,
    rate_limit::{self, RateLimitState},
    request_middleware::{self, GuardConfig, REQUEST_ID_HEADER},
    state::AppState,
};

pub fn product_routes() -> Router<AppState> {
    Router::new().route(
        "/products/compare",
        get(product_handlers::compare_products).post(product_handlers::compare_products_post),
    )
}

pub fn deal_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/deals",
            get(deal_handlers::list_deals).post(deal_handlers::list_deals_post),
        )
        .route("/deals/campaigns", get(deal_handlers::list_campaigns))
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health_check))
}

pub fn observability_routes() -> Router<AppState> {
    Router::new().route("/metrics", get(metrics_handler::metrics_endpoint))
}

/// Everything the HTTP stack needs besides handler state
#[derive(Clone)]
pub struct RouterSettings {
    pub api_prefix: String,
    pub max_request_bytes: u64,
    pub cors_origins: Vec<String>,
    pub rate_limit: RateLimitState,
}

/// `*` anywhere in the list allows every origin, without credentials
fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(REQUEST_ID_HEADER),
        ]);

    if origins.iter().any(|origin| origin.trim() == "*") {
        tracing::warn!("CORS allows any origin; credentials are disabled");
        return layer.allow_origin(AllowOrigin::any());
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin `{origin}`");
                None
            }
        })
        .collect();

    layer.allow_origin(origins).allow_credentials(true)
}

/// Full application router.
///
/// Layers run outermost first: request context, CORS, security headers,
/// request logging, the request guard, rate limiting, then the 405 envelope.
pub fn build_router(state: AppState, settings: RouterSettings) -> Router {
    let api = Router::new().merge(product_routes()).merge(deal_routes());

    Router::new()
        .nest(&settings.api_prefix, api)
        .merge(health_routes())
        .merge(observability_routes())
        .fallback(handlers::route_not_found)
        .layer(middleware::from_fn(request_middleware::method_not_allowed))
        .layer(middleware::from_fn_with_state(
            settings.rate_limit,
            rate_limit::rate_limit_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            GuardConfig {
                max_request_bytes: settings.max_request_bytes,
            },
            request_middleware::request_guard,
        ))
        .layer(middleware::from_fn(request_middleware::request_logger))
        .layer(middleware::from_fn(request_middleware::security_headers))
        .layer(cors_layer(&settings.cors_origins))
        .layer(middleware::from_fn(request_middleware::request_context))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    fn cors_app(origins: &[&str]) -> Router {
        let origins: Vec<String> = origins.iter().map(|o| o.to_string()).collect();
        Router::new()
            .route("/ping", get(|| async { "pong" }))
            .layer(cors_layer(&origins))
    }

    fn from_origin(origin: &str) -> Request<Body> {
        Request::builder()
            .uri("/ping")
            .header(header::ORIGIN, origin)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn wildcard_origin_allows_any_without_credentials() {
        let response = cors_app(&["http://localhost:3000", "*"])
            .oneshot(from_origin("https://shop.example"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert!(!response
            .headers()
            .contains_key(header::ACCESS_CONTROL_ALLOW_CREDENTIALS));
    }

    #[tokio::test]
    async fn listed_origins_allow_credentials() {
        let app = cors_app(&["http://localhost:3000", "not a header\n"]);

        let allowed = app
            .clone()
            .oneshot(from_origin("http://localhost:3000"))
            .await
            .unwrap();
        assert_eq!(
            allowed.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://localhost:3000"
        );
        assert_eq!(
            allowed.headers()[header::ACCESS_CONTROL_ALLOW_CREDENTIALS],
            "true"
        );

        let other = app
            .oneshot(from_origin("https://elsewhere.example"))
            .await
            .unwrap();
        assert!(!other
            .headers()
            .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    }
}

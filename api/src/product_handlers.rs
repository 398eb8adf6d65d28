use std::time::Instant;

use axum::{extract::State, Json};
use shared::{ProductCompareParams, ProductComparisonRequest, ProductComparisonResponse};

use crate::{
    app_error::AppError,
    catalog::ComparisonFilter,
    comparison::{build_comparisons, platforms_compared},
    error::ApiResult,
    state::AppState,
    validation::{ValidatedJson, ValidatedQuery},
};

const NOT_FOUND_SUGGESTIONS: [&str; 4] = [
    "Try using more general product terms",
    "Check product name spelling",
    "Remove category or brand filters",
    "Try without specifying platforms",
];

/// GET /products/compare
pub async fn compare_products(
    State(state): State<AppState>,
    ValidatedQuery(filter): ValidatedQuery<ProductCompareParams>,
) -> ApiResult<Json<ProductComparisonResponse>> {
    run_comparison(&state, filter).await.map(Json)
}

/// POST /products/compare
pub async fn compare_products_post(
    State(state): State<AppState>,
    ValidatedJson(query): ValidatedJson<ProductComparisonRequest>,
) -> ApiResult<Json<ProductComparisonResponse>> {
    tracing::debug!(
        user_id = query.user_id.as_deref().unwrap_or("-"),
        context_keys = query.context.as_ref().map_or(0, |c| c.len()),
        "Comparison request metadata"
    );
    run_comparison(&state, query.filter).await.map(Json)
}

async fn run_comparison(
    state: &AppState,
    filter: ComparisonFilter,
) -> ApiResult<ProductComparisonResponse> {
    let started = Instant::now();
    tracing::info!(
        product = %filter.product_name,
        platforms = filter.platforms.len(),
        "Comparing products"
    );

    let rows = state.catalog.price_rows(&filter).await?;
    let comparisons = build_comparisons(&rows);

    if comparisons.is_empty() {
        return Err(AppError::product_not_found(&filter.display_name())
            .with_suggestions(NOT_FOUND_SUGGESTIONS)
            .into());
    }

    let execution_time = started.elapsed().as_secs_f64();
    tracing::info!(
        products = comparisons.len(),
        "Product comparison completed in {:.2}s",
        execution_time
    );

    Ok(ProductComparisonResponse {
        query: filter.display_name(),
        platforms_compared: platforms_compared(&comparisons),
        total_products: comparisons.len(),
        comparisons,
        execution_time,
    })
}

use std::time::Instant;

use axum::{extract::State, Json};
use shared::{CampaignInfo, CampaignParams, DealsParams, DealsRequest, DealsResponse};

use crate::{
    catalog::DealFilter,
    comparison::{deal_facets, deal_from_row},
    error::ApiResult,
    state::AppState,
    validation::{ValidatedJson, ValidatedQuery},
};

/// GET /deals
pub async fn list_deals(
    State(state): State<AppState>,
    ValidatedQuery(filters): ValidatedQuery<DealsParams>,
) -> ApiResult<Json<DealsResponse>> {
    fetch_deals(&state, filters).await.map(Json)
}

/// POST /deals
pub async fn list_deals_post(
    State(state): State<AppState>,
    ValidatedJson(filters): ValidatedJson<DealsRequest>,
) -> ApiResult<Json<DealsResponse>> {
    fetch_deals(&state, filters).await.map(Json)
}

async fn fetch_deals(state: &AppState, filters: DealFilter) -> ApiResult<DealsResponse> {
    let started = Instant::now();
    tracing::info!(
        platform = filters.platform.as_deref().unwrap_or("-"),
        category = filters.category.as_deref().unwrap_or("-"),
        min_discount = filters.min_discount,
        "Fetching deals"
    );

    let rows = state.catalog.deal_rows(&filters).await?;
    let deals: Vec<_> = rows.into_iter().map(deal_from_row).collect();
    let (platforms_included, categories_included) = deal_facets(&deals);

    let execution_time = started.elapsed().as_secs_f64();
    tracing::info!(
        deals = deals.len(),
        "Deals fetched in {:.2}s",
        execution_time
    );

    Ok(DealsResponse {
        total_deals: deals.len(),
        deals,
        filters_applied: filters.applied(),
        platforms_included,
        categories_included,
        execution_time,
    })
}

/// GET /deals/campaigns
pub async fn list_campaigns(
    State(state): State<AppState>,
    ValidatedQuery(filter): ValidatedQuery<CampaignParams>,
) -> ApiResult<Json<Vec<CampaignInfo>>> {
    let started = Instant::now();
    tracing::info!(
        platform = filter.platform.as_deref().unwrap_or("-"),
        campaign_type = filter.campaign_type.as_deref().unwrap_or("-"),
        "Fetching campaigns"
    );

    let rows = state.catalog.campaign_rows(&filter).await?;
    let campaigns: Vec<CampaignInfo> = rows.into_iter().map(CampaignInfo::from).collect();

    tracing::info!(
        campaigns = campaigns.len(),
        "Campaigns fetched in {:.2}s",
        started.elapsed().as_secs_f64()
    );
    Ok(Json(campaigns))
}

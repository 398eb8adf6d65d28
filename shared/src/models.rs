use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Convert a NUMERIC column into the `f64` used on the wire.
pub fn decimal_to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or_default()
}

/// Same as [`decimal_to_f64`] for nullable columns.
pub fn opt_decimal_to_f64(value: Option<Decimal>) -> Option<f64> {
    value.map(decimal_to_f64)
}

// ═══════════════════════════════════════════════════════════════════════════
// DATA SOURCE ROWS
// ═══════════════════════════════════════════════════════════════════════════

/// One product priced on one platform, as returned by the comparison join
/// over products, brands, categories, platforms and current prices.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PriceRow {
    pub product_id: i64,
    pub product_name: String,
    pub description: Option<String>,
    pub pack_size: Option<String>,
    pub is_organic: bool,
    pub brand_name: Option<String>,
    pub category_name: Option<String>,
    pub platform_id: i64,
    pub platform_name: String,
    pub price: Decimal,
    pub original_price: Option<Decimal>,
    pub discount_percentage: Option<Decimal>,
    pub is_available: bool,
    pub stock_status: String,
    pub delivery_time_minutes: Option<i32>,
    pub last_updated: DateTime<Utc>,
}

/// A discount joined with its platform and, when present, product, category
/// and the product's current price on that platform.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DealRow {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub discount_type: String,
    pub discount_value: Decimal,
    pub discount_percentage: Option<Decimal>,
    pub max_discount_amount: Option<Decimal>,
    pub min_order_amount: Option<Decimal>,
    pub discount_code: Option<String>,
    pub is_featured: bool,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub usage_limit_per_user: Option<i32>,
    pub platform_name: String,
    pub product_name: Option<String>,
    pub category_name: Option<String>,
    pub current_price: Option<Decimal>,
    pub original_price: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CampaignRow {
    pub id: i64,
    pub campaign_name: String,
    pub campaign_type: String,
    pub description: Option<String>,
    pub banner_image_url: Option<String>,
    pub min_order_amount: Option<Decimal>,
    pub max_discount_amount: Option<Decimal>,
    pub is_featured: bool,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub platform_name: String,
}

// ═══════════════════════════════════════════════════════════════════════════
// PRODUCT COMPARISON
// ═══════════════════════════════════════════════════════════════════════════

/// Product price information for a specific platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductPrice {
    pub platform_id: i64,
    pub platform_name: String,
    pub current_price: f64,
    pub original_price: Option<f64>,
    pub discount_percentage: Option<f64>,
    pub is_available: bool,
    pub stock_status: String,
    pub delivery_time_minutes: Option<i32>,
    pub last_updated: DateTime<Utc>,
}

impl From<&PriceRow> for ProductPrice {
    fn from(row: &PriceRow) -> Self {
        Self {
            platform_id: row.platform_id,
            platform_name: row.platform_name.clone(),
            current_price: decimal_to_f64(row.price),
            original_price: opt_decimal_to_f64(row.original_price),
            discount_percentage: opt_decimal_to_f64(row.discount_percentage),
            is_available: row.is_available,
            stock_status: row.stock_status.clone(),
            delivery_time_minutes: row.delivery_time_minutes,
            last_updated: row.last_updated,
        }
    }
}

/// Basic product information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductInfo {
    pub id: i64,
    pub name: String,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub pack_size: Option<String>,
    #[serde(default)]
    pub is_organic: bool,
}

impl From<&PriceRow> for ProductInfo {
    fn from(row: &PriceRow) -> Self {
        Self {
            id: row.product_id,
            name: row.product_name.clone(),
            brand: row.brand_name.clone(),
            category: row.category_name.clone(),
            description: row.description.clone(),
            pack_size: row.pack_size.clone(),
            is_organic: row.is_organic,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
}

/// Product comparison across platforms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductComparison {
    pub product: ProductInfo,
    pub platforms: Vec<ProductPrice>,
    pub best_deal: ProductPrice,
    /// Difference between the highest and lowest available price
    pub savings_potential: f64,
    pub price_range: PriceRange,
}

/// Query parameters for GET /products/compare
#[derive(Debug, Clone, Deserialize)]
pub struct ProductCompareParams {
    pub product_name: String,
    pub platforms: Option<String>,
    pub category: Option<String>,
    pub brand: Option<String>,
}

/// Request body for POST /products/compare
///
/// `platforms` is accepted either as a comma-separated string or as a list
/// of strings; its shape is checked by the platform-list validator.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductComparisonRequest {
    pub product_name: String,
    #[serde(default)]
    pub platforms: Option<serde_json::Value>,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub user_id: Option<String>,
    #[serde(default)]
    pub context: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductComparisonResponse {
    pub query: String,
    pub comparisons: Vec<ProductComparison>,
    pub total_products: usize,
    pub platforms_compared: Vec<String>,
    pub execution_time: f64,
}

// ═══════════════════════════════════════════════════════════════════════════
// DEALS
// ═══════════════════════════════════════════════════════════════════════════

/// Individual deal information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealInfo {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    /// percentage, fixed_amount or buy_x_get_y
    pub discount_type: String,
    pub discount_value: f64,
    pub discount_percentage: Option<f64>,
    pub max_discount_amount: Option<f64>,
    pub min_order_amount: Option<f64>,
    pub discount_code: Option<String>,
    pub platform_name: String,
    pub product_name: Option<String>,
    pub category_name: Option<String>,
    pub original_price: Option<f64>,
    pub discounted_price: Option<f64>,
    pub savings_amount: Option<f64>,
    #[serde(default)]
    pub is_featured: bool,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub usage_limit_per_user: Option<i32>,
}

/// Query parameters for GET /deals
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DealsParams {
    pub platform: Option<String>,
    pub category: Option<String>,
    pub min_discount: Option<String>,
    pub max_discount: Option<String>,
    pub featured_only: Option<bool>,
    pub active_only: Option<bool>,
    pub limit: Option<String>,
}

/// Request body for POST /deals
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DealsRequest {
    pub platform: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub min_discount: Option<serde_json::Value>,
    #[serde(default)]
    pub max_discount: Option<serde_json::Value>,
    pub featured_only: Option<bool>,
    pub active_only: Option<bool>,
    #[serde(default)]
    pub limit: Option<serde_json::Value>,
}

/// Filters echoed back to the caller after validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealFilters {
    pub platform: Option<String>,
    pub category: Option<String>,
    pub min_discount: f64,
    pub max_discount: Option<f64>,
    pub featured_only: bool,
    pub active_only: bool,
    pub limit: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DealsResponse {
    pub deals: Vec<DealInfo>,
    pub total_deals: usize,
    pub filters_applied: DealFilters,
    pub platforms_included: Vec<String>,
    pub categories_included: Vec<String>,
    pub execution_time: f64,
}

// ═══════════════════════════════════════════════════════════════════════════
// CAMPAIGNS
// ═══════════════════════════════════════════════════════════════════════════

/// Promotional campaign information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignInfo {
    pub id: i64,
    pub campaign_name: String,
    pub campaign_type: String,
    pub description: Option<String>,
    pub platform_name: String,
    pub banner_image_url: Option<String>,
    pub min_order_amount: Option<f64>,
    pub max_discount_amount: Option<f64>,
    #[serde(default)]
    pub is_featured: bool,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(default)]
    pub products_count: i64,
}

impl From<CampaignRow> for CampaignInfo {
    fn from(row: CampaignRow) -> Self {
        Self {
            id: row.id,
            campaign_name: row.campaign_name,
            campaign_type: row.campaign_type,
            description: row.description,
            platform_name: row.platform_name,
            banner_image_url: row.banner_image_url,
            min_order_amount: opt_decimal_to_f64(row.min_order_amount),
            max_discount_amount: opt_decimal_to_f64(row.max_discount_amount),
            is_featured: row.is_featured,
            start_date: row.start_date,
            end_date: row.end_date,
            products_count: 0,
        }
    }
}

/// Query parameters for GET /deals/campaigns
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CampaignParams {
    pub platform: Option<String>,
    pub campaign_type: Option<String>,
    pub featured_only: Option<bool>,
    pub active_only: Option<bool>,
    pub limit: Option<String>,
}

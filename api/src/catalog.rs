//! Read-only access to the price catalog
//!
//! Handlers talk to a [`CatalogSource`]; [`PgCatalogSource`] is the Postgres
//! implementation. All user-supplied values are bound parameters.
//!
//! Text in the filters is the validated, unescaped input. Anything echoed
//! back to a caller goes through [`escape_markup`] first.

use std::time::Instant;

use async_trait::async_trait;
use shared::{CampaignRow, DealFilters, DealRow, PriceRow};
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::metrics;
use crate::validation::escape_markup;

/// Validated filters for a product comparison
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComparisonFilter {
    pub product_name: String,
    /// Canonical platform names; empty means every platform
    pub platforms: Vec<String>,
    pub category: Option<String>,
    pub brand: Option<String>,
}

impl ComparisonFilter {
    /// Product name as echoed in the response
    pub fn display_name(&self) -> String {
        escape_markup(&self.product_name)
    }
}

/// Validated filters for the deals listing
#[derive(Debug, Clone, PartialEq)]
pub struct DealFilter {
    /// Canonical platform name
    pub platform: Option<String>,
    pub category: Option<String>,
    pub min_discount: f64,
    pub max_discount: Option<f64>,
    pub featured_only: bool,
    pub active_only: bool,
    pub limit: i64,
}

impl DealFilter {
    /// The filters as reported back in `filters_applied`
    pub fn applied(&self) -> DealFilters {
        DealFilters {
            platform: self.platform.clone(),
            category: self.category.as_deref().map(escape_markup),
            min_discount: self.min_discount,
            max_discount: self.max_discount,
            featured_only: self.featured_only,
            active_only: self.active_only,
            limit: self.limit,
        }
    }
}

/// Validated filters for the campaign listing
#[derive(Debug, Clone, PartialEq)]
pub struct CampaignFilter {
    pub platform: Option<String>,
    pub campaign_type: Option<String>,
    pub featured_only: bool,
    pub active_only: bool,
    pub limit: i64,
}

#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Product/platform price rows ordered by product name, then price
    async fn price_rows(&self, filter: &ComparisonFilter) -> Result<Vec<PriceRow>, sqlx::Error>;

    /// Deals ordered featured first, then discount percentage, then newest
    async fn deal_rows(&self, filter: &DealFilter) -> Result<Vec<DealRow>, sqlx::Error>;

    /// Campaigns ordered featured first, then newest
    async fn campaign_rows(&self, filter: &CampaignFilter)
        -> Result<Vec<CampaignRow>, sqlx::Error>;

    async fn ping(&self) -> Result<(), sqlx::Error>;
}

/// Substring pattern for ILIKE with LIKE wildcards in `value` escaped
pub fn contains_pattern(value: &str) -> String {
    let mut pattern = String::with_capacity(value.len() + 2);
    pattern.push('%');
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

pub struct PgCatalogSource {
    pool: PgPool,
}

impl PgCatalogSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn push_active_window(qb: &mut QueryBuilder<'_, Postgres>, table: &str) {
    qb.push(format!(
        " AND {table}.is_active = TRUE AND {table}.start_date <= NOW() AND {table}.end_date >= NOW()"
    ));
}

#[async_trait]
impl CatalogSource for PgCatalogSource {
    async fn price_rows(&self, filter: &ComparisonFilter) -> Result<Vec<PriceRow>, sqlx::Error> {
        let started = Instant::now();
        let mut qb = QueryBuilder::<Postgres>::new(
            "SELECT p.id AS product_id, p.name AS product_name, p.description, p.pack_size, \
             p.is_organic, b.name AS brand_name, c.name AS category_name, \
             pl.id AS platform_id, pl.name AS platform_name, cp.price, cp.original_price, \
             cp.discount_percentage, cp.is_available, cp.stock_status, \
             cp.delivery_time_minutes, cp.last_updated \
             FROM products p \
             JOIN current_prices cp ON cp.product_id = p.id \
             JOIN platforms pl ON pl.id = cp.platform_id \
             LEFT JOIN product_brands b ON b.id = p.brand_id \
             LEFT JOIN product_categories c ON c.id = p.category_id \
             WHERE p.is_active = TRUE AND pl.is_active = TRUE AND p.name ILIKE ",
        );
        qb.push_bind(contains_pattern(&filter.product_name));

        if !filter.platforms.is_empty() {
            qb.push(" AND pl.name = ANY(");
            qb.push_bind(filter.platforms.clone());
            qb.push(")");
        }
        if let Some(category) = &filter.category {
            qb.push(" AND c.name ILIKE ");
            qb.push_bind(contains_pattern(category));
        }
        if let Some(brand) = &filter.brand {
            qb.push(" AND b.name ILIKE ");
            qb.push_bind(contains_pattern(brand));
        }
        qb.push(" ORDER BY p.name, cp.price");

        let rows = qb
            .build_query_as::<PriceRow>()
            .fetch_all(&self.pool)
            .await;
        metrics::observe_db_query("price_rows", started.elapsed().as_secs_f64());
        rows
    }

    async fn deal_rows(&self, filter: &DealFilter) -> Result<Vec<DealRow>, sqlx::Error> {
        let started = Instant::now();
        let mut qb = QueryBuilder::<Postgres>::new(
            "SELECT d.id, d.title, d.description, d.discount_type, d.discount_value, \
             d.discount_percentage, d.max_discount_amount, d.min_order_amount, d.discount_code, \
             d.is_featured, d.start_date, d.end_date, d.usage_limit_per_user, \
             pl.name AS platform_name, p.name AS product_name, c.name AS category_name, \
             cp.price AS current_price, cp.original_price \
             FROM discounts d \
             JOIN platforms pl ON pl.id = d.platform_id \
             LEFT JOIN products p ON p.id = d.product_id \
             LEFT JOIN product_categories c ON c.id = d.category_id \
             LEFT JOIN current_prices cp ON cp.product_id = p.id AND cp.platform_id = pl.id \
             WHERE pl.is_active = TRUE",
        );

        if filter.active_only {
            push_active_window(&mut qb, "d");
        }
        if let Some(platform) = &filter.platform {
            qb.push(" AND pl.name ILIKE ");
            qb.push_bind(contains_pattern(platform));
        }
        if let Some(category) = &filter.category {
            qb.push(" AND c.name ILIKE ");
            qb.push_bind(contains_pattern(category));
        }
        if filter.min_discount > 0.0 {
            qb.push(" AND d.discount_percentage >= ");
            qb.push_bind(filter.min_discount);
        }
        if let Some(max_discount) = filter.max_discount {
            qb.push(" AND d.discount_percentage <= ");
            qb.push_bind(max_discount);
        }
        if filter.featured_only {
            qb.push(" AND d.is_featured = TRUE");
        }
        qb.push(
            " ORDER BY d.is_featured DESC, d.discount_percentage DESC NULLS LAST, \
             d.start_date DESC LIMIT ",
        );
        qb.push_bind(filter.limit);

        let rows = qb.build_query_as::<DealRow>().fetch_all(&self.pool).await;
        metrics::observe_db_query("deal_rows", started.elapsed().as_secs_f64());
        rows
    }

    async fn campaign_rows(
        &self,
        filter: &CampaignFilter,
    ) -> Result<Vec<CampaignRow>, sqlx::Error> {
        let started = Instant::now();
        let mut qb = QueryBuilder::<Postgres>::new(
            "SELECT pc.id, pc.campaign_name, pc.campaign_type, pc.description, \
             pc.banner_image_url, pc.min_order_amount, pc.max_discount_amount, pc.is_featured, \
             pc.start_date, pc.end_date, pl.name AS platform_name \
             FROM promotional_campaigns pc \
             JOIN platforms pl ON pl.id = pc.platform_id \
             WHERE pl.is_active = TRUE",
        );

        if filter.active_only {
            push_active_window(&mut qb, "pc");
        }
        if let Some(platform) = &filter.platform {
            qb.push(" AND pl.name ILIKE ");
            qb.push_bind(contains_pattern(platform));
        }
        if let Some(campaign_type) = &filter.campaign_type {
            qb.push(" AND pc.campaign_type ILIKE ");
            qb.push_bind(contains_pattern(campaign_type));
        }
        if filter.featured_only {
            qb.push(" AND pc.is_featured = TRUE");
        }
        qb.push(" ORDER BY pc.is_featured DESC, pc.start_date DESC LIMIT ");
        qb.push_bind(filter.limit);

        let rows = qb
            .build_query_as::<CampaignRow>()
            .fetch_all(&self.pool)
            .await;
        metrics::observe_db_query("campaign_rows", started.elapsed().as_secs_f64());
        rows
    }

    async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

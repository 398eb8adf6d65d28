//! Validation implementations for API request types
//!
//! Each request or query-parameter struct from `shared` turns into the
//! filter handed to the catalog. Optional text filters that arrive empty are
//! treated as absent.
//!
//! Free-text filters carry the trimmed input once it has passed its
//! validator, not the validator's escaped output: the catalog binds them as
//! search terms and only the echoed copy is escaped.

use serde_json::{Map, Value};
use shared::{
    CampaignParams, DealsParams, DealsRequest, ProductCompareParams,
    ProductComparisonRequest,
};

use super::extractors::Validate;
use super::sanitizers::{sanitize_string, SanitizeOptions};
use super::validators::{
    sanitize_user_id, validate_category_name, validate_context, validate_discount_percentage,
    validate_discount_range, validate_limit, validate_platform_list, validate_platform_name,
    validate_product_name,
};
use crate::app_error::AppResult;
use crate::catalog::{CampaignFilter, ComparisonFilter, DealFilter};

pub const DEFAULT_DEALS_LIMIT: i64 = 50;
pub const DEFAULT_CAMPAIGNS_LIMIT: i64 = 20;
const FREE_TEXT_FILTER_MAX_LENGTH: usize = 100;

/// A validated POST comparison: filters plus caller metadata
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonQuery {
    pub filter: ComparisonFilter,
    pub user_id: Option<String>,
    pub context: Option<Map<String, Value>>,
}

fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Run `check` for its rejections, keep the trimmed input
fn search_term<F>(value: &str, check: F) -> AppResult<String>
where
    F: FnOnce(&str) -> AppResult<String>,
{
    check(value)?;
    Ok(value.trim().to_string())
}

fn product_name(value: &str) -> AppResult<String> {
    search_term(value, validate_product_name)
}

fn free_text(value: Option<&str>, field: &str) -> AppResult<Option<String>> {
    present(value)
        .map(|v| {
            search_term(v, |v| {
                sanitize_string(v, SanitizeOptions::max_length(FREE_TEXT_FILTER_MAX_LENGTH))
                    .map_err(|e| e.with_field(field))
            })
        })
        .transpose()
}

fn category(value: Option<&str>) -> AppResult<Option<String>> {
    present(value)
        .map(|v| search_term(v, validate_category_name))
        .transpose()
}

fn platform(value: Option<&str>) -> AppResult<Option<String>> {
    present(value).map(validate_platform_name).transpose()
}

/// Null, an empty string and an empty list all mean "every platform"
fn platform_list(value: Option<&Value>) -> AppResult<Vec<String>> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(s)) if s.is_empty() => Ok(Vec::new()),
        Some(Value::Array(items)) if items.is_empty() => Ok(Vec::new()),
        Some(v) => validate_platform_list(v),
    }
}

fn limit_or(value: Option<&Value>, default: i64) -> AppResult<i64> {
    match value {
        None | Some(Value::Null) => Ok(default),
        Some(v) => validate_limit(v),
    }
}

fn deal_filters(
    platform_name: Option<&str>,
    category_name: Option<&str>,
    min_discount: Option<&Value>,
    max_discount: Option<&Value>,
    featured_only: Option<bool>,
    active_only: Option<bool>,
    limit: Option<&Value>,
) -> AppResult<DealFilter> {
    let platform = platform(platform_name)?;
    let category = category(category_name)?;

    let min_discount = match min_discount {
        None | Some(Value::Null) => 0.0,
        Some(v) => validate_discount_percentage(v)?,
    };
    let max_discount = match max_discount {
        None | Some(Value::Null) => None,
        Some(v) => Some(validate_discount_percentage(v)?),
    };
    let limit = limit_or(limit, DEFAULT_DEALS_LIMIT)?;
    validate_discount_range(min_discount, max_discount)?;

    Ok(DealFilter {
        platform,
        category,
        min_discount,
        max_discount,
        featured_only: featured_only.unwrap_or(false),
        active_only: active_only.unwrap_or(true),
        limit,
    })
}

impl Validate for ProductCompareParams {
    type Output = ComparisonFilter;

    fn validate(self) -> AppResult<ComparisonFilter> {
        let platforms = self.platforms.map(Value::String);
        Ok(ComparisonFilter {
            product_name: product_name(&self.product_name)?,
            platforms: platform_list(platforms.as_ref())?,
            category: category(self.category.as_deref())?,
            brand: free_text(self.brand.as_deref(), "brand")?,
        })
    }
}

impl Validate for ProductComparisonRequest {
    type Output = ComparisonQuery;

    fn validate(self) -> AppResult<ComparisonQuery> {
        let filter = ComparisonFilter {
            product_name: product_name(&self.product_name)?,
            platforms: platform_list(self.platforms.as_ref())?,
            category: category(self.category.as_deref())?,
            brand: free_text(self.brand.as_deref(), "brand")?,
        };
        Ok(ComparisonQuery {
            filter,
            user_id: sanitize_user_id(self.user_id.as_deref())?,
            context: validate_context(self.context.as_ref())?,
        })
    }
}

impl Validate for DealsParams {
    type Output = DealFilter;

    fn validate(self) -> AppResult<DealFilter> {
        let min_discount = self.min_discount.map(Value::String);
        let max_discount = self.max_discount.map(Value::String);
        let limit = self.limit.map(Value::String);
        deal_filters(
            self.platform.as_deref(),
            self.category.as_deref(),
            min_discount.as_ref(),
            max_discount.as_ref(),
            self.featured_only,
            self.active_only,
            limit.as_ref(),
        )
    }
}

impl Validate for DealsRequest {
    type Output = DealFilter;

    fn validate(self) -> AppResult<DealFilter> {
        deal_filters(
            self.platform.as_deref(),
            self.category.as_deref(),
            self.min_discount.as_ref(),
            self.max_discount.as_ref(),
            self.featured_only,
            self.active_only,
            self.limit.as_ref(),
        )
    }
}

impl Validate for CampaignParams {
    type Output = CampaignFilter;

    fn validate(self) -> AppResult<CampaignFilter> {
        let limit = self.limit.map(Value::String);
        Ok(CampaignFilter {
            platform: platform(self.platform.as_deref())?,
            campaign_type: free_text(self.campaign_type.as_deref(), "campaign_type")?,
            featured_only: self.featured_only.unwrap_or(false),
            active_only: self.active_only.unwrap_or(true),
            limit: limit_or(limit.as_ref(), DEFAULT_CAMPAIGNS_LIMIT)?,
        })
    }
}

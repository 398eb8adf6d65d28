//! Turning catalog rows into comparison and deal views

use std::collections::{BTreeSet, HashMap};

use rust_decimal::Decimal;
use shared::{
    decimal_to_f64, DealInfo, DealRow, PriceRange, PriceRow, ProductComparison, ProductInfo,
    ProductPrice,
};

/// Group price rows by product, keeping first-seen product order.
///
/// Products without any available price are dropped. The best deal is the
/// cheapest available platform and the savings potential is the spread of
/// available prices.
pub fn build_comparisons(rows: &[PriceRow]) -> Vec<ProductComparison> {
    let mut order: Vec<i64> = Vec::new();
    let mut grouped: HashMap<i64, (ProductInfo, Vec<ProductPrice>)> = HashMap::new();

    for row in rows {
        grouped
            .entry(row.product_id)
            .or_insert_with(|| {
                order.push(row.product_id);
                (ProductInfo::from(row), Vec::new())
            })
            .1
            .push(ProductPrice::from(row));
    }

    order
        .into_iter()
        .filter_map(|id| grouped.remove(&id))
        .filter_map(|(product, platforms)| compare_product(product, platforms))
        .collect()
}

fn compare_product(product: ProductInfo, platforms: Vec<ProductPrice>) -> Option<ProductComparison> {
    let available: Vec<&ProductPrice> = platforms.iter().filter(|p| p.is_available).collect();

    let best_deal = available
        .iter()
        .copied()
        .min_by(|a, b| a.current_price.total_cmp(&b.current_price))?
        .clone();

    let min = best_deal.current_price;
    let max = available
        .iter()
        .map(|p| p.current_price)
        .fold(min, f64::max);

    Some(ProductComparison {
        product,
        platforms,
        best_deal,
        savings_potential: max - min,
        price_range: PriceRange { min, max },
    })
}

/// Distinct platform names across all comparisons, sorted
pub fn platforms_compared(comparisons: &[ProductComparison]) -> Vec<String> {
    comparisons
        .iter()
        .flat_map(|c| c.platforms.iter().map(|p| p.platform_name.clone()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Zero and missing are both "unknown" for optional money columns
fn known(value: Option<Decimal>) -> Option<f64> {
    value.filter(|v| !v.is_zero()).map(decimal_to_f64)
}

/// Price after the deal and the amount saved, when the row carries enough
/// price data to tell.
pub fn deal_pricing(
    current_price: Option<f64>,
    original_price: Option<f64>,
    discount_percentage: Option<f64>,
) -> (Option<f64>, Option<f64>) {
    match (current_price, original_price, discount_percentage) {
        (Some(current), _, Some(pct)) => {
            let discounted = current * (1.0 - pct / 100.0);
            (Some(discounted), Some(current - discounted))
        }
        (Some(current), Some(original), None) => (Some(current), Some(original - current)),
        _ => (None, None),
    }
}

pub fn deal_from_row(row: DealRow) -> DealInfo {
    let current_price = known(row.current_price);
    let original_price = known(row.original_price);
    let discount_percentage = known(row.discount_percentage);
    let (discounted_price, savings_amount) =
        deal_pricing(current_price, original_price, discount_percentage);

    DealInfo {
        id: row.id,
        title: row.title,
        description: row.description,
        discount_type: row.discount_type,
        discount_value: decimal_to_f64(row.discount_value),
        discount_percentage,
        max_discount_amount: known(row.max_discount_amount),
        min_order_amount: known(row.min_order_amount),
        discount_code: row.discount_code,
        platform_name: row.platform_name,
        product_name: row.product_name,
        category_name: row.category_name,
        original_price,
        discounted_price,
        savings_amount,
        is_featured: row.is_featured,
        start_date: row.start_date,
        end_date: row.end_date,
        usage_limit_per_user: row.usage_limit_per_user,
    }
}

/// Distinct platforms and categories present in a deal list, sorted
pub fn deal_facets(deals: &[DealInfo]) -> (Vec<String>, Vec<String>) {
    let platforms: BTreeSet<String> = deals.iter().map(|d| d.platform_name.clone()).collect();
    let categories: BTreeSet<String> = deals
        .iter()
        .filter_map(|d| d.category_name.clone())
        .collect();
    (platforms.into_iter().collect(), categories.into_iter().collect())
}

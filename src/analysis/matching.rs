// src/analysis/matching.rs

//! Pairs a stored forecast with the sales it predicted.
//!
//! Rules are tried in order and the first one that finds an unclaimed sale wins:
//! 1. `product_id` equality (and the same variant when the forecast names one)
//! 2. `variant_id` equality, for catalogs that re-keyed the parent product
//! 3. exact display-name equality against the catalog, last resort
//!
//! Only sales from the forecast's date and market are candidates, and each
//! sale is credited to at most one forecast.

use crate::model::accuracy::MatchTier;
use crate::model::forecast::ForecastOutput;
use crate::model::records::{Product, SalesRecord};
use std::collections::HashMap;

/// Catalog lookup by product id.
#[derive(Debug, Clone, Default)]
pub struct CatalogIndex<'a> {
    products: HashMap<&'a str, &'a Product>,
}

impl<'a> CatalogIndex<'a> {
    pub fn new(catalog: &'a [Product]) -> Self {
        Self {
            products: catalog.iter().map(|p| (p.id.as_str(), p)).collect(),
        }
    }

    pub fn product(&self, product_id: &str) -> Option<&'a Product> {
        self.products.get(product_id).copied()
    }

    /// Display name of what was sold, `"Product - Variant"` for variants.
    pub fn sale_name(&self, sale: &SalesRecord) -> Option<String> {
        let product = self.product(&sale.product_id)?;
        match &sale.variant_id {
            Some(variant_id) => product
                .variant(variant_id)
                .map(|v| format!("{} - {}", product.name, v.name)),
            None => Some(product.name.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchedActuals<'s> {
    pub tier: MatchTier,
    pub sales: Vec<&'s SalesRecord>,
}

impl MatchedActuals<'_> {
    pub fn quantity(&self) -> u32 {
        self.sales
            .iter()
            .fold(0u32, |acc, s| acc.saturating_add(s.quantity_sold))
    }

    fn unmatched() -> Self {
        Self {
            tier: MatchTier::Unmatched,
            sales: Vec::new(),
        }
    }
}

const TIERS: [MatchTier; 3] = [MatchTier::ProductId, MatchTier::VariantId, MatchTier::ProductName];

fn tier_accepts(
    tier: MatchTier,
    forecast: &ForecastOutput,
    sale: &SalesRecord,
    catalog: &CatalogIndex<'_>,
) -> bool {
    if sale.date != forecast.forecast_for_date || sale.market_id != forecast.market_id {
        return false;
    }
    match tier {
        MatchTier::ProductId => {
            sale.product_id == forecast.product_id
                && (forecast.variant_id.is_none() || sale.variant_id == forecast.variant_id)
        }
        MatchTier::VariantId => {
            forecast.variant_id.is_some() && sale.variant_id == forecast.variant_id
        }
        MatchTier::ProductName => {
            !forecast.product_name.is_empty()
                && catalog.sale_name(sale).as_deref() == Some(forecast.product_name.as_str())
        }
        MatchTier::Unmatched => false,
    }
}

/// Finds the actual sales for a single `forecast` among `candidates`.
pub fn resolve_actuals<'s>(
    forecast: &ForecastOutput,
    candidates: &[&'s SalesRecord],
    catalog: &CatalogIndex<'_>,
) -> MatchedActuals<'s> {
    resolve_slot(&[forecast], candidates, catalog)
        .into_iter()
        .next()
        .unwrap_or_else(MatchedActuals::unmatched)
}

/// Resolves every forecast of one date and market against a shared pool of sales.
///
/// Tiers run in priority order across the whole slot, and a sale claimed by
/// one forecast leaves the pool, so no sale is credited twice. Within a tier,
/// variant forecasts claim before product-level ones. The result is aligned
/// with `forecasts`.
pub fn resolve_slot<'s>(
    forecasts: &[&ForecastOutput],
    candidates: &[&'s SalesRecord],
    catalog: &CatalogIndex<'_>,
) -> Vec<MatchedActuals<'s>> {
    let mut order: Vec<usize> = (0..forecasts.len()).collect();
    order.sort_by(|&a, &b| {
        let key = |i: usize| {
            let f = forecasts[i];
            (f.variant_id.is_none(), f.product_id.as_str(), f.variant_id.as_deref())
        };
        key(a).cmp(&key(b))
    });

    let mut claimed = vec![false; candidates.len()];
    let mut resolved: Vec<Option<MatchedActuals<'s>>> = vec![None; forecasts.len()];
    for tier in TIERS {
        for &i in &order {
            if resolved[i].is_some() {
                continue;
            }
            let picked: Vec<usize> = candidates
                .iter()
                .enumerate()
                .filter(|(j, sale)| !claimed[*j] && tier_accepts(tier, forecasts[i], sale, catalog))
                .map(|(j, _)| j)
                .collect();
            if picked.is_empty() {
                continue;
            }
            for &j in &picked {
                claimed[j] = true;
            }
            resolved[i] = Some(MatchedActuals {
                tier,
                sales: picked.iter().map(|&j| candidates[j]).collect(),
            });
        }
    }

    resolved
        .into_iter()
        .map(|m| m.unwrap_or_else(MatchedActuals::unmatched))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::{DemandModel, Poisson};
    use crate::model::forecast::{
        ConfidenceLevel, DistributionType, MomentumTrend, PredictionInterval,
    };
    use chrono::NaiveDate;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 10).unwrap()
    }

    fn forecast(product: &str, variant: Option<&str>, name: &str) -> ForecastOutput {
        ForecastOutput {
            product_id: product.into(),
            variant_id: variant.map(str::to_string),
            market_id: "M1".into(),
            product_name: name.into(),
            forecast_for_date: day(),
            unit_price: 10.0,
            unit_cost: 4.0,
            baseline_forecast: 5.0,
            weather_adjusted_forecast: 5.0,
            weather_condition: None,
            lambda: 5.0,
            distribution_type: DistributionType::Poisson,
            demand_model: DemandModel::Poisson(Poisson::new(5.0)),
            optimal_quantity: 6,
            service_level_target: 0.6,
            stockout_probability: 0.2,
            waste_probability: 0.6,
            prediction_interval: PredictionInterval { lower: 2, upper: 9 },
            expected_sales: 4.5,
            expected_leftover: 1.5,
            expected_profit: 21.0,
            confidence_level: ConfidenceLevel::Medium,
            data_points: 10,
            same_day_data_points: 1,
            outliers_removed: 0,
            momentum_trend: MomentumTrend::Stable,
            is_high_volatility: false,
            no_data: false,
            adjustments: Vec::new(),
        }
    }

    fn sale(product: &str, variant: Option<&str>, market: &str, qty: u32) -> SalesRecord {
        SalesRecord {
            date: day(),
            product_id: product.into(),
            variant_id: variant.map(str::to_string),
            market_id: market.into(),
            quantity_sold: qty,
            price: 10.0,
            cost: 4.0,
        }
    }

    fn catalog() -> Vec<Product> {
        vec![
            Product::new("P1", "Bread", 10.0, 4.0),
            Product::new("P9", "Cake", 20.0, 8.0).with_variant("V1", "Small", 12.0, 5.0),
        ]
    }

    #[test]
    fn test_product_id_wins() {
        let cat = catalog();
        let index = CatalogIndex::new(&cat);
        let sales = [sale("P1", None, "M1", 4), sale("P1", None, "M1", 3), sale("P1", None, "M2", 50)];
        let refs: Vec<&SalesRecord> = sales.iter().collect();
        let m = resolve_actuals(&forecast("P1", None, "Bread"), &refs, &index);
        assert_eq!(m.tier, MatchTier::ProductId);
        assert_eq!(m.quantity(), 7);
    }

    #[test]
    fn test_variant_fallback() {
        let cat = catalog();
        let index = CatalogIndex::new(&cat);
        let sales = [sale("P9", Some("V1"), "M1", 5)];
        let refs: Vec<&SalesRecord> = sales.iter().collect();
        let m = resolve_actuals(&forecast("OLD-P9", Some("V1"), "Cake - Small"), &refs, &index);
        assert_eq!(m.tier, MatchTier::VariantId);
        assert_eq!(m.quantity(), 5);
    }

    #[test]
    fn test_name_fallback() {
        let cat = catalog();
        let index = CatalogIndex::new(&cat);
        let sales = [sale("P1", None, "M1", 9)];
        let refs: Vec<&SalesRecord> = sales.iter().collect();
        let m = resolve_actuals(&forecast("LEGACY-7", None, "Bread"), &refs, &index);
        assert_eq!(m.tier, MatchTier::ProductName);
        assert_eq!(m.quantity(), 9);
    }

    #[test]
    fn test_unmatched() {
        let cat = catalog();
        let index = CatalogIndex::new(&cat);
        let sales = [sale("P1", None, "M2", 9)];
        let refs: Vec<&SalesRecord> = sales.iter().collect();
        let m = resolve_actuals(&forecast("P1", None, "Bread"), &refs, &index);
        assert_eq!(m.tier, MatchTier::Unmatched);
        assert_eq!(m.quantity(), 0);
    }

    #[test]
    fn test_sale_is_claimed_once_across_tiers() {
        let cat = catalog();
        let index = CatalogIndex::new(&cat);
        let sales = [sale("P9", Some("V1"), "M1", 10)];
        let refs: Vec<&SalesRecord> = sales.iter().collect();
        let current = forecast("P9", Some("V1"), "Cake - Small");
        let legacy = forecast("OLD", Some("V1"), "Cake - Small");

        let resolved = resolve_slot(&[&legacy, &current], &refs, &index);
        assert_eq!(resolved[0].tier, MatchTier::Unmatched);
        assert_eq!(resolved[0].quantity(), 0);
        assert_eq!(resolved[1].tier, MatchTier::ProductId);
        assert_eq!(resolved[1].quantity(), 10);
    }

    #[test]
    fn test_variant_forecast_claims_before_product_level() {
        let cat = catalog();
        let index = CatalogIndex::new(&cat);
        let sales = [sale("P9", Some("V1"), "M1", 4), sale("P9", None, "M1", 6)];
        let refs: Vec<&SalesRecord> = sales.iter().collect();
        let whole = forecast("P9", None, "Cake");
        let small = forecast("P9", Some("V1"), "Cake - Small");

        let resolved = resolve_slot(&[&whole, &small], &refs, &index);
        assert_eq!(resolved[0].quantity(), 6);
        assert_eq!(resolved[1].quantity(), 4);
    }

    #[test]
    fn test_variant_forecast_ignores_sibling_variants() {
        let cat = catalog();
        let index = CatalogIndex::new(&cat);
        let sales = [sale("P9", Some("V1"), "M1", 2), sale("P9", Some("V2"), "M1", 30)];
        let refs: Vec<&SalesRecord> = sales.iter().collect();
        let m = resolve_actuals(&forecast("P9", Some("V1"), "Cake - Small"), &refs, &index);
        assert_eq!(m.tier, MatchTier::ProductId);
        assert_eq!(m.quantity(), 2);
    }
}

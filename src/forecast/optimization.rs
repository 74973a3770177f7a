// src/forecast/optimization.rs

//! Newsvendor production sizing.
//!
//! Balances the cost of producing a unit that goes to waste against the margin
//! lost when demand cannot be served.

use crate::config::OptimizerConfig;
use crate::distribution::{DemandDistribution, DemandModel};
use crate::error::{ForecastError, Result};
use crate::model::forecast::PredictionInterval;
use crate::model::records::Pricing;

/// Largest quantile search the optimizer will run. Every `cdf`/`quantile`
/// call walks the support from zero, so the bound caps the work per item.
pub const MAX_SEARCH_BOUND: u32 = 5_000_000;

/// Calculates the critical fractile (target service level).
///
/// Formula: `CF = margin / (margin + cost)`, clamped to `[0, 1]`.
/// A zero or negative denominator yields 0.
pub fn calculate_critical_fractile(margin: f64, cost: f64) -> f64 {
    let denominator = margin + cost;
    if denominator <= 0.0 || !denominator.is_finite() {
        return 0.0;
    }
    (margin / denominator).clamp(0.0, 1.0)
}

/// Rejects pricing the optimizer cannot work with.
pub fn validate_pricing(item: &str, pricing: Pricing) -> Result<()> {
    let Pricing { price, cost } = pricing;
    if !price.is_finite() || !cost.is_finite() || price < 0.0 || cost < 0.0 {
        return Err(ForecastError::InvalidPricing {
            item: item.to_string(),
            price,
            cost,
        });
    }
    if pricing.margin() <= 0.0 {
        return Err(ForecastError::NonPositiveMargin {
            item: item.to_string(),
            price,
            cost,
        });
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NewsvendorPlan {
    pub optimal_quantity: u32,
    pub service_level_target: f64,
    pub stockout_probability: f64,
    /// Probability that demand ends strictly below the produced quantity.
    pub waste_probability: f64,
    pub prediction_interval: PredictionInterval,
    /// `E[min(D, Q)]`
    pub expected_sales: f64,
    /// `E[(Q - D)+]`
    pub expected_leftover: f64,
    pub expected_profit: f64,
}

#[derive(Debug, Clone)]
pub struct NewsvendorOptimizer {
    config: OptimizerConfig,
}

impl NewsvendorOptimizer {
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    /// Picks the smallest quantity whose CDF reaches the critical fractile.
    ///
    /// # Arguments
    /// * `item` - Label used in error messages.
    /// * `model` - Demand distribution already moved to the final lambda.
    /// * `pricing` - Unit price and cost; the margin must be positive.
    /// * `high_volatility` - Widens the prediction interval tails.
    pub fn optimize(
        &self,
        item: &str,
        model: &DemandModel,
        pricing: Pricing,
        high_volatility: bool,
    ) -> Result<NewsvendorPlan> {
        validate_pricing(item, pricing)?;
        let bound = model.search_bound();
        if bound > MAX_SEARCH_BOUND {
            return Err(ForecastError::InvalidParameter(format!(
                "{item}: demand mean {:.3e} with variance {:.3e} is outside the supported range",
                model.mean(),
                model.variance()
            )));
        }
        let margin = pricing.margin();
        let cost = pricing.cost;

        let service_level_target = calculate_critical_fractile(margin, cost);
        let q = model.quantile(service_level_target);

        let cdf_q = model.cdf(q);
        let pmf_q = model.pmf(q);
        let stockout_probability = (1.0 - cdf_q).clamp(0.0, 1.0);
        let waste_probability = (cdf_q - pmf_q).clamp(0.0, 1.0);

        let (expected_sales, expected_leftover) = expected_sales_and_leftover(model, q);
        let expected_profit = margin * expected_sales - cost * expected_leftover;

        let (lo, hi) = if high_volatility {
            self.config.volatile_interval
        } else {
            self.config.interval
        };
        let prediction_interval = PredictionInterval {
            lower: model.quantile(lo).min(q),
            upper: model.quantile(hi).max(q),
        };

        Ok(NewsvendorPlan {
            optimal_quantity: q,
            service_level_target,
            stockout_probability,
            waste_probability,
            prediction_interval,
            expected_sales,
            expected_leftover,
            expected_profit,
        })
    }
}

/// Exact finite sums over `k < q`:
/// `E[min(D,q)] = sum k*p(k) + q*P(D >= q)` and `E[(q-D)+] = sum (q-k)*p(k)`.
fn expected_sales_and_leftover(model: &DemandModel, q: u32) -> (f64, f64) {
    let qf = q as f64;
    let mut below = 0.0;
    let mut partial_mean = 0.0;
    let mut leftover = 0.0;
    for k in 0..q {
        let p = model.pmf(k);
        below += p;
        partial_mean += k as f64 * p;
        leftover += (qf - k as f64) * p;
    }
    let at_or_above = (1.0 - below).clamp(0.0, 1.0);
    (partial_mean + qf * at_or_above, leftover.max(0.0))
}

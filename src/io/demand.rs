// src/io/demand.rs

//! Synthetic sales histories for demos and tests.

use crate::error::{ForecastError, Result};
use crate::model::records::{ItemKey, Pricing, SalesRecord};
use chrono::{Datelike, Duration, NaiveDate};
use rand::Rng;
use rand_distr::{Distribution, Gamma, Poisson};

/// Shape of a generated demand stream.
#[derive(Debug, Clone, PartialEq)]
pub struct DemandProfile {
    /// Average daily units before weekday scaling.
    pub mean: f64,
    /// Multipliers, Monday first.
    pub weekday_factors: [f64; 7],
    /// Variance/mean ratio; values above 1 draw from a gamma-Poisson mixture.
    pub dispersion: f64,
}

impl DemandProfile {
    pub fn flat(mean: f64) -> Self {
        Self {
            mean,
            weekday_factors: [1.0; 7],
            dispersion: 1.0,
        }
    }

    /// Quieter early week, busier weekend.
    pub fn retail(mean: f64) -> Self {
        Self {
            mean,
            weekday_factors: [0.85, 0.85, 0.9, 0.95, 1.1, 1.25, 1.1],
            dispersion: 1.0,
        }
    }

    pub fn with_dispersion(mut self, dispersion: f64) -> Self {
        self.dispersion = dispersion;
        self
    }
}

fn record(key: &ItemKey, pricing: Pricing, date: NaiveDate, quantity: u32) -> SalesRecord {
    SalesRecord {
        date,
        product_id: key.product_id.clone(),
        variant_id: key.variant_id.clone(),
        market_id: key.market_id.clone(),
        quantity_sold: quantity,
        price: pricing.price,
        cost: pricing.cost,
    }
}

/// Every day sells exactly `value`. Useful for checking steady-state behaviour.
pub fn generate_constant_history(
    key: &ItemKey,
    pricing: Pricing,
    start: NaiveDate,
    days: usize,
    value: u32,
) -> Vec<SalesRecord> {
    (0..days)
        .map(|i| record(key, pricing, start + Duration::days(i as i64), value))
        .collect()
}

/// Draws one record per day from the profile's count distribution.
///
/// # Arguments
/// * `start` - First day of the history.
/// * `days` - Number of consecutive days to generate.
pub fn generate_history<R: Rng + ?Sized>(
    rng: &mut R,
    key: &ItemKey,
    pricing: Pricing,
    start: NaiveDate,
    days: usize,
    profile: &DemandProfile,
) -> Result<Vec<SalesRecord>> {
    if !(profile.mean >= 0.0 && profile.mean.is_finite()) || profile.dispersion < 1.0 {
        return Err(ForecastError::InvalidParameter(format!(
            "demand profile needs mean >= 0 and dispersion >= 1, got {:?}",
            profile
        )));
    }

    let mut history = Vec::with_capacity(days);
    for i in 0..days {
        let date = start + Duration::days(i as i64);
        let day_mean =
            profile.mean * profile.weekday_factors[date.weekday().num_days_from_monday() as usize];
        let quantity = sample_count(rng, day_mean, profile.dispersion)?;
        history.push(record(key, pricing, date, quantity));
    }
    Ok(history)
}

fn sample_count<R: Rng + ?Sized>(rng: &mut R, mean: f64, dispersion: f64) -> Result<u32> {
    if mean <= 0.0 {
        return Ok(0);
    }
    let rate = if dispersion > 1.0 {
        let gamma = Gamma::new(mean / (dispersion - 1.0), dispersion - 1.0)
            .map_err(|e| ForecastError::InvalidParameter(e.to_string()))?;
        gamma.sample(rng)
    } else {
        mean
    };
    if rate <= 0.0 {
        return Ok(0);
    }
    let poisson = Poisson::new(rate).map_err(|e| ForecastError::InvalidParameter(e.to_string()))?;
    let draw: f64 = poisson.sample(rng);
    Ok(draw.max(0.0).round() as u32)
}

/// A demand stream that jumps from `low` to `high` after `switch_after` days.
pub fn generate_step_history(
    key: &ItemKey,
    pricing: Pricing,
    start: NaiveDate,
    days: usize,
    switch_after: usize,
    low: u32,
    high: u32,
) -> Vec<SalesRecord> {
    (0..days)
        .map(|i| {
            let qty = if i < switch_after { low } else { high };
            record(key, pricing, start + Duration::days(i as i64), qty)
        })
        .collect()
}

/// Multiplies `count` randomly chosen days by `multiplier`, simulating bulk orders.
pub fn inject_spikes<R: Rng + ?Sized>(
    rng: &mut R,
    history: &mut [SalesRecord],
    count: usize,
    multiplier: u32,
) {
    if history.is_empty() {
        return;
    }
    for _ in 0..count {
        let i = rng.gen_range(0..history.len());
        history[i].quantity_sold = history[i].quantity_sold.saturating_mul(multiplier).max(multiplier);
    }
}

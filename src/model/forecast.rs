// src/model/forecast.rs

use crate::distribution::DemandModel;
use crate::model::context::WeatherCondition;
use crate::model::records::ItemKey;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionType {
    Poisson,
    NegativeBinomial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    None,
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MomentumTrend {
    Rising,
    Falling,
    Stable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionInterval {
    pub lower: u32,
    pub upper: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentSource {
    Weather,
    Payday,
    Event,
    Seasonality,
    Momentum,
    Bias,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentEffect {
    Multiply,
    Add,
}

/// One explainable step applied to the demand estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Adjustment {
    pub source: AdjustmentSource,
    pub label: String,
    pub effect: AdjustmentEffect,
    pub magnitude: f64,
}

impl Adjustment {
    pub fn multiplier(source: AdjustmentSource, label: impl Into<String>, factor: f64) -> Self {
        Self {
            source,
            label: label.into(),
            effect: AdjustmentEffect::Multiply,
            magnitude: factor,
        }
    }

    pub fn offset(source: AdjustmentSource, label: impl Into<String>, delta: f64) -> Self {
        Self {
            source,
            label: label.into(),
            effect: AdjustmentEffect::Add,
            magnitude: delta,
        }
    }

    /// Additive magnitude, zero for multipliers.
    pub fn offset_value(&self) -> f64 {
        match self.effect {
            AdjustmentEffect::Multiply => 0.0,
            AdjustmentEffect::Add => self.magnitude,
        }
    }

    pub fn apply(&self, value: f64) -> f64 {
        match self.effect {
            AdjustmentEffect::Multiply => value * self.magnitude,
            AdjustmentEffect::Add => value + self.magnitude,
        }
    }
}

/// The engine's answer for one item on one date. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastOutput {
    pub product_id: String,
    pub variant_id: Option<String>,
    pub market_id: String,
    pub product_name: String,
    pub forecast_for_date: NaiveDate,
    pub unit_price: f64,
    pub unit_cost: f64,

    pub baseline_forecast: f64,
    pub weather_adjusted_forecast: f64,
    pub weather_condition: Option<WeatherCondition>,
    pub lambda: f64,
    pub distribution_type: DistributionType,
    /// The distribution `optimal_quantity` and the interval were read from.
    pub demand_model: DemandModel,

    pub optimal_quantity: u32,
    pub service_level_target: f64,
    pub stockout_probability: f64,
    pub waste_probability: f64,
    pub prediction_interval: PredictionInterval,
    pub expected_sales: f64,
    pub expected_leftover: f64,
    pub expected_profit: f64,

    pub confidence_level: ConfidenceLevel,
    pub data_points: usize,
    pub same_day_data_points: usize,
    pub outliers_removed: usize,
    pub momentum_trend: MomentumTrend,
    pub is_high_volatility: bool,
    pub no_data: bool,

    pub adjustments: Vec<Adjustment>,
}

impl ForecastOutput {
    pub fn key(&self) -> ItemKey {
        ItemKey {
            product_id: self.product_id.clone(),
            variant_id: self.variant_id.clone(),
            market_id: self.market_id.clone(),
        }
    }

    pub fn margin(&self) -> f64 {
        self.unit_price - self.unit_cost
    }

    /// `lambda` with any bias correction taken back out.
    pub fn uncorrected_lambda(&self) -> f64 {
        let bias: f64 = self
            .adjustments
            .iter()
            .filter(|a| a.source == AdjustmentSource::Bias)
            .map(|a| a.offset_value())
            .sum();
        (self.lambda - bias).max(0.0)
    }
}

/// Batch entry: either a forecast or the reason this item failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub key: ItemKey,
    pub date: NaiveDate,
    pub output: Option<ForecastOutput>,
    pub error: Option<String>,
}

impl ForecastResult {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adjustment_apply() {
        let rain = Adjustment::multiplier(AdjustmentSource::Weather, "rain", 0.7);
        let bias = Adjustment::offset(AdjustmentSource::Bias, "bias", -1.5);
        assert!((rain.apply(10.0) - 7.0).abs() < 1e-12);
        assert!((bias.apply(10.0) - 8.5).abs() < 1e-12);
    }

    #[test]
    fn test_confidence_ordering() {
        assert!(ConfidenceLevel::None < ConfidenceLevel::Low);
        assert!(ConfidenceLevel::Medium < ConfidenceLevel::High);
    }
}

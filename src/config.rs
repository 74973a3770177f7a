// src/config.rs

//! Calibration constants for every stage of the engine.
//!
//! All sections default to calibrated values and deserialize with
//! `#[serde(default)]`, so a JSON file only needs the keys it overrides.

use crate::error::{ForecastError, Result};
use crate::model::context::WeatherCondition;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub baseline: BaselineConfig,
    pub weather: WeatherFactors,
    pub calendar: CalendarConfig,
    pub bias: BiasConfig,
    pub signals: SignalConfig,
    pub optimizer: OptimizerConfig,
    pub recommendations: RecommendationConfig,
}

impl EngineConfig {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Rejects constants that would break the numeric routines downstream.
    ///
    /// Comparisons are written so that NaN fails every check.
    pub fn validate(&self) -> Result<()> {
        let b = &self.baseline;
        ensure(b.lookback_days > 0, "baseline.lookback_days must be > 0")?;
        ensure(
            b.overdispersion_ratio >= 1.0 && b.overdispersion_ratio.is_finite(),
            "baseline.overdispersion_ratio must be a finite value >= 1.0",
        )?;
        match b.outlier_rule {
            OutlierRule::ZScore { threshold } => {
                ensure(positive(threshold), "z-score threshold must be > 0")?
            }
            OutlierRule::Iqr { multiplier } => {
                ensure(positive(multiplier), "iqr multiplier must be > 0")?
            }
        }

        let w = &self.weather;
        ensure(
            [w.sunny, w.cloudy, w.rain, w.storm, w.wind, w.cold]
                .iter()
                .all(|f| f.is_finite() && *f >= 0.0),
            "weather factors must be finite and >= 0",
        )?;

        let bias = &self.bias;
        ensure((0.0..1.0).contains(&bias.decay), "bias.decay must be in [0, 1)")?;
        ensure(
            bias.base_gain >= 0.0 && bias.max_gain >= bias.base_gain && bias.max_gain.is_finite(),
            "bias gains must satisfy 0 <= base_gain <= max_gain",
        )?;
        ensure(
            bias.gain_growth_rate >= 0.0 && bias.gain_growth_rate.is_finite(),
            "bias.gain_growth_rate must be finite and >= 0",
        )?;
        ensure(
            (0.0..=1.0).contains(&bias.gain_relaxation),
            "bias.gain_relaxation must be in [0, 1]",
        )?;

        let sig = &self.signals;
        ensure(
            sig.momentum_threshold >= 0.0 && sig.momentum_threshold.is_finite(),
            "signals.momentum_threshold must be finite and >= 0",
        )?;
        ensure(
            (0.0..=1.0).contains(&sig.momentum_damping),
            "signals.momentum_damping must be in [0, 1]",
        )?;
        ensure(
            positive(sig.min_momentum_factor)
                && sig.min_momentum_factor <= 1.0
                && sig.max_momentum_factor >= 1.0
                && sig.max_momentum_factor.is_finite(),
            "signals momentum factors must satisfy 0 < min <= 1 <= max",
        )?;
        ensure(
            positive(sig.volatility_cv_threshold),
            "signals.volatility_cv_threshold must be > 0",
        )?;

        for (name, (lo, hi)) in [
            ("optimizer.interval", self.optimizer.interval),
            ("optimizer.volatile_interval", self.optimizer.volatile_interval),
        ] {
            if !(lo > 0.0 && lo < hi && hi < 1.0) {
                return Err(ForecastError::Config(format!(
                    "{name} tails must satisfy 0 < lower < upper < 1"
                )));
            }
        }

        let cal = &self.calendar;
        ensure(
            (1..=31).contains(&cal.payday_start_day) && cal.payday_end_day <= 31,
            "calendar payday window out of range",
        )?;
        ensure(
            cal.monthly_seasonality.iter().all(|f| positive(*f))
                && cal.events.iter().all(|e| positive(e.demand_factor))
                && positive(cal.payday_boost),
            "calendar factors must be positive",
        )?;

        let rec = &self.recommendations;
        ensure(
            [
                rec.market_accuracy_threshold,
                rec.weekday_accuracy_threshold,
                rec.product_bias_threshold,
                rec.high_priority_accuracy,
                rec.high_priority_bias,
            ]
            .iter()
            .all(|v| v.is_finite() && *v >= 0.0),
            "recommendation thresholds must be finite and >= 0",
        )?;
        ensure(
            (0.0..=1.0).contains(&rec.direction_consistency),
            "recommendations.direction_consistency must be in [0, 1]",
        )?;

        Ok(())
    }
}

fn positive(value: f64) -> bool {
    value > 0.0 && value.is_finite()
}

fn ensure(condition: bool, message: &str) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(ForecastError::Config(message.to_string()))
    }
}

/// How outliers are rejected from a daily sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum OutlierRule {
    /// Drop points further than `threshold` standard deviations from the mean.
    ZScore { threshold: f64 },
    /// Tukey fences: drop points outside `[Q1 - m*IQR, Q3 + m*IQR]`.
    Iqr { multiplier: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineConfig {
    pub lookback_days: i64,
    pub min_same_weekday_samples: usize,
    pub outlier_rule: OutlierRule,
    /// Variance/mean ratio above which the Negative Binomial is selected.
    pub overdispersion_ratio: f64,
    /// Total points needed for `medium` confidence.
    pub medium_confidence_points: usize,
    /// Same-weekday points needed for `high` confidence.
    pub high_confidence_same_day_points: usize,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            lookback_days: 90,
            min_same_weekday_samples: 3,
            outlier_rule: OutlierRule::ZScore { threshold: 2.5 },
            overdispersion_ratio: 1.2,
            medium_confidence_points: 5,
            high_confidence_same_day_points: 5,
        }
    }
}

/// Demand multipliers per weather condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherFactors {
    pub sunny: f64,
    pub cloudy: f64,
    pub rain: f64,
    pub storm: f64,
    pub wind: f64,
    pub cold: f64,
}

impl WeatherFactors {
    pub fn factor(&self, condition: WeatherCondition) -> f64 {
        match condition {
            WeatherCondition::Sunny => self.sunny,
            WeatherCondition::Cloudy => self.cloudy,
            WeatherCondition::Rain => self.rain,
            WeatherCondition::Storm => self.storm,
            WeatherCondition::Wind => self.wind,
            WeatherCondition::Cold => self.cold,
        }
    }
}

impl Default for WeatherFactors {
    fn default() -> Self {
        Self {
            sunny: 1.0,
            cloudy: 1.0,
            rain: 0.7,
            storm: 0.5,
            wind: 0.85,
            cold: 0.9,
        }
    }
}

/// A named event that recurs on the same calendar day every year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnualEvent {
    pub name: String,
    pub month: u32,
    pub day: u32,
    pub demand_factor: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    /// Payday window opens on this day of the month and runs to month end.
    pub payday_start_day: u32,
    /// ...and continues through this day of the following month (0 disables).
    pub payday_end_day: u32,
    pub payday_boost: f64,
    pub events: Vec<AnnualEvent>,
    /// January first.
    pub monthly_seasonality: [f64; 12],
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            payday_start_day: 25,
            payday_end_day: 2,
            payday_boost: 1.15,
            events: vec![
                AnnualEvent {
                    name: "New Year's Day".into(),
                    month: 1,
                    day: 1,
                    demand_factor: 0.6,
                },
                AnnualEvent {
                    name: "Valentine's Day".into(),
                    month: 2,
                    day: 14,
                    demand_factor: 1.2,
                },
                AnnualEvent {
                    name: "New Year's Eve".into(),
                    month: 12,
                    day: 31,
                    demand_factor: 1.4,
                },
            ],
            monthly_seasonality: [1.0, 0.95, 1.0, 1.0, 1.0, 1.0, 1.05, 1.05, 1.0, 1.0, 1.0, 1.1],
        }
    }
}

/// Constants of the exponential bias corrector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BiasConfig {
    /// Weight kept by the previous estimate on each update.
    pub decay: f64,
    pub base_gain: f64,
    /// Relative gain increase per update while errors keep one sign.
    pub gain_growth_rate: f64,
    pub max_gain: f64,
    /// Same-sign streak length at which the gain starts to grow.
    pub persistence_threshold: u32,
    /// Fraction of the excess gain kept on a mixed-sign update.
    pub gain_relaxation: f64,
}

impl Default for BiasConfig {
    fn default() -> Self {
        Self {
            decay: 0.7,
            base_gain: 0.5,
            gain_growth_rate: 0.25,
            max_gain: 1.0,
            persistence_threshold: 3,
            gain_relaxation: 0.5,
        }
    }
}

/// Momentum and volatility detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    pub momentum_window: usize,
    pub min_reference_points: usize,
    /// Relative change between windows that counts as a trend.
    pub momentum_threshold: f64,
    /// Share of the observed change applied to lambda.
    pub momentum_damping: f64,
    pub max_momentum_factor: f64,
    pub min_momentum_factor: f64,
    pub volatility_cv_threshold: f64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            momentum_window: 7,
            min_reference_points: 3,
            momentum_threshold: 0.15,
            momentum_damping: 0.5,
            max_momentum_factor: 1.2,
            min_momentum_factor: 0.8,
            volatility_cv_threshold: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Lower and upper tail probabilities of the prediction interval.
    pub interval: (f64, f64),
    /// Tails used when the history is flagged highly volatile.
    pub volatile_interval: (f64, f64),
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            interval: (0.05, 0.95),
            volatile_interval: (0.025, 0.975),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationConfig {
    /// Percent accuracy below which a market is flagged.
    pub market_accuracy_threshold: f64,
    /// Percent accuracy below which a weekday is flagged.
    pub weekday_accuracy_threshold: f64,
    /// Absolute percent bias beyond which a product is flagged.
    pub product_bias_threshold: f64,
    /// Share of a product's comparisons that must err in the bias direction.
    pub direction_consistency: f64,
    pub min_product_samples: usize,
    pub min_weekday_samples: usize,
    pub min_market_samples: usize,
    /// Accuracy below this escalates a market or day finding to high priority.
    pub high_priority_accuracy: f64,
    /// Absolute bias beyond this escalates a product finding to high priority.
    pub high_priority_bias: f64,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            market_accuracy_threshold: 60.0,
            weekday_accuracy_threshold: 60.0,
            product_bias_threshold: 15.0,
            direction_consistency: 0.7,
            min_product_samples: 3,
            min_weekday_samples: 2,
            min_market_samples: 3,
            high_priority_accuracy: 40.0,
            high_priority_bias: 30.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_overrides_only_named_keys() {
        let config = EngineConfig::from_json_str(
            r#"{
                "weather": { "rain": 0.8 },
                "baseline": { "outlier_rule": { "method": "iqr", "multiplier": 1.5 } }
            }"#,
        )
        .unwrap();

        assert_eq!(config.weather.rain, 0.8);
        assert_eq!(config.weather.storm, 0.5);
        assert_eq!(config.baseline.outlier_rule, OutlierRule::Iqr { multiplier: 1.5 });
        assert_eq!(config.baseline.lookback_days, 90);
    }

    #[test]
    fn test_rejects_bad_decay() {
        let err = EngineConfig::from_json_str(r#"{ "bias": { "decay": 1.0 } }"#).unwrap_err();
        assert!(matches!(err, ForecastError::Config(_)));
    }

    #[test]
    fn test_rejects_nan_and_out_of_range_signals() {
        let mut config = EngineConfig::default();
        config.baseline.overdispersion_ratio = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.signals.min_momentum_factor = 1.3;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.recommendations.direction_consistency = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_unordered_interval() {
        let mut config = EngineConfig::default();
        config.optimizer.interval = (0.9, 0.1);
        assert!(config.validate().is_err());
    }
}

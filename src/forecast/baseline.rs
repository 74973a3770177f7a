// src/forecast/baseline.rs

use crate::config::{BaselineConfig, OutlierRule};
use crate::distribution::DemandModel;
use crate::model::forecast::ConfidenceLevel;
use crate::model::records::SalesRecord;
use chrono::{Datelike, Duration, NaiveDate};
use std::collections::BTreeMap;
use tracing::debug;

/// Cleaned sample and moments for one item ahead of a target date.
#[derive(Debug, Clone, PartialEq)]
pub struct BaselineEstimate {
    /// Arithmetic mean of `sample`.
    pub baseline: f64,
    pub variance: f64,
    pub model: DemandModel,
    /// Retained daily totals the moments were computed from, oldest first.
    pub sample: Vec<f64>,
    /// All retained daily totals regardless of weekday, oldest first.
    pub series: Vec<f64>,
    pub data_points: usize,
    pub same_day_data_points: usize,
    pub outliers_removed: usize,
    pub used_same_weekday: bool,
    pub confidence: ConfidenceLevel,
    pub no_data: bool,
}

impl BaselineEstimate {
    fn empty() -> Self {
        Self {
            baseline: 0.0,
            variance: 0.0,
            model: DemandModel::select(0.0, 0.0, 1.0),
            sample: Vec::new(),
            series: Vec::new(),
            data_points: 0,
            same_day_data_points: 0,
            outliers_removed: 0,
            used_same_weekday: false,
            confidence: ConfidenceLevel::None,
            no_data: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BaselineEstimator {
    config: BaselineConfig,
}

impl BaselineEstimator {
    pub fn new(config: BaselineConfig) -> Self {
        Self { config }
    }

    /// Builds the baseline from one item's history.
    ///
    /// Records for the same day are summed first; only days inside the
    /// lookback window and strictly before `target_date` count.
    pub fn estimate(&self, history: &[SalesRecord], target_date: NaiveDate) -> BaselineEstimate {
        let daily = daily_totals(history, target_date, self.config.lookback_days);
        if daily.is_empty() {
            return BaselineEstimate::empty();
        }

        let weekday = target_date.weekday();
        let all: Vec<f64> = daily.values().copied().collect();
        let same_day: Vec<f64> = daily
            .iter()
            .filter(|(date, _)| date.weekday() == weekday)
            .map(|(_, qty)| *qty)
            .collect();

        let (all_clean, all_removed) = remove_outliers(&all, self.config.outlier_rule);
        let (same_clean, same_removed) = remove_outliers(&same_day, self.config.outlier_rule);

        let used_same_weekday = same_clean.len() >= self.config.min_same_weekday_samples;
        let (sample, outliers_removed) = if used_same_weekday {
            (same_clean, same_removed)
        } else {
            (all_clean.clone(), all_removed)
        };

        let (baseline, variance) = mean_and_variance(&sample);
        let model = DemandModel::select(baseline, variance, self.config.overdispersion_ratio);
        let confidence = confidence_level(all.len(), same_day.len(), &self.config);

        debug!(
            data_points = all.len(),
            same_day = same_day.len(),
            outliers_removed,
            used_same_weekday,
            baseline,
            variance,
            "baseline estimated"
        );

        BaselineEstimate {
            baseline,
            variance,
            model,
            sample,
            series: all_clean,
            data_points: all.len(),
            same_day_data_points: same_day.len(),
            outliers_removed,
            used_same_weekday,
            confidence,
            no_data: false,
        }
    }
}

/// Sums quantities per day over `[target - lookback, target)`.
pub fn daily_totals(
    history: &[SalesRecord],
    target_date: NaiveDate,
    lookback_days: i64,
) -> BTreeMap<NaiveDate, f64> {
    let window_start = target_date - Duration::days(lookback_days);
    let mut daily = BTreeMap::new();
    for record in history
        .iter()
        .filter(|r| r.date < target_date && r.date >= window_start)
    {
        *daily.entry(record.date).or_insert(0.0) += record.quantity_sold as f64;
    }
    daily
}

/// Returns the kept values in their original order and how many were dropped.
pub fn remove_outliers(values: &[f64], rule: OutlierRule) -> (Vec<f64>, usize) {
    if values.len() < 4 {
        return (values.to_vec(), 0);
    }

    let (low, high) = match rule {
        OutlierRule::ZScore { threshold } => {
            let (mean, variance) = mean_and_variance(values);
            let sd = variance.sqrt();
            if sd == 0.0 {
                return (values.to_vec(), 0);
            }
            (mean - threshold * sd, mean + threshold * sd)
        }
        OutlierRule::Iqr { multiplier } => {
            let mut sorted = values.to_vec();
            sorted.sort_by(|a, b| a.total_cmp(b));
            let q1 = percentile(&sorted, 0.25);
            let q3 = percentile(&sorted, 0.75);
            let iqr = q3 - q1;
            (q1 - multiplier * iqr, q3 + multiplier * iqr)
        }
    };

    let kept: Vec<f64> = values
        .iter()
        .copied()
        .filter(|v| *v >= low && *v <= high)
        .collect();
    let removed = values.len() - kept.len();
    (kept, removed)
}

/// Mean and sample variance (`n - 1`); variance is zero below two points.
pub fn mean_and_variance(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if values.len() < 2 {
        return (mean, 0.0);
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, variance)
}

/// Linear interpolation between closest ranks of an ascending slice.
fn percentile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

pub fn confidence_level(
    data_points: usize,
    same_day_data_points: usize,
    config: &BaselineConfig,
) -> ConfidenceLevel {
    if data_points == 0 {
        ConfidenceLevel::None
    } else if same_day_data_points >= config.high_confidence_same_day_points {
        ConfidenceLevel::High
    } else if data_points >= config.medium_confidence_points || same_day_data_points > 0 {
        ConfidenceLevel::Medium
    } else {
        ConfidenceLevel::Low
    }
}

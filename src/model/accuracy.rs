// src/model/accuracy.rs

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// Which rule paired a forecast with its actual sales.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    ProductId,
    VariantId,
    ProductName,
    Unmatched,
}

/// One forecast set against what actually sold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracyComparison {
    pub date: NaiveDate,
    pub product_id: String,
    pub variant_id: Option<String>,
    pub market_id: String,
    pub product_name: String,
    pub forecast_qty: u32,
    pub actual_qty: u32,
    /// `actual_qty - forecast_qty`.
    pub diff: i64,
    /// Expected demand the forecast was built on, before bias correction.
    pub forecast_mean: f64,
    pub waste_cost: f64,
    pub stockout_revenue: f64,
    pub match_tier: MatchTier,
}

impl AccuracyComparison {
    pub fn is_matched(&self) -> bool {
        self.match_tier != MatchTier::Unmatched
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyAccuracy {
    pub date: NaiveDate,
    pub weekday: Weekday,
    pub total_forecast: u64,
    pub total_actual: u64,
    /// Percent, `None` when nothing was forecast or sold.
    pub accuracy: Option<f64>,
    /// Signed percent; positive means over-forecast.
    pub bias: Option<f64>,
    pub waste_cost: f64,
    pub stockout_revenue: f64,
    pub sample_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekdayAccuracy {
    pub weekday: Weekday,
    pub accuracy: Option<f64>,
    pub bias: Option<f64>,
    /// Days with a defined accuracy.
    pub sample_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductAccuracy {
    pub product_id: String,
    pub variant_id: Option<String>,
    pub product_name: String,
    pub total_forecast: u64,
    pub total_actual: u64,
    pub accuracy: Option<f64>,
    pub bias: Option<f64>,
    pub over_count: usize,
    pub under_count: usize,
    pub waste_cost: f64,
    pub stockout_revenue: f64,
    pub sample_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketAccuracy {
    pub market_id: String,
    pub total_forecast: u64,
    pub total_actual: u64,
    pub accuracy: Option<f64>,
    pub bias: Option<f64>,
    pub waste_cost: f64,
    pub stockout_revenue: f64,
    pub sample_size: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccuracySummary {
    pub total_forecast: u64,
    pub total_actual: u64,
    pub accuracy: Option<f64>,
    pub bias: Option<f64>,
    pub total_waste_cost: f64,
    pub total_stockout_revenue: f64,
    pub days_analyzed: usize,
    pub matched_comparisons: usize,
    pub unmatched_forecasts: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Normal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    Market,
    Product,
    Day,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub kind: RecommendationKind,
    pub priority: Priority,
    pub target: String,
    pub issue: String,
    pub suggestion: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracyAnalysisResult {
    pub summary: AccuracySummary,
    pub daily: Vec<DailyAccuracy>,
    /// Monday first, always seven entries.
    pub by_weekday: Vec<WeekdayAccuracy>,
    /// Best accuracy first; products without a defined accuracy last.
    pub by_product: Vec<ProductAccuracy>,
    pub by_market: Vec<MarketAccuracy>,
    pub recommendations: Vec<Recommendation>,
    pub comparisons: Vec<AccuracyComparison>,
}

impl AccuracyAnalysisResult {
    pub fn best_products(&self, n: usize) -> Vec<&ProductAccuracy> {
        self.by_product
            .iter()
            .filter(|p| p.accuracy.is_some())
            .take(n)
            .collect()
    }

    pub fn worst_products(&self, n: usize) -> Vec<&ProductAccuracy> {
        self.by_product
            .iter()
            .rev()
            .filter(|p| p.accuracy.is_some())
            .take(n)
            .collect()
    }

    pub fn day(&self, date: NaiveDate) -> Option<&DailyAccuracy> {
        self.daily.iter().find(|d| d.date == date)
    }
}

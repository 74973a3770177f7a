// src/io/reporting.rs

use crate::error::Result;
use crate::model::accuracy::AccuracyComparison;
use crate::model::forecast::{ForecastOutput, ForecastResult};
use crate::model::records::SalesRecord;
use chrono::NaiveDate;
use serde::Serialize;
use std::path::Path;
use tracing::info;

/// Flat CSV row for one forecast; nested fields are spread into columns.
#[derive(Debug, Clone, Serialize)]
pub struct ForecastRow {
    pub date: NaiveDate,
    pub product_id: String,
    pub variant_id: Option<String>,
    pub market_id: String,
    pub product_name: String,
    pub baseline: f64,
    pub weather_adjusted: f64,
    pub lambda: f64,
    pub distribution: String,
    pub optimal_quantity: u32,
    pub interval_lower: u32,
    pub interval_upper: u32,
    pub service_level: f64,
    pub stockout_probability: f64,
    pub waste_probability: f64,
    pub expected_profit: f64,
    pub confidence: String,
    pub momentum: String,
    pub high_volatility: bool,
    pub no_data: bool,
    pub error: Option<String>,
}

impl From<&ForecastOutput> for ForecastRow {
    fn from(o: &ForecastOutput) -> Self {
        Self {
            date: o.forecast_for_date,
            product_id: o.product_id.clone(),
            variant_id: o.variant_id.clone(),
            market_id: o.market_id.clone(),
            product_name: o.product_name.clone(),
            baseline: o.baseline_forecast,
            weather_adjusted: o.weather_adjusted_forecast,
            lambda: o.lambda,
            distribution: format!("{:?}", o.distribution_type),
            optimal_quantity: o.optimal_quantity,
            interval_lower: o.prediction_interval.lower,
            interval_upper: o.prediction_interval.upper,
            service_level: o.service_level_target,
            stockout_probability: o.stockout_probability,
            waste_probability: o.waste_probability,
            expected_profit: o.expected_profit,
            confidence: format!("{:?}", o.confidence_level),
            momentum: format!("{:?}", o.momentum_trend),
            high_volatility: o.is_high_volatility,
            no_data: o.no_data,
            error: None,
        }
    }
}

impl ForecastRow {
    fn failed(result: &ForecastResult) -> Self {
        Self {
            date: result.date,
            product_id: result.key.product_id.clone(),
            variant_id: result.key.variant_id.clone(),
            market_id: result.key.market_id.clone(),
            product_name: String::new(),
            baseline: 0.0,
            weather_adjusted: 0.0,
            lambda: 0.0,
            distribution: String::new(),
            optimal_quantity: 0,
            interval_lower: 0,
            interval_upper: 0,
            service_level: 0.0,
            stockout_probability: 0.0,
            waste_probability: 0.0,
            expected_profit: 0.0,
            confidence: String::new(),
            momentum: String::new(),
            high_volatility: false,
            no_data: true,
            error: result.error.clone(),
        }
    }
}

/// Writes one row per batch result; failed items keep their error message.
pub fn write_forecasts<P: AsRef<Path>>(file_path: P, results: &[ForecastResult]) -> Result<()> {
    let rows: Vec<ForecastRow> = results
        .iter()
        .map(|r| match &r.output {
            Some(output) => ForecastRow::from(output),
            None => ForecastRow::failed(r),
        })
        .collect();
    write_rows(file_path.as_ref(), &rows)
}

pub fn write_comparisons<P: AsRef<Path>>(file_path: P, data: &[AccuracyComparison]) -> Result<()> {
    write_rows(file_path.as_ref(), data)
}

pub fn write_sales<P: AsRef<Path>>(file_path: P, data: &[SalesRecord]) -> Result<()> {
    write_rows(file_path.as_ref(), data)
}

fn write_rows<T: Serialize>(path: &Path, data: &[T]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for record in data {
        wtr.serialize(record)?;
    }
    wtr.flush()?;
    info!(rows = data.len(), path = %path.display(), "csv exported");
    Ok(())
}

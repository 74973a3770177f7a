// src/error.rs

use thiserror::Error;

/// Errors raised by the forecasting engine and its boundary helpers.
///
/// Missing sales history is not an error; it produces a `no_data` forecast.
#[derive(Error, Debug)]
pub enum ForecastError {
    #[error("invalid pricing for {item}: price {price}, cost {cost}")]
    InvalidPricing { item: String, price: f64, cost: f64 },

    #[error("non-positive margin for {item}: price {price} does not exceed cost {cost}")]
    NonPositiveMargin { item: String, price: f64, cost: f64 },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("weather provider failed: {0}")]
    Weather(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ForecastError>;

//! Demand forecasting and production sizing.
//!
//! Sales history flows through a baseline estimate, weather and calendar
//! multipliers, and a self-correcting bias term into a newsvendor optimizer
//! that picks a production quantity. An accuracy analyzer later scores those
//! forecasts against realised sales and feeds its errors back into the bias term.

pub mod analysis;
pub mod config;
pub mod distribution;
pub mod error;
pub mod forecast;
pub mod io;
pub mod logging;
pub mod model;

pub use analysis::AccuracyAnalyzer;
pub use config::EngineConfig;
pub use error::{ForecastError, Result};
pub use forecast::{BiasBook, BiasCorrector, BiasState, ForecastEngine, ForecastRequest};
pub use model::accuracy::{AccuracyAnalysisResult, AccuracyComparison, Recommendation};
pub use model::forecast::{ConfidenceLevel, DistributionType, ForecastOutput, ForecastResult};
pub use model::records::{ItemKey, Pricing, Product, SalesRecord};

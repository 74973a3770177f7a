pub mod baseline;
pub mod bias;
pub mod calendar;
pub mod engine;
pub mod exogenous;
pub mod optimization;
pub mod signals;

pub use bias::{BiasBook, BiasCorrector, BiasState};
pub use engine::{ForecastEngine, ForecastRequest};

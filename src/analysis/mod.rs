pub mod accuracy;
pub mod matching;
pub mod recommendations;

pub use accuracy::AccuracyAnalyzer;
pub use matching::{resolve_actuals, resolve_slot, CatalogIndex};
pub use recommendations::RecommendationGenerator;

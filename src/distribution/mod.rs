pub mod implementations;
pub mod special;
pub mod traits;

pub use implementations::{DemandModel, NegativeBinomial, Poisson};
pub use traits::DemandDistribution;

// src/distribution/implementations.rs

use crate::distribution::special::{ln_factorial, ln_gamma};
use crate::distribution::traits::DemandDistribution;
use crate::model::forecast::DistributionType;
use serde::{Deserialize, Serialize};

// =========================================================================
// 1. Poisson
// =========================================================================

/// Equidispersed counts: variance equals the mean.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Poisson {
    lambda: f64,
}

impl Poisson {
    /// Negative or non-finite means collapse to zero demand.
    pub fn new(lambda: f64) -> Self {
        let lambda = if lambda.is_finite() { lambda.max(0.0) } else { 0.0 };
        Self { lambda }
    }

    pub fn lambda(&self) -> f64 {
        self.lambda
    }
}

impl DemandDistribution for Poisson {
    fn pmf(&self, k: u32) -> f64 {
        if self.lambda == 0.0 {
            return if k == 0 { 1.0 } else { 0.0 };
        }
        let ln_p = k as f64 * self.lambda.ln() - self.lambda - ln_factorial(k);
        ln_p.exp().clamp(0.0, 1.0)
    }

    fn mean(&self) -> f64 {
        self.lambda
    }

    fn variance(&self) -> f64 {
        self.lambda
    }
}

// =========================================================================
// 2. Negative Binomial
// =========================================================================

/// Overdispersed counts, parameterised as failures before the `r`-th success
/// with success probability `p`.
///
/// Mean `r(1-p)/p`, variance `mean / p`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NegativeBinomial {
    r: f64,
    p: f64,
}

impl NegativeBinomial {
    /// Method-of-moments fit. `None` unless `variance > mean > 0`.
    pub fn from_moments(mean: f64, variance: f64) -> Option<Self> {
        if !(mean > 0.0 && variance > mean && variance.is_finite()) {
            return None;
        }
        let p = mean / variance;
        let r = mean * mean / (variance - mean);
        Some(Self { r, p })
    }

    /// Same dispersion index (`variance / mean`), new mean.
    pub fn with_mean(&self, mean: f64) -> Option<Self> {
        if !(mean > 0.0 && mean.is_finite()) {
            return None;
        }
        let r = mean * self.p / (1.0 - self.p);
        Some(Self { r, p: self.p })
    }

    pub fn r(&self) -> f64 {
        self.r
    }

    pub fn p(&self) -> f64 {
        self.p
    }
}

impl DemandDistribution for NegativeBinomial {
    fn pmf(&self, k: u32) -> f64 {
        let kf = k as f64;
        let ln_p = ln_gamma(kf + self.r) - ln_gamma(self.r) - ln_factorial(k)
            + self.r * self.p.ln()
            + kf * (1.0 - self.p).ln();
        ln_p.exp().clamp(0.0, 1.0)
    }

    fn mean(&self) -> f64 {
        self.r * (1.0 - self.p) / self.p
    }

    fn variance(&self) -> f64 {
        self.mean() / self.p
    }
}

// =========================================================================
// 3. DemandModel (closed set)
// =========================================================================

/// The distribution chosen for an item. Selected once from the history and
/// handed to the optimizer without further branching on its type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum DemandModel {
    Poisson(Poisson),
    NegativeBinomial(NegativeBinomial),
}

impl DemandModel {
    /// Poisson unless `variance / mean` exceeds `overdispersion_ratio`.
    pub fn select(mean: f64, variance: f64, overdispersion_ratio: f64) -> Self {
        if mean > 0.0 && variance / mean > overdispersion_ratio {
            if let Some(nb) = NegativeBinomial::from_moments(mean, variance) {
                return DemandModel::NegativeBinomial(nb);
            }
        }
        DemandModel::Poisson(Poisson::new(mean))
    }

    /// Moves the model to a new mean, keeping its family and dispersion.
    pub fn rescaled(&self, lambda: f64) -> Self {
        match self {
            DemandModel::Poisson(_) => DemandModel::Poisson(Poisson::new(lambda)),
            DemandModel::NegativeBinomial(nb) => match nb.with_mean(lambda) {
                Some(scaled) => DemandModel::NegativeBinomial(scaled),
                None => DemandModel::Poisson(Poisson::new(lambda)),
            },
        }
    }

    pub fn distribution_type(&self) -> DistributionType {
        match self {
            DemandModel::Poisson(_) => DistributionType::Poisson,
            DemandModel::NegativeBinomial(_) => DistributionType::NegativeBinomial,
        }
    }

    fn inner(&self) -> &dyn DemandDistribution {
        match self {
            DemandModel::Poisson(d) => d,
            DemandModel::NegativeBinomial(d) => d,
        }
    }
}

impl DemandDistribution for DemandModel {
    fn pmf(&self, k: u32) -> f64 {
        self.inner().pmf(k)
    }

    fn mean(&self) -> f64 {
        self.inner().mean()
    }

    fn variance(&self) -> f64 {
        self.inner().variance()
    }
}

// src/distribution/traits.rs

use std::fmt::Debug;

/// Capability shared by the discrete demand distributions.
///
/// Implementors only supply `pmf` and the first two moments; `cdf` and
/// `quantile` are derived from the same running sum, so
/// `quantile(p)` is always the smallest `k` whose `cdf(k) >= p`.
pub trait DemandDistribution: Debug + Send + Sync {
    /// Probability that demand equals `k`. Always within `[0, 1]`.
    fn pmf(&self, k: u32) -> f64;

    fn mean(&self) -> f64;

    fn variance(&self) -> f64;

    /// Probability that demand is at most `k`.
    fn cdf(&self, k: u32) -> f64 {
        let mut acc = 0.0;
        for i in 0..=k {
            acc = (acc + self.pmf(i)).min(1.0);
        }
        acc
    }

    /// Smallest `k` with `cdf(k) >= p`, searched upward from zero.
    ///
    /// Gives up at `search_bound()` when rounding keeps the sum below `p`.
    fn quantile(&self, p: f64) -> u32 {
        let p = p.clamp(0.0, 1.0);
        let bound = self.search_bound();
        let mut acc = 0.0;
        for k in 0..=bound {
            acc = (acc + self.pmf(k)).min(1.0);
            if acc >= p {
                return k;
            }
        }
        bound
    }

    /// Upper limit of the quantile search, far into the right tail.
    fn search_bound(&self) -> u32 {
        let tail = self.mean() + 15.0 * self.variance().sqrt() + 50.0;
        tail.min(u32::MAX as f64 / 2.0).ceil() as u32
    }
}

// src/forecast/bias.rs

//! Self-correcting bias loop.
//!
//! Each item keeps an exponentially weighted estimate of `actual - mean`, where
//! the mean is the lambda the model produced before correction. The production
//! quantity is a quantile, not the mean, and never feeds the estimate. A share (`gain`) of the estimate is added to
//! future lambdas. The gain grows while errors keep the same sign and relaxes
//! toward its base otherwise.

use crate::config::BiasConfig;
use crate::error::Result;
use crate::model::accuracy::AccuracyComparison;
use crate::model::forecast::{Adjustment, AdjustmentSource};
use crate::model::records::ItemKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Running correction state for one item.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BiasState {
    /// Smoothed `actual - mean`, in units.
    pub estimate: f64,
    pub gain: f64,
    /// Signed length of the current same-sign error run.
    pub streak: i32,
    pub observations: u32,
}

#[derive(Debug, Clone)]
pub struct BiasCorrector {
    config: BiasConfig,
}

impl BiasCorrector {
    pub fn new(config: BiasConfig) -> Self {
        Self { config }
    }

    pub fn initial_state(&self) -> BiasState {
        BiasState {
            estimate: 0.0,
            gain: self.config.base_gain,
            streak: 0,
            observations: 0,
        }
    }

    /// Folds one observed error into `state` and returns the successor.
    pub fn update(&self, state: &BiasState, observed_error: f64) -> BiasState {
        let cfg = &self.config;
        let estimate = cfg.decay * state.estimate + (1.0 - cfg.decay) * observed_error;

        let sign = if observed_error > 0.0 {
            1
        } else if observed_error < 0.0 {
            -1
        } else {
            0
        };
        let streak = if sign == 0 {
            0
        } else if state.streak.signum() == sign {
            state.streak.saturating_add(sign)
        } else {
            sign
        };

        let gain = if streak.unsigned_abs() >= cfg.persistence_threshold {
            (state.gain * (1.0 + cfg.gain_growth_rate)).min(cfg.max_gain)
        } else {
            cfg.base_gain + (state.gain - cfg.base_gain) * cfg.gain_relaxation
        };

        BiasState {
            estimate,
            gain,
            streak,
            observations: state.observations.saturating_add(1),
        }
    }

    /// Offset to add to lambda for the item carrying `state`.
    pub fn lambda_adjustment(&self, state: &BiasState) -> f64 {
        state.gain * state.estimate
    }

    /// Applies the correction, flooring lambda at zero.
    pub fn correct(&self, lambda: f64, state: Option<&BiasState>) -> (f64, Option<Adjustment>) {
        let Some(state) = state else {
            return (lambda, None);
        };
        let offset = self.lambda_adjustment(state);
        if offset == 0.0 || !offset.is_finite() {
            return (lambda, None);
        }
        let corrected = (lambda + offset).max(0.0);
        let applied = corrected - lambda;
        (
            corrected,
            Some(Adjustment::offset(AdjustmentSource::Bias, "bias correction", applied)),
        )
    }

    /// Feeds matched comparisons into `book` in date order and returns it.
    ///
    /// The error folded in is `actual_qty - forecast_mean`.
    pub fn absorb(&self, mut book: BiasBook, comparisons: &[AccuracyComparison]) -> BiasBook {
        let mut matched: Vec<&AccuracyComparison> =
            comparisons.iter().filter(|c| c.is_matched()).collect();
        matched.sort_by_key(|c| c.date);

        for c in matched {
            let key = ItemKey {
                product_id: c.product_id.clone(),
                variant_id: c.variant_id.clone(),
                market_id: c.market_id.clone(),
            };
            let current = book.get(&key).copied().unwrap_or_else(|| self.initial_state());
            let error = c.actual_qty as f64 - c.forecast_mean;
            let next = self.update(&current, error);
            debug!(item = %key, error, estimate = next.estimate, gain = next.gain, "bias updated");
            book.insert(key, next);
        }
        book
    }
}

/// Serialised form of one `BiasBook` row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiasEntry {
    pub key: ItemKey,
    pub state: BiasState,
}

/// Per-item bias states. Loaded and stored by the caller between runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<BiasEntry>", into = "Vec<BiasEntry>")]
pub struct BiasBook {
    states: BTreeMap<ItemKey, BiasState>,
}

impl BiasBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &ItemKey) -> Option<&BiasState> {
        self.states.get(key)
    }

    pub fn insert(&mut self, key: ItemKey, state: BiasState) {
        self.states.insert(key, state);
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ItemKey, &BiasState)> {
        self.states.iter()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

impl From<Vec<BiasEntry>> for BiasBook {
    fn from(entries: Vec<BiasEntry>) -> Self {
        Self {
            states: entries.into_iter().map(|e| (e.key, e.state)).collect(),
        }
    }
}

impl From<BiasBook> for Vec<BiasEntry> {
    fn from(book: BiasBook) -> Self {
        book.states
            .into_iter()
            .map(|(key, state)| BiasEntry { key, state })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::accuracy::MatchTier;
    use chrono::NaiveDate;

    fn corrector() -> BiasCorrector {
        BiasCorrector::new(BiasConfig::default())
    }

    #[test]
    fn test_constant_bias_converges() {
        let c = corrector();
        let mut state = c.initial_state();
        for _ in 0..25 {
            state = c.update(&state, 4.0);
        }
        assert!((state.estimate - 4.0).abs() < 0.01);
        assert_eq!(state.gain, 1.0);
        assert!((c.lambda_adjustment(&state) - 4.0).abs() < 0.05);
    }

    #[test]
    fn test_gain_grows_only_after_persistence() {
        let c = corrector();
        let s1 = c.update(&c.initial_state(), -2.0);
        let s2 = c.update(&s1, -2.0);
        assert_eq!(s2.gain, 0.5);
        assert_eq!(s2.streak, -2);
        let s3 = c.update(&s2, -2.0);
        assert!((s3.gain - 0.625).abs() < 1e-12);
        assert!(s3.estimate < 0.0);
    }

    #[test]
    fn test_sign_flip_relaxes_gain() {
        let c = corrector();
        let mut state = c.initial_state();
        for _ in 0..6 {
            state = c.update(&state, 3.0);
        }
        let grown = state.gain;
        assert!(grown > 0.5);
        let flipped = c.update(&state, -3.0);
        assert_eq!(flipped.streak, -1);
        assert!((flipped.gain - (0.5 + (grown - 0.5) * 0.5)).abs() < 1e-12);
    }

    #[test]
    fn test_alternating_errors_stay_small() {
        let c = corrector();
        let mut state = c.initial_state();
        for i in 0..40 {
            let err = if i % 2 == 0 { 5.0 } else { -5.0 };
            state = c.update(&state, err);
        }
        assert!(state.estimate.abs() < 2.0);
        assert!((state.gain - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_correct_floors_at_zero() {
        let c = corrector();
        let state = BiasState {
            estimate: -20.0,
            gain: 1.0,
            streak: -5,
            observations: 5,
        };
        let (lambda, adj) = c.correct(6.0, Some(&state));
        assert_eq!(lambda, 0.0);
        assert_eq!(adj.unwrap().magnitude, -6.0);
        assert_eq!(c.correct(6.0, None), (6.0, None));
    }

    #[test]
    fn test_absorb_and_json_round_trip() {
        let c = corrector();
        let comparison = |day: u32, diff: i64, tier: MatchTier| AccuracyComparison {
            date: NaiveDate::from_ymd_opt(2024, 6, day).unwrap(),
            product_id: "P1".into(),
            variant_id: None,
            market_id: "M1".into(),
            product_name: "Bread".into(),
            forecast_qty: 10,
            actual_qty: (10 + diff) as u32,
            diff,
            forecast_mean: 10.0,
            waste_cost: 0.0,
            stockout_revenue: 0.0,
            match_tier: tier,
        };
        let book = c.absorb(
            BiasBook::new(),
            &[
                comparison(3, 2, MatchTier::ProductId),
                comparison(1, 2, MatchTier::ProductId),
                comparison(2, 9, MatchTier::Unmatched),
            ],
        );

        let state = book.get(&ItemKey::new("P1", None, "M1")).unwrap();
        assert_eq!(state.observations, 2);
        assert_eq!(state.streak, 2);

        let restored = BiasBook::from_json(&book.to_json().unwrap()).unwrap();
        let back = restored.get(&ItemKey::new("P1", None, "M1")).unwrap();
        assert_eq!(restored.len(), 1);
        assert_eq!(back.streak, 2);
        assert!((back.estimate - state.estimate).abs() < 1e-9);
        assert!((back.gain - state.gain).abs() < 1e-9);
    }
}

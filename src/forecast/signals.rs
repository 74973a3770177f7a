// src/forecast/signals.rs

use crate::config::SignalConfig;
use crate::forecast::baseline::mean_and_variance;
use crate::model::forecast::MomentumTrend;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Momentum {
    pub trend: MomentumTrend,
    /// Recent mean over reference mean; 1.0 when undetermined.
    pub ratio: f64,
    /// Damped multiplier to apply to lambda.
    pub factor: f64,
}

impl Momentum {
    fn stable() -> Self {
        Self {
            trend: MomentumTrend::Stable,
            ratio: 1.0,
            factor: 1.0,
        }
    }
}

/// Compares the last `momentum_window` daily totals with everything before them.
pub fn detect_momentum(series: &[f64], config: &SignalConfig) -> Momentum {
    let window = config.momentum_window;
    if window == 0 || series.len() < window + config.min_reference_points.max(1) {
        return Momentum::stable();
    }

    let (older, recent) = series.split_at(series.len() - window);
    let (older_mean, _) = mean_and_variance(older);
    let (recent_mean, _) = mean_and_variance(recent);
    if older_mean <= 0.0 {
        return Momentum::stable();
    }

    let ratio = recent_mean / older_mean;
    let change = ratio - 1.0;
    let trend = if change > config.momentum_threshold {
        MomentumTrend::Rising
    } else if change < -config.momentum_threshold {
        MomentumTrend::Falling
    } else {
        return Momentum::stable();
    };

    let factor = (1.0 + config.momentum_damping * change)
        .clamp(config.min_momentum_factor, config.max_momentum_factor);

    Momentum {
        trend,
        ratio,
        factor,
    }
}

/// Sample standard deviation over mean; `None` for fewer than two points or a zero mean.
pub fn coefficient_of_variation(sample: &[f64]) -> Option<f64> {
    if sample.len() < 2 {
        return None;
    }
    let (mean, variance) = mean_and_variance(sample);
    if mean <= 0.0 {
        return None;
    }
    Some(variance.sqrt() / mean)
}

pub fn is_high_volatility(sample: &[f64], config: &SignalConfig) -> bool {
    coefficient_of_variation(sample)
        .map(|cv| cv > config.volatility_cv_threshold)
        .unwrap_or(false)
}

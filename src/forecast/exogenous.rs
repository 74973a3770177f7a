// src/forecast/exogenous.rs

use crate::model::context::{CalendarContext, WeatherSignal};
use crate::model::forecast::{Adjustment, AdjustmentSource};
use tracing::warn;

/// Baseline after weather and calendar multipliers.
#[derive(Debug, Clone, PartialEq)]
pub struct AdjustedDemand {
    pub weather_factor: f64,
    pub weather_adjusted: f64,
    pub calendar_factor: f64,
    pub lambda: f64,
    pub adjustments: Vec<Adjustment>,
}

/// Chains independent multiplicative factors onto the baseline.
/// No re-normalisation happens between steps.
#[derive(Debug, Clone)]
pub struct ExogenousAdjuster {
    payday_boost: f64,
}

impl ExogenousAdjuster {
    pub fn new(payday_boost: f64) -> Self {
        Self { payday_boost }
    }

    /// Neutral (1.0) when the signal is missing or carries an unusable factor.
    pub fn weather_factor(&self, weather: Option<&WeatherSignal>) -> f64 {
        match weather {
            Some(signal) if signal.factor.is_finite() && signal.factor >= 0.0 => signal.factor,
            Some(signal) => {
                warn!(factor = signal.factor, "ignoring malformed weather factor");
                1.0
            }
            None => 1.0,
        }
    }

    pub fn payday_factor(&self, calendar: &CalendarContext) -> f64 {
        if calendar.is_payday {
            self.payday_boost
        } else {
            1.0
        }
    }

    pub fn event_factor(&self, calendar: &CalendarContext) -> f64 {
        calendar
            .event
            .as_ref()
            .map(|e| e.demand_factor)
            .filter(|f| f.is_finite() && *f >= 0.0)
            .unwrap_or(1.0)
    }

    pub fn seasonality_factor(&self, calendar: &CalendarContext) -> f64 {
        let f = calendar.seasonality_factor;
        if f.is_finite() && f >= 0.0 {
            f
        } else {
            1.0
        }
    }

    pub fn apply(
        &self,
        baseline: f64,
        weather: Option<&WeatherSignal>,
        calendar: &CalendarContext,
    ) -> AdjustedDemand {
        let mut adjustments = Vec::new();

        let weather_factor = self.weather_factor(weather);
        if let Some(signal) = weather {
            if weather_factor != 1.0 {
                adjustments.push(Adjustment::multiplier(
                    AdjustmentSource::Weather,
                    format!("{:?}", signal.condition).to_lowercase(),
                    weather_factor,
                ));
            }
        }
        let weather_adjusted = baseline * weather_factor;

        let payday = self.payday_factor(calendar);
        if payday != 1.0 {
            adjustments.push(Adjustment::multiplier(AdjustmentSource::Payday, "payday", payday));
        }
        let event = self.event_factor(calendar);
        if event != 1.0 {
            let name = calendar.event.as_ref().map(|e| e.name.clone()).unwrap_or_default();
            adjustments.push(Adjustment::multiplier(AdjustmentSource::Event, name, event));
        }
        let season = self.seasonality_factor(calendar);
        if season != 1.0 {
            adjustments.push(Adjustment::multiplier(
                AdjustmentSource::Seasonality,
                "month",
                season,
            ));
        }

        let calendar_factor = payday * event * season;

        AdjustedDemand {
            weather_factor,
            weather_adjusted,
            calendar_factor,
            lambda: weather_adjusted * calendar_factor,
            adjustments,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WeatherFactors;
    use crate::model::context::{CalendarEvent, WeatherCondition};
    use chrono::NaiveDate;

    fn rain() -> WeatherSignal {
        WeatherSignal::from_condition(
            NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
            WeatherCondition::Rain,
            &WeatherFactors::default(),
        )
    }

    #[test]
    fn test_rain_scales_baseline() {
        let adj = ExogenousAdjuster::new(1.15).apply(10.4, Some(&rain()), &CalendarContext::neutral());
        assert!((adj.weather_adjusted - 7.28).abs() < 1e-9);
        assert!((adj.lambda - 7.28).abs() < 1e-9);
        assert_eq!(adj.adjustments.len(), 1);
        assert_eq!(adj.adjustments[0].label, "rain");
    }

    #[test]
    fn test_missing_weather_is_neutral() {
        let adj = ExogenousAdjuster::new(1.15).apply(10.0, None, &CalendarContext::neutral());
        assert_eq!(adj.weather_factor, 1.0);
        assert_eq!(adj.lambda, 10.0);
        assert!(adj.adjustments.is_empty());
    }

    #[test]
    fn test_calendar_factors_multiply() {
        let calendar = CalendarContext {
            is_payday: true,
            event: Some(CalendarEvent {
                name: "Festival".into(),
                demand_factor: 2.0,
            }),
            seasonality_factor: 0.5,
        };
        let adj = ExogenousAdjuster::new(1.2).apply(10.0, None, &calendar);
        assert!((adj.calendar_factor - 1.2).abs() < 1e-12);
        assert!((adj.lambda - 12.0).abs() < 1e-9);
        assert_eq!(adj.adjustments.len(), 3);
        let replayed = adj.adjustments.iter().fold(10.0, |v, a| a.apply(v));
        assert!((replayed - adj.lambda).abs() < 1e-9);
    }

    #[test]
    fn test_malformed_weather_factor_is_neutral() {
        let mut signal = rain();
        signal.factor = f64::NAN;
        assert_eq!(ExogenousAdjuster::new(1.15).weather_factor(Some(&signal)), 1.0);
    }
}

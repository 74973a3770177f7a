// src/io/sources.rs

//! Read-side collaborators the engine depends on, plus in-memory versions.

use crate::config::WeatherFactors;
use crate::error::Result;
use crate::model::context::{WeatherCondition, WeatherSignal};
use crate::model::records::{ItemKey, SalesRecord};
use chrono::NaiveDate;
use std::collections::HashMap;

/// Read access to recorded sales.
pub trait SalesRepository: Send + Sync {
    /// All records of one product/variant/market, any order.
    fn history(&self, key: &ItemKey) -> Vec<SalesRecord>;
}

/// Weather lookups. May fail; callers fall back to a neutral factor.
pub trait WeatherProvider: Send + Sync {
    fn weather_for(&self, market_id: &str, date: NaiveDate) -> Result<Option<WeatherSignal>>;
}

#[derive(Debug, Clone, Default)]
pub struct InMemorySalesRepository {
    records: Vec<SalesRecord>,
}

impl InMemorySalesRepository {
    pub fn new(records: Vec<SalesRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[SalesRecord] {
        &self.records
    }

    pub fn extend(&mut self, records: impl IntoIterator<Item = SalesRecord>) {
        self.records.extend(records);
    }
}

impl SalesRepository for InMemorySalesRepository {
    fn history(&self, key: &ItemKey) -> Vec<SalesRecord> {
        self.records
            .iter()
            .filter(|r| key.matches(r))
            .cloned()
            .collect()
    }
}

/// Conditions keyed by market and date, converted with the configured factors.
#[derive(Debug, Clone, Default)]
pub struct StaticWeatherProvider {
    conditions: HashMap<(String, NaiveDate), WeatherCondition>,
    factors: WeatherFactors,
}

impl StaticWeatherProvider {
    pub fn new(factors: WeatherFactors) -> Self {
        Self {
            conditions: HashMap::new(),
            factors,
        }
    }

    pub fn with_condition(mut self, market_id: &str, date: NaiveDate, condition: WeatherCondition) -> Self {
        self.conditions.insert((market_id.to_string(), date), condition);
        self
    }
}

impl WeatherProvider for StaticWeatherProvider {
    fn weather_for(&self, market_id: &str, date: NaiveDate) -> Result<Option<WeatherSignal>> {
        Ok(self
            .conditions
            .get(&(market_id.to_string(), date))
            .map(|c| WeatherSignal::from_condition(date, *c, &self.factors)))
    }
}

/// Provider for deployments without weather data.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoWeather;

impl WeatherProvider for NoWeather {
    fn weather_for(&self, _market_id: &str, _date: NaiveDate) -> Result<Option<WeatherSignal>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_filters_by_key() {
        let d = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let record = |product: &str, market: &str| SalesRecord {
            date: d,
            product_id: product.into(),
            variant_id: None,
            market_id: market.into(),
            quantity_sold: 1,
            price: 2.0,
            cost: 1.0,
        };
        let repo = InMemorySalesRepository::new(vec![
            record("P1", "M1"),
            record("P1", "M2"),
            record("P2", "M1"),
        ]);
        assert_eq!(repo.history(&ItemKey::new("P1", None, "M1")).len(), 1);
        assert!(repo.history(&ItemKey::new("P3", None, "M1")).is_empty());
    }

    #[test]
    fn test_static_weather_lookup() {
        let d = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let provider = StaticWeatherProvider::new(WeatherFactors::default())
            .with_condition("M1", d, WeatherCondition::Storm);
        let signal = provider.weather_for("M1", d).unwrap().unwrap();
        assert_eq!(signal.factor, 0.5);
        assert!(provider.weather_for("M2", d).unwrap().is_none());
        assert!(NoWeather.weather_for("M1", d).unwrap().is_none());
    }
}

// ==========================================
// ForecastEngine integration tests
// ==========================================
// Covers: end-to-end forecasts, no-data handling, invariants over
// generated histories, catalog batches with failing collaborators
// ==========================================

use chrono::{Duration, NaiveDate};
use demand_forecast_engine::distribution::{DemandDistribution, DemandModel};
use demand_forecast_engine::io::demand::{self, DemandProfile};
use demand_forecast_engine::io::sources::{
    InMemorySalesRepository, NoWeather, StaticWeatherProvider, WeatherProvider,
};
use demand_forecast_engine::model::context::{CalendarContext, WeatherCondition, WeatherSignal};
use demand_forecast_engine::model::forecast::{AdjustmentSource, MomentumTrend};
use demand_forecast_engine::{
    BiasBook, ConfidenceLevel, DistributionType, EngineConfig, ForecastEngine, ForecastError,
    ForecastRequest, ItemKey, Pricing, Product, SalesRecord,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// ==========================================
// Helpers
// ==========================================

fn target() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 12).unwrap()
}

fn key() -> ItemKey {
    ItemKey::new("BRD", None, "downtown")
}

fn request(history: Vec<SalesRecord>, pricing: Pricing) -> ForecastRequest {
    ForecastRequest {
        product_id: "BRD".into(),
        variant_id: None,
        market_id: "downtown".into(),
        product_name: "Sourdough".into(),
        target_date: target(),
        pricing,
        sales_history: history,
        weather: None,
        calendar: Some(CalendarContext::neutral()),
    }
}

fn consecutive(quantities: &[u32]) -> Vec<SalesRecord> {
    let start = target() - Duration::days(quantities.len() as i64);
    quantities
        .iter()
        .enumerate()
        .map(|(i, q)| SalesRecord {
            date: start + Duration::days(i as i64),
            product_id: "BRD".into(),
            variant_id: None,
            market_id: "downtown".into(),
            quantity_sold: *q,
            price: 50.0,
            cost: 30.0,
        })
        .collect()
}

struct BrokenWeather;

impl WeatherProvider for BrokenWeather {
    fn weather_for(&self, _market_id: &str, _date: NaiveDate) -> demand_forecast_engine::Result<Option<WeatherSignal>> {
        Err(ForecastError::Weather("upstream timeout".into()))
    }
}

// ==========================================
// Scenarios
// ==========================================

#[test]
fn test_rainy_day_production_plan() {
    let mut req = request(consecutive(&[10, 12, 9, 11, 10]), Pricing::new(50.0, 30.0));
    let config = EngineConfig::default();
    req.weather = Some(WeatherSignal::from_condition(target(), WeatherCondition::Rain, &config.weather));

    let out = ForecastEngine::new(config).forecast(&req, None).unwrap();

    assert!((out.baseline_forecast - 10.4).abs() < 1e-9);
    assert!((out.weather_adjusted_forecast - 7.28).abs() < 1e-9);
    assert!((out.service_level_target - 0.4).abs() < 1e-12);
    // Smallest k with Poisson(7.28) CDF >= 0.4 (CDF(5) = 0.266, CDF(6) = 0.409).
    assert_eq!(out.optimal_quantity, 6);
    assert_eq!(out.distribution_type, DistributionType::Poisson);
    assert_eq!(out.momentum_trend, MomentumTrend::Stable);
    assert!(!out.is_high_volatility);
    assert_eq!(out.confidence_level, ConfidenceLevel::Medium);
    assert!(out.prediction_interval.lower <= 6 && 6 <= out.prediction_interval.upper);
    assert_eq!(out.adjustments.len(), 1);
    assert_eq!(out.adjustments[0].source, AdjustmentSource::Weather);
}

#[test]
fn test_other_items_in_history_are_ignored() {
    let mut history = consecutive(&[10, 12, 9, 11, 10]);
    let mut noise = consecutive(&[500, 500, 500]);
    for r in &mut noise {
        r.market_id = "harbor".into();
    }
    history.extend(noise);

    let out = ForecastEngine::new(EngineConfig::default())
        .forecast(&request(history, Pricing::new(50.0, 30.0)), None)
        .unwrap();
    assert!((out.baseline_forecast - 10.4).abs() < 1e-9);
    assert_eq!(out.data_points, 5);
}

#[test]
fn test_no_data_invariants() {
    let out = ForecastEngine::new(EngineConfig::default())
        .forecast(&request(Vec::new(), Pricing::new(5.0, 2.0)), None)
        .unwrap();
    assert!(out.no_data);
    assert_eq!(out.data_points, 0);
    assert_eq!(out.confidence_level, ConfidenceLevel::None);
    assert_eq!(out.optimal_quantity, 0);
    assert_eq!(out.stockout_probability, 0.0);
}

#[test]
fn test_corrupt_quantity_is_rejected_not_searched() {
    let out = ForecastEngine::new(EngineConfig::default())
        .forecast(&request(consecutive(&[10, 10, 10, 10, u32::MAX]), Pricing::new(50.0, 30.0)), None);
    assert!(matches!(out, Err(ForecastError::InvalidParameter(_))));
}

#[test]
fn test_try_new_validates_config_built_in_code() {
    let mut config = EngineConfig::default();
    config.optimizer.interval = (0.95, 0.05);
    assert!(matches!(ForecastEngine::try_new(config), Err(ForecastError::Config(_))));
}

#[test]
fn test_overdispersed_history_selects_negative_binomial() {
    let out = ForecastEngine::new(EngineConfig::default())
        .forecast(
            &request(consecutive(&[2, 15, 4, 20, 3, 18, 6, 1, 14, 9]), Pricing::new(10.0, 4.0)),
            None,
        )
        .unwrap();
    assert_eq!(out.distribution_type, DistributionType::NegativeBinomial);
    assert!(out.is_high_volatility);
}

#[test]
fn test_rising_history_flags_momentum() {
    let mut quantities = vec![10u32; 21];
    quantities.extend(vec![16u32; 7]);
    let out = ForecastEngine::new(EngineConfig::default())
        .forecast(&request(consecutive(&quantities), Pricing::new(10.0, 4.0)), None)
        .unwrap();
    assert_eq!(out.momentum_trend, MomentumTrend::Rising);
    assert!(out.lambda > out.weather_adjusted_forecast);
    assert!(out.adjustments.iter().any(|a| a.source == AdjustmentSource::Momentum));

    let replayed = out
        .adjustments
        .iter()
        .fold(out.baseline_forecast, |value, adj| adj.apply(value));
    assert!((replayed - out.lambda).abs() < 1e-9);
}

#[test]
fn test_invariants_over_generated_histories() {
    let engine = ForecastEngine::new(EngineConfig::default());
    let mut rng = StdRng::seed_from_u64(11);
    let mut negative_binomial_seen = false;

    for round in 0..60 {
        let mean = rng.gen_range(0.0..40.0);
        let dispersion = if round % 2 == 0 { 1.0 } else { rng.gen_range(1.5..4.0) };
        let days = rng.gen_range(0..70);
        let cost = rng.gen_range(0.5..20.0);
        let price = cost + rng.gen_range(0.5..20.0);
        let profile = DemandProfile::retail(mean).with_dispersion(dispersion);
        let history = demand::generate_history(
            &mut rng,
            &key(),
            Pricing::new(price, cost),
            target() - Duration::days(days as i64),
            days,
            &profile,
        )
        .unwrap();

        let mut req = request(history, Pricing::new(price, cost));
        req.calendar = None;
        let out = engine.forecast(&req, None).unwrap();

        assert_eq!(out.no_data, out.data_points == 0);
        assert_eq!(out.confidence_level == ConfidenceLevel::None, out.no_data);
        assert!((0.0..=1.0).contains(&out.stockout_probability));
        assert!((0.0..=1.0).contains(&out.waste_probability));
        if out.data_points > 0 {
            let pi = out.prediction_interval;
            assert!(pi.lower <= out.optimal_quantity && out.optimal_quantity <= pi.upper);

            let model = out.demand_model;
            assert_eq!(model.distribution_type(), out.distribution_type);
            assert!((model.mean() - out.lambda).abs() < 1e-6 * out.lambda.max(1.0));
            match model {
                DemandModel::Poisson(_) => {}
                DemandModel::NegativeBinomial(_) => {
                    negative_binomial_seen = true;
                    assert!(model.variance() > model.mean());
                }
            }

            let q = out.optimal_quantity;
            assert!(model.cdf(q) >= out.service_level_target);
            if q > 0 {
                assert!(model.cdf(q - 1) < out.service_level_target);
            }
        }
    }
    assert!(negative_binomial_seen);
}

#[test]
fn test_margin_increase_never_lowers_quantity() {
    let engine = ForecastEngine::new(EngineConfig::default());
    let history = consecutive(&[8, 14, 11, 9, 13, 12, 10, 15, 9, 11]);
    let mut last = 0;
    for price in [31.0, 35.0, 40.0, 60.0, 100.0, 300.0] {
        let out = engine
            .forecast(&request(history.clone(), Pricing::new(price, 30.0)), None)
            .unwrap();
        assert!(out.optimal_quantity >= last);
        last = out.optimal_quantity;
    }
}

#[test]
fn test_catalog_batch_survives_bad_items_and_weather() {
    demand_forecast_engine::logging::init_test();

    let catalog = vec![
        Product::new("BRD", "Sourdough", 6.0, 2.5),
        Product::new("BAD", "Loss Leader", 1.0, 3.0),
        Product::new("CKE", "Cheesecake", 30.0, 14.0).with_variant("CKE-S", "Slice", 5.0, 2.2),
    ];
    let markets = vec!["downtown".to_string()];
    let mut history = consecutive(&[10, 12, 9, 11, 10]);
    history.extend(consecutive(&[4, 5, 6]).into_iter().map(|mut r| {
        r.product_id = "CKE".into();
        r.variant_id = Some("CKE-S".into());
        r
    }));
    let repo = InMemorySalesRepository::new(history);
    let engine = ForecastEngine::new(EngineConfig::default());

    let results = engine.forecast_catalog(&catalog, &markets, target(), &repo, &BrokenWeather, &BiasBook::new());
    assert_eq!(results.len(), 3);

    let bread = results[0].output.as_ref().unwrap();
    assert_eq!(bread.weather_adjusted_forecast, bread.baseline_forecast);
    assert!(results[1].error.as_deref().unwrap().contains("BAD"));
    let slice = results[2].output.as_ref().unwrap();
    assert_eq!(slice.variant_id.as_deref(), Some("CKE-S"));
    assert_eq!(slice.product_name, "Cheesecake - Slice");
    assert_eq!(slice.unit_price, 5.0);
    assert!((slice.baseline_forecast - 5.0).abs() < 1e-12);
}

#[test]
fn test_catalog_batch_uses_weather_per_market() {
    let catalog = vec![Product::new("BRD", "Sourdough", 6.0, 2.5)];
    let markets = vec!["downtown".to_string(), "harbor".to_string()];
    let mut history = consecutive(&[10, 10, 10, 10]);
    history.extend(consecutive(&[10, 10, 10, 10]).into_iter().map(|mut r| {
        r.market_id = "harbor".into();
        r
    }));
    let repo = InMemorySalesRepository::new(history);
    let config = EngineConfig::default();
    let weather = StaticWeatherProvider::new(config.weather.clone())
        .with_condition("harbor", target(), WeatherCondition::Storm);
    let engine = ForecastEngine::new(config);

    let results = engine.forecast_catalog(&catalog, &markets, target(), &repo, &weather, &BiasBook::new());
    let downtown = results[0].output.as_ref().unwrap();
    let harbor = results[1].output.as_ref().unwrap();
    assert_eq!(downtown.weather_adjusted_forecast, 10.0);
    assert_eq!(harbor.weather_adjusted_forecast, 5.0);
    assert!(harbor.optimal_quantity < downtown.optimal_quantity);

    let calm = engine.forecast_catalog(&catalog, &markets, target(), &repo, &NoWeather, &BiasBook::new());
    assert_eq!(calm[1].output.as_ref().unwrap().weather_condition, None);
}

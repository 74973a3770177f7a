use chrono::{Duration, NaiveDate};
use demand_forecast_engine::io::demand::{self, DemandProfile};
use demand_forecast_engine::io::reporting;
use demand_forecast_engine::io::sources::{InMemorySalesRepository, StaticWeatherProvider};
use demand_forecast_engine::model::context::WeatherCondition;
use demand_forecast_engine::{
    logging, AccuracyAnalyzer, BiasBook, EngineConfig, ForecastEngine, ItemKey, Pricing, Product,
    SalesRecord,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::env;
use tracing::{error, info};

fn main() {
    logging::init();
    println!("=== Demand Forecast & Production Planner ===");

    // 1. SETUP CONFIGURATION
    // An optional JSON file overrides the calibrated defaults.
    let config = match env::args().nth(1) {
        Some(path) => match EngineConfig::from_path(&path) {
            Ok(config) => config,
            Err(e) => {
                error!(path = %path, error = %e, "invalid configuration");
                std::process::exit(1);
            }
        },
        None => EngineConfig::default(),
    };

    // 2. CATALOG & MARKETS
    let catalog = vec![
        Product::new("BRD", "Sourdough", 6.0, 2.5),
        Product::new("CRS", "Croissant", 3.5, 1.2),
        Product::new("CKE", "Cheesecake", 30.0, 14.0)
            .with_variant("CKE-S", "Slice", 5.0, 2.2)
            .with_variant("CKE-W", "Whole", 30.0, 14.0),
    ];
    let markets = vec!["downtown".to_string(), "harbor".to_string()];

    // 3. GENERATE HISTORY
    // Twelve weeks of synthetic sales; cheesecake is overdispersed and the
    // harbor croissant gets a few bulk-order spikes.
    let start = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap_or_default();
    let history_days = 84;
    let mut rng = StdRng::seed_from_u64(2024);
    let mut history: Vec<SalesRecord> = Vec::new();
    for market in &markets {
        for product in &catalog {
            let items: Vec<(Option<&str>, Pricing, DemandProfile)> = if product.variants.is_empty() {
                vec![(
                    None,
                    Pricing::new(product.price, product.cost),
                    DemandProfile::retail(if product.id == "BRD" { 24.0 } else { 40.0 }),
                )]
            } else {
                product
                    .variants
                    .iter()
                    .map(|v| {
                        let mean = if v.id == "CKE-S" { 18.0 } else { 3.0 };
                        (
                            Some(v.id.as_str()),
                            Pricing::new(v.price, v.cost),
                            DemandProfile::retail(mean).with_dispersion(2.5),
                        )
                    })
                    .collect()
            };

            for (variant, pricing, profile) in items {
                let key = ItemKey::new(&product.id, variant, market);
                match demand::generate_history(&mut rng, &key, pricing, start, history_days, &profile) {
                    Ok(mut records) => {
                        if product.id == "CRS" && market == "harbor" {
                            demand::inject_spikes(&mut rng, &mut records, 3, 4);
                        }
                        history.extend(records);
                    }
                    Err(e) => error!(item = %key, error = %e, "history generation failed"),
                }
            }
        }
    }
    println!("Generated {} sales records over {} days", history.len(), history_days);

    // 4. FORECAST TOMORROW
    let target = start + Duration::days(history_days as i64);
    let engine = match ForecastEngine::try_new(config.clone()) {
        Ok(engine) => engine,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };
    let repository = InMemorySalesRepository::new(history);
    let weather = StaticWeatherProvider::new(config.weather.clone())
        .with_condition("harbor", target, WeatherCondition::Rain);
    let mut book = BiasBook::new();

    let results = engine.forecast_catalog(&catalog, &markets, target, &repository, &weather, &book);
    println!("\n=== Production Plan for {} ===", target);
    for result in &results {
        match (&result.output, &result.error) {
            (Some(o), _) => println!(
                "{:<24} {:<9} make {:>3} (λ={:>6.2}, {:?}, interval {}-{}, stockout {:.0}%, confidence {:?})",
                o.product_name,
                o.market_id,
                o.optimal_quantity,
                o.lambda,
                o.distribution_type,
                o.prediction_interval.lower,
                o.prediction_interval.upper,
                o.stockout_probability * 100.0,
                o.confidence_level,
            ),
            (None, Some(e)) => println!("{}: failed: {}", result.key, e),
            (None, None) => {}
        }
    }

    // 5. REPLAY A WEEK OF ACTUALS & ANALYSE
    // Forecast each day of the next week, let the synthetic "reality" run a
    // little hotter than history, then score the plan.
    let analyzer = AccuracyAnalyzer::new(config.recommendations.clone());
    let mut repository = repository;
    let mut forecasts = Vec::new();
    let mut actuals = Vec::new();
    for offset in 0..7 {
        let day = target + Duration::days(offset);
        let plan = engine.forecast_catalog(&catalog, &markets, day, &repository, &weather, &book);
        forecasts.extend(plan.into_iter().filter_map(|r| r.output));

        for o in forecasts.iter().filter(|o| o.forecast_for_date == day) {
            let key = o.key();
            let profile = DemandProfile::flat(o.baseline_forecast * 1.2);
            if let Ok(records) = demand::generate_history(
                &mut rng,
                &key,
                Pricing::new(o.unit_price, o.unit_cost),
                day,
                1,
                &profile,
            ) {
                actuals.extend(records);
            }
        }
        let today: Vec<SalesRecord> = actuals.iter().filter(|s| s.date == day).cloned().collect();
        repository.extend(today);

        // Close the loop day by day so later forecasts see the corrected bias.
        let daily = analyzer.analyze(
            &forecasts.iter().filter(|o| o.forecast_for_date == day).cloned().collect::<Vec<_>>(),
            &actuals,
            &catalog,
        );
        book = engine.corrector().absorb(book, &daily.comparisons);
    }

    let analysis = analyzer.analyze(&forecasts, &actuals, &catalog);
    println!("\n=== Accuracy Analysis ===");
    println!(
        "Overall accuracy: {}  bias: {}",
        fmt_pct(analysis.summary.accuracy),
        fmt_pct(analysis.summary.bias)
    );
    println!(
        "Waste cost: ${:.2}  Lost margin: ${:.2}",
        analysis.summary.total_waste_cost, analysis.summary.total_stockout_revenue
    );
    for market in &analysis.by_market {
        println!("  {:<9} accuracy {}", market.market_id, fmt_pct(market.accuracy));
    }
    for p in analysis.worst_products(3) {
        println!("  weakest: {:<24} accuracy {}", p.product_name, fmt_pct(p.accuracy));
    }

    println!("\n=== Recommendations ===");
    if analysis.recommendations.is_empty() {
        println!("None: forecasts are within tolerance.");
    }
    for rec in &analysis.recommendations {
        println!("[{:?}] {:?} {}: {}", rec.priority, rec.kind, rec.target, rec.issue);
        println!("        -> {}", rec.suggestion);
    }

    // 6. EXPORT RESULTS
    if let Err(e) = reporting::write_forecasts("forecast_plan.csv", &results) {
        error!(error = %e, "writing forecast plan failed");
    }
    if let Err(e) = reporting::write_comparisons("accuracy_comparisons.csv", &analysis.comparisons) {
        error!(error = %e, "writing comparisons failed");
    }
    match book.to_json() {
        Ok(json) => {
            if let Err(e) = std::fs::write("bias_book.json", json) {
                error!(error = %e, "writing bias book failed");
            }
        }
        Err(e) => error!(error = %e, "serialising bias book failed"),
    }

    info!(items = book.len(), "bias states carried forward");
    println!("\nDone.");
}

fn fmt_pct(value: Option<f64>) -> String {
    value
        .map(|v| format!("{v:.1}%"))
        .unwrap_or_else(|| "n/a".to_string())
}

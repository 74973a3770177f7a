// src/forecast/engine.rs

use crate::config::EngineConfig;
use crate::distribution::{DemandModel, Poisson};
use crate::error::Result;
use crate::forecast::baseline::BaselineEstimator;
use crate::forecast::bias::{BiasBook, BiasCorrector, BiasState};
use crate::forecast::exogenous::ExogenousAdjuster;
use crate::forecast::optimization::{
    calculate_critical_fractile, validate_pricing, NewsvendorOptimizer,
};
use crate::forecast::signals::{detect_momentum, is_high_volatility};
use crate::io::sources::{SalesRepository, WeatherProvider};
use crate::model::context::{CalendarContext, WeatherSignal};
use crate::model::forecast::{
    Adjustment, AdjustmentSource, ConfidenceLevel, DistributionType, ForecastOutput,
    ForecastResult, MomentumTrend, PredictionInterval,
};
use crate::model::records::{ItemKey, Pricing, Product, SalesRecord};
use chrono::NaiveDate;
use tracing::{debug, info, instrument, warn};

/// Everything needed to forecast one item for one date.
#[derive(Debug, Clone)]
pub struct ForecastRequest {
    pub product_id: String,
    pub variant_id: Option<String>,
    pub market_id: String,
    pub product_name: String,
    pub target_date: NaiveDate,
    pub pricing: Pricing,
    /// May contain other items; only records matching this item are used.
    pub sales_history: Vec<SalesRecord>,
    pub weather: Option<WeatherSignal>,
    /// Derived from the date when absent.
    pub calendar: Option<CalendarContext>,
}

impl ForecastRequest {
    pub fn key(&self) -> ItemKey {
        ItemKey {
            product_id: self.product_id.clone(),
            variant_id: self.variant_id.clone(),
            market_id: self.market_id.clone(),
        }
    }
}

/// Runs baseline, adjustment, bias correction and newsvendor sizing in order.
#[derive(Debug, Clone)]
pub struct ForecastEngine {
    config: EngineConfig,
    estimator: BaselineEstimator,
    adjuster: ExogenousAdjuster,
    corrector: BiasCorrector,
    optimizer: NewsvendorOptimizer,
}

impl ForecastEngine {
    /// Validates `config` before building the engine.
    pub fn try_new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config))
    }

    /// Builds the engine without validation. Use for configs already checked
    /// by `EngineConfig::validate` or loaded through `EngineConfig::from_path`.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            estimator: BaselineEstimator::new(config.baseline.clone()),
            adjuster: ExogenousAdjuster::new(config.calendar.payday_boost),
            corrector: BiasCorrector::new(config.bias.clone()),
            optimizer: NewsvendorOptimizer::new(config.optimizer.clone()),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn corrector(&self) -> &BiasCorrector {
        &self.corrector
    }

    /// Forecasts one item. Missing history is not an error: the output comes
    /// back with `no_data` set and `ConfidenceLevel::None`.
    #[instrument(skip_all, fields(item = %request.key(), date = %request.target_date))]
    pub fn forecast(
        &self,
        request: &ForecastRequest,
        bias: Option<&BiasState>,
    ) -> Result<ForecastOutput> {
        let key = request.key();
        validate_pricing(&key.to_string(), request.pricing)?;

        let history: Vec<SalesRecord> = request
            .sales_history
            .iter()
            .filter(|r| key.matches(r))
            .cloned()
            .collect();
        let estimate = self.estimator.estimate(&history, request.target_date);
        if estimate.no_data {
            debug!("no usable history");
            return Ok(self.no_data_output(request));
        }

        let weather = request
            .weather
            .as_ref()
            .filter(|w| {
                let current = w.date == request.target_date;
                if !current {
                    warn!(signal_date = %w.date, "weather signal is for another date, ignoring");
                }
                current
            });
        let calendar = request
            .calendar
            .clone()
            .unwrap_or_else(|| CalendarContext::derive(request.target_date, &self.config.calendar));

        let adjusted = self.adjuster.apply(estimate.baseline, weather, &calendar);
        let mut adjustments = adjusted.adjustments;

        let momentum = detect_momentum(&estimate.series, &self.config.signals);
        let mut lambda = adjusted.lambda;
        if momentum.trend != MomentumTrend::Stable {
            lambda *= momentum.factor;
            adjustments.push(Adjustment::multiplier(
                AdjustmentSource::Momentum,
                format!("{:?}", momentum.trend).to_lowercase(),
                momentum.factor,
            ));
        }

        let (lambda, bias_adjustment) = self.corrector.correct(lambda, bias);
        adjustments.extend(bias_adjustment);

        let high_volatility = is_high_volatility(&estimate.sample, &self.config.signals);
        let model = estimate.model.rescaled(lambda);
        let plan = self
            .optimizer
            .optimize(&key.to_string(), &model, request.pricing, high_volatility)?;

        debug!(
            baseline = estimate.baseline,
            lambda,
            quantity = plan.optimal_quantity,
            distribution = ?model.distribution_type(),
            "forecast computed"
        );

        Ok(ForecastOutput {
            product_id: request.product_id.clone(),
            variant_id: request.variant_id.clone(),
            market_id: request.market_id.clone(),
            product_name: request.product_name.clone(),
            forecast_for_date: request.target_date,
            unit_price: request.pricing.price,
            unit_cost: request.pricing.cost,
            baseline_forecast: estimate.baseline,
            weather_adjusted_forecast: adjusted.weather_adjusted,
            weather_condition: weather.map(|w| w.condition),
            lambda,
            distribution_type: model.distribution_type(),
            demand_model: model,
            optimal_quantity: plan.optimal_quantity,
            service_level_target: plan.service_level_target,
            stockout_probability: plan.stockout_probability,
            waste_probability: plan.waste_probability,
            prediction_interval: plan.prediction_interval,
            expected_sales: plan.expected_sales,
            expected_leftover: plan.expected_leftover,
            expected_profit: plan.expected_profit,
            confidence_level: estimate.confidence,
            data_points: estimate.data_points,
            same_day_data_points: estimate.same_day_data_points,
            outliers_removed: estimate.outliers_removed,
            momentum_trend: momentum.trend,
            is_high_volatility: high_volatility,
            no_data: false,
            adjustments,
        })
    }

    fn no_data_output(&self, request: &ForecastRequest) -> ForecastOutput {
        ForecastOutput {
            product_id: request.product_id.clone(),
            variant_id: request.variant_id.clone(),
            market_id: request.market_id.clone(),
            product_name: request.product_name.clone(),
            forecast_for_date: request.target_date,
            unit_price: request.pricing.price,
            unit_cost: request.pricing.cost,
            baseline_forecast: 0.0,
            weather_adjusted_forecast: 0.0,
            weather_condition: None,
            lambda: 0.0,
            distribution_type: DistributionType::Poisson,
            demand_model: DemandModel::Poisson(Poisson::new(0.0)),
            optimal_quantity: 0,
            service_level_target: calculate_critical_fractile(
                request.pricing.margin(),
                request.pricing.cost,
            ),
            stockout_probability: 0.0,
            waste_probability: 0.0,
            prediction_interval: PredictionInterval { lower: 0, upper: 0 },
            expected_sales: 0.0,
            expected_leftover: 0.0,
            expected_profit: 0.0,
            confidence_level: ConfidenceLevel::None,
            data_points: 0,
            same_day_data_points: 0,
            outliers_removed: 0,
            momentum_trend: MomentumTrend::Stable,
            is_high_volatility: false,
            no_data: true,
            adjustments: Vec::new(),
        }
    }

    /// Forecasts every request; a failing item carries its error and the rest continue.
    #[instrument(skip_all, fields(count = requests.len()))]
    pub fn forecast_batch(&self, requests: &[ForecastRequest], book: &BiasBook) -> Vec<ForecastResult> {
        let results: Vec<ForecastResult> = requests
            .iter()
            .map(|request| {
                let key = request.key();
                match self.forecast(request, book.get(&key)) {
                    Ok(output) => ForecastResult {
                        key,
                        date: request.target_date,
                        output: Some(output),
                        error: None,
                    },
                    Err(e) => {
                        warn!(item = %key, error = %e, "forecast failed");
                        ForecastResult {
                            key,
                            date: request.target_date,
                            output: None,
                            error: Some(e.to_string()),
                        }
                    }
                }
            })
            .collect();

        let failed = results.iter().filter(|r| !r.is_ok()).count();
        let no_data = results
            .iter()
            .filter_map(|r| r.output.as_ref())
            .filter(|o| o.no_data)
            .count();
        info!(total = results.len(), failed, no_data, "forecast batch finished");
        results
    }

    /// Expands the catalog into sellable items per market and forecasts them.
    ///
    /// Products with variants are forecast per variant at the variant's price.
    /// A failing weather lookup degrades to the neutral factor.
    pub fn forecast_catalog(
        &self,
        catalog: &[Product],
        market_ids: &[String],
        target_date: NaiveDate,
        sales: &dyn SalesRepository,
        weather: &dyn WeatherProvider,
        book: &BiasBook,
    ) -> Vec<ForecastResult> {
        let mut requests = Vec::new();
        for market_id in market_ids {
            let signal = match weather.weather_for(market_id, target_date) {
                Ok(signal) => signal,
                Err(e) => {
                    warn!(market = %market_id, error = %e, "weather unavailable, using neutral factor");
                    None
                }
            };

            for product in catalog {
                for (variant_id, name, pricing) in sellable_items(product) {
                    let key = ItemKey {
                        product_id: product.id.clone(),
                        variant_id,
                        market_id: market_id.clone(),
                    };
                    requests.push(ForecastRequest {
                        sales_history: sales.history(&key),
                        product_id: key.product_id,
                        variant_id: key.variant_id,
                        market_id: key.market_id,
                        product_name: name,
                        target_date,
                        pricing,
                        weather: signal.clone(),
                        calendar: None,
                    });
                }
            }
        }
        self.forecast_batch(&requests, book)
    }
}

fn sellable_items(product: &Product) -> Vec<(Option<String>, String, Pricing)> {
    if product.variants.is_empty() {
        return vec![(
            None,
            product.name.clone(),
            Pricing::new(product.price, product.cost),
        )];
    }
    product
        .variants
        .iter()
        .map(|v| {
            (
                Some(v.id.clone()),
                format!("{} - {}", product.name, v.name),
                Pricing::new(v.price, v.cost),
            )
        })
        .collect()
}

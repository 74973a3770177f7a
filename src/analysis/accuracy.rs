// src/analysis/accuracy.rs

use crate::analysis::matching::{resolve_slot, CatalogIndex};
use crate::analysis::recommendations::RecommendationGenerator;
use crate::config::RecommendationConfig;
use crate::model::accuracy::{
    AccuracyAnalysisResult, AccuracyComparison, AccuracySummary, DailyAccuracy, MarketAccuracy,
    MatchTier, ProductAccuracy, WeekdayAccuracy,
};
use crate::model::forecast::ForecastOutput;
use crate::model::records::{Product, SalesRecord};
use chrono::{Datelike, NaiveDate, Weekday};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, instrument};

const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// `max(0, 1 - |F - A| / A)` as a percentage.
///
/// With nothing sold, any positive forecast scores 0 and an empty forecast is undefined.
pub fn accuracy_percent(forecast: u64, actual: u64) -> Option<f64> {
    if actual > 0 {
        let (f, a) = (forecast as f64, actual as f64);
        Some((1.0 - (f - a).abs() / a).max(0.0) * 100.0)
    } else if forecast > 0 {
        Some(0.0)
    } else {
        None
    }
}

/// Signed `(F - A) / A` as a percentage; positive means over-forecast.
pub fn bias_percent(forecast: u64, actual: u64) -> Option<f64> {
    if actual == 0 {
        return None;
    }
    Some((forecast as f64 - actual as f64) / actual as f64 * 100.0)
}

#[derive(Debug, Clone, Default)]
struct Totals {
    forecast: u64,
    actual: u64,
    waste: f64,
    stockout: f64,
    count: usize,
    over: usize,
    under: usize,
}

impl Totals {
    fn add(&mut self, c: &AccuracyComparison) {
        self.forecast += c.forecast_qty as u64;
        self.actual += c.actual_qty as u64;
        self.waste += c.waste_cost;
        self.stockout += c.stockout_revenue;
        self.count += 1;
        if c.diff < 0 {
            self.over += 1;
        } else if c.diff > 0 {
            self.under += 1;
        }
    }

    fn accuracy(&self) -> Option<f64> {
        accuracy_percent(self.forecast, self.actual)
    }

    fn bias(&self) -> Option<f64> {
        bias_percent(self.forecast, self.actual)
    }
}

/// Scores stored forecasts against realised sales.
#[derive(Debug, Clone)]
pub struct AccuracyAnalyzer {
    recommendations: RecommendationGenerator,
}

impl AccuracyAnalyzer {
    pub fn new(config: RecommendationConfig) -> Self {
        Self {
            recommendations: RecommendationGenerator::new(config),
        }
    }

    /// Builds comparisons, aggregates and recommendations.
    ///
    /// `no_data` forecasts are skipped. Unmatched forecasts stay in
    /// `comparisons` with an actual of zero but are left out of every aggregate.
    #[instrument(skip_all, fields(forecasts = forecasts.len(), sales = sales.len()))]
    pub fn analyze(
        &self,
        forecasts: &[ForecastOutput],
        sales: &[SalesRecord],
        catalog: &[Product],
    ) -> AccuracyAnalysisResult {
        let index = CatalogIndex::new(catalog);
        let mut slots: HashMap<(NaiveDate, &str), Vec<&SalesRecord>> = HashMap::new();
        for s in sales {
            slots.entry((s.date, s.market_id.as_str())).or_default().push(s);
        }

        let mut forecast_slots: BTreeMap<(NaiveDate, &str), Vec<&ForecastOutput>> = BTreeMap::new();
        for f in forecasts.iter().filter(|f| !f.no_data) {
            forecast_slots
                .entry((f.forecast_for_date, f.market_id.as_str()))
                .or_default()
                .push(f);
        }

        let mut comparisons: Vec<AccuracyComparison> = Vec::new();
        for (slot, slot_forecasts) in &forecast_slots {
            let candidates = slots.get(slot).map(Vec::as_slice).unwrap_or(&[]);
            let resolved = resolve_slot(slot_forecasts, candidates, &index);
            for (f, matched) in slot_forecasts.iter().zip(resolved) {
                comparisons.push(compare(f, matched.quantity(), matched.tier, &index));
            }
        }
        comparisons.sort_by(|a, b| {
            (a.date, &a.market_id, &a.product_id, &a.variant_id)
                .cmp(&(b.date, &b.market_id, &b.product_id, &b.variant_id))
        });

        let matched: Vec<&AccuracyComparison> =
            comparisons.iter().filter(|c| c.is_matched()).collect();
        let unmatched = comparisons.len() - matched.len();
        if unmatched > 0 {
            debug!(unmatched, "forecasts without actual sales");
        }

        let daily = daily_accuracy(&matched);
        let by_weekday = weekday_accuracy(&daily);
        let by_product = product_accuracy(&matched);
        let by_market = market_accuracy(&matched);
        let summary = summarize(&matched, &daily, unmatched);

        let mut result = AccuracyAnalysisResult {
            summary,
            daily,
            by_weekday,
            by_product,
            by_market,
            recommendations: Vec::new(),
            comparisons,
        };
        result.recommendations = self.recommendations.generate(&result);

        info!(
            matched = result.summary.matched_comparisons,
            unmatched,
            accuracy = ?result.summary.accuracy,
            recommendations = result.recommendations.len(),
            "accuracy analysis finished"
        );
        result
    }
}

fn compare(
    forecast: &ForecastOutput,
    actual_qty: u32,
    tier: MatchTier,
    index: &CatalogIndex<'_>,
) -> AccuracyComparison {
    let (unit_cost, margin) = unit_economics(forecast, index);
    let forecast_qty = forecast.optimal_quantity;
    let diff = actual_qty as i64 - forecast_qty as i64;

    AccuracyComparison {
        date: forecast.forecast_for_date,
        product_id: forecast.product_id.clone(),
        variant_id: forecast.variant_id.clone(),
        market_id: forecast.market_id.clone(),
        product_name: forecast.product_name.clone(),
        forecast_qty,
        actual_qty,
        diff,
        forecast_mean: forecast.uncorrected_lambda(),
        waste_cost: (-diff).max(0) as f64 * unit_cost,
        stockout_revenue: diff.max(0) as f64 * margin,
        match_tier: tier,
    }
}

/// Cost and margin recorded on the forecast, falling back to the catalog.
fn unit_economics(forecast: &ForecastOutput, index: &CatalogIndex<'_>) -> (f64, f64) {
    let usable = |v: f64| v.is_finite() && v >= 0.0;
    if usable(forecast.unit_cost) && usable(forecast.unit_price) {
        return (forecast.unit_cost, forecast.margin().max(0.0));
    }
    let Some(product) = index.product(&forecast.product_id) else {
        return (0.0, 0.0);
    };
    let (price, cost) = forecast
        .variant_id
        .as_deref()
        .and_then(|v| product.variant(v))
        .map(|v| (v.price, v.cost))
        .unwrap_or((product.price, product.cost));
    (cost.max(0.0), (price - cost).max(0.0))
}

fn daily_accuracy(matched: &[&AccuracyComparison]) -> Vec<DailyAccuracy> {
    let mut days: BTreeMap<NaiveDate, Totals> = BTreeMap::new();
    for c in matched {
        days.entry(c.date).or_default().add(c);
    }
    days.into_iter()
        .map(|(date, t)| DailyAccuracy {
            date,
            weekday: date.weekday(),
            total_forecast: t.forecast,
            total_actual: t.actual,
            accuracy: t.accuracy(),
            bias: t.bias(),
            waste_cost: t.waste,
            stockout_revenue: t.stockout,
            sample_size: t.count,
        })
        .collect()
}

fn weekday_accuracy(daily: &[DailyAccuracy]) -> Vec<WeekdayAccuracy> {
    WEEK.iter()
        .map(|weekday| {
            let days: Vec<&DailyAccuracy> = daily.iter().filter(|d| d.weekday == *weekday).collect();
            let accuracies: Vec<f64> = days.iter().filter_map(|d| d.accuracy).collect();
            let biases: Vec<f64> = days.iter().filter_map(|d| d.bias).collect();
            WeekdayAccuracy {
                weekday: *weekday,
                accuracy: mean(&accuracies),
                bias: mean(&biases),
                sample_size: accuracies.len(),
            }
        })
        .collect()
}

fn product_accuracy(matched: &[&AccuracyComparison]) -> Vec<ProductAccuracy> {
    let mut groups: BTreeMap<(String, Option<String>), (String, Totals)> = BTreeMap::new();
    for c in matched {
        let entry = groups
            .entry((c.product_id.clone(), c.variant_id.clone()))
            .or_insert_with(|| (c.product_name.clone(), Totals::default()));
        entry.1.add(c);
    }

    let mut products: Vec<ProductAccuracy> = groups
        .into_iter()
        .map(|((product_id, variant_id), (product_name, t))| ProductAccuracy {
            product_id,
            variant_id,
            product_name,
            total_forecast: t.forecast,
            total_actual: t.actual,
            accuracy: t.accuracy(),
            bias: t.bias(),
            over_count: t.over,
            under_count: t.under,
            waste_cost: t.waste,
            stockout_revenue: t.stockout,
            sample_size: t.count,
        })
        .collect();

    // Best first, undefined accuracy last; ties keep id order.
    products.sort_by(|a, b| match (a.accuracy, b.accuracy) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    products
}

fn market_accuracy(matched: &[&AccuracyComparison]) -> Vec<MarketAccuracy> {
    let mut groups: BTreeMap<String, Totals> = BTreeMap::new();
    for c in matched {
        groups.entry(c.market_id.clone()).or_default().add(c);
    }
    groups
        .into_iter()
        .map(|(market_id, t)| MarketAccuracy {
            market_id,
            total_forecast: t.forecast,
            total_actual: t.actual,
            accuracy: t.accuracy(),
            bias: t.bias(),
            waste_cost: t.waste,
            stockout_revenue: t.stockout,
            sample_size: t.count,
        })
        .collect()
}

fn summarize(
    matched: &[&AccuracyComparison],
    daily: &[DailyAccuracy],
    unmatched: usize,
) -> AccuracySummary {
    let mut totals = Totals::default();
    for c in matched {
        totals.add(c);
    }
    AccuracySummary {
        total_forecast: totals.forecast,
        total_actual: totals.actual,
        accuracy: totals.accuracy(),
        bias: totals.bias(),
        total_waste_cost: totals.waste,
        total_stockout_revenue: totals.stockout,
        days_analyzed: daily.iter().filter(|d| d.sample_size > 0).count(),
        matched_comparisons: totals.count,
        unmatched_forecasts: unmatched,
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

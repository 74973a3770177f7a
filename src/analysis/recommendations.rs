// src/analysis/recommendations.rs

use crate::config::RecommendationConfig;
use crate::model::accuracy::{AccuracyAnalysisResult, Priority, Recommendation, RecommendationKind};
use chrono::Weekday;

/// Rule pass over analysis aggregates. Pure: same input, same output.
#[derive(Debug, Clone)]
pub struct RecommendationGenerator {
    config: RecommendationConfig,
}

impl RecommendationGenerator {
    pub fn new(config: RecommendationConfig) -> Self {
        Self { config }
    }

    /// High priority first, then by how far past its threshold each finding is.
    pub fn generate(&self, analysis: &AccuracyAnalysisResult) -> Vec<Recommendation> {
        let mut found: Vec<(f64, Recommendation)> = Vec::new();
        found.extend(self.market_rules(analysis));
        found.extend(self.product_rules(analysis));
        found.extend(self.day_rules(analysis));

        found.sort_by(|(sa, a), (sb, b)| a.priority.cmp(&b.priority).then(sb.total_cmp(sa)));
        found.into_iter().map(|(_, r)| r).collect()
    }

    fn market_rules(&self, analysis: &AccuracyAnalysisResult) -> Vec<(f64, Recommendation)> {
        let cfg = &self.config;
        analysis
            .by_market
            .iter()
            .filter(|m| m.sample_size >= cfg.min_market_samples)
            .filter_map(|m| {
                let accuracy = m.accuracy?;
                if accuracy >= cfg.market_accuracy_threshold {
                    return None;
                }
                let rec = Recommendation {
                    kind: RecommendationKind::Market,
                    priority: self.accuracy_priority(accuracy),
                    target: m.market_id.clone(),
                    issue: format!(
                        "Forecast accuracy in market {} is {:.0}%, below the {:.0}% target",
                        m.market_id, accuracy, cfg.market_accuracy_threshold
                    ),
                    suggestion: direction_hint(m.bias, "this market"),
                };
                Some((cfg.market_accuracy_threshold - accuracy, rec))
            })
            .collect()
    }

    fn product_rules(&self, analysis: &AccuracyAnalysisResult) -> Vec<(f64, Recommendation)> {
        let cfg = &self.config;
        analysis
            .by_product
            .iter()
            .filter(|p| p.sample_size >= cfg.min_product_samples)
            .filter_map(|p| {
                let bias = p.bias?;
                if bias.abs() <= cfg.product_bias_threshold {
                    return None;
                }
                let over = bias > 0.0;
                let consistent = if over { p.over_count } else { p.under_count };
                if (consistent as f64) < cfg.direction_consistency * p.sample_size as f64 {
                    return None;
                }

                let (direction, action) = if over {
                    ("over-forecast", "Reduce")
                } else {
                    ("under-forecast", "Increase")
                };
                let priority = if bias.abs() > cfg.high_priority_bias {
                    Priority::High
                } else {
                    Priority::Normal
                };
                let rec = Recommendation {
                    kind: RecommendationKind::Product,
                    priority,
                    target: p.product_name.clone(),
                    issue: format!(
                        "{} is consistently {} by {:.0}% ({} of {} days)",
                        p.product_name,
                        direction,
                        bias.abs(),
                        consistent,
                        p.sample_size
                    ),
                    suggestion: format!(
                        "{} production of {} by about {:.0}%",
                        action,
                        p.product_name,
                        bias.abs() / (1.0 + bias / 100.0).max(0.01)
                    ),
                };
                Some((bias.abs() - cfg.product_bias_threshold, rec))
            })
            .collect()
    }

    fn day_rules(&self, analysis: &AccuracyAnalysisResult) -> Vec<(f64, Recommendation)> {
        let cfg = &self.config;
        analysis
            .by_weekday
            .iter()
            .filter(|d| d.sample_size >= cfg.min_weekday_samples)
            .filter_map(|d| {
                let accuracy = d.accuracy?;
                if accuracy >= cfg.weekday_accuracy_threshold {
                    return None;
                }
                let name = weekday_name(d.weekday);
                let rec = Recommendation {
                    kind: RecommendationKind::Day,
                    priority: self.accuracy_priority(accuracy),
                    target: name.to_string(),
                    issue: format!(
                        "{} forecasts average {:.0}% accuracy over {} weeks",
                        name, accuracy, d.sample_size
                    ),
                    suggestion: direction_hint(d.bias, &format!("{name}s")),
                };
                Some((cfg.weekday_accuracy_threshold - accuracy, rec))
            })
            .collect()
    }

    fn accuracy_priority(&self, accuracy: f64) -> Priority {
        if accuracy < self.config.high_priority_accuracy {
            Priority::High
        } else {
            Priority::Normal
        }
    }
}

fn direction_hint(bias: Option<f64>, scope: &str) -> String {
    match bias {
        Some(b) if b > 0.0 => format!(
            "Forecasts for {scope} run {b:.0}% high; lower production or check for lost demand drivers"
        ),
        Some(b) if b < 0.0 => format!(
            "Forecasts for {scope} run {:.0}% low; raise production and check for stockouts",
            b.abs()
        ),
        _ => format!("Review recent sales for {scope} for events the calendar does not capture"),
    }
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::accuracy::{
        AccuracySummary, MarketAccuracy, ProductAccuracy, WeekdayAccuracy,
    };

    fn empty() -> AccuracyAnalysisResult {
        AccuracyAnalysisResult {
            summary: AccuracySummary::default(),
            daily: Vec::new(),
            by_weekday: Vec::new(),
            by_product: Vec::new(),
            by_market: Vec::new(),
            recommendations: Vec::new(),
            comparisons: Vec::new(),
        }
    }

    fn market(id: &str, accuracy: f64, bias: f64) -> MarketAccuracy {
        MarketAccuracy {
            market_id: id.into(),
            total_forecast: 0,
            total_actual: 0,
            accuracy: Some(accuracy),
            bias: Some(bias),
            waste_cost: 0.0,
            stockout_revenue: 0.0,
            sample_size: 10,
        }
    }

    fn product(name: &str, bias: f64, over: usize, under: usize) -> ProductAccuracy {
        ProductAccuracy {
            product_id: name.to_lowercase(),
            variant_id: None,
            product_name: name.into(),
            total_forecast: 0,
            total_actual: 0,
            accuracy: Some(70.0),
            bias: Some(bias),
            over_count: over,
            under_count: under,
            waste_cost: 0.0,
            stockout_revenue: 0.0,
            sample_size: over + under,
        }
    }

    #[test]
    fn test_market_threshold_and_priority() {
        let mut analysis = empty();
        analysis.by_market = vec![
            market("north", 55.0, 20.0),
            market("south", 30.0, -35.0),
            market("east", 90.0, 1.0),
        ];
        let recs = RecommendationGenerator::new(RecommendationConfig::default()).generate(&analysis);
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].target, "south");
        assert_eq!(recs[0].priority, Priority::High);
        assert!(recs[0].suggestion.contains("low"));
        assert_eq!(recs[1].target, "north");
        assert_eq!(recs[1].priority, Priority::Normal);
    }

    #[test]
    fn test_product_needs_consistent_direction() {
        let mut analysis = empty();
        analysis.by_product = vec![
            product("Bread", 25.0, 9, 1),
            product("Cake", 25.0, 5, 5),
            product("Tea", -40.0, 0, 6),
        ];
        let recs = RecommendationGenerator::new(RecommendationConfig::default()).generate(&analysis);
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].target, "Tea");
        assert_eq!(recs[0].priority, Priority::High);
        assert!(recs[0].issue.contains("under-forecast"));
        assert!(recs[1].issue.contains("over-forecast"));
        assert!(recs.iter().all(|r| r.kind == RecommendationKind::Product));
    }

    #[test]
    fn test_weekday_rule() {
        let mut analysis = empty();
        analysis.by_weekday = vec![
            WeekdayAccuracy {
                weekday: Weekday::Sat,
                accuracy: Some(45.0),
                bias: Some(-30.0),
                sample_size: 4,
            },
            WeekdayAccuracy {
                weekday: Weekday::Sun,
                accuracy: Some(20.0),
                bias: None,
                sample_size: 1,
            },
        ];
        let recs = RecommendationGenerator::new(RecommendationConfig::default()).generate(&analysis);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].kind, RecommendationKind::Day);
        assert_eq!(recs[0].target, "Saturday");
        assert_eq!(recs[0].priority, Priority::Normal);
    }

    #[test]
    fn test_clean_analysis_has_no_recommendations() {
        let recs = RecommendationGenerator::new(RecommendationConfig::default()).generate(&empty());
        assert!(recs.is_empty());
    }
}

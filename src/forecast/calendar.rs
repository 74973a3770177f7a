// src/forecast/calendar.rs

use crate::config::CalendarConfig;
use crate::model::context::{CalendarContext, CalendarEvent};
use chrono::{Datelike, NaiveDate};

impl CalendarContext {
    /// Calendar effects for `date`. Pure function of the date and config.
    pub fn derive(date: NaiveDate, config: &CalendarConfig) -> Self {
        let event = config
            .events
            .iter()
            .find(|e| e.month == date.month() && e.day == date.day())
            .map(|e| CalendarEvent {
                name: e.name.clone(),
                demand_factor: e.demand_factor,
            });

        Self {
            is_payday: is_payday(date, config),
            event,
            seasonality_factor: config.monthly_seasonality[date.month0() as usize],
        }
    }
}

/// The payday window spans month end and the first days of the next month.
/// A start day past the end of a short month clamps to its last day.
pub fn is_payday(date: NaiveDate, config: &CalendarConfig) -> bool {
    let day = date.day();
    let start = config.payday_start_day.min(days_in_month(date));
    day >= start || day <= config.payday_end_day
}

fn days_in_month(date: NaiveDate) -> u32 {
    let (y, m) = (date.year(), date.month());
    let first_of_next = if m == 12 {
        NaiveDate::from_ymd_opt(y + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(y, m + 1, 1)
    };
    first_of_next
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
        .unwrap_or(28)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_payday_window() {
        let cfg = CalendarConfig::default();
        assert!(is_payday(date(2024, 5, 25), &cfg));
        assert!(is_payday(date(2024, 5, 31), &cfg));
        assert!(is_payday(date(2024, 6, 2), &cfg));
        assert!(!is_payday(date(2024, 6, 3), &cfg));
        assert!(!is_payday(date(2024, 6, 24), &cfg));
    }

    #[test]
    fn test_payday_clamps_to_short_month() {
        let cfg = CalendarConfig {
            payday_start_day: 30,
            payday_end_day: 0,
            ..CalendarConfig::default()
        };
        assert!(is_payday(date(2023, 2, 28), &cfg));
        assert!(!is_payday(date(2023, 2, 27), &cfg));
        assert!(!is_payday(date(2023, 3, 1), &cfg));
    }

    #[test]
    fn test_event_and_seasonality() {
        let cfg = CalendarConfig::default();
        let ctx = CalendarContext::derive(date(2024, 12, 31), &cfg);
        assert_eq!(ctx.event.as_ref().map(|e| e.name.as_str()), Some("New Year's Eve"));
        assert_eq!(ctx.seasonality_factor, 1.1);
        assert!(ctx.is_payday);

        let plain = CalendarContext::derive(date(2024, 6, 12), &cfg);
        assert_eq!(plain, CalendarContext::neutral());
    }
}

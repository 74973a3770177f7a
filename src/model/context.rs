// src/model/context.rs

use crate::config::WeatherFactors;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeatherCondition {
    Sunny,
    Cloudy,
    Rain,
    Storm,
    Wind,
    Cold,
}

/// Weather for a day, already resolved by an outside provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSignal {
    pub date: NaiveDate,
    pub condition: WeatherCondition,
    pub factor: f64,
}

impl WeatherSignal {
    pub fn from_condition(
        date: NaiveDate,
        condition: WeatherCondition,
        factors: &WeatherFactors,
    ) -> Self {
        Self {
            date,
            condition,
            factor: factors.factor(condition),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub name: String,
    pub demand_factor: f64,
}

/// Calendar effects for a target date. See `forecast::calendar` for the derivation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarContext {
    pub is_payday: bool,
    pub event: Option<CalendarEvent>,
    pub seasonality_factor: f64,
}

impl CalendarContext {
    /// No payday, no event, flat seasonality.
    pub fn neutral() -> Self {
        Self {
            is_payday: false,
            event: None,
            seasonality_factor: 1.0,
        }
    }
}

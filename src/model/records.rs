// src/model/records.rs

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One realised sale. Immutable historical fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesRecord {
    pub date: NaiveDate,
    pub product_id: String,
    #[serde(default)]
    pub variant_id: Option<String>,
    pub market_id: String,
    pub quantity_sold: u32,
    pub price: f64,
    pub cost: f64,
}

impl SalesRecord {
    pub fn key(&self) -> ItemKey {
        ItemKey {
            product_id: self.product_id.clone(),
            variant_id: self.variant_id.clone(),
            market_id: self.market_id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    pub id: String,
    pub name: String,
    pub price: f64,
    pub cost: f64,
}

/// Catalog entry. Variants, when present, carry their own pricing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub price: f64,
    pub cost: f64,
    #[serde(default)]
    pub variants: Vec<Variant>,
}

impl Product {
    pub fn new(id: &str, name: &str, price: f64, cost: f64) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            price,
            cost,
            variants: Vec::new(),
        }
    }

    pub fn with_variant(mut self, id: &str, name: &str, price: f64, cost: f64) -> Self {
        self.variants.push(Variant {
            id: id.to_string(),
            name: name.to_string(),
            price,
            cost,
        });
        self
    }

    pub fn variant(&self, variant_id: &str) -> Option<&Variant> {
        self.variants.iter().find(|v| v.id == variant_id)
    }
}

/// Unit economics of a sellable item.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pricing {
    pub price: f64,
    pub cost: f64,
}

impl Pricing {
    pub fn new(price: f64, cost: f64) -> Self {
        Self { price, cost }
    }

    pub fn margin(&self) -> f64 {
        self.price - self.cost
    }
}

/// Identity of a forecastable item: product, optional variant, market.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemKey {
    pub product_id: String,
    pub variant_id: Option<String>,
    pub market_id: String,
}

impl ItemKey {
    pub fn new(product_id: &str, variant_id: Option<&str>, market_id: &str) -> Self {
        Self {
            product_id: product_id.to_string(),
            variant_id: variant_id.map(str::to_string),
            market_id: market_id.to_string(),
        }
    }

    pub fn matches(&self, record: &SalesRecord) -> bool {
        self.product_id == record.product_id
            && self.variant_id == record.variant_id
            && self.market_id == record.market_id
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.variant_id {
            Some(v) => write!(f, "{}/{}@{}", self.product_id, v, self.market_id),
            None => write!(f, "{}@{}", self.product_id, self.market_id),
        }
    }
}

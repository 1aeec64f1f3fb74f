//! Pricing abstractions and core types

use crate::core::currency::CurrencyKind;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Raw price as reported by a data provider, in the instrument's native currency.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceResult {
    pub price: Decimal,
    pub currency: String,
    pub short_name: Option<String>,
    pub as_of: DateTime<Utc>,
}

#[async_trait]
pub trait PriceProvider: Send + Sync {
    async fn fetch_price(&self, symbol: &str) -> Result<PriceResult>;
}

/// A priced instrument, classified against the reporting currency.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub symbol: String,
    pub price: Decimal,
    pub currency: CurrencyKind,
    pub as_of: DateTime<Utc>,
}

impl Quote {
    /// A zero or negative price means the provider had nothing usable.
    pub fn is_available(&self) -> bool {
        self.price > Decimal::ZERO
    }
}

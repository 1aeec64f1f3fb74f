//! Core business logic abstractions

pub mod config;
pub mod currency;
pub mod error;
pub mod log;
pub mod market;
pub mod price;
pub mod valuation;

// Re-export main types for cleaner imports
pub use currency::{CurrencyKind, CurrencyRateProvider, ExchangeRate};
pub use price::{PriceProvider, PriceResult, Quote};
pub use valuation::{PortfolioSummary, ValuedPosition};

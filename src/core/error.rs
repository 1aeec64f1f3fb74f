//! Configuration validation errors.
//!
//! These are the only errors that abort a valuation run. Collaborator failures
//! never surface here; they degrade the summary instead.

use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Position #{index} has an empty symbol")]
    EmptySymbol { index: usize },

    #[error("Position {symbol} has a negative quantity: {quantity}")]
    NegativeQuantity { symbol: String, quantity: Decimal },

    #[error("Position {symbol} has a negative average cost: {avg_cost}")]
    NegativeAverageCost { symbol: String, avg_cost: Decimal },

    #[error("Position {symbol} has a non-positive average exchange rate: {rate}")]
    InvalidAverageExchangeRate { symbol: String, rate: Decimal },

    #[error("Fallback exchange rate must be positive, got {0}")]
    InvalidFallbackRate(Decimal),

    #[error("Domestic suffix table contains an empty suffix")]
    EmptySuffix,

    #[error("Currency code must not be empty: {0}")]
    EmptyCurrencyCode(&'static str),
}

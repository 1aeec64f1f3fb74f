//! Currency classification, exchange rates and normalization into the
//! reporting currency.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Source of exchange rates between two currency codes.
///
/// Implementations return a live rate stamped with the time the market quoted
/// it, not the time it was fetched.
#[async_trait]
pub trait CurrencyRateProvider: Send + Sync {
    async fn get_rate(&self, from: &str, to: &str) -> Result<ExchangeRate>;
}

/// Whether an instrument trades in the reporting currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CurrencyKind {
    Domestic,
    Foreign,
}

/// One row of the symbol classification table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuffixRule {
    pub suffix: String,
    pub currency: CurrencyKind,
}

impl SuffixRule {
    pub fn domestic(suffix: &str) -> Self {
        Self {
            suffix: suffix.to_string(),
            currency: CurrencyKind::Domestic,
        }
    }
}

/// Maps instrument symbols to a [`CurrencyKind`] by their listing suffix.
///
/// The first rule whose suffix ends the symbol wins; symbols matching no rule
/// are foreign. Matching is case-insensitive.
#[derive(Debug, Clone)]
pub struct CurrencyClassifier {
    rules: Vec<(String, CurrencyKind)>,
}

impl CurrencyClassifier {
    pub fn new(rules: &[SuffixRule]) -> Self {
        Self {
            rules: rules
                .iter()
                .map(|r| (r.suffix.to_uppercase(), r.currency))
                .collect(),
        }
    }

    pub fn classify(&self, symbol: &str) -> CurrencyKind {
        let symbol = symbol.to_uppercase();
        self.rules
            .iter()
            .find(|(suffix, _)| symbol.ends_with(suffix.as_str()))
            .map_or(CurrencyKind::Foreign, |(_, kind)| *kind)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RateSource {
    Live,
    Fallback,
}

/// Spot rate of one unit of the foreign currency in the reporting currency.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeRate {
    pub rate: Decimal,
    pub as_of: DateTime<Utc>,
    pub source: RateSource,
}

impl ExchangeRate {
    pub fn live(rate: Decimal, as_of: DateTime<Utc>) -> Self {
        Self {
            rate,
            as_of,
            source: RateSource::Live,
        }
    }

    pub fn fallback(rate: Decimal, as_of: DateTime<Utc>) -> Self {
        Self {
            rate,
            as_of,
            source: RateSource::Fallback,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.source == RateSource::Fallback
    }
}

/// An amount expressed in the reporting currency at two points in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Normalized {
    pub value_now: Decimal,
    pub value_at_acquisition: Decimal,
}

/// Converts `amount` from the instrument's native currency into the reporting
/// currency.
///
/// Domestic amounts are returned unchanged for both points in time. Foreign
/// amounts use `current_rate` for the present value and `historical_rate` for
/// the acquisition value. When `historical_rate` is `None` the position is
/// treated as acquired at today's rate, so it shows no currency gain or loss;
/// callers that need currency attribution must configure the historical rate.
///
/// Returns `None` if a converted amount does not fit in a `Decimal`.
pub fn normalize(
    amount: Decimal,
    currency: CurrencyKind,
    current_rate: Decimal,
    historical_rate: Option<Decimal>,
) -> Option<Normalized> {
    let (rate_now, rate_then) = effective_rates(currency, current_rate, historical_rate);
    Some(Normalized {
        value_now: amount.checked_mul(rate_now)?,
        value_at_acquisition: amount.checked_mul(rate_then)?,
    })
}

/// Exchange rates that apply to a position, as `(current, historical)`.
///
/// Both are exactly one for domestic positions.
pub fn effective_rates(
    currency: CurrencyKind,
    current_rate: Decimal,
    historical_rate: Option<Decimal>,
) -> (Decimal, Decimal) {
    match currency {
        CurrencyKind::Domestic => (Decimal::ONE, Decimal::ONE),
        CurrencyKind::Foreign => (current_rate, historical_rate.unwrap_or(current_rate)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_classifier_matches_domestic_suffixes() {
        let classifier =
            CurrencyClassifier::new(&[SuffixRule::domestic(".KS"), SuffixRule::domestic(".kq")]);
        assert_eq!(classifier.classify("005930.KS"), CurrencyKind::Domestic);
        assert_eq!(classifier.classify("035720.KQ"), CurrencyKind::Domestic);
        assert_eq!(classifier.classify("005930.ks"), CurrencyKind::Domestic);
        assert_eq!(classifier.classify("AAPL"), CurrencyKind::Foreign);
        assert_eq!(classifier.classify("KS.AAPL"), CurrencyKind::Foreign);
    }

    #[test]
    fn test_classifier_without_rules_is_all_foreign() {
        let classifier = CurrencyClassifier::new(&[]);
        assert_eq!(classifier.classify("005930.KS"), CurrencyKind::Foreign);
    }

    #[test]
    fn test_classifier_first_matching_rule_wins() {
        let classifier = CurrencyClassifier::new(&[
            SuffixRule {
                suffix: ".T".to_string(),
                currency: CurrencyKind::Foreign,
            },
            SuffixRule::domestic("T"),
        ]);
        assert_eq!(classifier.classify("7203.T"), CurrencyKind::Foreign);
        assert_eq!(classifier.classify("AT"), CurrencyKind::Domestic);
    }

    #[test]
    fn test_normalize_domestic_ignores_rates() {
        let n =
            normalize(dec!(75000), CurrencyKind::Domestic, dec!(1300), Some(dec!(1200))).unwrap();
        assert_eq!(n.value_now, dec!(75000));
        assert_eq!(n.value_at_acquisition, dec!(75000));
    }

    #[test]
    fn test_normalize_foreign_with_historical_rate() {
        let n = normalize(dec!(150), CurrencyKind::Foreign, dec!(1300), Some(dec!(1200))).unwrap();
        assert_eq!(n.value_now, dec!(195000));
        assert_eq!(n.value_at_acquisition, dec!(180000));
    }

    #[test]
    fn test_normalize_foreign_without_historical_rate_uses_current() {
        let n = normalize(dec!(150), CurrencyKind::Foreign, dec!(1300), None).unwrap();
        assert_eq!(n.value_now, n.value_at_acquisition);
        assert_eq!(n.value_now, dec!(195000));
    }

    #[test]
    fn test_normalize_overflow_is_none() {
        assert!(normalize(Decimal::MAX, CurrencyKind::Foreign, dec!(1300), None).is_none());
        let doubled = normalize(Decimal::MAX, CurrencyKind::Foreign, Decimal::ONE, Some(dec!(2)));
        assert!(doubled.is_none());
        let n = normalize(Decimal::MAX, CurrencyKind::Domestic, dec!(1300), None).unwrap();
        assert_eq!(n.value_now, Decimal::MAX);
    }

    #[test]
    fn test_effective_rates() {
        assert_eq!(
            effective_rates(CurrencyKind::Domestic, dec!(1375.5), None),
            (Decimal::ONE, Decimal::ONE)
        );
        assert_eq!(
            effective_rates(CurrencyKind::Foreign, dec!(1375.5), Some(dec!(1210))),
            (dec!(1375.5), dec!(1210))
        );
    }

    #[test]
    fn test_unknown_currency_kind_is_rejected() {
        let parsed: Result<CurrencyKind, _> = serde_yaml::from_str("offshore");
        assert!(parsed.is_err());
        let parsed: CurrencyKind = serde_yaml::from_str("domestic").unwrap();
        assert_eq!(parsed, CurrencyKind::Domestic);
    }
}

use crate::core::currency::{CurrencyClassifier, CurrencyKind, SuffixRule};
use crate::core::error::ConfigError;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tracing::debug;

/// A held position as written in the configuration file.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PositionConfig {
    pub symbol: String,
    #[serde(alias = "qty")]
    pub quantity: Decimal,
    #[serde(alias = "avg_price", default)]
    pub avg_cost: Decimal,
    #[serde(default)]
    pub avg_exchange_rate: Option<Decimal>,
}

/// A validated position with its currency resolved from the classification table.
#[derive(Debug, Clone, PartialEq)]
pub struct Holding {
    pub position: PositionConfig,
    pub currency: CurrencyKind,
}

impl Holding {
    pub fn symbol(&self) -> &str {
        &self.position.symbol
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CurrencyConfig {
    #[serde(default = "default_reporting_currency")]
    pub reporting: String,
    #[serde(default = "default_foreign_currency")]
    pub foreign: String,
    /// Used in place of the live rate when it cannot be fetched.
    #[serde(default = "default_fallback_rate")]
    pub fallback_rate: Decimal,
    #[serde(default = "default_classification")]
    pub classification: Vec<SuffixRule>,
}

fn default_reporting_currency() -> String {
    "KRW".to_string()
}

fn default_foreign_currency() -> String {
    "USD".to_string()
}

fn default_fallback_rate() -> Decimal {
    Decimal::from(1330)
}

fn default_classification() -> Vec<SuffixRule> {
    vec![SuffixRule::domestic(".KS"), SuffixRule::domestic(".KQ")]
}

impl Default for CurrencyConfig {
    fn default() -> Self {
        CurrencyConfig {
            reporting: default_reporting_currency(),
            foreign: default_foreign_currency(),
            fallback_rate: default_fallback_rate(),
            classification: default_classification(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct YahooProviderConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for YahooProviderConfig {
    fn default() -> Self {
        YahooProviderConfig {
            base_url: "https://query1.finance.yahoo.com".to_string(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub yahoo: Option<YahooProviderConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            yahoo: Some(YahooProviderConfig::default()),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct SourceConfig {
    /// Skip the quote source entirely and report the placeholder summary.
    #[serde(default)]
    pub mock: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub portfolio: Vec<PositionConfig>,
    #[serde(default)]
    pub currency: CurrencyConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub source: SourceConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("dev", "fxfolio", "fxfolio")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config = Self::from_yaml(&config_str)
            .with_context(|| format!("Invalid config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    /// Parses and validates a configuration document.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml).context("Failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.currency.reporting.trim().is_empty() {
            return Err(ConfigError::EmptyCurrencyCode("currency.reporting"));
        }
        if self.currency.foreign.trim().is_empty() {
            return Err(ConfigError::EmptyCurrencyCode("currency.foreign"));
        }
        if self.currency.fallback_rate <= Decimal::ZERO {
            return Err(ConfigError::InvalidFallbackRate(self.currency.fallback_rate));
        }
        if self
            .currency
            .classification
            .iter()
            .any(|rule| rule.suffix.trim().is_empty())
        {
            return Err(ConfigError::EmptySuffix);
        }

        for (index, position) in self.portfolio.iter().enumerate() {
            if position.symbol.trim().is_empty() {
                return Err(ConfigError::EmptySymbol { index });
            }
            if position.quantity < Decimal::ZERO {
                return Err(ConfigError::NegativeQuantity {
                    symbol: position.symbol.clone(),
                    quantity: position.quantity,
                });
            }
            if position.avg_cost < Decimal::ZERO {
                return Err(ConfigError::NegativeAverageCost {
                    symbol: position.symbol.clone(),
                    avg_cost: position.avg_cost,
                });
            }
            if let Some(rate) = position.avg_exchange_rate {
                if rate <= Decimal::ZERO {
                    return Err(ConfigError::InvalidAverageExchangeRate {
                        symbol: position.symbol.clone(),
                        rate,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn classifier(&self) -> CurrencyClassifier {
        CurrencyClassifier::new(&self.currency.classification)
    }

    /// Resolves every configured position against the classification table,
    /// preserving configuration order.
    pub fn holdings(&self) -> Vec<Holding> {
        let classifier = self.classifier();
        self.portfolio
            .iter()
            .map(|position| Holding {
                currency: classifier.classify(&position.symbol),
                position: position.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_config_deserialization() {
        let yaml_str = r#"
portfolio:
  - symbol: "AAPL"
    quantity: 10
    avg_cost: 150.25
    avg_exchange_rate: 1280.5
  - symbol: "005930.KS"
    qty: 20
    avg_price: 70000
  - symbol: "TSLA"
    quantity: 5
"#;

        let config = AppConfig::from_yaml(yaml_str).expect("Failed to deserialize");
        assert_eq!(config.portfolio.len(), 3);
        assert_eq!(config.portfolio[0].symbol, "AAPL");
        assert_eq!(config.portfolio[0].avg_cost, dec!(150.25));
        assert_eq!(config.portfolio[0].avg_exchange_rate, Some(dec!(1280.5)));
        assert_eq!(config.portfolio[1].quantity, dec!(20));
        assert_eq!(config.portfolio[1].avg_cost, dec!(70000));
        assert_eq!(config.portfolio[1].avg_exchange_rate, None);
        assert_eq!(config.portfolio[2].avg_cost, Decimal::ZERO);

        assert_eq!(config.currency.reporting, "KRW");
        assert_eq!(config.currency.foreign, "USD");
        assert_eq!(config.currency.fallback_rate, dec!(1330));
        assert_eq!(config.currency.classification.len(), 2);
        assert!(!config.source.mock);
        assert_eq!(
            config.providers.yahoo.unwrap().base_url,
            "https://query1.finance.yahoo.com"
        );
    }

    #[test]
    fn test_config_with_overrides() {
        let yaml_str = r#"
portfolio: []
currency:
  reporting: "JPY"
  foreign: "EUR"
  fallback_rate: 160
  classification:
    - suffix: ".T"
      currency: domestic
providers:
  yahoo:
    base_url: "http://example.com/yahoo"
    timeout_secs: 3
source:
  mock: true
"#;
        let config = AppConfig::from_yaml(yaml_str).unwrap();
        assert_eq!(config.currency.reporting, "JPY");
        assert_eq!(config.currency.fallback_rate, dec!(160));
        assert_eq!(config.classifier().classify("7203.T"), CurrencyKind::Domestic);
        assert_eq!(config.classifier().classify("005930.KS"), CurrencyKind::Foreign);
        let yahoo = config.providers.yahoo.unwrap();
        assert_eq!(yahoo.base_url, "http://example.com/yahoo");
        assert_eq!(yahoo.timeout_secs, 3);
        assert!(config.source.mock);
    }

    #[test]
    fn test_holdings_preserve_order_and_classification() {
        let yaml_str = r#"
portfolio:
  - symbol: "AAPL"
    quantity: 1
  - symbol: "005930.KS"
    quantity: 1
  - symbol: "035720.KQ"
    quantity: 1
"#;
        let holdings = AppConfig::from_yaml(yaml_str).unwrap().holdings();
        let resolved: Vec<(&str, CurrencyKind)> =
            holdings.iter().map(|h| (h.symbol(), h.currency)).collect();
        assert_eq!(
            resolved,
            vec![
                ("AAPL", CurrencyKind::Foreign),
                ("005930.KS", CurrencyKind::Domestic),
                ("035720.KQ", CurrencyKind::Domestic),
            ]
        );
    }

    #[test]
    fn test_empty_config_is_valid() {
        let config = AppConfig::from_yaml("{}").unwrap();
        assert!(config.portfolio.is_empty());
        assert!(config.holdings().is_empty());
    }

    fn validation_error(yaml: &str) -> ConfigError {
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        config.validate().unwrap_err()
    }

    #[test]
    fn test_rejects_negative_quantity() {
        let err = validation_error(
            r#"
portfolio:
  - symbol: "AAPL"
    quantity: -1
"#,
        );
        assert_eq!(
            err,
            ConfigError::NegativeQuantity {
                symbol: "AAPL".to_string(),
                quantity: dec!(-1),
            }
        );
    }

    #[test]
    fn test_rejects_empty_symbol() {
        let err = validation_error(
            r#"
portfolio:
  - symbol: "AAPL"
    quantity: 1
  - symbol: "  "
    quantity: 1
"#,
        );
        assert_eq!(err, ConfigError::EmptySymbol { index: 1 });
    }

    #[test]
    fn test_rejects_bad_rates_and_costs() {
        let err = validation_error(
            r#"
portfolio:
  - symbol: "AAPL"
    quantity: 1
    avg_cost: -5
"#,
        );
        assert!(matches!(err, ConfigError::NegativeAverageCost { .. }));

        let err = validation_error(
            r#"
portfolio:
  - symbol: "AAPL"
    quantity: 1
    avg_exchange_rate: 0
"#,
        );
        assert!(matches!(err, ConfigError::InvalidAverageExchangeRate { .. }));

        let err = validation_error("currency:\n  fallback_rate: 0\n");
        assert_eq!(err, ConfigError::InvalidFallbackRate(Decimal::ZERO));

        let err = validation_error(
            "currency:\n  classification:\n    - suffix: \"\"\n      currency: domestic\n",
        );
        assert_eq!(err, ConfigError::EmptySuffix);
    }

    #[test]
    fn test_rejects_unknown_currency_kind() {
        let yaml_str = r#"
currency:
  classification:
    - suffix: ".KS"
      currency: won
"#;
        assert!(AppConfig::from_yaml(yaml_str).is_err());
    }

    #[test]
    fn test_load_from_path_reports_validation_error() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            file.path(),
            "portfolio:\n  - symbol: \"AAPL\"\n    quantity: -3\n",
        )
        .unwrap();

        let err = AppConfig::load_from_path(file.path()).unwrap_err();
        let root = err.root_cause().to_string();
        assert_eq!(root, "Position AAPL has a negative quantity: -3");
    }
}

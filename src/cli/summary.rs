use super::ui;
use crate::core::config::{AppConfig, CurrencyConfig};
use crate::core::currency::{CurrencyKind, ExchangeRate, RateSource};
use crate::core::market;
use crate::core::valuation::{PortfolioSummary, ValuedPosition};
use crate::providers::yahoo_finance::{YahooCurrencyProvider, YahooFinanceProvider};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use comfy_table::Cell;
use rust_decimal::Decimal;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

impl PortfolioSummary {
    pub fn display_as_table(&self, currency: &CurrencyConfig) -> String {
        let reporting = &currency.reporting;
        let mut output = format!(
            "{}\n\n",
            ui::style_text("Portfolio Valuation", ui::StyleType::Title)
        );

        if self.is_mock() {
            output.push_str(&ui::style_text(
                "MOCK DATA: the quote source was unavailable, figures below are placeholders",
                ui::StyleType::Error,
            ));
            output.push_str("\n\n");
        }

        if !self.positions.is_empty() {
            let mut table = ui::new_styled_table();
            table.set_header(vec![
                ui::header_cell("Symbol"),
                ui::header_cell("Qty"),
                ui::header_cell("Price"),
                ui::header_cell("Avg Price"),
                ui::header_cell("FX (avg)"),
                ui::header_cell(&format!("Value ({reporting})")),
                ui::header_cell(&format!("Profit ({reporting})")),
                ui::header_cell("Return"),
            ]);

            for position in &self.positions {
                let native = native_code(position, currency);
                let price = ui::format_decimal(position.current_price);
                let avg_price = ui::format_decimal(position.avg_price);
                table.add_row(vec![
                    Cell::new(&position.symbol),
                    ui::number_cell(ui::format_decimal(position.quantity)),
                    ui::number_cell(format!("{price} {native}")),
                    ui::number_cell(format!("{avg_price} {native}")),
                    ui::number_cell(ui::format_decimal(position.exchange_rate_historical)),
                    ui::number_cell(ui::format_amount(position.eval_amount)),
                    ui::signed_cell(
                        position.eval_profit,
                        ui::format_amount(position.eval_profit),
                    ),
                    ui::signed_cell(
                        position.profit_rate,
                        ui::format_percent(position.profit_rate),
                    ),
                ]);
            }
            output.push_str(&table.to_string());
            output.push_str("\n\n");
        } else if !self.is_mock() && self.requested == 0 {
            output.push_str(&ui::style_text(
                "No positions configured.",
                ui::StyleType::Subtle,
            ));
            output.push_str("\n\n");
        }

        let total_style = || {
            if self.is_degraded() {
                ui::StyleType::Warning
            } else {
                ui::StyleType::TotalValue
            }
        };
        output.push_str(&format!(
            "Total Value ({}): {}\n",
            ui::style_text(reporting, ui::StyleType::TotalLabel),
            ui::style_text(&ui::format_amount(self.total_evaluation), total_style())
        ));
        output.push_str(&format!(
            "Total Profit ({}): {} ({})\n",
            ui::style_text(reporting, ui::StyleType::TotalLabel),
            ui::style_text(&ui::format_amount(self.total_profit), total_style()),
            ui::format_percent(self.total_profit_rate)
        ));

        let rate = &self.exchange_rate_used;
        let rate_line = format!(
            "Exchange rate {}/{}: {} as of {}",
            currency.foreign,
            reporting,
            ui::format_decimal(rate.rate),
            rate.as_of.format("%Y-%m-%d %H:%M UTC")
        );
        if rate.is_fallback() {
            output.push_str(&ui::style_text(
                &format!("{rate_line} (fallback, live rate unavailable)"),
                ui::StyleType::Warning,
            ));
        } else {
            output.push_str(&ui::style_text(&rate_line, ui::StyleType::Subtle));
        }

        if !self.unpriced.is_empty() {
            output.push('\n');
            output.push_str(&ui::style_text(
                &format!(
                    "Could not price {} of {} positions: {}",
                    self.unpriced_count(),
                    self.requested,
                    self.unpriced.join(", ")
                ),
                ui::StyleType::Warning,
            ));
        }

        output
    }
}

fn native_code<'a>(position: &ValuedPosition, currency: &'a CurrencyConfig) -> &'a str {
    match position.currency {
        CurrencyKind::Domestic => &currency.reporting,
        CurrencyKind::Foreign => &currency.foreign,
    }
}

/// Rounded, presentation-ready view of a summary.
#[derive(Debug, Serialize)]
pub struct SummaryReport {
    pub reporting_currency: String,
    pub mock: bool,
    pub degraded: bool,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_evaluation: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_profit: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_profit_rate: Decimal,
    pub exchange_rate: ExchangeRateReport,
    pub requested_positions: usize,
    pub unpriced: Vec<String>,
    pub positions: Vec<PositionReport>,
}

#[derive(Debug, Serialize)]
pub struct ExchangeRateReport {
    pub pair: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub rate: Decimal,
    pub source: RateSource,
    pub as_of: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct PositionReport {
    pub symbol: String,
    pub currency: CurrencyKind,
    #[serde(with = "rust_decimal::serde::float")]
    pub quantity: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub current_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub avg_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub avg_exchange_rate: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub eval_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub eval_profit: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub profit_rate: Decimal,
}

impl SummaryReport {
    pub fn new(summary: &PortfolioSummary, currency: &CurrencyConfig) -> Self {
        let rate: &ExchangeRate = &summary.exchange_rate_used;
        SummaryReport {
            reporting_currency: currency.reporting.clone(),
            mock: summary.is_mock(),
            degraded: summary.is_degraded(),
            total_evaluation: summary.total_evaluation.round_dp(0),
            total_profit: summary.total_profit.round_dp(0),
            total_profit_rate: summary.total_profit_rate.round_dp(2),
            exchange_rate: ExchangeRateReport {
                pair: format!("{}/{}", currency.foreign, currency.reporting),
                rate: rate.rate.round_dp(2),
                source: rate.source,
                as_of: rate.as_of,
            },
            requested_positions: summary.requested,
            unpriced: summary.unpriced.clone(),
            positions: summary
                .positions
                .iter()
                .map(|p| PositionReport {
                    symbol: p.symbol.clone(),
                    currency: p.currency,
                    quantity: p.quantity,
                    current_price: p.current_price.round_dp(2),
                    avg_price: p.avg_price,
                    avg_exchange_rate: p.exchange_rate_historical.round_dp(2),
                    eval_amount: p.eval_amount.round_dp(0),
                    eval_profit: p.eval_profit.round_dp(0),
                    profit_rate: p.profit_rate.round_dp(2),
                })
                .collect(),
        }
    }
}

pub fn render(
    summary: &PortfolioSummary,
    currency: &CurrencyConfig,
    format: OutputFormat,
) -> Result<String> {
    match format {
        OutputFormat::Table => Ok(summary.display_as_table(currency)),
        OutputFormat::Json => serde_json::to_string_pretty(&SummaryReport::new(summary, currency))
            .context("Failed to serialize summary"),
    }
}

/// Values the configured portfolio against live quotes.
pub async fn build_summary(config: &AppConfig) -> Result<PortfolioSummary> {
    let holdings = config.holdings();

    if config.source.mock {
        info!("Mock mode enabled, skipping quote source");
        let rate = ExchangeRate::fallback(config.currency.fallback_rate, Utc::now());
        return Ok(PortfolioSummary::mock(&holdings, rate));
    }

    let yahoo = config.providers.yahoo.clone().unwrap_or_default();
    let timeout = Duration::from_secs(yahoo.timeout_secs);
    let price_provider = YahooFinanceProvider::new(&yahoo.base_url, timeout)?;
    let currency_provider = YahooCurrencyProvider::new(&yahoo.base_url, timeout)?;

    let pb = ui::new_progress_bar(market::distinct_symbols(&holdings).len() as u64);
    pb.set_message("Fetching quotes...");
    let summary = market::value_portfolio(
        &holdings,
        &price_provider,
        &currency_provider,
        &config.currency,
        &|| pb.inc(1),
    )
    .await;
    pb.finish_and_clear();

    debug!(
        positions = summary.positions.len(),
        unpriced = summary.unpriced_count(),
        mock = summary.is_mock(),
        "Valuation finished"
    );
    Ok(summary)
}

pub async fn run(config: &AppConfig, format: OutputFormat) -> Result<()> {
    let summary = build_summary(config).await?;
    println!("{}", render(&summary, &config.currency, format)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{Holding, PositionConfig};
    use crate::core::price::Quote;
    use crate::core::valuation::aggregate;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn sample_summary(rate: ExchangeRate) -> PortfolioSummary {
        let as_of = rate.as_of;
        let holdings = vec![
            Holding {
                position: PositionConfig {
                    symbol: "005930.KS".to_string(),
                    quantity: dec!(20),
                    avg_cost: dec!(70000),
                    avg_exchange_rate: None,
                },
                currency: CurrencyKind::Domestic,
            },
            Holding {
                position: PositionConfig {
                    symbol: "AAPL".to_string(),
                    quantity: dec!(10),
                    avg_cost: dec!(150),
                    avg_exchange_rate: None,
                },
                currency: CurrencyKind::Foreign,
            },
            Holding {
                position: PositionConfig {
                    symbol: "MISSING".to_string(),
                    quantity: dec!(1),
                    avg_cost: dec!(1),
                    avg_exchange_rate: None,
                },
                currency: CurrencyKind::Foreign,
            },
        ];
        let quotes: HashMap<String, Quote> = [
            ("005930.KS", dec!(75000), CurrencyKind::Domestic),
            ("AAPL", dec!(160.004), CurrencyKind::Foreign),
        ]
        .into_iter()
        .map(|(symbol, price, currency)| {
            (
                symbol.to_string(),
                Quote {
                    symbol: symbol.to_string(),
                    price,
                    currency,
                    as_of,
                },
            )
        })
        .collect();
        aggregate(&holdings, &quotes, &rate)
    }

    fn as_of() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 6, 30, 0).unwrap()
    }

    #[test]
    fn test_table_discloses_degradation() {
        let summary = sample_summary(ExchangeRate::fallback(dec!(1300), as_of()));
        let rendered = summary.display_as_table(&CurrencyConfig::default());
        let table = console::strip_ansi_codes(&rendered).to_string();

        assert!(table.contains("005930.KS"));
        assert!(table.contains("1,500,000"));
        assert!(table.contains("Total Value (KRW): 3,580,052"));
        assert!(
            table.contains("Exchange rate USD/KRW: 1,300 as of 2026-10-16 06:30 UTC (fallback,")
        );
        assert!(table.contains("Could not price 1 of 3 positions: MISSING"));
        assert!(!table.contains("MOCK DATA"));
    }

    #[test]
    fn test_table_for_mock_summary() {
        let holdings = AppConfig::from_yaml(
            r#"
portfolio:
  - { symbol: "AAPL", quantity: 1 }
  - { symbol: "005930.KS", quantity: 2 }
"#,
        )
        .unwrap()
        .holdings();
        let summary =
            PortfolioSummary::mock(&holdings, ExchangeRate::fallback(dec!(1330), as_of()));
        let rendered = summary.display_as_table(&CurrencyConfig::default());
        let table = console::strip_ansi_codes(&rendered).to_string();
        assert!(table.contains("MOCK DATA"));
        assert!(table.contains("Total Value (KRW): 5,500,000"));
        assert!(table.contains("(10.00%)"));
        assert!(table.contains("Could not price 2 of 2 positions: AAPL, 005930.KS"));
    }

    #[test]
    fn test_json_report_rounds_at_presentation() {
        let summary = sample_summary(ExchangeRate::live(dec!(1300), as_of()));
        // Unrounded internally: 160.004 * 10 * 1300
        assert_eq!(summary.positions[1].eval_amount, dec!(2080052));

        let json = render(&summary, &CurrencyConfig::default(), OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["reporting_currency"], "KRW");
        assert_eq!(value["mock"], false);
        assert_eq!(value["degraded"], true);
        assert_eq!(value["total_evaluation"], 3580052.0);
        assert_eq!(value["exchange_rate"]["source"], "live");
        assert_eq!(value["exchange_rate"]["pair"], "USD/KRW");
        assert_eq!(value["unpriced"][0], "MISSING");
        assert_eq!(value["positions"][0]["profit_rate"], 7.14);
        assert_eq!(value["positions"][1]["current_price"], 160.0);
        assert_eq!(value["positions"][1]["currency"], "foreign");
    }

    #[tokio::test]
    async fn test_mock_mode_skips_quote_source() {
        let config = AppConfig::from_yaml(
            r#"
portfolio:
  - symbol: "AAPL"
    quantity: 1
providers:
  yahoo:
    base_url: "http://127.0.0.1:9"
source:
  mock: true
"#,
        )
        .unwrap();
        let summary = build_summary(&config).await.unwrap();
        assert!(summary.is_mock());
        assert_eq!(summary.exchange_rate_used.rate, dec!(1330));
        assert_eq!(summary.requested, 1);
        assert_eq!(summary.unpriced, vec!["AAPL".to_string()]);
    }
}

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::{Decimal, prelude::*};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::core::currency::{CurrencyRateProvider, ExchangeRate};
use crate::core::price::{PriceProvider, PriceResult};

const USER_AGENT: &str = "fxfolio/0.1";

fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .context("Failed to build HTTP client")
}

fn to_decimal(value: f64, what: &str) -> Result<Decimal> {
    Decimal::from_f64(value).ok_or_else(|| anyhow!("Invalid {what}: {value}"))
}

fn market_time(timestamp: Option<i64>) -> DateTime<Utc> {
    timestamp
        .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
        .unwrap_or_else(Utc::now)
}

#[derive(Deserialize, Debug)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Deserialize, Debug)]
struct ChartResult {
    result: Option<Vec<ChartItem>>,
}

#[derive(Deserialize, Debug)]
struct ChartItem {
    meta: ChartMeta,
}

#[derive(Deserialize, Debug)]
struct ChartMeta {
    #[serde(alias = "regularMarketPrice")]
    regular_market_price: Option<f64>,
    currency: Option<String>,
    #[serde(alias = "shortName")]
    short_name: Option<String>,
    #[serde(alias = "regularMarketTime")]
    regular_market_time: Option<i64>,
}

/// Fetches the chart metadata for one Yahoo symbol with a single request.
async fn fetch_chart_meta(
    client: &reqwest::Client,
    base_url: &str,
    symbol: &str,
) -> Result<ChartMeta> {
    let url = format!("{base_url}/v8/finance/chart/{symbol}");
    debug!("Requesting chart data from {}", url);

    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| anyhow!("Request error: {} for symbol: {}", e, symbol))?;

    if !response.status().is_success() {
        return Err(anyhow!(
            "HTTP error: {} for symbol: {}",
            response.status(),
            symbol
        ));
    }

    let text = response.text().await?;
    let data: ChartResponse = serde_json::from_str(&text)
        .map_err(|e| anyhow!("Failed to parse JSON response for {}: {}", symbol, e))?;

    data.chart
        .result
        .and_then(|items| items.into_iter().next())
        .map(|item| item.meta)
        .ok_or_else(|| anyhow!("No chart data found for symbol: {}", symbol))
}

// YahooFinanceProvider implementation for PriceProvider
pub struct YahooFinanceProvider {
    base_url: String,
    client: reqwest::Client,
}

impl YahooFinanceProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(YahooFinanceProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: build_client(timeout)?,
        })
    }
}

#[async_trait]
impl PriceProvider for YahooFinanceProvider {
    #[instrument(
        name = "YahooPriceFetch",
        skip(self),
        fields(symbol = %symbol)
    )]
    async fn fetch_price(&self, symbol: &str) -> Result<PriceResult> {
        let meta = fetch_chart_meta(&self.client, &self.base_url, symbol).await?;
        let price = meta
            .regular_market_price
            .ok_or_else(|| anyhow!("No price data found for symbol: {}", symbol))?;

        Ok(PriceResult {
            price: to_decimal(price, "price")?,
            currency: meta.currency.unwrap_or_default(),
            short_name: meta.short_name,
            as_of: market_time(meta.regular_market_time),
        })
    }
}

// YahooCurrencyProvider implementation for CurrencyRateProvider
pub struct YahooCurrencyProvider {
    base_url: String,
    client: reqwest::Client,
}

impl YahooCurrencyProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(YahooCurrencyProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: build_client(timeout)?,
        })
    }
}

#[async_trait]
impl CurrencyRateProvider for YahooCurrencyProvider {
    #[instrument(name = "YahooRateFetch", skip(self))]
    async fn get_rate(&self, from: &str, to: &str) -> Result<ExchangeRate> {
        let symbol = format!("{from}{to}=X");
        let meta = fetch_chart_meta(&self.client, &self.base_url, &symbol).await?;
        let rate = meta
            .regular_market_price
            .ok_or_else(|| anyhow!("No rate data found for currency pair: {}", symbol))?;

        Ok(ExchangeRate::live(
            to_decimal(rate, "exchange rate")?,
            market_time(meta.regular_market_time),
        ))
    }
}

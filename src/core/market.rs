//! Gathers quotes and the exchange rate for one valuation run and turns
//! collaborator failures into the engine's degraded outcomes.
use crate::core::config::{CurrencyConfig, Holding};
use crate::core::currency::{CurrencyKind, CurrencyRateProvider, ExchangeRate};
use crate::core::price::{PriceProvider, PriceResult, Quote};
use crate::core::valuation::{self, PortfolioSummary};
use chrono::Utc;
use futures::future::join_all;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// Everything the valuation engine needs from the quote source for one run.
#[derive(Debug, Clone, PartialEq)]
pub enum MarketData {
    Available {
        quotes: HashMap<String, Quote>,
        exchange: ExchangeRate,
    },
    /// Neither prices nor the exchange rate could be fetched.
    Unreachable { exchange: ExchangeRate },
}

/// Symbols to fetch, in first-seen order, each listed once.
pub fn distinct_symbols(holdings: &[Holding]) -> Vec<(&str, CurrencyKind)> {
    let mut seen = HashSet::new();
    let mut symbols = Vec::new();
    for holding in holdings {
        if seen.insert(holding.symbol()) {
            symbols.push((holding.symbol(), holding.currency));
        }
    }
    symbols
}

/// Fetches every distinct symbol once, together with the exchange rate, as a
/// single concurrent batch.
///
/// `on_progress` is called once per completed price lookup, that is once for
/// each entry of [`distinct_symbols`].
pub async fn collect(
    holdings: &[Holding],
    price_provider: &(dyn PriceProvider + Send + Sync),
    currency_provider: &(dyn CurrencyRateProvider + Send + Sync),
    currency: &CurrencyConfig,
    on_progress: &(dyn Fn() + Sync),
) -> MarketData {
    let symbols = distinct_symbols(holdings);
    debug!("Fetching {} distinct symbols", symbols.len());

    let price_futures = symbols.iter().map(|(symbol, kind)| async move {
        let result = price_provider.fetch_price(symbol).await;
        on_progress();
        (*symbol, *kind, result)
    });
    let rate_future = currency_provider.get_rate(&currency.foreign, &currency.reporting);

    let (price_results, rate_result) = futures::join!(join_all(price_futures), rate_future);

    let now = Utc::now();
    let (exchange, rate_failed) = match rate_result {
        Ok(live) if live.rate > Decimal::ZERO => (live, false),
        Ok(live) => {
            warn!(
                rate = %live.rate,
                fallback = %currency.fallback_rate,
                "Exchange rate {}/{} is not positive, using fallback",
                currency.foreign,
                currency.reporting
            );
            (ExchangeRate::fallback(currency.fallback_rate, now), false)
        }
        Err(e) => {
            warn!(
                fallback = %currency.fallback_rate,
                "Failed to fetch exchange rate {}/{}: {e}",
                currency.foreign,
                currency.reporting
            );
            (ExchangeRate::fallback(currency.fallback_rate, now), true)
        }
    };

    let mut quotes = HashMap::new();
    let mut failures = 0;
    for (symbol, kind, result) in price_results {
        match result {
            Ok(price) => {
                check_native_currency(symbol, kind, &price, currency);
                quotes.insert(symbol.to_string(), to_quote(symbol, kind, price));
            }
            Err(e) => {
                failures += 1;
                warn!(symbol, "Price unavailable: {e}");
            }
        }
    }

    if !symbols.is_empty() && failures == symbols.len() && rate_failed {
        warn!("Quote source unreachable: every price and the exchange rate failed");
        return MarketData::Unreachable { exchange };
    }

    info!(
        priced = quotes.len(),
        failed = failures,
        rate = %exchange.rate,
        "Collected market data"
    );
    MarketData::Available { quotes, exchange }
}

fn to_quote(symbol: &str, currency: CurrencyKind, price: PriceResult) -> Quote {
    Quote {
        symbol: symbol.to_string(),
        price: price.price,
        currency,
        as_of: price.as_of,
    }
}

// Classification comes from the suffix table; the provider's currency code is
// only used to flag a table that looks wrong.
fn check_native_currency(
    symbol: &str,
    kind: CurrencyKind,
    price: &PriceResult,
    currency: &CurrencyConfig,
) {
    let expected = match kind {
        CurrencyKind::Domestic => &currency.reporting,
        CurrencyKind::Foreign => &currency.foreign,
    };
    if !price.currency.is_empty() && !price.currency.eq_ignore_ascii_case(expected) {
        warn!(
            symbol,
            reported = %price.currency,
            %expected,
            "Provider currency differs from classification"
        );
    }
}

/// Values the holdings against collected market data.
pub fn summarize(holdings: &[Holding], market: &MarketData) -> PortfolioSummary {
    match market {
        MarketData::Available { quotes, exchange } => {
            valuation::aggregate(holdings, quotes, exchange)
        }
        MarketData::Unreachable { exchange } => {
            PortfolioSummary::mock(holdings, exchange.clone())
        }
    }
}

/// Runs one complete valuation: collects market data and aggregates it.
pub async fn value_portfolio(
    holdings: &[Holding],
    price_provider: &(dyn PriceProvider + Send + Sync),
    currency_provider: &(dyn CurrencyRateProvider + Send + Sync),
    currency: &CurrencyConfig,
    on_progress: &(dyn Fn() + Sync),
) -> PortfolioSummary {
    let market = collect(
        holdings,
        price_provider,
        currency_provider,
        currency,
        on_progress,
    )
    .await;
    summarize(holdings, &market)
}

//! Values held positions in the reporting currency and aggregates them into a
//! portfolio summary.
//!
//! Everything here is a pure function of its inputs. Values are kept unrounded;
//! rounding belongs to whoever presents the summary.
use crate::core::config::Holding;
use crate::core::currency::{CurrencyKind, ExchangeRate, effective_rates, normalize};
use crate::core::price::Quote;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{debug, warn};

const MOCK_TOTAL_EVALUATION: i64 = 5_500_000;
const MOCK_TOTAL_PROFIT: i64 = 500_000;
const MOCK_PROFIT_RATE: i64 = 10;

/// A position priced at the current quote, in the reporting currency.
#[derive(Debug, Clone, PartialEq)]
pub struct ValuedPosition {
    pub symbol: String,
    pub quantity: Decimal,
    pub currency: CurrencyKind,
    /// Latest price in the instrument's native currency.
    pub current_price: Decimal,
    /// Average acquisition price in the instrument's native currency.
    pub avg_price: Decimal,
    pub exchange_rate_current: Decimal,
    pub exchange_rate_historical: Decimal,
    pub eval_amount: Decimal,
    pub cost_basis: Decimal,
    pub eval_profit: Decimal,
    pub profit_rate: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryKind {
    /// Computed from live quotes, possibly with some positions unpriced.
    Live,
    /// Placeholder values; nothing was priced.
    Mock,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioSummary {
    pub total_evaluation: Decimal,
    pub total_cost_basis: Decimal,
    pub total_profit: Decimal,
    pub total_profit_rate: Decimal,
    pub positions: Vec<ValuedPosition>,
    pub exchange_rate_used: ExchangeRate,
    /// Symbols that were configured but could not be priced, in config order.
    pub unpriced: Vec<String>,
    /// Number of positions that were asked to be valued.
    pub requested: usize,
    pub kind: SummaryKind,
}

impl PortfolioSummary {
    /// Fixed placeholder summary used when no live data could be obtained.
    ///
    /// Every holding is reported as unpriced so callers still see how much of
    /// the portfolio is missing.
    pub fn mock(holdings: &[Holding], exchange: ExchangeRate) -> Self {
        let total_evaluation = Decimal::from(MOCK_TOTAL_EVALUATION);
        let total_profit = Decimal::from(MOCK_TOTAL_PROFIT);
        Self {
            total_evaluation,
            total_cost_basis: total_evaluation - total_profit,
            total_profit,
            total_profit_rate: Decimal::from(MOCK_PROFIT_RATE),
            positions: Vec::new(),
            exchange_rate_used: exchange,
            unpriced: holdings.iter().map(|h| h.symbol().to_string()).collect(),
            requested: holdings.len(),
            kind: SummaryKind::Mock,
        }
    }

    pub fn is_mock(&self) -> bool {
        self.kind == SummaryKind::Mock
    }

    pub fn unpriced_count(&self) -> usize {
        self.unpriced.len()
    }

    /// True when the summary should not be presented as a complete valuation.
    pub fn is_degraded(&self) -> bool {
        self.is_mock() || !self.unpriced.is_empty() || self.exchange_rate_used.is_fallback()
    }
}

/// `profit / basis` as a percentage, or zero when there is no basis.
pub fn profit_rate(profit: Decimal, basis: Decimal) -> Decimal {
    if basis > Decimal::ZERO {
        profit
            .checked_div(basis)
            .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
            .unwrap_or(Decimal::ZERO)
    } else {
        Decimal::ZERO
    }
}

/// Values a single holding against its quote.
///
/// Returns `None` when there is no quote or the quote has no positive price;
/// such a position must not enter the totals as a zero.
pub fn value_position(
    holding: &Holding,
    quote: Option<&Quote>,
    exchange: &ExchangeRate,
) -> Option<ValuedPosition> {
    let position = &holding.position;
    let quote = match quote {
        Some(q) if q.is_available() => q,
        Some(q) => {
            warn!(
                symbol = %position.symbol,
                price = %q.price,
                "Quote has no usable price, skipping position"
            );
            return None;
        }
        None => {
            warn!(symbol = %position.symbol, "No quote available, skipping position");
            return None;
        }
    };

    let currency = holding.currency;
    let (rate_now, rate_then) =
        effective_rates(currency, exchange.rate, position.avg_exchange_rate);

    let Some((eval_amount, cost_basis, eval_profit)) = position_amounts(holding, quote, exchange)
    else {
        warn!(
            symbol = %position.symbol,
            price = %quote.price,
            quantity = %position.quantity,
            "Position value is out of range, skipping position"
        );
        return None;
    };

    debug!(
        symbol = %position.symbol,
        %eval_amount,
        %cost_basis,
        %eval_profit,
        "Valued position"
    );

    Some(ValuedPosition {
        symbol: position.symbol.clone(),
        quantity: position.quantity,
        currency,
        current_price: quote.price,
        avg_price: position.avg_cost,
        exchange_rate_current: rate_now,
        exchange_rate_historical: rate_then,
        eval_amount,
        cost_basis,
        eval_profit,
        profit_rate: profit_rate(eval_profit, cost_basis),
    })
}

// (eval_amount, cost_basis, eval_profit), or None on overflow.
fn position_amounts(
    holding: &Holding,
    quote: &Quote,
    exchange: &ExchangeRate,
) -> Option<(Decimal, Decimal, Decimal)> {
    let position = &holding.position;
    let eval_amount = normalize(
        quote.price.checked_mul(position.quantity)?,
        holding.currency,
        exchange.rate,
        position.avg_exchange_rate,
    )?
    .value_now;
    let cost_basis = normalize(
        position.avg_cost.checked_mul(position.quantity)?,
        holding.currency,
        exchange.rate,
        position.avg_exchange_rate,
    )?
    .value_at_acquisition;
    let eval_profit = eval_amount.checked_sub(cost_basis)?;
    Some((eval_amount, cost_basis, eval_profit))
}

#[derive(Debug, Clone, Copy, Default)]
struct Totals {
    evaluation: Decimal,
    cost_basis: Decimal,
    profit: Decimal,
}

impl Totals {
    fn checked_add(&self, position: &ValuedPosition) -> Option<Self> {
        Some(Self {
            evaluation: self.evaluation.checked_add(position.eval_amount)?,
            cost_basis: self.cost_basis.checked_add(position.cost_basis)?,
            profit: self.profit.checked_add(position.eval_profit)?,
        })
    }
}

/// Values every holding in order and sums the results.
///
/// Holdings without a usable quote, or whose value would push a total out of
/// range, are left out of `positions` and the totals and listed in `unpriced`.
pub fn aggregate(
    holdings: &[Holding],
    quotes: &HashMap<String, Quote>,
    exchange: &ExchangeRate,
) -> PortfolioSummary {
    let mut positions = Vec::with_capacity(holdings.len());
    let mut unpriced = Vec::new();

    let mut totals = Totals::default();

    for holding in holdings {
        let Some(valued) = value_position(holding, quotes.get(holding.symbol()), exchange) else {
            unpriced.push(holding.symbol().to_string());
            continue;
        };
        match totals.checked_add(&valued) {
            Some(next) => {
                totals = next;
                positions.push(valued);
            }
            None => {
                warn!(
                    symbol = %valued.symbol,
                    eval_amount = %valued.eval_amount,
                    "Position would overflow the portfolio totals, skipping position"
                );
                unpriced.push(valued.symbol);
            }
        }
    }

    if !unpriced.is_empty() {
        warn!(
            "Could not price {} of {} positions: {}",
            unpriced.len(),
            holdings.len(),
            unpriced.join(", ")
        );
    }

    PortfolioSummary {
        total_evaluation: totals.evaluation,
        total_cost_basis: totals.cost_basis,
        total_profit: totals.profit,
        total_profit_rate: profit_rate(totals.profit, totals.cost_basis),
        positions,
        exchange_rate_used: exchange.clone(),
        unpriced,
        requested: holdings.len(),
        kind: SummaryKind::Live,
    }
}

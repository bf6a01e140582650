//! Implied rate computation.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;
use time::Date;
use tracing::{debug, warn};

use crate::error::RateError;
use crate::instrument::{Catalog, MaturityKey};
use crate::orderbook::Quote;

/// Day count used for annualization and compounding.
pub const DAYS_IN_A_YEAR: f64 = 365.0;

/// Rates per symbol within one maturity bucket.
pub type RateTable = BTreeMap<MaturityKey, BTreeMap<String, f64>>;

/// Annualized rate implied by a futures price over its spot price.
///
/// `((future / spot) ^ (1 / days) - 1) * 365`
pub fn implicit_rate(future_price: f64, spot_price: f64, days_to_expiry: i64) -> f64 {
    ((future_price / spot_price).powf(1.0 / days_to_expiry as f64) - 1.0) * DAYS_IN_A_YEAR
}

/// Buy-side and sell-side implied rates grouped by maturity.
///
/// `buy` comes from best bids (the rate earned selling the future against
/// spot), `sell` from best asks.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImplicitRates {
    /// Rates implied by best bids.
    pub buy: RateTable,
    /// Rates implied by best asks.
    pub sell: RateTable,
}

impl ImplicitRates {
    /// Both tables hold at least one rate.
    pub fn ready(&self) -> bool {
        !self.buy.is_empty() && !self.sell.is_empty()
    }

    /// Both tables hold at least one rate for `maturity`.
    pub fn maturity_ready_to_trade(&self, maturity: &MaturityKey) -> bool {
        let has = |table: &RateTable| table.get(maturity).is_some_and(|rates| !rates.is_empty());
        has(&self.buy) && has(&self.sell)
    }

    /// Highest buy-side rate of a maturity and its symbol.
    pub fn max_buy_rate(&self, maturity: &MaturityKey) -> Result<(&str, f64), RateError> {
        extreme(&self.buy, maturity, "buy", |candidate, best| candidate > best)
    }

    /// Lowest sell-side rate of a maturity and its symbol.
    pub fn min_sell_rate(&self, maturity: &MaturityKey) -> Result<(&str, f64), RateError> {
        extreme(&self.sell, maturity, "sell", |candidate, best| candidate < best)
    }

    /// Buy-side rates of one maturity.
    pub fn buy_rates(&self, maturity: &MaturityKey) -> Option<&BTreeMap<String, f64>> {
        self.buy.get(maturity)
    }

    /// Sell-side rates of one maturity.
    pub fn sell_rates(&self, maturity: &MaturityKey) -> Option<&BTreeMap<String, f64>> {
        self.sell.get(maturity)
    }

    /// Maturities present in either table.
    pub fn maturities(&self) -> BTreeSet<&MaturityKey> {
        self.buy.keys().chain(self.sell.keys()).collect()
    }
}

fn extreme<'a>(
    table: &'a RateTable,
    maturity: &MaturityKey,
    side: &'static str,
    better: impl Fn(f64, f64) -> bool,
) -> Result<(&'a str, f64), RateError> {
    let no_quote = || RateError::NoQuoteForMaturity {
        maturity: maturity.clone(),
        side,
    };

    let mut best: Option<(&str, f64)> = None;
    for (symbol, &rate) in table.get(maturity).ok_or_else(no_quote)? {
        match best {
            Some((_, current)) if !better(rate, current) => {}
            _ => best = Some((symbol.as_str(), rate)),
        }
    }
    best.ok_or_else(no_quote)
}

/// Compute buy and sell implied rates for every quoted contract of a
/// tradeable maturity.
///
/// Underliers without a positive spot price are skipped. Contracts that
/// expire on or before `today` are logged and skipped.
pub fn compute_rates(
    bids: &HashMap<String, Quote>,
    asks: &HashMap<String, Quote>,
    spot: &HashMap<String, f64>,
    catalog: &Catalog,
    tradeable: &BTreeSet<MaturityKey>,
    today: Date,
) -> ImplicitRates {
    let mut rates = ImplicitRates::default();

    for (underlier, &spot_price) in spot {
        if !(spot_price.is_finite() && spot_price > 0.0) {
            debug!(underlier = %underlier, spot_price, "Skipping underlier without usable spot");
            continue;
        }

        for contract in catalog.contracts_for_underlier(underlier) {
            let maturity = contract.maturity_key();
            if !tradeable.contains(&maturity) {
                continue;
            }

            let days = match contract.days_to_expiry(today) {
                Ok(days) => days,
                Err(e) => {
                    warn!(error = %e, "Excluding expired contract");
                    continue;
                }
            };

            let record = |table: &mut RateTable, quote: Option<&Quote>| {
                let Some(quote) = quote else { return };
                let rate = implicit_rate(quote.price, spot_price, days);
                if rate.is_finite() {
                    table
                        .entry(maturity.clone())
                        .or_default()
                        .insert(contract.symbol().to_string(), rate);
                }
            };

            record(&mut rates.buy, bids.get(contract.symbol()));
            record(&mut rates.sell, asks.get(contract.symbol()));
        }
    }

    rates
}

//! Trade proposal sizing.

use std::collections::HashMap;
use std::fmt;

use time::OffsetDateTime;
use tracing::debug;

use crate::instrument::{Catalog, Contract, MaturityKey};
use crate::orderbook::Quote;

/// One futures leg of a proposal.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeLeg {
    /// Futures symbol.
    pub symbol: String,
    /// Underlier root ticker of the future.
    pub underlier: String,
    /// Number of contracts.
    pub contracts: u64,
    /// Limit price (best ask for the buy leg, best bid for the sell leg).
    pub price: f64,
    /// Implied rate at that price.
    pub rate: f64,
}

/// Spot hedge implied by one futures leg.
#[derive(Debug, Clone, PartialEq)]
pub struct UnderlierLeg {
    /// Underlier root ticker.
    pub underlier: String,
    /// Units of the underlier.
    pub units: f64,
    /// Spot price used for sizing.
    pub spot_price: f64,
}

impl UnderlierLeg {
    /// Units times spot price.
    pub fn notional(&self) -> f64 {
        self.units * self.spot_price
    }
}

/// Sized two-leg trade for one maturity.
///
/// Buying the future with the lowest ask-implied rate takes (borrows) cash at
/// that rate; selling the future with the highest bid-implied rate places
/// (lends) cash at that rate.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeProposal {
    /// Maturity bucket of both legs.
    pub maturity: MaturityKey,
    /// Future to buy at its best ask.
    pub buy: TradeLeg,
    /// Future to sell at its best bid.
    pub sell: TradeLeg,
    /// Spot bought against the sold future.
    pub underlier_buy: UnderlierLeg,
    /// Spot sold against the bought future.
    pub underlier_sell: UnderlierLeg,
    /// Lending rate minus borrowing rate minus transaction cost.
    pub spread: f64,
    /// Mean notional of the two hedge legs.
    pub average_position: f64,
    /// When the proposal was built.
    pub detected_at: OffsetDateTime,
}

impl TradeProposal {
    /// Rate taken on the buy leg.
    pub fn borrowing_rate(&self) -> f64 {
        self.buy.rate
    }

    /// Rate placed on the sell leg.
    pub fn lending_rate(&self) -> f64 {
        self.sell.rate
    }
}

impl fmt::Display for TradeProposal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Trade {} ---", self.maturity)?;
        writeln!(f, "Borrow:")?;
        writeln!(
            f,
            "  Buy   {:<12} -> {:>8} @ {:.2}",
            self.buy.symbol, self.buy.contracts, self.buy.price
        )?;
        writeln!(
            f,
            "  Sell  {:<12} -> {:>8} @ {:.2}",
            self.underlier_sell.underlier, self.underlier_sell.units, self.underlier_sell.spot_price
        )?;
        writeln!(f, "  Implied rate: {:.6}", self.borrowing_rate())?;
        writeln!(f, "  Notional:     {:.2}", self.underlier_sell.notional())?;
        writeln!(f, "Lend:")?;
        writeln!(
            f,
            "  Sell  {:<12} -> {:>8} @ {:.2}",
            self.sell.symbol, self.sell.contracts, self.sell.price
        )?;
        writeln!(
            f,
            "  Buy   {:<12} -> {:>8} @ {:.2}",
            self.underlier_buy.underlier, self.underlier_buy.units, self.underlier_buy.spot_price
        )?;
        writeln!(f, "  Implied rate: {:.6}", self.lending_rate())?;
        writeln!(f, "  Notional:     {:.2}", self.underlier_buy.notional())?;
        writeln!(f, "--------------------------------------------")?;
        writeln!(f, "Rate spread:      {:.6}", self.spread)?;
        writeln!(f, "Average position: {:.2}", self.average_position)?;
        write!(f, "--------------------------------------------")
    }
}

/// Round to the nearest whole contract, halves up. Negative input yields 0.
pub fn round_half_up(x: f64) -> u64 {
    (x + 0.5).floor() as u64
}

/// Inputs for sizing one maturity, already selected by the detector.
#[derive(Debug, Clone, Copy)]
pub struct LegSelection<'a> {
    /// Maturity bucket.
    pub maturity: &'a MaturityKey,
    /// Symbol with the lowest sell-side rate.
    pub buy_symbol: &'a str,
    /// That rate.
    pub min_sell_rate: f64,
    /// Symbol with the highest buy-side rate.
    pub sell_symbol: &'a str,
    /// That rate.
    pub max_buy_rate: f64,
    /// Spread net of transaction cost.
    pub spread: f64,
}

fn lookup<'c>(
    catalog: &'c Catalog,
    quotes: &HashMap<String, Quote>,
    spot: &HashMap<String, f64>,
    symbol: &str,
    side: &'static str,
) -> Option<(&'c Contract, Quote, f64)> {
    let Some(contract) = catalog.contract_by_symbol(symbol) else {
        debug!(symbol, "Selected instrument missing from catalog");
        return None;
    };
    let Some(quote) = quotes.get(symbol).copied() else {
        debug!(symbol, side, "Selected instrument has no quote in snapshot");
        return None;
    };
    let spot_price = spot.get(contract.underlier()).copied().unwrap_or(0.0);
    if !(spot_price.is_finite() && spot_price > 0.0) {
        debug!(symbol, underlier = contract.underlier(), "No spot price for underlier");
        return None;
    }
    Some((contract, quote, spot_price))
}

/// Size both legs against the available book liquidity.
///
/// The traded amount is the smaller of the two legs' notional at the top of
/// book; each leg's contract count is that amount over its own contract
/// notional, rounded half up. Returns `None` when an input is missing or
/// either leg rounds to zero contracts.
pub fn size_proposal(
    selection: LegSelection<'_>,
    bids: &HashMap<String, Quote>,
    asks: &HashMap<String, Quote>,
    spot: &HashMap<String, f64>,
    catalog: &Catalog,
) -> Option<TradeProposal> {
    let (buy_contract, ask, buy_spot) = lookup(catalog, asks, spot, selection.buy_symbol, "ask")?;
    let (sell_contract, bid, sell_spot) =
        lookup(catalog, bids, spot, selection.sell_symbol, "bid")?;

    let buy_contract_value = buy_contract.multiplier() * buy_spot;
    let sell_contract_value = sell_contract.multiplier() * sell_spot;
    let amount = (ask.size as f64 * buy_contract_value).min(bid.size as f64 * sell_contract_value);

    let buy_size = round_half_up(amount / buy_contract_value);
    let sell_size = round_half_up(amount / sell_contract_value);

    if buy_size == 0 || sell_size == 0 {
        debug!(
            maturity = %selection.maturity,
            amount,
            buy_size,
            sell_size,
            "Proposal rounds to zero contracts"
        );
        return None;
    }

    let underlier_buy = UnderlierLeg {
        underlier: sell_contract.underlier().to_string(),
        units: sell_size as f64 * sell_contract.multiplier(),
        spot_price: sell_spot,
    };
    let underlier_sell = UnderlierLeg {
        underlier: buy_contract.underlier().to_string(),
        units: buy_size as f64 * buy_contract.multiplier(),
        spot_price: buy_spot,
    };
    let average_position = 0.5 * (underlier_buy.notional() + underlier_sell.notional());

    Some(TradeProposal {
        maturity: selection.maturity.clone(),
        buy: TradeLeg {
            symbol: buy_contract.symbol().to_string(),
            underlier: buy_contract.underlier().to_string(),
            contracts: buy_size,
            price: ask.price,
            rate: selection.min_sell_rate,
        },
        sell: TradeLeg {
            symbol: sell_contract.symbol().to_string(),
            underlier: sell_contract.underlier().to_string(),
            contracts: sell_size,
            price: bid.price,
            rate: selection.max_buy_rate,
        },
        underlier_buy,
        underlier_sell,
        spread: selection.spread,
        average_position,
        detected_at: OffsetDateTime::now_utc(),
    })
}

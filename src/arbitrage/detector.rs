//! Rate arbitrage detection.

use std::collections::{BTreeSet, HashMap};

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, info, instrument, warn};

use super::calculator::{size_proposal, LegSelection, TradeProposal};
use crate::instrument::{Catalog, MaturityKey};
use crate::orderbook::Quote;
use crate::rates::ImplicitRates;

/// Find and size arbitrage trades, one maturity at a time.
///
/// For each maturity the future with the highest bid-implied rate is sold
/// and the one with the lowest ask-implied rate is bought, provided the
/// difference exceeds `transaction_cost`. Maturities are evaluated
/// independently and any of them may contribute a proposal.
#[instrument(skip_all, fields(maturities = maturities.len()))]
pub fn evaluate(
    maturities: &BTreeSet<MaturityKey>,
    rates: &ImplicitRates,
    bids: &HashMap<String, Quote>,
    asks: &HashMap<String, Quote>,
    spot: &HashMap<String, f64>,
    catalog: &Catalog,
    transaction_cost: Decimal,
) -> Vec<TradeProposal> {
    let Some(cost) = transaction_cost.to_f64() else {
        warn!(cost = %transaction_cost, "Transaction cost not representable, skipping evaluation");
        return Vec::new();
    };

    let mut proposals = Vec::new();

    for maturity in maturities {
        if !rates.maturity_ready_to_trade(maturity) {
            debug!(maturity = %maturity, "Maturity not ready to trade");
            continue;
        }

        let (Ok((sell_symbol, max_buy_rate)), Ok((buy_symbol, min_sell_rate))) =
            (rates.max_buy_rate(maturity), rates.min_sell_rate(maturity))
        else {
            continue;
        };

        let gross = max_buy_rate - min_sell_rate;
        if gross <= cost {
            debug!(
                maturity = %maturity,
                max_buy_rate,
                min_sell_rate,
                cost,
                "No arbitrage opportunity"
            );
            continue;
        }

        let selection = LegSelection {
            maturity,
            buy_symbol,
            min_sell_rate,
            sell_symbol,
            max_buy_rate,
            spread: gross - cost,
        };

        if let Some(proposal) = size_proposal(selection, bids, asks, spot, catalog) {
            info!(
                maturity = %maturity,
                buy = %proposal.buy.symbol,
                buy_size = proposal.buy.contracts,
                sell = %proposal.sell.symbol,
                sell_size = proposal.sell.contracts,
                spread = proposal.spread,
                "Rate arbitrage detected"
            );
            proposals.push(proposal);
        }
    }

    proposals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::Contract;
    use crate::rates::compute_rates;
    use rust_decimal_macros::dec;
    use time::macros::date;
    use time::Date;

    const TODAY: Date = date!(2022 - 01 - 01);

    fn catalog() -> Catalog {
        Catalog::from_contracts(vec![
            Contract::new("GGAL/FEB22", "GGAL", date!(2022 - 05 - 28), 100.0),
            Contract::new("PAMP/FEB22", "PAMP", date!(2022 - 05 - 28), 100.0),
            Contract::new("GGAL/ABR22", "GGAL", date!(2022 - 04 - 29), 100.0),
            Contract::new("PAMP/ABR22", "PAMP", date!(2022 - 04 - 29), 100.0),
        ])
    }

    fn quotes(entries: &[(&str, f64)]) -> HashMap<String, Quote> {
        entries
            .iter()
            .map(|(s, p)| (s.to_string(), Quote::new(*p, 10)))
            .collect()
    }

    fn spot() -> HashMap<String, f64> {
        HashMap::from([("GGAL".to_string(), 100.0), ("PAMP".to_string(), 100.0)])
    }

    fn run(
        bids: &HashMap<String, Quote>,
        asks: &HashMap<String, Quote>,
        cost: Decimal,
    ) -> Vec<TradeProposal> {
        let catalog = catalog();
        let tradeable = catalog.tradeable_maturities();
        let rates = compute_rates(bids, asks, &spot(), &catalog, &tradeable, TODAY);
        evaluate(&tradeable, &rates, bids, asks, &spot(), &catalog, cost)
    }

    #[test]
    fn detects_arbitrage_and_sizes_both_legs() {
        let bids = quotes(&[("GGAL/FEB22", 110.0), ("PAMP/FEB22", 120.0)]);
        let asks = quotes(&[("GGAL/FEB22", 115.0), ("PAMP/FEB22", 130.0)]);

        let proposals = run(&bids, &asks, dec!(0.01));

        assert_eq!(proposals.len(), 1);
        let proposal = &proposals[0];
        assert_eq!(proposal.maturity, MaturityKey::new("FEB22"));
        assert_eq!(proposal.buy.symbol, "GGAL/FEB22");
        assert_eq!(proposal.buy.price, 115.0);
        assert_eq!(proposal.buy.contracts, 10);
        assert_eq!(proposal.sell.symbol, "PAMP/FEB22");
        assert_eq!(proposal.sell.price, 120.0);
        assert_eq!(proposal.sell.contracts, 10);
        assert!(proposal.lending_rate() > proposal.borrowing_rate());
        assert!(proposal.spread > 0.0);
    }

    #[test]
    fn inverted_spread_yields_nothing() {
        let bids = quotes(&[("GGAL/FEB22", 110.0), ("PAMP/FEB22", 115.0)]);
        let asks = quotes(&[("GGAL/FEB22", 120.0), ("PAMP/FEB22", 125.0)]);

        assert!(run(&bids, &asks, dec!(0.01)).is_empty());
    }

    #[test]
    fn spread_below_cost_yields_nothing() {
        let bids = quotes(&[("GGAL/FEB22", 110.0), ("PAMP/FEB22", 120.0)]);
        let asks = quotes(&[("GGAL/FEB22", 115.0), ("PAMP/FEB22", 125.0)]);

        assert_eq!(run(&bids, &asks, dec!(0.01)).len(), 1);
        assert!(run(&bids, &asks, dec!(0.5)).is_empty());
    }

    #[test]
    fn every_profitable_maturity_contributes() {
        let bids = quotes(&[
            ("GGAL/FEB22", 110.0),
            ("PAMP/FEB22", 120.0),
            ("GGAL/ABR22", 108.0),
            ("PAMP/ABR22", 118.0),
        ]);
        let asks = quotes(&[
            ("GGAL/FEB22", 115.0),
            ("PAMP/FEB22", 125.0),
            ("GGAL/ABR22", 112.0),
            ("PAMP/ABR22", 122.0),
        ]);

        let proposals = run(&bids, &asks, dec!(0.01));
        let maturities: Vec<_> = proposals.iter().map(|p| p.maturity.as_str()).collect();
        assert_eq!(maturities, vec!["ABR22", "FEB22"]);
    }

    #[test]
    fn one_sided_maturity_is_skipped() {
        let bids = quotes(&[("GGAL/FEB22", 110.0), ("PAMP/FEB22", 120.0)]);
        let asks = HashMap::new();

        assert!(run(&bids, &asks, dec!(0.0)).is_empty());
    }
}

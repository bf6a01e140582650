//! End-to-end pipeline tests: venue payloads in, paper orders out.
//!
//! Run with: cargo test --test pipeline

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use rust_decimal_macros::dec;
use time::macros::date;
use time::Date;

use rate_arb::arbitrage::ProposalExecutor;
use rate_arb::bot::Evaluator;
use rate_arb::instrument::{Catalog, InstrumentList, MaturityKey};
use rate_arb::orderbook::{parse_market_data, MarketDataBook};
use rate_arb::rates::render_rates;
use rate_arb::spot::SpotPriceCache;
use rate_arb::trading::{OrderTransport, PaperTransport, Side, TimeInForce};

const TODAY: Date = date!(2022 - 01 - 01);

const INSTRUMENTS: &str = r#"{
    "status": "OK",
    "instruments": [
        {"instrumentId": {"marketId": "ROFX", "symbol": "GGAL/FEB22"},
         "maturityDate": "20220225", "contractMultiplier": 100.0, "cficode": "FXXXSX"},
        {"instrumentId": {"marketId": "ROFX", "symbol": "PAMP/FEB22"},
         "maturityDate": "20220225", "contractMultiplier": 100.0, "cficode": "FXXXSX"},
        {"instrumentId": {"marketId": "ROFX", "symbol": "GGAL/ABR22"},
         "maturityDate": "20220429", "contractMultiplier": 100.0, "cficode": "FXXXSX"},
        {"instrumentId": {"marketId": "ROFX", "symbol": "GGAL/FEB22 120 C"},
         "maturityDate": "20220225", "contractMultiplier": 100.0, "cficode": "OCASPS"},
        {"instrumentId": {"marketId": "ROFX", "symbol": "RFX20/FEB22"},
         "maturityDate": "20220225", "contractMultiplier": 1.0, "cficode": "FXXXSX"}
    ]
}"#;

fn catalog() -> Catalog {
    let list: InstrumentList = serde_json::from_str(INSTRUMENTS).unwrap();
    let roots = vec!["GGAL".to_string(), "PAMP".to_string()];
    Catalog::build(&roots, &list.instruments).unwrap()
}

fn md(symbol: &str, bid: f64, ask: f64) -> String {
    format!(
        r#"{{"type":"Md","instrumentId":{{"marketId":"ROFX","symbol":"{symbol}"}},
            "marketData":{{"BI":[{{"price":{bid},"size":10}}],"OF":[{{"price":{ask},"size":10}}]}}}}"#
    )
}

fn apply(book: &MarketDataBook, text: &str) {
    let update = parse_market_data(text).unwrap().unwrap();
    book.apply_update(&update);
}

fn spot() -> SpotPriceCache {
    let cache = SpotPriceCache::new();
    cache.refresh(HashMap::from([
        ("GGAL".to_string(), 100.0),
        ("PAMP".to_string(), 100.0),
    ]));
    cache
}

#[test]
fn catalog_groups_tradeable_maturities() {
    let catalog = catalog();

    assert_eq!(catalog.len(), 3);
    assert_eq!(
        catalog.tradeable_maturities().into_iter().collect::<Vec<_>>(),
        vec![MaturityKey::new("FEB22")]
    );
    assert_eq!(catalog.tradeable_symbols(), vec!["GGAL/FEB22", "PAMP/FEB22"]);
}

#[tokio::test]
async fn rate_spread_becomes_two_paper_orders() {
    let mut evaluator = Evaluator::new(Arc::new(catalog()), dec!(0.01), false);
    let book = MarketDataBook::new();
    let spot = spot();

    apply(&book, &md("GGAL/FEB22", 110.0, 115.0));
    apply(&book, &md("PAMP/FEB22", 120.0, 130.0));

    let evaluation = evaluator.poll(&book, &spot, TODAY).unwrap();
    assert!(render_rates(&evaluation.rates).contains("FEB22"));
    assert_eq!(evaluation.proposals.len(), 1);

    let proposal = &evaluation.proposals[0];
    assert_eq!(proposal.buy.symbol, "GGAL/FEB22");
    assert_eq!(proposal.sell.symbol, "PAMP/FEB22");
    assert!(proposal.lending_rate() - proposal.borrowing_rate() > 0.01);

    let paper = Arc::new(PaperTransport::new());
    let mut executor = ProposalExecutor::new(Arc::clone(&paper), Duration::ZERO);
    let report = executor.execute(proposal).await.unwrap();

    let sent: Vec<_> = paper
        .sent_orders()
        .into_iter()
        .map(|o| (o.side, o.symbol, o.price, o.size, o.tif))
        .collect();
    assert_eq!(
        sent,
        vec![
            (Side::Buy, "GGAL/FEB22".to_string(), dec!(115), 10, TimeInForce::ImmediateOrCancel),
            (Side::Sell, "PAMP/FEB22".to_string(), dec!(120), 10, TimeInForce::ImmediateOrCancel),
        ]
    );
    assert!(report.buy_state.is_filled());
    assert!(paper.order_status(&report.sell_order_id).await.unwrap().is_filled());
}

#[test]
fn consistent_market_yields_nothing_and_gate_holds() {
    let mut evaluator = Evaluator::new(Arc::new(catalog()), dec!(0.01), false);
    let book = MarketDataBook::new();
    let spot = spot();

    apply(&book, &md("GGAL/FEB22", 110.0, 120.0));
    apply(&book, &md("PAMP/FEB22", 115.0, 125.0));

    let evaluation = evaluator.poll(&book, &spot, TODAY).unwrap();
    assert!(evaluation.rates.ready());
    assert!(evaluation.proposals.is_empty());

    // Nothing changed since: no second cycle.
    assert!(evaluator.poll(&book, &spot, TODAY).is_none());

    // Same spot prices again: the cache is untouched and stays quiet.
    assert!(!spot.refresh(HashMap::from([
        ("GGAL".to_string(), 100.0),
        ("PAMP".to_string(), 100.00001),
    ])));
    assert!(evaluator.poll(&book, &spot, TODAY).is_none());
}

#[test]
fn emptied_offer_removes_maturity_from_trading() {
    let mut evaluator = Evaluator::new(Arc::new(catalog()), dec!(0.01), false);
    let book = MarketDataBook::new();
    let spot = spot();

    apply(&book, &md("GGAL/FEB22", 110.0, 115.0));
    apply(&book, &md("PAMP/FEB22", 120.0, 130.0));
    assert_eq!(evaluator.poll(&book, &spot, TODAY).unwrap().proposals.len(), 1);

    for symbol in ["GGAL/FEB22", "PAMP/FEB22"] {
        apply(
            &book,
            &format!(r#"{{"type":"Md","instrumentId":{{"symbol":"{symbol}"}},"marketData":{{"OF":[]}}}}"#),
        );
    }

    let evaluation = evaluator.poll(&book, &spot, TODAY).unwrap();
    assert!(evaluation.rates.sell.is_empty());
    assert!(!evaluation.rates.buy.is_empty());
    assert!(evaluation.proposals.is_empty());
}

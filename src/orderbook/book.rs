//! Concurrent top-of-book store.
//!
//! One writer (the quote feed) and many readers (the evaluation loop, the
//! status API). Readers only ever receive owned copies.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use time::OffsetDateTime;
use tracing::trace;

use super::types::{BookSnapshot, Quote, QuoteSide, QuoteUpdate, TopOfBook};

#[derive(Debug, Default)]
struct BookState {
    bids: HashMap<String, Quote>,
    asks: HashMap<String, Quote>,
    updated_at: Option<OffsetDateTime>,
}

impl BookState {
    fn side_mut(&mut self, side: QuoteSide) -> &mut HashMap<String, Quote> {
        match side {
            QuoteSide::Bid => &mut self.bids,
            QuoteSide::Ask => &mut self.asks,
        }
    }

    fn apply(&mut self, symbol: &str, side: QuoteSide, top: TopOfBook) {
        let quotes = self.side_mut(side);
        match top {
            TopOfBook::Entry(quote) => {
                quotes.insert(symbol.to_string(), quote);
            }
            TopOfBook::Empty => {
                quotes.remove(symbol);
            }
        }
    }
}

/// Latest bid and ask per instrument.
#[derive(Debug, Default)]
pub struct MarketDataBook {
    state: RwLock<BookState>,
}

impl MarketDataBook {
    /// Create an empty book.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, BookState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BookState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Apply a change to one side of one instrument.
    ///
    /// [`TopOfBook::Empty`] removes only this symbol's quote on that side.
    pub fn apply_quote_update(&self, symbol: &str, side: QuoteSide, top: TopOfBook) {
        let mut state = self.write();
        state.apply(symbol, side, top);
        state.updated_at = Some(OffsetDateTime::now_utc());
    }

    /// Apply every side carried by one message under a single write lock.
    pub fn apply_update(&self, update: &QuoteUpdate) {
        if update.bid.is_none() && update.ask.is_none() {
            return;
        }

        let mut state = self.write();
        if let Some(bid) = update.bid {
            state.apply(&update.symbol, QuoteSide::Bid, bid);
        }
        if let Some(ask) = update.ask {
            state.apply(&update.symbol, QuoteSide::Ask, ask);
        }
        state.updated_at = Some(OffsetDateTime::now_utc());

        trace!(symbol = %update.symbol, bid = ?update.bid, ask = ?update.ask, "Quote applied");
    }

    /// Copy of all best bids.
    pub fn snapshot_bids(&self) -> HashMap<String, Quote> {
        self.read().bids.clone()
    }

    /// Copy of all best asks.
    pub fn snapshot_asks(&self) -> HashMap<String, Quote> {
        self.read().asks.clone()
    }

    /// Copy of both sides and the update time, consistent with each other.
    pub fn snapshot(&self) -> BookSnapshot {
        let state = self.read();
        BookSnapshot {
            bids: state.bids.clone(),
            asks: state.asks.clone(),
            updated_at: state.updated_at,
        }
    }

    /// Best quote for one side of one symbol.
    pub fn quote(&self, symbol: &str, side: QuoteSide) -> Option<Quote> {
        let state = self.read();
        match side {
            QuoteSide::Bid => state.bids.get(symbol).copied(),
            QuoteSide::Ask => state.asks.get(symbol).copied(),
        }
    }

    /// Time of the last applied update.
    pub fn last_update(&self) -> Option<OffsetDateTime> {
        self.read().updated_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn entry(price: f64, size: u64) -> TopOfBook {
        TopOfBook::Entry(Quote::new(price, size))
    }

    #[test]
    fn new_book_is_empty() {
        let book = MarketDataBook::new();
        assert!(book.snapshot_bids().is_empty());
        assert!(book.snapshot_asks().is_empty());
        assert!(book.last_update().is_none());
    }

    #[test]
    fn apply_update_sets_both_sides() {
        let book = MarketDataBook::new();
        book.apply_update(
            &QuoteUpdate::new("GGAL/DIC23")
                .with_bid(entry(110.0, 10))
                .with_ask(entry(115.0, 5)),
        );

        assert_eq!(
            book.quote("GGAL/DIC23", QuoteSide::Bid),
            Some(Quote::new(110.0, 10))
        );
        assert_eq!(
            book.quote("GGAL/DIC23", QuoteSide::Ask),
            Some(Quote::new(115.0, 5))
        );
        assert!(book.last_update().is_some());
    }

    #[test]
    fn empty_offer_clears_only_that_symbol() {
        let book = MarketDataBook::new();
        book.apply_quote_update("X", QuoteSide::Ask, entry(100.0, 5));
        book.apply_quote_update("Y", QuoteSide::Ask, entry(101.0, 7));

        book.apply_quote_update("X", QuoteSide::Ask, TopOfBook::Empty);

        let asks = book.snapshot_asks();
        assert!(!asks.contains_key("X"));
        assert_eq!(asks.get("Y"), Some(&Quote::new(101.0, 7)));
    }

    #[test]
    fn absent_side_is_left_untouched() {
        let book = MarketDataBook::new();
        book.apply_update(
            &QuoteUpdate::new("X")
                .with_bid(entry(99.0, 1))
                .with_ask(entry(100.0, 1)),
        );

        book.apply_update(&QuoteUpdate::new("X").with_bid(entry(98.0, 3)));

        assert_eq!(book.quote("X", QuoteSide::Bid), Some(Quote::new(98.0, 3)));
        assert_eq!(book.quote("X", QuoteSide::Ask), Some(Quote::new(100.0, 1)));
    }

    #[test]
    fn update_without_sides_does_not_touch_timestamp() {
        let book = MarketDataBook::new();
        book.apply_update(&QuoteUpdate::new("X"));
        assert!(book.last_update().is_none());
    }

    #[test]
    fn snapshot_is_independent_of_later_writes() {
        let book = MarketDataBook::new();
        book.apply_quote_update("X", QuoteSide::Bid, entry(100.0, 1));

        let snapshot = book.snapshot();
        book.apply_quote_update("X", QuoteSide::Bid, entry(105.0, 2));
        book.apply_quote_update("Y", QuoteSide::Bid, entry(50.0, 2));

        assert_eq!(snapshot.bids.len(), 1);
        assert_eq!(snapshot.bids.get("X"), Some(&Quote::new(100.0, 1)));
    }

    #[test]
    fn side_copies_do_not_share_state() {
        let book = MarketDataBook::new();
        book.apply_quote_update("X", QuoteSide::Bid, entry(100.0, 1));
        book.apply_quote_update("Y", QuoteSide::Bid, entry(50.0, 4));
        book.apply_quote_update("X", QuoteSide::Ask, entry(101.0, 2));
        book.apply_quote_update("Y", QuoteSide::Ask, entry(51.0, 3));

        let mut bids = book.snapshot_bids();
        let other_bids = book.snapshot_bids();
        assert_eq!(bids, other_bids);

        bids.insert("Z".to_string(), Quote::new(1.0, 1));
        bids.remove("X");
        assert_eq!(other_bids.len(), 2);
        assert_eq!(other_bids.get("X"), Some(&Quote::new(100.0, 1)));
        assert_eq!(book.snapshot_bids(), other_bids);

        let mut asks = book.snapshot_asks();
        let other_asks = book.snapshot_asks();
        assert_eq!(asks, other_asks);

        asks.insert("Z".to_string(), Quote::new(2.0, 1));
        asks.remove("Y");
        assert_eq!(other_asks.len(), 2);
        assert_eq!(other_asks.get("Y"), Some(&Quote::new(51.0, 3)));
        assert_eq!(book.snapshot_asks(), other_asks);
    }

    #[test]
    fn readers_never_see_half_applied_messages() {
        let book = Arc::new(MarketDataBook::new());

        let writer = {
            let book = Arc::clone(&book);
            thread::spawn(move || {
                for i in 1..=2_000u64 {
                    let price = i as f64;
                    book.apply_update(
                        &QuoteUpdate::new("X")
                            .with_bid(entry(price, i))
                            .with_ask(entry(price + 1.0, i)),
                    );
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let book = Arc::clone(&book);
                thread::spawn(move || {
                    for _ in 0..2_000 {
                        let snapshot = book.snapshot();
                        if let (Some(bid), Some(ask)) =
                            (snapshot.bids.get("X"), snapshot.asks.get("X"))
                        {
                            assert_eq!(bid.size, ask.size);
                            assert_eq!(ask.price - bid.price, 1.0);
                        }
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }

        assert_eq!(book.quote("X", QuoteSide::Bid), Some(Quote::new(2000.0, 2000)));
    }
}

//! Top-of-book types and data structures.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Best price and size on one side of an instrument's book.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Quote {
    /// Price of the best level.
    pub price: f64,
    /// Contracts available at that price.
    pub size: u64,
}

impl Quote {
    /// Create a new quote.
    pub fn new(price: f64, size: u64) -> Self {
        Self { price, size }
    }
}

/// Book side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuoteSide {
    /// Best bid.
    Bid,
    /// Best offer.
    Ask,
}

impl fmt::Display for QuoteSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuoteSide::Bid => f.write_str("bid"),
            QuoteSide::Ask => f.write_str("ask"),
        }
    }
}

/// New state of one side of an instrument's book.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TopOfBook {
    /// A level is present.
    Entry(Quote),
    /// The venue reported the side as empty.
    Empty,
}

/// One inbound market data message, decoded.
///
/// `None` on a side means the message did not carry that side and the stored
/// quote is left untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteUpdate {
    /// Instrument symbol.
    pub symbol: String,
    /// Bid side change, if any.
    pub bid: Option<TopOfBook>,
    /// Ask side change, if any.
    pub ask: Option<TopOfBook>,
}

impl QuoteUpdate {
    /// Update carrying no side changes.
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            bid: None,
            ask: None,
        }
    }

    /// Set the bid side.
    pub fn with_bid(mut self, bid: TopOfBook) -> Self {
        self.bid = Some(bid);
        self
    }

    /// Set the ask side.
    pub fn with_ask(mut self, ask: TopOfBook) -> Self {
        self.ask = Some(ask);
        self
    }
}

/// Owned copy of the book taken under one read lock.
#[derive(Debug, Clone, Default)]
pub struct BookSnapshot {
    /// Best bids by symbol.
    pub bids: HashMap<String, Quote>,
    /// Best asks by symbol.
    pub asks: HashMap<String, Quote>,
    /// Time of the last applied update, `None` before the first one.
    pub updated_at: Option<OffsetDateTime>,
}

//! Market data module.
//!
//! This module handles:
//! - Top-of-book types and inbound update decoding
//! - The concurrent book shared by the feed and the evaluation loop
//! - WebSocket session for real-time venue quotes

pub mod book;
pub mod types;
pub mod websocket;

pub use book::MarketDataBook;
pub use types::{BookSnapshot, Quote, QuoteSide, QuoteUpdate, TopOfBook};
pub use websocket::{parse_market_data, QuoteFeed};

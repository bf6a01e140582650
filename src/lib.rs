//! Implied-rate arbitrage bot for futures against their spot underliers.
//!
//! Every future carries an annualized financing rate implied by the gap
//! between its price and the spot price of its underlier. Futures of the same
//! maturity on different underliers should imply the same rate; when the
//! best bid on one implies more than the best ask on another, buying the
//! cheap one and selling the rich one (hedged with spot) locks in the spread.
//!
//! # Rate
//!
//! ```text
//! rate = ((future / spot) ^ (1 / days_to_expiry) - 1) * 365
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from environment
//! - [`error`]: Unified error types
//! - [`instrument`]: Contract catalog and maturity classification
//! - [`orderbook`]: Top-of-book store and venue quote feed
//! - [`spot`]: Spot price cache and periodic pull
//! - [`rates`]: Implied rate engine and console table
//! - [`gate`]: Staleness gate between feeds and evaluation
//! - [`arbitrage`]: Opportunity detection, sizing and execution
//! - [`trading`]: Orders, venue client and transports
//! - [`bot`]: Composition root
//! - [`api`]: HTTP API for health/metrics
//! - [`utils`]: Utility functions

pub mod api;
pub mod arbitrage;
pub mod bot;
pub mod config;
pub mod error;
pub mod gate;
pub mod instrument;
pub mod metrics;
pub mod orderbook;
pub mod rates;
pub mod spot;
pub mod trading;
pub mod utils;

pub use config::Config;
pub use error::{BotError, Result};

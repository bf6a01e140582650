//! Instrument catalog module.
//!
//! This module handles:
//! - Futures contract and maturity bucket types
//! - Catalog construction from the venue instrument list
//! - Tradeable maturity classification

pub mod catalog;
pub mod types;

pub use catalog::Catalog;
pub use types::{
    spot_symbol, Contract, InstrumentList, MaturityKey, VenueInstrument, VenueInstrumentId,
    DOLLAR_ROOT,
};

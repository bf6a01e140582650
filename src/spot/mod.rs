//! Underlier spot prices: cache and periodic pull.

pub mod cache;
pub mod feed;

pub use cache::{SpotPriceCache, SpotSnapshot, PRICE_TOLERANCE};
pub use feed::{run_spot_feed, SpotSource, YahooSpotSource};

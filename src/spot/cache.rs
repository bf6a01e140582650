//! Spot price cache with all-or-nothing refresh.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard};

use time::OffsetDateTime;
use tracing::debug;

/// Smallest upward move that counts as a change.
pub const PRICE_TOLERANCE: f64 = 1e-4;

/// Owned copy of the cache.
#[derive(Debug, Clone, Default)]
pub struct SpotSnapshot {
    /// Last price per underlier root ticker.
    pub prices: HashMap<String, f64>,
    /// Time of the last replacement, `None` before the first one.
    pub updated_at: Option<OffsetDateTime>,
}

impl SpotSnapshot {
    /// Price for an underlier, `0.0` when unknown.
    pub fn price(&self, underlier: &str) -> f64 {
        self.prices.get(underlier).copied().unwrap_or(0.0)
    }
}

/// Latest underlier prices, replaced as a whole set.
#[derive(Debug, Default)]
pub struct SpotPriceCache {
    state: RwLock<SpotSnapshot>,
}

impl SpotPriceCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, SpotSnapshot> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Replace the cached set if any price rose by more than [`PRICE_TOLERANCE`].
    ///
    /// Returns true when the set was replaced. A pull where every price held or
    /// fell leaves both prices and timestamp as they were.
    pub fn refresh(&self, prices: HashMap<String, f64>) -> bool {
        let mut state = self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner());

        let changed = prices.iter().any(|(symbol, new)| {
            let old = state.prices.get(symbol).copied().unwrap_or(0.0);
            new - old > PRICE_TOLERANCE
        });

        if !changed {
            return false;
        }

        debug!(symbols = prices.len(), "Spot prices replaced");
        state.prices = prices;
        state.updated_at = Some(OffsetDateTime::now_utc());
        true
    }

    /// Price for an underlier, `0.0` when unknown.
    pub fn price(&self, underlier: &str) -> f64 {
        self.read().price(underlier)
    }

    /// Copy of prices and timestamp.
    pub fn snapshot(&self) -> SpotSnapshot {
        self.read().clone()
    }

    /// Time of the last replacement.
    pub fn last_update(&self) -> Option<OffsetDateTime> {
        self.read().updated_at
    }
}

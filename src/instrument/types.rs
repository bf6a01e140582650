//! Futures contract types and venue instrument records.

use serde::{Deserialize, Serialize};
use time::Date;

use crate::error::RateError;

/// Root ticker whose spot quote is the ARS/USD exchange rate.
pub const DOLLAR_ROOT: &str = "DLR";

/// One futures contract as listed by the venue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Contract {
    symbol: String,
    underlier: String,
    maturity: Date,
    multiplier: f64,
}

impl Contract {
    /// Create a contract.
    pub fn new(
        symbol: impl Into<String>,
        underlier: impl Into<String>,
        maturity: Date,
        multiplier: f64,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            underlier: underlier.into(),
            maturity,
            multiplier,
        }
    }

    /// Venue symbol, e.g. `GGAL/DIC23`.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Root ticker of the underlier, e.g. `GGAL`.
    pub fn underlier(&self) -> &str {
        &self.underlier
    }

    /// Maturity date.
    pub fn maturity(&self) -> Date {
        self.maturity
    }

    /// Units of underlier per contract.
    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    /// Maturity bucket this contract belongs to.
    pub fn maturity_key(&self) -> MaturityKey {
        let suffix = self
            .symbol
            .strip_prefix(self.underlier.as_str())
            .map(|s| s.trim_start_matches('/'))
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.symbol);
        MaturityKey::new(suffix)
    }

    /// Whole days from `today` until maturity.
    ///
    /// A contract maturing today (or earlier) is [`RateError::Expired`].
    pub fn days_to_expiry(&self, today: Date) -> Result<i64, RateError> {
        let days = (self.maturity - today).whole_days();
        if days <= 0 {
            return Err(RateError::Expired {
                symbol: self.symbol.clone(),
                maturity: self.maturity,
            });
        }
        Ok(days)
    }
}

/// Maturity bucket key: contract symbol with the underlier root stripped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MaturityKey(String);

impl MaturityKey {
    /// Create a key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MaturityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MaturityKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

/// Symbol the spot source quotes for a root ticker.
pub fn spot_symbol(root: &str) -> String {
    if root == DOLLAR_ROOT {
        "ARS=X".to_string()
    } else {
        format!("{}.BA", root)
    }
}

/// Instrument list returned by the venue.
#[derive(Debug, Clone, Deserialize)]
pub struct InstrumentList {
    /// Response status ("OK" or "ERROR").
    pub status: Option<String>,
    /// Instrument records.
    #[serde(default)]
    pub instruments: Vec<VenueInstrument>,
}

/// Detailed instrument record from the venue.
#[derive(Debug, Clone, Deserialize)]
pub struct VenueInstrument {
    /// Instrument identity.
    #[serde(rename = "instrumentId")]
    pub instrument_id: VenueInstrumentId,
    /// Maturity date, usually `YYYYMMDD`.
    #[serde(rename = "maturityDate")]
    pub maturity_date: Option<String>,
    /// Units of underlier per contract.
    #[serde(rename = "contractMultiplier")]
    pub contract_multiplier: Option<f64>,
    /// ISO 10962 classification code (futures start with `F`).
    #[serde(rename = "cficode")]
    pub cfi_code: Option<String>,
}

/// Venue instrument identity.
#[derive(Debug, Clone, Deserialize)]
pub struct VenueInstrumentId {
    /// Market identifier, e.g. "ROFX".
    #[serde(rename = "marketId")]
    pub market_id: Option<String>,
    /// Instrument symbol.
    pub symbol: String,
}

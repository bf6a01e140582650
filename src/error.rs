//! Unified error types for the rate arbitrage bot.

use thiserror::Error;
use time::Date;

use crate::instrument::MaturityKey;

/// Unified error type for the rate arbitrage bot.
#[derive(Error, Debug)]
pub enum BotError {
    /// Configuration loading error.
    #[error("configuration error: {0}")]
    Config(#[from] envy::Error),

    /// Instrument catalog construction error.
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Rate calculation error.
    #[error("rate error: {0}")]
    Rate(#[from] RateError),

    /// Market data feed error.
    #[error("feed error: {0}")]
    Feed(#[from] FeedError),

    /// Trading/order error.
    #[error("trading error: {0}")]
    Trading(#[from] TradingError),

    /// HTTP request error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while building the instrument catalog.
///
/// These are fatal at startup: without a valid catalog nothing downstream
/// can be computed.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// A venue record matched a root ticker but could not be turned into a contract.
    #[error("unparseable instrument {symbol}: {reason}")]
    UnparseableInstrument {
        /// Venue symbol of the offending record.
        symbol: String,
        /// What could not be parsed.
        reason: String,
    },

    /// No root tickers were configured.
    #[error("no root tickers configured")]
    NoRootTickers,
}

/// Implied rate calculation errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RateError {
    /// Contract expires today or has already expired.
    #[error("contract {symbol} expired (maturity {maturity})")]
    Expired {
        /// Contract symbol.
        symbol: String,
        /// Maturity date of the contract.
        maturity: Date,
    },

    /// The maturity has no entry in the requested rate table.
    #[error("no {side} quote for maturity {maturity}")]
    NoQuoteForMaturity {
        /// Maturity bucket that was queried.
        maturity: MaturityKey,
        /// Which table was empty ("buy" or "sell").
        side: &'static str,
    },
}

/// Quote stream and spot pull errors.
#[derive(Error, Debug)]
pub enum FeedError {
    /// Inbound market data message was missing expected fields.
    #[error("malformed quote message: {0}")]
    MalformedQuoteMessage(String),

    /// Spot price payload could not be interpreted.
    #[error("malformed spot payload: {0}")]
    MalformedSpotPayload(String),

    /// A producer hit its consecutive failure limit.
    #[error("{feed} feed stopped after {count} consecutive malformed payloads")]
    TooManyFailures {
        /// Which feed gave up.
        feed: &'static str,
        /// Number of consecutive failures.
        count: u32,
    },

    /// Connection failed.
    #[error("websocket connection failed: {0}")]
    ConnectionFailed(String),

    /// Connection closed unexpectedly.
    #[error("websocket connection closed: code={code:?}, reason={reason}")]
    ConnectionClosed {
        /// Close code.
        code: Option<u16>,
        /// Close reason.
        reason: String,
    },

    /// Send failed.
    #[error("failed to send websocket message: {0}")]
    SendFailed(String),

    /// Tungstenite error.
    #[error("tungstenite error: {0}")]
    Tungstenite(#[from] tokio_tungstenite::tungstenite::Error),

    /// HTTP request failed.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl FeedError {
    /// Whether this error only discards a single payload.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            FeedError::MalformedQuoteMessage(_) | FeedError::MalformedSpotPayload(_)
        )
    }
}

/// Trading and order transport errors.
#[derive(Error, Debug)]
pub enum TradingError {
    /// Order send call failed.
    #[error("transport failure sending {symbol}: {reason}")]
    TransportFailure {
        /// Instrument of the order.
        symbol: String,
        /// Reason for failure.
        reason: String,
    },

    /// Failed to get order status.
    #[error("failed to get order status for {order_id}: {reason}")]
    StatusFailed {
        /// Order ID.
        order_id: String,
        /// Reason for failure.
        reason: String,
    },

    /// Invalid order parameters.
    #[error("invalid order parameters: {0}")]
    InvalidParams(String),

    /// Authentication failed.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Order rejected by the venue.
    #[error("order rejected: {reason}")]
    OrderRejected {
        /// Rejection reason from the venue.
        reason: String,
    },
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, BotError>;

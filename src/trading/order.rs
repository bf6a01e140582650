//! Order types and creation.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::TradingError;

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    /// Buy order.
    #[strum(to_string = "BUY", serialize = "buy")]
    Buy,
    /// Sell order.
    #[strum(to_string = "SELL", serialize = "sell")]
    Sell,
}

impl Side {
    /// Wire/metric label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

/// Order time-in-force.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, Default,
)]
pub enum TimeInForce {
    /// Fill what is available now, cancel the rest.
    #[default]
    #[serde(rename = "IOC")]
    #[strum(to_string = "IOC", serialize = "ioc")]
    ImmediateOrCancel,
    /// Fill entirely now or cancel.
    #[serde(rename = "FOK")]
    #[strum(to_string = "FOK", serialize = "fok")]
    FillOrKill,
    /// Rest on the book for the session.
    #[serde(rename = "DAY")]
    #[strum(to_string = "DAY", serialize = "day")]
    Day,
}

/// Order type.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, Default,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    /// Limit order.
    #[default]
    #[strum(to_string = "LIMIT", serialize = "limit")]
    Limit,
    /// Market order.
    #[strum(to_string = "MARKET", serialize = "market")]
    Market,
}

/// Order parameters for submission.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderParams {
    /// Futures symbol to trade.
    pub symbol: String,
    /// Order side.
    pub side: Side,
    /// Limit price.
    pub price: Decimal,
    /// Number of contracts.
    pub size: u64,
    /// Time-in-force.
    pub tif: TimeInForce,
    /// Order type.
    pub order_type: OrderType,
}

impl OrderParams {
    /// Create a limit IOC buy order.
    pub fn buy(symbol: impl Into<String>, price: Decimal, size: u64) -> Self {
        Self {
            symbol: symbol.into(),
            side: Side::Buy,
            price,
            size,
            tif: TimeInForce::ImmediateOrCancel,
            order_type: OrderType::Limit,
        }
    }

    /// Create a limit IOC sell order.
    pub fn sell(symbol: impl Into<String>, price: Decimal, size: u64) -> Self {
        Self {
            side: Side::Sell,
            ..Self::buy(symbol, price, size)
        }
    }

    /// Set time-in-force.
    pub fn with_tif(mut self, tif: TimeInForce) -> Self {
        self.tif = tif;
        self
    }

    /// Validate order parameters.
    pub fn validate(&self) -> Result<(), String> {
        if self.symbol.is_empty() {
            return Err("symbol is required".to_string());
        }
        if self.price <= Decimal::ZERO {
            return Err("price must be positive".to_string());
        }
        if self.size == 0 {
            return Err("size must be positive".to_string());
        }
        Ok(())
    }
}

/// Convert a book price to an order price.
pub fn price_to_decimal(price: f64) -> Result<Decimal, TradingError> {
    Decimal::from_f64(price)
        .map(|d| d.normalize())
        .ok_or_else(|| TradingError::InvalidParams(format!("price {} not representable", price)))
}

/// Order status reported by the venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Accepted, not yet acknowledged by the matching engine.
    PendingNew,
    /// Working on the book.
    New,
    /// Partially filled.
    PartiallyFilled,
    /// Fully filled.
    Filled,
    /// Cancel requested.
    PendingCancel,
    /// Cancelled (including the unfilled part of an IOC order).
    Cancelled,
    /// Rejected by the venue.
    Rejected,
    /// Expired.
    Expired,
}

impl OrderStatus {
    /// Check if status is terminal (won't change).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled
                | OrderStatus::Cancelled
                | OrderStatus::Rejected
                | OrderStatus::Expired
        )
    }

    /// Check if order was filled.
    pub fn is_filled(&self) -> bool {
        matches!(self, OrderStatus::Filled)
    }
}

/// Order state summary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderState {
    /// Order ID.
    pub order_id: String,
    /// Current status, `None` when the venue sent one we do not know.
    pub status: Option<OrderStatus>,
    /// Filled contracts.
    pub filled_size: Option<Decimal>,
    /// Remaining contracts.
    pub remaining_size: Option<Decimal>,
    /// Rejection or status text from the venue.
    pub text: Option<String>,
}

impl OrderState {
    /// Whether order is in terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_some_and(|s| s.is_terminal())
    }

    /// Whether order was fully filled.
    pub fn is_filled(&self) -> bool {
        self.status.is_some_and(|s| s.is_filled())
    }
}

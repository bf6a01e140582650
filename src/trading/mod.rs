//! Trading module for order management and execution.
//!
//! This module handles:
//! - Order types and creation
//! - The venue REST session (auth, instruments, orders)
//! - Live and paper order transports

pub mod client;
pub mod order;
pub mod transport;

pub use client::{build_http_client, ws_url_from_rest, PrimaryClient};
pub use order::{OrderParams, OrderState, OrderStatus, OrderType, Side, TimeInForce};
pub use transport::{OrderTransport, PaperTransport, Transport};

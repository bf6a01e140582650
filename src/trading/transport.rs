//! Order transports: live venue session or in-memory paper trading.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use rust_decimal::Decimal;
use tracing::info;

use super::client::PrimaryClient;
use super::order::{OrderParams, OrderState, OrderStatus};
use crate::error::TradingError;

/// Sends orders and reports their status.
pub trait OrderTransport: Send + Sync {
    /// Send an order, returning its ID.
    fn send_order(
        &self,
        params: &OrderParams,
    ) -> impl Future<Output = Result<String, TradingError>> + Send;

    /// Fetch the current state of an order.
    fn order_status(
        &self,
        order_id: &str,
    ) -> impl Future<Output = Result<OrderState, TradingError>> + Send;
}

impl OrderTransport for PrimaryClient {
    async fn send_order(&self, params: &OrderParams) -> Result<String, TradingError> {
        PrimaryClient::send_order(self, params).await
    }

    async fn order_status(&self, order_id: &str) -> Result<OrderState, TradingError> {
        PrimaryClient::order_status(self, order_id).await
    }
}

#[derive(Debug, Clone)]
struct PaperOrder {
    seq: u64,
    params: OrderParams,
}

/// Dry-run transport: every valid order fills immediately at its limit.
#[derive(Debug, Default)]
pub struct PaperTransport {
    next_id: AtomicU64,
    orders: DashMap<String, PaperOrder>,
}

impl PaperTransport {
    /// Create an empty paper book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Orders sent so far, in send order.
    pub fn sent_orders(&self) -> Vec<OrderParams> {
        let mut orders: Vec<PaperOrder> = self.orders.iter().map(|o| o.value().clone()).collect();
        orders.sort_by_key(|o| o.seq);
        orders.into_iter().map(|o| o.params).collect()
    }

    /// Number of orders sent.
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    /// Check if no order was sent.
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

impl OrderTransport for PaperTransport {
    async fn send_order(&self, params: &OrderParams) -> Result<String, TradingError> {
        params.validate().map_err(TradingError::InvalidParams)?;

        let seq = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let order_id = format!("paper-{}", seq);

        info!(
            order_id = %order_id,
            symbol = %params.symbol,
            side = %params.side,
            price = %params.price,
            size = params.size,
            tif = %params.tif,
            "Paper order filled"
        );

        self.orders.insert(
            order_id.clone(),
            PaperOrder {
                seq,
                params: params.clone(),
            },
        );
        Ok(order_id)
    }

    async fn order_status(&self, order_id: &str) -> Result<OrderState, TradingError> {
        let order = self
            .orders
            .get(order_id)
            .ok_or_else(|| TradingError::StatusFailed {
                order_id: order_id.to_string(),
                reason: "unknown order".to_string(),
            })?;

        Ok(OrderState {
            order_id: order_id.to_string(),
            status: Some(OrderStatus::Filled),
            filled_size: Some(Decimal::from(order.params.size)),
            remaining_size: Some(Decimal::ZERO),
            text: None,
        })
    }
}

/// Transport selected at startup.
#[derive(Debug)]
pub enum Transport {
    /// Orders go to the venue.
    Live(PrimaryClient),
    /// Orders are simulated.
    Paper(PaperTransport),
}

impl Transport {
    /// Whether orders are simulated.
    pub fn is_paper(&self) -> bool {
        matches!(self, Transport::Paper(_))
    }
}

impl OrderTransport for Transport {
    async fn send_order(&self, params: &OrderParams) -> Result<String, TradingError> {
        match self {
            Transport::Live(client) => OrderTransport::send_order(client, params).await,
            Transport::Paper(paper) => paper.send_order(params).await,
        }
    }

    async fn order_status(&self, order_id: &str) -> Result<OrderState, TradingError> {
        match self {
            Transport::Live(client) => OrderTransport::order_status(client, order_id).await,
            Transport::Paper(paper) => paper.order_status(order_id).await,
        }
    }
}

//! Trade proposal execution.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{error, info, instrument};

use super::calculator::{TradeLeg, TradeProposal};
use crate::error::TradingError;
use crate::metrics;
use crate::trading::order::{price_to_decimal, OrderParams, OrderState};
use crate::trading::OrderTransport;

/// Outcome of one executed proposal.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    /// Buy leg order ID.
    pub buy_order_id: String,
    /// Sell leg order ID.
    pub sell_order_id: String,
    /// Buy leg state after the status check.
    pub buy_state: OrderState,
    /// Sell leg state after the status check.
    pub sell_state: OrderState,
}

/// Executor counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExecutorStats {
    /// Proposals handed to the executor.
    pub proposals_seen: u64,
    /// Proposals whose both legs were sent and checked.
    pub proposals_executed: u64,
    /// Proposals dropped after a trading error.
    pub proposals_abandoned: u64,
    /// Orders accepted by the transport.
    pub orders_sent: u64,
}

/// Sends both legs of each proposal through an order transport.
#[derive(Debug)]
pub struct ProposalExecutor<T> {
    transport: Arc<T>,
    status_delay: Duration,
    stats: ExecutorStats,
}

impl<T: OrderTransport> ProposalExecutor<T> {
    /// Create an executor that checks order status `status_delay` after sending.
    pub fn new(transport: Arc<T>, status_delay: Duration) -> Self {
        Self {
            transport,
            status_delay,
            stats: ExecutorStats::default(),
        }
    }

    /// Counters so far.
    pub fn stats(&self) -> ExecutorStats {
        self.stats
    }

    /// Transport in use.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Execute one proposal: BUY leg, then SELL leg, both LIMIT IOC, then one
    /// status check per order.
    ///
    /// Any trading error abandons the proposal; nothing is retried.
    #[instrument(skip_all, fields(maturity = %proposal.maturity))]
    pub async fn execute(
        &mut self,
        proposal: &TradeProposal,
    ) -> Result<ExecutionReport, TradingError> {
        self.stats.proposals_seen += 1;

        match self.execute_legs(proposal).await {
            Ok(report) => {
                self.stats.proposals_executed += 1;
                info!(
                    buy_order_id = %report.buy_order_id,
                    buy_status = ?report.buy_state.status,
                    buy_filled = ?report.buy_state.filled_size,
                    sell_order_id = %report.sell_order_id,
                    sell_status = ?report.sell_state.status,
                    sell_filled = ?report.sell_state.filled_size,
                    "Proposal executed"
                );
                Ok(report)
            }
            Err(e) => {
                self.stats.proposals_abandoned += 1;
                metrics::inc_proposals_abandoned();
                error!(
                    error = %e,
                    buy = %proposal.buy.symbol,
                    buy_size = proposal.buy.contracts,
                    buy_price = proposal.buy.price,
                    sell = %proposal.sell.symbol,
                    sell_size = proposal.sell.contracts,
                    sell_price = proposal.sell.price,
                    spread = proposal.spread,
                    "Proposal abandoned"
                );
                Err(e)
            }
        }
    }

    async fn execute_legs(
        &mut self,
        proposal: &TradeProposal,
    ) -> Result<ExecutionReport, TradingError> {
        let buy = leg_order(&proposal.buy, OrderParams::buy)?;
        let sell = leg_order(&proposal.sell, OrderParams::sell)?;

        let buy_order_id = self.send(&buy).await?;
        let sell_order_id = self.send(&sell).await?;

        tokio::time::sleep(self.status_delay).await;

        let buy_state = self.transport.order_status(&buy_order_id).await?;
        let sell_state = self.transport.order_status(&sell_order_id).await?;

        Ok(ExecutionReport {
            buy_order_id,
            sell_order_id,
            buy_state,
            sell_state,
        })
    }

    async fn send(&mut self, params: &OrderParams) -> Result<String, TradingError> {
        let start = Instant::now();
        match self.transport.send_order(params).await {
            Ok(order_id) => {
                metrics::record_order_send_latency(start);
                self.stats.orders_sent += 1;
                metrics::inc_orders_sent(params.side.as_str());
                Ok(order_id)
            }
            Err(e) => {
                metrics::inc_orders_failed();
                Err(e)
            }
        }
    }
}

fn leg_order(
    leg: &TradeLeg,
    build: fn(String, rust_decimal::Decimal, u64) -> OrderParams,
) -> Result<OrderParams, TradingError> {
    Ok(build(leg.symbol.clone(), price_to_decimal(leg.price)?, leg.contracts))
}

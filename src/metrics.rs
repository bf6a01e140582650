//! Prometheus metrics for feed health, evaluation latency and order flow.

use std::time::Instant;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use tracing::debug;

// === Metric Name Constants ===

/// Quote message processing latency metric name.
pub const METRIC_QUOTE_MESSAGE_LATENCY: &str = "quote_message_latency_ms";
/// Evaluation cycle latency metric name.
pub const METRIC_EVALUATION_LATENCY: &str = "evaluation_latency_ms";
/// Order send latency metric name.
pub const METRIC_ORDER_SEND_LATENCY: &str = "order_send_latency_ms";
/// Spot pull latency metric name.
pub const METRIC_SPOT_FETCH_LATENCY: &str = "spot_fetch_latency_ms";
/// Quote messages received counter metric name.
pub const METRIC_QUOTE_MESSAGES: &str = "quote_messages_received_total";
/// Quote updates applied counter metric name.
pub const METRIC_QUOTES_APPLIED: &str = "quotes_applied_total";
/// Spot cache replacements counter metric name.
pub const METRIC_SPOT_REFRESHES: &str = "spot_refreshes_total";
/// Malformed payloads counter metric name.
pub const METRIC_FEED_FAILURES: &str = "feed_failures_total";
/// Producer restarts counter metric name.
pub const METRIC_PRODUCER_RESTARTS: &str = "producer_restarts_total";
/// Evaluations counter metric name.
pub const METRIC_EVALUATIONS: &str = "evaluations_total";
/// Proposals counter metric name.
pub const METRIC_PROPOSALS: &str = "proposals_total";
/// Orders sent counter metric name.
pub const METRIC_ORDERS_SENT: &str = "orders_sent_total";
/// Orders failed counter metric name.
pub const METRIC_ORDERS_FAILED: &str = "orders_failed_total";
/// Abandoned proposals counter metric name.
pub const METRIC_PROPOSALS_ABANDONED: &str = "proposals_abandoned_total";
/// Tradeable maturities gauge metric name.
pub const METRIC_TRADEABLE_MATURITIES: &str = "tradeable_maturities";

/// Initialize all metric descriptions.
/// Call this once at startup, after installing a recorder.
pub fn init_metrics() {
    describe_histogram!(
        METRIC_QUOTE_MESSAGE_LATENCY,
        "Quote message decode and apply latency in milliseconds"
    );
    describe_histogram!(
        METRIC_EVALUATION_LATENCY,
        "Rate computation and strategy latency in milliseconds"
    );
    describe_histogram!(
        METRIC_ORDER_SEND_LATENCY,
        "Order send latency in milliseconds"
    );
    describe_histogram!(
        METRIC_SPOT_FETCH_LATENCY,
        "Spot price pull latency in milliseconds"
    );

    describe_counter!(METRIC_QUOTE_MESSAGES, "Total quote messages received");
    describe_counter!(METRIC_QUOTES_APPLIED, "Total quote updates applied to the book");
    describe_counter!(METRIC_SPOT_REFRESHES, "Total spot cache replacements");
    describe_counter!(METRIC_FEED_FAILURES, "Total malformed feed payloads");
    describe_counter!(METRIC_PRODUCER_RESTARTS, "Total feed producer restarts");
    describe_counter!(METRIC_EVALUATIONS, "Total evaluation cycles run");
    describe_counter!(METRIC_PROPOSALS, "Total trade proposals emitted");
    describe_counter!(METRIC_ORDERS_SENT, "Total orders sent");
    describe_counter!(METRIC_ORDERS_FAILED, "Total orders that failed");
    describe_counter!(
        METRIC_PROPOSALS_ABANDONED,
        "Total proposals abandoned after a trading error"
    );

    describe_gauge!(
        METRIC_TRADEABLE_MATURITIES,
        "Number of maturities with at least two underliers"
    );

    debug!("Metrics initialized");
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// Record quote message processing latency.
pub fn record_quote_message_latency(start: Instant) {
    histogram!(METRIC_QUOTE_MESSAGE_LATENCY).record(elapsed_ms(start));
}

/// Record evaluation cycle latency.
pub fn record_evaluation_latency(start: Instant) {
    histogram!(METRIC_EVALUATION_LATENCY).record(elapsed_ms(start));
}

/// Record order send latency.
pub fn record_order_send_latency(start: Instant) {
    histogram!(METRIC_ORDER_SEND_LATENCY).record(elapsed_ms(start));
}

/// Record spot pull latency.
pub fn record_spot_fetch_latency(start: Instant) {
    histogram!(METRIC_SPOT_FETCH_LATENCY).record(elapsed_ms(start));
}

/// Increment quote messages counter.
pub fn inc_quote_messages() {
    counter!(METRIC_QUOTE_MESSAGES).increment(1);
}

/// Increment applied quotes counter.
pub fn inc_quotes_applied() {
    counter!(METRIC_QUOTES_APPLIED).increment(1);
}

/// Increment spot refreshes counter.
pub fn inc_spot_refreshes() {
    counter!(METRIC_SPOT_REFRESHES).increment(1);
}

/// Increment malformed payload counter for a feed.
pub fn inc_feed_failures(feed: &'static str) {
    counter!(METRIC_FEED_FAILURES, "feed" => feed).increment(1);
}

/// Increment producer restarts counter for a feed.
pub fn inc_producer_restarts(feed: &'static str) {
    counter!(METRIC_PRODUCER_RESTARTS, "feed" => feed).increment(1);
}

/// Increment evaluations counter.
pub fn inc_evaluations() {
    counter!(METRIC_EVALUATIONS).increment(1);
}

/// Increment proposals counter.
pub fn inc_proposals() {
    counter!(METRIC_PROPOSALS).increment(1);
}

/// Increment orders sent counter.
pub fn inc_orders_sent(side: &'static str) {
    counter!(METRIC_ORDERS_SENT, "side" => side).increment(1);
}

/// Increment orders failed counter.
pub fn inc_orders_failed() {
    counter!(METRIC_ORDERS_FAILED).increment(1);
}

/// Increment abandoned proposals counter.
pub fn inc_proposals_abandoned() {
    counter!(METRIC_PROPOSALS_ABANDONED).increment(1);
}

/// Set the tradeable maturities gauge.
pub fn set_tradeable_maturities(count: usize) {
    gauge!(METRIC_TRADEABLE_MATURITIES).set(count as f64);
}

/// RAII guard for timing operations.
/// Records latency when dropped.
pub struct LatencyTimer {
    start: Instant,
    metric_name: &'static str,
}

impl LatencyTimer {
    /// Create a new latency timer for the given metric.
    pub fn new(metric_name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            metric_name,
        }
    }

    /// Elapsed time in milliseconds, without recording.
    pub fn elapsed_ms(&self) -> f64 {
        elapsed_ms(self.start)
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        histogram!(self.metric_name).record(elapsed_ms(self.start));
    }
}

/// Create a latency timer for one evaluation cycle.
pub fn timer_evaluation() -> LatencyTimer {
    LatencyTimer::new(METRIC_EVALUATION_LATENCY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn latency_timer_measures_time() {
        let timer = LatencyTimer::new("test_metric");
        sleep(Duration::from_millis(10));
        assert!(timer.elapsed_ms() >= 9.0);
    }

    #[test]
    fn helpers_do_not_panic_without_recorder() {
        inc_feed_failures("quote");
        inc_orders_sent("BUY");
        set_tradeable_maturities(3);
        record_evaluation_latency(Instant::now());
    }
}

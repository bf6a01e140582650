//! Periodic spot price pull.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::try_join_all;
use serde::Deserialize;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use super::cache::SpotPriceCache;
use crate::error::FeedError;
use crate::instrument::spot_symbol;
use crate::metrics;
use crate::utils::FailureStreak;

/// Feed name used in logs and metrics.
pub const SPOT_FEED: &str = "spot";

/// Source of last traded prices for underliers.
pub trait SpotSource: Send + Sync {
    /// Fetch the last price of every given root ticker, keyed by root ticker.
    fn fetch(
        &self,
        underliers: &[String],
    ) -> impl Future<Output = Result<HashMap<String, f64>, FeedError>> + Send;
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    #[serde(rename = "regularMarketPrice")]
    regular_market_price: Option<f64>,
}

/// Extract the last price from a chart payload.
pub fn parse_chart_price(symbol: &str, body: &str) -> Result<f64, FeedError> {
    let malformed = |reason: &str| FeedError::MalformedSpotPayload(format!("{}: {}", symbol, reason));

    let response: ChartResponse =
        serde_json::from_str(body).map_err(|e| malformed(&e.to_string()))?;

    let price = response
        .chart
        .result
        .and_then(|results| results.into_iter().next())
        .and_then(|result| result.meta.regular_market_price)
        .ok_or_else(|| malformed("missing regularMarketPrice"))?;

    if !price.is_finite() || price <= 0.0 {
        return Err(malformed(&format!("unusable price {}", price)));
    }

    Ok(price)
}

/// Yahoo Finance chart endpoint.
#[derive(Debug, Clone)]
pub struct YahooSpotSource {
    http: reqwest::Client,
    base_url: String,
}

impl YahooSpotSource {
    /// Create a source over an existing HTTP client.
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    #[instrument(skip(self), level = "debug")]
    async fn fetch_one(&self, root: &str) -> Result<(String, f64), FeedError> {
        let symbol = spot_symbol(root);
        let url = format!("{}/v8/finance/chart/{}", self.base_url, symbol);

        let response = self
            .http
            .get(&url)
            .query(&[("range", "1d"), ("interval", "1d")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::MalformedSpotPayload(format!(
                "{}: HTTP {}",
                symbol, status
            )));
        }

        let body = response.text().await?;
        let price = parse_chart_price(&symbol, &body)?;
        debug!(root, symbol = %symbol, price, "Spot price fetched");

        Ok((root.to_string(), price))
    }
}

impl SpotSource for YahooSpotSource {
    async fn fetch(&self, underliers: &[String]) -> Result<HashMap<String, f64>, FeedError> {
        let prices = try_join_all(underliers.iter().map(|root| self.fetch_one(root))).await?;
        Ok(prices.into_iter().collect())
    }
}

/// Pull spot prices every `period` into the cache until shutdown or failure.
///
/// Malformed payloads are dropped; [`crate::utils::MAX_CONSECUTIVE_FAILURES`]
/// in a row end the feed with [`FeedError::TooManyFailures`]. Transport errors
/// end it immediately.
pub async fn run_spot_feed<S: SpotSource>(
    source: &S,
    cache: &SpotPriceCache,
    underliers: &[String],
    period: Duration,
    running: Arc<AtomicBool>,
) -> Result<(), FeedError> {
    info!(underliers = ?underliers, period_ms = period.as_millis() as u64, "Spot feed started");

    let mut streak = FailureStreak::default();
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if !running.load(Ordering::SeqCst) {
            break;
        }

        let start = Instant::now();
        match source.fetch(underliers).await {
            Ok(prices) => {
                streak.reset();
                metrics::record_spot_fetch_latency(start);
                if cache.refresh(prices) {
                    metrics::inc_spot_refreshes();
                }
            }
            Err(e) if e.is_malformed() => {
                metrics::inc_feed_failures(SPOT_FEED);
                warn!(error = %e, streak = streak.count() + 1, "Dropping malformed spot payload");
                if streak.fail() {
                    return Err(FeedError::TooManyFailures {
                        feed: SPOT_FEED,
                        count: streak.count(),
                    });
                }
            }
            Err(e) => return Err(e),
        }
    }

    info!("Spot feed stopping");
    Ok(())
}

//! WebSocket session for the venue market data feed.
//!
//! Features:
//! - Token-authenticated connection and level-1 bid/offer subscription
//! - One [`QuoteUpdate`] per `Md` message, applied atomically to the book
//! - Consecutive malformed message limit

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Deserializer, Serialize};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, instrument, warn};

use super::book::MarketDataBook;
use super::types::{Quote, QuoteUpdate, TopOfBook};
use crate::error::FeedError;
use crate::metrics;
use crate::utils::FailureStreak;

/// Feed name used in logs and metrics.
pub const QUOTE_FEED: &str = "quote";

/// How often an idle session re-checks the running flag.
const RUNNING_CHECK_INTERVAL: Duration = Duration::from_millis(500);

/// Price level from the venue.
#[derive(Debug, Clone, Deserialize)]
pub struct WsEntry {
    /// Level price.
    pub price: Option<f64>,
    /// Level size.
    pub size: Option<f64>,
}

/// Bid/offer payload of an `Md` message.
///
/// The outer `Option` tells whether the key was present at all; the inner
/// one is `None` for an explicit `null`.
#[derive(Debug, Clone, Deserialize)]
pub struct WsMarketData {
    /// Bids.
    #[serde(rename = "BI", default, deserialize_with = "present")]
    pub bids: Option<Option<Vec<WsEntry>>>,
    /// Offers.
    #[serde(rename = "OF", default, deserialize_with = "present")]
    pub offers: Option<Option<Vec<WsEntry>>>,
}

/// Instrument identity in a market data message.
#[derive(Debug, Clone, Deserialize)]
pub struct WsInstrumentId {
    /// Market identifier.
    #[serde(rename = "marketId")]
    pub market_id: Option<String>,
    /// Instrument symbol.
    pub symbol: Option<String>,
}

/// Inbound WebSocket message.
#[derive(Debug, Clone, Deserialize)]
pub struct WsMessage {
    /// Message type, `Md` for market data.
    #[serde(rename = "type")]
    pub msg_type: Option<String>,
    /// Instrument the data refers to.
    #[serde(rename = "instrumentId")]
    pub instrument_id: Option<WsInstrumentId>,
    /// Bid/offer payload.
    #[serde(rename = "marketData")]
    pub market_data: Option<WsMarketData>,
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Subscription product.
#[derive(Debug, Serialize)]
struct SubscribeProduct<'a> {
    symbol: &'a str,
    #[serde(rename = "marketId")]
    market_id: &'a str,
}

/// Market data subscription message.
#[derive(Debug, Serialize)]
struct SubscribeMessage<'a> {
    #[serde(rename = "type")]
    msg_type: &'static str,
    level: u8,
    entries: [&'static str; 2],
    products: Vec<SubscribeProduct<'a>>,
    depth: u8,
}

impl<'a> SubscribeMessage<'a> {
    fn top_of_book(symbols: &'a [String], market_id: &'a str) -> Self {
        Self {
            msg_type: "smd",
            level: 1,
            entries: ["BI", "OF"],
            products: symbols
                .iter()
                .map(|symbol| SubscribeProduct { symbol, market_id })
                .collect(),
            depth: 1,
        }
    }
}

/// Decode one text frame.
///
/// Returns `Ok(None)` for messages that are not market data.
pub fn parse_market_data(text: &str) -> Result<Option<QuoteUpdate>, FeedError> {
    let message: WsMessage = serde_json::from_str(text)
        .map_err(|e| FeedError::MalformedQuoteMessage(format!("invalid json: {}", e)))?;

    if message.msg_type.as_deref() != Some("Md") {
        return Ok(None);
    }

    let symbol = message
        .instrument_id
        .and_then(|id| id.symbol)
        .ok_or_else(|| FeedError::MalformedQuoteMessage("missing instrument symbol".into()))?;
    let market_data = message
        .market_data
        .ok_or_else(|| FeedError::MalformedQuoteMessage(format!("{}: missing marketData", symbol)))?;

    Ok(Some(QuoteUpdate {
        bid: decode_side(&symbol, market_data.bids)?,
        ask: decode_side(&symbol, market_data.offers)?,
        symbol,
    }))
}

fn decode_side(
    symbol: &str,
    side: Option<Option<Vec<WsEntry>>>,
) -> Result<Option<TopOfBook>, FeedError> {
    let Some(levels) = side else {
        return Ok(None);
    };

    let Some(entry) = levels.and_then(|levels| levels.into_iter().next()) else {
        return Ok(Some(TopOfBook::Empty));
    };

    match (entry.price, entry.size) {
        (Some(price), Some(size)) if price.is_finite() && size.is_finite() && size >= 0.0 => {
            Ok(Some(TopOfBook::Entry(Quote::new(price, size as u64))))
        }
        _ => Err(FeedError::MalformedQuoteMessage(format!(
            "{}: entry without usable price/size",
            symbol
        ))),
    }
}

/// Venue market data session feeding the shared book.
pub struct QuoteFeed {
    ws_url: String,
    auth_token: String,
    market_id: String,
    book: Arc<MarketDataBook>,
    running: Arc<AtomicBool>,
}

impl QuoteFeed {
    /// Create a new feed.
    pub fn new(
        ws_url: impl Into<String>,
        auth_token: impl Into<String>,
        market_id: impl Into<String>,
        book: Arc<MarketDataBook>,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            ws_url: ws_url.into(),
            auth_token: auth_token.into(),
            market_id: market_id.into(),
            book,
            running,
        }
    }

    /// Apply one text frame to the book.
    ///
    /// Returns whether an update was applied.
    pub fn process_message(&self, text: &str) -> Result<bool, FeedError> {
        let start = Instant::now();
        metrics::inc_quote_messages();

        let applied = match parse_market_data(text)? {
            Some(update) => {
                self.book.apply_update(&update);
                metrics::inc_quotes_applied();
                true
            }
            None => false,
        };

        metrics::record_quote_message_latency(start);
        Ok(applied)
    }

    /// Connect, subscribe and apply updates until shutdown or failure.
    ///
    /// Returns `Ok(())` only when the running flag is cleared.
    #[instrument(skip(self, symbols), fields(url = %self.ws_url, symbols = symbols.len()))]
    pub async fn run(&self, symbols: &[String]) -> Result<(), FeedError> {
        let mut request = self
            .ws_url
            .as_str()
            .into_client_request()
            .map_err(|e| FeedError::ConnectionFailed(e.to_string()))?;
        let token = HeaderValue::from_str(&self.auth_token)
            .map_err(|e| FeedError::ConnectionFailed(format!("invalid auth token: {}", e)))?;
        request.headers_mut().insert("X-Auth-Token", token);

        info!("Connecting to market data WebSocket");

        let (ws_stream, _) = connect_async(request)
            .await
            .map_err(|e| FeedError::ConnectionFailed(e.to_string()))?;
        let (mut write, mut read) = ws_stream.split();

        let subscribe = SubscribeMessage::top_of_book(symbols, &self.market_id);
        let msg_json =
            serde_json::to_string(&subscribe).map_err(|e| FeedError::SendFailed(e.to_string()))?;
        write
            .send(Message::Text(msg_json))
            .await
            .map_err(|e| FeedError::SendFailed(e.to_string()))?;

        info!("Subscribed to {} instruments", symbols.len());

        let mut streak = FailureStreak::default();

        while self.running.load(Ordering::SeqCst) {
            let next = match tokio::time::timeout(RUNNING_CHECK_INTERVAL, read.next()).await {
                Ok(next) => next,
                Err(_) => continue,
            };

            match next {
                Some(Ok(Message::Text(text))) => match self.process_message(&text) {
                    Ok(_) => streak.reset(),
                    Err(e) if e.is_malformed() => {
                        metrics::inc_feed_failures(QUOTE_FEED);
                        warn!(error = %e, streak = streak.count() + 1, "Dropping malformed quote message");
                        if streak.fail() {
                            return Err(FeedError::TooManyFailures {
                                feed: QUOTE_FEED,
                                count: streak.count(),
                            });
                        }
                    }
                    Err(e) => return Err(e),
                },
                Some(Ok(Message::Ping(_))) => debug!("Received ping"),
                Some(Ok(Message::Close(frame))) => {
                    warn!(frame = ?frame, "WebSocket closed");
                    return Err(FeedError::ConnectionClosed {
                        code: frame.as_ref().map(|f| u16::from(f.code)),
                        reason: frame.map(|f| f.reason.to_string()).unwrap_or_default(),
                    });
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    error!(error = %e, "WebSocket error");
                    return Err(FeedError::Tungstenite(e));
                }
                None => {
                    return Err(FeedError::ConnectionClosed {
                        code: None,
                        reason: "stream ended".to_string(),
                    });
                }
            }
        }

        info!("Quote feed stopping");
        let _ = write.send(Message::Close(None)).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orderbook::types::QuoteSide;

    #[test]
    fn parses_both_sides() {
        let text = r#"{
            "type": "Md",
            "instrumentId": {"marketId": "ROFX", "symbol": "GGAL/DIC23"},
            "marketData": {
                "BI": [{"price": 110.5, "size": 10}],
                "OF": [{"price": 115.0, "size": 7}]
            }
        }"#;

        let update = parse_market_data(text).unwrap().unwrap();
        assert_eq!(update.symbol, "GGAL/DIC23");
        assert_eq!(update.bid, Some(TopOfBook::Entry(Quote::new(110.5, 10))));
        assert_eq!(update.ask, Some(TopOfBook::Entry(Quote::new(115.0, 7))));
    }

    #[test]
    fn empty_or_null_side_is_explicit_empty() {
        let text = r#"{
            "type": "Md",
            "instrumentId": {"symbol": "X"},
            "marketData": {"BI": null, "OF": []}
        }"#;

        let update = parse_market_data(text).unwrap().unwrap();
        assert_eq!(update.bid, Some(TopOfBook::Empty));
        assert_eq!(update.ask, Some(TopOfBook::Empty));
    }

    #[test]
    fn absent_side_is_unchanged() {
        let text = r#"{
            "type": "Md",
            "instrumentId": {"symbol": "X"},
            "marketData": {"OF": [{"price": 100.0, "size": 5}]}
        }"#;

        let update = parse_market_data(text).unwrap().unwrap();
        assert_eq!(update.bid, None);
        assert_eq!(update.ask, Some(TopOfBook::Entry(Quote::new(100.0, 5))));
    }

    #[test]
    fn non_market_data_messages_are_ignored() {
        assert!(parse_market_data(r#"{"type": "or", "orderReport": {}}"#)
            .unwrap()
            .is_none());
    }

    #[test]
    fn missing_fields_are_malformed() {
        let cases = [
            "not json",
            r#"{"type": "Md", "marketData": {}}"#,
            r#"{"type": "Md", "instrumentId": {"marketId": "ROFX"}, "marketData": {}}"#,
            r#"{"type": "Md", "instrumentId": {"symbol": "X"}}"#,
            r#"{"type": "Md", "instrumentId": {"symbol": "X"}, "marketData": {"BI": [{"size": 1}]}}"#,
        ];

        for text in cases {
            assert!(
                matches!(
                    parse_market_data(text),
                    Err(FeedError::MalformedQuoteMessage(_))
                ),
                "{text}"
            );
        }
    }

    #[test]
    fn subscribe_message_shape() {
        let symbols = vec!["GGAL/DIC23".to_string()];
        let json = serde_json::to_value(SubscribeMessage::top_of_book(&symbols, "ROFX")).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "type": "smd",
                "level": 1,
                "entries": ["BI", "OF"],
                "products": [{"symbol": "GGAL/DIC23", "marketId": "ROFX"}],
                "depth": 1
            })
        );
    }

    #[test]
    fn process_message_applies_to_book() {
        let book = Arc::new(MarketDataBook::new());
        let feed = QuoteFeed::new(
            "wss://example.invalid",
            "token",
            "ROFX",
            Arc::clone(&book),
            Arc::new(AtomicBool::new(true)),
        );

        feed.process_message(
            r#"{"type":"Md","instrumentId":{"symbol":"X"},"marketData":{"OF":[{"price":101.0,"size":3}]}}"#,
        )
        .unwrap();
        assert_eq!(book.quote("X", QuoteSide::Ask), Some(Quote::new(101.0, 3)));

        assert!(feed.process_message("{}").is_ok());
        assert!(feed.process_message("garbage").is_err());
        assert_eq!(book.quote("X", QuoteSide::Ask), Some(Quote::new(101.0, 3)));
    }
}

//! Primary venue REST client.

use std::time::Duration;

use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::order::{OrderParams, OrderState, OrderStatus};
use crate::error::{BotError, TradingError};
use crate::instrument::{InstrumentList, VenueInstrument};

/// Header carrying the session token.
pub const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

/// Build the shared HTTP client.
pub fn build_http_client(timeout_ms: u64) -> Result<reqwest::Client, BotError> {
    let http = reqwest::Client::builder()
        .timeout(Duration::from_millis(timeout_ms))
        .connect_timeout(Duration::from_millis(timeout_ms.min(5_000)))
        .tcp_nodelay(true)
        .tcp_keepalive(Duration::from_secs(30))
        .pool_idle_timeout(Duration::from_secs(90))
        .build()?;
    Ok(http)
}

/// Derive the market data WebSocket URL from the REST base URL.
///
/// `https` becomes `wss`, `http` becomes `ws`; host, port and path are kept.
pub fn ws_url_from_rest(rest_url: &str) -> Result<String, url::ParseError> {
    let mut url = Url::parse(rest_url)?;
    let scheme = match url.scheme() {
        "https" => Some("wss"),
        "http" => Some("ws"),
        _ => None,
    };
    if let Some(scheme) = scheme {
        // special to special scheme, cannot fail
        let _ = url.set_scheme(scheme);
    }
    Ok(url.to_string())
}

/// Generic venue response envelope.
#[derive(Debug, Clone, Deserialize)]
struct VenueResponse<T> {
    status: Option<String>,
    message: Option<String>,
    description: Option<String>,
    order: Option<T>,
}

impl<T> VenueResponse<T> {
    fn is_ok(&self) -> bool {
        self.status.as_deref() == Some("OK")
    }

    fn error_text(&self) -> String {
        [self.message.as_deref(), self.description.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(": ")
    }
}

/// Acknowledgement of a new order.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderAck {
    /// Client order ID.
    #[serde(rename = "clientId")]
    pub client_id: String,
    /// Proprietary tag the order was routed under.
    pub proprietary: String,
}

/// Order report returned by the status query.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderReport {
    /// Client order ID.
    #[serde(rename = "clOrdId")]
    pub cl_ord_id: Option<String>,
    /// Venue status string.
    pub status: Option<String>,
    /// Filled quantity.
    #[serde(rename = "cumQty")]
    pub cum_qty: Option<f64>,
    /// Remaining quantity.
    #[serde(rename = "leavesQty")]
    pub leaves_qty: Option<f64>,
    /// Status text.
    pub text: Option<String>,
}

impl OrderReport {
    /// Convert into an [`OrderState`].
    pub fn into_state(self, order_id: &str) -> OrderState {
        let status = self.status.as_deref().and_then(|s| s.parse::<OrderStatus>().ok());
        if status.is_none() {
            warn!(order_id, status = ?self.status, "Unknown order status");
        }
        OrderState {
            order_id: order_id.to_string(),
            status,
            filled_size: self.cum_qty.and_then(|q| Decimal::try_from(q).ok()),
            remaining_size: self.leaves_qty.and_then(|q| Decimal::try_from(q).ok()),
            text: self.text,
        }
    }
}

/// Query pairs of a `newSingleOrder` request.
pub fn new_order_query(
    market_id: &str,
    account: &str,
    params: &OrderParams,
) -> Vec<(&'static str, String)> {
    vec![
        ("marketId", market_id.to_string()),
        ("symbol", params.symbol.clone()),
        ("price", params.price.to_string()),
        ("orderQty", params.size.to_string()),
        ("ordType", params.order_type.to_string()),
        ("side", params.side.to_string()),
        ("timeInForce", params.tif.to_string()),
        ("account", account.to_string()),
    ]
}

/// Authenticated session with the venue REST API.
#[derive(Debug)]
pub struct PrimaryClient {
    /// HTTP client for API requests.
    http: reqwest::Client,
    /// REST base URL.
    rest_url: String,
    /// Trading account.
    account: String,
    /// Market identifier (e.g. "ROFX").
    market_id: String,
    /// Session token.
    token: String,
    /// Proprietary tag per client order ID, needed for status queries.
    proprietary_by_order: DashMap<String, String>,
}

impl PrimaryClient {
    /// Authenticate and open a session.
    #[instrument(skip(http, password), fields(url = %rest_url, user = %user))]
    pub async fn connect(
        http: reqwest::Client,
        rest_url: &str,
        user: &str,
        password: &str,
        account: &str,
        market_id: &str,
    ) -> Result<Self, TradingError> {
        let rest_url = rest_url.trim_end_matches('/').to_string();
        let url = format!("{}/auth/getToken", rest_url);

        let response = http
            .post(&url)
            .header("X-Username", user)
            .header("X-Password", password)
            .send()
            .await
            .map_err(|e| TradingError::AuthenticationFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(TradingError::AuthenticationFailed(format!(
                "HTTP {}",
                response.status()
            )));
        }

        let token = response
            .headers()
            .get(AUTH_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                TradingError::AuthenticationFailed("no token in response headers".to_string())
            })?;

        info!("Authenticated with venue");

        Ok(Self {
            http,
            rest_url,
            account: account.to_string(),
            market_id: market_id.to_string(),
            token,
            proprietary_by_order: DashMap::new(),
        })
    }

    /// Session token, also used to authenticate the WebSocket.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Market identifier.
    pub fn market_id(&self) -> &str {
        &self.market_id
    }

    /// Fetch the detailed instrument list.
    #[instrument(skip(self))]
    pub async fn instruments_details(&self) -> Result<Vec<VenueInstrument>, BotError> {
        let url = format!("{}/rest/instruments/details", self.rest_url);

        let list: InstrumentList = self
            .http
            .get(&url)
            .header(AUTH_TOKEN_HEADER, &self.token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if list.status.as_deref().is_some_and(|s| s != "OK") {
            warn!(status = ?list.status, "Instrument list returned non-OK status");
        }

        debug!(count = list.instruments.len(), "Instrument details fetched");
        Ok(list.instruments)
    }

    /// Send a single order. Returns the client order ID.
    #[instrument(skip(self, params), fields(symbol = %params.symbol, side = %params.side))]
    pub async fn send_order(&self, params: &OrderParams) -> Result<String, TradingError> {
        params.validate().map_err(TradingError::InvalidParams)?;

        let transport_failure = |reason: String| TradingError::TransportFailure {
            symbol: params.symbol.clone(),
            reason,
        };

        let url = format!("{}/rest/order/newSingleOrder", self.rest_url);
        let query = new_order_query(&self.market_id, &self.account, params);

        let response = self
            .http
            .get(&url)
            .header(AUTH_TOKEN_HEADER, &self.token)
            .query(&query)
            .send()
            .await
            .map_err(|e| transport_failure(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(transport_failure(format!("HTTP {}", response.status())));
        }

        let body: VenueResponse<OrderAck> = response
            .json()
            .await
            .map_err(|e| transport_failure(format!("failed to parse response: {}", e)))?;

        if !body.is_ok() {
            return Err(TradingError::OrderRejected {
                reason: body.error_text(),
            });
        }

        let ack = body
            .order
            .ok_or_else(|| transport_failure("no order in response".to_string()))?;

        info!(
            client_id = %ack.client_id,
            price = %params.price,
            size = params.size,
            "Order sent"
        );

        self.proprietary_by_order
            .insert(ack.client_id.clone(), ack.proprietary);
        Ok(ack.client_id)
    }

    /// Query the status of an order sent in this session.
    #[instrument(skip(self))]
    pub async fn order_status(&self, order_id: &str) -> Result<OrderState, TradingError> {
        let status_failed = |reason: String| TradingError::StatusFailed {
            order_id: order_id.to_string(),
            reason,
        };

        let proprietary = self
            .proprietary_by_order
            .get(order_id)
            .map(|p| p.value().clone())
            .ok_or_else(|| status_failed("unknown order".to_string()))?;

        let url = format!("{}/rest/order/id", self.rest_url);
        let response = self
            .http
            .get(&url)
            .header(AUTH_TOKEN_HEADER, &self.token)
            .query(&[("clOrdId", order_id), ("proprietary", proprietary.as_str())])
            .send()
            .await
            .map_err(|e| status_failed(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(status_failed(format!("HTTP {}", response.status())));
        }

        let body: VenueResponse<OrderReport> = response
            .json()
            .await
            .map_err(|e| status_failed(format!("failed to parse response: {}", e)))?;

        if !body.is_ok() {
            return Err(status_failed(body.error_text()));
        }

        let report = body
            .order
            .ok_or_else(|| status_failed("no order in response".to_string()))?;
        Ok(report.into_state(order_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn new_order_query_uses_venue_casing() {
        let params = OrderParams::sell("PAMP/FEB22", dec!(120.5), 10);

        let query = new_order_query("ROFX", "REM1234", &params);

        assert_eq!(
            query,
            vec![
                ("marketId", "ROFX".to_string()),
                ("symbol", "PAMP/FEB22".to_string()),
                ("price", "120.5".to_string()),
                ("orderQty", "10".to_string()),
                ("ordType", "LIMIT".to_string()),
                ("side", "SELL".to_string()),
                ("timeInForce", "IOC".to_string()),
                ("account", "REM1234".to_string()),
            ]
        );
    }

    #[test]
    fn ws_url_is_derived_from_rest_url() {
        assert_eq!(
            ws_url_from_rest("https://api.remarkets.primary.com.ar/").unwrap(),
            "wss://api.remarkets.primary.com.ar/"
        );
        assert_eq!(
            ws_url_from_rest("http://localhost:8081").unwrap(),
            "ws://localhost:8081/"
        );
        assert!(ws_url_from_rest("not a url").is_err());
    }

    #[test]
    fn new_order_response_parses() {
        let json = r#"{"status":"OK","order":{"clientId":"348229582812371","proprietary":"PBCP"}}"#;
        let body: VenueResponse<OrderAck> = serde_json::from_str(json).unwrap();

        assert!(body.is_ok());
        let ack = body.order.unwrap();
        assert_eq!(ack.client_id, "348229582812371");
        assert_eq!(ack.proprietary, "PBCP");
    }

    #[test]
    fn error_response_text() {
        let json = r#"{"status":"ERROR","message":"Invalid price","description":"price out of band"}"#;
        let body: VenueResponse<OrderAck> = serde_json::from_str(json).unwrap();

        assert!(!body.is_ok());
        assert_eq!(body.error_text(), "Invalid price: price out of band");
    }

    #[test]
    fn order_report_converts_to_state() {
        let json = r#"{"status":"OK","order":{"clOrdId":"1","status":"PARTIALLY_FILLED","cumQty":4,"leavesQty":6,"text":"partial"}}"#;
        let body: VenueResponse<OrderReport> = serde_json::from_str(json).unwrap();
        let state = body.order.unwrap().into_state("1");

        assert_eq!(state.status, Some(OrderStatus::PartiallyFilled));
        assert_eq!(state.filled_size, Some(dec!(4)));
        assert_eq!(state.remaining_size, Some(dec!(6)));
        assert!(!state.is_terminal());
    }

    #[test]
    fn unknown_status_is_none() {
        let report = OrderReport {
            cl_ord_id: None,
            status: Some("SOMETHING_NEW".to_string()),
            cum_qty: None,
            leaves_qty: None,
            text: None,
        };
        assert_eq!(report.into_state("1").status, None);
    }
}

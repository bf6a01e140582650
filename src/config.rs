//! Application configuration loaded from environment variables.

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::trading::ws_url_from_rest;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // === Venue Credentials ===
    /// Venue user name.
    #[serde(default)]
    pub primary_user: String,

    /// Venue password.
    #[serde(default)]
    pub primary_password: String,

    /// Trading account orders are booked to.
    #[serde(default)]
    pub primary_account: String,

    // === Venue Endpoints ===
    /// REST API base URL.
    #[serde(default = "default_rest_url")]
    pub primary_rest_url: String,

    /// Market data WebSocket URL (derived from the REST URL when unset).
    #[serde(default)]
    pub primary_ws_url: Option<String>,

    /// Market identifier sent with subscriptions and orders.
    #[serde(default = "default_market_id")]
    pub market_id: String,

    // === Instruments ===
    /// Underlier root tickers to trade (comma separated).
    #[serde(default = "default_root_tickers")]
    pub root_tickers: Vec<String>,

    // === Strategy ===
    /// Minimum rate spread, as a fraction, for a trade to be proposed.
    #[serde(default = "default_transaction_cost")]
    pub transaction_cost: Decimal,

    // === Spot Source ===
    /// Spot quote endpoint base URL.
    #[serde(default = "default_spot_url")]
    pub spot_url: String,

    /// Milliseconds between spot pulls.
    #[serde(default = "default_spot_refresh_ms")]
    pub spot_refresh_ms: u64,

    // === Loop Timing ===
    /// Milliseconds between staleness checks.
    #[serde(default = "default_eval_poll_ms")]
    pub eval_poll_ms: u64,

    /// Milliseconds to wait after sending before checking order status.
    #[serde(default = "default_order_status_delay_ms")]
    pub order_status_delay_ms: u64,

    /// Feed restarts allowed before the bot shuts down.
    #[serde(default = "default_max_producer_restarts")]
    pub max_producer_restarts: u32,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_http_timeout_ms")]
    pub http_timeout_ms: u64,

    // === Operation Modes ===
    /// Simulation mode (no real orders).
    #[serde(default = "default_true")]
    pub dry_run: bool,

    /// Print the rate table after each evaluation.
    #[serde(default = "default_true")]
    pub show_rates: bool,

    // === Server Configuration ===
    /// HTTP server port for health/metrics endpoints.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub rust_log: String,

    /// Enable verbose logging.
    #[serde(default)]
    pub verbose: bool,
}

fn default_rest_url() -> String {
    "https://api.remarkets.primary.com.ar/".to_string()
}

fn default_market_id() -> String {
    "ROFX".to_string()
}

fn default_root_tickers() -> Vec<String> {
    ["PAMP", "YPFD", "GGAL", "DLR"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_transaction_cost() -> Decimal {
    Decimal::new(1, 2) // 0.01
}

fn default_spot_url() -> String {
    "https://query1.finance.yahoo.com".to_string()
}

fn default_spot_refresh_ms() -> u64 {
    500
}

fn default_eval_poll_ms() -> u64 {
    100
}

fn default_order_status_delay_ms() -> u64 {
    500
}

fn default_max_producer_restarts() -> u32 {
    5
}

fn default_http_timeout_ms() -> u64 {
    5_000
}

fn default_true() -> bool {
    true
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from environment, reading .env file first.
    pub fn load() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Check if the configuration is valid.
    pub fn validate(&self) -> Result<(), String> {
        if self.primary_user.is_empty() || self.primary_password.is_empty() {
            return Err("PRIMARY_USER and PRIMARY_PASSWORD are required".to_string());
        }

        if !self.dry_run && self.primary_account.is_empty() {
            return Err("PRIMARY_ACCOUNT is required when DRY_RUN=false".to_string());
        }

        if self.root_tickers.iter().all(|t| t.trim().is_empty()) {
            return Err("ROOT_TICKERS must name at least one underlier".to_string());
        }

        if self.transaction_cost < Decimal::ZERO {
            return Err("TRANSACTION_COST must not be negative".to_string());
        }

        if self.spot_refresh_ms == 0 || self.eval_poll_ms == 0 {
            return Err("SPOT_REFRESH_MS and EVAL_POLL_MS must be positive".to_string());
        }

        self.ws_url()
            .map_err(|e| format!("invalid PRIMARY_REST_URL/PRIMARY_WS_URL: {}", e))?;

        Ok(())
    }

    /// Root tickers, trimmed, without empty entries.
    pub fn roots(&self) -> Vec<String> {
        self.root_tickers
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect()
    }

    /// Market data WebSocket URL.
    pub fn ws_url(&self) -> Result<String, url::ParseError> {
        match &self.primary_ws_url {
            Some(url) => url::Url::parse(url).map(|u| u.to_string()),
            None => ws_url_from_rest(&self.primary_rest_url),
        }
    }
}

//! HTTP API handlers.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::arbitrage::ExecutorStats;
use crate::instrument::MaturityKey;
use crate::rates::ImplicitRates;

/// Application state shared with handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Whether the bot is ready to trade.
    pub ready: Arc<AtomicBool>,
    /// Whether orders are simulated.
    pub dry_run: bool,
    /// Tradeable maturities from the catalog.
    pub maturities: Arc<RwLock<Vec<MaturityKey>>>,
    /// Rates from the latest evaluation.
    pub rates: Arc<RwLock<ImplicitRates>>,
    /// Executor stats.
    pub stats: Arc<RwLock<ExecutorStats>>,
    /// Evaluation cycles run.
    pub evaluations: Arc<AtomicU64>,
    /// Watermark of the latest evaluation.
    pub last_evaluated_at: Arc<RwLock<Option<OffsetDateTime>>>,
    /// Prometheus recorder handle, when one is installed.
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Create new app state.
    pub fn new(dry_run: bool) -> Self {
        Self {
            ready: Arc::new(AtomicBool::new(false)),
            dry_run,
            maturities: Arc::new(RwLock::new(Vec::new())),
            rates: Arc::new(RwLock::new(ImplicitRates::default())),
            stats: Arc::new(RwLock::new(ExecutorStats::default())),
            evaluations: Arc::new(AtomicU64::new(0)),
            last_evaluated_at: Arc::new(RwLock::new(None)),
            metrics: None,
        }
    }

    /// Attach a Prometheus handle for `/metrics`.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Set ready state.
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Check if ready.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// Publish the outcome of one evaluation cycle.
    pub async fn publish_evaluation(
        &self,
        rates: ImplicitRates,
        stats: ExecutorStats,
        evaluated_at: Option<OffsetDateTime>,
    ) {
        self.evaluations.fetch_add(1, Ordering::Relaxed);
        *self.rates.write().await = rates;
        *self.stats.write().await = stats;
        *self.last_evaluated_at.write().await = evaluated_at;
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Status: "ok".
    pub status: &'static str,
}

/// Readiness check response.
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    /// Whether service is ready.
    pub ready: bool,
    /// Number of tradeable maturities.
    pub tradeable_maturities: usize,
}

/// Status response.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Service status.
    pub status: &'static str,
    /// "paper" or "live".
    pub mode: &'static str,
    /// Tradeable maturities.
    pub maturities: Vec<MaturityKey>,
    /// Evaluation cycles run.
    pub evaluations: u64,
    /// RFC 3339 watermark of the latest evaluation.
    pub last_evaluated_at: Option<String>,
    /// Executor statistics.
    pub stats: ExecutorStats,
}

/// Health check handler - always returns 200.
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

/// Readiness check handler - returns 200 if ready, 503 otherwise.
pub async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    let is_ready = state.is_ready();
    let tradeable_maturities = state.maturities.read().await.len();

    let response = ReadyResponse {
        ready: is_ready,
        tradeable_maturities,
    };

    if is_ready {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}

/// Status handler - returns bot status and statistics.
pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let maturities = state.maturities.read().await.clone();
    let stats = *state.stats.read().await;
    let last_evaluated_at = state
        .last_evaluated_at
        .read()
        .await
        .and_then(|ts| ts.format(&time::format_description::well_known::Rfc3339).ok());

    let status = if state.is_ready() { "running" } else { "starting" };
    let mode = if state.dry_run { "paper" } else { "live" };

    Json(StatusResponse {
        status,
        mode,
        maturities,
        evaluations: state.evaluations.load(Ordering::Relaxed),
        last_evaluated_at,
        stats,
    })
}

/// Rates handler - returns the rate tables of the latest evaluation.
pub async fn rates(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.rates.read().await.clone())
}

/// Metrics handler - Prometheus text exposition.
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "metrics recorder not installed".to_string(),
        ),
    }
}

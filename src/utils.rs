//! Shared runtime helpers: shutdown signal, backoff, failure streaks.

use std::time::Duration;

use tracing::info;

/// Consecutive malformed payloads after which a feed gives up.
pub const MAX_CONSECUTIVE_FAILURES: u32 = 3;

/// Resolve on SIGINT (Ctrl+C) or, on unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

/// Exponential backoff for producer restarts.
#[derive(Debug, Clone)]
pub struct Backoff {
    /// Initial delay in milliseconds.
    pub initial_delay_ms: u64,
    /// Maximum delay in milliseconds.
    pub max_delay_ms: u64,
    /// Multiplier applied per attempt.
    pub multiplier: f64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1000,
            max_delay_ms: 30_000,
            multiplier: 2.0,
        }
    }
}

impl Backoff {
    /// Delay before restart number `attempt` (0-based).
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let delay_ms = self.initial_delay_ms as f64 * self.multiplier.powi(attempt as i32);
        let clamped_ms = delay_ms.min(self.max_delay_ms as f64) as u64;
        Duration::from_millis(clamped_ms)
    }
}

/// Counts consecutive malformed payloads for one feed.
#[derive(Debug, Clone)]
pub struct FailureStreak {
    count: u32,
    limit: u32,
}

impl Default for FailureStreak {
    fn default() -> Self {
        Self::new(MAX_CONSECUTIVE_FAILURES)
    }
}

impl FailureStreak {
    /// Create a streak counter that trips at `limit`.
    pub fn new(limit: u32) -> Self {
        Self { count: 0, limit }
    }

    /// Record a failure. Returns true once the limit is reached.
    pub fn fail(&mut self) -> bool {
        self.count = self.count.saturating_add(1);
        self.count >= self.limit
    }

    /// Record a success.
    pub fn reset(&mut self) {
        self.count = 0;
    }

    /// Current streak length.
    pub fn count(&self) -> u32 {
        self.count
    }
}

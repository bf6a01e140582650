//! Composition root: shared stores, feed producers and the evaluation loop.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use time::{Date, OffsetDateTime};
use tracing::{debug, error, info, warn};

use crate::api::AppState;
use crate::arbitrage::{evaluate, ProposalExecutor, TradeProposal};
use crate::config::Config;
use crate::error::{BotError, FeedError};
use crate::gate::StalenessGate;
use crate::instrument::{Catalog, MaturityKey};
use crate::metrics;
use crate::orderbook::websocket::QUOTE_FEED;
use crate::orderbook::{MarketDataBook, QuoteFeed};
use crate::rates::{compute_rates, render_rates, ImplicitRates};
use crate::spot::feed::SPOT_FEED;
use crate::spot::{run_spot_feed, SpotPriceCache, SpotSource};
use crate::trading::OrderTransport;
use crate::utils::Backoff;

/// Result of one evaluation cycle.
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// Rates computed from the snapshots.
    pub rates: ImplicitRates,
    /// Proposals emitted by the strategy.
    pub proposals: Vec<TradeProposal>,
    /// Watermark after this cycle.
    pub evaluated_at: Option<OffsetDateTime>,
}

/// Gate, rate engine and strategy over one pair of snapshots.
#[derive(Debug)]
pub struct Evaluator {
    catalog: Arc<Catalog>,
    maturities: BTreeSet<MaturityKey>,
    transaction_cost: Decimal,
    show_rates: bool,
    gate: StalenessGate,
}

impl Evaluator {
    /// Create an evaluator over the catalog's tradeable maturities.
    pub fn new(catalog: Arc<Catalog>, transaction_cost: Decimal, show_rates: bool) -> Self {
        let maturities = catalog.tradeable_maturities();
        metrics::set_tradeable_maturities(maturities.len());
        Self {
            catalog,
            maturities,
            transaction_cost,
            show_rates,
            gate: StalenessGate::new(),
        }
    }

    /// Tradeable maturities.
    pub fn maturities(&self) -> &BTreeSet<MaturityKey> {
        &self.maturities
    }

    /// Run one cycle if either store changed since the last one.
    ///
    /// Both snapshots are taken once and everything downstream reads only
    /// them; the watermark advances to their timestamps.
    pub fn poll(
        &mut self,
        book: &MarketDataBook,
        spot: &SpotPriceCache,
        today: Date,
    ) -> Option<Evaluation> {
        if !self.gate.is_stale(book.last_update(), spot.last_update()) {
            return None;
        }

        let timer = metrics::timer_evaluation();
        let book_snapshot = book.snapshot();
        let spot_snapshot = spot.snapshot();

        let rates = compute_rates(
            &book_snapshot.bids,
            &book_snapshot.asks,
            &spot_snapshot.prices,
            &self.catalog,
            &self.maturities,
            today,
        );

        if self.show_rates {
            println!("{}", render_rates(&rates));
        }

        let proposals = evaluate(
            &self.maturities,
            &rates,
            &book_snapshot.bids,
            &book_snapshot.asks,
            &spot_snapshot.prices,
            &self.catalog,
            self.transaction_cost,
        );

        let evaluated_at = self
            .gate
            .mark_evaluated(book_snapshot.updated_at, spot_snapshot.updated_at);

        metrics::inc_evaluations();
        for _ in &proposals {
            metrics::inc_proposals();
        }
        debug!(
            proposals = proposals.len(),
            elapsed_ms = timer.elapsed_ms(),
            "Evaluation complete"
        );

        Some(Evaluation {
            rates,
            proposals,
            evaluated_at,
        })
    }
}

/// Run a feed producer, restarting it with backoff when it stops with an
/// error.
///
/// Returns the number of restarts used. When `max_restarts` is exhausted
/// the running flag is cleared, which shuts the whole bot down.
pub async fn supervise<F, Fut>(
    feed: &'static str,
    mut start: F,
    backoff: Backoff,
    max_restarts: u32,
    running: Arc<AtomicBool>,
) -> u32
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), FeedError>>,
{
    let mut restarts = 0;

    loop {
        let result = start().await;
        if !running.load(Ordering::SeqCst) {
            return restarts;
        }

        match result {
            Ok(()) => return restarts,
            Err(e) if restarts >= max_restarts => {
                error!(feed, error = %e, restarts, "Producer failed too many times, shutting down");
                running.store(false, Ordering::SeqCst);
                return restarts;
            }
            Err(e) => {
                let delay = backoff.next_delay(restarts);
                restarts += 1;
                metrics::inc_producer_restarts(feed);
                warn!(
                    feed,
                    error = %e,
                    restart = restarts,
                    delay_ms = delay.as_millis() as u64,
                    "Producer stopped, restarting"
                );
                tokio::time::sleep(delay).await;
                if !running.load(Ordering::SeqCst) {
                    return restarts;
                }
            }
        }
    }
}

/// The running bot.
pub struct TradingBot<S, T> {
    catalog: Arc<Catalog>,
    book: Arc<MarketDataBook>,
    spot: Arc<SpotPriceCache>,
    running: Arc<AtomicBool>,
    quote_feed: Arc<QuoteFeed>,
    source: Arc<S>,
    executor: ProposalExecutor<T>,
    evaluator: Evaluator,
    state: AppState,
    spot_period: Duration,
    eval_period: Duration,
    max_producer_restarts: u32,
}

impl<S, T> TradingBot<S, T>
where
    S: SpotSource + 'static,
    T: OrderTransport + 'static,
{
    /// Wire the stores, feeds and executor together.
    pub fn new(
        config: &Config,
        catalog: Catalog,
        ws_url: String,
        auth_token: String,
        source: S,
        transport: T,
        state: AppState,
    ) -> Self {
        let catalog = Arc::new(catalog);
        let book = Arc::new(MarketDataBook::new());
        let running = Arc::new(AtomicBool::new(true));
        let quote_feed = Arc::new(QuoteFeed::new(
            ws_url,
            auth_token,
            config.market_id.clone(),
            Arc::clone(&book),
            Arc::clone(&running),
        ));

        Self {
            evaluator: Evaluator::new(
                Arc::clone(&catalog),
                config.transaction_cost,
                config.show_rates,
            ),
            catalog,
            book,
            spot: Arc::new(SpotPriceCache::new()),
            running,
            quote_feed,
            source: Arc::new(source),
            executor: ProposalExecutor::new(
                Arc::new(transport),
                Duration::from_millis(config.order_status_delay_ms),
            ),
            state,
            spot_period: Duration::from_millis(config.spot_refresh_ms),
            eval_period: Duration::from_millis(config.eval_poll_ms),
            max_producer_restarts: config.max_producer_restarts,
        }
    }

    /// Flag observed by every task; clear it to stop the bot.
    pub fn running(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Run until the running flag is cleared.
    pub async fn run(mut self) -> Result<(), BotError> {
        let symbols = Arc::new(self.catalog.tradeable_symbols());
        let underliers: Arc<Vec<String>> =
            Arc::new(self.catalog.tradeable_underliers().into_iter().collect());

        info!(
            instruments = symbols.len(),
            underliers = ?underliers,
            maturities = self.evaluator.maturities().len(),
            "Starting trading bot"
        );

        if symbols.is_empty() {
            warn!("No tradeable maturities, nothing to do");
            return Ok(());
        }

        *self.state.maturities.write().await =
            self.evaluator.maturities().iter().cloned().collect();

        let quote_task = {
            let feed = Arc::clone(&self.quote_feed);
            let symbols = Arc::clone(&symbols);
            tokio::spawn(supervise(
                QUOTE_FEED,
                move || {
                    let feed = Arc::clone(&feed);
                    let symbols = Arc::clone(&symbols);
                    async move { feed.run(&symbols).await }
                },
                Backoff::default(),
                self.max_producer_restarts,
                Arc::clone(&self.running),
            ))
        };

        let spot_task = {
            let source = Arc::clone(&self.source);
            let cache = Arc::clone(&self.spot);
            let underliers = Arc::clone(&underliers);
            let running = Arc::clone(&self.running);
            let period = self.spot_period;
            tokio::spawn(supervise(
                SPOT_FEED,
                move || {
                    let source = Arc::clone(&source);
                    let cache = Arc::clone(&cache);
                    let underliers = Arc::clone(&underliers);
                    let running = Arc::clone(&running);
                    async move { run_spot_feed(&*source, &cache, &underliers, period, running).await }
                },
                Backoff::default(),
                self.max_producer_restarts,
                Arc::clone(&self.running),
            ))
        };

        self.state.set_ready(true);
        self.evaluation_loop().await;
        self.state.set_ready(false);

        for (feed, task) in [(QUOTE_FEED, quote_task), (SPOT_FEED, spot_task)] {
            match task.await {
                Ok(restarts) => debug!(feed, restarts, "Producer finished"),
                Err(e) => error!(feed, error = %e, "Producer task panicked"),
            }
        }

        let stats = self.executor.stats();
        info!(
            proposals_seen = stats.proposals_seen,
            proposals_executed = stats.proposals_executed,
            proposals_abandoned = stats.proposals_abandoned,
            orders_sent = stats.orders_sent,
            "Trading bot stopped"
        );
        Ok(())
    }

    async fn evaluation_loop(&mut self) {
        let mut ticker = tokio::time::interval(self.eval_period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        while self.running.load(Ordering::SeqCst) {
            ticker.tick().await;

            let today = OffsetDateTime::now_utc().date();
            let Some(evaluation) = self.evaluator.poll(&self.book, &self.spot, today) else {
                continue;
            };

            for proposal in &evaluation.proposals {
                info!("\n{}", proposal);
                if let Err(e) = self.executor.execute(proposal).await {
                    debug!(error = %e, maturity = %proposal.maturity, "Proposal dropped");
                }
            }

            self.state
                .publish_evaluation(
                    evaluation.rates,
                    self.executor.stats(),
                    evaluation.evaluated_at,
                )
                .await;
        }
    }
}

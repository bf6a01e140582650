//! Implied-rate arbitrage bot entry point.

use std::net::SocketAddr;
use std::sync::atomic::Ordering;

use clap::{Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use rate_arb::api::{create_router, AppState};
use rate_arb::bot::TradingBot;
use rate_arb::config::Config;
use rate_arb::instrument::Catalog;
use rate_arb::metrics;
use rate_arb::spot::YahooSpotSource;
use rate_arb::trading::{build_http_client, PaperTransport, PrimaryClient, Transport};
use rate_arb::utils::shutdown_signal;

/// Implied-rate futures arbitrage bot.
#[derive(Parser, Debug)]
#[command(name = "rate-arb")]
#[command(about = "Cross-underlier implied rate arbitrage on futures")]
#[command(version)]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,

    /// Run in dry-run mode (no real orders).
    #[arg(long)]
    dry_run: Option<bool>,

    /// HTTP server port for health/metrics.
    #[arg(short, long)]
    port: Option<u16>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the trading bot (default).
    Run {
        /// Run in dry-run mode (no real orders).
        #[arg(long)]
        dry_run: Option<bool>,

        /// HTTP server port for health/metrics.
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Check configuration validity.
    CheckConfig,

    /// Log in, build the instrument catalog and print tradeable maturities.
    Catalog,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Initialize logging
    let filter = if args.verbose {
        EnvFilter::new("rate_arb=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match args.command {
        Some(Command::CheckConfig) => cmd_check_config(),
        Some(Command::Catalog) => cmd_catalog().await,
        Some(Command::Run { dry_run, port }) => cmd_run(dry_run, port).await,
        None => cmd_run(args.dry_run, args.port).await,
    }
}

fn load_config() -> anyhow::Result<Config> {
    let config = Config::load().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return Err(anyhow::anyhow!("Configuration validation failed: {}", e));
    }

    Ok(config)
}

/// Check configuration validity.
fn cmd_check_config() -> anyhow::Result<()> {
    println!("======================================================================");
    println!("RATE ARB BOT - CONFIGURATION CHECK");
    println!("======================================================================");

    print!("Loading configuration... ");
    let config = match Config::load() {
        Ok(c) => {
            println!("OK");
            c
        }
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration load failed"));
        }
    };

    print!("Validating configuration... ");
    match config.validate() {
        Ok(()) => println!("OK"),
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration validation failed"));
        }
    }

    println!("----------------------------------------------------------------------");
    println!("Configuration Summary:");
    println!("  REST URL: {}", config.primary_rest_url);
    println!("  WebSocket URL: {}", config.ws_url()?);
    println!("  Market: {}", config.market_id);
    println!("  Account: {}", config.primary_account);
    println!("  Root tickers: {}", config.roots().join(", "));
    println!("  Transaction cost: {}", config.transaction_cost);
    println!("  Spot URL: {} (every {}ms)", config.spot_url, config.spot_refresh_ms);
    println!("  Dry Run: {}", config.dry_run);
    println!("======================================================================");
    println!("CONFIGURATION CHECK PASSED");
    println!("======================================================================");

    Ok(())
}

async fn connect(config: &Config) -> anyhow::Result<(PrimaryClient, Catalog)> {
    let http = build_http_client(config.http_timeout_ms)?;
    let client = PrimaryClient::connect(
        http,
        &config.primary_rest_url,
        &config.primary_user,
        &config.primary_password,
        &config.primary_account,
        &config.market_id,
    )
    .await?;

    let instruments = client.instruments_details().await?;
    let catalog = Catalog::build(&config.roots(), &instruments)?;
    info!(
        instruments = instruments.len(),
        contracts = catalog.len(),
        "Instrument catalog built"
    );

    Ok((client, catalog))
}

/// Print the catalog grouped by maturity.
async fn cmd_catalog() -> anyhow::Result<()> {
    let config = load_config()?;
    let (_client, catalog) = connect(&config).await?;

    let tradeable = catalog.tradeable_maturities();
    println!("======================================================================");
    println!("TRADEABLE MATURITIES ({})", tradeable.len());
    println!("======================================================================");
    for maturity in &tradeable {
        println!("{}", maturity);
        for contract in catalog.contracts_for_maturity(maturity) {
            println!(
                "  {:<14} underlier={:<6} expires={} multiplier={}",
                contract.symbol(),
                contract.underlier(),
                contract.maturity(),
                contract.multiplier()
            );
        }
    }

    Ok(())
}

/// Run the trading bot.
async fn cmd_run(dry_run_override: Option<bool>, port_override: Option<u16>) -> anyhow::Result<()> {
    info!("Loading configuration...");
    let mut config = load_config()?;

    // Override with CLI args if provided
    if let Some(dry_run) = dry_run_override {
        config.dry_run = dry_run;
    }
    if let Some(port) = port_override {
        config.port = port;
    }

    info!("Configuration loaded successfully");
    info!("Mode: {}", if config.dry_run { "SIMULATION" } else { "LIVE TRADING" });
    info!("Root tickers: {}", config.roots().join(", "));
    info!("Transaction cost: {}", config.transaction_cost);

    // Initialize metrics
    let handle = PrometheusBuilder::new().install_recorder()?;
    metrics::init_metrics();

    let app_state = AppState::new(config.dry_run).with_metrics(handle);

    // Start HTTP server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);

    let router = create_router(app_state.clone());
    let _server_handle = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
    });

    let (client, catalog) = connect(&config).await?;
    let token = client.token().to_string();
    let ws_url = config.ws_url()?;

    let transport = if config.dry_run {
        Transport::Paper(PaperTransport::new())
    } else {
        Transport::Live(client)
    };

    let spot_http = build_http_client(config.http_timeout_ms)?;
    let source = YahooSpotSource::new(spot_http, config.spot_url.clone());

    let bot = TradingBot::new(&config, catalog, ws_url, token, source, transport, app_state);

    let running = bot.running();
    tokio::spawn(async move {
        shutdown_signal().await;
        warn!("Shutdown requested, stopping producers");
        running.store(false, Ordering::SeqCst);
    });

    info!("========================================");
    info!("RATE ARBITRAGE BOT STARTED");
    info!("========================================");

    bot.run().await?;

    info!("Shutdown complete");
    Ok(())
}

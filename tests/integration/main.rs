//! Integration tests against the live venue and spot endpoints.
//!
//! These tests require PRIMARY_USER and PRIMARY_PASSWORD environment variables.
//! Run with: cargo test --test integration -- --ignored
//!
//! Note: These tests interact with the real venue API. No orders are sent.

use std::collections::HashMap;

use rate_arb::config::Config;
use rate_arb::instrument::Catalog;
use rate_arb::spot::{SpotSource, YahooSpotSource};
use rate_arb::trading::{build_http_client, PrimaryClient};

/// Get a test config from environment.
fn test_config() -> Option<Config> {
    let config = Config::load().ok()?;
    config.validate().ok()?;
    Some(config)
}

async fn connect(config: &Config) -> PrimaryClient {
    let http = build_http_client(config.http_timeout_ms).unwrap();
    PrimaryClient::connect(
        http,
        &config.primary_rest_url,
        &config.primary_user,
        &config.primary_password,
        &config.primary_account,
        &config.market_id,
    )
    .await
    .unwrap()
}

/// Test that we can authenticate.
#[tokio::test]
#[ignore = "requires PRIMARY_USER and PRIMARY_PASSWORD"]
async fn test_authenticate() {
    let Some(config) = test_config() else {
        println!("Skipping: PRIMARY_USER/PRIMARY_PASSWORD not set");
        return;
    };

    let client = connect(&config).await;
    assert!(!client.token().is_empty(), "Session token should not be empty");
}

/// Test that the instrument list builds a catalog.
#[tokio::test]
#[ignore = "requires PRIMARY_USER and PRIMARY_PASSWORD"]
async fn test_build_catalog() {
    let Some(config) = test_config() else {
        println!("Skipping: PRIMARY_USER/PRIMARY_PASSWORD not set");
        return;
    };

    let client = connect(&config).await;
    let instruments = client.instruments_details().await.unwrap();
    assert!(!instruments.is_empty(), "Venue returned no instruments");

    let catalog = Catalog::build(&config.roots(), &instruments).unwrap();
    println!("Catalog holds {} contracts", catalog.len());
    for maturity in catalog.tradeable_maturities() {
        println!(
            "  {}: {} contracts",
            maturity,
            catalog.contracts_for_maturity(&maturity).len()
        );
    }
}

/// Test that spot prices can be pulled for the configured roots.
#[tokio::test]
#[ignore = "requires network access"]
async fn test_fetch_spot() {
    let http = build_http_client(5_000).unwrap();
    let source = YahooSpotSource::new(http, "https://query1.finance.yahoo.com");
    let roots = vec!["GGAL".to_string(), "DLR".to_string()];

    let prices: HashMap<String, f64> = source.fetch(&roots).await.unwrap();

    for root in &roots {
        let price = prices[root];
        assert!(price > 0.0, "{} spot should be positive", root);
        println!("  {}: {}", root, price);
    }
}

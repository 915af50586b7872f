// IoT Central Providers - Source adapters and telemetry sink
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Finnhub quote source
//!
//! One request per symbol; each current price becomes a `finance.<symbol>`
//! feed.

use crate::config::FinanceConfig;
use crate::error::{ProviderError, Result};
use async_trait::async_trait;
use iot_central::{Batch, Metric, Source, SourceError};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

const TOKEN_HEADER: &str = "X-Finnhub-Token";

#[derive(Debug, Deserialize)]
struct Quote {
    /// Current price
    c: f64,
}

/// Feed name for a ticker symbol
///
/// `COINBASE:BTC-USD` becomes `finance.coinbase-btc-usd`.
pub fn feed_name(symbol: &str) -> String {
    format!("finance.{}", symbol.to_lowercase().replace(':', "-"))
}

/// Extract the current price from a quote response body
pub fn parse_quote(body: &str) -> Result<f64> {
    let quote: Quote = serde_json::from_str(body)?;
    Ok(quote.c)
}

/// Current prices from Finnhub
pub struct FinanceSource {
    config: FinanceConfig,
    client: Client,
}

impl FinanceSource {
    /// Build the HTTP client; fails only if TLS cannot be initialised
    pub fn new(config: FinanceConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    /// The configuration this source was built with
    pub fn config(&self) -> &FinanceConfig {
        &self.config
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<f64> {
        let response = self
            .client
            .get(&self.config.base_url)
            .query(&[("symbol", symbol)])
            .header(TOKEN_HEADER, &self.config.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status(status.as_u16()));
        }
        parse_quote(&response.text().await?)
    }
}

impl std::fmt::Debug for FinanceSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinanceSource")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Source for FinanceSource {
    fn name(&self) -> &str {
        "finance"
    }

    async fn init(&mut self) -> std::result::Result<(), SourceError> {
        self.config
            .validate()
            .map_err(|e| SourceError::Setup(e.to_string()))
    }

    async fn poll(&mut self) -> std::result::Result<Vec<Metric>, SourceError> {
        let mut batch = Batch::new();
        let mut last_error = None;
        let mut answered = 0usize;

        for symbol in &self.config.symbols {
            match self.fetch_quote(symbol).await {
                Ok(price) => {
                    answered += 1;
                    if price == 0.0 {
                        info!(source = "finance", symbol = %symbol, "Ignoring zero quote");
                        continue;
                    }
                    batch.nonzero(feed_name(symbol), price);
                }
                Err(e) => {
                    warn!(source = "finance", symbol = %symbol, error = %e, "Quote request failed");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if answered == 0 => Err(e.into()),
            _ => {
                debug!(source = "finance", count = batch.len(), "Collected quotes");
                Ok(batch.into_metrics())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_name() {
        assert_eq!(feed_name("COINBASE:BTC-USD"), "finance.coinbase-btc-usd");
        assert_eq!(feed_name("KRAKEN:USDTZUSD"), "finance.kraken-usdtzusd");
        assert_eq!(feed_name("QQQ"), "finance.qqq");
    }

    #[test]
    fn test_parse_quote() {
        let body = r#"{"c": 261.74, "d": -1.2, "dp": -0.45, "h": 263.31, "l": 260.68, "o": 261.07, "pc": 262.94, "t": 1700000000}"#;
        let price = parse_quote(body).unwrap();
        approx::assert_relative_eq!(price, 261.74);
    }

    #[test]
    fn test_parse_quote_unknown_symbol_is_zero() {
        // Finnhub answers unknown symbols with an all-zero quote.
        let body = r#"{"c": 0, "d": null, "dp": null, "h": 0, "l": 0, "o": 0, "pc": 0, "t": 0}"#;
        assert_eq!(parse_quote(body).unwrap(), 0.0);
    }

    #[test]
    fn test_parse_quote_rejects_error_body() {
        let err = parse_quote(r#"{"error": "Invalid API key"}"#).unwrap_err();
        assert!(matches!(err, ProviderError::Payload(_)));
    }

    #[tokio::test]
    async fn test_every_symbol_failing_is_an_error() {
        let config = FinanceConfig::with_symbols("key", ["QQQ", "TSLA"])
            .with_base_url("http://127.0.0.1:9/quote");
        let mut source = FinanceSource::new(config).unwrap();
        let err = source.poll().await.unwrap_err();
        assert!(matches!(err, SourceError::Transport(_)));
    }
}

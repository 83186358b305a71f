//! CoinGecko public API client for market data (no authentication required)

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::error::FetchError;
use crate::types::Kline;

use super::MarketDataSource;

const DEFAULT_BASE_URL: &str = "https://api.coingecko.com";
const MAX_FETCH_ATTEMPTS: u32 = 3;
const RETRY_DELAY_SECS: u64 = 5;

/// CoinGecko public market data client.
///
/// Tickers follow the `<coin-id>-<vs-currency>` convention, e.g.
/// "bitcoin-USD". Bar granularity follows the provider's tiering for the
/// requested period; the interval is carried through for record identity.
#[derive(Clone)]
pub struct CoinGeckoClient {
    client: Client,
    base_url: String,
}

/// Raw OHLC row: [timestamp_ms, open, high, low, close]
type RawOhlcRow = (i64, f64, f64, f64, f64);

/// Subset of the market_chart response carrying volumes
#[derive(Debug, serde::Deserialize)]
struct MarketChart {
    total_volumes: Vec<(i64, f64)>,
}

impl Default for CoinGeckoClient {
    fn default() -> Self {
        Self::new()
    }
}

impl CoinGeckoClient {
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("Failed to build HTTP client"),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("Failed to build HTTP client"),
            base_url: base_url.into(),
        }
    }

    /// Split "bitcoin-USD" into ("bitcoin", "usd").
    fn parse_ticker(ticker: &str) -> (String, String) {
        match ticker.rsplit_once('-') {
            Some((id, vs)) => (id.to_lowercase(), vs.to_lowercase()),
            None => (ticker.to_lowercase(), "usd".to_string()),
        }
    }

    /// Map a period string to the provider's `days` parameter.
    fn period_to_days(period: &str) -> String {
        let period = period.trim().to_lowercase();
        if period == "max" {
            return "max".to_string();
        }
        if let Some(days) = period.strip_suffix('d') {
            return days.to_string();
        }
        if let Some(years) = period.strip_suffix('y') {
            if let Ok(y) = years.parse::<u32>() {
                return (y * 365).to_string();
            }
        }
        "90".to_string()
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status { status, body });
        }
        Ok(response.json::<T>().await?)
    }

    async fn fetch_once(
        &self,
        coin_id: &str,
        vs_currency: &str,
        days: &str,
    ) -> Result<Vec<Kline>, FetchError> {
        let ohlc_url = format!(
            "{}/api/v3/coins/{}/ohlc?vs_currency={}&days={}",
            self.base_url, coin_id, vs_currency, days
        );
        let rows: Vec<RawOhlcRow> = self.get_json(&ohlc_url).await?;

        // Volumes come from a separate endpoint; a failure there degrades
        // volume-dependent rules instead of the whole tuple.
        let chart_url = format!(
            "{}/api/v3/coins/{}/market_chart?vs_currency={}&days={}",
            self.base_url, coin_id, vs_currency, days
        );
        let volumes = match self.get_json::<MarketChart>(&chart_url).await {
            Ok(chart) => chart.total_volumes,
            Err(err) => {
                warn!(coin_id, error = %err, "volume fetch failed, filling zeros");
                Vec::new()
            }
        };

        let mut vol_cursor = 0usize;
        let klines: Vec<Kline> = rows
            .iter()
            .filter_map(|row| {
                // Nearest volume sample at or before the bar timestamp.
                while vol_cursor + 1 < volumes.len() && volumes[vol_cursor + 1].0 <= row.0 {
                    vol_cursor += 1;
                }
                let volume = volumes
                    .get(vol_cursor)
                    .filter(|(t, _)| *t <= row.0)
                    .map(|(_, v)| *v)
                    .unwrap_or(0.0);
                Some(Kline {
                    open_time: row.0,
                    open: Decimal::from_f64_retain(row.1)?,
                    high: Decimal::from_f64_retain(row.2)?,
                    low: Decimal::from_f64_retain(row.3)?,
                    close: Decimal::from_f64_retain(row.4)?,
                    volume: Decimal::from_f64_retain(volume)?,
                    close_time: row.0,
                })
            })
            .collect();

        debug!(coin_id, bars = klines.len(), "Fetched OHLC from CoinGecko");
        Ok(klines)
    }
}

#[async_trait]
impl MarketDataSource for CoinGeckoClient {
    async fn fetch(
        &self,
        ticker: &str,
        interval: &str,
        period: &str,
    ) -> Result<Vec<Kline>, FetchError> {
        let (coin_id, vs_currency) = Self::parse_ticker(ticker);
        let days = Self::period_to_days(period);

        let mut last_error = None;
        for attempt in 1..=MAX_FETCH_ATTEMPTS {
            match self.fetch_once(&coin_id, &vs_currency, &days).await {
                Ok(klines) if !klines.is_empty() => return Ok(klines),
                Ok(_) => {
                    return Err(FetchError::Empty {
                        ticker: ticker.to_string(),
                        interval: interval.to_string(),
                    })
                }
                Err(err) => {
                    warn!(ticker, attempt, error = %err, "fetch attempt failed");
                    last_error = Some(err);
                    if attempt < MAX_FETCH_ATTEMPTS {
                        tokio::time::sleep(std::time::Duration::from_secs(RETRY_DELAY_SECS)).await;
                    }
                }
            }
        }
        Err(last_error.unwrap_or(FetchError::Empty {
            ticker: ticker.to_string(),
            interval: interval.to_string(),
        }))
    }
}

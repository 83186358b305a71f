//! CSV bar replayer for offline and deterministic runs.

use std::path::PathBuf;
use std::str::FromStr;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;

use crate::error::FetchError;
use crate::types::Kline;

use super::MarketDataSource;

/// Raw CSV row; prices stay strings until Decimal parsing.
#[derive(Debug, Deserialize)]
struct RawBar {
    open_time: i64,
    open: String,
    high: String,
    low: String,
    close: String,
    volume: String,
    close_time: i64,
}

/// Replays bars from `<dir>/<ticker>_<interval>.csv` files with the
/// columns `open_time,open,high,low,close,volume,close_time`.
pub struct CsvReplayer {
    dir: PathBuf,
}

impl CsvReplayer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, ticker: &str, interval: &str) -> PathBuf {
        self.dir.join(format!("{ticker}_{interval}.csv"))
    }
}

#[async_trait]
impl MarketDataSource for CsvReplayer {
    async fn fetch(
        &self,
        ticker: &str,
        interval: &str,
        _period: &str,
    ) -> Result<Vec<Kline>, FetchError> {
        let path = self.path_for(ticker, interval);
        let mut reader = csv::Reader::from_path(&path)
            .map_err(|_| FetchError::NotFound(path.display().to_string()))?;

        let mut klines = Vec::new();
        for row in reader.deserialize::<RawBar>() {
            let raw = row.map_err(|e| FetchError::Decode(e.to_string()))?;
            let parse = |field: &str| {
                Decimal::from_str(field).map_err(|e| FetchError::Decode(e.to_string()))
            };
            klines.push(Kline {
                open_time: raw.open_time,
                open: parse(&raw.open)?,
                high: parse(&raw.high)?,
                low: parse(&raw.low)?,
                close: parse(&raw.close)?,
                volume: parse(&raw.volume)?,
                close_time: raw.close_time,
            });
        }
        if klines.is_empty() {
            return Err(FetchError::Empty {
                ticker: ticker.to_string(),
                interval: interval.to_string(),
            });
        }
        klines.sort_by_key(|k| k.open_time);
        debug!(ticker, interval, bars = klines.len(), "Replayed bars from CSV");
        Ok(klines)
    }
}

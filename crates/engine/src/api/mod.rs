//! Market-data sources.
//!
//! The engine consumes any producer of ascending, timezone-naive OHLCV
//! bars. Two implementations ship: a CoinGecko public-API client and a CSV
//! replayer for offline/deterministic runs.

mod coingecko;
mod replay;

pub use coingecko::CoinGeckoClient;
pub use replay::CsvReplayer;

use async_trait::async_trait;

use crate::error::FetchError;
use crate::types::Kline;

/// Async seam between the pipeline driver and the outside world.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Fetch bars for a ticker at the given interval over the given period
    /// (e.g. "90d", "1y", "5y"), in ascending time order.
    async fn fetch(
        &self,
        ticker: &str,
        interval: &str,
        period: &str,
    ) -> Result<Vec<Kline>, FetchError>;
}

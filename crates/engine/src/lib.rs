//! Chart-pattern detection engine.
//!
//! Deterministic pipeline over OHLCV series:
//! - Columnar indicator precomputation (RSI, MACD, Stochastic, OBV, ATR)
//! - ZigZag pivot extraction with per-strategy deviation presets
//! - Windowed candidate enumeration for H&S, double, and triple patterns
//! - Weighted mandatory/optional rule validation and scoring
//! - Per-tuple deduplication and ordered record emission

pub mod api;
pub mod config;
pub mod debuglog;
pub mod error;
pub mod indicators;
pub mod patterns;
pub mod rules;
pub mod scan;
pub mod types;
pub mod zigzag;

// Re-exports for convenience
pub use api::{CoinGeckoClient, CsvReplayer, MarketDataSource};
pub use config::{RuleWeight, ScanConfig};
pub use debuglog::DebugLogger;
pub use error::{FetchError, ScanError, SinkError};
pub use indicators::{enrich, IndicatorColumns};
pub use patterns::Evaluation;
pub use scan::{run_scan, scan_series, RecordSink, ScanRequest, ScanSummary};
pub use types::*;
pub use zigzag::{average_pivot_spacing, extract_pivots};

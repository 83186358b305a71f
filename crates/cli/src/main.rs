//! chartscan: chart-pattern dataset generator
//!
//! Usage:
//!   chartscan --tickers bitcoin-USD,ethereum-USD --strategies swing_short \
//!             --intervals 1h,4h --period 2y --patterns ALL --output data/patterns.csv
//!
//! Exit codes: 0 success, 1 fatal error (sink/IO), 2 invalid arguments.

use std::path::PathBuf;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use engine::{run_scan, CoinGeckoClient, CsvReplayer, MarketDataSource, PatternFamily, ScanConfig, ScanRequest};
use sink::CsvSink;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "chartscan")]
#[command(about = "Detect chart patterns over OHLCV series and emit a labeled CSV dataset", long_about = None)]
struct Cli {
    /// Tickers to scan (comma-separated, e.g. bitcoin-USD,ethereum-USD)
    #[arg(long, value_delimiter = ',')]
    tickers: Vec<String>,

    /// ZigZag strategies to run (comma-separated; default: all presets)
    #[arg(long, value_delimiter = ',')]
    strategies: Vec<String>,

    /// Intervals to include (comma-separated; default: all per strategy)
    #[arg(long, value_delimiter = ',')]
    intervals: Vec<String>,

    /// History period to request (e.g. 90d, 2y, 5y)
    #[arg(long, default_value = "1y")]
    period: String,

    /// Pattern families: HNS, DTB, TTB, or ALL (comma-separated)
    #[arg(long, default_value = "ALL")]
    patterns: String,

    /// Output CSV path
    #[arg(long, default_value = "data/datasets/patterns.csv")]
    output: PathBuf,

    /// Market data source: "coingecko" or "replay:<dir>"
    #[arg(long, default_value = "coingecko")]
    source: String,

    /// Write per-family rejection logs under ./logs
    #[arg(long)]
    debug_patterns: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug,engine=debug,chartscan=debug")
    } else {
        EnvFilter::new("info,engine=info,chartscan=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).compact())
        .with(filter)
        .init();
}

fn parse_families(spec: &str) -> Result<Vec<PatternFamily>, String> {
    let mut families = Vec::new();
    for token in spec.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        match token.to_uppercase().as_str() {
            "ALL" => return Ok(PatternFamily::all().to_vec()),
            "HNS" => families.push(PatternFamily::Hns),
            "DTB" => families.push(PatternFamily::Dtb),
            "TTB" => families.push(PatternFamily::Ttb),
            other => return Err(format!("unknown pattern family '{other}' (expected HNS, DTB, TTB, or ALL)")),
        }
    }
    if families.is_empty() {
        return Err("no pattern families selected".to_string());
    }
    Ok(families)
}

fn default_tickers() -> Vec<String> {
    ["bitcoin-USD", "ethereum-USD", "solana-USD", "cardano-USD"]
        .iter()
        .map(|t| t.to_string())
        .collect()
}

async fn run(cli: Cli, families: Vec<PatternFamily>) -> anyhow::Result<()> {
    let mut cfg = ScanConfig::default();
    if cli.debug_patterns {
        cfg.hns_debug = true;
        cfg.dtb_debug = true;
        cfg.ttb_debug = true;
    }

    let strategies = if cli.strategies.is_empty() {
        cfg.strategies.keys().cloned().collect()
    } else {
        cli.strategies.clone()
    };
    let tickers = if cli.tickers.is_empty() {
        default_tickers()
    } else {
        cli.tickers.clone()
    };

    let request = ScanRequest {
        tickers,
        strategies,
        intervals: cli.intervals.clone(),
        period: cli.period.clone(),
        families,
    };

    let source: Box<dyn MarketDataSource> = match cli.source.strip_prefix("replay:") {
        Some(dir) => Box::new(CsvReplayer::new(dir)),
        None => Box::new(CoinGeckoClient::new()),
    };

    let mut sink = CsvSink::create(&cli.output)?;
    let summary = run_scan(&request, source.as_ref(), &mut sink, &cfg).await?;

    info!(
        tuples = summary.tuples_processed,
        failed = summary.tuples_failed,
        records = summary.records_emitted,
        output = %cli.output.display(),
        "scan complete"
    );
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let families = match parse_families(&cli.patterns) {
        Ok(families) => families,
        Err(message) => {
            // Invalid arguments exit with code 2, like any parse error.
            Cli::command().error(ErrorKind::InvalidValue, message).exit();
        }
    };

    if let Err(err) = run(cli, families).await {
        error!("{err:#}");
        std::process::exit(1);
    }
}

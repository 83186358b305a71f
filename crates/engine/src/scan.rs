//! Pipeline driver: iterate (ticker x strategy x interval) tuples, compose
//! the engine stages, deduplicate, and emit records.
//!
//! The per-tuple core (`scan_series`) is pure and synchronous; only the
//! outer driver touches the network and the sink. A fetch failure skips
//! the tuple with a warning, a sink failure aborts the run.

use tracing::{debug, info, warn};

use crate::config::ScanConfig;
use crate::debuglog::DebugLogger;
use crate::error::{ScanError, SinkError};
use crate::indicators::enrich;
use crate::api::MarketDataSource;
use crate::patterns::{dtb, hns, ttb, Evaluation, ValidationContext};
use crate::types::{BarSeries, Kline, PatternFamily, PatternRecord};
use crate::zigzag::{average_pivot_spacing, extract_pivots};

/// Minimum bars required to compute every indicator with room for context.
pub const MIN_BARS: usize = 50;
/// Fewer pivots than the narrowest window cannot form any pattern.
pub const MIN_PIVOTS: usize = 5;

/// One scan request over a universe of tuples.
#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub tickers: Vec<String>,
    pub strategies: Vec<String>,
    /// Empty means every interval the strategy defines.
    pub intervals: Vec<String>,
    pub period: String,
    /// Empty means all families.
    pub families: Vec<PatternFamily>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub tuples_processed: u32,
    pub tuples_failed: u32,
    pub records_emitted: u32,
}

/// Row sink consumed by the driver. The canonical implementation is the
/// CSV sink crate.
pub trait RecordSink {
    fn emit(&mut self, record: &PatternRecord) -> Result<(), SinkError>;
    fn finalize(&mut self) -> Result<(), SinkError>;
}

/// Scan one (ticker, interval, strategy) tuple. Pure: identical inputs
/// produce identical records in identical order.
#[allow(clippy::too_many_arguments)]
pub fn scan_series(
    ticker: &str,
    interval: &str,
    strategy: &str,
    klines: &[Kline],
    families: &[PatternFamily],
    deviation_percent: f64,
    cfg: &ScanConfig,
    debug_log: &DebugLogger,
) -> Vec<PatternRecord> {
    if klines.len() < MIN_BARS {
        debug!(ticker, interval, strategy, bars = klines.len(), "insufficient data");
        return Vec::new();
    }
    let series = BarSeries::from_klines(klines);
    let indicators = enrich(&series, cfg);
    let pivots = extract_pivots(&series.close, deviation_percent, &cfg.zigzag);
    if pivots.len() < MIN_PIVOTS {
        debug!(ticker, interval, strategy, pivots = pivots.len(), "pivot starvation");
        return Vec::new();
    }
    let ctx = ValidationContext {
        series: &series,
        indicators: &indicators,
        config: cfg,
        avg_pivot_spacing: average_pivot_spacing(&pivots),
        debug: debug_log,
    };

    let mut evaluations: Vec<Evaluation> = Vec::new();
    for family in families {
        let found = match family {
            PatternFamily::Hns => hns::find_patterns(&pivots, &ctx),
            PatternFamily::Dtb => dtb::find_patterns(&pivots, &ctx),
            PatternFamily::Ttb => ttb::find_patterns(&pivots, &ctx),
        };
        evaluations.extend(found);
    }

    let records = evaluations
        .into_iter()
        .map(|eval| to_record(ticker, interval, strategy, eval))
        .collect();
    let mut records = dedup_by_identity(records);
    records.sort_by(|a, b| {
        a.end_idx
            .cmp(&b.end_idx)
            .then(a.key_idx.cmp(&b.key_idx))
            .then(a.kind.label().cmp(b.kind.label()))
    });
    records
}

fn to_record(ticker: &str, interval: &str, strategy: &str, eval: Evaluation) -> PatternRecord {
    let key_idx = match eval.kind.family() {
        PatternFamily::Hns | PatternFamily::Dtb => eval.pivots[3].idx,
        PatternFamily::Ttb => eval.pivots[5].idx,
    };
    let start_idx = eval.pivots[0].idx;
    let retest_idx = eval.pivots.last().expect("validated window is non-empty").idx;
    PatternRecord {
        ticker: ticker.to_string(),
        timeframe: interval.to_string(),
        strategy: strategy.to_string(),
        kind: eval.kind,
        start_idx,
        end_idx: retest_idx,
        key_idx,
        retest_idx,
        breakout_idx: eval.breakout_idx,
        score_total: eval.score_total,
        flags: eval.flags,
        pivots: eval.pivots,
    }
}

/// Keep the best record per (kind, key pivot): higher score wins, then
/// later end index, then first seen.
pub(crate) fn dedup_by_identity(records: Vec<PatternRecord>) -> Vec<PatternRecord> {
    let mut best: Vec<PatternRecord> = Vec::new();
    for record in records {
        match best
            .iter_mut()
            .find(|r| r.kind == record.kind && r.key_idx == record.key_idx)
        {
            Some(existing) => {
                let replace = record.score_total > existing.score_total
                    || (record.score_total == existing.score_total
                        && record.end_idx > existing.end_idx);
                if replace {
                    *existing = record;
                }
            }
            None => best.push(record),
        }
    }
    best
}

/// Drive a full request: fetch each tuple, scan it, emit accepted records.
pub async fn run_scan(
    request: &ScanRequest,
    source: &dyn MarketDataSource,
    sink: &mut dyn RecordSink,
    cfg: &ScanConfig,
) -> Result<ScanSummary, ScanError> {
    let debug_log = DebugLogger::from_config(cfg);
    let families: Vec<PatternFamily> = if request.families.is_empty() {
        PatternFamily::all().to_vec()
    } else {
        request.families.clone()
    };

    let mut summary = ScanSummary::default();
    let mut planned = 0u32;

    for strategy in &request.strategies {
        let Some(intervals) = cfg.strategies.get(strategy) else {
            warn!(strategy = %strategy, "unknown strategy, skipping");
            continue;
        };
        for (interval, deviation) in intervals {
            if !request.intervals.is_empty() && !request.intervals.contains(interval) {
                continue;
            }
            for ticker in &request.tickers {
                planned += 1;
                info!(ticker = %ticker, interval = %interval, strategy = %strategy, "processing tuple");
                let klines = match source.fetch(ticker, interval, &request.period).await {
                    Ok(klines) => klines,
                    Err(err) => {
                        warn!(ticker = %ticker, interval = %interval, strategy = %strategy, error = %err, "fetch failed, skipping tuple");
                        summary.tuples_failed += 1;
                        continue;
                    }
                };
                let records = scan_series(
                    ticker,
                    interval,
                    strategy,
                    &klines,
                    &families,
                    *deviation,
                    cfg,
                    &debug_log,
                );
                for record in &records {
                    sink.emit(record)?;
                }
                info!(ticker = %ticker, interval = %interval, strategy = %strategy, found = records.len(), "tuple complete");
                summary.records_emitted += records.len() as u32;
                summary.tuples_processed += 1;
            }
        }
    }

    if planned == 0 {
        return Err(ScanError::EmptyPlan);
    }
    sink.finalize()?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::CsvReplayer;
    use crate::config::flag;
    use crate::patterns::testutil::build_series;
    use crate::types::PatternKind;
    use rust_decimal::Decimal;
    use std::io::Write;

    fn klines_from_series(series: &BarSeries) -> Vec<Kline> {
        (0..series.len())
            .map(|i| Kline {
                open_time: series.time[i] * 60_000,
                open: Decimal::from_f64_retain(series.open[i]).unwrap(),
                high: Decimal::from_f64_retain(series.high[i]).unwrap(),
                low: Decimal::from_f64_retain(series.low[i]).unwrap(),
                close: Decimal::from_f64_retain(series.close[i]).unwrap(),
                volume: Decimal::from_f64_retain(series.volume[i]).unwrap(),
                close_time: series.time[i] * 60_000 + 59_999,
            })
            .collect()
    }

    /// Bars carrying a clean OCO: decline base, shoulders 105/104, head
    /// 110, breakdown at bar 65 on doubled volume, retest valley at 96.5.
    fn oco_klines() -> Vec<Kline> {
        let anchors = [
            (0, 102.0),
            (10, 95.0),
            (20, 105.0),
            (30, 100.0),
            (40, 110.0),
            (50, 101.0),
            (60, 104.0),
            (64, 101.0),
            (65, 97.0),
            (66, 96.5),
            (70, 100.0),
            (75, 103.0),
        ];
        let mut series = build_series(&anchors, 80);
        series.volume[65] = 250.0;
        klines_from_series(&series)
    }

    fn record(kind: PatternKind, key_idx: usize, end_idx: usize, score: u32) -> PatternRecord {
        PatternRecord {
            ticker: "BTC-USD".into(),
            timeframe: "1d".into(),
            strategy: "swing_short".into(),
            kind,
            start_idx: 0,
            end_idx,
            key_idx,
            retest_idx: end_idx,
            breakout_idx: None,
            score_total: score,
            flags: Vec::new(),
            pivots: Vec::new(),
        }
    }

    #[test]
    fn test_scan_series_finds_the_oco() {
        let klines = oco_klines();
        let cfg = ScanConfig::default();
        let dbg = DebugLogger::disabled();
        let records = scan_series(
            "BTC-USD",
            "1d",
            "swing_short",
            &klines,
            PatternFamily::all(),
            2.5,
            &cfg,
            &dbg,
        );
        assert_eq!(records.len(), 1);
        let rec = &records[0];
        assert_eq!(rec.kind, PatternKind::Oco);
        assert_eq!(rec.key_idx, 40);
        assert_eq!(rec.retest_idx, 66);
        assert_eq!(rec.start_idx, 10);
        assert_eq!(rec.breakout_idx, Some(65));
        assert_eq!(rec.flag(flag::VOLUME_BREAKOUT_NECKLINE), Some(true));
        assert!(rec.score_total >= cfg.minimum_score_hns);
        // Emission order invariant.
        assert!(records.windows(2).all(|w| w[0].end_idx <= w[1].end_idx));
    }

    #[test]
    fn test_scan_series_is_deterministic() {
        let klines = oco_klines();
        let cfg = ScanConfig::default();
        let dbg = DebugLogger::disabled();
        let run = || {
            scan_series(
                "BTC-USD",
                "1d",
                "swing_short",
                &klines,
                PatternFamily::all(),
                2.5,
                &cfg,
                &dbg,
            )
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_short_flat_and_empty_series_yield_nothing() {
        let cfg = ScanConfig::default();
        let dbg = DebugLogger::disabled();
        let families = PatternFamily::all();

        let empty: Vec<Kline> = Vec::new();
        assert!(scan_series("X", "1d", "s", &empty, families, 2.5, &cfg, &dbg).is_empty());

        let short = oco_klines().into_iter().take(49).collect::<Vec<_>>();
        assert!(scan_series("X", "1d", "s", &short, families, 2.5, &cfg, &dbg).is_empty());

        let flat = klines_from_series(&build_series(&[(0, 100.0)], 120));
        assert!(scan_series("X", "1d", "s", &flat, families, 2.5, &cfg, &dbg).is_empty());
    }

    #[test]
    fn test_serial_order_does_not_matter_across_tickers() {
        let klines = oco_klines();
        let cfg = ScanConfig::default();
        let dbg = DebugLogger::disabled();
        let tickers = ["BTC-USD", "ETH-USD", "ADA-USD"];
        let scan_one = |ticker: &str| {
            scan_series(
                ticker,
                "1d",
                "swing_short",
                &klines,
                PatternFamily::all(),
                2.5,
                &cfg,
                &dbg,
            )
        };
        let forward: Vec<_> = tickers.iter().map(|t| scan_one(t)).collect();
        let mut backward: Vec<_> = tickers.iter().rev().map(|t| scan_one(t)).collect();
        backward.reverse();
        assert_eq!(forward, backward);
        for (ticker, records) in tickers.iter().zip(&forward) {
            assert!(records.iter().all(|r| r.ticker == *ticker));
        }
    }

    #[test]
    fn test_dedup_keeps_best_by_identity() {
        let records = vec![
            record(PatternKind::Dt, 40, 50, 75),
            record(PatternKind::Dt, 40, 55, 90),
            record(PatternKind::Dt, 40, 60, 90),
            record(PatternKind::Db, 40, 52, 70),
            record(PatternKind::Dt, 44, 58, 80),
        ];
        let deduped = dedup_by_identity(records);
        assert_eq!(deduped.len(), 3);
        let dt_40 = deduped
            .iter()
            .find(|r| r.kind == PatternKind::Dt && r.key_idx == 40)
            .unwrap();
        // Higher score wins, then later end index.
        assert_eq!(dt_40.score_total, 90);
        assert_eq!(dt_40.end_idx, 60);
        assert!(deduped.iter().any(|r| r.kind == PatternKind::Db));
        assert!(deduped.iter().any(|r| r.key_idx == 44));
    }

    struct VecSink {
        records: Vec<PatternRecord>,
        finalized: bool,
    }

    impl RecordSink for VecSink {
        fn emit(&mut self, record: &PatternRecord) -> Result<(), SinkError> {
            self.records.push(record.clone());
            Ok(())
        }

        fn finalize(&mut self) -> Result<(), SinkError> {
            self.finalized = true;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_run_scan_skips_failed_tuples_and_emits_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let klines = oco_klines();
        let mut file = std::fs::File::create(dir.path().join("BTC-USD_1d.csv")).unwrap();
        writeln!(file, "open_time,open,high,low,close,volume,close_time").unwrap();
        for k in &klines {
            writeln!(
                file,
                "{},{},{},{},{},{},{}",
                k.open_time, k.open, k.high, k.low, k.close, k.volume, k.close_time
            )
            .unwrap();
        }

        let mut cfg = ScanConfig::default();
        cfg.strategies.insert(
            "test".to_string(),
            [("1d".to_string(), 2.5f64)].into_iter().collect(),
        );

        let request = ScanRequest {
            tickers: vec!["BTC-USD".to_string(), "MISSING-USD".to_string()],
            strategies: vec!["test".to_string()],
            intervals: vec!["1d".to_string()],
            period: "1y".to_string(),
            families: vec![PatternFamily::Hns],
        };
        let source = CsvReplayer::new(dir.path());
        let mut sink = VecSink { records: Vec::new(), finalized: false };

        let summary = run_scan(&request, &source, &mut sink, &cfg).await.unwrap();
        assert_eq!(summary.tuples_processed, 1);
        assert_eq!(summary.tuples_failed, 1);
        assert_eq!(summary.records_emitted, 1);
        assert!(sink.finalized);
        assert_eq!(sink.records.len(), 1);
        assert_eq!(sink.records[0].kind, PatternKind::Oco);
    }
}

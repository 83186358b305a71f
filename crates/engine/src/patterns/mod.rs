//! Candidate enumeration and per-family validation.
//!
//! Enumerators slide a fixed-width window over the pivot list and check
//! kind alternation only; validators compose the rule library into the
//! mandatory-gate → optional-score → threshold flow and report every rule
//! flag for diagnostics, accepted or not.

pub mod dtb;
pub mod hns;
pub mod ttb;

use crate::config::{RuleWeight, ScanConfig};
use crate::debuglog::DebugLogger;
use crate::indicators::IndicatorColumns;
use crate::types::{BarSeries, PatternKind, Pivot, PivotKind, RuleFlag};

/// Everything a validator needs besides the candidate window.
pub struct ValidationContext<'a> {
    pub series: &'a BarSeries,
    pub indicators: &'a IndicatorColumns,
    pub config: &'a ScanConfig,
    pub avg_pivot_spacing: f64,
    pub debug: &'a DebugLogger,
}

/// Full outcome of validating one candidate, including rejections.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub kind: PatternKind,
    pub pivots: Vec<Pivot>,
    pub flags: Vec<RuleFlag>,
    pub score_total: u32,
    pub accepted: bool,
    pub breakout_idx: Option<usize>,
    /// First mandatory rule that failed, when the candidate was rejected
    /// before scoring.
    pub failed_rule: Option<&'static str>,
}

impl Evaluation {
    pub fn flag(&self, name: &str) -> Option<bool> {
        self.flags.iter().find(|f| f.name == name).map(|f| f.passed)
    }
}

/// Flag accumulator over a family's weight table.
pub(crate) struct RuleScorer<'a> {
    weights: &'a [RuleWeight],
    flags: Vec<RuleFlag>,
}

impl<'a> RuleScorer<'a> {
    pub(crate) fn new(weights: &'a [RuleWeight]) -> Self {
        let flags = weights
            .iter()
            .map(|w| RuleFlag { name: w.name, passed: false })
            .collect();
        Self { weights, flags }
    }

    /// Record a rule outcome; returns the outcome for gating.
    pub(crate) fn set(&mut self, name: &'static str, passed: bool) -> bool {
        if let Some(flag) = self.flags.iter_mut().find(|f| f.name == name) {
            flag.passed = passed;
        }
        passed
    }

    pub(crate) fn score(&self) -> u32 {
        self.weights
            .iter()
            .zip(&self.flags)
            .filter(|(_, flag)| flag.passed)
            .map(|(weight, _)| weight.weight)
            .sum()
    }

    pub(crate) fn all_mandatory_passed(&self) -> bool {
        self.weights
            .iter()
            .zip(&self.flags)
            .filter(|(weight, _)| weight.mandatory)
            .all(|(_, flag)| flag.passed)
    }

    pub(crate) fn into_flags(self) -> Vec<RuleFlag> {
        self.flags
    }
}

/// The alternating kind sequence starting with `first` over `len` pivots.
pub(crate) fn alternation(first: PivotKind, len: usize) -> Vec<PivotKind> {
    (0..len)
        .map(|i| if i % 2 == 0 { first } else { first.opposite() })
        .collect()
}

pub(crate) fn kinds_match(window: &[Pivot], kinds: &[PivotKind]) -> bool {
    window.len() == kinds.len() && window.iter().zip(kinds).all(|(p, k)| p.kind == *k)
}

/// Anchor positions for a window of `width` pivots, restricted to the last
/// `lookback` positions.
pub(crate) fn window_starts(n_pivots: usize, width: usize, lookback: usize) -> std::ops::Range<usize> {
    if n_pivots < width {
        return 0..0;
    }
    let last = n_pivots - width;
    let first = (last + 1).saturating_sub(lookback.max(1));
    first..(last + 1)
}

#[cfg(test)]
pub(crate) mod testutil {
    use crate::types::{BarSeries, Pivot, PivotKind};

    pub(crate) fn peak(idx: usize, price: f64) -> Pivot {
        Pivot { idx, price, kind: PivotKind::Peak }
    }

    pub(crate) fn valley(idx: usize, price: f64) -> Pivot {
        Pivot { idx, price, kind: PivotKind::Valley }
    }

    /// Build a bar series by linearly interpolating closes between anchor
    /// points and extending the last anchor flat to `n` bars. Highs and
    /// lows sit one unit around the close; volume is 100 everywhere.
    pub(crate) fn build_series(anchors: &[(usize, f64)], n: usize) -> BarSeries {
        assert!(!anchors.is_empty());
        let mut closes = vec![anchors[0].1; n];
        for pair in anchors.windows(2) {
            let (start_idx, start_price) = pair[0];
            let (end_idx, end_price) = pair[1];
            assert!(end_idx > start_idx && end_idx < n);
            let span = (end_idx - start_idx) as f64;
            for i in start_idx..=end_idx {
                let t = (i - start_idx) as f64 / span;
                closes[i] = start_price + (end_price - start_price) * t;
            }
        }
        let last = anchors.last().unwrap();
        for close in closes.iter_mut().skip(last.0) {
            *close = last.1;
        }
        BarSeries {
            time: (0..n as i64).collect(),
            open: closes.clone(),
            high: closes.iter().map(|c| c + 1.0).collect(),
            low: closes.iter().map(|c| c - 1.0).collect(),
            close: closes,
            volume: vec![100.0; n],
        }
    }
}

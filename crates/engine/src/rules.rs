//! Stateless validation rules shared by the pattern validators.
//!
//! Every rule is a pure function of the candidate pivots, the bar series,
//! and the precomputed indicator columns. NaN indicator values mean
//! "insufficient evidence": the rule returns false rather than erroring.

use crate::config::{ContextConfig, MacdConfig, RetestConfig, RsiConfig, StochConfig, VolumeConfig};
use crate::indicators::IndicatorColumns;
use crate::types::{BarSeries, Direction, Pivot, PivotKind};

/// Result of the RSI divergence assessment: a weak divergence plus an
/// optional strength upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DivergenceStrength {
    pub divergent: bool,
    pub strong: bool,
}

/// Result of the stochastic confirmation: %K divergence between the
/// extremes and a %K/%D cross near the window end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StochasticConfirmation {
    pub divergence: bool,
    pub cross: bool,
}

/// The pivot is the strict extremum of a context window around it.
///
/// The window spans `max(min_bars, factor * avg_pivot_spacing)` bars in
/// total: half on each side when centered, or all strictly before the
/// pivot (`past_only`). The pivot's own bar is excluded; an empty window
/// fails closed.
pub fn extremity_in_context(
    series: &BarSeries,
    pivot: &Pivot,
    avg_pivot_spacing: f64,
    cfg: &ContextConfig,
    past_only: bool,
) -> bool {
    let window_bars = ((avg_pivot_spacing * cfg.head_extreme_lookback_factor).round() as usize)
        .max(cfg.min_bars);
    let n = series.len();
    if n == 0 || pivot.idx >= n {
        return false;
    }
    let (start, end) = if past_only {
        (pivot.idx.saturating_sub(window_bars), pivot.idx)
    } else {
        let half = (window_bars / 2).max(1);
        (
            pivot.idx.saturating_sub(half),
            (pivot.idx + half + 1).min(n),
        )
    };
    if start >= end || (start..end).all(|j| j == pivot.idx) {
        return false;
    }
    (start..end).filter(|&j| j != pivot.idx).all(|j| match pivot.kind {
        PivotKind::Peak => series.close[j] < pivot.price,
        PivotKind::Valley => series.close[j] > pivot.price,
    })
}

/// The two neckline anchors lie within `tolerance * reference_height` of
/// each other.
pub fn neckline_flatness(a: f64, b: f64, reference_height: f64, tolerance: f64) -> bool {
    reference_height > 0.0 && (a - b).abs() <= reference_height * tolerance
}

/// All extremes lie within `tolerance_factor * pattern_height` of each
/// other.
pub fn symmetry_extremes(extremes: &[f64], pattern_height: f64, tolerance_factor: f64) -> bool {
    if pattern_height <= 0.0 || extremes.len() < 2 {
        return false;
    }
    let max = extremes.iter().cloned().fold(f64::MIN, f64::max);
    let min = extremes.iter().cloned().fold(f64::MAX, f64::min);
    max - min <= pattern_height * tolerance_factor
}

/// Price trended into the pattern: higher high and higher low before a top
/// pattern, lower high and lower low before a bottom pattern, each by at
/// least `min_diff_factor * pattern_height`.
pub fn trend_context(
    base: &Pivot,
    first_extreme: &Pivot,
    middle: &Pivot,
    pattern_height: f64,
    min_diff_factor: f64,
    direction: Direction,
) -> bool {
    if pattern_height <= 0.0 {
        return false;
    }
    let min_diff = pattern_height * min_diff_factor;
    match direction {
        // Top pattern: rising into it.
        Direction::Bearish => {
            first_extreme.price - base.price >= min_diff && middle.price - base.price >= min_diff
        }
        // Bottom pattern: falling into it.
        Direction::Bullish => {
            base.price - first_extreme.price >= min_diff && base.price - middle.price >= min_diff
        }
    }
}

/// The base pivot sits strictly on the far side of both neckline anchors:
/// below for a top pattern, above for a bottom pattern.
pub fn base_trend(base: &Pivot, neck_a: f64, neck_b: f64, direction: Direction) -> bool {
    match direction {
        Direction::Bearish => base.price < neck_a && base.price < neck_b,
        Direction::Bullish => base.price > neck_a && base.price > neck_b,
    }
}

/// RSI divergence between the two extremes, gated on the first extreme
/// having reached the overbought (bearish) or oversold (bullish) zone.
///
/// `require_price_order` asserts the second extreme is beyond the first in
/// the pattern direction (head vs. shoulder); symmetric patterns skip it.
pub fn rsi_divergence_strength(
    ind: &IndicatorColumns,
    first: &Pivot,
    second: &Pivot,
    direction: Direction,
    cfg: &RsiConfig,
    require_price_order: bool,
) -> DivergenceStrength {
    let column = match direction {
        Direction::Bearish => &ind.rsi_high,
        Direction::Bullish => &ind.rsi_low,
    };
    let (Some(rsi_1), Some(rsi_2)) = (column.get(first.idx), column.get(second.idx)) else {
        return DivergenceStrength::default();
    };
    if !rsi_1.is_finite() || !rsi_2.is_finite() {
        return DivergenceStrength::default();
    }
    let (gated, price_ok, diverging, delta, strong_zone) = match direction {
        Direction::Bearish => (
            *rsi_1 >= cfg.overbought,
            !require_price_order || second.price > first.price,
            rsi_2 < rsi_1,
            rsi_1 - rsi_2,
            *rsi_1 >= cfg.strong_overbought,
        ),
        Direction::Bullish => (
            *rsi_1 <= cfg.oversold,
            !require_price_order || second.price < first.price,
            rsi_2 > rsi_1,
            rsi_2 - rsi_1,
            *rsi_1 <= cfg.strong_oversold,
        ),
    };
    let divergent = gated && price_ok && diverging;
    DivergenceStrength {
        divergent,
        strong: divergent && (strong_zone || delta >= cfg.divergence_min_delta),
    }
}

/// MACD histogram weakens between the two extremes.
pub fn macd_histogram_divergence(
    ind: &IndicatorColumns,
    first: &Pivot,
    second: &Pivot,
    direction: Direction,
    require_price_order: bool,
) -> bool {
    let (Some(h1), Some(h2)) = (ind.macd_hist.get(first.idx), ind.macd_hist.get(second.idx))
    else {
        return false;
    };
    if !h1.is_finite() || !h2.is_finite() {
        return false;
    }
    match direction {
        Direction::Bearish => (!require_price_order || second.price > first.price) && h2 < h1,
        Direction::Bullish => (!require_price_order || second.price < first.price) && h2 > h1,
    }
}

/// The MACD line crossed its signal in the pattern direction, with the most
/// recent matching cross at most `cross_max_age_bars` before `at_idx`.
pub fn macd_signal_cross(
    ind: &IndicatorColumns,
    at_idx: usize,
    direction: Direction,
    cfg: &MacdConfig,
) -> bool {
    if at_idx >= ind.macd.len() {
        return false;
    }
    let start = at_idx.saturating_sub(cfg.signal_cross_lookback_bars);
    let mut latest_cross = None;
    for j in (start + 1)..=at_idx {
        let prev = ind.macd[j - 1] - ind.macd_signal[j - 1];
        let curr = ind.macd[j] - ind.macd_signal[j];
        if !prev.is_finite() || !curr.is_finite() {
            continue;
        }
        let crossed = match direction {
            Direction::Bearish => prev >= 0.0 && curr < 0.0,
            Direction::Bullish => prev <= 0.0 && curr > 0.0,
        };
        if crossed {
            latest_cross = Some(j);
        }
    }
    latest_cross.is_some_and(|j| at_idx - j <= cfg.cross_max_age_bars)
}

/// Stochastic confirmation: %K divergence between the extremes plus a
/// %K/%D cross in the pattern direction near the window end. With
/// `require_obos` both checks are gated on the first extreme's %K having
/// reached the overbought/oversold zone.
pub fn stochastic_confirmation(
    ind: &IndicatorColumns,
    first: &Pivot,
    second: &Pivot,
    at_idx: usize,
    direction: Direction,
    cfg: &StochConfig,
) -> StochasticConfirmation {
    let (Some(k1), Some(k2)) = (ind.stoch_k.get(first.idx), ind.stoch_k.get(second.idx)) else {
        return StochasticConfirmation::default();
    };
    if !k1.is_finite() || !k2.is_finite() {
        return StochasticConfirmation::default();
    }
    let gate = !cfg.require_obos
        || match direction {
            Direction::Bearish => *k1 >= cfg.overbought,
            Direction::Bullish => *k1 <= cfg.oversold,
        };
    if !gate {
        return StochasticConfirmation::default();
    }

    let divergence = match direction {
        Direction::Bearish => k1 - k2 >= cfg.divergence_min_delta && k2 < k1,
        Direction::Bullish => k2 - k1 >= cfg.divergence_min_delta && k2 > k1,
    };

    let mut cross = false;
    if at_idx < ind.stoch_k.len() {
        let start = at_idx.saturating_sub(cfg.cross_lookback_bars);
        for j in (start + 1)..=at_idx {
            let prev = ind.stoch_k[j - 1] - ind.stoch_d[j - 1];
            let curr = ind.stoch_k[j] - ind.stoch_d[j];
            if !prev.is_finite() || !curr.is_finite() {
                continue;
            }
            let crossed = match direction {
                Direction::Bearish => prev >= 0.0 && curr < 0.0,
                Direction::Bullish => prev <= 0.0 && curr > 0.0,
            };
            if crossed {
                cross = true;
            }
        }
    }

    StochasticConfirmation { divergence, cross }
}

/// OBV slope contradicts price between the two extremes.
pub fn obv_divergence(
    ind: &IndicatorColumns,
    first: &Pivot,
    second: &Pivot,
    direction: Direction,
) -> bool {
    let (Some(o1), Some(o2)) = (ind.obv.get(first.idx), ind.obv.get(second.idx)) else {
        return false;
    };
    if !o1.is_finite() || !o2.is_finite() {
        return false;
    }
    match direction {
        Direction::Bearish => o2 < o1,
        Direction::Bullish => o2 > o1,
    }
}

fn mean_volume(series: &BarSeries, start: usize, end: usize) -> Option<f64> {
    if start > end || end >= series.len() {
        return None;
    }
    let window = &series.volume[start..=end];
    if window.is_empty() || window.iter().any(|v| !v.is_finite()) {
        return None;
    }
    Some(window.iter().sum::<f64>() / window.len() as f64)
}

/// Head-and-shoulders volume profile: the head leg carries more volume
/// than the right-shoulder leg.
pub fn volume_profile_hns(series: &BarSeries, p2: &Pivot, p3: &Pivot, p4: &Pivot, p5: &Pivot) -> bool {
    match (
        mean_volume(series, p2.idx, p3.idx),
        mean_volume(series, p4.idx, p5.idx),
    ) {
        (Some(head), Some(right)) => head > right,
        _ => false,
    }
}

/// Volume decreases across successive extreme legs; each leg must start at
/// least one bar into the series.
pub fn volume_profile_decreasing(series: &BarSeries, legs: &[(usize, usize)]) -> bool {
    if legs.len() < 2 || legs.iter().any(|(start, _)| *start < 1) {
        return false;
    }
    let mut previous: Option<f64> = None;
    for (start, end) in legs {
        let Some(mean) = mean_volume(series, *start, *end) else {
            return false;
        };
        if let Some(prev) = previous {
            if mean >= prev {
                return false;
            }
        }
        previous = Some(mean);
    }
    true
}

/// First bar after `start_idx` whose close strictly crosses the neckline in
/// the breakout direction, searched over at most `max_bars` bars.
pub fn find_breakout(
    series: &BarSeries,
    neckline: f64,
    start_idx: usize,
    direction: Direction,
    max_bars: usize,
) -> Option<usize> {
    let n = series.len();
    let end = (start_idx + max_bars).min(n.saturating_sub(1));
    for i in (start_idx + 1)..=end {
        let crossed = match direction {
            Direction::Bearish => series.close[i] < neckline,
            Direction::Bullish => series.close[i] > neckline,
        };
        if crossed {
            return Some(i);
        }
    }
    None
}

/// Breakout bar volume is at least `multiplier` times the mean volume of
/// the preceding lookback window.
pub fn breakout_volume(series: &BarSeries, breakout_idx: usize, cfg: &VolumeConfig) -> bool {
    if breakout_idx == 0 || breakout_idx >= series.len() {
        return false;
    }
    let start = breakout_idx.saturating_sub(cfg.lookback_bars);
    let Some(baseline) = mean_volume(series, start, breakout_idx - 1) else {
        return false;
    };
    baseline > 0.0 && series.volume[breakout_idx] >= cfg.multiplier * baseline
}

/// The retest pivot lies within `max(atr_multiplier * ATR, pct_of_neckline
/// * neckline)` of the neckline.
pub fn neckline_retest(
    ind: &IndicatorColumns,
    retest: &Pivot,
    neckline: f64,
    cfg: &RetestConfig,
) -> bool {
    let atr_term = ind
        .atr
        .get(retest.idx)
        .filter(|atr| atr.is_finite() && **atr > 0.0)
        .map(|atr| cfg.atr_multiplier * atr)
        .unwrap_or(0.0);
    let tolerance = atr_term.max(cfg.pct_of_neckline * neckline.abs());
    (retest.price - neckline).abs() <= tolerance
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScanConfig;
    use crate::indicators::enrich;

    fn series_from_closes(closes: &[f64], volumes: &[f64]) -> BarSeries {
        BarSeries {
            time: (0..closes.len() as i64).collect(),
            open: closes.to_vec(),
            high: closes.iter().map(|c| c + 1.0).collect(),
            low: closes.iter().map(|c| c - 1.0).collect(),
            close: closes.to_vec(),
            volume: volumes.to_vec(),
        }
    }

    fn peak(idx: usize, price: f64) -> Pivot {
        Pivot { idx, price, kind: PivotKind::Peak }
    }

    fn valley(idx: usize, price: f64) -> Pivot {
        Pivot { idx, price, kind: PivotKind::Valley }
    }

    #[test]
    fn test_extremity_excludes_own_bar_and_is_strict() {
        let mut closes = vec![100.0; 40];
        closes[20] = 110.0;
        let series = series_from_closes(&closes, &vec![100.0; 40]);
        let cfg = ContextConfig::default();
        assert!(extremity_in_context(&series, &peak(20, 110.0), 4.0, &cfg, false));

        // A second bar at the same price inside the window breaks strictness.
        let mut closes = vec![100.0; 40];
        closes[20] = 110.0;
        closes[24] = 110.0;
        let series = series_from_closes(&closes, &vec![100.0; 40]);
        assert!(!extremity_in_context(&series, &peak(20, 110.0), 4.0, &cfg, false));
    }

    #[test]
    fn test_extremity_past_only_ignores_future() {
        let mut closes = vec![100.0; 40];
        closes[20] = 110.0;
        closes[24] = 120.0;
        let series = series_from_closes(&closes, &vec![100.0; 40]);
        let cfg = ContextConfig::default();
        // Centered window sees the higher future bar.
        assert!(!extremity_in_context(&series, &peak(20, 110.0), 5.0, &cfg, false));
        // Past-only does not.
        assert!(extremity_in_context(&series, &peak(20, 110.0), 5.0, &cfg, true));
    }

    #[test]
    fn test_breakout_is_strict() {
        let mut closes = vec![100.0; 30];
        closes[12] = 98.0; // equal-to-neckline bar first
        closes[11] = 98.0;
        closes[15] = 97.0;
        let series = series_from_closes(&closes, &vec![100.0; 30]);
        // close == neckline is not a breakout
        assert_eq!(find_breakout(&series, 98.0, 5, Direction::Bearish, 30), Some(15));
        assert_eq!(find_breakout(&series, 90.0, 5, Direction::Bearish, 30), None);
    }

    #[test]
    fn test_breakout_search_window_is_bounded() {
        let mut closes = vec![100.0; 60];
        closes[50] = 90.0;
        let series = series_from_closes(&closes, &vec![100.0; 60]);
        assert_eq!(find_breakout(&series, 95.0, 10, Direction::Bearish, 20), None);
        assert_eq!(find_breakout(&series, 95.0, 10, Direction::Bearish, 40), Some(50));
    }

    #[test]
    fn test_breakout_volume_multiplier() {
        let closes = vec![100.0; 40];
        let mut volumes = vec![100.0; 40];
        volumes[30] = 200.0;
        let series = series_from_closes(&closes, &volumes);
        let cfg = VolumeConfig::default();
        assert!(breakout_volume(&series, 30, &cfg));

        volumes[30] = 150.0; // below the 1.8x default
        let series = series_from_closes(&closes, &volumes);
        assert!(!breakout_volume(&series, 30, &cfg));
    }

    #[test]
    fn test_neckline_retest_atr_and_fallback() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64 * 0.5).sin()).collect();
        let series = series_from_closes(&closes, &vec![100.0; 60]);
        let ind = enrich(&series, &ScanConfig::default());
        let cfg = RetestConfig::default();
        // ATR is ~2 (high-low band of 2), tolerance ~10.
        assert!(neckline_retest(&ind, &valley(50, 95.0), 100.0, &cfg));
        assert!(!neckline_retest(&ind, &valley(50, 80.0), 100.0, &cfg));

        // Before ATR is defined the 1% fallback applies.
        assert!(neckline_retest(&ind, &valley(5, 100.9), 100.0, &cfg));
        assert!(!neckline_retest(&ind, &valley(5, 95.0), 100.0, &cfg));
    }

    #[test]
    fn test_trend_context_directions() {
        let height = 10.0;
        // Rising into a top: base below extreme and middle.
        assert!(trend_context(
            &valley(0, 90.0),
            &peak(10, 105.0),
            &valley(20, 98.0),
            height,
            0.01,
            Direction::Bearish,
        ));
        assert!(!trend_context(
            &valley(0, 99.0),
            &peak(10, 105.0),
            &valley(20, 98.9),
            height,
            0.5,
            Direction::Bearish,
        ));
        // Falling into a bottom.
        assert!(trend_context(
            &peak(0, 110.0),
            &valley(10, 95.0),
            &peak(20, 102.0),
            height,
            0.01,
            Direction::Bullish,
        ));
    }

    #[test]
    fn test_symmetry_and_flatness() {
        assert!(symmetry_extremes(&[100.0, 101.0], 10.0, 0.35));
        assert!(!symmetry_extremes(&[100.0, 100.0, 140.0], 10.0, 0.35));
        assert!(neckline_flatness(100.0, 101.0, 4.0, 0.25));
        assert!(!neckline_flatness(100.0, 102.0, 4.0, 0.25));
        assert!(!neckline_flatness(100.0, 100.0, 0.0, 0.25));
    }

    #[test]
    fn test_volume_profile_decreasing() {
        let closes = vec![100.0; 40];
        let mut volumes = vec![50.0; 40];
        for v in volumes.iter_mut().take(15).skip(5) {
            *v = 200.0;
        }
        for v in volumes.iter_mut().take(30).skip(20) {
            *v = 100.0;
        }
        let series = series_from_closes(&closes, &volumes);
        assert!(volume_profile_decreasing(&series, &[(5, 15), (20, 30)]));
        assert!(!volume_profile_decreasing(&series, &[(20, 30), (5, 15)]));
        // Legs touching the series start are rejected.
        assert!(!volume_profile_decreasing(&series, &[(0, 15), (20, 30)]));
    }
}

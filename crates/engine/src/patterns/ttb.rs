//! Triple top (TT) and triple bottom (TB) detection.
//!
//! Same validation flow as DT/DB widened to three matched extremes: the
//! first extreme's context is judged against past bars only, symmetry spans
//! all three extremes, and the neckline is the mean of the two intervening
//! pivots.

use crate::config::flag;
use crate::rules;
use crate::types::{Direction, PatternKind, Pivot, PivotKind};

use super::{alternation, kinds_match, window_starts, Evaluation, RuleScorer, ValidationContext};

/// Enumerate 7-pivot windows and keep the accepted candidates.
pub fn find_patterns(pivots: &[Pivot], ctx: &ValidationContext) -> Vec<Evaluation> {
    let mut found = Vec::new();
    for i in window_starts(pivots.len(), 7, ctx.config.recent_patterns_lookback_count) {
        if let Some(eval) = validate(&pivots[i..i + 7], ctx) {
            if eval.accepted {
                found.push(eval);
            }
        }
    }
    found
}

/// Validate one 7-pivot window. Returns None when the kinds form neither a
/// TT nor a TB shape.
pub fn validate(window: &[Pivot], ctx: &ValidationContext) -> Option<Evaluation> {
    if window.len() != 7 {
        return None;
    }
    let kind = if kinds_match(window, &alternation(PivotKind::Valley, 7)) {
        PatternKind::Tt
    } else if kinds_match(window, &alternation(PivotKind::Peak, 7)) {
        PatternKind::Tb
    } else {
        return None;
    };
    Some(validate_candidate(kind, window, ctx))
}

fn reject(
    kind: PatternKind,
    window: &[Pivot],
    scorer: RuleScorer<'_>,
    rule: &'static str,
    breakout_idx: Option<usize>,
) -> Evaluation {
    let score_total = scorer.score();
    Evaluation {
        kind,
        pivots: window.to_vec(),
        flags: scorer.into_flags(),
        score_total,
        accepted: false,
        breakout_idx,
        failed_rule: Some(rule),
    }
}

fn validate_candidate(kind: PatternKind, window: &[Pivot], ctx: &ValidationContext) -> Evaluation {
    let cfg = ctx.config;
    let (p0, p1, p2, p3, p4, p5, p6) = (
        &window[0], &window[1], &window[2], &window[3], &window[4], &window[5], &window[6],
    );
    let direction = kind.direction();
    let neckline = (p2.price + p4.price) / 2.0;
    let pattern_height = (p1.price - neckline).abs();

    let mut scorer = RuleScorer::new(cfg.weights_for(kind.family()));

    let beyond = |extreme: f64, anchor: f64| match direction {
        Direction::Bearish => extreme > anchor,
        Direction::Bullish => extreme < anchor,
    };
    let structure = beyond(p1.price, p2.price)
        && beyond(p3.price, p2.price)
        && beyond(p3.price, p4.price)
        && beyond(p5.price, p4.price)
        && beyond(p1.price, p0.price)
        && !beyond(p0.price, p2.price)
        && !beyond(p0.price, p4.price);
    if !scorer.set(flag::ESTRUTURA_PICOS_VALES, structure) {
        ctx.debug.rejection(kind, flag::ESTRUTURA_PICOS_VALES, || {
            format!(
                "extremes {}/{}/{} vs anchors {}/{} break the shape",
                p1.price, p3.price, p5.price, p2.price, p4.price
            )
        });
        return reject(kind, window, scorer, flag::ESTRUTURA_PICOS_VALES, None);
    }

    let in_context = rules::extremity_in_context(
        ctx.series,
        p1,
        ctx.avg_pivot_spacing,
        &cfg.context,
        true,
    ) && rules::extremity_in_context(
        ctx.series,
        p3,
        ctx.avg_pivot_spacing,
        &cfg.context,
        false,
    ) && rules::extremity_in_context(
        ctx.series,
        p5,
        ctx.avg_pivot_spacing,
        &cfg.context,
        false,
    );
    if !scorer.set(flag::CONTEXTO_EXTREMOS, in_context) {
        ctx.debug.rejection(kind, flag::CONTEXTO_EXTREMOS, || {
            format!("extremes at {}/{}/{} are not window extrema", p1.idx, p3.idx, p5.idx)
        });
        return reject(kind, window, scorer, flag::CONTEXTO_EXTREMOS, None);
    }

    let trended = rules::trend_context(
        p0,
        p1,
        p2,
        pattern_height,
        cfg.dtb.trend_min_diff_factor,
        direction,
    );
    if !scorer.set(flag::CONTEXTO_TENDENCIA, trended) {
        ctx.debug.rejection(kind, flag::CONTEXTO_TENDENCIA, || {
            format!("base {} does not trend into the pattern", p0.price)
        });
        return reject(kind, window, scorer, flag::CONTEXTO_TENDENCIA, None);
    }

    let symmetric = rules::symmetry_extremes(
        &[p1.price, p3.price, p5.price],
        pattern_height,
        cfg.dtb.symmetry_tolerance_factor,
    );
    if !scorer.set(flag::SIMETRIA_EXTREMOS, symmetric) {
        ctx.debug.rejection(kind, flag::SIMETRIA_EXTREMOS, || {
            format!(
                "extremes {}/{}/{} outside {} of height {pattern_height:.4}",
                p1.price, p3.price, p5.price, cfg.dtb.symmetry_tolerance_factor
            )
        });
        return reject(kind, window, scorer, flag::SIMETRIA_EXTREMOS, None);
    }

    let leg = (p1.price - p0.price).abs();
    let depth_first = (p1.price - p2.price).abs();
    let depth_second = (p3.price - p4.price).abs();
    let deep_enough =
        leg > 0.0 && depth_first.min(depth_second) >= cfg.dtb.depth_ratio * leg;
    if !scorer.set(flag::PROFUNDIDADE_VALE_PICO, deep_enough) {
        ctx.debug.rejection(kind, flag::PROFUNDIDADE_VALE_PICO, || {
            format!("depths {depth_first:.4}/{depth_second:.4} vs leg {leg:.4}")
        });
        return reject(kind, window, scorer, flag::PROFUNDIDADE_VALE_PICO, None);
    }

    let flat = rules::neckline_flatness(
        p2.price,
        p4.price,
        pattern_height,
        cfg.dtb.symmetry_tolerance_factor,
    );
    if !scorer.set(flag::NECKLINE_PLANA, flat) {
        ctx.debug.rejection(kind, flag::NECKLINE_PLANA, || {
            format!("anchors {}/{} vs height {pattern_height:.4}", p2.price, p4.price)
        });
        return reject(kind, window, scorer, flag::NECKLINE_PLANA, None);
    }

    let breakout_idx = rules::find_breakout(
        ctx.series,
        neckline,
        p5.idx,
        direction,
        cfg.volume.search_max_bars,
    );
    let breakout_ok = breakout_idx.is_some_and(|idx| idx <= p6.idx);
    if !scorer.set(flag::BREAKOUT_NECKLINE, breakout_ok) {
        ctx.debug.rejection(kind, flag::BREAKOUT_NECKLINE, || {
            format!("no strict neckline cross in ({}, {}]", p5.idx, p6.idx)
        });
        return reject(kind, window, scorer, flag::BREAKOUT_NECKLINE, breakout_idx);
    }

    let retest_ok = rules::neckline_retest(ctx.indicators, p6, neckline, &cfg.retest);
    if !scorer.set(flag::NECKLINE_RETEST_P6, retest_ok) {
        ctx.debug.rejection(kind, flag::NECKLINE_RETEST_P6, || {
            format!("retest {} too far from neckline {neckline:.4}", p6.price)
        });
        return reject(kind, window, scorer, flag::NECKLINE_RETEST_P6, breakout_idx);
    }

    // Optional confirmations, first vs. third extreme.
    scorer.set(
        flag::PERFIL_VOLUME_DECRESCENTE,
        rules::volume_profile_decreasing(
            ctx.series,
            &[(p0.idx, p1.idx), (p2.idx, p3.idx), (p4.idx, p5.idx)],
        ),
    );
    scorer.set(
        flag::DIVERGENCIA_OBV,
        rules::obv_divergence(ctx.indicators, p1, p5, direction),
    );
    let rsi = rules::rsi_divergence_strength(ctx.indicators, p1, p5, direction, &cfg.rsi, false);
    scorer.set(flag::DIVERGENCIA_RSI, rsi.divergent);
    scorer.set(flag::DIVERGENCIA_RSI_STRONG, rsi.strong);
    scorer.set(
        flag::DIVERGENCIA_MACD,
        rules::macd_histogram_divergence(ctx.indicators, p1, p5, direction, false),
    );
    scorer.set(
        flag::MACD_SIGNAL_CROSS,
        rules::macd_signal_cross(ctx.indicators, p6.idx, direction, &cfg.macd),
    );
    let stoch =
        rules::stochastic_confirmation(ctx.indicators, p1, p5, p6.idx, direction, &cfg.stoch);
    scorer.set(flag::ESTOCASTICO_DIVERGENCIA, stoch.divergence);
    scorer.set(flag::ESTOCASTICO_CROSS, stoch.cross);
    scorer.set(
        flag::VOLUME_BREAKOUT_NECKLINE,
        breakout_idx.is_some_and(|idx| rules::breakout_volume(ctx.series, idx, &cfg.volume)),
    );

    let score_total = scorer.score();
    let accepted = scorer.all_mandatory_passed() && score_total >= cfg.minimum_score_ttb;
    if !accepted {
        ctx.debug.rejection(kind, "minimum_score", || {
            format!("score {score_total} below {}", cfg.minimum_score_ttb)
        });
    }
    Evaluation {
        kind,
        pivots: window.to_vec(),
        flags: scorer.into_flags(),
        score_total,
        accepted,
        breakout_idx,
        failed_rule: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScanConfig;
    use crate::debuglog::DebugLogger;
    use crate::indicators::enrich;
    use crate::patterns::testutil::{build_series, peak, valley};
    use crate::types::BarSeries;

    /// Triple top: three matched peaks near 100, neckline near 92,
    /// breakdown at bar 50, retest valley at 91.5.
    fn tt_fixture() -> (BarSeries, Vec<Pivot>) {
        let anchors = [
            (0, 88.0),
            (6, 86.0),
            (14, 100.0),
            (22, 92.0),
            (30, 100.6),
            (38, 92.4),
            (46, 99.6),
            (50, 91.8),
            (52, 91.5),
            (58, 95.0),
        ];
        let mut series = build_series(&anchors, 70);
        series.volume[50] = 300.0;
        let pivots = vec![
            valley(6, 86.0),
            peak(14, 100.0),
            valley(22, 92.0),
            peak(30, 100.6),
            valley(38, 92.4),
            peak(46, 99.6),
            valley(52, 91.5),
        ];
        (series, pivots)
    }

    fn run(series: &BarSeries, pivots: &[Pivot], spacing: f64) -> Evaluation {
        let cfg = ScanConfig::default();
        let ind = enrich(series, &cfg);
        let dbg = DebugLogger::disabled();
        let ctx = ValidationContext {
            series,
            indicators: &ind,
            config: &cfg,
            avg_pivot_spacing: spacing,
            debug: &dbg,
        };
        validate(pivots, &ctx).expect("window kinds form a TT/TB")
    }

    #[test]
    fn test_flat_triple_top_is_accepted() {
        let (series, pivots) = tt_fixture();
        let eval = run(&series, &pivots, 7.7);
        assert_eq!(eval.kind, PatternKind::Tt);
        assert_eq!(eval.failed_rule, None);
        assert_eq!(eval.breakout_idx, Some(50));
        assert_eq!(eval.flag(flag::SIMETRIA_EXTREMOS), Some(true));
        assert_eq!(eval.flag(flag::VOLUME_BREAKOUT_NECKLINE), Some(true));
        assert!(eval.accepted);
    }

    #[test]
    fn test_outsized_third_peak_is_rejected_at_symmetry() {
        let (series, mut pivots) = tt_fixture();
        pivots[5].price = 140.0;
        let eval = run(&series, &pivots, 7.7);
        assert!(!eval.accepted);
        assert_eq!(eval.failed_rule, Some(flag::SIMETRIA_EXTREMOS));
        assert_eq!(eval.flag(flag::SIMETRIA_EXTREMOS), Some(false));
        // The structural gates before symmetry still held.
        assert_eq!(eval.flag(flag::ESTRUTURA_PICOS_VALES), Some(true));
        assert_eq!(eval.flag(flag::CONTEXTO_EXTREMOS), Some(true));
    }

    #[test]
    fn test_first_extreme_context_is_past_only() {
        let (mut series, pivots) = tt_fixture();
        // A spike between the first and second peak: a centered window
        // around p1 would see it, the past-only window must not.
        series.close[17] = 101.0;
        series.high[17] = 102.0;
        series.low[17] = 100.0;
        let cfg = ScanConfig::default();
        let ind = enrich(&series, &cfg);
        let dbg = DebugLogger::disabled();
        let ctx = ValidationContext {
            series: &series,
            indicators: &ind,
            config: &cfg,
            avg_pivot_spacing: 7.7,
            debug: &dbg,
        };
        assert!(!crate::rules::extremity_in_context(
            &series,
            &pivots[1],
            7.7,
            &cfg.context,
            false,
        ));
        let eval = validate(&pivots, &ctx).unwrap();
        assert_eq!(eval.flag(flag::CONTEXTO_EXTREMOS), Some(true));
    }
}

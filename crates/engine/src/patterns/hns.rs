//! Head-and-shoulders (OCO) and inverse (OCOI) detection.

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

/// Validate one 7-pivot window. Returns None when the kinds form neither an
/// OCO nor an OCOI shape.
pub fn validate(window: &[Pivot], ctx: &ValidationContext) -> Option<Evaluation> {
    if window.len() != 7 {
        return None;
    }
    let kind = if kinds_match(window, &alternation(PivotKind::Valley, 7)) {
        PatternKind::Oco
    } else if kinds_match(window, &alternation(PivotKind::Peak, 7)) {
        PatternKind::Ocoi
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
    let head_height = (p3.price - neckline).abs();
    let left_height = (p1.price - neckline).abs();
    let right_height = (p5.price - neckline).abs();

    let mut scorer = RuleScorer::new(cfg.weights_for(kind.family()));

    let head_extreme = match direction {
        Direction::Bearish => p3.price > p1.price && p3.price > p5.price,
        Direction::Bullish => p3.price < p1.price && p3.price < p5.price,
    };
    if !scorer.set(flag::EXTREMO_CABECA, head_extreme) {
        ctx.debug.rejection(kind, flag::EXTREMO_CABECA, || {
            format!("head {} vs shoulders {}/{}", p3.price, p1.price, p5.price)
        });
        return reject(kind, window, scorer, flag::EXTREMO_CABECA, None);
    }

    let in_context =
        rules::extremity_in_context(ctx.series, p3, ctx.avg_pivot_spacing, &cfg.context, false);
    if !scorer.set(flag::CONTEXTO_CABECA, in_context) {
        ctx.debug.rejection(kind, flag::CONTEXTO_CABECA, || {
            format!("head idx {} is not the window extremum", p3.idx)
        });
        return reject(kind, window, scorer, flag::CONTEXTO_CABECA, None);
    }

    let symmetric = head_height > 0.0
        && (left_height - right_height).abs()
            <= head_height * cfg.hns.shoulder_symmetry_tolerance;
    if !scorer.set(flag::SIMETRIA_OMBROS, symmetric) {
        ctx.debug.rejection(kind, flag::SIMETRIA_OMBROS, || {
            format!(
                "shoulder heights {left_height:.4}/{right_height:.4} vs head {head_height:.4}"
            )
        });
        return reject(kind, window, scorer, flag::SIMETRIA_OMBROS, None);
    }

    let mean_shoulder = (left_height + right_height) / 2.0;
    let flat = rules::neckline_flatness(
        p2.price,
        p4.price,
        mean_shoulder,
        cfg.hns.neckline_flatness_tolerance,
    );
    if !scorer.set(flag::NECKLINE_PLANA, flat) {
        ctx.debug.rejection(kind, flag::NECKLINE_PLANA, || {
            format!("anchors {}/{} vs shoulder height {mean_shoulder:.4}", p2.price, p4.price)
        });
        return reject(kind, window, scorer, flag::NECKLINE_PLANA, None);
    }

    let base_ok = rules::base_trend(p0, p2.price, p4.price, direction);
    if !scorer.set(flag::BASE_TENDENCIA, base_ok) {
        ctx.debug.rejection(kind, flag::BASE_TENDENCIA, || {
            format!("base {} vs anchors {}/{}", p0.price, p2.price, p4.price)
        });
        return reject(kind, window, scorer, flag::BASE_TENDENCIA, None);
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

    // Optional confirmations.
    let rsi = rules::rsi_divergence_strength(ctx.indicators, p1, p3, direction, &cfg.rsi, true);
    scorer.set(flag::DIVERGENCIA_RSI, rsi.divergent);
    scorer.set(flag::DIVERGENCIA_RSI_STRONG, rsi.strong);
    scorer.set(
        flag::DIVERGENCIA_MACD,
        rules::macd_histogram_divergence(ctx.indicators, p1, p3, direction, true),
    );
    scorer.set(
        flag::MACD_SIGNAL_CROSS,
        rules::macd_signal_cross(ctx.indicators, p6.idx, direction, &cfg.macd),
    );
    let stoch =
        rules::stochastic_confirmation(ctx.indicators, p1, p3, p6.idx, direction, &cfg.stoch);
    scorer.set(flag::ESTOCASTICO_DIVERGENCIA, stoch.divergence);
    scorer.set(flag::ESTOCASTICO_CROSS, stoch.cross);

    let prominent = left_height > 0.0
        && right_height > 0.0
        && head_height / left_height >= cfg.hns.head_significance_ratio
        && head_height / right_height >= cfg.hns.head_significance_ratio;
    scorer.set(flag::PROEMINENCIA_CABECA, prominent);

    let weak_right = match direction {
        Direction::Bearish => p5.price < p1.price,
        Direction::Bullish => p5.price > p1.price,
    };
    scorer.set(flag::OMBRO_DIREITO_FRACO, weak_right);
    scorer.set(
        flag::PERFIL_VOLUME,
        rules::volume_profile_hns(ctx.series, p2, p3, p4, p5),
    );
    scorer.set(
        flag::VOLUME_BREAKOUT_NECKLINE,
        breakout_idx.is_some_and(|idx| rules::breakout_volume(ctx.series, idx, &cfg.volume)),
    );

    let score_total = scorer.score();
    let accepted = scorer.all_mandatory_passed() && score_total >= cfg.minimum_score_hns;
    if !accepted {
        ctx.debug.rejection(kind, "minimum_score", || {
            format!("score {score_total} below {}", cfg.minimum_score_hns)
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

    /// Canonical OCO: base 95, shoulders 105/104, head 110, neckline
    /// 100/101, breakdown at bar 65, retest valley at 96.5.
    fn oco_fixture() -> (crate::types::BarSeries, Vec<Pivot>) {
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
        let pivots = vec![
            valley(10, 95.0),
            peak(20, 105.0),
            valley(30, 100.0),
            peak(40, 110.0),
            valley(50, 101.0),
            peak(60, 104.0),
            valley(66, 96.5),
        ];
        (series, pivots)
    }

    #[test]
    fn test_canonical_oco_is_accepted() {
        let (series, pivots) = oco_fixture();
        let cfg = ScanConfig::default();
        let ind = enrich(&series, &cfg);
        let dbg = DebugLogger::disabled();
        let ctx = ValidationContext {
            series: &series,
            indicators: &ind,
            config: &cfg,
            avg_pivot_spacing: 9.3,
            debug: &dbg,
        };
        let eval = validate(&pivots, &ctx).expect("window kinds form an OCO");
        assert_eq!(eval.kind, PatternKind::Oco);
        assert_eq!(eval.failed_rule, None);
        for name in [
            flag::EXTREMO_CABECA,
            flag::CONTEXTO_CABECA,
            flag::SIMETRIA_OMBROS,
            flag::NECKLINE_PLANA,
            flag::BASE_TENDENCIA,
            flag::BREAKOUT_NECKLINE,
            flag::NECKLINE_RETEST_P6,
        ] {
            assert_eq!(eval.flag(name), Some(true), "expected {name} to pass");
        }
        assert_eq!(eval.breakout_idx, Some(65));
        assert_eq!(eval.flag(flag::VOLUME_BREAKOUT_NECKLINE), Some(true));
        assert_eq!(eval.flag(flag::OMBRO_DIREITO_FRACO), Some(true));
        assert!(eval.score_total >= cfg.minimum_score_hns);
        assert!(eval.accepted);
    }

    #[test]
    fn test_canonical_ocoi_is_accepted() {
        // Mirror image: shoulders 95/96, head 90, neckline 100/99,
        // upward breakout at bar 65 on doubled volume, retest peak.
        let anchors = [
            (0, 98.0),
            (10, 105.0),
            (20, 95.0),
            (30, 100.0),
            (40, 90.0),
            (50, 99.0),
            (60, 96.0),
            (64, 99.0),
            (65, 103.0),
            (66, 103.5),
            (70, 100.0),
            (75, 97.0),
        ];
        let mut series = build_series(&anchors, 80);
        series.volume[65] = 250.0;
        let pivots = vec![
            peak(10, 105.0),
            valley(20, 95.0),
            peak(30, 100.0),
            valley(40, 90.0),
            peak(50, 99.0),
            valley(60, 96.0),
            peak(66, 103.5),
        ];
        let cfg = ScanConfig::default();
        let ind = enrich(&series, &cfg);
        let dbg = DebugLogger::disabled();
        let ctx = ValidationContext {
            series: &series,
            indicators: &ind,
            config: &cfg,
            avg_pivot_spacing: 9.3,
            debug: &dbg,
        };
        let eval = validate(&pivots, &ctx).expect("window kinds form an OCOI");
        assert_eq!(eval.kind, PatternKind::Ocoi);
        assert_eq!(eval.failed_rule, None);
        assert_eq!(eval.breakout_idx, Some(65));
        assert_eq!(eval.flag(flag::VOLUME_BREAKOUT_NECKLINE), Some(true));
        assert!(eval.accepted);
        assert!(eval.score_total >= cfg.minimum_score_hns);
    }

    #[test]
    fn test_score_decomposition_matches_flags() {
        let (series, pivots) = oco_fixture();
        let cfg = ScanConfig::default();
        let ind = enrich(&series, &cfg);
        let dbg = DebugLogger::disabled();
        let ctx = ValidationContext {
            series: &series,
            indicators: &ind,
            config: &cfg,
            avg_pivot_spacing: 9.3,
            debug: &dbg,
        };
        let eval = validate(&pivots, &ctx).unwrap();
        let expected: u32 = cfg
            .score_weights_hns
            .iter()
            .filter(|w| eval.flag(w.name) == Some(true))
            .map(|w| w.weight)
            .sum();
        assert_eq!(eval.score_total, expected);
    }

    #[test]
    fn test_head_below_shoulder_rejects_oco() {
        let (series, mut pivots) = oco_fixture();
        pivots[3].price = 104.5; // head no longer above the left shoulder
        let cfg = ScanConfig::default();
        let ind = enrich(&series, &cfg);
        let dbg = DebugLogger::disabled();
        let ctx = ValidationContext {
            series: &series,
            indicators: &ind,
            config: &cfg,
            avg_pivot_spacing: 9.3,
            debug: &dbg,
        };
        let eval = validate(&pivots, &ctx).unwrap();
        assert!(!eval.accepted);
        assert_eq!(eval.failed_rule, Some(flag::EXTREMO_CABECA));
        assert_eq!(eval.flag(flag::EXTREMO_CABECA), Some(false));
    }

    #[test]
    fn test_base_above_neckline_rejects_oco() {
        let (series, mut pivots) = oco_fixture();
        pivots[0].price = 100.5; // base must sit strictly below both anchors
        let cfg = ScanConfig::default();
        let ind = enrich(&series, &cfg);
        let dbg = DebugLogger::disabled();
        let ctx = ValidationContext {
            series: &series,
            indicators: &ind,
            config: &cfg,
            avg_pivot_spacing: 9.3,
            debug: &dbg,
        };
        let eval = validate(&pivots, &ctx).unwrap();
        assert_eq!(eval.failed_rule, Some(flag::BASE_TENDENCIA));
    }

    #[test]
    fn test_mixed_kind_window_is_not_a_candidate() {
        let (series, mut pivots) = oco_fixture();
        pivots[2].kind = PivotKind::Peak;
        let cfg = ScanConfig::default();
        let ind = enrich(&series, &cfg);
        let dbg = DebugLogger::disabled();
        let ctx = ValidationContext {
            series: &series,
            indicators: &ind,
            config: &cfg,
            avg_pivot_spacing: 9.3,
            debug: &dbg,
        };
        assert!(validate(&pivots, &ctx).is_none());
    }
}

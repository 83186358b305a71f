//! Double top (DT) and double bottom (DB) detection.

use crate::config::flag;
use crate::rules;
use crate::types::{Direction, PatternKind, Pivot, PivotKind};

use super::{alternation, kinds_match, window_starts, Evaluation, RuleScorer, ValidationContext};

/// Enumerate 5-pivot windows and keep the accepted candidates.
pub fn find_patterns(pivots: &[Pivot], ctx: &ValidationContext) -> Vec<Evaluation> {
    let mut found = Vec::new();
    for i in window_starts(pivots.len(), 5, ctx.config.recent_patterns_lookback_count) {
        if let Some(eval) = validate(&pivots[i..i + 5], ctx) {
            if eval.accepted {
                found.push(eval);
            }
        }
    }
    found
}

/// Validate one 5-pivot window. Returns None when the kinds form neither a
/// DT nor a DB shape.
pub fn validate(window: &[Pivot], ctx: &ValidationContext) -> Option<Evaluation> {
    if window.len() != 5 {
        return None;
    }
    let kind = if kinds_match(window, &alternation(PivotKind::Valley, 5)) {
        PatternKind::Dt
    } else if kinds_match(window, &alternation(PivotKind::Peak, 5)) {
        PatternKind::Db
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
    let (p0, p1, p2, p3, p4) = (&window[0], &window[1], &window[2], &window[3], &window[4]);
    let direction = kind.direction();
    let neckline = p2.price;
    let pattern_height = (p1.price - neckline).abs();

    let mut scorer = RuleScorer::new(cfg.weights_for(kind.family()));

    let structure = match direction {
        Direction::Bearish => {
            p1.price > p0.price
                && p1.price > p2.price
                && p3.price > p2.price
                && p0.price < p2.price
        }
        Direction::Bullish => {
            p1.price < p0.price
                && p1.price < p2.price
                && p3.price < p2.price
                && p0.price > p2.price
        }
    };
    if !scorer.set(flag::ESTRUTURA_PICOS_VALES, structure) {
        ctx.debug.rejection(kind, flag::ESTRUTURA_PICOS_VALES, || {
            format!("prices {}/{}/{}/{} break the shape", p0.price, p1.price, p2.price, p3.price)
        });
        return reject(kind, window, scorer, flag::ESTRUTURA_PICOS_VALES, None);
    }

    let in_context = rules::extremity_in_context(
        ctx.series,
        p1,
        ctx.avg_pivot_spacing,
        &cfg.context,
        false,
    ) && rules::extremity_in_context(
        ctx.series,
        p3,
        ctx.avg_pivot_spacing,
        &cfg.context,
        false,
    );
    if !scorer.set(flag::CONTEXTO_EXTREMOS, in_context) {
        ctx.debug.rejection(kind, flag::CONTEXTO_EXTREMOS, || {
            format!("extremes at {}/{} are not window extrema", p1.idx, p3.idx)
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
        &[p1.price, p3.price],
        pattern_height,
        cfg.dtb.symmetry_tolerance_factor,
    );
    if !scorer.set(flag::SIMETRIA_EXTREMOS, symmetric) {
        ctx.debug.rejection(kind, flag::SIMETRIA_EXTREMOS, || {
            format!(
                "extremes {}/{} outside {} of height {pattern_height:.4}",
                p1.price, p3.price, cfg.dtb.symmetry_tolerance_factor
            )
        });
        return reject(kind, window, scorer, flag::SIMETRIA_EXTREMOS, None);
    }

    let leg = (p1.price - p0.price).abs();
    let depth = match direction {
        Direction::Bearish => p1.price - p2.price,
        Direction::Bullish => p2.price - p1.price,
    };
    let deep_enough = leg > 0.0 && depth >= cfg.dtb.depth_ratio * leg;
    if !scorer.set(flag::PROFUNDIDADE_VALE_PICO, deep_enough) {
        ctx.debug.rejection(kind, flag::PROFUNDIDADE_VALE_PICO, || {
            format!("depth {depth:.4} vs leg {leg:.4}")
        });
        return reject(kind, window, scorer, flag::PROFUNDIDADE_VALE_PICO, None);
    }

    // Single-point neckline: flatness holds by construction.
    scorer.set(flag::NECKLINE_PLANA, true);

    let breakout_idx = rules::find_breakout(
        ctx.series,
        neckline,
        p3.idx,
        direction,
        cfg.volume.search_max_bars,
    );
    let breakout_ok = breakout_idx.is_some_and(|idx| idx <= p4.idx);
    if !scorer.set(flag::BREAKOUT_NECKLINE, breakout_ok) {
        ctx.debug.rejection(kind, flag::BREAKOUT_NECKLINE, || {
            format!("no strict neckline cross in ({}, {}]", p3.idx, p4.idx)
        });
        return reject(kind, window, scorer, flag::BREAKOUT_NECKLINE, breakout_idx);
    }

    let retest_ok = rules::neckline_retest(ctx.indicators, p4, neckline, &cfg.retest);
    if !scorer.set(flag::NECKLINE_RETEST_P4, retest_ok) {
        ctx.debug.rejection(kind, flag::NECKLINE_RETEST_P4, || {
            format!("retest {} too far from neckline {neckline:.4}", p4.price)
        });
        return reject(kind, window, scorer, flag::NECKLINE_RETEST_P4, breakout_idx);
    }

    // Optional confirmations.
    scorer.set(
        flag::PERFIL_VOLUME_DECRESCENTE,
        rules::volume_profile_decreasing(ctx.series, &[(p0.idx, p1.idx), (p2.idx, p3.idx)]),
    );
    scorer.set(
        flag::DIVERGENCIA_OBV,
        rules::obv_divergence(ctx.indicators, p1, p3, direction),
    );
    let rsi = rules::rsi_divergence_strength(ctx.indicators, p1, p3, direction, &cfg.rsi, false);
    scorer.set(flag::DIVERGENCIA_RSI, rsi.divergent);
    scorer.set(flag::DIVERGENCIA_RSI_STRONG, rsi.strong);
    scorer.set(
        flag::DIVERGENCIA_MACD,
        rules::macd_histogram_divergence(ctx.indicators, p1, p3, direction, false),
    );
    scorer.set(
        flag::MACD_SIGNAL_CROSS,
        rules::macd_signal_cross(ctx.indicators, p4.idx, direction, &cfg.macd),
    );
    let stoch =
        rules::stochastic_confirmation(ctx.indicators, p1, p3, p4.idx, direction, &cfg.stoch);
    scorer.set(flag::ESTOCASTICO_DIVERGENCIA, stoch.divergence);
    scorer.set(flag::ESTOCASTICO_CROSS, stoch.cross);
    scorer.set(
        flag::VOLUME_BREAKOUT_NECKLINE,
        breakout_idx.is_some_and(|idx| rules::breakout_volume(ctx.series, idx, &cfg.volume)),
    );

    let score_total = scorer.score();
    let accepted = scorer.all_mandatory_passed() && score_total >= cfg.minimum_score_dtb;
    if !accepted {
        ctx.debug.rejection(kind, "minimum_score", || {
            format!("score {score_total} below {}", cfg.minimum_score_dtb)
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

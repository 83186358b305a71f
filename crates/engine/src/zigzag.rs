//! ZigZag pivot extraction.
//!
//! Reduces a close series to an alternating sequence of significant peaks
//! and valleys: a pivot is confirmed once price reverses from the running
//! extremum candidate by at least `deviation_percent` percent of the
//! candidate price. The fold is pure, so re-extraction over the same input
//! is byte-identical.

use crate::config::ZigzagConfig;
use crate::types::{Pivot, PivotKind};

fn rise_percent(from: f64, to: f64) -> f64 {
    if from == 0.0 {
        0.0
    } else {
        (to - from) / from * 100.0
    }
}

fn drop_percent(from: f64, to: f64) -> f64 {
    if from == 0.0 {
        0.0
    } else {
        (from - to) / from * 100.0
    }
}

/// Extract alternating ZigZag pivots from a close series.
pub fn extract_pivots(closes: &[f64], deviation_percent: f64, cfg: &ZigzagConfig) -> Vec<Pivot> {
    let n = closes.len();
    if n < 2 || deviation_percent <= 0.0 {
        return Vec::new();
    }

    let mut pivots: Vec<Pivot> = Vec::new();

    // Starting direction: whichever reversal (up from the running minimum,
    // down from the running maximum) reaches the threshold first. The bar
    // that triggers it becomes the opposite-direction candidate.
    let mut max_idx = 0usize;
    let mut min_idx = 0usize;
    let mut start_state: Option<(PivotKind, usize, usize)> = None;

    for i in 1..n {
        if closes[i] > closes[max_idx] {
            max_idx = i;
        }
        if closes[i] < closes[min_idx] {
            min_idx = i;
        }
        let up = rise_percent(closes[min_idx], closes[i]);
        let down = drop_percent(closes[max_idx], closes[i]);
        if up >= deviation_percent || down >= deviation_percent {
            if up >= down {
                // First confirmed swing goes up: the running minimum is the
                // first pivot, the trigger bar starts the peak candidate.
                pivots.push(Pivot { idx: min_idx, price: closes[min_idx], kind: PivotKind::Valley });
                start_state = Some((PivotKind::Peak, i, i + 1));
            } else {
                pivots.push(Pivot { idx: max_idx, price: closes[max_idx], kind: PivotKind::Peak });
                start_state = Some((PivotKind::Valley, i, i + 1));
            }
            break;
        }
    }

    let Some((mut cand_kind, mut cand_idx, start_at)) = start_state else {
        return Vec::new();
    };

    for i in start_at..n {
        match cand_kind {
            PivotKind::Peak => {
                if closes[i] > closes[cand_idx] {
                    cand_idx = i;
                } else if drop_percent(closes[cand_idx], closes[i]) >= deviation_percent {
                    pivots.push(Pivot {
                        idx: cand_idx,
                        price: closes[cand_idx],
                        kind: PivotKind::Peak,
                    });
                    cand_kind = PivotKind::Valley;
                    cand_idx = i;
                }
            }
            PivotKind::Valley => {
                if closes[i] < closes[cand_idx] {
                    cand_idx = i;
                } else if rise_percent(closes[cand_idx], closes[i]) >= deviation_percent {
                    pivots.push(Pivot {
                        idx: cand_idx,
                        price: closes[cand_idx],
                        kind: PivotKind::Valley,
                    });
                    cand_kind = PivotKind::Peak;
                    cand_idx = i;
                }
            }
        }
    }

    // Provisional trailing pivot: the last bar earns one when it has moved
    // at least extension_deviation_factor * deviation away from the last
    // confirmed pivot.
    if cfg.extend_to_last_bar {
        if let Some(last) = pivots.last().copied() {
            let last_bar = n - 1;
            if last.idx < last_bar {
                let deviation = match last.kind {
                    PivotKind::Peak => drop_percent(last.price, closes[last_bar]),
                    PivotKind::Valley => rise_percent(last.price, closes[last_bar]),
                };
                if deviation >= cfg.extension_deviation_factor * deviation_percent {
                    pivots.push(Pivot {
                        idx: last_bar,
                        price: closes[last_bar],
                        kind: last.kind.opposite(),
                    });
                }
            }
        }
    }

    pivots
}

/// Mean bar distance between consecutive pivots.
pub fn average_pivot_spacing(pivots: &[Pivot]) -> f64 {
    if pivots.len() < 2 {
        return 0.0;
    }
    let total: usize = pivots.windows(2).map(|w| w[1].idx - w[0].idx).sum();
    total as f64 / (pivots.len() - 1) as f64
}

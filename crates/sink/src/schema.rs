//! Canonical CSV column layout.
//!
//! Column names keep the legacy dataset headers (including the Portuguese
//! rule vocabulary) so existing training scripts read new files unchanged.
//! Order: identity, score, sorted rule flags, pivot fields, convenience
//! duplicates.

use engine::types::PatternRecord;

pub const INFO_COLUMNS: [&str; 5] = ["ticker", "timeframe", "strategy", "padrao_tipo", "score_total"];

/// Union of every family's rule flags, sorted by name.
pub const VALID_COLUMNS: [&str; 25] = [
    "valid_base_tendencia",
    "valid_breakout_neckline",
    "valid_contexto_cabeca",
    "valid_contexto_extremos",
    "valid_contexto_tendencia",
    "valid_divergencia_macd",
    "valid_divergencia_obv",
    "valid_divergencia_rsi",
    "valid_divergencia_rsi_strong",
    "valid_estocastico_cross",
    "valid_estocastico_divergencia",
    "valid_estrutura_picos_vales",
    "valid_extremo_cabeca",
    "valid_macd_signal_cross",
    "valid_neckline_plana",
    "valid_neckline_retest_p4",
    "valid_neckline_retest_p6",
    "valid_ombro_direito_fraco",
    "valid_perfil_volume",
    "valid_perfil_volume_decrescente",
    "valid_proeminencia_cabeca",
    "valid_profundidade_vale_pico",
    "valid_simetria_extremos",
    "valid_simetria_ombros",
    "valid_volume_breakout_neckline",
];

pub const MAX_PIVOTS: usize = 7;

pub const EXTRA_COLUMNS: [&str; 3] = ["tipo", "score", "pivos"];

/// Full header, in emission order.
pub fn header() -> Vec<String> {
    let mut columns: Vec<String> = INFO_COLUMNS.iter().map(|c| c.to_string()).collect();
    columns.extend(VALID_COLUMNS.iter().map(|c| c.to_string()));
    for i in 0..MAX_PIVOTS {
        columns.push(format!("p{i}_idx"));
        columns.push(format!("p{i}_preco"));
    }
    columns.extend(EXTRA_COLUMNS.iter().map(|c| c.to_string()));
    columns
}

/// Serialize one record into a row matching [`header`]. Flags a family
/// does not define and pivot slots beyond its window are left blank.
pub fn row(record: &PatternRecord) -> Vec<String> {
    let mut cells = vec![
        record.ticker.clone(),
        record.timeframe.clone(),
        record.strategy.clone(),
        record.kind.label().to_string(),
        record.score_total.to_string(),
    ];
    for name in VALID_COLUMNS {
        cells.push(match record.flag(name) {
            Some(true) => "1".to_string(),
            Some(false) => "0".to_string(),
            None => String::new(),
        });
    }
    for i in 0..MAX_PIVOTS {
        match record.pivots.get(i) {
            Some(pivot) => {
                cells.push(pivot.idx.to_string());
                cells.push(pivot.price.to_string());
            }
            None => {
                cells.push(String::new());
                cells.push(String::new());
            }
        }
    }
    cells.push(record.kind.label().to_string());
    cells.push(record.score_total.to_string());
    cells.push(serde_json::to_string(&record.pivots).unwrap_or_else(|_| "[]".to_string()));
    cells
}

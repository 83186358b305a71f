//! Configuration for universe, rules, tolerances, and scoring.
//!
//! A single immutable [`ScanConfig`] is built by the caller and passed by
//! reference to every component; the engine keeps no process-wide state.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::types::PatternFamily;

/// Rule-flag column names. These double as CSV headers and keep the legacy
/// dataset vocabulary so downstream training scripts stay compatible.
pub mod flag {
    pub const EXTREMO_CABECA: &str = "valid_extremo_cabeca";
    pub const CONTEXTO_CABECA: &str = "valid_contexto_cabeca";
    pub const SIMETRIA_OMBROS: &str = "valid_simetria_ombros";
    pub const NECKLINE_PLANA: &str = "valid_neckline_plana";
    pub const BASE_TENDENCIA: &str = "valid_base_tendencia";
    pub const BREAKOUT_NECKLINE: &str = "valid_breakout_neckline";
    pub const NECKLINE_RETEST_P6: &str = "valid_neckline_retest_p6";
    pub const NECKLINE_RETEST_P4: &str = "valid_neckline_retest_p4";
    pub const DIVERGENCIA_RSI: &str = "valid_divergencia_rsi";
    pub const DIVERGENCIA_RSI_STRONG: &str = "valid_divergencia_rsi_strong";
    pub const DIVERGENCIA_MACD: &str = "valid_divergencia_macd";
    pub const MACD_SIGNAL_CROSS: &str = "valid_macd_signal_cross";
    pub const ESTOCASTICO_DIVERGENCIA: &str = "valid_estocastico_divergencia";
    pub const ESTOCASTICO_CROSS: &str = "valid_estocastico_cross";
    pub const DIVERGENCIA_OBV: &str = "valid_divergencia_obv";
    pub const PROEMINENCIA_CABECA: &str = "valid_proeminencia_cabeca";
    pub const OMBRO_DIREITO_FRACO: &str = "valid_ombro_direito_fraco";
    pub const PERFIL_VOLUME: &str = "valid_perfil_volume";
    pub const PERFIL_VOLUME_DECRESCENTE: &str = "valid_perfil_volume_decrescente";
    pub const VOLUME_BREAKOUT_NECKLINE: &str = "valid_volume_breakout_neckline";
    pub const ESTRUTURA_PICOS_VALES: &str = "valid_estrutura_picos_vales";
    pub const CONTEXTO_EXTREMOS: &str = "valid_contexto_extremos";
    pub const CONTEXTO_TENDENCIA: &str = "valid_contexto_tendencia";
    pub const SIMETRIA_EXTREMOS: &str = "valid_simetria_extremos";
    pub const PROFUNDIDADE_VALE_PICO: &str = "valid_profundidade_vale_pico";
}

/// Weight table entry: one rule, its score contribution, and whether
/// failing it rejects the candidate outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleWeight {
    pub name: &'static str,
    pub weight: u32,
    pub mandatory: bool,
}

impl RuleWeight {
    pub const fn mandatory(name: &'static str, weight: u32) -> Self {
        Self { name, weight, mandatory: true }
    }

    pub const fn optional(name: &'static str, weight: u32) -> Self {
        Self { name, weight, mandatory: false }
    }
}

#[derive(Debug, Clone)]
pub struct RsiConfig {
    pub length: usize,
    pub overbought: f64,
    pub oversold: f64,
    pub strong_overbought: f64,
    pub strong_oversold: f64,
    /// RSI delta between the two extremes that upgrades a weak divergence
    /// to strong.
    pub divergence_min_delta: f64,
}

impl Default for RsiConfig {
    fn default() -> Self {
        Self {
            length: 14,
            overbought: 70.0,
            oversold: 30.0,
            strong_overbought: 80.0,
            strong_oversold: 20.0,
            divergence_min_delta: 5.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StochConfig {
    pub k: usize,
    pub d: usize,
    pub smooth_k: usize,
    pub overbought: f64,
    pub oversold: f64,
    /// How far back from the window end a %K/%D cross is searched.
    pub cross_lookback_bars: usize,
    pub divergence_min_delta: f64,
    /// When set, both stochastic confirmations are gated on the first
    /// extreme having reached the overbought/oversold zone.
    pub require_obos: bool,
}

impl Default for StochConfig {
    fn default() -> Self {
        Self {
            k: 14,
            d: 3,
            smooth_k: 3,
            overbought: 80.0,
            oversold: 20.0,
            cross_lookback_bars: 5,
            divergence_min_delta: 0.0,
            require_obos: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MacdConfig {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
    pub signal_cross_lookback_bars: usize,
    /// A signal cross only counts if it happened at most this many bars
    /// before the window end.
    pub cross_max_age_bars: usize,
}

impl Default for MacdConfig {
    fn default() -> Self {
        Self {
            fast: 12,
            slow: 26,
            signal: 9,
            signal_cross_lookback_bars: 10,
            cross_max_age_bars: 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VolumeConfig {
    /// Baseline window for the breakout-volume comparison.
    pub lookback_bars: usize,
    pub multiplier: f64,
    /// How many bars past the last structural pivot a breakout is searched.
    pub search_max_bars: usize,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            lookback_bars: 20,
            multiplier: 1.8,
            search_max_bars: 30,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetestConfig {
    pub atr_multiplier: f64,
    /// Fallback tolerance as a fraction of the neckline price when ATR is
    /// unavailable or zero.
    pub pct_of_neckline: f64,
}

impl Default for RetestConfig {
    fn default() -> Self {
        Self {
            atr_multiplier: 5.0,
            pct_of_neckline: 0.01,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ZigzagConfig {
    pub extend_to_last_bar: bool,
    /// Fraction of `deviation_percent` the last bar must move away from the
    /// last confirmed pivot to earn a provisional trailing pivot.
    pub extension_deviation_factor: f64,
}

impl Default for ZigzagConfig {
    fn default() -> Self {
        Self {
            extend_to_last_bar: true,
            extension_deviation_factor: 0.25,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ContextConfig {
    /// Context window half-width as a multiple of the average pivot spacing.
    pub head_extreme_lookback_factor: f64,
    pub min_bars: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            head_extreme_lookback_factor: 2.0,
            min_bars: 8,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HnsConfig {
    pub shoulder_symmetry_tolerance: f64,
    pub neckline_flatness_tolerance: f64,
    /// Head height must exceed both shoulder heights by this ratio for the
    /// optional prominence confirmation.
    pub head_significance_ratio: f64,
}

impl Default for HnsConfig {
    fn default() -> Self {
        Self {
            shoulder_symmetry_tolerance: 0.30,
            neckline_flatness_tolerance: 0.25,
            head_significance_ratio: 1.1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DtbConfig {
    /// Extreme spread tolerance as a fraction of pattern height (DT/DB and
    /// TT/TB, also bounds the TT/TB neckline flatness).
    pub symmetry_tolerance_factor: f64,
    pub trend_min_diff_factor: f64,
    /// Middle valley/peak depth relative to the leg into the pattern.
    pub depth_ratio: f64,
}

impl Default for DtbConfig {
    fn default() -> Self {
        Self {
            symmetry_tolerance_factor: 0.35,
            trend_min_diff_factor: 0.01,
            depth_ratio: 0.3,
        }
    }
}

/// Full engine configuration
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub rsi: RsiConfig,
    pub stoch: StochConfig,
    pub macd: MacdConfig,
    pub volume: VolumeConfig,
    pub retest: RetestConfig,
    pub zigzag: ZigzagConfig,
    pub context: ContextConfig,
    pub hns: HnsConfig,
    pub dtb: DtbConfig,
    /// strategy name -> interval -> ZigZag deviation percent
    pub strategies: BTreeMap<String, BTreeMap<String, f64>>,
    pub score_weights_hns: Vec<RuleWeight>,
    pub score_weights_dtb: Vec<RuleWeight>,
    pub score_weights_ttb: Vec<RuleWeight>,
    pub minimum_score_hns: u32,
    pub minimum_score_dtb: u32,
    pub minimum_score_ttb: u32,
    /// Only candidates whose anchor pivot is within the last N window
    /// positions are scanned.
    pub recent_patterns_lookback_count: usize,
    pub hns_debug: bool,
    pub dtb_debug: bool,
    pub ttb_debug: bool,
    pub debug_dir: PathBuf,
}

fn default_strategies() -> BTreeMap<String, BTreeMap<String, f64>> {
    let presets: &[(&str, &[(&str, f64)])] = &[
        ("scalping_aggressive", &[("5m", 0.25)]),
        ("scalping_moderate", &[("5m", 0.40), ("15m", 0.60)]),
        ("scalping_conservative", &[("5m", 0.55), ("15m", 0.75)]),
        ("intraday_momentum", &[("5m", 0.80), ("15m", 1.10), ("1h", 1.60)]),
        ("intraday_range", &[("5m", 1.00), ("15m", 1.30), ("1h", 1.90)]),
        ("swing_short", &[("15m", 2.0), ("1h", 2.8), ("4h", 4.0)]),
        ("swing_medium", &[("1h", 3.2), ("4h", 4.8), ("1d", 6.0)]),
        ("swing_long", &[("4h", 5.0), ("1d", 7.0), ("1wk", 8.5)]),
        ("position_trend", &[("1d", 9.0), ("1wk", 12.0), ("1mo", 15.0)]),
        ("macro_trend_primary", &[("1wk", 13.0), ("1mo", 18.0)]),
    ];
    presets
        .iter()
        .map(|(name, intervals)| {
            let map = intervals
                .iter()
                .map(|(interval, dev)| (interval.to_string(), *dev))
                .collect();
            (name.to_string(), map)
        })
        .collect()
}

fn default_weights_hns() -> Vec<RuleWeight> {
    use flag::*;
    vec![
        RuleWeight::mandatory(EXTREMO_CABECA, 20),
        RuleWeight::mandatory(CONTEXTO_CABECA, 15),
        RuleWeight::mandatory(SIMETRIA_OMBROS, 10),
        RuleWeight::mandatory(NECKLINE_PLANA, 5),
        RuleWeight::mandatory(BASE_TENDENCIA, 5),
        RuleWeight::mandatory(BREAKOUT_NECKLINE, 5),
        RuleWeight::mandatory(NECKLINE_RETEST_P6, 15),
        RuleWeight::optional(DIVERGENCIA_RSI, 15),
        RuleWeight::optional(DIVERGENCIA_RSI_STRONG, 5),
        RuleWeight::optional(DIVERGENCIA_MACD, 10),
        RuleWeight::optional(MACD_SIGNAL_CROSS, 5),
        RuleWeight::optional(ESTOCASTICO_DIVERGENCIA, 5),
        RuleWeight::optional(ESTOCASTICO_CROSS, 5),
        RuleWeight::optional(PROEMINENCIA_CABECA, 10),
        RuleWeight::optional(OMBRO_DIREITO_FRACO, 5),
        RuleWeight::optional(PERFIL_VOLUME, 5),
        RuleWeight::optional(VOLUME_BREAKOUT_NECKLINE, 10),
    ]
}

fn default_weights_dtb() -> Vec<RuleWeight> {
    use flag::*;
    vec![
        RuleWeight::mandatory(ESTRUTURA_PICOS_VALES, 15),
        RuleWeight::mandatory(CONTEXTO_EXTREMOS, 10),
        RuleWeight::mandatory(CONTEXTO_TENDENCIA, 10),
        RuleWeight::mandatory(SIMETRIA_EXTREMOS, 15),
        RuleWeight::mandatory(PROFUNDIDADE_VALE_PICO, 10),
        RuleWeight::mandatory(NECKLINE_PLANA, 5),
        RuleWeight::mandatory(BREAKOUT_NECKLINE, 5),
        RuleWeight::mandatory(NECKLINE_RETEST_P4, 10),
        RuleWeight::optional(PERFIL_VOLUME_DECRESCENTE, 10),
        RuleWeight::optional(DIVERGENCIA_OBV, 15),
        RuleWeight::optional(DIVERGENCIA_RSI, 15),
        RuleWeight::optional(DIVERGENCIA_RSI_STRONG, 5),
        RuleWeight::optional(DIVERGENCIA_MACD, 10),
        RuleWeight::optional(MACD_SIGNAL_CROSS, 5),
        RuleWeight::optional(ESTOCASTICO_DIVERGENCIA, 5),
        RuleWeight::optional(ESTOCASTICO_CROSS, 5),
        RuleWeight::optional(VOLUME_BREAKOUT_NECKLINE, 10),
    ]
}

fn default_weights_ttb() -> Vec<RuleWeight> {
    use flag::*;
    vec![
        RuleWeight::mandatory(ESTRUTURA_PICOS_VALES, 15),
        RuleWeight::mandatory(CONTEXTO_EXTREMOS, 10),
        RuleWeight::mandatory(CONTEXTO_TENDENCIA, 10),
        RuleWeight::mandatory(SIMETRIA_EXTREMOS, 15),
        RuleWeight::mandatory(PROFUNDIDADE_VALE_PICO, 10),
        RuleWeight::mandatory(NECKLINE_PLANA, 5),
        RuleWeight::mandatory(BREAKOUT_NECKLINE, 5),
        RuleWeight::mandatory(NECKLINE_RETEST_P6, 10),
        RuleWeight::optional(PERFIL_VOLUME_DECRESCENTE, 10),
        RuleWeight::optional(DIVERGENCIA_OBV, 15),
        RuleWeight::optional(DIVERGENCIA_RSI, 15),
        RuleWeight::optional(DIVERGENCIA_RSI_STRONG, 5),
        RuleWeight::optional(DIVERGENCIA_MACD, 10),
        RuleWeight::optional(MACD_SIGNAL_CROSS, 5),
        RuleWeight::optional(ESTOCASTICO_DIVERGENCIA, 5),
        RuleWeight::optional(ESTOCASTICO_CROSS, 5),
        RuleWeight::optional(VOLUME_BREAKOUT_NECKLINE, 10),
    ]
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            rsi: RsiConfig::default(),
            stoch: StochConfig::default(),
            macd: MacdConfig::default(),
            volume: VolumeConfig::default(),
            retest: RetestConfig::default(),
            zigzag: ZigzagConfig::default(),
            context: ContextConfig::default(),
            hns: HnsConfig::default(),
            dtb: DtbConfig::default(),
            strategies: default_strategies(),
            score_weights_hns: default_weights_hns(),
            score_weights_dtb: default_weights_dtb(),
            score_weights_ttb: default_weights_ttb(),
            minimum_score_hns: 70,
            minimum_score_dtb: 70,
            minimum_score_ttb: 70,
            recent_patterns_lookback_count: 5,
            hns_debug: false,
            dtb_debug: false,
            ttb_debug: false,
            debug_dir: PathBuf::from("logs"),
        }
    }
}

impl ScanConfig {
    /// Resolve the ZigZag deviation percent for a strategy/interval pair.
    pub fn deviation_percent(&self, strategy: &str, interval: &str) -> Option<f64> {
        self.strategies.get(strategy)?.get(interval).copied()
    }

    pub fn weights_for(&self, family: PatternFamily) -> &[RuleWeight] {
        match family {
            PatternFamily::Hns => &self.score_weights_hns,
            PatternFamily::Dtb => &self.score_weights_dtb,
            PatternFamily::Ttb => &self.score_weights_ttb,
        }
    }

    pub fn minimum_score(&self, family: PatternFamily) -> u32 {
        match family {
            PatternFamily::Hns => self.minimum_score_hns,
            PatternFamily::Dtb => self.minimum_score_dtb,
            PatternFamily::Ttb => self.minimum_score_ttb,
        }
    }

    pub fn debug_enabled(&self, family: PatternFamily) -> bool {
        match family {
            PatternFamily::Hns => self.hns_debug,
            PatternFamily::Dtb => self.dtb_debug,
            PatternFamily::Ttb => self.ttb_debug,
        }
    }
}

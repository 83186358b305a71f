//! Types for the pattern detection engine

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single candlestick (OHLCV) as delivered by a market-data source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kline {
    pub open_time: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub close_time: i64,
}

/// Convert a Decimal price to f64 for the numeric engine
pub(crate) fn to_f64(value: Decimal) -> f64 {
    value.to_string().parse::<f64>().unwrap_or(0.0)
}

/// Columnar bar store the engine computes on.
///
/// Rules and indicators address bars by integer index; the timestamp column
/// is carried only for record output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BarSeries {
    pub time: Vec<i64>,
    pub open: Vec<f64>,
    pub high: Vec<f64>,
    pub low: Vec<f64>,
    pub close: Vec<f64>,
    pub volume: Vec<f64>,
}

impl BarSeries {
    pub fn from_klines(klines: &[Kline]) -> Self {
        let mut series = Self {
            time: Vec::with_capacity(klines.len()),
            open: Vec::with_capacity(klines.len()),
            high: Vec::with_capacity(klines.len()),
            low: Vec::with_capacity(klines.len()),
            close: Vec::with_capacity(klines.len()),
            volume: Vec::with_capacity(klines.len()),
        };
        for kline in klines {
            series.time.push(kline.open_time);
            series.open.push(to_f64(kline.open));
            series.high.push(to_f64(kline.high));
            series.low.push(to_f64(kline.low));
            series.close.push(to_f64(kline.close));
            series.volume.push(to_f64(kline.volume));
        }
        series
    }

    pub fn len(&self) -> usize {
        self.close.len()
    }

    pub fn is_empty(&self) -> bool {
        self.close.is_empty()
    }
}

/// Kind of a ZigZag pivot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PivotKind {
    Peak,
    Valley,
}

impl PivotKind {
    pub fn opposite(self) -> Self {
        match self {
            Self::Peak => Self::Valley,
            Self::Valley => Self::Peak,
        }
    }
}

/// A confirmed (or provisional trailing) ZigZag pivot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pivot {
    pub idx: usize,
    pub price: f64,
    pub kind: PivotKind,
}

/// The three pattern families the engine detects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatternFamily {
    Hns,
    Dtb,
    Ttb,
}

impl PatternFamily {
    pub fn all() -> &'static [PatternFamily] {
        &[Self::Hns, Self::Dtb, Self::Ttb]
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Hns => "HNS",
            Self::Dtb => "DTB",
            Self::Ttb => "TTB",
        }
    }
}

/// Breakout direction of a pattern: top patterns break down, bottom
/// patterns break up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Bearish,
    Bullish,
}

/// Pattern variant within a family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatternKind {
    /// Head and shoulders top
    Oco,
    /// Inverse head and shoulders
    Ocoi,
    /// Double top
    Dt,
    /// Double bottom
    Db,
    /// Triple top
    Tt,
    /// Triple bottom
    Tb,
}

impl PatternKind {
    pub fn family(&self) -> PatternFamily {
        match self {
            Self::Oco | Self::Ocoi => PatternFamily::Hns,
            Self::Dt | Self::Db => PatternFamily::Dtb,
            Self::Tt | Self::Tb => PatternFamily::Ttb,
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            Self::Oco | Self::Dt | Self::Tt => Direction::Bearish,
            Self::Ocoi | Self::Db | Self::Tb => Direction::Bullish,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Oco => "OCO",
            Self::Ocoi => "OCOI",
            Self::Dt => "DT",
            Self::Db => "DB",
            Self::Tt => "TT",
            Self::Tb => "TB",
        }
    }
}

/// Outcome of a single validation rule, in the family's configured order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleFlag {
    pub name: &'static str,
    pub passed: bool,
}

/// One detected, validated, and scored pattern occurrence
#[derive(Debug, Clone, PartialEq)]
pub struct PatternRecord {
    pub ticker: String,
    pub timeframe: String,
    pub strategy: String,
    pub kind: PatternKind,
    pub start_idx: usize,
    pub end_idx: usize,
    /// Deduplication key: head pivot for H&S, second extreme for DT/DB,
    /// third extreme for TT/TB.
    pub key_idx: usize,
    pub retest_idx: usize,
    pub breakout_idx: Option<usize>,
    pub score_total: u32,
    pub flags: Vec<RuleFlag>,
    pub pivots: Vec<Pivot>,
}

impl PatternRecord {
    pub fn flag(&self, name: &str) -> Option<bool> {
        self.flags.iter().find(|f| f.name == name).map(|f| f.passed)
    }
}

//! Columnar indicator engine.
//!
//! Every kernel takes plain slices and returns a column exactly as long as
//! its input, with NaN filling the indeterminate head. Downstream rules
//! treat NaN as "insufficient evidence" and fail closed, so a series too
//! short for an indicator never errors, it just confirms nothing.

use crate::config::ScanConfig;
use crate::types::BarSeries;

/// ATR period used by the neckline-retest tolerance.
pub const ATR_LENGTH: usize = 14;

/// Indicator columns derived once per series and shared by all rules.
#[derive(Debug, Clone)]
pub struct IndicatorColumns {
    pub rsi_close: Vec<f64>,
    pub rsi_high: Vec<f64>,
    pub rsi_low: Vec<f64>,
    pub macd: Vec<f64>,
    pub macd_signal: Vec<f64>,
    pub macd_hist: Vec<f64>,
    pub stoch_k: Vec<f64>,
    pub stoch_d: Vec<f64>,
    pub obv: Vec<f64>,
    pub atr: Vec<f64>,
}

/// Compute every indicator column for a bar series.
pub fn enrich(series: &BarSeries, cfg: &ScanConfig) -> IndicatorColumns {
    let (macd_line, macd_signal, macd_hist) = macd(
        &series.close,
        cfg.macd.fast,
        cfg.macd.slow,
        cfg.macd.signal,
    );
    let (stoch_k, stoch_d) = stoch(
        &series.high,
        &series.low,
        &series.close,
        cfg.stoch.k,
        cfg.stoch.d,
        cfg.stoch.smooth_k,
    );
    IndicatorColumns {
        rsi_close: rsi(&series.close, cfg.rsi.length),
        rsi_high: rsi(&series.high, cfg.rsi.length),
        rsi_low: rsi(&series.low, cfg.rsi.length),
        macd: macd_line,
        macd_signal,
        macd_hist,
        stoch_k,
        stoch_d,
        obv: obv(&series.close, &series.volume),
        atr: atr(&series.high, &series.low, &series.close, ATR_LENGTH),
    }
}

/// Exponential moving average seeded with the SMA of the first `period`
/// values. Defined from index `period - 1`.
pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut out = vec![f64::NAN; n];
    if period == 0 || n < period {
        return out;
    }
    let seed = values[..period].iter().sum::<f64>() / period as f64;
    let alpha = 2.0 / (period as f64 + 1.0);
    out[period - 1] = seed;
    let mut prev = seed;
    for i in period..n {
        prev = alpha * values[i] + (1.0 - alpha) * prev;
        out[i] = prev;
    }
    out
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        if avg_gain == 0.0 {
            50.0
        } else {
            100.0
        }
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

/// Wilder RSI. Defined from index `length`.
pub fn rsi(values: &[f64], length: usize) -> Vec<f64> {
    let n = values.len();
    let mut out = vec![f64::NAN; n];
    if length == 0 || n <= length {
        return out;
    }
    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    for i in 1..=length {
        let delta = values[i] - values[i - 1];
        avg_gain += delta.max(0.0);
        avg_loss += (-delta).max(0.0);
    }
    avg_gain /= length as f64;
    avg_loss /= length as f64;
    out[length] = rsi_from_averages(avg_gain, avg_loss);
    for i in (length + 1)..n {
        let delta = values[i] - values[i - 1];
        let gain = delta.max(0.0);
        let loss = (-delta).max(0.0);
        avg_gain = (avg_gain * (length - 1) as f64 + gain) / length as f64;
        avg_loss = (avg_loss * (length - 1) as f64 + loss) / length as f64;
        out[i] = rsi_from_averages(avg_gain, avg_loss);
    }
    out
}

/// MACD line, signal, and histogram. All three columns are NaN when the
/// series is shorter than `slow + signal` bars; otherwise the line is
/// defined from `slow - 1` and signal/histogram from `slow + signal - 2`.
pub fn macd(values: &[f64], fast: usize, slow: usize, signal: usize) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let n = values.len();
    let mut line = vec![f64::NAN; n];
    let mut signal_col = vec![f64::NAN; n];
    let mut hist = vec![f64::NAN; n];
    if fast == 0 || slow == 0 || signal == 0 || fast >= slow || n < slow + signal {
        return (line, signal_col, hist);
    }
    let ema_fast = ema(values, fast);
    let ema_slow = ema(values, slow);
    for i in (slow - 1)..n {
        line[i] = ema_fast[i] - ema_slow[i];
    }
    let signal_seg = ema(&line[(slow - 1)..], signal);
    for (j, value) in signal_seg.iter().enumerate() {
        signal_col[slow - 1 + j] = *value;
    }
    for i in 0..n {
        hist[i] = line[i] - signal_col[i];
    }
    (line, signal_col, hist)
}

/// Rolling simple mean; NaN while the window is incomplete or contains NaN.
pub fn rolling_mean(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut out = vec![f64::NAN; n];
    if period == 0 || n < period {
        return out;
    }
    for i in (period - 1)..n {
        let window = &values[i + 1 - period..=i];
        if window.iter().all(|v| v.is_finite()) {
            out[i] = window.iter().sum::<f64>() / period as f64;
        }
    }
    out
}

/// Stochastic %K (smoothed) and %D. A zero high-low range yields NaN for
/// that bar.
pub fn stoch(
    high: &[f64],
    low: &[f64],
    close: &[f64],
    k: usize,
    d: usize,
    smooth_k: usize,
) -> (Vec<f64>, Vec<f64>) {
    let n = close.len();
    let mut raw = vec![f64::NAN; n];
    if k == 0 || n < k {
        return (vec![f64::NAN; n], vec![f64::NAN; n]);
    }
    for i in (k - 1)..n {
        let window = i + 1 - k..=i;
        let hh = high[window.clone()].iter().cloned().fold(f64::MIN, f64::max);
        let ll = low[window].iter().cloned().fold(f64::MAX, f64::min);
        if hh > ll {
            raw[i] = 100.0 * (close[i] - ll) / (hh - ll);
        }
    }
    let k_col = rolling_mean(&raw, smooth_k);
    let d_col = rolling_mean(&k_col, d);
    (k_col, d_col)
}

/// On-balance volume: cumulative signed volume, seeded with the first bar's
/// volume. Bars with a non-finite close or volume carry the previous value.
pub fn obv(close: &[f64], volume: &[f64]) -> Vec<f64> {
    let n = close.len();
    let mut out = vec![f64::NAN; n];
    if n == 0 {
        return out;
    }
    let mut running = if volume[0].is_finite() { volume[0] } else { 0.0 };
    out[0] = running;
    for i in 1..n {
        if close[i].is_finite() && close[i - 1].is_finite() && volume[i].is_finite() {
            if close[i] > close[i - 1] {
                running += volume[i];
            } else if close[i] < close[i - 1] {
                running -= volume[i];
            }
        }
        out[i] = running;
    }
    out
}

/// True range per bar; index 0 falls back to high - low.
pub fn true_range(high: &[f64], low: &[f64], close: &[f64]) -> Vec<f64> {
    let n = close.len();
    let mut tr = vec![f64::NAN; n];
    if n == 0 {
        return tr;
    }
    tr[0] = high[0] - low[0];
    for i in 1..n {
        let prev_close = close[i - 1];
        tr[i] = (high[i] - low[i])
            .max((high[i] - prev_close).abs())
            .max((low[i] - prev_close).abs());
    }
    tr
}

/// Wilder ATR, defined from index `period`. When the Wilder seed cannot be
/// formed the kernel falls back to an EMA over the true range.
pub fn atr(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Vec<f64> {
    let n = close.len();
    let mut out = vec![f64::NAN; n];
    if period == 0 || n <= period {
        return out;
    }
    let tr = true_range(high, low, close);
    let seed = tr[1..=period].iter().sum::<f64>() / period as f64;
    if !seed.is_finite() {
        return ema(&tr, period);
    }
    out[period] = seed;
    let mut prev = seed;
    for i in (period + 1)..n {
        prev = (prev * (period - 1) as f64 + tr[i]) / period as f64;
        out[i] = prev;
    }
    out
}

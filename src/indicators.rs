//! Technical indicators and the uniform indicator adapter
//!
//! Primitives return one value per input element, left-padded with `None`
//! until the indicator has warmed up. SMA, EMA, RSI and Bollinger Bands wrap
//! the `ta` crate; ATR/ADX use Wilder's smoothing, TEMA and CMO are
//! implemented here since `ta` does not ship them.
//!
//! The adapter ([`compute`], [`compute_series`], [`compute_bands`]) is the
//! only way the rest of the engine touches indicators. It refuses windows
//! shorter than the period with [`SignalError::InsufficientData`] instead of
//! returning a silent zero, and scrubs non-finite values to `None`.

use itertools::izip;
use ta::indicators::{
    BollingerBands as TaBB, ExponentialMovingAverage, RelativeStrengthIndex, SimpleMovingAverage,
};
use ta::Next;

use crate::error::SignalError;
use crate::Candle;

/// Denominator floor for ratio indicators such as band width
pub const BAND_WIDTH_EPSILON: f64 = 1e-6;

// =============================================================================
// Type Aliases for Complex Return Types
// =============================================================================

/// Type alias for band indicators (upper, middle, lower)
pub type BandOutput = (Vec<Option<f64>>, Vec<Option<f64>>, Vec<Option<f64>>);

// =============================================================================
// Moving Averages
// =============================================================================

/// Calculate Simple Moving Average
pub fn sma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if values.is_empty() || period == 0 {
        return vec![];
    }

    let mut indicator = match SimpleMovingAverage::new(period) {
        Ok(i) => i,
        Err(_) => return vec![None; values.len()],
    };

    let mut result = Vec::with_capacity(values.len());

    for (i, &value) in values.iter().enumerate() {
        let sma_val = indicator.next(value);
        if i + 1 >= period {
            result.push(Some(sma_val));
        } else {
            result.push(None);
        }
    }

    result
}

/// Calculate Exponential Moving Average
pub fn ema(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if values.is_empty() || period == 0 {
        return vec![];
    }

    let mut indicator = match ExponentialMovingAverage::new(period) {
        Ok(i) => i,
        Err(_) => return vec![None; values.len()],
    };

    let mut result = Vec::with_capacity(values.len());

    for (i, &value) in values.iter().enumerate() {
        let ema_val = indicator.next(value);
        if i + 1 >= period {
            result.push(Some(ema_val));
        } else {
            result.push(None);
        }
    }

    result
}

/// Apply `f` to the trailing run of defined values of `series`, keeping the
/// output aligned with the input.
///
/// Used to chain indicators (SMA of RSI, EMA of EMA) without feeding warm-up
/// placeholders into the next stage.
pub fn over_defined<F>(series: &[Option<f64>], f: F) -> Vec<Option<f64>>
where
    F: Fn(&[f64]) -> Vec<Option<f64>>,
{
    let start = series
        .iter()
        .rposition(Option::is_none)
        .map_or(0, |i| i + 1);

    let mut result = vec![None; start];
    if start < series.len() {
        let values: Vec<f64> = series[start..].iter().flatten().copied().collect();
        result.extend(f(&values));
    }
    result.resize(series.len(), None);
    result
}

/// Calculate Triple Exponential Moving Average
/// TEMA = 3 * EMA1 - 3 * EMA2 + EMA3, first valid at index 3 * period - 3
pub fn tema(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if values.is_empty() || period == 0 {
        return vec![];
    }

    let ema1 = ema(values, period);
    let ema2 = over_defined(&ema1, |v| ema(v, period));
    let ema3 = over_defined(&ema2, |v| ema(v, period));

    izip!(&ema1, &ema2, &ema3)
        .map(|(e1, e2, e3)| match (e1, e2, e3) {
            (Some(a), Some(b), Some(c)) => Some(3.0 * a - 3.0 * b + c),
            _ => None,
        })
        .collect()
}

// =============================================================================
// Volatility Indicators
// =============================================================================

/// Calculate True Range
pub fn true_range(high: &[f64], low: &[f64], close: &[f64]) -> Vec<f64> {
    let mut tr = Vec::with_capacity(high.len());

    for i in 0..high.len() {
        let tr_value = if i == 0 {
            high[i] - low[i]
        } else {
            let hl = high[i] - low[i];
            let hc = (high[i] - close[i - 1]).abs();
            let lc = (low[i] - close[i - 1]).abs();
            hl.max(hc).max(lc)
        };
        tr.push(tr_value);
    }

    tr
}

/// Apply Wilder's smoothing to a series
/// Wilder's smoothing: new_value = (prev_value * (period - 1) + current) / period
fn wilders_smooth(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if values.is_empty() || period == 0 {
        return vec![];
    }

    let mut result = Vec::with_capacity(values.len());
    let mut smoothed: Option<f64> = None;

    for i in 0..values.len() {
        if i + 1 < period {
            result.push(None);
        } else if i + 1 == period {
            // First value is SMA
            let sum: f64 = values[0..period].iter().sum();
            smoothed = Some(sum / period as f64);
            result.push(smoothed);
        } else if let Some(prev) = smoothed {
            let new_val = (prev * (period - 1) as f64 + values[i]) / period as f64;
            smoothed = Some(new_val);
            result.push(smoothed);
        } else {
            result.push(None);
        }
    }

    result
}

/// Calculate Average True Range (ATR) using Wilder's smoothing
pub fn atr(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Vec<Option<f64>> {
    if high.is_empty() || period == 0 || high.len() != low.len() || high.len() != close.len() {
        return vec![];
    }

    wilders_smooth(&true_range(high, low, close), period)
}

/// Calculate Bollinger Bands using ta crate
pub fn bollinger_bands(values: &[f64], period: usize, num_std: f64) -> BandOutput {
    if values.is_empty() || period == 0 {
        return (vec![], vec![], vec![]);
    }

    let mut indicator = match TaBB::new(period, num_std) {
        Ok(i) => i,
        Err(_) => {
            return (
                vec![None; values.len()],
                vec![None; values.len()],
                vec![None; values.len()],
            )
        }
    };

    let mut upper = Vec::with_capacity(values.len());
    let mut middle = Vec::with_capacity(values.len());
    let mut lower = Vec::with_capacity(values.len());

    for (i, &value) in values.iter().enumerate() {
        let bb = indicator.next(value);
        if i + 1 >= period {
            upper.push(Some(bb.upper));
            middle.push(Some(bb.average));
            lower.push(Some(bb.lower));
        } else {
            upper.push(None);
            middle.push(None);
            lower.push(None);
        }
    }

    (upper, middle, lower)
}

/// Normalised band width: (upper - lower) / |middle|
///
/// A zero or near-zero middle band is replaced by [`BAND_WIDTH_EPSILON`];
/// non-finite inputs collapse to 0.0 so no NaN reaches a comparison.
pub fn band_width(upper: f64, lower: f64, middle: f64) -> f64 {
    if !(upper.is_finite() && lower.is_finite() && middle.is_finite()) {
        return 0.0;
    }

    let denominator = if middle.abs() < BAND_WIDTH_EPSILON {
        let error = SignalError::DegenerateIndicator {
            indicator: "band_width",
            denominator: middle,
        };
        tracing::trace!(%error, "substituting epsilon");
        BAND_WIDTH_EPSILON
    } else {
        middle.abs()
    };

    let width = (upper - lower) / denominator;
    if width.is_finite() {
        width
    } else {
        0.0
    }
}

/// Band width for aligned band series
pub fn band_width_series(
    upper: &[Option<f64>],
    lower: &[Option<f64>],
    middle: &[Option<f64>],
) -> Vec<Option<f64>> {
    izip!(upper, lower, middle)
        .map(|(u, l, m)| match (u, l, m) {
            (Some(u), Some(l), Some(m)) => Some(band_width(*u, *l, *m)),
            _ => None,
        })
        .collect()
}

// =============================================================================
// Momentum Indicators
// =============================================================================

/// Calculate RSI (Relative Strength Index) using ta crate
pub fn rsi(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if values.is_empty() || period == 0 {
        return vec![];
    }

    let mut indicator = match RelativeStrengthIndex::new(period) {
        Ok(i) => i,
        Err(_) => return vec![None; values.len()],
    };

    let mut result = Vec::with_capacity(values.len());

    for (i, &value) in values.iter().enumerate() {
        let rsi_val = indicator.next(value);
        if i + 1 >= period {
            result.push(Some(rsi_val));
        } else {
            result.push(None);
        }
    }

    result
}

/// Calculate Chande Momentum Oscillator
/// CMO = 100 * (sum_up - sum_down) / (sum_up + sum_down) over `period` changes
pub fn cmo(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if values.is_empty() || period == 0 {
        return vec![];
    }

    let mut result = Vec::with_capacity(values.len());

    for i in 0..values.len() {
        if i < period {
            result.push(None);
            continue;
        }

        let (up, down) = values[i - period..=i]
            .windows(2)
            .map(|w| w[1] - w[0])
            .fold((0.0, 0.0), |(up, down), change| {
                if change > 0.0 {
                    (up + change, down)
                } else {
                    (up, down - change)
                }
            });

        let total = up + down;
        if total > 0.0 {
            result.push(Some(100.0 * (up - down) / total));
        } else {
            result.push(Some(0.0));
        }
    }

    result
}

// =============================================================================
// Trend Indicators
// =============================================================================

/// Calculate Directional Movement Index (DMI) components using Wilder's smoothing
/// Returns (+DI, -DI)
pub fn dmi(
    high: &[f64],
    low: &[f64],
    close: &[f64],
    period: usize,
) -> (Vec<Option<f64>>, Vec<Option<f64>>) {
    if high.is_empty() || period == 0 {
        return (vec![], vec![]);
    }

    let mut plus_dm = vec![0.0; high.len()];
    let mut minus_dm = vec![0.0; high.len()];

    for i in 1..high.len() {
        let up_move = high[i] - high[i - 1];
        let down_move = low[i - 1] - low[i];

        if up_move > down_move && up_move > 0.0 {
            plus_dm[i] = up_move;
        }
        if down_move > up_move && down_move > 0.0 {
            minus_dm[i] = down_move;
        }
    }

    let smoothed_plus_dm = wilders_smooth(&plus_dm, period);
    let smoothed_minus_dm = wilders_smooth(&minus_dm, period);
    let atr_values = atr(high, low, close, period);

    let mut plus_di = Vec::with_capacity(high.len());
    let mut minus_di = Vec::with_capacity(high.len());

    for i in 0..high.len() {
        match (
            smoothed_plus_dm.get(i),
            smoothed_minus_dm.get(i),
            atr_values.get(i),
        ) {
            (Some(Some(pdm)), Some(Some(mdm)), Some(Some(atr_val))) if *atr_val > 0.0 => {
                plus_di.push(Some(pdm / atr_val * 100.0));
                minus_di.push(Some(mdm / atr_val * 100.0));
            }
            _ => {
                plus_di.push(None);
                minus_di.push(None);
            }
        }
    }

    (plus_di, minus_di)
}

/// Calculate Average Directional Index (ADX) using Wilder's smoothing
///
/// ADX requires 2*period - 1 warmup bars:
/// - First period for DI values to become valid
/// - Second period for ADX smoothing of DX values
pub fn adx(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Vec<Option<f64>> {
    if high.is_empty() || period == 0 {
        return vec![];
    }

    let (plus_di, minus_di) = dmi(high, low, close, period);

    // DI values become valid at index (period - 1)
    let di_start = period - 1;

    let mut result = vec![None; high.len()];

    let mut dx_values: Vec<f64> = Vec::new();
    for i in di_start..high.len() {
        if let (Some(pdi), Some(mdi)) = (
            plus_di.get(i).and_then(|x| *x),
            minus_di.get(i).and_then(|x| *x),
        ) {
            let sum = pdi + mdi;
            if sum > 0.0 {
                dx_values.push((pdi - mdi).abs() / sum * 100.0);
            } else {
                dx_values.push(0.0);
            }
        } else {
            dx_values.push(0.0);
        }
    }

    // ADX first valid at bar (2*period - 2)
    if dx_values.len() >= period {
        let mut adx_value: Option<f64> = None;

        for (j, &dx) in dx_values.iter().enumerate() {
            let bar_idx = di_start + j;

            if j + 1 < period {
                // Not enough DX values yet
            } else if j + 1 == period {
                let sum: f64 = dx_values[0..period].iter().sum();
                adx_value = Some(sum / period as f64);
                result[bar_idx] = adx_value;
            } else if let Some(prev_adx) = adx_value {
                let new_adx = (prev_adx * (period - 1) as f64 + dx) / period as f64;
                adx_value = Some(new_adx);
                result[bar_idx] = adx_value;
            }
        }
    }

    result
}

// =============================================================================
// Indicator Adapter
// =============================================================================

/// Single-line indicators reachable through the adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorKind {
    Sma,
    Ema,
    Tema,
    Rsi,
    Cmo,
    Atr,
    Adx,
}

impl IndicatorKind {
    pub fn name(self) -> &'static str {
        match self {
            IndicatorKind::Sma => "sma",
            IndicatorKind::Ema => "ema",
            IndicatorKind::Tema => "tema",
            IndicatorKind::Rsi => "rsi",
            IndicatorKind::Cmo => "cmo",
            IndicatorKind::Atr => "atr",
            IndicatorKind::Adx => "adx",
        }
    }

    /// Number of inputs needed before the first defined output
    pub fn warmup(self, period: usize) -> usize {
        match self {
            IndicatorKind::Sma | IndicatorKind::Ema | IndicatorKind::Rsi | IndicatorKind::Atr => {
                period
            }
            IndicatorKind::Tema => (3 * period).saturating_sub(2),
            IndicatorKind::Cmo => period + 1,
            IndicatorKind::Adx => (2 * period).saturating_sub(1),
        }
    }

    fn needs_ohlc(self) -> bool {
        matches!(self, IndicatorKind::Atr | IndicatorKind::Adx)
    }
}

/// Adapter output: latest value or a full aligned series
#[derive(Debug, Clone, PartialEq)]
pub enum IndicatorValue {
    Scalar(f64),
    Series(Vec<Option<f64>>),
}

impl IndicatorValue {
    /// Most recent defined value
    pub fn latest(&self) -> Option<f64> {
        match self {
            IndicatorValue::Scalar(v) => Some(*v),
            IndicatorValue::Series(s) => s.last().copied().flatten(),
        }
    }

    /// Value one step before the latest (series only)
    pub fn previous(&self) -> Option<f64> {
        match self {
            IndicatorValue::Scalar(_) => None,
            IndicatorValue::Series(s) if s.len() >= 2 => s[s.len() - 2],
            IndicatorValue::Series(_) => None,
        }
    }

    pub fn as_series(&self) -> Option<&[Option<f64>]> {
        match self {
            IndicatorValue::Series(s) => Some(s),
            IndicatorValue::Scalar(_) => None,
        }
    }
}

/// Bollinger Band adapter output
#[derive(Debug, Clone, PartialEq)]
pub struct BandValue {
    pub upper: IndicatorValue,
    pub middle: IndicatorValue,
    pub lower: IndicatorValue,
}

impl BandValue {
    /// Band width of the latest values
    pub fn latest_width(&self) -> Option<f64> {
        Some(band_width(
            self.upper.latest()?,
            self.lower.latest()?,
            self.middle.latest()?,
        ))
    }
}

/// A zero period never produces a value, whatever the window length
fn check_length(indicator: &'static str, available: usize, period: usize) -> Result<(), SignalError> {
    let required = period.max(1);
    if period == 0 || available < required {
        return Err(SignalError::InsufficientData {
            indicator,
            required,
            available,
        });
    }
    Ok(())
}

fn finish(
    kind: IndicatorKind,
    period: usize,
    series: Vec<Option<f64>>,
    sequential: bool,
) -> Result<IndicatorValue, SignalError> {
    let available = series.len();
    let series: Vec<Option<f64>> = series
        .into_iter()
        .map(|v| v.filter(|x| x.is_finite()))
        .collect();

    if sequential {
        return Ok(IndicatorValue::Series(series));
    }

    series
        .last()
        .copied()
        .flatten()
        .map(IndicatorValue::Scalar)
        .ok_or(SignalError::InsufficientData {
            indicator: kind.name(),
            required: kind.warmup(period),
            available,
        })
}

fn price_series(kind: IndicatorKind, values: &[f64], period: usize) -> Vec<Option<f64>> {
    match kind {
        IndicatorKind::Sma => sma(values, period),
        IndicatorKind::Ema => ema(values, period),
        IndicatorKind::Tema => tema(values, period),
        IndicatorKind::Rsi => rsi(values, period),
        IndicatorKind::Cmo => cmo(values, period),
        IndicatorKind::Atr | IndicatorKind::Adx => vec![None; values.len()],
    }
}

/// Compute a single-line indicator over a candle window (close as source;
/// ATR and ADX use high/low/close).
pub fn compute(
    kind: IndicatorKind,
    window: &[Candle],
    period: usize,
    sequential: bool,
) -> Result<IndicatorValue, SignalError> {
    check_length(kind.name(), window.len(), period)?;

    let close: Vec<f64> = window.iter().map(|c| c.close).collect();
    let series = if kind.needs_ohlc() {
        let high: Vec<f64> = window.iter().map(|c| c.high).collect();
        let low: Vec<f64> = window.iter().map(|c| c.low).collect();
        match kind {
            IndicatorKind::Atr => atr(&high, &low, &close, period),
            _ => adx(&high, &low, &close, period),
        }
    } else {
        price_series(kind, &close, period)
    };

    finish(kind, period, series, sequential)
}

/// Compute a single-line indicator over an arbitrary value series
/// (e.g. SMA of RSI, EMA of volume). Warm-up `None`s in `values` are skipped
/// and the output stays aligned with the input.
pub fn compute_series(
    kind: IndicatorKind,
    values: &[Option<f64>],
    period: usize,
    sequential: bool,
) -> Result<IndicatorValue, SignalError> {
    if kind.needs_ohlc() {
        return Err(SignalError::RequiresOhlc(kind.name()));
    }

    let defined = values.iter().filter(|v| v.is_some()).count();
    check_length(kind.name(), defined, period)?;

    let series = over_defined(values, |v| price_series(kind, v, period));
    finish(kind, period, series, sequential)
}

/// Compute Bollinger Bands over the closes of a candle window
pub fn compute_bands(
    window: &[Candle],
    period: usize,
    num_std: f64,
    sequential: bool,
) -> Result<BandValue, SignalError> {
    check_length("bollinger_bands", window.len(), period)?;

    let close: Vec<f64> = window.iter().map(|c| c.close).collect();
    let (upper, middle, lower) = bollinger_bands(&close, period, num_std);

    let wrap = |series| finish(IndicatorKind::Sma, period, series, sequential);
    Ok(BandValue {
        upper: wrap(upper)?,
        middle: wrap(middle)?,
        lower: wrap(lower)?,
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{Duration, TimeZone, Utc};

    fn candles_from_closes(closes: &[f64]) -> Vec<Candle> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                Candle::new_unchecked(
                    start + Duration::hours(i as i64),
                    c,
                    c + 1.0,
                    c - 1.0,
                    c,
                    1000.0,
                )
            })
            .collect()
    }

    #[test]
    fn test_sma() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let result = sma(&values, 3);

        assert_eq!(result[0], None);
        assert_eq!(result[1], None);
        assert_relative_eq!(result[2].unwrap(), 2.0, epsilon = 1e-9);
        assert_relative_eq!(result[4].unwrap(), 4.0, epsilon = 1e-9);
    }

    #[test]
    fn test_tema_warmup_and_trend() {
        let values: Vec<f64> = (1..=40).map(|x| x as f64).collect();
        let result = tema(&values, 5);

        // First defined value at index 3 * 5 - 3
        assert!(result[11].is_none());
        assert!(result[12].is_some());
        // TEMA hugs a linear ramp closely
        let last = result.last().unwrap().unwrap();
        assert!((last - 40.0).abs() < 2.0, "tema {last}");
    }

    #[test]
    fn test_cmo_bounds() {
        let rising: Vec<f64> = (1..=20).map(|x| x as f64).collect();
        assert_relative_eq!(cmo(&rising, 5).last().unwrap().unwrap(), 100.0);

        let flat = vec![10.0; 20];
        assert_eq!(cmo(&flat, 5).last().unwrap(), &Some(0.0));

        let falling: Vec<f64> = (1..=20).rev().map(|x| x as f64).collect();
        assert_relative_eq!(cmo(&falling, 5).last().unwrap().unwrap(), -100.0);
    }

    #[test]
    fn test_atr() {
        let high = vec![10.0, 11.0, 12.0, 11.5, 12.0];
        let low = vec![9.0, 10.0, 11.0, 10.5, 11.0];
        let close = vec![9.5, 10.5, 11.5, 11.0, 11.5];

        let result = atr(&high, &low, &close, 3);

        assert!(result[1].is_none());
        assert!(result[2].unwrap() > 0.0);
    }

    #[test]
    fn test_adx_warmup() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
        let candles = candles_from_closes(&closes);
        let high: Vec<f64> = candles.iter().map(|c| c.high).collect();
        let low: Vec<f64> = candles.iter().map(|c| c.low).collect();

        let result = adx(&high, &low, &closes, 5);
        assert!(result[7].is_none());
        assert!(result[8].is_some());
        // A steady ramp is a strong trend
        assert!(result.last().unwrap().unwrap() > 50.0);
    }

    #[test]
    fn test_band_width_is_finite_and_non_negative() {
        assert_relative_eq!(band_width(102.0, 98.0, 100.0), 0.04);
        assert!(band_width(1.0, -1.0, 0.0).is_finite());
        assert!(band_width(1.0, -1.0, 0.0) >= 0.0);
        assert!(band_width(1.0, 0.5, -2.0) >= 0.0);
        assert_eq!(band_width(f64::NAN, 1.0, 1.0), 0.0);
        assert_eq!(band_width(f64::INFINITY, 1.0, 1.0), 0.0);
    }

    #[test]
    fn test_compute_rejects_short_window() {
        let candles = candles_from_closes(&[1.0, 2.0, 3.0]);

        for kind in [
            IndicatorKind::Sma,
            IndicatorKind::Rsi,
            IndicatorKind::Atr,
            IndicatorKind::Adx,
            IndicatorKind::Tema,
        ] {
            for sequential in [true, false] {
                let err = compute(kind, &candles, 5, sequential).unwrap_err();
                assert_eq!(
                    err,
                    SignalError::InsufficientData {
                        indicator: kind.name(),
                        required: 5,
                        available: 3,
                    }
                );
            }
        }
    }

    #[test]
    fn test_compute_scalar_during_warmup_is_insufficient() {
        // Long enough for the period check, too short for ADX warm-up
        let closes: Vec<f64> = (0..6).map(|i| 100.0 + i as f64).collect();
        let candles = candles_from_closes(&closes);

        let err = compute(IndicatorKind::Adx, &candles, 5, false).unwrap_err();
        assert!(matches!(
            err,
            SignalError::InsufficientData { required: 9, .. }
        ));

        let series = compute(IndicatorKind::Adx, &candles, 5, true).unwrap();
        assert_eq!(series.as_series().unwrap().len(), 6);
        assert!(series.latest().is_none());
    }

    #[test]
    fn test_compute_series_sma_of_rsi_stays_aligned() {
        let closes: Vec<f64> = (0..30)
            .map(|i| 100.0 + ((i as f64) * 0.7).sin() * 5.0)
            .collect();
        let candles = candles_from_closes(&closes);

        let rsi_series = compute(IndicatorKind::Rsi, &candles, 12, true).unwrap();
        let rsi_sma = compute_series(
            IndicatorKind::Sma,
            rsi_series.as_series().unwrap(),
            5,
            true,
        )
        .unwrap();

        let s = rsi_sma.as_series().unwrap();
        assert_eq!(s.len(), 30);
        // RSI defined from index 11, SMA(5) of it from index 15
        assert!(s[14].is_none());
        assert!(s[15].is_some());
    }

    #[test]
    fn test_compute_series_rejects_ohlc_indicators() {
        let values = vec![Some(1.0); 10];
        assert_eq!(
            compute_series(IndicatorKind::Atr, &values, 3, false).unwrap_err(),
            SignalError::RequiresOhlc("atr")
        );
    }

    #[test]
    fn test_compute_bands_ordering() {
        let closes = vec![20.0, 21.0, 22.0, 21.0, 20.0, 21.0, 22.0, 23.0, 22.0, 21.0];
        let candles = candles_from_closes(&closes);

        let bands = compute_bands(&candles, 5, 2.0, false).unwrap();
        let upper = bands.upper.latest().unwrap();
        let middle = bands.middle.latest().unwrap();
        let lower = bands.lower.latest().unwrap();

        assert!(upper > middle && middle > lower);
        assert!(bands.latest_width().unwrap() > 0.0);
    }

    #[test]
    fn test_zero_period_is_insufficient() {
        let candles = candles_from_closes(&[1.0, 2.0]);
        assert!(matches!(
            compute(IndicatorKind::Ema, &[], 0, false),
            Err(SignalError::InsufficientData { required: 1, .. })
        ));
        assert!(matches!(
            compute(IndicatorKind::Ema, &candles, 0, true),
            Err(SignalError::InsufficientData { required: 1, available: 2, .. })
        ));
        assert!(matches!(
            compute_bands(&candles, 0, 2.0, true),
            Err(SignalError::InsufficientData { required: 1, .. })
        ));
        let values = [Some(1.0), Some(2.0)];
        assert!(compute_series(IndicatorKind::Sma, &values, 0, true).is_err());
    }
}

//! Per-tick indicator snapshot
//!
//! All indicators a decision needs are computed once per candle into an
//! immutable [`IndicatorSnapshot`]. The classifier, signal generator and risk
//! manager only ever read this struct, so a tick evaluates against one
//! consistent set of values and re-evaluating the same window is pure.
//!
//! A field is `None` when its indicator is still warming up or its input is
//! unavailable; the reason is logged at trace level and never escapes.

use serde::Serialize;

use crate::error::SignalError;
use crate::indicators::{self, IndicatorKind, IndicatorValue};
use crate::market_state::{higher_timeframe_trend, Trend};
use crate::params::StrategyParams;
use crate::Candle;

/// Immutable indicator values for the latest candle of a window
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IndicatorSnapshot {
    pub close: Option<f64>,
    pub prev_close: Option<f64>,
    pub volume: Option<f64>,
    /// EMA of volume over `volume_period`
    pub volume_avg: Option<f64>,

    pub rsi: Option<f64>,
    pub prev_rsi: Option<f64>,
    pub rsi_sma: Option<f64>,
    pub prev_rsi_sma: Option<f64>,

    pub bb_upper: Option<f64>,
    pub bb_middle: Option<f64>,
    pub bb_lower: Option<f64>,
    pub bb_width: Option<f64>,
    pub prev_bb_width: Option<f64>,

    pub adx: Option<f64>,
    pub prev_adx: Option<f64>,
    pub sma_trend: Option<f64>,
    pub atr: Option<f64>,
    pub cmo: Option<f64>,
    /// TEMA pair on the window's closes
    pub tema_fast: Option<f64>,
    pub tema_slow: Option<f64>,

    /// Trend on the auxiliary timeframe, when one was supplied
    pub htf_trend: Option<Trend>,

    /// Number of candles the snapshot was computed from
    pub len: usize,
}

/// Keep the value, or log why it is unavailable
fn defined<T>(indicator: &str, result: Result<T, SignalError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::trace!(indicator, error = %e, "indicator undefined");
            None
        }
    }
}

fn last_two(value: Option<&IndicatorValue>) -> (Option<f64>, Option<f64>) {
    value.map_or((None, None), |v| (v.latest(), v.previous()))
}

impl IndicatorSnapshot {
    /// Compute every indicator for the last candle of `window`.
    ///
    /// `aux` holds the higher-timeframe candles when the policy uses one;
    /// `None` leaves `htf_trend` undefined.
    pub fn compute(window: &[Candle], aux: Option<&[Candle]>, params: &StrategyParams) -> Self {
        let n = window.len();
        let close = window.last().map(|c| c.close);
        let prev_close = n.checked_sub(2).map(|i| window[i].close);
        let volume = window.last().map(|c| c.volume);

        let volumes: Vec<Option<f64>> = window.iter().map(|c| Some(c.volume)).collect();
        let volume_avg = defined(
            "volume_ema",
            indicators::compute_series(IndicatorKind::Ema, &volumes, params.volume_period, false),
        )
        .and_then(|v| v.latest());

        let rsi_series = defined(
            "rsi",
            indicators::compute(IndicatorKind::Rsi, window, params.rsi_period, true),
        );
        let (rsi, prev_rsi) = last_two(rsi_series.as_ref());

        let rsi_sma_series = rsi_series
            .as_ref()
            .and_then(IndicatorValue::as_series)
            .and_then(|s| {
                defined(
                    "rsi_sma",
                    indicators::compute_series(IndicatorKind::Sma, s, params.rsi_sma_period, true),
                )
            });
        let (rsi_sma, prev_rsi_sma) = last_two(rsi_sma_series.as_ref());

        let bands = defined(
            "bollinger_bands",
            indicators::compute_bands(window, params.bb_period, params.bb_std, true),
        );
        let (bb_upper, bb_middle, bb_lower, bb_width, prev_bb_width) = match &bands {
            Some(b) => {
                let widths = match (
                    b.upper.as_series(),
                    b.lower.as_series(),
                    b.middle.as_series(),
                ) {
                    (Some(u), Some(l), Some(m)) => indicators::band_width_series(u, l, m),
                    _ => Vec::new(),
                };
                let width = widths.last().copied().flatten();
                let prev_width = widths.len().checked_sub(2).and_then(|i| widths[i]);
                (
                    b.upper.latest(),
                    b.middle.latest(),
                    b.lower.latest(),
                    width,
                    prev_width,
                )
            }
            None => (None, None, None, None, None),
        };

        let adx_series = defined(
            "adx",
            indicators::compute(IndicatorKind::Adx, window, params.adx_period, true),
        );
        let (adx, prev_adx) = last_two(adx_series.as_ref());

        let scalar = |kind: IndicatorKind, period: usize| {
            defined(kind.name(), indicators::compute(kind, window, period, false))
                .and_then(|v| v.latest())
        };

        let htf_trend = aux.and_then(|candles| {
            higher_timeframe_trend(candles, params.htf_fast_period, params.htf_slow_period)
        });

        Self {
            close,
            prev_close,
            volume,
            volume_avg,
            rsi,
            prev_rsi,
            rsi_sma,
            prev_rsi_sma,
            bb_upper,
            bb_middle,
            bb_lower,
            bb_width,
            prev_bb_width,
            adx,
            prev_adx,
            sma_trend: scalar(IndicatorKind::Sma, params.sma_trend_period),
            atr: scalar(IndicatorKind::Atr, params.atr_period),
            cmo: scalar(IndicatorKind::Cmo, params.cmo_period),
            tema_fast: scalar(IndicatorKind::Tema, params.tema_fast_period),
            tema_slow: scalar(IndicatorKind::Tema, params.tema_slow_period),
            htf_trend,
            len: n,
        }
    }

    /// RSI minus its SMA, current and previous
    pub fn rsi_spread(&self) -> (Option<f64>, Option<f64>) {
        let spread = |a: Option<f64>, b: Option<f64>| Some(a? - b?);
        (
            spread(self.rsi, self.rsi_sma),
            spread(self.prev_rsi, self.prev_rsi_sma),
        )
    }
}

//! Market state classification
//!
//! Turns an [`IndicatorSnapshot`] into a [`MarketState`]: sideways/trending,
//! independent up/down checklist quorums, and trend-strength confirmation.
//! The state is recomputed from scratch each tick; nothing carries over.

use serde::{Deserialize, Serialize};

use crate::indicators::tema;
use crate::params::StrategyParams;
use crate::policy::{SidewaysCombinator, StrategyPolicy, TrendCheck};
use crate::snapshot::IndicatorSnapshot;
use crate::Candle;

/// Trend direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Trend {
    Up,
    Down,
    Neutral,
}

/// Market state for one evaluation.
///
/// The up and down quorums are evaluated independently: checks such as ADX
/// strength vote for both sides, so a pullback in an uptrend can meet both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketState {
    /// Summary direction: `Up`/`Down` when exactly one quorum is met
    pub trend: Trend,
    pub uptrend: bool,
    pub downtrend: bool,
    pub is_sideways: bool,
    pub strong_uptrend: bool,
    pub strong_downtrend: bool,
}

impl Default for MarketState {
    fn default() -> Self {
        Self {
            trend: Trend::Neutral,
            uptrend: false,
            downtrend: false,
            is_sideways: true,
            strong_uptrend: false,
            strong_downtrend: false,
        }
    }
}

impl MarketState {
    /// Whether the quorum for `wanted` is met, and optionally its strength
    pub fn confirms(&self, wanted: Trend, require_strength: bool) -> bool {
        match wanted {
            Trend::Up => self.uptrend && (!require_strength || self.strong_uptrend),
            Trend::Down => self.downtrend && (!require_strength || self.strong_downtrend),
            Trend::Neutral => false,
        }
    }
}

/// Higher-timeframe trend from a fast/slow TEMA pair on the auxiliary candles
pub fn higher_timeframe_trend(candles: &[Candle], fast: usize, slow: usize) -> Option<Trend> {
    let close: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let fast = tema(&close, fast).last().copied().flatten()?;
    let slow = tema(&close, slow).last().copied().flatten()?;

    if fast > slow {
        Some(Trend::Up)
    } else if fast < slow {
        Some(Trend::Down)
    } else {
        Some(Trend::Neutral)
    }
}

fn summarize(up: bool, down: bool) -> Trend {
    match (up, down) {
        (true, false) => Trend::Up,
        (false, true) => Trend::Down,
        _ => Trend::Neutral,
    }
}

/// Per-direction vote of a single checklist item
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Vote {
    up: bool,
    down: bool,
}

impl Vote {
    fn both(v: bool) -> Self {
        Self { up: v, down: v }
    }

    fn compare(a: Option<f64>, b: Option<f64>) -> Self {
        match (a, b) {
            (Some(a), Some(b)) => Self {
                up: a > b,
                down: a < b,
            },
            _ => Self::default(),
        }
    }
}

/// Classifier over snapshot values
#[derive(Debug, Clone)]
pub struct MarketStateClassifier<'a> {
    params: &'a StrategyParams,
    policy: &'a StrategyPolicy,
}

impl<'a> MarketStateClassifier<'a> {
    pub fn new(params: &'a StrategyParams, policy: &'a StrategyPolicy) -> Self {
        Self { params, policy }
    }

    pub fn classify(&self, snap: &IndicatorSnapshot) -> MarketState {
        let (up, down) = self.quorums(snap);
        MarketState {
            trend: summarize(up, down),
            uptrend: up,
            downtrend: down,
            is_sideways: self.is_sideways(snap),
            strong_uptrend: up && self.trend_strength_confirmed(snap, Trend::Up),
            strong_downtrend: down && self.trend_strength_confirmed(snap, Trend::Down),
        }
    }

    /// Insufficient ADX or band-width history counts as sideways
    pub fn is_sideways(&self, snap: &IndicatorSnapshot) -> bool {
        let (Some(adx), Some(_), Some(width), Some(_)) =
            (snap.adx, snap.prev_adx, snap.bb_width, snap.prev_bb_width)
        else {
            return true;
        };

        let weak_trend = adx < self.params.adx_threshold;
        let narrow_bands = width < self.params.bb_width_threshold;

        match self.policy.sideways_combinator {
            SidewaysCombinator::Any => weak_trend || narrow_bands,
            SidewaysCombinator::All => {
                let quiet_rsi = match (snap.rsi, snap.prev_rsi) {
                    (Some(rsi), Some(prev)) => {
                        (rsi - prev).abs() < self.params.rsi_volatility_threshold
                    }
                    _ => true,
                };
                weak_trend && narrow_bands && quiet_rsi
            }
        }
    }

    fn vote(&self, check: TrendCheck, snap: &IndicatorSnapshot) -> Vote {
        let p = self.params;
        match check {
            TrendCheck::AdxStrength => Vote::both(snap.adx.is_some_and(|a| a >= p.adx_threshold)),
            TrendCheck::AdxRising => Vote::both(match (snap.adx, snap.prev_adx) {
                (Some(adx), Some(prev)) => adx > p.adx_threshold && adx > prev,
                _ => false,
            }),
            TrendCheck::PriceVsSma => Vote::compare(snap.close, snap.sma_trend),
            TrendCheck::PriceVsBandMiddle => Vote::compare(snap.close, snap.bb_middle),
            TrendCheck::PriceMomentum => Vote::compare(snap.close, snap.prev_close),
            TrendCheck::TemaCrossover => Vote::compare(snap.tema_fast, snap.tema_slow),
            TrendCheck::HigherTimeframe => match snap.htf_trend {
                Some(Trend::Up) => Vote {
                    up: true,
                    down: false,
                },
                Some(Trend::Down) => Vote {
                    up: false,
                    down: true,
                },
                _ => Vote::default(),
            },
            TrendCheck::VolumeSpike => Vote::both(match (snap.volume, snap.volume_avg) {
                (Some(v), Some(avg)) => v > avg * p.volume_spike_factor,
                _ => false,
            }),
            TrendCheck::CmoMomentum => match snap.cmo {
                Some(cmo) => Vote {
                    up: cmo > p.cmo_threshold,
                    down: cmo < -p.cmo_threshold,
                },
                None => Vote::default(),
            },
        }
    }

    /// Up and down quorums over the configured checklist, each on its own
    pub fn quorums(&self, snap: &IndicatorSnapshot) -> (bool, bool) {
        let (up, down) = self
            .policy
            .trend_checks
            .iter()
            .map(|&check| self.vote(check, snap))
            .fold((0usize, 0usize), |(up, down), vote| {
                (up + vote.up as usize, down + vote.down as usize)
            });

        let quorum = self.params.trend_quorum;
        (up >= quorum, down >= quorum)
    }

    /// Summary direction: Neutral unless exactly one quorum is met
    pub fn trend(&self, snap: &IndicatorSnapshot) -> Trend {
        let (up, down) = self.quorums(snap);
        summarize(up, down)
    }

    /// Strong and strengthening ADX, agreeing with the higher timeframe when
    /// one is configured
    pub fn trend_strength_confirmed(&self, snap: &IndicatorSnapshot, trend: Trend) -> bool {
        let rising = match (snap.adx, snap.prev_adx) {
            (Some(adx), Some(prev)) => adx >= self.params.adx_threshold && adx > prev,
            _ => false,
        };
        if !rising {
            return false;
        }

        match self.policy.higher_timeframe {
            Some(_) => snap.htf_trend == Some(trend),
            None => true,
        }
    }
}

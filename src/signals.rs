//! Entry and exit decisions
//!
//! Gates are evaluated in a fixed order per candle:
//! 1. sideways gate: a sideways market suppresses both entries
//! 2. directional gate: the quorum for the side must be met (up for long,
//!    down for short), independently of the other side
//! 3. price/oscillator gate: close against a Bollinger band plus the
//!    RSI/RSI-SMA momentum trigger
//!
//! Any undefined input fails its gate. Long is evaluated first and a short is
//! only possible when the long gate failed.

use serde::{Deserialize, Serialize};

use crate::market_state::{MarketState, Trend};
use crate::params::StrategyParams;
use crate::policy::{BandLevel, MomentumTrigger, StrategyPolicy};
use crate::risk::RiskManager;
use crate::snapshot::IndicatorSnapshot;
use crate::{ExitReason, PositionView, Side, Signal};

/// Outcome of the exit gate for an open position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitDecision {
    Hold,
    Exit(ExitReason),
}

/// Signal generator over snapshot values and market state
#[derive(Debug, Clone)]
pub struct SignalGenerator<'a> {
    params: &'a StrategyParams,
    policy: &'a StrategyPolicy,
}

fn band(snap: &IndicatorSnapshot, level: BandLevel) -> Option<f64> {
    match level {
        BandLevel::Upper => snap.bb_upper,
        BandLevel::Middle => snap.bb_middle,
        BandLevel::Lower => snap.bb_lower,
    }
}

fn below(a: Option<f64>, b: Option<f64>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a < b)
}

fn above(a: Option<f64>, b: Option<f64>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a > b)
}

impl<'a> SignalGenerator<'a> {
    pub fn new(params: &'a StrategyParams, policy: &'a StrategyPolicy) -> Self {
        Self { params, policy }
    }

    /// Bullish momentum trigger
    fn momentum_long(&self, snap: &IndicatorSnapshot) -> bool {
        match self.policy.momentum_trigger {
            MomentumTrigger::Level => above(snap.rsi_sma, snap.rsi),
            MomentumTrigger::Crossover => match snap.rsi_spread() {
                (Some(now), Some(prev)) => prev <= 0.0 && now > 0.0,
                _ => false,
            },
        }
    }

    /// Bearish momentum trigger
    fn momentum_short(&self, snap: &IndicatorSnapshot) -> bool {
        match self.policy.momentum_trigger {
            MomentumTrigger::Level => below(snap.rsi_sma, snap.rsi),
            MomentumTrigger::Crossover => match snap.rsi_spread() {
                (Some(now), Some(prev)) => prev >= 0.0 && now < 0.0,
                _ => false,
            },
        }
    }

    fn trend_agrees(&self, state: &MarketState, wanted: Trend) -> bool {
        state.confirms(wanted, self.policy.require_strong_trend)
    }

    pub fn should_long(&self, snap: &IndicatorSnapshot, state: &MarketState) -> bool {
        if state.is_sideways {
            return false;
        }

        let momentum = self.momentum_long(snap);
        if self.trend_agrees(state, Trend::Up) {
            return momentum && below(snap.close, band(snap, self.policy.long_band));
        }

        self.policy.counter_trend_fallback
            && momentum
            && below(snap.close, snap.bb_lower)
            && snap.rsi_sma.is_some_and(|s| s > self.params.rsi_oversold)
    }

    pub fn should_short(&self, snap: &IndicatorSnapshot, state: &MarketState) -> bool {
        if !self.policy.allow_short || state.is_sideways || self.should_long(snap, state) {
            return false;
        }

        let momentum = self.momentum_short(snap);
        if self.trend_agrees(state, Trend::Down) {
            return momentum && above(snap.close, band(snap, self.policy.short_band));
        }

        self.policy.counter_trend_fallback
            && momentum
            && above(snap.close, snap.bb_upper)
            && snap.rsi_sma.is_some_and(|s| s < self.params.rsi_overbought)
    }

    /// Entry decision for one evaluation
    pub fn entry_signal(&self, snap: &IndicatorSnapshot, state: &MarketState) -> Signal {
        if self.should_long(snap, state) {
            Signal::Long
        } else if self.should_short(snap, state) {
            Signal::Short
        } else {
            Signal::Flat
        }
    }

    /// Band cross plus momentum reversal against the open side
    pub fn should_exit(&self, snap: &IndicatorSnapshot, side: Side) -> bool {
        match side {
            Side::Buy => {
                above(snap.close, band(snap, self.policy.long_exit_band)) && self.momentum_short(snap)
            }
            Side::Sell => {
                below(snap.close, band(snap, self.policy.short_exit_band)) && self.momentum_long(snap)
            }
        }
    }

    /// Exit gate: loss limit first, then the signal exit
    pub fn exit_decision(
        &self,
        snap: &IndicatorSnapshot,
        position: &PositionView,
        entry_atr: Option<f64>,
        risk: &RiskManager,
    ) -> ExitDecision {
        if risk.loss_limit_breached(position, entry_atr) {
            return ExitDecision::Exit(ExitReason::LossLimit);
        }
        if self.should_exit(snap, position.side) {
            return ExitDecision::Exit(ExitReason::Signal);
        }
        ExitDecision::Hold
    }
}

//! Variant policy: the qualitative choices that distinguish the strategy
//! family members (combinators, checklists, bands, triggers, stop mode).
//!
//! Numeric thresholds live in [`crate::params::StrategyParams`]; everything
//! here is a discrete switch fixed for the session's lifetime.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::params::StrategyParams;

/// How the sideways predicates combine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SidewaysCombinator {
    /// Weak ADX or narrow bands is enough
    #[default]
    Any,
    /// Weak ADX, narrow bands and quiet RSI together
    All,
}

/// One item of the trend-direction checklist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendCheck {
    /// ADX at or above threshold (counts for both directions)
    AdxStrength,
    /// ADX above threshold and rising (counts for both directions)
    AdxRising,
    /// Close above / below the trend SMA
    PriceVsSma,
    /// Close above / below the Bollinger middle band
    PriceVsBandMiddle,
    /// Close above / below the previous close
    PriceMomentum,
    /// Higher-timeframe trend agrees
    HigherTimeframe,
    /// Volume above its average times the spike factor (both directions)
    VolumeSpike,
    /// CMO beyond +threshold / -threshold
    CmoMomentum,
    /// Fast TEMA above / below the slow TEMA on the session's own candles
    TemaCrossover,
}

/// Oscillator entry trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MomentumTrigger {
    /// RSI-SMA above RSI (long) / below RSI (short)
    #[default]
    Level,
    /// RSI crosses its SMA
    Crossover,
}

/// Bollinger band used as a price gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BandLevel {
    Upper,
    Middle,
    Lower,
}

/// How protective levels follow price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopMode {
    /// Re-anchored every evaluation from the latest ATR
    #[default]
    Trailing,
    /// Anchored to the ATR captured when the position opened
    FixedAtEntry,
}

fn default_trend_checks() -> Vec<TrendCheck> {
    vec![
        TrendCheck::AdxStrength,
        TrendCheck::PriceVsSma,
        TrendCheck::PriceVsBandMiddle,
        TrendCheck::PriceMomentum,
    ]
}
fn default_long_band() -> BandLevel {
    BandLevel::Middle
}
fn default_short_band() -> BandLevel {
    BandLevel::Upper
}
fn default_exit_band() -> BandLevel {
    BandLevel::Middle
}
fn default_cancel_unfilled() -> bool {
    true
}

/// Qualitative strategy configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyPolicy {
    #[serde(default)]
    pub sideways_combinator: SidewaysCombinator,

    #[serde(default = "default_trend_checks")]
    pub trend_checks: Vec<TrendCheck>,

    #[serde(default)]
    pub momentum_trigger: MomentumTrigger,

    /// Long entries need close below this band
    #[serde(default = "default_long_band")]
    pub long_band: BandLevel,

    /// Short entries need close above this band
    #[serde(default = "default_short_band")]
    pub short_band: BandLevel,

    /// Long exits need close above this band
    #[serde(default = "default_exit_band")]
    pub long_exit_band: BandLevel,

    /// Short exits need close below this band
    #[serde(default = "default_exit_band")]
    pub short_exit_band: BandLevel,

    /// Allow an outer-band entry when the trend does not point the same way
    #[serde(default)]
    pub counter_trend_fallback: bool,

    /// Entries also need the strong-trend confirmation for their side
    #[serde(default)]
    pub require_strong_trend: bool,

    /// Auxiliary timeframe for the higher-timeframe trend (e.g. "4h")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub higher_timeframe: Option<String>,

    #[serde(default)]
    pub allow_short: bool,

    /// Cancel an entry still pending on the next candle
    #[serde(default = "default_cancel_unfilled")]
    pub cancel_unfilled_entries: bool,

    #[serde(default)]
    pub stop_mode: StopMode,
}

impl Default for StrategyPolicy {
    fn default() -> Self {
        Self {
            sideways_combinator: SidewaysCombinator::Any,
            trend_checks: default_trend_checks(),
            momentum_trigger: MomentumTrigger::Level,
            long_band: default_long_band(),
            short_band: default_short_band(),
            long_exit_band: default_exit_band(),
            short_exit_band: default_exit_band(),
            counter_trend_fallback: false,
            require_strong_trend: false,
            higher_timeframe: None,
            allow_short: false,
            cancel_unfilled_entries: true,
            stop_mode: StopMode::Trailing,
        }
    }
}

impl StrategyPolicy {
    /// Band-reversion variant: any-combinator sideways filter, midline entry
    /// in an uptrend with a lower-band fallback, long only.
    pub fn band_reversion() -> Self {
        Self {
            counter_trend_fallback: true,
            ..Self::default()
        }
    }

    /// Multi-filter variant: strict sideways filter, volume/HTF confirmed
    /// trend, RSI/SMA crossover trigger, stops fixed at entry.
    pub fn multi_filter(higher_timeframe: impl Into<String>) -> Self {
        Self {
            sideways_combinator: SidewaysCombinator::All,
            trend_checks: vec![
                TrendCheck::PriceVsSma,
                TrendCheck::AdxRising,
                TrendCheck::HigherTimeframe,
                TrendCheck::VolumeSpike,
            ],
            momentum_trigger: MomentumTrigger::Crossover,
            higher_timeframe: Some(higher_timeframe.into()),
            stop_mode: StopMode::FixedAtEntry,
            ..Self::default()
        }
    }

    /// Trend-following variant: HTF TEMA agreement, strong ADX and CMO, both
    /// directions, limit entries that are cancelled if not filled.
    pub fn trend_follow(higher_timeframe: impl Into<String>) -> Self {
        Self {
            trend_checks: vec![
                TrendCheck::HigherTimeframe,
                TrendCheck::AdxStrength,
                TrendCheck::CmoMomentum,
                TrendCheck::TemaCrossover,
            ],
            long_band: BandLevel::Upper,
            short_band: BandLevel::Lower,
            require_strong_trend: true,
            higher_timeframe: Some(higher_timeframe.into()),
            allow_short: true,
            ..Self::default()
        }
    }

    /// Cross-check against the numeric parameters
    pub fn validate(&self, params: &StrategyParams) -> Result<(), ConfigError> {
        if self.trend_checks.is_empty() {
            return Err(ConfigError::Inconsistent(
                "trend_checks must not be empty".to_string(),
            ));
        }
        if params.trend_quorum > self.trend_checks.len() {
            return Err(ConfigError::Inconsistent(format!(
                "trend_quorum ({}) exceeds the {} configured trend checks",
                params.trend_quorum,
                self.trend_checks.len()
            )));
        }
        if self.higher_timeframe.is_none()
            && self.trend_checks.contains(&TrendCheck::HigherTimeframe)
        {
            return Err(ConfigError::Inconsistent(
                "higher_timeframe check configured without a higher_timeframe".to_string(),
            ));
        }
        Ok(())
    }
}

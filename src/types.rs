//! Core data types used across the signal engine

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for candle data
#[derive(Debug, Error)]
pub enum CandleValidationError {
    #[error("high ({high}) must be >= low ({low})")]
    HighLessThanLow { high: f64, low: f64 },

    #[error("volume ({0}) must be >= 0")]
    NegativeVolume(f64),

    #[error("open ({open}) must be between low ({low}) and high ({high})")]
    OpenOutOfRange { open: f64, low: f64, high: f64 },

    #[error("close ({close}) must be between low ({low}) and high ({high})")]
    CloseOutOfRange { close: f64, low: f64, high: f64 },

    #[error("prices must be positive: open={open}, high={high}, low={low}, close={close}")]
    NonPositivePrice {
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    },

    #[error("raw candle row must have 6 columns, got {0}")]
    RowWidth(usize),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(f64),
}

/// Positional layout of an externally supplied raw candle row.
///
/// Hosts disagree on column order; the engine only ever reads candles through
/// named fields, so every raw row passes through [`Candle::from_raw`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandleLayout {
    /// `[timestamp, open, high, low, close, volume]`
    #[default]
    Standard,
    /// `[timestamp, open, close, high, low, volume]`
    Jesse,
}

impl CandleLayout {
    /// Column indices of (open, high, low, close, volume)
    fn columns(self) -> (usize, usize, usize, usize, usize) {
        match self {
            CandleLayout::Standard => (1, 2, 3, 4, 5),
            CandleLayout::Jesse => (1, 3, 4, 2, 5),
        }
    }
}

/// OHLCV candlestick data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub datetime: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// Create a new candle with validation
    pub fn new(
        datetime: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Result<Self, CandleValidationError> {
        let candle = Self::new_unchecked(datetime, open, high, low, close, volume);
        candle.validate()?;
        Ok(candle)
    }

    /// Create a candle without validation (for trusted sources or when validation is done separately)
    pub fn new_unchecked(
        datetime: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            datetime,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Convert a raw numeric row (timestamp in epoch milliseconds) into a
    /// validated candle according to `layout`.
    pub fn from_raw(row: &[f64], layout: CandleLayout) -> Result<Self, CandleValidationError> {
        if row.len() != 6 {
            return Err(CandleValidationError::RowWidth(row.len()));
        }

        let millis = row[0];
        if !millis.is_finite() || millis.fract() != 0.0 {
            return Err(CandleValidationError::InvalidTimestamp(millis));
        }
        let datetime = Utc
            .timestamp_millis_opt(millis as i64)
            .single()
            .ok_or(CandleValidationError::InvalidTimestamp(millis))?;

        let (o, h, l, c, v) = layout.columns();
        Self::new(datetime, row[o], row[h], row[l], row[c], row[v])
    }

    /// Validate the candle data
    pub fn validate(&self) -> Result<(), CandleValidationError> {
        if self.open <= 0.0 || self.high <= 0.0 || self.low <= 0.0 || self.close <= 0.0 {
            return Err(CandleValidationError::NonPositivePrice {
                open: self.open,
                high: self.high,
                low: self.low,
                close: self.close,
            });
        }

        if self.high < self.low {
            return Err(CandleValidationError::HighLessThanLow {
                high: self.high,
                low: self.low,
            });
        }

        if self.volume < 0.0 {
            return Err(CandleValidationError::NegativeVolume(self.volume));
        }

        if self.open < self.low || self.open > self.high {
            return Err(CandleValidationError::OpenOutOfRange {
                open: self.open,
                low: self.low,
                high: self.high,
            });
        }

        if self.close < self.low || self.close > self.high {
            return Err(CandleValidationError::CloseOutOfRange {
                close: self.close,
                low: self.low,
                high: self.high,
            });
        }

        Ok(())
    }

    /// Check if the candle is valid without returning detailed error
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

/// Instrument symbol using Arc<str> for cheap cloning
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(#[serde(with = "arc_str_serde")] std::sync::Arc<str>);

/// Custom serde for Arc<str>
mod arc_str_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::sync::Arc;

    pub fn serialize<S>(value: &Arc<str>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(value)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Arc<str>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Arc::from(s.as_str()))
    }
}

impl Symbol {
    pub fn new(s: impl AsRef<str>) -> Self {
        Symbol(std::sync::Arc::from(s.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Trade direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// +1 for longs, -1 for shorts
    pub fn sign(self) -> f64 {
        match self {
            Side::Buy => 1.0,
            Side::Sell => -1.0,
        }
    }
}

/// Entry decision for one evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Signal {
    Long,
    Short,
    Flat,
}

/// Read-only view of the host-owned open position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionView {
    pub side: Side,
    pub quantity: f64,
    pub entry_price: f64,
    /// Unrealized profit/loss in percent of entry value (-2.5 = 2.5% loss)
    pub unrealized_pnl_pct: f64,
}

impl PositionView {
    /// Build a view from the entry and a mark price
    pub fn marked(side: Side, quantity: f64, entry_price: f64, mark_price: f64) -> Self {
        let unrealized_pnl_pct = if entry_price > 0.0 {
            side.sign() * (mark_price - entry_price) / entry_price * 100.0
        } else {
            0.0
        };
        PositionView {
            side,
            quantity,
            entry_price,
            unrealized_pnl_pct,
        }
    }
}

/// Fill notification delivered by the host when an entry order executes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub side: Side,
    pub price: f64,
    pub quantity: f64,
}

/// Fire-and-forget order intents emitted towards the host
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderIntent {
    SubmitEntry {
        side: Side,
        quantity: f64,
        limit_price: f64,
    },
    SetStopLoss {
        quantity: f64,
        price: f64,
    },
    SetTakeProfit {
        quantity: f64,
        price: f64,
    },
    Liquidate,
    CancelEntry,
}

/// Why a position was closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// Band/momentum reversal signalled by the engine
    Signal,
    /// Unrealized loss breached the entry-ATR loss limit
    LossLimit,
    StopLoss,
    TakeProfit,
    /// Still open when the replay ran out of candles
    EndOfData,
}

/// Completed round trip
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub symbol: Symbol,
    pub side: Side,
    pub entry_price: f64,
    pub exit_price: f64,
    pub quantity: f64,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub pnl: f64,
    pub exit_reason: ExitReason,
}

impl Trade {
    pub fn return_pct(&self) -> f64 {
        if self.entry_price == 0.0 {
            return 0.0;
        }
        self.side.sign() * (self.exit_price - self.entry_price) / self.entry_price * 100.0
    }
}

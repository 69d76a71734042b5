//! Multi-timeframe candle storage
//!
//! Holds one symbol's candles keyed by timeframe and answers "everything
//! closed up to time t" queries, which is how the replay host serves both the
//! session's own window and higher-timeframe lookups without lookahead.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

use crate::Candle;

/// Multi-timeframe candle data for a single symbol
#[derive(Debug, Clone)]
pub struct MultiTimeframeData {
    /// Key: timeframe string (e.g., "1h", "4h"), candles sorted by time
    timeframes: HashMap<String, Vec<Candle>>,

    /// Timeframe the session iterates over
    primary_timeframe: String,
}

impl MultiTimeframeData {
    pub fn new(primary_timeframe: impl Into<String>) -> Self {
        Self {
            timeframes: HashMap::new(),
            primary_timeframe: primary_timeframe.into(),
        }
    }

    /// Add candle data for a specific timeframe
    pub fn add_timeframe(&mut self, timeframe: impl Into<String>, candles: Vec<Candle>) {
        self.timeframes.insert(timeframe.into(), candles);
    }

    pub fn get(&self, timeframe: &str) -> Option<&[Candle]> {
        self.timeframes.get(timeframe).map(|v| v.as_slice())
    }

    pub fn primary(&self) -> &[Candle] {
        self.get(&self.primary_timeframe).unwrap_or(&[])
    }

    pub fn primary_timeframe(&self) -> &str {
        &self.primary_timeframe
    }

    pub fn has_timeframe(&self, timeframe: &str) -> bool {
        self.timeframes.contains_key(timeframe)
    }

    /// Candles of `timeframe` whose timestamp is at or before `until`.
    ///
    /// Candle timestamps mark the open, so the last candle returned may still
    /// be forming; see [`Self::closed_by`].
    pub fn window_until(&self, timeframe: &str, until: DateTime<Utc>) -> Option<&[Candle]> {
        let candles = self.get(timeframe)?;
        let end = candles.partition_point(|c| c.datetime <= until);
        Some(&candles[..end])
    }

    /// Candles of `timeframe` fully closed by `at`. Falls back to
    /// [`Self::window_until`] when the timeframe label has no known length.
    pub fn closed_by(&self, timeframe: &str, at: DateTime<Utc>) -> Option<&[Candle]> {
        let candles = self.get(timeframe)?;
        let Some(span) = timeframe_duration(timeframe) else {
            return self.window_until(timeframe, at);
        };
        let end = candles.partition_point(|c| c.datetime + span <= at);
        Some(&candles[..end])
    }

    /// Length of the primary timeframe data
    pub fn len(&self) -> usize {
        self.primary().len()
    }

    pub fn is_empty(&self) -> bool {
        self.primary().is_empty()
    }
}

/// Length of a timeframe label such as "15m", "4h", "1d" or "1w"
pub fn timeframe_duration(timeframe: &str) -> Option<Duration> {
    let split = timeframe.find(|c: char| !c.is_ascii_digit())?;
    let (count, unit) = timeframe.split_at(split);
    let count: i64 = count.parse().ok()?;
    match unit {
        "m" => Some(Duration::minutes(count)),
        "h" => Some(Duration::hours(count)),
        "D" | "d" => Some(Duration::days(count)),
        "W" | "w" => Some(Duration::weeks(count)),
        _ => None,
    }
}

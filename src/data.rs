//! Historical candle loading
//!
//! CSV files are read as raw rows and converted through the layout adapter
//! ([`Candle::from_raw`]), so column order is declared once per file instead
//! of being assumed by indicator code.
//!
//! File naming follows `{data_dir}/{SYMBOL}_{timeframe}.csv`.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::multi_timeframe::MultiTimeframeData;
use crate::{Candle, CandleLayout, Symbol};

/// Parse the timestamp column: RFC 3339, `%Y-%m-%d %H:%M:%S` (UTC) or epoch
/// milliseconds
fn parse_timestamp_millis(raw: &str) -> Result<f64> {
    let raw = raw.trim();
    if let Ok(millis) = raw.parse::<i64>() {
        return Ok(millis as f64);
    }

    let datetime = raw
        .parse::<DateTime<Utc>>()
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .map(|ndt| DateTime::<Utc>::from_naive_utc_and_offset(ndt, Utc))
        })
        .with_context(|| format!("Failed to parse datetime: {raw}"))?;

    Ok(datetime.timestamp_millis() as f64)
}

/// Load candles from a CSV file with a header row.
///
/// Rows that fail candle validation are skipped with a warning; rows that
/// cannot be parsed at all are an error. The result is sorted by time with
/// duplicate timestamps removed.
pub fn load_csv(path: impl AsRef<Path>, layout: CandleLayout) -> Result<Vec<Candle>> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open CSV file {}", path.display()))?;

    let mut candles = Vec::new();
    let mut skipped = 0usize;

    for (row_idx, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read row {}", row_idx + 1))?;

        let mut row = [0.0f64; 6];
        row[0] = parse_timestamp_millis(record.get(0).context("Missing datetime column")?)?;
        for (col, slot) in row.iter_mut().enumerate().skip(1) {
            *slot = record
                .get(col)
                .with_context(|| format!("Row {}: missing column {}", row_idx + 1, col))?
                .trim()
                .parse()
                .with_context(|| format!("Row {}: failed to parse column {}", row_idx + 1, col))?;
        }

        match Candle::from_raw(&row, layout) {
            Ok(candle) => candles.push(candle),
            Err(e) => {
                skipped += 1;
                warn!(row = row_idx + 1, error = %e, "Skipping invalid candle");
            }
        }
    }

    if skipped > 0 {
        warn!(path = %path.display(), skipped, "Invalid candles skipped");
    }

    candles.sort_by_key(|c| c.datetime);
    candles.dedup_by_key(|c| c.datetime);

    Ok(candles)
}

/// Path of a symbol/timeframe file inside `data_dir`
pub fn candle_path(data_dir: impl AsRef<Path>, symbol: &Symbol, timeframe: &str) -> PathBuf {
    data_dir
        .as_ref()
        .join(format!("{}_{}.csv", symbol.as_str(), timeframe))
}

/// Load the primary timeframe and any available auxiliary timeframes for one
/// symbol. A missing auxiliary file is logged, not an error.
pub fn load_multi_timeframe(
    data_dir: impl AsRef<Path>,
    symbol: &Symbol,
    primary_timeframe: &str,
    aux_timeframes: &[String],
    layout: CandleLayout,
) -> Result<MultiTimeframeData> {
    let data_dir = data_dir.as_ref();
    let primary_path = candle_path(data_dir, symbol, primary_timeframe);
    let primary = load_csv(&primary_path, layout)
        .with_context(|| format!("Failed to load {primary_timeframe} data for {symbol}"))?;

    info!(symbol = %symbol, timeframe = primary_timeframe, candles = primary.len(), "Loaded candles");

    let mut data = MultiTimeframeData::new(primary_timeframe);
    data.add_timeframe(primary_timeframe, primary);

    for timeframe in aux_timeframes {
        let path = candle_path(data_dir, symbol, timeframe);
        if !path.exists() {
            warn!(symbol = %symbol, timeframe = %timeframe, "Auxiliary data file not found: {}", path.display());
            continue;
        }
        let candles = load_csv(&path, layout)
            .with_context(|| format!("Failed to load {timeframe} data for {symbol}"))?;
        info!(symbol = %symbol, timeframe = %timeframe, candles = candles.len(), "Loaded auxiliary candles");
        data.add_timeframe(timeframe.as_str(), candles);
    }

    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_temp(name: &str, contents: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("trend-signal-engine-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_csv_standard_layout() {
        let path = write_temp(
            "standard.csv",
            "datetime,open,high,low,close,volume\n\
             2024-01-01 01:00:00,101,103,100,102,10\n\
             2024-01-01T00:00:00Z,100,102,99,101,12\n",
        );

        let candles = load_csv(&path, CandleLayout::Standard).unwrap();
        assert_eq!(candles.len(), 2);
        // Sorted by time
        assert_eq!(candles[0].close, 101.0);
        assert_eq!(candles[1].high, 103.0);
    }

    #[test]
    fn test_load_csv_jesse_layout_with_epoch_millis() {
        let path = write_temp(
            "jesse.csv",
            "timestamp,open,close,high,low,volume\n\
             1704067200000,100,101,102,99,12\n",
        );

        let candles = load_csv(&path, CandleLayout::Jesse).unwrap();
        assert_eq!(candles.len(), 1);
        assert_eq!(candles[0].close, 101.0);
        assert_eq!(candles[0].high, 102.0);
        assert_eq!(candles[0].low, 99.0);
    }

    #[test]
    fn test_load_csv_skips_invalid_candles() {
        let path = write_temp(
            "invalid.csv",
            "datetime,open,high,low,close,volume\n\
             2024-01-01 00:00:00,100,90,110,101,12\n\
             2024-01-01 01:00:00,100,102,99,101,12\n",
        );

        let candles = load_csv(&path, CandleLayout::Standard).unwrap();
        assert_eq!(candles.len(), 1);
    }

    #[test]
    fn test_load_csv_rejects_garbage() {
        let path = write_temp(
            "garbage.csv",
            "datetime,open,high,low,close,volume\nyesterday,1,2,3,4,5\n",
        );
        assert!(load_csv(&path, CandleLayout::Standard).is_err());
    }
}

//! Typed strategy hyperparameters
//!
//! Every tunable number is declared once in [`SCHEMA`] with its type, range,
//! optional search step and default. [`StrategyParams`] can only be built by
//! validating a mapping against that schema, so a session never runs with an
//! unknown key, a missing value or an out-of-range threshold.
//!
//! Per-symbol presets travel as base64-encoded JSON objects ([`PresetBook`]).

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::ConfigError;
use crate::Symbol;

/// Raw hyperparameter mapping as injected by a host or config file
pub type Hyperparameters = HashMap<String, serde_json::Value>;

/// Declared value type of a hyperparameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    Int,
    Float,
}

/// One schema entry
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ParamSpec {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub kind: ParamType,
    pub min: f64,
    pub max: f64,
    /// Search grid step; informational only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
    pub default: f64,
}

const fn int(name: &'static str, min: f64, max: f64, default: f64) -> ParamSpec {
    ParamSpec {
        name,
        kind: ParamType::Int,
        min,
        max,
        step: None,
        default,
    }
}

const fn float(name: &'static str, min: f64, max: f64, default: f64) -> ParamSpec {
    ParamSpec {
        name,
        kind: ParamType::Float,
        min,
        max,
        step: None,
        default,
    }
}

const fn stepped(name: &'static str, min: f64, max: f64, step: f64, default: f64) -> ParamSpec {
    ParamSpec {
        name,
        kind: ParamType::Float,
        min,
        max,
        step: Some(step),
        default,
    }
}

/// Declared hyperparameters
pub const SCHEMA: &[ParamSpec] = &[
    // Momentum
    int("rsi_period", 8.0, 16.0, 12.0),
    int("rsi_sma_period", 10.0, 18.0, 14.0),
    float("rsi_oversold", 20.0, 40.0, 28.0),
    float("rsi_overbought", 60.0, 80.0, 68.0),
    float("rsi_volatility_threshold", 1.0, 10.0, 5.0),
    // Bands
    int("bb_period", 16.0, 24.0, 20.0),
    stepped("bb_std", 1.5, 3.0, 0.5, 2.0),
    stepped("bb_width_threshold", 0.005, 0.03, 0.001, 0.015),
    // Trend
    int("adx_period", 10.0, 25.0, 14.0),
    float("adx_threshold", 18.0, 50.0, 22.0),
    int("sma_trend_period", 10.0, 60.0, 14.0),
    int("trend_quorum", 1.0, 4.0, 2.0),
    int("volume_period", 10.0, 30.0, 20.0),
    stepped("volume_spike_factor", 1.3, 1.8, 0.1, 1.5),
    int("cmo_period", 10.0, 25.0, 14.0),
    float("cmo_threshold", 20.0, 50.0, 40.0),
    int("tema_fast_period", 5.0, 20.0, 10.0),
    int("tema_slow_period", 50.0, 120.0, 80.0),
    int("htf_fast_period", 10.0, 30.0, 20.0),
    int("htf_slow_period", 50.0, 100.0, 70.0),
    // Risk
    int("atr_period", 10.0, 25.0, 14.0),
    stepped("atr_entry_multiplier", 0.0, 2.0, 0.1, 0.0),
    stepped("stop_loss_atr_multiplier", 1.5, 6.0, 0.5, 2.0),
    stepped("take_profit_atr_multiplier", 1.5, 5.0, 0.5, 3.0),
    float("risk_per_trade", 0.005, 0.05, 0.01),
    float("min_trading_capital", 0.0, 1000.0, 10.0),
    float("max_notional_fraction", 0.05, 5.0, 1.0),
    float("min_qty", 1e-6, 1000.0, 0.001),
    int("qty_precision", 0.0, 8.0, 6.0),
    float("min_stop_fraction", 0.001, 0.02, 0.005),
    float("max_stop_fraction", 0.02, 0.2, 0.10),
    float("atr_fallback_fraction", 0.001, 0.05, 0.01),
];

/// Validated numeric configuration of a strategy session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyParams {
    pub rsi_period: usize,
    pub rsi_sma_period: usize,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    /// Max |RSI - previous RSI| still counted as "quiet" by the All combinator
    pub rsi_volatility_threshold: f64,

    pub bb_period: usize,
    pub bb_std: f64,
    pub bb_width_threshold: f64,

    pub adx_period: usize,
    pub adx_threshold: f64,
    pub sma_trend_period: usize,
    /// Minimum number of agreeing trend checks
    pub trend_quorum: usize,
    pub volume_period: usize,
    pub volume_spike_factor: f64,
    pub cmo_period: usize,
    pub cmo_threshold: f64,
    /// TEMA periods on the session's own candles
    pub tema_fast_period: usize,
    pub tema_slow_period: usize,
    /// TEMA periods on the higher timeframe
    pub htf_fast_period: usize,
    pub htf_slow_period: usize,

    pub atr_period: usize,
    /// Limit entry offset from close, in ATRs (0 = enter at close)
    pub atr_entry_multiplier: f64,
    pub stop_loss_atr_multiplier: f64,
    pub take_profit_atr_multiplier: f64,
    /// Fraction of available capital risked per trade
    pub risk_per_trade: f64,
    pub min_trading_capital: f64,
    /// Cap on position notional as a fraction of available capital
    pub max_notional_fraction: f64,
    pub min_qty: f64,
    /// Decimal places the quantity is floored to
    pub qty_precision: usize,
    pub min_stop_fraction: f64,
    pub max_stop_fraction: f64,
    /// ATR substitute as a fraction of price when ATR is undefined
    pub atr_fallback_fraction: f64,
}

impl Default for StrategyParams {
    fn default() -> Self {
        Self {
            rsi_period: 12,
            rsi_sma_period: 14,
            rsi_oversold: 28.0,
            rsi_overbought: 68.0,
            rsi_volatility_threshold: 5.0,
            bb_period: 20,
            bb_std: 2.0,
            bb_width_threshold: 0.015,
            adx_period: 14,
            adx_threshold: 22.0,
            sma_trend_period: 14,
            trend_quorum: 2,
            volume_period: 20,
            volume_spike_factor: 1.5,
            cmo_period: 14,
            cmo_threshold: 40.0,
            tema_fast_period: 10,
            tema_slow_period: 80,
            htf_fast_period: 20,
            htf_slow_period: 70,
            atr_period: 14,
            atr_entry_multiplier: 0.0,
            stop_loss_atr_multiplier: 2.0,
            take_profit_atr_multiplier: 3.0,
            risk_per_trade: 0.01,
            min_trading_capital: 10.0,
            max_notional_fraction: 1.0,
            min_qty: 0.001,
            qty_precision: 6,
            min_stop_fraction: 0.005,
            max_stop_fraction: 0.10,
            atr_fallback_fraction: 0.01,
        }
    }
}

impl StrategyParams {
    /// Declared hyperparameter list
    pub fn schema() -> &'static [ParamSpec] {
        SCHEMA
    }

    /// Schema defaults as a complete mapping
    pub fn default_hyperparameters() -> Hyperparameters {
        SCHEMA
            .iter()
            .map(|spec| {
                let value = match spec.kind {
                    ParamType::Int => serde_json::json!(spec.default as i64),
                    ParamType::Float => serde_json::json!(spec.default),
                };
                (spec.name.to_string(), value)
            })
            .collect()
    }

    /// Overlay `overrides` on the declared defaults, then validate strictly
    pub fn resolve(overrides: &Hyperparameters) -> Result<Self, ConfigError> {
        let mut merged = Self::default_hyperparameters();
        merged.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self::from_hyperparameters(&merged)
    }

    /// Build from a complete mapping. Unknown or missing keys, wrong types and
    /// out-of-range values are all rejected.
    pub fn from_hyperparameters(values: &Hyperparameters) -> Result<Self, ConfigError> {
        if let Some(unknown) = values
            .keys()
            .find(|k| !SCHEMA.iter().any(|spec| spec.name == k.as_str()))
        {
            return Err(ConfigError::UnknownParameter(unknown.clone()));
        }

        let mut checked: HashMap<&'static str, f64> = HashMap::with_capacity(SCHEMA.len());
        for spec in SCHEMA {
            let raw = values
                .get(spec.name)
                .ok_or_else(|| ConfigError::MissingParameter(spec.name.to_string()))?;
            checked.insert(spec.name, check_value(spec, raw)?);
        }

        let f = |name: &str| -> Result<f64, ConfigError> {
            checked
                .get(name)
                .copied()
                .ok_or_else(|| ConfigError::MissingParameter(name.to_string()))
        };
        // Int values were checked integral and non-negative
        let n = |name: &str| -> Result<usize, ConfigError> { f(name).map(|v| v as usize) };

        let params = Self {
            rsi_period: n("rsi_period")?,
            rsi_sma_period: n("rsi_sma_period")?,
            rsi_oversold: f("rsi_oversold")?,
            rsi_overbought: f("rsi_overbought")?,
            rsi_volatility_threshold: f("rsi_volatility_threshold")?,
            bb_period: n("bb_period")?,
            bb_std: f("bb_std")?,
            bb_width_threshold: f("bb_width_threshold")?,
            adx_period: n("adx_period")?,
            adx_threshold: f("adx_threshold")?,
            sma_trend_period: n("sma_trend_period")?,
            trend_quorum: n("trend_quorum")?,
            volume_period: n("volume_period")?,
            volume_spike_factor: f("volume_spike_factor")?,
            cmo_period: n("cmo_period")?,
            cmo_threshold: f("cmo_threshold")?,
            tema_fast_period: n("tema_fast_period")?,
            tema_slow_period: n("tema_slow_period")?,
            htf_fast_period: n("htf_fast_period")?,
            htf_slow_period: n("htf_slow_period")?,
            atr_period: n("atr_period")?,
            atr_entry_multiplier: f("atr_entry_multiplier")?,
            stop_loss_atr_multiplier: f("stop_loss_atr_multiplier")?,
            take_profit_atr_multiplier: f("take_profit_atr_multiplier")?,
            risk_per_trade: f("risk_per_trade")?,
            min_trading_capital: f("min_trading_capital")?,
            max_notional_fraction: f("max_notional_fraction")?,
            min_qty: f("min_qty")?,
            qty_precision: n("qty_precision")?,
            min_stop_fraction: f("min_stop_fraction")?,
            max_stop_fraction: f("max_stop_fraction")?,
            atr_fallback_fraction: f("atr_fallback_fraction")?,
        };

        params.check_consistency()?;
        Ok(params)
    }

    /// Current values as a complete mapping (round-trips through
    /// [`StrategyParams::from_hyperparameters`])
    pub fn to_hyperparameters(&self) -> Hyperparameters {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map.into_iter().collect(),
            _ => Hyperparameters::new(),
        }
    }

    fn check_consistency(&self) -> Result<(), ConfigError> {
        if self.rsi_oversold >= self.rsi_overbought {
            return Err(ConfigError::Inconsistent(format!(
                "rsi_oversold ({}) must be below rsi_overbought ({})",
                self.rsi_oversold, self.rsi_overbought
            )));
        }
        if self.min_stop_fraction >= self.max_stop_fraction {
            return Err(ConfigError::Inconsistent(format!(
                "min_stop_fraction ({}) must be below max_stop_fraction ({})",
                self.min_stop_fraction, self.max_stop_fraction
            )));
        }
        if self.tema_fast_period >= self.tema_slow_period {
            return Err(ConfigError::Inconsistent(format!(
                "tema_fast_period ({}) must be below tema_slow_period ({})",
                self.tema_fast_period, self.tema_slow_period
            )));
        }
        if self.htf_fast_period >= self.htf_slow_period {
            return Err(ConfigError::Inconsistent(format!(
                "htf_fast_period ({}) must be below htf_slow_period ({})",
                self.htf_fast_period, self.htf_slow_period
            )));
        }
        Ok(())
    }
}

fn check_value(spec: &ParamSpec, raw: &serde_json::Value) -> Result<f64, ConfigError> {
    let expected = match spec.kind {
        ParamType::Int => "integer",
        ParamType::Float => "number",
    };
    let wrong_type = || ConfigError::WrongType {
        name: spec.name.to_string(),
        expected,
        got: raw.to_string(),
    };

    let value = raw.as_f64().filter(|v| v.is_finite()).ok_or_else(wrong_type)?;
    if spec.kind == ParamType::Int && value.fract() != 0.0 {
        return Err(wrong_type());
    }

    if value < spec.min || value > spec.max {
        return Err(ConfigError::OutOfRange {
            name: spec.name.to_string(),
            value,
            min: spec.min,
            max: spec.max,
        });
    }

    Ok(value)
}

// =============================================================================
// Symbol Presets
// =============================================================================

/// Per-symbol parameter presets: symbol -> base64(JSON object)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PresetBook(HashMap<String, String>);

impl PresetBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `values` for `symbol` in the encoded form
    pub fn insert(&mut self, symbol: &Symbol, values: &Hyperparameters) {
        self.0.insert(symbol.to_string(), Self::encode(values));
    }

    pub fn encode(values: &Hyperparameters) -> String {
        // A HashMap<String, Value> always serializes
        let json = serde_json::to_vec(values).unwrap_or_default();
        STANDARD.encode(json)
    }

    /// Decoded overrides for `symbol`. Absent or empty entries yield an empty
    /// mapping (defaults apply).
    pub fn overrides_for(&self, symbol: &Symbol) -> Result<Hyperparameters, ConfigError> {
        let blob = match self.0.get(symbol.as_str()) {
            Some(blob) if !blob.trim().is_empty() => blob.trim(),
            _ => return Ok(Hyperparameters::new()),
        };

        let decode_error = |reason: String| ConfigError::PresetDecode {
            symbol: symbol.to_string(),
            reason,
        };

        let bytes = STANDARD
            .decode(blob)
            .map_err(|e| decode_error(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| decode_error(e.to_string()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_match_schema() {
        let resolved = StrategyParams::resolve(&Hyperparameters::new()).unwrap();
        assert_eq!(resolved, StrategyParams::default());
    }

    #[test]
    fn test_schema_defaults_within_range() {
        for spec in SCHEMA {
            assert!(
                spec.default >= spec.min && spec.default <= spec.max,
                "{} default out of range",
                spec.name
            );
        }
    }

    #[test]
    fn test_resolve_applies_overrides() {
        let overrides: Hyperparameters =
            [("adx_threshold".to_string(), json!(30.0))].into_iter().collect();
        let params = StrategyParams::resolve(&overrides).unwrap();
        assert_eq!(params.adx_threshold, 30.0);
        assert_eq!(params.rsi_period, 12);
    }

    #[test]
    fn test_unknown_parameter_rejected() {
        let overrides: Hyperparameters =
            [("rsi_perod".to_string(), json!(12))].into_iter().collect();
        assert_eq!(
            StrategyParams::resolve(&overrides).unwrap_err(),
            ConfigError::UnknownParameter("rsi_perod".to_string())
        );
    }

    #[test]
    fn test_missing_parameter_rejected() {
        let mut values = StrategyParams::default_hyperparameters();
        values.remove("bb_std");
        assert_eq!(
            StrategyParams::from_hyperparameters(&values).unwrap_err(),
            ConfigError::MissingParameter("bb_std".to_string())
        );
    }

    #[test]
    fn test_wrong_type_rejected() {
        let non_integer: Hyperparameters =
            [("rsi_period".to_string(), json!(12.5))].into_iter().collect();
        assert!(matches!(
            StrategyParams::resolve(&non_integer),
            Err(ConfigError::WrongType { expected: "integer", .. })
        ));

        let text: Hyperparameters =
            [("bb_std".to_string(), json!("2"))].into_iter().collect();
        assert!(matches!(
            StrategyParams::resolve(&text),
            Err(ConfigError::WrongType { expected: "number", .. })
        ));
    }

    #[test]
    fn test_out_of_range_rejected() {
        let overrides: Hyperparameters =
            [("adx_threshold".to_string(), json!(5.0))].into_iter().collect();
        assert!(matches!(
            StrategyParams::resolve(&overrides),
            Err(ConfigError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_inconsistent_thresholds_rejected() {
        let overrides: Hyperparameters = [
            ("min_stop_fraction".to_string(), json!(0.02)),
            ("max_stop_fraction".to_string(), json!(0.02)),
        ]
        .into_iter()
        .collect();
        assert!(matches!(
            StrategyParams::resolve(&overrides),
            Err(ConfigError::Inconsistent(_))
        ));
    }

    #[test]
    fn test_tema_periods_resolved_and_ordered() {
        let overrides: Hyperparameters = [
            ("tema_fast_period".to_string(), json!(5)),
            ("tema_slow_period".to_string(), json!(99)),
        ]
        .into_iter()
        .collect();
        let params = StrategyParams::resolve(&overrides).unwrap();
        assert_eq!((params.tema_fast_period, params.tema_slow_period), (5, 99));

        let too_long: Hyperparameters =
            [("tema_slow_period".to_string(), json!(150))].into_iter().collect();
        assert!(matches!(
            StrategyParams::resolve(&too_long),
            Err(ConfigError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_params_round_trip_through_mapping() {
        let params = StrategyParams {
            adx_threshold: 40.0,
            qty_precision: 3,
            ..StrategyParams::default()
        };
        let back = StrategyParams::from_hyperparameters(&params.to_hyperparameters()).unwrap();
        assert_eq!(back, params);
    }

    #[test]
    fn test_preset_book_decoding() {
        let symbol = Symbol::new("BTC-USDT");
        let mut book = PresetBook::new();
        assert!(book.overrides_for(&symbol).unwrap().is_empty());

        let values: Hyperparameters =
            [("cmo_threshold".to_string(), json!(45.0))].into_iter().collect();
        book.insert(&symbol, &values);
        assert_eq!(book.overrides_for(&symbol).unwrap(), values);

        let broken: PresetBook =
            serde_json::from_value(json!({ "BTC-USDT": "not base64!!" })).unwrap();
        assert!(matches!(
            broken.overrides_for(&symbol),
            Err(ConfigError::PresetDecode { .. })
        ));

        let empty: PresetBook = serde_json::from_value(json!({ "BTC-USDT": "" })).unwrap();
        assert!(empty.overrides_for(&symbol).unwrap().is_empty());
    }
}

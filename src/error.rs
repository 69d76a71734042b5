//! Error taxonomy
//!
//! `SignalError` covers conditions detected while evaluating a tick. None of
//! them escape the session: each is resolved by the component that sees it
//! (undefined snapshot field, epsilon substitution, failed checklist item,
//! zero quantity). `ConfigError` is raised only while building a session.

use thiserror::Error;

/// Non-fatal evaluation conditions
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SignalError {
    #[error("{indicator}: need {required} candles, have {available}")]
    InsufficientData {
        indicator: &'static str,
        required: usize,
        available: usize,
    },

    #[error("{indicator}: denominator {denominator} too close to zero")]
    DegenerateIndicator {
        indicator: &'static str,
        denominator: f64,
    },

    #[error("auxiliary {timeframe} data unavailable")]
    UnavailableAuxiliaryData { timeframe: String },

    #[error("invalid sizing: {0}")]
    InvalidSizing(String),

    #[error("{0} needs high/low/close candles, not a bare value series")]
    RequiresOhlc(&'static str),
}

/// Configuration errors, raised at session construction
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("unknown hyperparameter '{0}'")]
    UnknownParameter(String),

    #[error("missing hyperparameter '{0}'")]
    MissingParameter(String),

    #[error("hyperparameter '{name}' expects {expected}, got {got}")]
    WrongType {
        name: String,
        expected: &'static str,
        got: String,
    },

    #[error("hyperparameter '{name}' = {value} outside [{min}, {max}]")]
    OutOfRange {
        name: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("inconsistent hyperparameters: {0}")]
    Inconsistent(String),

    #[error("preset for {symbol} could not be decoded: {reason}")]
    PresetDecode { symbol: String, reason: String },
}

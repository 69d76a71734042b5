//! Configuration management
//!
//! Handles loading and parsing of JSON configuration files. A file carries
//! the session identity, the variant policy, partial hyperparameter
//! overrides, per-symbol presets and the replay settings. Every section but
//! `session` is optional.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::params::{Hyperparameters, PresetBook};
use crate::policy::StrategyPolicy;
use crate::replay::{ReplaySettings, DEFAULT_LOOKBACK};
use crate::session::{SessionConfig, StrategySession};
use crate::{CandleLayout, Symbol};

/// Environment variable overriding `replay.data_dir`
pub const DATA_DIR_ENV: &str = "SIGNAL_ENGINE_DATA_DIR";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub session: SessionSection,

    #[serde(default)]
    pub policy: StrategyPolicy,

    /// Partial overrides on top of the declared defaults
    #[serde(default)]
    pub hyperparameters: Hyperparameters,

    /// symbol -> base64(JSON) parameter presets, applied after `hyperparameters`
    #[serde(default)]
    pub presets: PresetBook,

    #[serde(default)]
    pub replay: ReplayConfig,
}

/// Where sessions trade
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSection {
    pub exchange: String,
    pub timeframe: String,
    /// Default symbol when `replay.symbols` is empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
}

/// Replay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default)]
    pub symbols: Vec<String>,
    /// Starting balance, in the same currency as the price data
    #[serde(default = "default_initial_capital")]
    pub initial_capital: f64,
    /// Column order of the CSV files
    #[serde(default)]
    pub layout: CandleLayout,
    #[serde(default = "default_lookback")]
    pub lookback: usize,
}

fn default_data_dir() -> String {
    "data".to_string()
}
fn default_initial_capital() -> f64 {
    10_000.0
}
fn default_lookback() -> usize {
    DEFAULT_LOOKBACK
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            symbols: Vec::new(),
            initial_capital: default_initial_capital(),
            layout: CandleLayout::default(),
            lookback: default_lookback(),
        }
    }
}

impl Config {
    /// Load configuration from JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: Config =
            serde_json::from_str(&contents).context("Failed to parse config JSON")?;

        if let Ok(data_dir) = std::env::var(DATA_DIR_ENV) {
            config.replay.data_dir = data_dir;
        }

        Ok(config)
    }

    /// Symbols to replay: `replay.symbols`, else the session symbol
    pub fn symbols(&self) -> Vec<Symbol> {
        if self.replay.symbols.is_empty() {
            self.session.symbol.iter().map(Symbol::new).collect()
        } else {
            self.replay.symbols.iter().map(Symbol::new).collect()
        }
    }

    pub fn session_config(&self, symbol: &Symbol) -> SessionConfig {
        SessionConfig {
            exchange: self.session.exchange.clone(),
            symbol: symbol.clone(),
            timeframe: self.session.timeframe.clone(),
        }
    }

    /// Build a validated session for `symbol`
    pub fn build_session(&self, symbol: &Symbol) -> Result<StrategySession> {
        StrategySession::resolve(
            self.session_config(symbol),
            self.policy.clone(),
            &self.hyperparameters,
            &self.presets,
        )
        .with_context(|| format!("Invalid strategy configuration for {symbol}"))
    }

    /// Auxiliary timeframes the policy needs loaded
    pub fn aux_timeframes(&self) -> Vec<String> {
        self.policy.higher_timeframe.iter().cloned().collect()
    }

    pub fn replay_settings(&self) -> ReplaySettings {
        ReplaySettings {
            initial_capital: self.replay.initial_capital,
            lookback: self.replay.lookback,
        }
    }
}

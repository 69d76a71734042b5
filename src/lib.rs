//! Trend Signal Engine
//!
//! Signal evaluation and risk sizing shared by a family of
//! Bollinger/RSI/ADX/ATR/TEMA/CMO strategies: market-state classification,
//! entry/exit decisions, volatility-adjusted position sizing and
//! stop-loss/take-profit levels, driven once per candle by an external host.

pub mod config;
pub mod data;
pub mod error;
pub mod indicators;
pub mod market_state;
pub mod multi_timeframe;
pub mod params;
pub mod policy;
pub mod replay;
pub mod risk;
pub mod session;
pub mod signals;
pub mod snapshot;
pub mod types;

pub use config::Config;
pub use error::{ConfigError, SignalError};
pub use market_state::{MarketState, MarketStateClassifier, Trend};
pub use params::{Hyperparameters, PresetBook, StrategyParams};
pub use policy::StrategyPolicy;
pub use session::{Host, MarketView, OrderSink, SessionConfig, SessionState, StrategySession};
pub use snapshot::IndicatorSnapshot;
pub use types::*;

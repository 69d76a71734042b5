//! Strategy session: per-symbol orchestration of one evaluation per candle
//!
//! The session owns only its configuration and an explicit lifecycle state
//! (`Idle -> EntryPending -> PositionOpen -> Idle`). Candles, balances and the
//! position itself belong to the host, which is reached through the
//! [`MarketView`] and [`OrderSink`] traits. Decisions leave the session as
//! fire-and-forget [`OrderIntent`]s.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::error::{ConfigError, SignalError};
use crate::market_state::{MarketState, MarketStateClassifier};
use crate::params::{Hyperparameters, PresetBook, StrategyParams};
use crate::policy::{StopMode, StrategyPolicy};
use crate::risk::{ProtectiveLevels, RiskManager};
use crate::signals::{ExitDecision, SignalGenerator};
use crate::snapshot::IndicatorSnapshot;
use crate::{Candle, ExitReason, Fill, OrderIntent, PositionView, Side, Signal, Symbol};

// =============================================================================
// Host Interface
// =============================================================================

/// Read-only access to host-owned market and account state
pub trait MarketView {
    /// Candles of the session's own series, oldest first, ending at the
    /// candle being evaluated
    fn current_window(&self, symbol: &Symbol, timeframe: &str) -> &[Candle];

    /// Candles of another series (e.g. a higher timeframe), if the host has it
    fn candles(&self, exchange: &str, symbol: &Symbol, timeframe: &str) -> Option<&[Candle]>;

    /// Capital available for a new position
    fn available_capital(&self) -> f64;

    fn balance(&self) -> f64;

    /// Open position for `symbol`, if any
    fn position(&self, symbol: &Symbol) -> Option<PositionView>;
}

/// Destination for order intents
pub trait OrderSink {
    fn submit(&mut self, intent: OrderIntent);
}

/// A full host: market view plus order sink
pub trait Host: MarketView + OrderSink {}

impl<T: MarketView + OrderSink> Host for T {}

// =============================================================================
// Session Types
// =============================================================================

/// Where the session trades
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub exchange: String,
    pub symbol: Symbol,
    pub timeframe: String,
}

/// Lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub enum SessionState {
    #[default]
    Idle,
    /// Entry submitted, no fill reported yet
    EntryPending {
        side: Side,
        quantity: f64,
        limit_price: f64,
    },
    PositionOpen {
        side: Side,
        entry_price: f64,
        /// ATR when the position opened; drives the loss limit
        entry_atr: Option<f64>,
        quantity: f64,
    },
}

/// What the evaluation wants to happen on this candle
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Decision {
    /// Nothing to do
    Stand,
    Enter {
        side: Side,
        quantity: f64,
        limit_price: f64,
    },
    /// Keep the position; `Some` refreshes the protective levels
    Hold { levels: Option<ProtectiveLevels> },
    Exit(ExitReason),
}

/// Result of a pure evaluation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub snapshot: IndicatorSnapshot,
    pub market: MarketState,
    pub signal: Signal,
    pub decision: Decision,
}

// =============================================================================
// Strategy Session
// =============================================================================

/// One symbol's strategy instance
#[derive(Debug, Clone)]
pub struct StrategySession {
    config: SessionConfig,
    params: StrategyParams,
    policy: StrategyPolicy,
    risk: RiskManager,
    state: SessionState,
    last_decision: Option<Decision>,
}

impl StrategySession {
    pub fn new(
        config: SessionConfig,
        params: StrategyParams,
        policy: StrategyPolicy,
    ) -> Result<Self, ConfigError> {
        policy.validate(&params)?;
        let risk = RiskManager::from_params(&params);

        info!(
            symbol = %config.symbol,
            exchange = %config.exchange,
            timeframe = %config.timeframe,
            higher_timeframe = ?policy.higher_timeframe,
            "Strategy session created"
        );

        Ok(Self {
            config,
            params,
            policy,
            risk,
            state: SessionState::Idle,
            last_decision: None,
        })
    }

    /// Resolve parameters as defaults <- `overrides` <- symbol preset, then
    /// build the session
    pub fn resolve(
        config: SessionConfig,
        policy: StrategyPolicy,
        overrides: &Hyperparameters,
        presets: &PresetBook,
    ) -> Result<Self, ConfigError> {
        let mut merged = overrides.clone();
        merged.extend(presets.overrides_for(&config.symbol)?);
        let params = StrategyParams::resolve(&merged)?;
        Self::new(config, params, policy)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn params(&self) -> &StrategyParams {
        &self.params
    }

    pub fn policy(&self) -> &StrategyPolicy {
        &self.policy
    }

    pub fn risk(&self) -> &RiskManager {
        &self.risk
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Decision taken by the most recent [`Self::on_candle`]
    pub fn last_decision(&self) -> Option<Decision> {
        self.last_decision
    }

    /// Indicator snapshot for the host's current window
    pub fn snapshot<M: MarketView + ?Sized>(&self, market: &M) -> IndicatorSnapshot {
        let cfg = &self.config;
        let window = market.current_window(&cfg.symbol, &cfg.timeframe);

        let aux = self.policy.higher_timeframe.as_deref().and_then(|tf| {
            let candles = market.candles(&cfg.exchange, &cfg.symbol, tf);
            if candles.is_none() {
                let error = SignalError::UnavailableAuxiliaryData {
                    timeframe: tf.to_string(),
                };
                trace!(symbol = %cfg.symbol, %error, "higher timeframe skipped");
            }
            candles
        });

        IndicatorSnapshot::compute(window, aux, &self.params)
    }

    /// Pure evaluation of the current candle against the current state
    pub fn evaluate<M: MarketView + ?Sized>(&self, market: &M) -> Evaluation {
        let snapshot = self.snapshot(market);
        let classifier = MarketStateClassifier::new(&self.params, &self.policy);
        let signals = SignalGenerator::new(&self.params, &self.policy);
        let state = classifier.classify(&snapshot);

        let (signal, decision) = match self.state {
            SessionState::PositionOpen {
                side,
                entry_price,
                entry_atr,
                quantity,
            } => {
                let position = market.position(&self.config.symbol).unwrap_or_else(|| {
                    PositionView::marked(
                        side,
                        quantity,
                        entry_price,
                        snapshot.close.unwrap_or(entry_price),
                    )
                });

                let decision = match signals.exit_decision(&snapshot, &position, entry_atr, &self.risk) {
                    ExitDecision::Exit(reason) => Decision::Exit(reason),
                    ExitDecision::Hold => Decision::Hold {
                        levels: match self.policy.stop_mode {
                            StopMode::Trailing => Some(self.risk.protective_levels(
                                side,
                                entry_price,
                                snapshot.atr,
                            )),
                            StopMode::FixedAtEntry => None,
                        },
                    },
                };
                (Signal::Flat, decision)
            }
            SessionState::EntryPending { .. } if !self.policy.cancel_unfilled_entries => {
                (Signal::Flat, Decision::Stand)
            }
            SessionState::Idle | SessionState::EntryPending { .. } => {
                let signal = signals.entry_signal(&snapshot, &state);
                (signal, self.entry_decision(signal, &snapshot, market))
            }
        };

        debug!(
            symbol = %self.config.symbol,
            close = ?snapshot.close,
            adx = ?snapshot.adx,
            bb_width = ?snapshot.bb_width,
            rsi = ?snapshot.rsi,
            rsi_sma = ?snapshot.rsi_sma,
            uptrend = state.uptrend,
            downtrend = state.downtrend,
            sideways = state.is_sideways,
            ?signal,
            "Evaluated candle"
        );

        Evaluation {
            snapshot,
            market: state,
            signal,
            decision,
        }
    }

    fn entry_decision<M: MarketView + ?Sized>(
        &self,
        signal: Signal,
        snapshot: &IndicatorSnapshot,
        market: &M,
    ) -> Decision {
        let side = match signal {
            Signal::Long => Side::Buy,
            Signal::Short => Side::Sell,
            Signal::Flat => return Decision::Stand,
        };
        let Some(close) = snapshot.close else {
            return Decision::Stand;
        };

        let stop_distance = self.risk.stop_distance(snapshot.atr, close);
        let quantity = self
            .risk
            .size(market.available_capital(), stop_distance, close);
        if quantity <= 0.0 {
            debug!(symbol = %self.config.symbol, ?side, "Entry signal without tradable size");
            return Decision::Stand;
        }

        let limit_price = self.risk.entry_limit_price(side, close, snapshot.atr);
        Decision::Enter {
            side,
            quantity,
            limit_price,
        }
    }

    /// Evaluate the latest candle, advance the lifecycle state and return the
    /// intents for the host
    pub fn on_candle<M: MarketView + ?Sized>(&mut self, market: &M) -> Vec<OrderIntent> {
        let mut intents = Vec::new();

        if let SessionState::PositionOpen { .. } = self.state {
            if market.position(&self.config.symbol).is_none() {
                warn!(symbol = %self.config.symbol, "Host reports no position; resetting session");
                self.on_close_position();
            }
        }

        if let SessionState::EntryPending { side, limit_price, .. } = self.state {
            if self.policy.cancel_unfilled_entries {
                debug!(symbol = %self.config.symbol, ?side, limit_price, "Cancelling unfilled entry");
                intents.push(OrderIntent::CancelEntry);
                self.state = SessionState::Idle;
            }
        }

        let evaluation = self.evaluate(market);
        self.last_decision = Some(evaluation.decision);
        match evaluation.decision {
            Decision::Stand => {}
            Decision::Enter {
                side,
                quantity,
                limit_price,
            } => {
                info!(
                    symbol = %self.config.symbol,
                    ?side,
                    quantity,
                    limit_price,
                    atr = ?evaluation.snapshot.atr,
                    "Submitting entry"
                );
                intents.push(OrderIntent::SubmitEntry {
                    side,
                    quantity,
                    limit_price,
                });
                self.state = SessionState::EntryPending {
                    side,
                    quantity,
                    limit_price,
                };
            }
            Decision::Hold { levels } => {
                if let (Some(levels), SessionState::PositionOpen { quantity, .. }) =
                    (levels, self.state)
                {
                    intents.extend(protective_intents(quantity, levels));
                }
            }
            Decision::Exit(reason) => {
                info!(
                    symbol = %self.config.symbol,
                    ?reason,
                    close = ?evaluation.snapshot.close,
                    "Liquidating position"
                );
                intents.push(OrderIntent::Liquidate);
            }
        }

        intents
    }

    /// Read the host, evaluate and dispatch the resulting intents to it
    pub fn step<H: Host + ?Sized>(&mut self, host: &mut H) -> usize {
        let intents = self.on_candle(&*host);
        let count = intents.len();
        for intent in intents {
            host.submit(intent);
        }
        count
    }

    /// Entry fill reported by the host: record the position and return the
    /// initial protective levels
    pub fn on_open_position<M: MarketView + ?Sized>(
        &mut self,
        fill: &Fill,
        market: &M,
    ) -> Vec<OrderIntent> {
        let entry_atr = self.snapshot(market).atr;
        let levels = self
            .risk
            .protective_levels(fill.side, fill.price, entry_atr);

        info!(
            symbol = %self.config.symbol,
            side = ?fill.side,
            price = fill.price,
            quantity = fill.quantity,
            stop_loss = levels.stop_loss,
            take_profit = levels.take_profit,
            "Position opened"
        );

        self.state = SessionState::PositionOpen {
            side: fill.side,
            entry_price: fill.price,
            entry_atr,
            quantity: fill.quantity,
        };

        protective_intents(fill.quantity, levels).to_vec()
    }

    /// Position closed by the host: entry data and levels are dropped
    pub fn on_close_position(&mut self) {
        if self.state != SessionState::Idle {
            info!(symbol = %self.config.symbol, "Position closed");
        }
        self.state = SessionState::Idle;
    }
}

fn protective_intents(quantity: f64, levels: ProtectiveLevels) -> [OrderIntent; 2] {
    [
        OrderIntent::SetStopLoss {
            quantity,
            price: levels.stop_loss,
        },
        OrderIntent::SetTakeProfit {
            quantity,
            price: levels.take_profit,
        },
    ]
}

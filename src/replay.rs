//! Historical replay host
//!
//! Drives a [`StrategySession`] over stored candles the way a live host
//! would: one `step` per closed candle, fill notifications via
//! `on_open_position`, closes via `on_close_position`. Order handling is
//! deliberately minimal:
//!
//! - a pending entry fills on the next candle that trades through its limit
//!   price (at the limit, or at the open when the candle gaps past it)
//! - stop-loss and take-profit are checked against each later candle's range,
//!   stop first
//! - `Liquidate` closes at the current candle's close
//!
//! There is no slippage, fee, partial-fill or order-book model.

use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::multi_timeframe::{timeframe_duration, MultiTimeframeData};
use crate::session::{Decision, MarketView, OrderSink, StrategySession};
use crate::{Candle, ExitReason, Fill, OrderIntent, PositionView, Side, Symbol, Trade};

/// Default number of candles handed to the session per evaluation
pub const DEFAULT_LOOKBACK: usize = 300;

/// Replay settings
#[derive(Debug, Clone, PartialEq)]
pub struct ReplaySettings {
    pub initial_capital: f64,
    /// Maximum window length passed to the session (per timeframe)
    pub lookback: usize,
}

impl Default for ReplaySettings {
    fn default() -> Self {
        Self {
            initial_capital: 10_000.0,
            lookback: DEFAULT_LOOKBACK,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingEntry {
    side: Side,
    quantity: f64,
    limit_price: f64,
}

impl PendingEntry {
    /// Fill price if `candle` trades through the limit
    fn fill_price(&self, candle: &Candle) -> Option<f64> {
        match self.side {
            Side::Buy if candle.low <= self.limit_price => Some(candle.open.min(self.limit_price)),
            Side::Sell if candle.high >= self.limit_price => Some(candle.open.max(self.limit_price)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct OpenPosition {
    side: Side,
    quantity: f64,
    entry_price: f64,
    entry_time: DateTime<Utc>,
    entry_index: usize,
    stop_loss: Option<f64>,
    take_profit: Option<f64>,
}

impl OpenPosition {
    /// First protective level touched by `candle`, stop checked first
    fn touched(&self, candle: &Candle) -> Option<(f64, ExitReason)> {
        let stop_hit = self.stop_loss.filter(|&stop| match self.side {
            Side::Buy => candle.low <= stop,
            Side::Sell => candle.high >= stop,
        });
        if let Some(stop) = stop_hit {
            return Some((stop, ExitReason::StopLoss));
        }

        self.take_profit
            .filter(|&target| match self.side {
                Side::Buy => candle.high >= target,
                Side::Sell => candle.low <= target,
            })
            .map(|target| (target, ExitReason::TakeProfit))
    }
}

/// In-process host over one symbol's stored candles
#[derive(Debug)]
pub struct ReplayHost<'a> {
    symbol: Symbol,
    data: &'a MultiTimeframeData,
    lookback: usize,
    cursor: usize,
    balance: f64,
    pending_entry: Option<PendingEntry>,
    position: Option<OpenPosition>,
    liquidate_requested: bool,
    trades: Vec<Trade>,
    entries_submitted: usize,
    entries_cancelled: usize,
}

impl<'a> ReplayHost<'a> {
    pub fn new(symbol: Symbol, data: &'a MultiTimeframeData, settings: &ReplaySettings) -> Self {
        Self {
            symbol,
            data,
            lookback: settings.lookback.max(1),
            cursor: 0,
            balance: settings.initial_capital,
            pending_entry: None,
            position: None,
            liquidate_requested: false,
            trades: Vec::new(),
            entries_submitted: 0,
            entries_cancelled: 0,
        }
    }

    fn current(&self) -> Option<&'a Candle> {
        self.data.primary().get(self.cursor)
    }

    /// Close time of the current primary candle
    fn current_close_time(&self) -> Option<DateTime<Utc>> {
        let candle = self.current()?;
        Some(match timeframe_duration(self.data.primary_timeframe()) {
            Some(span) => candle.datetime + span,
            None => candle.datetime,
        })
    }

    fn open_position(&mut self, entry: PendingEntry, price: f64, candle: &Candle) -> Fill {
        debug!(symbol = %self.symbol, side = ?entry.side, price, "Entry filled");
        self.position = Some(OpenPosition {
            side: entry.side,
            quantity: entry.quantity,
            entry_price: price,
            entry_time: candle.datetime,
            entry_index: self.cursor,
            stop_loss: None,
            take_profit: None,
        });
        Fill {
            side: entry.side,
            price,
            quantity: entry.quantity,
        }
    }

    fn close_position(&mut self, price: f64, reason: ExitReason, time: DateTime<Utc>) {
        let Some(pos) = self.position.take() else {
            return;
        };
        let pnl = pos.side.sign() * (price - pos.entry_price) * pos.quantity;
        self.balance += pnl;

        info!(
            symbol = %self.symbol,
            side = ?pos.side,
            entry = pos.entry_price,
            exit = price,
            pnl,
            ?reason,
            "Position closed"
        );

        self.trades.push(Trade {
            symbol: self.symbol.clone(),
            side: pos.side,
            entry_price: pos.entry_price,
            exit_price: price,
            quantity: pos.quantity,
            entry_time: pos.entry_time,
            exit_time: time,
            pnl,
            exit_reason: reason,
        });
    }
}

impl MarketView for ReplayHost<'_> {
    fn current_window(&self, _symbol: &Symbol, _timeframe: &str) -> &[Candle] {
        let primary = self.data.primary();
        if primary.is_empty() {
            return &[];
        }
        let end = (self.cursor + 1).min(primary.len());
        &primary[end.saturating_sub(self.lookback)..end]
    }

    fn candles(&self, _exchange: &str, _symbol: &Symbol, timeframe: &str) -> Option<&[Candle]> {
        let at = self.current_close_time()?;
        let closed = self.data.closed_by(timeframe, at)?;
        if closed.is_empty() {
            return None;
        }
        Some(&closed[closed.len().saturating_sub(self.lookback)..])
    }

    fn available_capital(&self) -> f64 {
        let committed = self
            .position
            .map_or(0.0, |p| p.quantity * p.entry_price);
        (self.balance - committed).max(0.0)
    }

    fn balance(&self) -> f64 {
        self.balance
    }

    fn position(&self, symbol: &Symbol) -> Option<PositionView> {
        if *symbol != self.symbol {
            return None;
        }
        let pos = self.position?;
        let mark = self.current().map_or(pos.entry_price, |c| c.close);
        Some(PositionView::marked(pos.side, pos.quantity, pos.entry_price, mark))
    }
}

impl OrderSink for ReplayHost<'_> {
    fn submit(&mut self, intent: OrderIntent) {
        match intent {
            OrderIntent::SubmitEntry {
                side,
                quantity,
                limit_price,
            } => {
                self.entries_submitted += 1;
                self.pending_entry = Some(PendingEntry {
                    side,
                    quantity,
                    limit_price,
                });
            }
            OrderIntent::CancelEntry => {
                if self.pending_entry.take().is_some() {
                    self.entries_cancelled += 1;
                }
            }
            OrderIntent::SetStopLoss { price, .. } => {
                if let Some(pos) = self.position.as_mut() {
                    pos.stop_loss = Some(price);
                }
            }
            OrderIntent::SetTakeProfit { price, .. } => {
                if let Some(pos) = self.position.as_mut() {
                    pos.take_profit = Some(price);
                }
            }
            OrderIntent::Liquidate => self.liquidate_requested = true,
        }
    }
}

/// Outcome of one replay
#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub symbol: Symbol,
    pub candles: usize,
    pub initial_capital: f64,
    pub final_balance: f64,
    pub entries_submitted: usize,
    pub entries_cancelled: usize,
    pub trades: Vec<Trade>,
}

impl ReplayReport {
    pub fn total_pnl(&self) -> f64 {
        self.trades.iter().map(|t| t.pnl).sum()
    }

    pub fn return_pct(&self) -> f64 {
        if self.initial_capital <= 0.0 {
            return 0.0;
        }
        (self.final_balance - self.initial_capital) / self.initial_capital * 100.0
    }

    pub fn win_rate(&self) -> f64 {
        if self.trades.is_empty() {
            return 0.0;
        }
        let wins = self.trades.iter().filter(|t| t.pnl > 0.0).count();
        wins as f64 / self.trades.len() as f64 * 100.0
    }

    /// Number of trades per exit reason
    pub fn exits_by_reason(&self) -> HashMap<ExitReason, usize> {
        self.trades.iter().map(|t| t.exit_reason).counts()
    }
}

/// Replay `data` through `session` and collect the closed trades
pub fn run_replay(
    session: &mut StrategySession,
    data: &MultiTimeframeData,
    settings: &ReplaySettings,
) -> ReplayReport {
    let symbol = session.config().symbol.clone();
    let mut host = ReplayHost::new(symbol.clone(), data, settings);
    let primary = data.primary();

    for (i, candle) in primary.iter().enumerate() {
        host.cursor = i;

        if let Some(entry) = host.pending_entry.take() {
            match entry.fill_price(candle) {
                Some(price) => {
                    let fill = host.open_position(entry, price, candle);
                    for intent in session.on_open_position(&fill, &host) {
                        host.submit(intent);
                    }
                }
                None => host.pending_entry = Some(entry),
            }
        }

        let touched = host
            .position
            .filter(|p| p.entry_index < i)
            .and_then(|p| p.touched(candle));
        if let Some((price, reason)) = touched {
            host.close_position(price, reason, candle.datetime);
            session.on_close_position();
        }

        session.step(&mut host);

        if std::mem::take(&mut host.liquidate_requested) {
            let reason = match session.last_decision() {
                Some(Decision::Exit(reason)) => reason,
                _ => ExitReason::Signal,
            };
            host.close_position(candle.close, reason, candle.datetime);
            session.on_close_position();
        }
    }

    if let Some(last) = primary.last() {
        if host.position.is_some() {
            host.close_position(last.close, ExitReason::EndOfData, last.datetime);
            session.on_close_position();
        }
    }

    ReplayReport {
        symbol,
        candles: primary.len(),
        initial_capital: settings.initial_capital,
        final_balance: host.balance,
        entries_submitted: host.entries_submitted,
        entries_cancelled: host.entries_cancelled,
        trades: host.trades,
    }
}

//! Position sizing and protective levels
//!
//! Converts an account-risk budget and a volatility estimate into a trade
//! quantity, and derives stop-loss/take-profit prices from ATR.
//!
//! Position sizing formula:
//! ```text
//! stop_distance = clamp(stop_multiplier * ATR, min_fraction * price, max_fraction * price)
//! quantity      = floor_to_precision(capital * risk_per_trade / stop_distance)
//! quantity      = min(quantity, capital * max_notional_fraction / price)
//! ```
//!
//! When ATR is undefined (short window) or non-positive, a price-fraction
//! estimate stands in so sizing never divides by zero. A quantity of zero
//! means "do not trade" and is not an error.

use serde::{Deserialize, Serialize};

use crate::error::SignalError;
use crate::params::StrategyParams;
use crate::{PositionView, Side};

/// Smallest ATR substitute when ATR is unavailable
const MIN_FALLBACK_ATR: f64 = 0.1;

/// Configuration for RiskManager using builder pattern
#[derive(Debug, Clone, PartialEq)]
pub struct RiskConfig {
    pub risk_per_trade: f64,
    pub min_trading_capital: f64,
    /// Cap on quantity * price as a fraction of available capital
    pub max_notional_fraction: f64,
    pub min_qty: f64,
    pub qty_precision: usize,
    pub stop_loss_atr_multiplier: f64,
    pub take_profit_atr_multiplier: f64,
    pub atr_entry_multiplier: f64,
    pub min_stop_fraction: f64,
    pub max_stop_fraction: f64,
    pub atr_fallback_fraction: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self::from(&StrategyParams::default())
    }
}

impl From<&StrategyParams> for RiskConfig {
    fn from(p: &StrategyParams) -> Self {
        Self {
            risk_per_trade: p.risk_per_trade,
            min_trading_capital: p.min_trading_capital,
            max_notional_fraction: p.max_notional_fraction,
            min_qty: p.min_qty,
            qty_precision: p.qty_precision,
            stop_loss_atr_multiplier: p.stop_loss_atr_multiplier,
            take_profit_atr_multiplier: p.take_profit_atr_multiplier,
            atr_entry_multiplier: p.atr_entry_multiplier,
            min_stop_fraction: p.min_stop_fraction,
            max_stop_fraction: p.max_stop_fraction,
            atr_fallback_fraction: p.atr_fallback_fraction,
        }
    }
}

impl RiskConfig {
    /// Set risk per trade as a fraction (e.g., 0.01 = 1%)
    pub fn with_risk_per_trade(mut self, risk: f64) -> Self {
        self.risk_per_trade = risk;
        self
    }

    /// Set the capital below which no trade is sized
    pub fn with_min_trading_capital(mut self, capital: f64) -> Self {
        self.min_trading_capital = capital;
        self
    }

    /// Set the notional cap as a fraction of available capital
    pub fn with_max_notional_fraction(mut self, fraction: f64) -> Self {
        self.max_notional_fraction = fraction;
        self
    }

    /// Set lot precision and minimum tradable quantity
    pub fn with_lot(mut self, precision: usize, min_qty: f64) -> Self {
        self.qty_precision = precision;
        self.min_qty = min_qty;
        self
    }

    /// Set stop and target ATR multiples
    pub fn with_atr_multipliers(mut self, stop: f64, target: f64) -> Self {
        self.stop_loss_atr_multiplier = stop;
        self.take_profit_atr_multiplier = target;
        self
    }

    /// Set the stop-distance clamp as fractions of price
    pub fn with_stop_bounds(mut self, min_fraction: f64, max_fraction: f64) -> Self {
        self.min_stop_fraction = min_fraction;
        self.max_stop_fraction = max_fraction;
        self
    }

    /// Build the RiskManager
    pub fn build(self) -> RiskManager {
        RiskManager { config: self }
    }
}

/// Stop-loss and take-profit prices for an open position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProtectiveLevels {
    pub stop_loss: f64,
    pub take_profit: f64,
}

impl ProtectiveLevels {
    /// First level touched by a candle's range, stop checked first
    pub fn touched(&self, side: Side, high: f64, low: f64) -> Option<(f64, bool)> {
        match side {
            Side::Buy if low <= self.stop_loss => Some((self.stop_loss, true)),
            Side::Buy if high >= self.take_profit => Some((self.take_profit, false)),
            Side::Sell if high >= self.stop_loss => Some((self.stop_loss, true)),
            Side::Sell if low <= self.take_profit => Some((self.take_profit, false)),
            _ => None,
        }
    }
}

/// Volatility-based position sizer
#[derive(Debug, Clone, PartialEq)]
pub struct RiskManager {
    config: RiskConfig,
}

impl RiskManager {
    pub fn from_params(params: &StrategyParams) -> Self {
        RiskConfig::from(params).build()
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// ATR when defined and positive, otherwise a price-fraction estimate
    pub fn effective_atr(&self, atr: Option<f64>, price: f64) -> f64 {
        match atr {
            Some(a) if a.is_finite() && a > 0.0 => a,
            _ => MIN_FALLBACK_ATR.max(self.config.atr_fallback_fraction * price),
        }
    }

    /// ATR-scaled stop distance clamped to a fraction of price
    pub fn stop_distance(&self, atr: Option<f64>, price: f64) -> f64 {
        if !(price.is_finite() && price > 0.0) {
            return 0.0;
        }

        let raw = self.config.stop_loss_atr_multiplier * self.effective_atr(atr, price);
        raw.clamp(
            self.config.min_stop_fraction * price,
            self.config.max_stop_fraction * price,
        )
    }

    /// Quantity for a risk budget, or the reason no trade can be sized
    pub fn try_size(
        &self,
        available_capital: f64,
        stop_distance: f64,
        price: f64,
    ) -> Result<f64, SignalError> {
        if !(available_capital >= self.config.min_trading_capital) {
            return Err(SignalError::InvalidSizing(format!(
                "available capital {:.2} below minimum {:.2}",
                available_capital, self.config.min_trading_capital
            )));
        }
        if !(stop_distance.is_finite() && stop_distance > 0.0) {
            return Err(SignalError::InvalidSizing(format!(
                "stop distance {stop_distance} must be positive"
            )));
        }
        if !(price.is_finite() && price > 0.0) {
            return Err(SignalError::InvalidSizing(format!(
                "price {price} must be positive"
            )));
        }

        let budget = available_capital * self.config.risk_per_trade;
        let max_qty = available_capital * self.config.max_notional_fraction / price;
        let qty = floor_to_precision(
            (budget / stop_distance).min(max_qty),
            self.config.qty_precision,
        )
        .max(self.config.min_qty);

        if qty - max_qty > 1e-9 {
            return Err(SignalError::InvalidSizing(format!(
                "minimum quantity {} exceeds the notional cap of {:.6}",
                self.config.min_qty, max_qty
            )));
        }
        Ok(qty)
    }

    /// Quantity for a risk budget; 0.0 means do not trade
    pub fn size(&self, available_capital: f64, stop_distance: f64, price: f64) -> f64 {
        match self.try_size(available_capital, stop_distance, price) {
            Ok(qty) => qty,
            Err(e) => {
                tracing::debug!(error = %e, "sizing declined");
                0.0
            }
        }
    }

    /// Stop-loss and take-profit anchored at the entry price
    pub fn protective_levels(&self, side: Side, entry_price: f64, atr: Option<f64>) -> ProtectiveLevels {
        let stop = self.stop_distance(atr, entry_price);
        let target = self.config.take_profit_atr_multiplier * self.effective_atr(atr, entry_price);

        match side {
            Side::Buy => ProtectiveLevels {
                stop_loss: entry_price - stop,
                take_profit: entry_price + target,
            },
            Side::Sell => ProtectiveLevels {
                stop_loss: entry_price + stop,
                take_profit: (entry_price - target).max(0.0),
            },
        }
    }

    /// Limit price for an entry, offset from close by `atr_entry_multiplier` ATRs
    pub fn entry_limit_price(&self, side: Side, close: f64, atr: Option<f64>) -> f64 {
        if self.config.atr_entry_multiplier == 0.0 {
            return close;
        }
        let offset = self.config.atr_entry_multiplier * self.effective_atr(atr, close);
        match side {
            Side::Buy => close - offset,
            Side::Sell => close + offset,
        }
    }

    /// Loss limit in percent of entry price, from the ATR captured at entry
    pub fn loss_limit_pct(&self, entry_price: f64, entry_atr: Option<f64>) -> f64 {
        if entry_price <= 0.0 {
            return 0.0;
        }
        100.0 * self.stop_distance(entry_atr, entry_price) / entry_price
    }

    /// Whether an open position's unrealized loss breaches the entry-ATR stop
    pub fn loss_limit_breached(&self, position: &PositionView, entry_atr: Option<f64>) -> bool {
        let limit = self.loss_limit_pct(position.entry_price, entry_atr);
        limit > 0.0 && position.unrealized_pnl_pct <= -limit
    }
}

/// Floor `value` to `precision` decimal places
pub fn floor_to_precision(value: f64, precision: usize) -> f64 {
    let scale = 10f64.powi(precision as i32);
    // Nudge values like 0.3 * 10 = 2.9999999999999996 back onto the grid
    ((value * scale) + 1e-9).floor() / scale
}

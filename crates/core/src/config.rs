//! Configuration for the monitor and its collaborators.
//!
//! Validation runs once at startup and is the only place a
//! `SentinelError::Configuration` can surface; the monitor loop never exits
//! because of configuration discovered mid-run.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::SentinelError;
use crate::market::Timeframe;

/// Risk and monitoring knobs for one account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Maximum number of simultaneously open positions.
    pub max_concurrent_trades: usize,
    /// Per-trade risk cap as a fraction of balance.
    pub max_trade_pct: Decimal,
    /// Daily realized-loss circuit breaker as a fraction of balance.
    pub max_daily_loss_pct: Decimal,
    /// Trailing band as a fraction of entry price.
    pub max_stop_loss_pct: Decimal,
    /// Request a one-third partial close when break-even triggers.
    pub partial_close_enabled: bool,
    /// Break-even trigger in price ticks, per symbol.
    pub break_even_points: HashMap<String, Decimal>,
    /// Fallback trigger for symbols not listed above.
    pub break_even_default: Decimal,
    /// Monitor polling interval.
    pub poll_interval_secs: u64,
    /// Timeframe tag for the stop engine's candle history, e.g. "M1".
    pub candle_timeframe: String,
    /// Candles fetched per initial-stop computation.
    pub candle_count: usize,
}

impl RiskConfig {
    /// Break-even trigger for a symbol, falling back to the default.
    #[must_use]
    pub fn break_even_trigger(&self, symbol: &str) -> Decimal {
        self.break_even_points
            .get(symbol)
            .copied()
            .unwrap_or(self.break_even_default)
    }

    /// Parsed candle timeframe. Unsupported tags fail here, at startup.
    pub fn timeframe(&self) -> Result<Timeframe, SentinelError> {
        self.candle_timeframe.parse()
    }

    /// Startup validation. Fatal on the first malformed field.
    pub fn validate(&self) -> Result<(), SentinelError> {
        self.timeframe()?;
        if self.poll_interval_secs == 0 {
            return Err(SentinelError::Configuration(
                "poll_interval_secs must be positive".to_string(),
            ));
        }
        if self.max_concurrent_trades == 0 {
            return Err(SentinelError::Configuration(
                "max_concurrent_trades must be positive".to_string(),
            ));
        }
        for (name, value) in [
            ("max_trade_pct", self.max_trade_pct),
            ("max_daily_loss_pct", self.max_daily_loss_pct),
            ("max_stop_loss_pct", self.max_stop_loss_pct),
        ] {
            if value <= Decimal::ZERO || value >= Decimal::ONE {
                return Err(SentinelError::Configuration(format!(
                    "{name} must be a fraction in (0, 1), got {value}"
                )));
            }
        }
        if self.candle_count < MIN_CANDLES {
            return Err(SentinelError::Configuration(format!(
                "candle_count must be at least {}, got {}",
                MIN_CANDLES, self.candle_count
            )));
        }
        Ok(())
    }
}

/// Fewest candles the volatility stop can be computed from.
pub const MIN_CANDLES: usize = 14;

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_concurrent_trades: 5,
            max_trade_pct: Decimal::new(2, 2),       // 0.02
            max_daily_loss_pct: Decimal::new(3, 2),  // 0.03
            max_stop_loss_pct: Decimal::new(1, 2),   // 0.01
            partial_close_enabled: true,
            break_even_points: HashMap::from([
                ("BTCUSD".to_string(), Decimal::from(100)),
                ("NAS100".to_string(), Decimal::from(50)),
            ]),
            break_even_default: Decimal::from(100),
            poll_interval_secs: 20,
            candle_timeframe: "M1".to_string(),
            candle_count: 180,
        }
    }
}

/// Connection settings for the override-signal datastore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub database_url: String,
}

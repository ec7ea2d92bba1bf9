//! Open positions and closed deals as reported by the broker.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Direction of a position or order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// Sign convention used by the signal layer: +1 long, -1 short.
    #[must_use]
    pub fn sign(self) -> i32 {
        match self {
            Self::Long => 1,
            Self::Short => -1,
        }
    }

    /// Opposite direction, used when closing against the market.
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Self::Long => Self::Short,
            Self::Short => Self::Long,
        }
    }
}

/// Protection state of a position, derived each cycle from the
/// broker-reported stop value. Never stored between polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectionState {
    /// No stop set yet (broker reports null or zero).
    NoStop,
    /// Initial volatility stop in place, still worse than entry.
    Protected,
    /// Stop at or beyond entry price.
    BreakEven,
    /// Stop beyond entry and inside the trailing band.
    Trailed,
}

/// An open position owned by the broker. The manager reads it fresh every
/// poll and requests mutations through the broker; it never caches one
/// across cycles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    /// Broker-assigned ticket.
    pub ticket: i64,
    pub symbol: String,
    pub side: Side,
    pub volume: Decimal,
    pub open_price: Decimal,
    pub current_price: Decimal,
    /// Broker-reported stop. Some brokers report zero for "unset";
    /// use [`Position::stop_loss`] instead of reading this directly.
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    pub opened_at: DateTime<Utc>,
    /// Free-text origin tag, e.g. the signal-source channel that opened it.
    pub origin_tag: Option<String>,
}

impl Position {
    /// The effective stop, with a zero value normalized to `None`.
    #[must_use]
    pub fn stop_loss(&self) -> Option<Decimal> {
        self.stop_loss.filter(|sl| !sl.is_zero())
    }

    /// Unsigned profit of the position in price ticks.
    #[must_use]
    pub fn profit_ticks(&self, tick_size: Decimal) -> Decimal {
        let favorable = match self.side {
            Side::Long => self.current_price - self.open_price,
            Side::Short => self.open_price - self.current_price,
        };
        favorable / tick_size
    }

    /// Protection state derived from the current stop relative to entry.
    #[must_use]
    pub fn protection_state(&self, trail_band: Decimal) -> ProtectionState {
        let Some(sl) = self.stop_loss() else {
            return ProtectionState::NoStop;
        };
        let past_entry = match self.side {
            Side::Long => sl >= self.open_price,
            Side::Short => sl <= self.open_price,
        };
        if !past_entry {
            return ProtectionState::Protected;
        }
        let inside_trail = match self.side {
            Side::Long => sl > self.open_price && self.current_price - sl <= trail_band,
            Side::Short => sl < self.open_price && sl - self.current_price <= trail_band,
        };
        if inside_trail {
            ProtectionState::Trailed
        } else {
            ProtectionState::BreakEven
        }
    }
}

/// A closed deal since some cutoff, used by the daily-loss gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deal {
    pub ticket: i64,
    pub symbol: String,
    /// Realized profit, negative for a loss.
    pub profit: Decimal,
    pub closed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn make_position(side: Side, stop_loss: Option<Decimal>) -> Position {
        Position {
            ticket: 1,
            symbol: "XAUUSD".to_string(),
            side,
            volume: dec!(0.30),
            open_price: dec!(1900.00),
            current_price: dec!(1903.10),
            stop_loss,
            take_profit: None,
            opened_at: Utc::now(),
            origin_tag: None,
        }
    }

    #[test]
    fn zero_stop_normalizes_to_none() {
        let pos = make_position(Side::Long, Some(dec!(0)));
        assert_eq!(pos.stop_loss(), None);
        assert_eq!(pos.protection_state(dec!(1)), ProtectionState::NoStop);
    }

    #[test]
    fn profit_ticks_reverses_for_shorts() {
        let long = make_position(Side::Long, None);
        assert_eq!(long.profit_ticks(dec!(0.01)), dec!(310));

        let short = make_position(Side::Short, None);
        assert_eq!(short.profit_ticks(dec!(0.01)), dec!(-310));
    }

    #[test]
    fn protection_state_tracks_stop_against_entry() {
        let protected = make_position(Side::Long, Some(dec!(1892.50)));
        assert_eq!(
            protected.protection_state(dec!(1)),
            ProtectionState::Protected
        );

        let break_even = make_position(Side::Long, Some(dec!(1900.00)));
        assert_eq!(
            break_even.protection_state(dec!(1)),
            ProtectionState::BreakEven
        );

        // Stop trailed to within one band of the current price.
        let trailed = make_position(Side::Long, Some(dec!(1902.50)));
        assert_eq!(trailed.protection_state(dec!(1)), ProtectionState::Trailed);
    }
}

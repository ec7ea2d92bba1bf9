//! Market-data primitives: candles, quotes, per-symbol precision facts,
//! and the chart-timeframe lookup.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::SentinelError;

/// One OHLC candle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub time: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
}

/// Current bid/ask for a symbol.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Quote {
    pub bid: Decimal,
    pub ask: Decimal,
}

/// Per-instrument precision facts supplied by the broker.
///
/// Authoritative on the broker side and may change between polls, so it is
/// re-queried every time it is needed rather than cached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolMetadata {
    pub symbol: String,
    /// Smallest quoted price increment.
    pub tick_size: Decimal,
    /// Account-currency value of one tick for one lot.
    pub tick_value: Decimal,
    /// Smallest tradable volume increment.
    pub volume_step: Decimal,
    /// Number of fractional digits in quoted prices.
    pub price_digits: u32,
    /// Minimum distance the broker accepts between price and a stop level.
    pub min_stop_distance: Decimal,
}

impl SymbolMetadata {
    /// Rejects metadata the risk math cannot divide by.
    pub fn validate(&self) -> Result<(), SentinelError> {
        for (field, value) in [
            ("tick_size", self.tick_size),
            ("tick_value", self.tick_value),
            ("volume_step", self.volume_step),
        ] {
            if value <= Decimal::ZERO {
                return Err(SentinelError::InvalidMetadata {
                    symbol: self.symbol.clone(),
                    detail: format!("{field} must be positive, got {value}"),
                });
            }
        }
        Ok(())
    }
}

/// Chart granularity the broker understands.
///
/// Parsing is driven by the variant list, so a new variant only needs its
/// `tag` and `minutes` arms and the compiler rejects a partial addition.
/// An unrecognized tag is a configuration error surfaced at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Timeframe {
    M1,
    M2,
    M3,
    M4,
    M5,
    M6,
    M10,
    M12,
    M15,
    M20,
    M30,
    H1,
    H2,
    H3,
    H4,
    H6,
    H8,
    H12,
    D1,
    W1,
    MN1,
}

impl Timeframe {
    const VARIANTS: &'static [Timeframe] = &[
        Self::M1,
        Self::M2,
        Self::M3,
        Self::M4,
        Self::M5,
        Self::M6,
        Self::M10,
        Self::M12,
        Self::M15,
        Self::M20,
        Self::M30,
        Self::H1,
        Self::H2,
        Self::H3,
        Self::H4,
        Self::H6,
        Self::H8,
        Self::H12,
        Self::D1,
        Self::W1,
        Self::MN1,
    ];

    /// Bar length in minutes.
    #[must_use]
    pub fn minutes(self) -> u32 {
        match self {
            Self::M1 => 1,
            Self::M2 => 2,
            Self::M3 => 3,
            Self::M4 => 4,
            Self::M5 => 5,
            Self::M6 => 6,
            Self::M10 => 10,
            Self::M12 => 12,
            Self::M15 => 15,
            Self::M20 => 20,
            Self::M30 => 30,
            Self::H1 => 60,
            Self::H2 => 120,
            Self::H3 => 180,
            Self::H4 => 240,
            Self::H6 => 360,
            Self::H8 => 480,
            Self::H12 => 720,
            Self::D1 => 1_440,
            Self::W1 => 10_080,
            Self::MN1 => 43_200,
        }
    }

    /// Broker-facing tag, e.g. `"M1"`.
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Self::M1 => "M1",
            Self::M2 => "M2",
            Self::M3 => "M3",
            Self::M4 => "M4",
            Self::M5 => "M5",
            Self::M6 => "M6",
            Self::M10 => "M10",
            Self::M12 => "M12",
            Self::M15 => "M15",
            Self::M20 => "M20",
            Self::M30 => "M30",
            Self::H1 => "H1",
            Self::H2 => "H2",
            Self::H3 => "H3",
            Self::H4 => "H4",
            Self::H6 => "H6",
            Self::H8 => "H8",
            Self::H12 => "H12",
            Self::D1 => "D1",
            Self::W1 => "W1",
            Self::MN1 => "MN1",
        }
    }
}

impl FromStr for Timeframe {
    type Err = SentinelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::VARIANTS
            .iter()
            .copied()
            .find(|tf| tf.tag() == s)
            .ok_or_else(|| SentinelError::Configuration(format!("unsupported timeframe: {s}")))
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

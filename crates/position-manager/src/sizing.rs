//! Fixed-fractional lot sizing against aggregate open risk.

use rust_decimal::Decimal;
use sentinel_core::{Position, Quote, SentinelError, Side, SignalDecision, SymbolMetadata};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::rounding::{fractional_digits, round_volume};

/// Output of the sizer: the volume to order plus the precision facts the
/// placement path rounds with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizedOrder {
    pub volume: Decimal,
    /// Ask for a long, bid for a short.
    pub entry_price: Decimal,
    pub tick_size: Decimal,
    pub price_digits: u32,
}

/// Converts a fractional risk budget into an order volume.
///
/// The stop distance in ticks prices one unit of volume at one tick value
/// per tick; existing open risk on the same symbol is folded in so that the
/// new order's risk tops the book up to `risk × balance` overall rather
/// than stacking independently.
pub fn size_order(
    balance: Decimal,
    meta: &SymbolMetadata,
    quote: Quote,
    open_positions: &[Position],
    decision: &SignalDecision,
) -> Result<SizedOrder, SentinelError> {
    meta.validate()?;

    let entry_price = match decision.side {
        Side::Long => quote.ask,
        Side::Short => quote.bid,
    };

    let stop_ticks = (entry_price - decision.stop_loss).abs() / meta.tick_size;
    if stop_ticks.is_zero() {
        return Err(SentinelError::InvalidOrder(format!(
            "zero stop distance for {}: entry {} equals stop {}",
            decision.symbol, entry_price, decision.stop_loss
        )));
    }

    let existing_risk = aggregate_open_risk(open_positions, &decision.symbol, meta);
    let risk_amount = decision.risk * balance;
    let total_risk = existing_risk + risk_amount;

    let raw_volume = total_risk / (stop_ticks * meta.tick_value);
    let volume = round_volume(raw_volume, meta.volume_step);
    if volume <= Decimal::ZERO {
        return Err(SentinelError::InvalidOrder(format!(
            "computed volume {} for {} rounds to nothing at step {}",
            raw_volume, decision.symbol, meta.volume_step
        )));
    }

    debug!(
        symbol = %decision.symbol,
        stop_ticks = %stop_ticks,
        existing_risk = %existing_risk,
        risk_amount = %risk_amount,
        volume = %volume,
        "Sized order"
    );

    Ok(SizedOrder {
        volume,
        entry_price,
        tick_size: meta.tick_size,
        price_digits: fractional_digits(meta.tick_size),
    })
}

/// Aggregate open risk on one symbol: Σ (|entry − stop| in ticks) × volume
/// × tick value. Positions with no stop yet carry no measurable risk here.
#[must_use]
pub fn aggregate_open_risk(
    open_positions: &[Position],
    symbol: &str,
    meta: &SymbolMetadata,
) -> Decimal {
    open_positions
        .iter()
        .filter(|pos| pos.symbol == symbol)
        .filter_map(|pos| {
            let sl = pos.stop_loss()?;
            let ticks = (pos.open_price - sl).abs() / meta.tick_size;
            Some(ticks * pos.volume * meta.tick_value)
        })
        .sum()
}

//! Stop-loss engine: initial volatility stop, break-even lock, trailing.
//!
//! Per position the protection lifecycle is NoStop → Protected → BreakEven
//! → Trailed, derived fresh each cycle from the broker-reported stop.
//! Decisions are pure; the monitor applies the returned actions through the
//! broker. Stops only ever tighten.

use rust_decimal::Decimal;
use sentinel_core::{Candle, Position, RiskConfig, SentinelError, Side, SymbolMetadata};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::atr::{atr, ATR_PERIOD};
use crate::rounding::{round_price, round_volume};

/// Fewest candles required before an initial stop is placed; with fewer the
/// position stays unprotected until the next cycle.
pub const MIN_CANDLES: usize = sentinel_core::config::MIN_CANDLES;

/// Multiple of ATR the stop is pushed out by when the raw candidate lands
/// inside normal noise.
const NOISE_WIDEN_ATR_MULTIPLE: u32 = 15;

/// A stop mutation the monitor should apply to a position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopAction {
    /// First protective stop for a position that has none.
    SetInitial { stop_loss: Decimal },
    /// Move the stop to entry, optionally shedding a third of the volume.
    MoveToBreakEven {
        stop_loss: Decimal,
        partial_close: Option<Decimal>,
    },
    /// Advance the stop inside the trailing band.
    Trail { stop_loss: Decimal },
}

/// Computes the initial volatility-based stop from recent candle history.
///
/// Long: lowest low over the window minus one ATR. Short: highest high plus
/// one ATR. A candidate closer to the latest close than ATR/2 is pushed out
/// by a further 15 × ATR so the stop is not sitting inside normal noise.
pub fn compute_initial_stop(
    symbol: &str,
    candles: &[Candle],
    side: Side,
    price_digits: u32,
) -> Result<Decimal, SentinelError> {
    if candles.len() < MIN_CANDLES {
        return Err(SentinelError::InsufficientHistory {
            symbol: symbol.to_string(),
            have: candles.len(),
            need: MIN_CANDLES,
        });
    }
    // Guarded by the length check above.
    let atr = atr(candles, ATR_PERIOD).ok_or_else(|| SentinelError::InsufficientHistory {
        symbol: symbol.to_string(),
        have: candles.len(),
        need: ATR_PERIOD,
    })?;
    let latest_close = candles[candles.len() - 1].close;

    let candidate = match side {
        Side::Long => {
            let lowest = candles
                .iter()
                .map(|c| c.low)
                .min()
                .unwrap_or(latest_close);
            lowest - atr
        }
        Side::Short => {
            let highest = candles
                .iter()
                .map(|c| c.high)
                .max()
                .unwrap_or(latest_close);
            highest + atr
        }
    };

    let stop = widen_noise_guard(candidate, latest_close, atr, side);
    Ok(round_price(stop, price_digits))
}

/// Pushes a candidate stop out by 15 × ATR when it sits closer to the
/// latest close than half an ATR.
#[must_use]
pub fn widen_noise_guard(
    candidate: Decimal,
    latest_close: Decimal,
    atr: Decimal,
    side: Side,
) -> Decimal {
    let distance = (latest_close - candidate).abs();
    if distance >= atr / Decimal::TWO {
        return candidate;
    }
    let push = Decimal::from(NOISE_WIDEN_ATR_MULTIPLE) * atr;
    match side {
        Side::Long => candidate - push,
        Side::Short => candidate + push,
    }
}

/// Evaluates break-even and trailing rules for a position that already has
/// a stop. The two rules are independent and may both fire in one cycle;
/// trailing sees the stop value break-even just produced.
#[must_use]
pub fn evaluate_protected(
    pos: &Position,
    meta: &SymbolMetadata,
    config: &RiskConfig,
) -> Vec<StopAction> {
    let Some(mut current_sl) = pos.stop_loss() else {
        return Vec::new();
    };
    let mut actions = Vec::new();

    if let Some(action) = break_even_action(pos, current_sl, meta, config) {
        if let StopAction::MoveToBreakEven { stop_loss, .. } = &action {
            current_sl = *stop_loss;
        }
        actions.push(action);
    }

    if let Some(stop_loss) = trailing_stop(pos, current_sl, meta, config) {
        actions.push(StopAction::Trail { stop_loss });
    }

    actions
}

/// Break-even rule: once profit in ticks reaches the configured trigger and
/// the stop is still worse than entry, move the stop to the entry price.
/// Fires at most once per position because afterwards the stop is no longer
/// worse than entry.
fn break_even_action(
    pos: &Position,
    current_sl: Decimal,
    meta: &SymbolMetadata,
    config: &RiskConfig,
) -> Option<StopAction> {
    let trigger = config.break_even_trigger(&pos.symbol);
    let profit_ticks = pos.profit_ticks(meta.tick_size);
    if profit_ticks < trigger {
        return None;
    }
    let stop_worse_than_entry = match pos.side {
        Side::Long => current_sl < pos.open_price,
        Side::Short => current_sl > pos.open_price,
    };
    if !stop_worse_than_entry {
        return None;
    }

    let partial_close = if config.partial_close_enabled {
        let third = round_volume(pos.volume / Decimal::from(3), meta.volume_step);
        (third > Decimal::ZERO && third < pos.volume).then_some(third)
    } else {
        None
    };

    info!(
        ticket = pos.ticket,
        symbol = %pos.symbol,
        profit_ticks = %profit_ticks,
        trigger = %trigger,
        partial_close = ?partial_close,
        "Break-even triggered"
    );
    Some(StopAction::MoveToBreakEven {
        stop_loss: round_price(pos.open_price, meta.price_digits),
        partial_close,
    })
}

/// Trailing rule: once price has moved favorably beyond the trailing band
/// (`max_stop_loss_pct × open_price`), follow it at one band's distance.
/// The candidate applies only when strictly more protective than the
/// current stop.
fn trailing_stop(
    pos: &Position,
    current_sl: Decimal,
    meta: &SymbolMetadata,
    config: &RiskConfig,
) -> Option<Decimal> {
    let band = config.max_stop_loss_pct * pos.open_price;
    let (beyond_band, candidate) = match pos.side {
        Side::Long => (
            pos.current_price > pos.open_price + band,
            pos.current_price - band,
        ),
        Side::Short => (
            pos.current_price < pos.open_price - band,
            pos.current_price + band,
        ),
    };
    if !beyond_band {
        return None;
    }
    let candidate = round_price(candidate, meta.price_digits);
    let tightens = match pos.side {
        Side::Long => candidate > current_sl,
        Side::Short => candidate < current_sl,
    };
    if !tightens {
        debug!(
            ticket = pos.ticket,
            symbol = %pos.symbol,
            candidate = %candidate,
            current_sl = %current_sl,
            "Trailing candidate would loosen the stop, skipped"
        );
        return None;
    }
    Some(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn candle(high: Decimal, low: Decimal, close: Decimal) -> Candle {
        Candle {
            time: Utc::now(),
            open: close,
            high,
            low,
            close,
        }
    }

    fn uniform_candles(high: Decimal, low: Decimal, close: Decimal, count: usize) -> Vec<Candle> {
        (0..count).map(|_| candle(high, low, close)).collect()
    }

    fn xauusd_meta() -> SymbolMetadata {
        SymbolMetadata {
            symbol: "XAUUSD".to_string(),
            tick_size: dec!(0.01),
            tick_value: dec!(1),
            volume_step: dec!(0.01),
            price_digits: 2,
            min_stop_distance: dec!(0.30),
        }
    }

    fn long_position(open: Decimal, current: Decimal, stop_loss: Option<Decimal>) -> Position {
        Position {
            ticket: 7,
            symbol: "XAUUSD".to_string(),
            side: Side::Long,
            volume: dec!(0.30),
            open_price: open,
            current_price: current,
            stop_loss,
            take_profit: None,
            opened_at: Utc::now(),
            origin_tag: None,
        }
    }

    fn config_with_trigger(trigger: Decimal) -> RiskConfig {
        RiskConfig {
            break_even_points: [("XAUUSD".to_string(), trigger)].into_iter().collect(),
            ..RiskConfig::default()
        }
    }

    #[test]
    fn initial_stop_for_long_is_window_low_minus_atr() {
        // ATR(14) = 2.50, window low 1895.00, latest close 1896.00.
        // Candidate 1892.50 is 3.50 from the close, outside noise.
        let candles = uniform_candles(dec!(1897.50), dec!(1895.00), dec!(1896.00), 180);
        let stop = compute_initial_stop("XAUUSD", &candles, Side::Long, 2).unwrap();
        assert_eq!(stop, dec!(1892.50));
    }

    #[test]
    fn initial_stop_for_short_is_window_high_plus_atr() {
        let candles = uniform_candles(dec!(1897.50), dec!(1895.00), dec!(1896.00), 180);
        let stop = compute_initial_stop("XAUUSD", &candles, Side::Short, 2).unwrap();
        assert_eq!(stop, dec!(1900.00));
    }

    #[test]
    fn initial_stop_defers_on_thin_history() {
        let candles = uniform_candles(dec!(1897.50), dec!(1895.00), dec!(1896.00), 13);
        let err = compute_initial_stop("XAUUSD", &candles, Side::Long, 2).unwrap_err();
        assert!(matches!(
            err,
            SentinelError::InsufficientHistory { have: 13, need: 14, .. }
        ));
    }

    #[test]
    fn noise_guard_widens_candidate_inside_half_atr() {
        // Candidate 0.70 from the close, under the 1.25 threshold:
        // pushed out by 15 × 2.50 = 37.50.
        let widened = widen_noise_guard(dec!(1895.30), dec!(1896.00), dec!(2.50), Side::Long);
        assert_eq!(widened, dec!(1857.80));

        let widened = widen_noise_guard(dec!(1896.70), dec!(1896.00), dec!(2.50), Side::Short);
        assert_eq!(widened, dec!(1934.20));
    }

    #[test]
    fn noise_guard_leaves_distant_candidate_alone() {
        // 3.50 away, well past ATR/2 = 1.25.
        let stop = widen_noise_guard(dec!(1892.50), dec!(1896.00), dec!(2.50), Side::Long);
        assert_eq!(stop, dec!(1892.50));
    }

    #[test]
    fn break_even_moves_stop_to_entry_and_sheds_a_third() {
        // 310 ticks of profit against a 300-tick trigger.
        let pos = long_position(dec!(1900.00), dec!(1903.10), Some(dec!(1892.50)));
        let config = config_with_trigger(dec!(300));
        let actions = evaluate_protected(&pos, &xauusd_meta(), &config);
        assert_eq!(
            actions[0],
            StopAction::MoveToBreakEven {
                stop_loss: dec!(1900.00),
                partial_close: Some(dec!(0.10)),
            }
        );
    }

    #[test]
    fn break_even_respects_partial_close_switch() {
        let pos = long_position(dec!(1900.00), dec!(1903.10), Some(dec!(1892.50)));
        let config = RiskConfig {
            partial_close_enabled: false,
            ..config_with_trigger(dec!(300))
        };
        let actions = evaluate_protected(&pos, &xauusd_meta(), &config);
        assert_eq!(
            actions[0],
            StopAction::MoveToBreakEven {
                stop_loss: dec!(1900.00),
                partial_close: None,
            }
        );
    }

    #[test]
    fn break_even_does_not_refire_once_stop_is_at_entry() {
        let pos = long_position(dec!(1900.00), dec!(1903.10), Some(dec!(1900.00)));
        let config = config_with_trigger(dec!(300));
        let actions = evaluate_protected(&pos, &xauusd_meta(), &config);
        assert!(actions
            .iter()
            .all(|a| !matches!(a, StopAction::MoveToBreakEven { .. })));
    }

    #[test]
    fn break_even_waits_for_the_trigger() {
        let pos = long_position(dec!(1900.00), dec!(1902.00), Some(dec!(1892.50)));
        let config = config_with_trigger(dec!(300));
        assert!(evaluate_protected(&pos, &xauusd_meta(), &config).is_empty());
    }

    #[test]
    fn trailing_advances_only_when_strictly_tighter() {
        // Band = 1% of 1900 = 19. Price 1925 is beyond entry + band;
        // candidate 1925 − 19 = 1906.
        let config = config_with_trigger(dec!(10000));
        let pos = long_position(dec!(1900.00), dec!(1925.00), Some(dec!(1892.50)));
        let actions = evaluate_protected(&pos, &xauusd_meta(), &config);
        assert_eq!(actions, vec![StopAction::Trail { stop_loss: dec!(1906.00) }]);

        // An existing tighter stop is left alone.
        let pos = long_position(dec!(1900.00), dec!(1925.00), Some(dec!(1910.00)));
        assert!(evaluate_protected(&pos, &xauusd_meta(), &config).is_empty());
    }

    #[test]
    fn trailing_for_short_moves_stop_down() {
        let config = config_with_trigger(dec!(10000));
        let mut pos = long_position(dec!(1900.00), dec!(1870.00), Some(dec!(1907.50)));
        pos.side = Side::Short;
        let actions = evaluate_protected(&pos, &xauusd_meta(), &config);
        // Band 19, candidate 1870 + 19 = 1889 < 1907.50.
        assert_eq!(actions, vec![StopAction::Trail { stop_loss: dec!(1889.00) }]);
    }

    #[test]
    fn break_even_and_trailing_can_fire_together() {
        // 2500 ticks of profit trips a 300-tick trigger, and price 1925 is
        // beyond the 19-point band, so trailing follows at 1906, tighter
        // than the fresh break-even stop at 1900.
        let pos = long_position(dec!(1900.00), dec!(1925.00), Some(dec!(1892.50)));
        let config = config_with_trigger(dec!(300));
        let actions = evaluate_protected(&pos, &xauusd_meta(), &config);
        assert_eq!(actions.len(), 2);
        assert!(matches!(actions[0], StopAction::MoveToBreakEven { .. }));
        assert_eq!(actions[1], StopAction::Trail { stop_loss: dec!(1906.00) });
    }

    #[test]
    fn stop_sequence_is_monotonic_for_longs() {
        // Replay a favorable price path; the applied stop never moves down.
        let config = config_with_trigger(dec!(300));
        let meta = xauusd_meta();
        let mut stop = dec!(1892.50);
        for price in [dec!(1903.10), dec!(1910.00), dec!(1925.00), dec!(1921.00)] {
            let pos = long_position(dec!(1900.00), price, Some(stop));
            for action in evaluate_protected(&pos, &meta, &config) {
                let next = match action {
                    StopAction::SetInitial { stop_loss }
                    | StopAction::MoveToBreakEven { stop_loss, .. }
                    | StopAction::Trail { stop_loss } => stop_loss,
                };
                assert!(next >= stop, "stop loosened from {stop} to {next}");
                stop = next;
            }
        }
    }
}

//! Average True Range over a candle window.

use rust_decimal::Decimal;
use sentinel_core::Candle;

/// ATR period used for initial stop placement.
pub const ATR_PERIOD: usize = 14;

/// True range of each candle: the high-low span widened by any gap from the
/// previous close. The first candle has no previous close, so its range is
/// just high − low.
fn true_ranges(candles: &[Candle]) -> Vec<Decimal> {
    let mut ranges = Vec::with_capacity(candles.len());
    let mut prev_close: Option<Decimal> = None;
    for candle in candles {
        let span = candle.high - candle.low;
        let tr = match prev_close {
            Some(pc) => span.max((candle.high - pc).abs()).max((candle.low - pc).abs()),
            None => span,
        };
        ranges.push(tr);
        prev_close = Some(candle.close);
    }
    ranges
}

/// Average true range over the last `period` candles, oldest first.
/// Returns `None` when there is not enough history.
#[must_use]
pub fn atr(candles: &[Candle], period: usize) -> Option<Decimal> {
    if period == 0 || candles.len() < period {
        return None;
    }
    let ranges = true_ranges(candles);
    let tail = &ranges[ranges.len() - period..];
    let sum: Decimal = tail.iter().copied().sum();
    Some(sum / Decimal::from(period as u64))
}

//! Broker-precision rounding shared by sizing, partial closes, and the
//! order-entry path.

use rust_decimal::Decimal;

/// Number of fractional digits in a broker increment, e.g. 0.01 → 2.
#[must_use]
pub fn fractional_digits(step: Decimal) -> u32 {
    step.normalize().scale()
}

/// Rounds a volume to the fractional digit count of the volume step.
#[must_use]
pub fn round_volume(volume: Decimal, volume_step: Decimal) -> Decimal {
    volume.round_dp(fractional_digits(volume_step))
}

/// Rounds a price to the symbol's digit count.
#[must_use]
pub fn round_price(price: Decimal, price_digits: u32) -> Decimal {
    price.round_dp(price_digits)
}

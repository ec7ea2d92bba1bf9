//! Signal-layer inputs: the decision handed to the order-entry path and the
//! externally produced override records.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::SentinelError;
use crate::position::Side;

/// Order type proposed by the strategy layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderKind {
    BuyMarket,
    SellMarket,
    BuyStop,
    SellStop,
    BuyLimit,
    SellLimit,
}

impl OrderKind {
    /// Direction implied by the order type.
    #[must_use]
    pub fn side(self) -> Side {
        match self {
            Self::BuyMarket | Self::BuyStop | Self::BuyLimit => Side::Long,
            Self::SellMarket | Self::SellStop | Self::SellLimit => Side::Short,
        }
    }
}

/// A proposed trade produced by the strategy layer, consumed by the
/// guardrail and sizing path before any order is placed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalDecision {
    pub symbol: String,
    pub side: Side,
    pub order_kind: OrderKind,
    /// Price at decision time.
    pub current_price: Decimal,
    /// Filled in by the sizer; absent until then.
    pub volume: Option<Decimal>,
    /// Fraction of balance to put at risk, e.g. 0.01.
    pub risk: Decimal,
    pub stop_loss: Decimal,
    pub take_profit: Option<Decimal>,
    pub decided_at: DateTime<Utc>,
    /// Channel tag tying the decision to an external signal source.
    pub origin_tag: Option<String>,
}

impl SignalDecision {
    /// Checks that stop-loss and take-profit sit on the correct side of the
    /// current price for the direction.
    pub fn validate(&self) -> Result<(), SentinelError> {
        let sl_ok = match self.side {
            Side::Long => self.stop_loss < self.current_price,
            Side::Short => self.stop_loss > self.current_price,
        };
        if !sl_ok {
            return Err(SentinelError::InvalidOrder(format!(
                "stop loss {} on wrong side of price {} for {:?} {}",
                self.stop_loss, self.current_price, self.side, self.symbol
            )));
        }
        if let Some(tp) = self.take_profit {
            let tp_ok = match self.side {
                Side::Long => tp > self.current_price,
                Side::Short => tp < self.current_price,
            };
            if !tp_ok {
                return Err(SentinelError::InvalidOrder(format!(
                    "take profit {} on wrong side of price {} for {:?} {}",
                    tp, self.current_price, self.side, self.symbol
                )));
            }
        }
        Ok(())
    }
}

/// Instruction kind carried by an override record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideKind {
    /// Bank some profit: partial close.
    TakeProfit,
    /// Get out: full close.
    StopLoss,
}

/// An out-of-band close instruction stored by an external producer.
///
/// Each record transitions unhandled to handled exactly once; the manager
/// must never act twice on the same record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverrideRecord {
    pub id: i64,
    /// Channel/tag the instruction targets; matched against a position's
    /// origin tag.
    pub channel: String,
    pub kind: OverrideKind,
    pub handled: bool,
    pub handled_at: Option<DateTime<Utc>>,
    /// Free-text result payload written back when the record is consumed.
    pub result: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn decision(side: Side, stop_loss: Decimal, take_profit: Option<Decimal>) -> SignalDecision {
        SignalDecision {
            symbol: "XAUUSD".to_string(),
            side,
            order_kind: match side {
                Side::Long => OrderKind::BuyMarket,
                Side::Short => OrderKind::SellMarket,
            },
            current_price: dec!(1900.00),
            volume: None,
            risk: dec!(0.01),
            stop_loss,
            take_profit,
            decided_at: Utc::now(),
            origin_tag: None,
        }
    }

    #[test]
    fn long_decision_with_stop_below_price_is_valid() {
        let d = decision(Side::Long, dec!(1892.50), Some(dec!(1915.00)));
        assert!(d.validate().is_ok());
    }

    #[test]
    fn stop_on_wrong_side_is_rejected() {
        let d = decision(Side::Long, dec!(1905.00), None);
        assert!(d.validate().is_err());

        let d = decision(Side::Short, dec!(1890.00), None);
        assert!(d.validate().is_err());
    }

    #[test]
    fn take_profit_on_wrong_side_is_rejected() {
        let d = decision(Side::Short, dec!(1910.00), Some(dec!(1912.00)));
        assert!(d.validate().is_err());
    }

    #[test]
    fn order_kind_implies_side() {
        assert_eq!(OrderKind::BuyStop.side(), Side::Long);
        assert_eq!(OrderKind::SellLimit.side(), Side::Short);
    }

    #[test]
    fn override_kind_serializes_as_snake_case() {
        // Must match the `kind` column values in the signal store.
        assert_eq!(
            serde_json::to_string(&OverrideKind::TakeProfit).unwrap(),
            r#""take_profit""#
        );
        assert_eq!(
            serde_json::from_str::<OverrideKind>(r#""stop_loss""#).unwrap(),
            OverrideKind::StopLoss
        );
    }
}

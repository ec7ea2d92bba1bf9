//! Portfolio-level admission control and the daily-loss circuit breaker.

use rust_decimal::Decimal;
use sentinel_core::{Deal, Position, RiskConfig, SignalDecision};
use tracing::warn;

/// Outcome of the guardrail check for a proposed trade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Approved,
    Rejected(RejectReason),
}

/// Why a proposed trade was turned away. Rules are evaluated in order; the
/// first failure wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// The decision reached admission without a sized volume.
    Unsized,
    TooManyOpenTrades {
        open: usize,
        max: usize,
    },
    RiskCapExceeded {
        risk: Decimal,
        max: Decimal,
    },
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unsized => write!(f, "decision has no volume"),
            Self::TooManyOpenTrades { open, max } => {
                write!(f, "{open} open trades at the {max}-trade cap")
            }
            Self::RiskCapExceeded { risk, max } => {
                write!(f, "per-trade risk {risk} exceeds cap {max}")
            }
        }
    }
}

/// Checks a sized decision against account-wide limits.
#[must_use]
pub fn admit(
    decision: &SignalDecision,
    balance: Decimal,
    open_positions: &[Position],
    config: &RiskConfig,
) -> Admission {
    if open_positions.len() >= config.max_concurrent_trades {
        return Admission::Rejected(RejectReason::TooManyOpenTrades {
            open: open_positions.len(),
            max: config.max_concurrent_trades,
        });
    }

    let Some(volume) = decision.volume else {
        return Admission::Rejected(RejectReason::Unsized);
    };
    let risk_per_trade = (decision.current_price - decision.stop_loss).abs() * volume;
    let max_risk = config.max_trade_pct * balance;
    if risk_per_trade > max_risk {
        return Admission::Rejected(RejectReason::RiskCapExceeded {
            risk: risk_per_trade,
            max: max_risk,
        });
    }

    Admission::Approved
}

/// Daily-loss circuit breaker: sums the magnitude of losing deals closed
/// since UTC midnight and trips once it reaches the configured fraction of
/// balance. Trading halts for the rest of the day; the monitor keeps
/// looping.
#[must_use]
pub fn daily_loss_tripped(
    deals_since_midnight: &[Deal],
    balance: Decimal,
    config: &RiskConfig,
) -> bool {
    let realized_loss: Decimal = deals_since_midnight
        .iter()
        .filter(|deal| deal.profit < Decimal::ZERO)
        .map(|deal| -deal.profit)
        .sum();
    let threshold = config.max_daily_loss_pct * balance;
    let tripped = realized_loss >= threshold;
    if tripped {
        warn!(
            realized_loss = %realized_loss,
            threshold = %threshold,
            "Daily loss cap reached, position management halted for today"
        );
    }
    tripped
}

//! Order-entry path: guardrail admission, sizing, and broker-precision
//! rounding for a strategy decision, before any order is placed.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use sentinel_core::{Broker, RiskConfig, SentinelError, SignalDecision};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::guardrails::{admit, Admission};
use crate::rounding::round_price;
use crate::sizing::size_order;

/// A fully prepared order: sized, admitted, and rounded to the broker's
/// precision. Stop and take-profit are dropped (not adjusted) when they sit
/// inside the broker's minimum stop distance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryOrder {
    pub symbol: String,
    pub volume: Decimal,
    pub entry_price: Decimal,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
}

/// Runs a strategy decision through validation, sizing, and guardrails.
///
/// Returns `Ok(None)` when a guardrail turned the trade away; the caller
/// must not place an order in that case. Validation failures and missing
/// metadata are errors for the caller's signal path, not the monitor loop.
pub async fn prepare_entry(
    broker: &dyn Broker,
    decision: &SignalDecision,
    config: &RiskConfig,
) -> Result<Option<EntryOrder>> {
    decision.validate()?;

    let meta = broker
        .symbol_metadata(&decision.symbol)
        .await?
        .ok_or_else(|| SentinelError::metadata_unavailable(&decision.symbol))?;
    let quote = broker.quote(&decision.symbol).await?;
    let balance = broker
        .account_balance()
        .await
        .context("fetching balance for order entry")?;
    let open_positions = broker.open_positions().await?;

    let sized = size_order(balance, &meta, quote, &open_positions, decision)?;

    let mut sized_decision = decision.clone();
    sized_decision.volume = Some(sized.volume);
    match admit(&sized_decision, balance, &open_positions, config) {
        Admission::Approved => {}
        Admission::Rejected(reason) => {
            warn!(symbol = %decision.symbol, %reason, "Trade rejected by guardrails");
            return Ok(None);
        }
    }

    let entry_price = round_price(sized.entry_price, meta.price_digits);
    let stop_loss = clamp_to_min_distance(
        round_price(decision.stop_loss, meta.price_digits),
        entry_price,
        meta.min_stop_distance,
    );
    let take_profit = decision.take_profit.and_then(|tp| {
        clamp_to_min_distance(
            round_price(tp, meta.price_digits),
            entry_price,
            meta.min_stop_distance,
        )
    });

    info!(
        symbol = %decision.symbol,
        volume = %sized.volume,
        entry_price = %entry_price,
        stop_loss = ?stop_loss,
        take_profit = ?take_profit,
        "Order prepared"
    );
    Ok(Some(EntryOrder {
        symbol: decision.symbol.clone(),
        volume: sized.volume,
        entry_price,
        stop_loss,
        take_profit,
    }))
}

/// A protective level closer to the entry than the broker's minimum stop
/// distance would be rejected on placement, so it is dropped and left for
/// the monitor to set once the position is open.
fn clamp_to_min_distance(
    level: Decimal,
    entry_price: Decimal,
    min_stop_distance: Decimal,
) -> Option<Decimal> {
    ((entry_price - level).abs() >= min_stop_distance).then_some(level)
}

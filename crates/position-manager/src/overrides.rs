//! Out-of-band override signals: externally produced close/partial-close
//! instructions tied to a position's origin tag, consumed exactly once.

use anyhow::Result;
use rust_decimal::Decimal;
use sentinel_core::{OverrideKind, Position, SignalStore, SymbolMetadata};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::rounding::round_volume;

/// What the monitor should do to the position, decided by the most recent
/// unhandled override record for its origin tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverrideAction {
    None,
    PartialClose(Decimal),
    FullClose,
}

/// Resolves the pending override for a position, if any.
///
/// The consumed record is marked handled in the same step that decides the
/// action, conditioned on it still being unhandled; losing that race means
/// another writer acted first, so the decision degrades to a no-op rather
/// than an error. A take-profit-like instruction sheds one third of the
/// volume (volume-step rounded); when the volume is too small to split the
/// position is left whole. A stop-loss-like instruction closes the position
/// outright.
pub async fn resolve(
    store: &dyn SignalStore,
    pos: &Position,
    meta: &SymbolMetadata,
) -> Result<OverrideAction> {
    let Some(tag) = pos.origin_tag.as_deref() else {
        return Ok(OverrideAction::None);
    };
    let Some(record) = store.find_unhandled(tag).await? else {
        return Ok(OverrideAction::None);
    };

    let action = match record.kind {
        OverrideKind::TakeProfit => {
            let third = round_volume(pos.volume / Decimal::from(3), meta.volume_step);
            if third > Decimal::ZERO && third < pos.volume {
                OverrideAction::PartialClose(third)
            } else {
                // Too small to split at the volume step. The record is
                // still consumed below so it cannot pile up retries.
                warn!(
                    ticket = pos.ticket,
                    symbol = %pos.symbol,
                    volume = %pos.volume,
                    "Take-profit override on indivisible volume, leaving position whole"
                );
                OverrideAction::None
            }
        }
        OverrideKind::StopLoss => OverrideAction::FullClose,
    };

    let result = serde_json::json!({
        "ticket": pos.ticket,
        "symbol": pos.symbol,
        "action": action,
    })
    .to_string();
    let consumed = store.mark_handled(record.id, &result).await?;
    if !consumed {
        debug!(
            record_id = record.id,
            ticket = pos.ticket,
            "Override record already handled elsewhere, no-op"
        );
        return Ok(OverrideAction::None);
    }

    info!(
        record_id = record.id,
        ticket = pos.ticket,
        symbol = %pos.symbol,
        kind = ?record.kind,
        action = ?action,
        "Override signal consumed"
    );
    Ok(action)
}

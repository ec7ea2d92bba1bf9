//! Postgres adapter for out-of-band override signals.
//!
//! Expected table:
//!
//! ```sql
//! CREATE TABLE override_signals (
//!     id          BIGSERIAL PRIMARY KEY,
//!     channel     TEXT        NOT NULL,
//!     kind        TEXT        NOT NULL, -- 'take_profit' | 'stop_loss'
//!     handled     BOOLEAN     NOT NULL DEFAULT false,
//!     handled_at  TIMESTAMPTZ,
//!     result      TEXT,
//!     created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! ```
//!
//! A fresh connection is opened and closed per lookup, bounding resource
//! lifetime and letting each lookup fail and retry independently of the
//! monitor loop's lifetime. The handled flag flips through an optimistic
//! `WHERE handled = false` update; a losing writer sees zero rows affected.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use sqlx::{Connection, PgConnection, Row};
use tracing::debug;

use sentinel_core::config::StoreConfig;
use sentinel_core::{OverrideKind, OverrideRecord, SignalStore};

/// Postgres-backed [`SignalStore`].
pub struct PgSignalStore {
    config: StoreConfig,
}

impl PgSignalStore {
    #[must_use]
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }

    async fn connect(&self) -> Result<PgConnection> {
        PgConnection::connect(&self.config.database_url)
            .await
            .context("connecting to override-signal store")
    }
}

#[async_trait]
impl SignalStore for PgSignalStore {
    async fn find_unhandled(&self, channel: &str) -> Result<Option<OverrideRecord>> {
        let mut conn = self.connect().await?;
        let row = sqlx::query(
            r"
            SELECT id, channel, kind, handled, handled_at, result, created_at
            FROM override_signals
            WHERE channel = $1 AND handled = false
            ORDER BY created_at DESC
            LIMIT 1
            ",
        )
        .bind(channel)
        .fetch_optional(&mut conn)
        .await?;
        if let Err(e) = conn.close().await {
            debug!(error = %e, "Failed to close store connection after lookup");
        }

        row.map(|row| {
            Ok(OverrideRecord {
                id: row.get("id"),
                channel: row.get("channel"),
                kind: parse_kind(row.get("kind"))?,
                handled: row.get("handled"),
                handled_at: row.get("handled_at"),
                result: row.get("result"),
                created_at: row.get("created_at"),
            })
        })
        .transpose()
    }

    async fn mark_handled(&self, record_id: i64, result: &str) -> Result<bool> {
        let mut conn = self.connect().await?;
        let outcome = sqlx::query(
            r"
            UPDATE override_signals
            SET handled = true, handled_at = NOW(), result = $2
            WHERE id = $1 AND handled = false
            ",
        )
        .bind(record_id)
        .bind(result)
        .execute(&mut conn)
        .await?;
        if let Err(e) = conn.close().await {
            debug!(error = %e, "Failed to close store connection after update");
        }

        let consumed = outcome.rows_affected() > 0;
        debug!(record_id, consumed, "Marked override record handled");
        Ok(consumed)
    }
}

fn parse_kind(kind: &str) -> Result<OverrideKind> {
    match kind {
        "take_profit" => Ok(OverrideKind::TakeProfit),
        "stop_loss" => Ok(OverrideKind::StopLoss),
        other => bail!("unknown override kind in store: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_kinds_parse() {
        assert_eq!(parse_kind("take_profit").unwrap(), OverrideKind::TakeProfit);
        assert_eq!(parse_kind("stop_loss").unwrap(), OverrideKind::StopLoss);
    }

    #[test]
    fn unknown_kind_is_an_error() {
        assert!(parse_kind("trailing").is_err());
    }
}

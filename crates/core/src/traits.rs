//! Collaborator seams.
//!
//! The broker and the override-signal datastore are external systems; the
//! manager consumes them through these traits and is tested against
//! in-memory implementations.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::market::{Candle, Quote, SymbolMetadata, Timeframe};
use crate::position::{Deal, Position};
use crate::signal::OverrideRecord;

/// Trading-account operations the manager needs from a broker session.
#[async_trait]
pub trait Broker: Send + Sync {
    async fn open_positions(&self) -> Result<Vec<Position>>;

    async fn account_balance(&self) -> Result<Decimal>;

    /// Deals closed at or after the given cutoff (UTC).
    async fn closed_deals_since(&self, since: DateTime<Utc>) -> Result<Vec<Deal>>;

    async fn symbol_metadata(&self, symbol: &str) -> Result<Option<SymbolMetadata>>;

    async fn quote(&self, symbol: &str) -> Result<Quote>;

    /// Most recent `count` candles for the symbol, oldest first.
    async fn recent_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> Result<Vec<Candle>>;

    /// Replaces a position's stop-loss, and take-profit when given.
    async fn modify_stop(
        &self,
        ticket: i64,
        stop_loss: Decimal,
        take_profit: Option<Decimal>,
    ) -> Result<()>;

    /// Closes part of a position, leaving the remainder open.
    async fn partial_close(&self, ticket: i64, volume: Decimal) -> Result<()>;

    async fn full_close(&self, ticket: i64) -> Result<()>;
}

/// Lookup and consumption of externally produced override signals.
#[async_trait]
pub trait SignalStore: Send + Sync {
    /// Most recent unhandled record targeting the channel, if any.
    async fn find_unhandled(&self, channel: &str) -> Result<Option<OverrideRecord>>;

    /// Marks a record handled, conditioned on it still being unhandled.
    /// Returns `false` when another writer got there first; the caller
    /// treats that as a no-op, not an error.
    async fn mark_handled(&self, record_id: i64, result: &str) -> Result<bool>;
}

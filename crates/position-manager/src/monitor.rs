//! The monitor loop: ties stops, overrides, and the daily-loss gate
//! together once per polling interval.
//!
//! One cooperative loop per account: positions are processed strictly
//! sequentially so two in-flight mutations never race on the same broker
//! session. Any error on one position is logged and the rest of the cycle
//! continues; only startup configuration can abort.

use std::time::Duration;

use anyhow::{bail, Result};
use chrono::{NaiveTime, Utc};
use sentinel_core::{
    Broker, Position, RiskConfig, SentinelError, SignalStore, SymbolMetadata, Timeframe,
};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::guardrails;
use crate::overrides::{self, OverrideAction};
use crate::stops::{self, StopAction};

/// Long-running position manager for one trading account.
///
/// Owns the only handle to the override-signal store, making single-writer
/// ownership explicit: running a second monitor against the same account is
/// an operational error the optimistic handled-flag check only mitigates.
pub struct PositionMonitor<B, S> {
    broker: B,
    store: S,
    config: RiskConfig,
    timeframe: Timeframe,
}

impl<B: Broker, S: SignalStore> PositionMonitor<B, S> {
    /// Validates configuration and builds the monitor. Configuration
    /// problems are fatal here, before the loop ever starts.
    pub fn new(broker: B, store: S, config: RiskConfig) -> Result<Self, SentinelError> {
        config.validate()?;
        let timeframe = config.timeframe()?;
        Ok(Self {
            broker,
            store,
            config,
            timeframe,
        })
    }

    /// Runs the monitor until the shutdown flag is set. The flag is honored
    /// at the top of each iteration; work already in flight completes.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        info!(
            poll_secs = self.config.poll_interval_secs,
            timeframe = %self.timeframe,
            max_daily_loss_pct = %self.config.max_daily_loss_pct,
            max_stop_loss_pct = %self.config.max_stop_loss_pct,
            "Position monitor started"
        );
        let mut interval =
            tokio::time::interval(Duration::from_secs(self.config.poll_interval_secs));
        loop {
            tokio::select! {
                _ = interval.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Position monitor stopping");
                        return Ok(());
                    }
                    continue;
                }
            }
            if *shutdown.borrow() {
                info!("Position monitor stopping");
                return Ok(());
            }
            self.run_cycle().await;
        }
    }

    /// One polling cycle. Never returns an error: every failure is logged
    /// and deferred to the next cycle.
    pub async fn run_cycle(&self) {
        match self.daily_loss_gate().await {
            Ok(true) => return,
            Ok(false) => {}
            Err(e) => {
                error!(error = %e, "Daily-loss gate could not be evaluated, skipping cycle");
                return;
            }
        }

        let positions = match self.broker.open_positions().await {
            Ok(p) => p,
            Err(e) => {
                error!(error = %e, "Failed to fetch open positions");
                return;
            }
        };

        for pos in &positions {
            if let Err(e) = self.manage_position(pos).await {
                error!(
                    ticket = pos.ticket,
                    symbol = %pos.symbol,
                    error = %e,
                    "Error managing position, will retry next cycle"
                );
            }
        }
    }

    /// Evaluates the daily-loss circuit breaker against deals closed since
    /// UTC midnight.
    async fn daily_loss_gate(&self) -> Result<bool> {
        let midnight = Utc::now()
            .date_naive()
            .and_time(NaiveTime::MIN)
            .and_utc();
        let deals = self.broker.closed_deals_since(midnight).await?;
        let balance = self.broker.account_balance().await?;
        Ok(guardrails::daily_loss_tripped(&deals, balance, &self.config))
    }

    /// Stop management then override resolution for a single position.
    async fn manage_position(&self, pos: &Position) -> Result<()> {
        let Some(meta) = self.broker.symbol_metadata(&pos.symbol).await? else {
            warn!(
                ticket = pos.ticket,
                symbol = %pos.symbol,
                "Symbol metadata unavailable, skipping this cycle"
            );
            return Ok(());
        };
        meta.validate()?;

        let trail_band = self.config.max_stop_loss_pct * pos.open_price;
        debug!(
            ticket = pos.ticket,
            symbol = %pos.symbol,
            state = ?pos.protection_state(trail_band),
            "Evaluating position"
        );

        if pos.stop_loss().is_none() {
            self.place_initial_stop(pos, &meta).await?;
        } else {
            for action in stops::evaluate_protected(pos, &meta, &self.config) {
                self.apply_stop_action(pos, action).await?;
            }
        }

        match overrides::resolve(&self.store, pos, &meta).await? {
            OverrideAction::None => {}
            OverrideAction::PartialClose(volume) => {
                self.broker.partial_close(pos.ticket, volume).await?;
                info!(
                    ticket = pos.ticket,
                    symbol = %pos.symbol,
                    volume = %volume,
                    "Partial close requested by override signal"
                );
            }
            OverrideAction::FullClose => {
                self.broker.full_close(pos.ticket).await?;
                info!(
                    ticket = pos.ticket,
                    symbol = %pos.symbol,
                    "Full close requested by override signal"
                );
            }
        }
        Ok(())
    }

    /// Fetches candle history and sets the first protective stop. Thin
    /// history defers to the next cycle rather than escalating.
    async fn place_initial_stop(&self, pos: &Position, meta: &SymbolMetadata) -> Result<()> {
        let candles = self
            .broker
            .recent_candles(&pos.symbol, self.timeframe, self.config.candle_count)
            .await?;
        match stops::compute_initial_stop(&pos.symbol, &candles, pos.side, meta.price_digits) {
            Ok(stop_loss) => {
                self.apply_stop_action(pos, StopAction::SetInitial { stop_loss })
                    .await
            }
            Err(e) if e.is_validation() => {
                warn!(
                    ticket = pos.ticket,
                    symbol = %pos.symbol,
                    reason = %e,
                    "Deferring initial stop"
                );
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn apply_stop_action(&self, pos: &Position, action: StopAction) -> Result<()> {
        match action {
            StopAction::SetInitial { stop_loss } => {
                self.broker
                    .modify_stop(pos.ticket, stop_loss, pos.take_profit)
                    .await?;
                info!(
                    ticket = pos.ticket,
                    symbol = %pos.symbol,
                    stop_loss = %stop_loss,
                    "Initial stop placed"
                );
            }
            StopAction::Trail { stop_loss } => {
                self.broker
                    .modify_stop(pos.ticket, stop_loss, pos.take_profit)
                    .await?;
                info!(
                    ticket = pos.ticket,
                    symbol = %pos.symbol,
                    stop_loss = %stop_loss,
                    "Stop trailed"
                );
            }
            StopAction::MoveToBreakEven {
                stop_loss,
                partial_close,
            } => {
                self.broker
                    .modify_stop(pos.ticket, stop_loss, pos.take_profit)
                    .await?;
                info!(
                    ticket = pos.ticket,
                    symbol = %pos.symbol,
                    stop_loss = %stop_loss,
                    "Stop moved to break-even"
                );
                if let Some(volume) = partial_close {
                    self.broker.partial_close(pos.ticket, volume).await?;
                    info!(
                        ticket = pos.ticket,
                        symbol = %pos.symbol,
                        volume = %volume,
                        "Partial close at break-even"
                    );
                }
            }
        }
        Ok(())
    }

    /// Closes every open position, used during controlled shutdown.
    /// Individual failures do not stop the sweep; an aggregated error
    /// surfaces only after every position has been attempted.
    pub async fn close_all_positions(&self) -> Result<()> {
        let positions = self.broker.open_positions().await?;
        let total = positions.len();
        let mut failures = 0usize;
        for pos in positions {
            if let Err(e) = self.broker.full_close(pos.ticket).await {
                failures += 1;
                error!(
                    ticket = pos.ticket,
                    symbol = %pos.symbol,
                    error = %e,
                    "Failed to close position"
                );
            } else {
                info!(ticket = pos.ticket, symbol = %pos.symbol, "Position closed");
            }
        }
        if failures > 0 {
            bail!("failed to close {failures} of {total} open positions");
        }
        Ok(())
    }

    /// Accessor for callers that surface monitor status.
    #[must_use]
    pub fn config(&self) -> &RiskConfig {
        &self.config
    }
}

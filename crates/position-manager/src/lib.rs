//! Deterministic position-risk management.
//!
//! Runs as a long-lived service that:
//! - Polls the broker for open positions on a fixed interval
//! - Places volatility-based initial stops, locks in break-even, trails
//! - Consumes out-of-band override signals (partial/full close) exactly once
//! - Enforces account-wide guardrails before new trades are placed
//! - Halts position management for the day when the loss cap trips
//!
//! All rules are deterministic; the loop catches, logs, and continues past
//! any single bad position.

pub mod atr;
pub mod entry;
pub mod guardrails;
pub mod monitor;
pub mod overrides;
pub mod rounding;
pub mod sizing;
pub mod stops;

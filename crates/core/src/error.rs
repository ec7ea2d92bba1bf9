//! Error taxonomy for the position-risk manager.
//!
//! Split along the lines the monitor loop cares about: transient I/O is
//! logged and retried next cycle, validation failures skip one item for one
//! cycle, a lost optimistic-update race is a no-op, and configuration
//! errors are fatal before the loop starts.

use thiserror::Error;

/// Errors produced by the risk-manager core.
#[derive(Debug, Error)]
pub enum SentinelError {
    /// A broker or datastore call failed. Skip the item, retry next cycle.
    #[error("transient I/O failure: {0}")]
    Transient(String),

    /// Broker returned no metadata for the symbol.
    #[error("symbol metadata unavailable for {symbol}")]
    MetadataUnavailable {
        /// Symbol the metadata query was for.
        symbol: String,
    },

    /// Symbol metadata carried a zero tick size, tick value, or volume step.
    #[error("invalid metadata for {symbol}: {detail}")]
    InvalidMetadata {
        /// Affected symbol.
        symbol: String,
        /// Which field was unusable.
        detail: String,
    },

    /// Not enough candle history to compute volatility.
    #[error("insufficient candle history for {symbol}: have {have}, need {need}")]
    InsufficientHistory {
        /// Affected symbol.
        symbol: String,
        /// Candles actually returned.
        have: usize,
        /// Minimum required.
        need: usize,
    },

    /// A computed or supplied price/volume failed validation.
    #[error("invalid order field: {0}")]
    InvalidOrder(String),

    /// The override record was already handled when the write landed.
    /// Treated as success-no-op by the resolver, never escalated.
    #[error("override record {record_id} already handled")]
    AlreadyHandled {
        /// Record that lost the race.
        record_id: i64,
    },

    /// Malformed configuration. Fatal at startup, never raised mid-run.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl SentinelError {
    /// Creates a transient error from any displayable cause.
    pub fn transient(cause: impl std::fmt::Display) -> Self {
        Self::Transient(cause.to_string())
    }

    /// Creates a metadata-unavailable error.
    pub fn metadata_unavailable(symbol: impl Into<String>) -> Self {
        Self::MetadataUnavailable {
            symbol: symbol.into(),
        }
    }

    /// True if the item should simply be retried on the next cycle.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// True if the affected item should be skipped for this cycle only.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::MetadataUnavailable { .. }
                | Self::InvalidMetadata { .. }
                | Self::InsufficientHistory { .. }
                | Self::InvalidOrder(_)
        )
    }

    /// True if startup must abort. The monitor loop never exits on errors
    /// raised mid-run, so this is only meaningful before the loop begins.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

/// Result type alias for risk-manager operations.
pub type Result<T> = std::result::Result<T, SentinelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors_are_retryable_not_fatal() {
        let err = SentinelError::transient("connection reset");
        assert!(err.is_transient());
        assert!(!err.is_validation());
        assert!(!err.is_fatal());
    }

    #[test]
    fn metadata_and_history_errors_are_validation() {
        let err = SentinelError::metadata_unavailable("XAUUSD");
        assert!(err.is_validation());
        assert!(!err.is_fatal());

        let err = SentinelError::InsufficientHistory {
            symbol: "XAUUSD".to_string(),
            have: 9,
            need: 14,
        };
        assert!(err.is_validation());
        assert!(err.to_string().contains("have 9"));
    }

    #[test]
    fn already_handled_is_neither_validation_nor_fatal() {
        let err = SentinelError::AlreadyHandled { record_id: 42 };
        assert!(!err.is_validation());
        assert!(!err.is_transient());
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("42"));
    }

    #[test]
    fn configuration_errors_are_fatal() {
        let err = SentinelError::Configuration("poll_interval_secs must be positive".to_string());
        assert!(err.is_fatal());
    }
}

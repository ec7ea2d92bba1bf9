pub mod config;
pub mod config_loader;
pub mod error;
pub mod market;
pub mod position;
pub mod signal;
pub mod traits;

pub use config::RiskConfig;
pub use config_loader::ConfigLoader;
pub use error::{Result, SentinelError};
pub use market::{Candle, Quote, SymbolMetadata, Timeframe};
pub use position::{Deal, Position, ProtectionState, Side};
pub use signal::{OrderKind, OverrideKind, OverrideRecord, SignalDecision};
pub use traits::{Broker, SignalStore};

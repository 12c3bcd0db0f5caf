//! Core market snapshot abstractions

pub mod aggregator;
pub mod change;
pub mod config;
pub mod instrument;
pub mod log;
pub mod price;
pub mod resilience;
pub mod resolver;
pub mod snapshot;

// Re-export main types for cleaner imports
pub use aggregator::{Aggregator, SnapshotError};
pub use change::percent_change;
pub use instrument::{AssetClass, Instrument, QuoteSource};
pub use price::{CurrentPrices, PricePoint, PriceSeries, QuoteProvider};
pub use resilience::{Backoff, CallTimeout, ResilientProvider, RetryPolicy};
pub use snapshot::{FetchStatus, InstrumentMetrics, MarketSnapshot};

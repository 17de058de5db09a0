//! Top-of-Book Insights Service
//!
//! Consumes normalized level2 price-level updates for one instrument and,
//! once per fixed window, produces:
//! - Best bid / best ask with the quantities quoted at them
//! - Spread and mid-price
//! - Rolling mean mid-price over several trailing horizons
//! - The largest spread seen since start
//!
//! # Architecture
//!
//! ```text
//!   level2 feed (raw JSON)
//!          │
//!    ┌─────▼─────┐
//!    │Normalizer │  ← l2update → PriceLevelUpdate
//!    └─────┬─────┘
//!          │  ingestion channel
//!    ┌─────▼─────┐
//!    │ Batcher   │  ← one batch per window interval
//!    └─────┬─────┘
//!    ┌─────▼─────┐
//!    │Aggregator │  ← BatchSummary
//!    └─────┬─────┘
//!    ┌─────▼─────┐
//!    │ Series    │  ← rolling means, running max spread
//!    └─────┬─────┘
//!    ┌─────▼─────┐
//!    │ Reporter  │  ← Insight
//!    └───────────┘
//! ```

pub mod aggregator;
pub mod batcher;
pub mod config;
pub mod engine;
pub mod error;
pub mod ingestion;
pub mod insight;
pub mod metrics;
pub mod normalizer;
pub mod reporter;
pub mod series;
pub mod shutdown;

pub use aggregator::{summarize, BatchSummary};
pub use config::InsightsConfig;
pub use engine::{EngineReport, EngineState, InsightEngine};
pub use error::InsightsError;
pub use ingestion::{ingestion_channel, IngestionReceiver, IngestionSender};
pub use insight::{Insight, RollingMean};
pub use normalizer::FeedNormalizer;
pub use reporter::{LogReporter, Reporter};
pub use series::{RetentionPolicy, RollingSeries};
pub use shutdown::{stop_channel, StopHandle, StopSignal};

// Library version
pub const SERVICE_VERSION: &str = "0.1.0";

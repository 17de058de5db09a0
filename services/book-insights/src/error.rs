//! Crate-level error type

use thiserror::Error;
use types::errors::TypesError;

use crate::aggregator::AggregationError;
use crate::config::ConfigError;
use crate::ingestion::IngestError;
use crate::normalizer::NormalizeError;
use crate::reporter::ReportError;
use crate::series::SeriesError;

#[derive(Debug, Error)]
pub enum InsightsError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Aggregation(#[from] AggregationError),

    #[error(transparent)]
    Series(#[from] SeriesError),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error(transparent)]
    Types(#[from] TypesError),
}

pub type Result<T> = std::result::Result<T, InsightsError>;

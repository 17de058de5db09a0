//! Types library for the top-of-book insights pipeline
//!
//! Provides the core type definitions shared by the feed normalizer and the
//! windowing/aggregation engine. All prices and quantities are decimal, never
//! floating point.
//!
//! # Modules
//! - `ids`: Instrument identifiers (ProductId)
//! - `numeric`: Decimal newtypes (Price, Quantity)
//! - `level`: Book side and normalized price-level updates
//! - `time`: Unix-nanosecond timestamp helpers
//! - `errors`: Error taxonomy

// Public modules
pub mod ids;
pub mod numeric;
pub mod level;
pub mod time;
pub mod errors;

// Library version constant
pub const LIB_VERSION: &str = "1.0.0";

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::ids::*;
    pub use crate::numeric::*;
    pub use crate::level::*;
    pub use crate::time::*;
    pub use crate::errors::*;
}

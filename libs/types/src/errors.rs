//! Error types for the shared type definitions
//!
//! Construction of every validated type goes through these errors, so a
//! `Price` or `Quantity` that exists is always within its invariants.

use thiserror::Error;

/// Validation errors raised when constructing core types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TypesError {
    #[error("Invalid price: {0} (must be > 0)")]
    InvalidPrice(String),

    #[error("Invalid quantity: {0} (must be >= 0)")]
    InvalidQuantity(String),

    #[error("Invalid decimal literal: {0}")]
    InvalidDecimal(String),

    #[error("Invalid side: {0}")]
    InvalidSide(String),

    #[error("Invalid product id: {0}")]
    InvalidProductId(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

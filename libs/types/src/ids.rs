//! Instrument identifier types
//!
//! The pipeline follows exactly one instrument. Product ids use the
//! `BASE-QUOTE` form of the upstream feed (e.g. `BTC-USD`).

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::TypesError;

/// Identifier of the traded instrument, always upper case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProductId(String);

impl ProductId {
    /// Create a ProductId, normalizing to upper case.
    ///
    /// Fails unless the symbol is `BASE-QUOTE` with both parts non-empty.
    pub fn new(symbol: impl AsRef<str>) -> Result<Self, TypesError> {
        let s = symbol.as_ref().trim().to_uppercase();
        match s.split_once('-') {
            Some((base, quote))
                if !base.is_empty() && !quote.is_empty() && !quote.contains('-') =>
            {
                Ok(Self(s))
            }
            _ => Err(TypesError::InvalidProductId(symbol.as_ref().to_string())),
        }
    }

    /// The default instrument of the live feed.
    pub fn btc_usd() -> Self {
        Self("BTC-USD".to_string())
    }

    /// Get the symbol string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split into base and quote assets
    pub fn split(&self) -> (&str, &str) {
        // Validated on construction
        self.0.split_once('-').unwrap_or((&self.0, ""))
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for ProductId {
    type Error = TypesError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ProductId> for String {
    fn from(id: ProductId) -> Self {
        id.0
    }
}

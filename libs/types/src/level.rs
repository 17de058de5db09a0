//! Normalized price-level updates
//!
//! A `PriceLevelUpdate` is the only input the aggregation engine accepts.
//! The normalizer guarantees well-formed values; the engine never re-validates.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::TypesError;
use crate::numeric::{Price, Quantity};
use crate::time::UnixNanos;

/// Book side of a price level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Resting buy interest
    Bid,
    /// Resting sell interest
    Ask,
}

impl Side {
    /// Get the opposite side
    pub fn opposite(&self) -> Self {
        match self {
            Side::Bid => Side::Ask,
            Side::Ask => Side::Bid,
        }
    }

    /// Whether `candidate` is a better price than `incumbent` on this side.
    ///
    /// Higher is better for bids, lower is better for asks.
    pub fn is_better(&self, candidate: Price, incumbent: Price) -> bool {
        match self {
            Side::Bid => candidate > incumbent,
            Side::Ask => candidate < incumbent,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Bid => "bid",
            Side::Ask => "ask",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = TypesError;

    /// Accepts both book terms (`bid`/`ask`) and order terms (`buy`/`sell`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bid" | "buy" => Ok(Side::Bid),
            "ask" | "sell" => Ok(Side::Ask),
            _ => Err(TypesError::InvalidSide(s.to_string())),
        }
    }
}

/// One change to one price level, as emitted by the feed normalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PriceLevelUpdate {
    /// Feed timestamp in Unix nanoseconds. Not guaranteed monotonic.
    pub timestamp: UnixNanos,
    pub side: Side,
    pub price: Price,
    /// New size at the level; zero removes the level.
    pub quantity: Quantity,
}

impl PriceLevelUpdate {
    pub fn new(timestamp: UnixNanos, side: Side, price: Price, quantity: Quantity) -> Self {
        Self {
            timestamp,
            side,
            price,
            quantity,
        }
    }

    /// Whether this update removes the level and carries no tradable size.
    pub fn is_removal(&self) -> bool {
        self.quantity.is_zero()
    }
}

//! Batch aggregator
//!
//! Reduces one window's updates into a `BatchSummary`: best bid (highest
//! price), best ask (lowest price), the quantities of every update tied at
//! each best price, and the spread and mid-price derived from them.
//!
//! All arithmetic is checked `Decimal`; an overflow is reported, never
//! wrapped. Zero-quantity updates are level removals and carry no tradable
//! size, so they never become a best price.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use types::level::{PriceLevelUpdate, Side};
use types::numeric::{Price, Quantity};
use types::time::UnixNanos;

/// Errors raised while summarizing a batch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AggregationError {
    #[error("arithmetic overflow computing {operation} for window {window_start}")]
    ArithmeticOverflow {
        window_start: UnixNanos,
        operation: &'static str,
    },
}

/// Top-of-book statistics for one window.
///
/// Every optional field is `None` when the side(s) it depends on had no
/// eligible update in the window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub window_start: UnixNanos,
    pub best_bid: Option<Price>,
    /// Quantities of all bid updates at `best_bid`, in arrival order.
    pub best_bid_qty: Vec<Quantity>,
    pub best_ask: Option<Price>,
    /// Quantities of all ask updates at `best_ask`, in arrival order.
    pub best_ask_qty: Vec<Quantity>,
    /// `|best_ask - best_bid|`, never negative even on a crossed book.
    pub spread: Option<Decimal>,
    pub mid_price: Option<Decimal>,
    /// Updates in the window, removals included.
    pub update_count: usize,
    /// Zero-quantity updates excluded from aggregation.
    pub removal_count: usize,
}

impl BatchSummary {
    /// Summary of a window with no updates.
    pub fn empty(window_start: UnixNanos) -> Self {
        Self {
            window_start,
            best_bid: None,
            best_bid_qty: Vec::new(),
            best_ask: None,
            best_ask_qty: Vec::new(),
            spread: None,
            mid_price: None,
            update_count: 0,
            removal_count: 0,
        }
    }

    /// Best price for a side.
    pub fn best(&self, side: Side) -> Option<Price> {
        match side {
            Side::Bid => self.best_bid,
            Side::Ask => self.best_ask,
        }
    }

    /// Quantities tied at the best price for a side.
    pub fn best_qty(&self, side: Side) -> &[Quantity] {
        match side {
            Side::Bid => &self.best_bid_qty,
            Side::Ask => &self.best_ask_qty,
        }
    }

    /// Whether both sides produced a best price.
    pub fn is_two_sided(&self) -> bool {
        self.best_bid.is_some() && self.best_ask.is_some()
    }

    /// Whether the best bid is above the best ask.
    pub fn is_crossed(&self) -> bool {
        matches!((self.best_bid, self.best_ask), (Some(bid), Some(ask)) if bid > ask)
    }
}

/// Running extremum for one side during a single pass.
#[derive(Debug)]
struct SideExtremum {
    side: Side,
    best: Option<Price>,
    quantities: Vec<Quantity>,
}

impl SideExtremum {
    fn new(side: Side) -> Self {
        Self {
            side,
            best: None,
            quantities: Vec::new(),
        }
    }

    fn observe(&mut self, price: Price, quantity: Quantity) {
        match self.best {
            Some(best) if price == best => self.quantities.push(quantity),
            Some(best) if !self.side.is_better(price, best) => {}
            _ => {
                self.best = Some(price);
                self.quantities.clear();
                self.quantities.push(quantity);
            }
        }
    }
}

/// Summarize one window's updates.
///
/// Pure: the same input always yields an identical summary. Updates may
/// arrive in any timestamp order.
pub fn summarize(
    updates: &[PriceLevelUpdate],
    window_start: UnixNanos,
) -> Result<BatchSummary, AggregationError> {
    let mut bids = SideExtremum::new(Side::Bid);
    let mut asks = SideExtremum::new(Side::Ask);
    let mut removal_count = 0;

    for update in updates {
        if update.is_removal() {
            removal_count += 1;
            continue;
        }
        match update.side {
            Side::Bid => bids.observe(update.price, update.quantity),
            Side::Ask => asks.observe(update.price, update.quantity),
        }
    }

    let (spread, mid_price) = match (bids.best, asks.best) {
        (Some(bid), Some(ask)) => {
            let (spread, mid) = spread_and_mid(bid, ask, window_start)?;
            (Some(spread), Some(mid))
        }
        _ => (None, None),
    };

    Ok(BatchSummary {
        window_start,
        best_bid: bids.best,
        best_bid_qty: bids.quantities,
        best_ask: asks.best,
        best_ask_qty: asks.quantities,
        spread,
        mid_price,
        update_count: updates.len(),
        removal_count,
    })
}

fn spread_and_mid(
    bid: Price,
    ask: Price,
    window_start: UnixNanos,
) -> Result<(Decimal, Decimal), AggregationError> {
    let (bid, ask) = (bid.as_decimal(), ask.as_decimal());

    let spread = ask
        .checked_sub(bid)
        .map(|diff| diff.abs())
        .ok_or(AggregationError::ArithmeticOverflow {
            window_start,
            operation: "spread",
        })?;

    let mid = bid
        .checked_add(ask)
        .and_then(|sum| sum.checked_div(Decimal::TWO))
        .ok_or(AggregationError::ArithmeticOverflow {
            window_start,
            operation: "mid_price",
        })?;

    Ok((spread, mid))
}

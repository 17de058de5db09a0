//! Per-window insight records
//!
//! An `Insight` combines the latest `BatchSummary` with the rolling
//! mid-price means for every configured horizon and the running maximum
//! spread. One is built per completed window and handed to a reporter.

use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use types::ids::ProductId;
use types::time::UnixNanos;

use crate::aggregator::BatchSummary;
use crate::series::RollingSeries;

/// Mean mid-price over one trailing horizon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollingMean {
    pub horizon: Duration,
    pub mean_mid_price: Option<Decimal>,
}

/// Point-in-time report for one window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insight {
    pub product_id: ProductId,
    pub summary: BatchSummary,
    /// One entry per configured horizon, in configuration order.
    pub rolling_mid_prices: Vec<RollingMean>,
    /// Largest spread observed since the engine started.
    pub running_max_spread: Option<Decimal>,
}

impl Insight {
    /// Build the insight for `summary`, which must already be appended to
    /// `series`. Rolling means are taken as of the summary's window start.
    pub fn build(
        product_id: ProductId,
        summary: BatchSummary,
        series: &mut RollingSeries,
        horizons: &[Duration],
    ) -> Self {
        let as_of = summary.window_start;
        let rolling_mid_prices = horizons
            .iter()
            .map(|&horizon| RollingMean {
                horizon,
                mean_mid_price: series.rolling_mean_mid_price(horizon, as_of),
            })
            .collect();

        Self {
            product_id,
            summary,
            rolling_mid_prices,
            running_max_spread: series.running_max_spread(),
        }
    }

    pub fn window_start(&self) -> UnixNanos {
        self.summary.window_start
    }

    /// Rolling mean for a horizon, if that horizon is configured and has data.
    pub fn avg_mid_price(&self, horizon: Duration) -> Option<Decimal> {
        self.rolling_mid_prices
            .iter()
            .find(|m| m.horizon == horizon)
            .and_then(|m| m.mean_mid_price)
    }
}

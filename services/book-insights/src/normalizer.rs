//! Coinbase level2 feed normalization
//!
//! Turns raw `level2_batch` websocket messages into `PriceLevelUpdate`s.
//! Only `l2update` messages for the configured product produce updates;
//! subscriptions acks, snapshots, heartbeats and other products are
//! discarded without error. The transport itself lives outside this crate.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use types::errors::TypesError;
use types::ids::ProductId;
use types::level::{PriceLevelUpdate, Side};
use types::numeric::{Price, Quantity};
use types::time::parse_rfc3339_nanos;

/// Public sandbox endpoint of the upstream feed.
pub const SANDBOX_FEED_URL: &str = "wss://ws-feed-public.sandbox.exchange.coinbase.com";

/// Products the pipeline accepts.
pub const SUPPORTED_PRODUCTS: &[&str] = &["BTC-USD"];

/// Upstream channel carrying aggregated level2 changes.
pub const LEVEL2_CHANNEL: &str = "level2_batch";

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("Malformed feed message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed change #{index}: {source}")]
    Change {
        index: usize,
        #[source]
        source: TypesError,
    },

    #[error("Malformed message time: {0}")]
    Time(TypesError),
}

/// Upper-case `raw` and check it against `SUPPORTED_PRODUCTS`.
pub fn validate_product_id(raw: &str) -> Result<ProductId, TypesError> {
    let product_id = ProductId::new(raw)?;
    if SUPPORTED_PRODUCTS.contains(&product_id.as_str()) {
        Ok(product_id)
    } else {
        Err(TypesError::InvalidProductId(format!(
            "{} (supported: {})",
            product_id,
            SUPPORTED_PRODUCTS.join(", ")
        )))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscribeMessage {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub product_ids: Vec<ProductId>,
    pub channels: Vec<&'static str>,
}

impl SubscribeMessage {
    pub fn level2_batch(product_id: &ProductId) -> Self {
        Self {
            kind: "subscribe",
            product_ids: vec![product_id.clone()],
            channels: vec![LEVEL2_CHANNEL],
        }
    }
}

/// JSON text of the level2_batch subscription for `product_id`.
pub fn subscribe_message(product_id: &ProductId) -> Result<String, serde_json::Error> {
    serde_json::to_string(&SubscribeMessage::level2_batch(product_id))
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum FeedMessage {
    #[serde(rename = "l2update")]
    L2update(L2Update),
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct L2Update {
    product_id: String,
    time: String,
    /// `[side, price, size]` triples
    changes: Vec<(String, Option<String>, String)>,
}

/// Stateless parser bound to one product.
#[derive(Debug, Clone)]
pub struct FeedNormalizer {
    product_id: ProductId,
}

impl FeedNormalizer {
    pub fn new(product_id: ProductId) -> Self {
        Self { product_id }
    }

    pub fn product_id(&self) -> &ProductId {
        &self.product_id
    }

    /// Parse one raw message.
    ///
    /// Every change is converted, zero sizes included (they mark a level
    /// removal). Changes without a price are dropped.
    pub fn normalize(&self, raw: &str) -> Result<Vec<PriceLevelUpdate>, NormalizeError> {
        let update = match serde_json::from_str::<FeedMessage>(raw)? {
            FeedMessage::L2update(update) => update,
            FeedMessage::Other => return Ok(Vec::new()),
        };

        if !update.product_id.eq_ignore_ascii_case(self.product_id.as_str()) {
            debug!(product = %update.product_id, "Ignoring update for other product");
            return Ok(Vec::new());
        }

        let timestamp = parse_rfc3339_nanos(&update.time).map_err(NormalizeError::Time)?;

        let mut updates = Vec::with_capacity(update.changes.len());
        for (index, (side, price, size)) in update.changes.iter().enumerate() {
            let Some(price) = price else {
                debug!(index, "Dropping change without price");
                continue;
            };
            let change = |source: TypesError| NormalizeError::Change { index, source };
            let side = Side::from_str(side).map_err(change)?;
            let price = Price::from_str(price).map_err(change)?;
            let quantity = Quantity::from_str(size).map_err(change)?;
            updates.push(PriceLevelUpdate::new(timestamp, side, price, quantity));
        }
        Ok(updates)
    }
}

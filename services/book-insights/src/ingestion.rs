//! Ingestion channel between the feed listener and the window batcher
//!
//! An ordered single-producer/single-consumer conduit of normalized
//! `PriceLevelUpdate`s. Unbounded by default so a slow consumer never stalls
//! the feed reader; a large bound can be configured instead, in which case
//! the producer awaits capacity rather than dropping updates.

use tokio::sync::mpsc;
use tracing::{debug, info};
use types::level::PriceLevelUpdate;

/// Errors that can occur when pushing onto or polling the channel.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IngestError {
    #[error("ingestion channel closed")]
    ChannelClosed,

    #[error("ingestion channel full: capacity {capacity}")]
    ChannelFull { capacity: usize },

    #[error("ingestion channel capacity must be greater than zero")]
    ZeroCapacity,
}

/// Create a connected sender/receiver pair.
///
/// `capacity` of `None` gives an unbounded channel. A bound of zero is
/// rejected with `ZeroCapacity`.
pub fn ingestion_channel(
    capacity: Option<usize>,
) -> Result<(IngestionSender, IngestionReceiver), IngestError> {
    match capacity {
        None => {
            let (tx, rx) = mpsc::unbounded_channel();
            info!("Ingestion channel initialized (unbounded)");
            Ok((
                IngestionSender::Unbounded(tx),
                IngestionReceiver::Unbounded(rx),
            ))
        }
        Some(0) => Err(IngestError::ZeroCapacity),
        Some(capacity) => {
            let (tx, rx) = mpsc::channel(capacity);
            info!(capacity, "Ingestion channel initialized (bounded)");
            Ok((
                IngestionSender::Bounded { tx, capacity },
                IngestionReceiver::Bounded(rx),
            ))
        }
    }
}

/// Producer half, held by the feed listener.
#[derive(Debug, Clone)]
pub enum IngestionSender {
    Unbounded(mpsc::UnboundedSender<PriceLevelUpdate>),
    Bounded {
        tx: mpsc::Sender<PriceLevelUpdate>,
        capacity: usize,
    },
}

impl IngestionSender {
    /// Push an update, waiting for capacity on a bounded channel.
    pub async fn push(&self, update: PriceLevelUpdate) -> Result<(), IngestError> {
        match self {
            IngestionSender::Unbounded(tx) => {
                tx.send(update).map_err(|_| IngestError::ChannelClosed)
            }
            IngestionSender::Bounded { tx, .. } => {
                tx.send(update).await.map_err(|_| IngestError::ChannelClosed)
            }
        }
    }

    /// Push without waiting. Fails with `ChannelFull` on a saturated bounded channel.
    pub fn try_push(&self, update: PriceLevelUpdate) -> Result<(), IngestError> {
        match self {
            IngestionSender::Unbounded(tx) => {
                tx.send(update).map_err(|_| IngestError::ChannelClosed)
            }
            IngestionSender::Bounded { tx, capacity } => tx.try_send(update).map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => {
                    debug!(capacity = *capacity, "Ingestion channel full");
                    IngestError::ChannelFull {
                        capacity: *capacity,
                    }
                }
                mpsc::error::TrySendError::Closed(_) => IngestError::ChannelClosed,
            }),
        }
    }

    /// Whether the consumer has gone away.
    pub fn is_closed(&self) -> bool {
        match self {
            IngestionSender::Unbounded(tx) => tx.is_closed(),
            IngestionSender::Bounded { tx, .. } => tx.is_closed(),
        }
    }
}

/// Consumer half, owned by the window batcher.
#[derive(Debug)]
pub enum IngestionReceiver {
    Unbounded(mpsc::UnboundedReceiver<PriceLevelUpdate>),
    Bounded(mpsc::Receiver<PriceLevelUpdate>),
}

impl IngestionReceiver {
    /// Wait for the next update. `None` once every sender is dropped and
    /// the buffer is drained.
    pub async fn recv(&mut self) -> Option<PriceLevelUpdate> {
        match self {
            IngestionReceiver::Unbounded(rx) => rx.recv().await,
            IngestionReceiver::Bounded(rx) => rx.recv().await,
        }
    }

    /// Poll without waiting.
    ///
    /// `Ok(None)` means nothing is queued right now; `Err(ChannelClosed)`
    /// means nothing ever will be.
    pub fn try_recv(&mut self) -> Result<Option<PriceLevelUpdate>, IngestError> {
        let result = match self {
            IngestionReceiver::Unbounded(rx) => rx.try_recv(),
            IngestionReceiver::Bounded(rx) => rx.try_recv(),
        };
        match result {
            Ok(update) => Ok(Some(update)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => Err(IngestError::ChannelClosed),
        }
    }

    /// Number of updates waiting in the buffer.
    pub fn len(&self) -> usize {
        match self {
            IngestionReceiver::Unbounded(rx) => rx.len(),
            IngestionReceiver::Bounded(rx) => rx.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

//! Window batcher
//!
//! Collects every update that arrives within one fixed wall-clock interval.
//! The wait is a deadline-bound receive on the ingestion channel, so an idle
//! feed costs nothing and a window never overruns its deadline.

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;
use types::level::PriceLevelUpdate;
use types::time::{duration_to_nanos, now_nanos, UnixNanos};

use crate::ingestion::IngestionReceiver;
use crate::shutdown::StopSignal;

/// Updates collected during one window, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    window_start: UnixNanos,
    updates: Vec<PriceLevelUpdate>,
}

impl Batch {
    pub fn new(window_start: UnixNanos) -> Self {
        Self {
            window_start,
            updates: Vec::new(),
        }
    }

    /// Build a batch from already collected updates.
    pub fn from_updates(window_start: UnixNanos, updates: Vec<PriceLevelUpdate>) -> Self {
        Self {
            window_start,
            updates,
        }
    }

    pub fn push(&mut self, update: PriceLevelUpdate) {
        self.updates.push(update);
    }

    pub fn window_start(&self) -> UnixNanos {
        self.window_start
    }

    pub fn updates(&self) -> &[PriceLevelUpdate] {
        &self.updates
    }

    pub fn len(&self) -> usize {
        self.updates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }
}

/// Why a window ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowOutcome {
    /// Interval ran out; more windows follow.
    Elapsed,
    /// Producer terminated mid-window; this is the last window.
    ChannelClosed,
    /// Stop requested; queued updates were flushed into this last window.
    Stopped,
}

impl WindowOutcome {
    /// Whether no further windows will be produced.
    pub fn is_final(&self) -> bool {
        !matches!(self, WindowOutcome::Elapsed)
    }
}

/// A finished window handed to the aggregator.
#[derive(Debug, Clone)]
pub struct CollectedWindow {
    pub batch: Batch,
    pub outcome: WindowOutcome,
}

/// Wall clock used to stamp `window_start`.
///
/// Anchored to the system clock once and advanced with the runtime's
/// monotonic clock afterwards, so successive windows never go backwards
/// even if the system clock is stepped.
#[derive(Debug, Clone, Copy)]
pub struct WindowClock {
    anchor_nanos: UnixNanos,
    anchor_instant: Instant,
}

impl WindowClock {
    /// Anchor at the current system time.
    pub fn system() -> Self {
        Self::starting_at(now_nanos())
    }

    /// Anchor at an explicit timestamp.
    pub fn starting_at(anchor_nanos: UnixNanos) -> Self {
        Self {
            anchor_nanos,
            anchor_instant: Instant::now(),
        }
    }

    pub fn now_nanos(&self) -> UnixNanos {
        let elapsed = duration_to_nanos(self.anchor_instant.elapsed());
        self.anchor_nanos.saturating_add(elapsed)
    }
}

impl Default for WindowClock {
    fn default() -> Self {
        Self::system()
    }
}

/// Drains the ingestion channel one fixed interval at a time.
pub struct WindowBatcher {
    receiver: IngestionReceiver,
    stop: StopSignal,
    clock: WindowClock,
    finished: bool,
}

impl WindowBatcher {
    pub fn new(receiver: IngestionReceiver, stop: StopSignal, clock: WindowClock) -> Self {
        Self {
            receiver,
            stop,
            clock,
            finished: false,
        }
    }

    pub fn with_clock(mut self, clock: WindowClock) -> Self {
        self.clock = clock;
        self
    }

    /// Whether a final window has already been returned.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Collect one window of `interval` starting now.
    ///
    /// Returns when the interval elapses, the channel closes, or a stop is
    /// requested, whichever comes first. A partial or empty batch is valid.
    /// After a final window every further call returns an empty final
    /// window immediately.
    pub async fn collect(&mut self, interval: Duration) -> CollectedWindow {
        let window_start = self.clock.now_nanos();
        let deadline = Instant::now() + interval;
        let mut batch = Batch::new(window_start);

        if self.finished {
            return CollectedWindow {
                batch,
                outcome: WindowOutcome::ChannelClosed,
            };
        }

        let outcome = loop {
            if self.stop.is_stopped() {
                break self.flush_queued(&mut batch);
            }

            tokio::select! {
                biased;
                _ = self.stop.stopped() => {
                    break self.flush_queued(&mut batch);
                }
                received = tokio::time::timeout_at(deadline, self.receiver.recv()) => {
                    match received {
                        Ok(Some(update)) => batch.push(update),
                        Ok(None) => break WindowOutcome::ChannelClosed,
                        Err(_) => break WindowOutcome::Elapsed,
                    }
                }
            }
        };

        if outcome.is_final() {
            self.finished = true;
        }

        debug!(
            window_start,
            updates = batch.len(),
            outcome = ?outcome,
            "Window collected"
        );

        CollectedWindow { batch, outcome }
    }

    /// Move everything already queued into the batch without waiting.
    fn flush_queued(&mut self, batch: &mut Batch) -> WindowOutcome {
        loop {
            match self.receiver.try_recv() {
                Ok(Some(update)) => batch.push(update),
                Ok(None) | Err(_) => break,
            }
        }
        WindowOutcome::Stopped
    }
}

//! Insight engine: orchestration loop
//!
//! Drives batcher → aggregator → series → reporter, one window at a time:
//!
//! ```text
//! Idle ──start──▶ Windowing ──interval elapsed──▶ Reporting ──▶ Windowing
//!                     │
//!                     └──channel closed / stop──▶ Draining ──▶ Stopped
//! ```
//!
//! Per-window problems (overflow, reporter failure) are logged and counted;
//! only a closed channel or a stop request ends the loop.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, warn};
use types::time::UnixNanos;

use crate::aggregator::summarize;
use crate::batcher::{Batch, WindowBatcher, WindowClock, WindowOutcome};
use crate::config::InsightsConfig;
use crate::error::InsightsError;
use crate::ingestion::IngestionReceiver;
use crate::insight::Insight;
use crate::metrics::PipelineMetrics;
use crate::reporter::Reporter;
use crate::series::RollingSeries;
use crate::shutdown::StopSignal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Windowing,
    Reporting,
    Draining,
    Stopped,
}

/// Summary returned when `run` finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineReport {
    pub final_state: EngineState,
    /// Why the last window ended.
    pub last_outcome: Option<WindowOutcome>,
    pub windows_emitted: u64,
    pub empty_windows: u64,
    pub windows_skipped: u64,
    pub reporter_failures: u64,
    pub updates_received: u64,
    pub last_window_start: Option<UnixNanos>,
}

pub struct InsightEngine {
    config: InsightsConfig,
    batcher: WindowBatcher,
    series: RollingSeries,
    metrics: Arc<PipelineMetrics>,
    state: EngineState,
    last_outcome: Option<WindowOutcome>,
}

impl InsightEngine {
    /// Validate `config` and build an idle engine reading from `receiver`.
    pub fn new(
        config: InsightsConfig,
        receiver: IngestionReceiver,
        stop: StopSignal,
    ) -> Result<Self, InsightsError> {
        config.validate()?;

        let series = RollingSeries::with_horizons(config.retention, &config.rolling_horizons);
        let batcher = WindowBatcher::new(receiver, stop, WindowClock::system());

        Ok(Self {
            config,
            batcher,
            series,
            metrics: Arc::new(PipelineMetrics::new()),
            state: EngineState::Idle,
            last_outcome: None,
        })
    }

    /// Use an existing series. Configured horizons are registered on it.
    pub fn with_series(mut self, mut series: RollingSeries) -> Self {
        for &horizon in &self.config.rolling_horizons {
            series.track_horizon(horizon);
        }
        self.series = series;
        self
    }

    /// Stamp windows with `clock` instead of the system clock.
    pub fn with_clock(mut self, clock: WindowClock) -> Self {
        self.batcher = self.batcher.with_clock(clock);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<PipelineMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn config(&self) -> &InsightsConfig {
        &self.config
    }

    pub fn metrics(&self) -> Arc<PipelineMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn series(&self) -> &RollingSeries {
        &self.series
    }

    /// Run until the channel closes or a stop is requested.
    ///
    /// Calling `run` again on a stopped engine returns the same report
    /// without collecting anything.
    pub async fn run<R>(&mut self, reporter: &mut R) -> EngineReport
    where
        R: Reporter + ?Sized,
    {
        if self.state == EngineState::Stopped {
            return self.report();
        }

        info!(
            product = %self.config.product_id,
            interval_ms = self.config.window_interval.as_millis() as u64,
            horizons = self.config.rolling_horizons.len(),
            "Insight engine started"
        );
        self.state = EngineState::Windowing;

        loop {
            let window = self.batcher.collect(self.config.window_interval).await;
            self.last_outcome = Some(window.outcome);

            if window.outcome.is_final() {
                self.state = EngineState::Draining;
                if !window.batch.is_empty() {
                    self.process_window(&window.batch, reporter);
                }
                break;
            }

            self.state = EngineState::Reporting;
            self.process_window(&window.batch, reporter);
            self.state = EngineState::Windowing;
        }

        self.state = EngineState::Stopped;
        let report = self.report();
        info!(
            outcome = ?report.last_outcome,
            windows = report.windows_emitted,
            skipped = report.windows_skipped,
            reporter_failures = report.reporter_failures,
            "Insight engine stopped"
        );
        report
    }

    /// Summarize one batch, record it and hand the insight to `reporter`.
    ///
    /// Returns `None` when the window had to be skipped.
    pub fn process_window<R>(&mut self, batch: &Batch, reporter: &mut R) -> Option<Insight>
    where
        R: Reporter + ?Sized,
    {
        let started = Instant::now();
        let window_start = batch.window_start();

        let summary = match summarize(batch.updates(), window_start) {
            Ok(summary) => summary,
            Err(e) => {
                error!(window_start, error = %e, "Skipping window");
                self.metrics.record_window_skipped();
                return None;
            }
        };
        self.metrics
            .record_batch(summary.update_count, summary.removal_count);

        if let Err(e) = self.series.append(summary.clone()) {
            error!(window_start, error = %e, "Skipping window");
            self.metrics.record_window_skipped();
            return None;
        }

        let insight = Insight::build(
            self.config.product_id.clone(),
            summary,
            &mut self.series,
            &self.config.rolling_horizons,
        );
        debug!(
            window_start,
            updates = insight.summary.update_count,
            two_sided = insight.summary.is_two_sided(),
            "Window summarized"
        );

        if let Err(e) = reporter.report(&insight) {
            warn!(window_start, error = %e, "Reporter failed");
            self.metrics.record_reporter_failure();
        }

        let elapsed_ns = u64::try_from(started.elapsed().as_nanos()).unwrap_or(u64::MAX);
        self.metrics.record_window_emitted(batch.is_empty(), elapsed_ns);
        Some(insight)
    }

    fn report(&self) -> EngineReport {
        let exported = self.metrics.export();
        let counter = |name: &str| exported.get(name).copied().unwrap_or(0);
        EngineReport {
            final_state: self.state,
            last_outcome: self.last_outcome,
            windows_emitted: counter("windows_emitted"),
            empty_windows: counter("empty_windows"),
            windows_skipped: counter("windows_skipped"),
            reporter_failures: counter("reporter_failures"),
            updates_received: counter("updates_received"),
            last_window_start: self.series.latest().map(|s| s.window_start),
        }
    }
}

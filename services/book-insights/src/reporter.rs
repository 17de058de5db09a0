//! Insight reporting sinks
//!
//! The engine hands every finished `Insight` to a `Reporter`. A failing
//! reporter never stops the pipeline; the engine logs and counts it.

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::info;

use crate::insight::Insight;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Reporter sink closed")]
    SinkClosed,

    #[error("Failed to encode insight: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Destination for per-window insights.
pub trait Reporter: Send {
    fn report(&mut self, insight: &Insight) -> Result<(), ReportError>;
}

impl<R: Reporter + ?Sized> Reporter for Box<R> {
    fn report(&mut self, insight: &Insight) -> Result<(), ReportError> {
        (**self).report(insight)
    }
}

/// Forward insights to another task.
impl Reporter for mpsc::UnboundedSender<Insight> {
    fn report(&mut self, insight: &Insight) -> Result<(), ReportError> {
        self.send(insight.clone()).map_err(|_| ReportError::SinkClosed)
    }
}

/// Emits each insight as a structured log line.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter {
    /// Also log the full insight as JSON.
    json: bool,
}

impl LogReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn json() -> Self {
        Self { json: true }
    }
}

fn or_na<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| v.to_string())
}

fn join_quantities<T: ToString>(quantities: &[T]) -> String {
    if quantities.is_empty() {
        return "n/a".to_string();
    }
    quantities
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

impl Reporter for LogReporter {
    fn report(&mut self, insight: &Insight) -> Result<(), ReportError> {
        let summary = &insight.summary;
        let rolling = insight
            .rolling_mid_prices
            .iter()
            .map(|m| format!("{}s={}", m.horizon.as_secs(), or_na(m.mean_mid_price)))
            .collect::<Vec<_>>()
            .join(" ");

        info!(
            product = %insight.product_id,
            window_start = %types::time::format_nanos(insight.window_start()),
            best_bid = %or_na(summary.best_bid),
            best_bid_qty = %join_quantities(&summary.best_bid_qty),
            best_ask = %or_na(summary.best_ask),
            best_ask_qty = %join_quantities(&summary.best_ask_qty),
            spread = %or_na(summary.spread),
            max_spread = %or_na(insight.running_max_spread),
            mid_price = %or_na(summary.mid_price),
            rolling_mid = %rolling,
            updates = summary.update_count,
            "Window insight"
        );

        if self.json {
            let encoded = serde_json::to_string(insight)?;
            info!(insight = %encoded, "Window insight json");
        }
        Ok(())
    }
}

/// Keeps every insight in memory.
#[derive(Debug, Default, Clone)]
pub struct CollectingReporter {
    insights: Vec<Insight>,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insights(&self) -> &[Insight] {
        &self.insights
    }
}

impl Reporter for CollectingReporter {
    fn report(&mut self, insight: &Insight) -> Result<(), ReportError> {
        self.insights.push(insight.clone());
        Ok(())
    }
}

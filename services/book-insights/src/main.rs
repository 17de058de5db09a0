use anyhow::Context;
use book_insights::config::InsightsConfig;
use book_insights::normalizer::{subscribe_message, SANDBOX_FEED_URL};
use book_insights::{ingestion_channel, stop_channel, FeedNormalizer, InsightEngine, LogReporter};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = InsightsConfig::from_env().context("loading INSIGHTS_* configuration")?;
    info!(
        product = %config.product_id,
        interval_ms = config.window_interval.as_millis() as u64,
        "Starting book insights service"
    );
    info!(
        feed = SANDBOX_FEED_URL,
        subscribe = %subscribe_message(&config.product_id)?,
        "Reading level2 messages from stdin"
    );

    let (tx, rx) = ingestion_channel(config.channel_capacity)?;
    let (stop, signal) = stop_channel();
    let normalizer = FeedNormalizer::new(config.product_id.clone());

    let mut engine = InsightEngine::new(config, rx, signal)?;
    let metrics = engine.metrics();
    let engine_task = tokio::spawn(async move {
        let mut reporter = LogReporter::new();
        engine.run(&mut reporter).await
    });

    // Sender is dropped at EOF, which drains the engine
    let reader_task = tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    error!(error = %e, "Failed to read stdin");
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            let updates = match normalizer.normalize(&line) {
                Ok(updates) => updates,
                Err(e) => {
                    warn!(error = %e, "Dropping malformed message");
                    continue;
                }
            };
            for update in updates {
                if tx.push(update).await.is_err() {
                    return;
                }
            }
        }
        info!("Input closed");
    });

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received CTRL+C, draining");
                stop.stop();
            }
            Err(e) => error!(error = %e, "Failed to listen for CTRL+C"),
        }
    });

    let report = engine_task.await.context("engine task failed")?;
    reader_task.abort();

    info!(
        windows = report.windows_emitted,
        empty = report.empty_windows,
        skipped = report.windows_skipped,
        updates = report.updates_received,
        "Book insights service stopped"
    );
    for (name, value) in metrics.export() {
        info!(metric = %name, value, "Final metric");
    }
    if let Some(p99_ns) = metrics.processing_p99_ns() {
        info!(p99_ns, "Window processing latency");
    }

    Ok(())
}

//! End-to-end pipeline tests
//!
//! Raw feed messages go through the normalizer, the ingestion channel and
//! the engine; insights are collected through an unbounded channel
//! reporter. Time is paused so window boundaries are deterministic.
//!
//! Tests include:
//! - Rolling means across several windows
//! - Empty windows during normal operation
//! - Drain on stop and on channel close
//! - Bounded ingestion channel
//! - Running max spread under retention

use std::str::FromStr;
use std::time::Duration;

use book_insights::batcher::{WindowClock, WindowOutcome};
use book_insights::{
    ingestion_channel, stop_channel, EngineState, FeedNormalizer, Insight, InsightEngine,
    InsightsConfig, RetentionPolicy, StopSignal,
};
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use types::ids::ProductId;
use types::level::{PriceLevelUpdate, Side};
use types::numeric::{Price, Quantity};

const SECOND: Duration = Duration::from_secs(1);

fn l2update(bid: u32, ask: u32) -> String {
    format!(
        r#"{{"type":"l2update","product_id":"BTC-USD","time":"2024-01-01T00:00:00Z","changes":[["buy","{bid}","1"],["sell","{ask}","2"]]}}"#
    )
}

fn update(side: Side, price: &str, qty: &str) -> PriceLevelUpdate {
    PriceLevelUpdate::new(
        0,
        side,
        Price::from_str(price).unwrap(),
        Quantity::from_str(qty).unwrap(),
    )
}

fn config() -> InsightsConfig {
    InsightsConfig::default()
        .with_window_interval(SECOND)
        .with_horizons(vec![5 * SECOND, 2 * SECOND])
}

fn drain(mut rx: mpsc::UnboundedReceiver<Insight>) -> Vec<Insight> {
    let mut insights = Vec::new();
    while let Ok(insight) = rx.try_recv() {
        insights.push(insight);
    }
    insights
}

#[tokio::test(start_paused = true)]
async fn test_rolling_means_across_windows() {
    let (tx, rx) = ingestion_channel(None).unwrap();
    let mut engine = InsightEngine::new(config(), rx, StopSignal::never())
        .unwrap()
        .with_clock(WindowClock::starting_at(0));
    let normalizer = FeedNormalizer::new(ProductId::btc_usd());

    // One two-sided quote per window, mid-prices 10..=14, pushed mid-window
    let producer = tokio::spawn(async move {
        tokio::time::sleep(SECOND / 2).await;
        for k in 0..5u32 {
            for u in normalizer.normalize(&l2update(9 + k, 11 + k)).unwrap() {
                tx.push(u).await.unwrap();
            }
            if k < 4 {
                tokio::time::sleep(SECOND).await;
            }
        }
    });

    let (mut insight_tx, insight_rx) = mpsc::unbounded_channel();
    let report = engine.run(&mut insight_tx).await;
    producer.await.unwrap();
    drop(insight_tx);
    let insights = drain(insight_rx);

    assert_eq!(report.final_state, EngineState::Stopped);
    assert_eq!(report.last_outcome, Some(WindowOutcome::ChannelClosed));
    assert_eq!(insights.len(), 5);

    let mids: Vec<Decimal> = insights.iter().filter_map(|i| i.summary.mid_price).collect();
    let expected: Vec<Decimal> = (10..=14).map(Decimal::from).collect();
    assert_eq!(mids, expected);

    let last = insights.last().unwrap();
    assert_eq!(last.avg_mid_price(5 * SECOND), Some(Decimal::from(12)));
    assert_eq!(
        last.avg_mid_price(2 * SECOND),
        Some(Decimal::from_str("13.5").unwrap())
    );
    assert_eq!(last.running_max_spread, Some(Decimal::from(2)));
    assert_eq!(last.summary.best_bid_qty, vec![Quantity::from_str("1").unwrap()]);
    assert_eq!(last.summary.best_ask_qty, vec![Quantity::from_str("2").unwrap()]);

    // window starts never go backwards
    assert!(insights
        .windows(2)
        .all(|w| w[0].window_start() < w[1].window_start()));
}

#[tokio::test(start_paused = true)]
async fn test_empty_windows_still_report() {
    let (_tx, rx) = ingestion_channel(None).unwrap();
    let (handle, signal) = stop_channel();
    let mut engine = InsightEngine::new(config(), rx, signal)
        .unwrap()
        .with_clock(WindowClock::starting_at(1_000));

    tokio::spawn(async move {
        tokio::time::sleep(SECOND * 5 / 2).await;
        handle.stop();
    });

    let (mut insight_tx, insight_rx) = mpsc::unbounded_channel();
    let report = engine.run(&mut insight_tx).await;
    drop(insight_tx);
    let insights = drain(insight_rx);

    // two elapsed windows; the stopped one is empty and not reported
    assert_eq!(insights.len(), 2);
    assert_eq!(report.windows_emitted, 2);
    assert_eq!(report.empty_windows, 2);
    assert_eq!(report.last_outcome, Some(WindowOutcome::Stopped));
    for insight in &insights {
        assert!(insight.window_start() >= 1_000);
        assert_eq!(insight.summary.best_bid, None);
        assert_eq!(insight.summary.best_ask, None);
        assert_eq!(insight.summary.spread, None);
        assert_eq!(insight.summary.mid_price, None);
        assert_eq!(insight.avg_mid_price(5 * SECOND), None);
        assert_eq!(insight.running_max_spread, None);
    }
}

#[tokio::test(start_paused = true)]
async fn test_stop_flushes_partial_window() {
    let (tx, rx) = ingestion_channel(None).unwrap();
    let (handle, signal) = stop_channel();
    let mut engine = InsightEngine::new(config(), rx, signal).unwrap();

    tokio::spawn(async move {
        tx.push(update(Side::Bid, "100", "1")).await.unwrap();
        tx.push(update(Side::Bid, "101", "2")).await.unwrap();
        tx.push(update(Side::Bid, "101", "3")).await.unwrap();
        tx.push(update(Side::Ask, "103", "5")).await.unwrap();
        tx.push(update(Side::Ask, "102", "4")).await.unwrap();
        tokio::time::sleep(SECOND / 4).await;
        handle.stop();
        tx
    });

    let (mut insight_tx, insight_rx) = mpsc::unbounded_channel();
    let report = engine.run(&mut insight_tx).await;
    drop(insight_tx);
    let insights = drain(insight_rx);

    assert_eq!(report.last_outcome, Some(WindowOutcome::Stopped));
    assert_eq!(insights.len(), 1);
    let summary = &insights[0].summary;
    assert_eq!(summary.best_bid, Some(Price::from_str("101").unwrap()));
    assert_eq!(
        summary.best_bid_qty,
        vec![Quantity::from_str("2").unwrap(), Quantity::from_str("3").unwrap()]
    );
    assert_eq!(summary.best_ask, Some(Price::from_str("102").unwrap()));
    assert_eq!(summary.best_ask_qty, vec![Quantity::from_str("4").unwrap()]);
    assert_eq!(summary.spread, Some(Decimal::ONE));
    assert_eq!(summary.mid_price, Some(Decimal::from_str("101.5").unwrap()));
    assert_eq!(report.updates_received, 5);
}

#[tokio::test(start_paused = true)]
async fn test_bounded_channel_delivers_everything() {
    let config = config().with_channel_capacity(Some(1));
    let (tx, rx) = ingestion_channel(config.channel_capacity).unwrap();
    let mut engine = InsightEngine::new(config, rx, StopSignal::never()).unwrap();

    let producer = tokio::spawn(async move {
        for price in ["100", "105", "103"] {
            tx.push(update(Side::Ask, price, "1")).await.unwrap();
        }
    });

    let (mut insight_tx, insight_rx) = mpsc::unbounded_channel();
    let report = engine.run(&mut insight_tx).await;
    producer.await.unwrap();
    drop(insight_tx);
    let insights = drain(insight_rx);

    assert_eq!(report.updates_received, 3);
    assert_eq!(insights.len(), 1);
    assert_eq!(insights[0].summary.best_ask, Some(Price::from_str("100").unwrap()));
    assert_eq!(insights[0].summary.update_count, 3);
}

#[tokio::test(start_paused = true)]
async fn test_removals_and_retention_keep_max_spread() {
    let config = config().with_retention(RetentionPolicy::MaxEntries(1));
    let (tx, rx) = ingestion_channel(None).unwrap();
    let mut engine = InsightEngine::new(config, rx, StopSignal::never())
        .unwrap()
        .with_clock(WindowClock::starting_at(0));

    let producer = tokio::spawn(async move {
        tokio::time::sleep(SECOND / 2).await;
        tx.push(update(Side::Bid, "95", "1")).await.unwrap();
        tx.push(update(Side::Ask, "100", "1")).await.unwrap();
        tokio::time::sleep(SECOND).await;
        tx.push(update(Side::Bid, "99", "1")).await.unwrap();
        tx.push(update(Side::Ask, "100", "1")).await.unwrap();
        // removal at a better price never becomes best
        tx.push(update(Side::Bid, "99.5", "0")).await.unwrap();
    });

    let (mut insight_tx, insight_rx) = mpsc::unbounded_channel();
    engine.run(&mut insight_tx).await;
    producer.await.unwrap();
    drop(insight_tx);
    let insights = drain(insight_rx);

    assert_eq!(insights.len(), 2);
    let last = &insights[1];
    assert_eq!(last.summary.best_bid, Some(Price::from_str("99").unwrap()));
    assert_eq!(last.summary.removal_count, 1);
    assert_eq!(last.summary.spread, Some(Decimal::ONE));
    assert_eq!(last.running_max_spread, Some(Decimal::from(5)));
    // only the latest window is retained
    assert_eq!(engine.series().len(), 1);
    assert_eq!(last.avg_mid_price(5 * SECOND), Some(Decimal::from_str("99.5").unwrap()));
}

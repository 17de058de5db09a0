//! Rolling series store
//!
//! Append-only sequence of `BatchSummary` ordered by `window_start`, with
//! trailing-window means of the mid-price.
//!
//! The window for a query at `as_of` over `h` is `(as_of - h, as_of]`.
//! Summaries without a mid-price are excluded from both sum and count.
//!
//! Registered horizons keep a two-pointer sliding window (running sum and
//! count) that only moves forward, so the per-window query is amortized
//! O(1). Anything else (unregistered horizon, `as_of` moving backwards)
//! falls back to a binary-searched scan. Both paths use exact decimal
//! arithmetic and return identical values.

use std::collections::VecDeque;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use types::time::{duration_to_nanos, UnixNanos};

use crate::aggregator::BatchSummary;

/// Errors raised by the series store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SeriesError {
    #[error("out-of-order append: last window_start={last}, received={received}")]
    OutOfOrder {
        last: UnixNanos,
        received: UnixNanos,
    },
}

/// How much history the store keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RetentionPolicy {
    /// Keep everything for the process lifetime.
    #[default]
    Unbounded,
    /// Keep at most this many summaries.
    MaxEntries(usize),
    /// Drop summaries at or before `latest.window_start - age`.
    MaxAge(Duration),
}

/// Sliding window state for one registered horizon.
///
/// `head..tail` are absolute indices (counting evicted entries) of the
/// summaries currently inside the window.
#[derive(Debug, Clone)]
struct HorizonTracker {
    window_nanos: i64,
    head: u64,
    tail: u64,
    sum: Decimal,
    count: u64,
    last_as_of: Option<UnixNanos>,
    /// `sum` overflowed or was rounded; rebuild from the window on next query.
    dirty: bool,
}

impl HorizonTracker {
    fn new(window_nanos: i64, start: u64) -> Self {
        Self {
            window_nanos,
            head: start,
            tail: start,
            sum: Decimal::ZERO,
            count: 0,
            last_as_of: None,
            dirty: false,
        }
    }

    fn can_advance_to(&self, as_of: UnixNanos) -> bool {
        self.last_as_of.map_or(true, |last| as_of >= last)
    }

    fn include(&mut self, mid: Option<Decimal>) {
        if let Some(mid) = mid {
            self.step(exact_add(self.sum, mid));
            self.count += 1;
        }
    }

    fn exclude(&mut self, mid: Option<Decimal>) {
        if let Some(mid) = mid {
            self.step(exact_sub(self.sum, mid));
            self.count -= 1;
            if self.count == 0 {
                self.sum = Decimal::ZERO;
                self.dirty = false;
            }
        }
    }

    fn step(&mut self, next: Option<(Decimal, bool)>) {
        match next {
            Some((sum, exact)) => {
                self.sum = sum;
                self.dirty |= !exact;
            }
            None => self.dirty = true,
        }
    }

    fn mean(&self) -> Option<Decimal> {
        if self.count == 0 {
            return None;
        }
        self.sum.normalize().checked_div(Decimal::from(self.count))
    }
}

/// Append-only, time-indexed store of window summaries.
#[derive(Debug, Clone)]
pub struct RollingSeries {
    entries: VecDeque<BatchSummary>,
    /// Number of summaries evicted from the front so far.
    evicted: u64,
    trackers: Vec<HorizonTracker>,
    retention: RetentionPolicy,
    /// Largest spread ever appended; unaffected by retention.
    max_spread: Option<Decimal>,
}

impl RollingSeries {
    pub fn new(retention: RetentionPolicy) -> Self {
        Self {
            entries: VecDeque::new(),
            evicted: 0,
            trackers: Vec::new(),
            retention,
            max_spread: None,
        }
    }

    /// Store with the given horizons already registered.
    pub fn with_horizons(retention: RetentionPolicy, horizons: &[Duration]) -> Self {
        let mut series = Self::new(retention);
        for &horizon in horizons {
            series.track_horizon(horizon);
        }
        series
    }

    /// Register a horizon for incremental maintenance. Idempotent.
    pub fn track_horizon(&mut self, horizon: Duration) {
        let window_nanos = duration_to_nanos(horizon);
        if self.trackers.iter().any(|t| t.window_nanos == window_nanos) {
            return;
        }
        self.trackers.push(HorizonTracker::new(window_nanos, self.evicted));
        debug!(horizon_ms = horizon.as_millis() as u64, "Tracking rolling horizon");
    }

    /// Append a summary. `window_start` must not go backwards.
    pub fn append(&mut self, summary: BatchSummary) -> Result<(), SeriesError> {
        if let Some(last) = self.entries.back() {
            if summary.window_start < last.window_start {
                return Err(SeriesError::OutOfOrder {
                    last: last.window_start,
                    received: summary.window_start,
                });
            }
        }

        if let Some(spread) = summary.spread {
            if self.max_spread.map_or(true, |max| spread > max) {
                self.max_spread = Some(spread);
            }
        }

        self.entries.push_back(summary);
        self.apply_retention();
        Ok(())
    }

    /// Mean mid-price over `(as_of - window, as_of]`.
    ///
    /// Uses the tracker for `window` when one is registered and `as_of`
    /// has not moved backwards; otherwise scans.
    pub fn rolling_mean_mid_price(&mut self, window: Duration, as_of: UnixNanos) -> Option<Decimal> {
        let window_nanos = duration_to_nanos(window);
        let tracked = self
            .trackers
            .iter()
            .position(|t| t.window_nanos == window_nanos && t.can_advance_to(as_of));

        match tracked {
            Some(idx) => self.advance_tracker(idx, as_of),
            None => self.scan_mean_mid_price(window, as_of),
        }
    }

    /// Mean mid-price by direct range scan, without touching tracker state.
    pub fn scan_mean_mid_price(&self, window: Duration, as_of: UnixNanos) -> Option<Decimal> {
        let lower = as_of.saturating_sub(duration_to_nanos(window));
        let start = self.entries.partition_point(|e| e.window_start <= lower);
        let end = self.entries.partition_point(|e| e.window_start <= as_of);
        if start >= end {
            return None;
        }

        let (sum, count) = sum_mid_prices(self.entries.range(start..end))?;
        if count == 0 {
            return None;
        }
        sum.normalize().checked_div(Decimal::from(count))
    }

    /// Largest spread seen since creation.
    pub fn running_max_spread(&self) -> Option<Decimal> {
        self.max_spread
    }

    /// Most recently appended summary.
    pub fn latest(&self) -> Option<&BatchSummary> {
        self.entries.back()
    }

    /// Retained summaries in append order.
    pub fn iter(&self) -> impl Iterator<Item = &BatchSummary> {
        self.entries.iter()
    }

    /// Number of retained summaries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Summaries appended since creation, including evicted ones.
    pub fn total_appended(&self) -> u64 {
        self.evicted + self.entries.len() as u64
    }

    pub fn retention(&self) -> RetentionPolicy {
        self.retention
    }

    fn advance_tracker(&mut self, idx: usize, as_of: UnixNanos) -> Option<Decimal> {
        let entries = &self.entries;
        let offset = self.evicted;
        let end = offset + entries.len() as u64;
        let tracker = &mut self.trackers[idx];
        let lower = as_of.saturating_sub(tracker.window_nanos);

        while tracker.tail < end {
            let entry = &entries[(tracker.tail - offset) as usize];
            if entry.window_start > as_of {
                break;
            }
            tracker.include(entry.mid_price);
            tracker.tail += 1;
        }

        while tracker.head < tracker.tail {
            let entry = &entries[(tracker.head - offset) as usize];
            if entry.window_start > lower {
                break;
            }
            tracker.exclude(entry.mid_price);
            tracker.head += 1;
        }

        tracker.last_as_of = Some(as_of);

        if tracker.dirty {
            // Rebuild from the retained range; the running sum is unusable.
            // Stays dirty while the window's own sum cannot be held exactly.
            let range = (tracker.head - offset) as usize..(tracker.tail - offset) as usize;
            match exact_sum_mid_prices(entries.range(range)) {
                Some((sum, count, exact)) => {
                    tracker.sum = sum;
                    tracker.count = count;
                    tracker.dirty = !exact;
                }
                None => {
                    warn!(
                        window_nanos = tracker.window_nanos,
                        as_of, "Rolling mean overflowed decimal range"
                    );
                    return None;
                }
            }
        }

        tracker.mean()
    }

    fn apply_retention(&mut self) {
        match self.retention {
            RetentionPolicy::Unbounded => {}
            RetentionPolicy::MaxEntries(max) => {
                while self.entries.len() > max {
                    self.evict_front();
                }
            }
            RetentionPolicy::MaxAge(age) => {
                let Some(latest) = self.entries.back().map(|e| e.window_start) else {
                    return;
                };
                let cutoff = latest.saturating_sub(duration_to_nanos(age));
                while self
                    .entries
                    .front()
                    .is_some_and(|front| front.window_start <= cutoff)
                {
                    self.evict_front();
                }
            }
        }
    }

    fn evict_front(&mut self) {
        let Some(entry) = self.entries.pop_front() else {
            return;
        };
        let idx = self.evicted;
        self.evicted += 1;

        for tracker in &mut self.trackers {
            if tracker.head <= idx {
                if idx < tracker.tail {
                    tracker.exclude(entry.mid_price);
                }
                tracker.head = idx + 1;
                tracker.tail = tracker.tail.max(idx + 1);
            }
        }
    }
}

impl Default for RollingSeries {
    fn default() -> Self {
        Self::new(RetentionPolicy::Unbounded)
    }
}

/// Sum and count of set mid-prices. `None` on decimal overflow.
fn sum_mid_prices<'a>(entries: impl Iterator<Item = &'a BatchSummary>) -> Option<(Decimal, u64)> {
    exact_sum_mid_prices(entries).map(|(sum, count, _)| (sum, count))
}

/// Like `sum_mid_prices`, also reporting whether no step was rounded.
fn exact_sum_mid_prices<'a>(
    entries: impl Iterator<Item = &'a BatchSummary>,
) -> Option<(Decimal, u64, bool)> {
    let mut sum = Decimal::ZERO;
    let mut count = 0u64;
    let mut exact = true;
    for mid in entries.filter_map(|e| e.mid_price) {
        let (next, step_exact) = exact_add(sum, mid)?;
        sum = next;
        exact &= step_exact;
        count += 1;
    }
    Some((sum, count, exact))
}

// Decimal add/sub keep the larger operand scale unless the 96-bit mantissa
// runs out, in which case the result is rescaled and rounded.
fn exact_add(a: Decimal, b: Decimal) -> Option<(Decimal, bool)> {
    let sum = a.checked_add(b)?;
    Some((sum, sum.scale() >= a.scale().max(b.scale())))
}

fn exact_sub(a: Decimal, b: Decimal) -> Option<(Decimal, bool)> {
    let diff = a.checked_sub(b)?;
    Some((diff, diff.scale() >= a.scale().max(b.scale())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::str::FromStr;
    use types::time::NANOS_PER_SECOND;

    fn secs(s: i64) -> i64 {
        s * NANOS_PER_SECOND
    }

    fn with_mid(window_start: i64, mid: Option<i64>) -> BatchSummary {
        BatchSummary {
            mid_price: mid.map(Decimal::from),
            ..BatchSummary::empty(window_start)
        }
    }

    fn with_spread(window_start: i64, spread: &str) -> BatchSummary {
        BatchSummary {
            spread: Some(Decimal::from_str(spread).unwrap()),
            ..BatchSummary::empty(window_start)
        }
    }

    fn five_second_series(series: &mut RollingSeries) {
        for (i, mid) in (10..=14).enumerate() {
            series.append(with_mid(secs(i as i64 + 1), Some(mid))).unwrap();
        }
    }

    #[test]
    fn test_mean_over_all_five() {
        let mut series = RollingSeries::default();
        five_second_series(&mut series);

        let mean = series.rolling_mean_mid_price(Duration::from_secs(5), secs(5));
        assert_eq!(mean, Some(Decimal::from(12)));
    }

    #[test]
    fn test_mean_over_last_two() {
        let mut series = RollingSeries::with_horizons(
            RetentionPolicy::Unbounded,
            &[Duration::from_secs(2)],
        );
        five_second_series(&mut series);

        let mean = series.rolling_mean_mid_price(Duration::from_secs(2), secs(5));
        assert_eq!(mean, Some(Decimal::from_str("13.5").unwrap()));
        assert_eq!(
            series.scan_mean_mid_price(Duration::from_secs(2), secs(5)),
            Some(Decimal::from_str("13.5").unwrap())
        );
    }

    #[test]
    fn test_window_excludes_lower_bound() {
        let mut series = RollingSeries::default();
        series.append(with_mid(secs(0), Some(100))).unwrap();
        series.append(with_mid(secs(60), Some(200))).unwrap();

        // (0, 60] excludes the summary at exactly t=0
        let mean = series.rolling_mean_mid_price(Duration::from_secs(60), secs(60));
        assert_eq!(mean, Some(Decimal::from(200)));
    }

    #[test]
    fn test_unset_mid_prices_do_not_count() {
        let mut series = RollingSeries::with_horizons(
            RetentionPolicy::Unbounded,
            &[Duration::from_secs(60)],
        );
        series.append(with_mid(secs(1), Some(10))).unwrap();
        let before = series.rolling_mean_mid_price(Duration::from_secs(60), secs(1));

        series.append(with_mid(secs(2), None)).unwrap();
        let after = series.rolling_mean_mid_price(Duration::from_secs(60), secs(2));

        assert_eq!(before, after);
        assert_eq!(after, Some(Decimal::from(10)));
    }

    #[test]
    fn test_no_eligible_values_is_none() {
        let mut series = RollingSeries::default();
        assert_eq!(series.rolling_mean_mid_price(Duration::from_secs(60), secs(1)), None);

        series.append(with_mid(secs(1), None)).unwrap();
        assert_eq!(series.rolling_mean_mid_price(Duration::from_secs(60), secs(1)), None);
    }

    #[test]
    fn test_out_of_order_append_rejected() {
        let mut series = RollingSeries::default();
        series.append(with_mid(secs(5), Some(1))).unwrap();
        series.append(with_mid(secs(5), Some(2))).unwrap();

        assert_eq!(
            series.append(with_mid(secs(4), Some(3))),
            Err(SeriesError::OutOfOrder {
                last: secs(5),
                received: secs(4),
            })
        );
        assert_eq!(series.len(), 2);
    }

    #[test]
    fn test_tracker_falls_back_when_as_of_moves_back() {
        let mut series = RollingSeries::with_horizons(
            RetentionPolicy::Unbounded,
            &[Duration::from_secs(2)],
        );
        five_second_series(&mut series);

        assert_eq!(
            series.rolling_mean_mid_price(Duration::from_secs(2), secs(5)),
            Some(Decimal::from_str("13.5").unwrap())
        );
        // Earlier as_of is answered by a scan
        assert_eq!(
            series.rolling_mean_mid_price(Duration::from_secs(2), secs(2)),
            Some(Decimal::from_str("10.5").unwrap())
        );
        // Tracker still continues forward correctly
        series.append(with_mid(secs(6), Some(20))).unwrap();
        assert_eq!(
            series.rolling_mean_mid_price(Duration::from_secs(2), secs(6)),
            Some(Decimal::from(17))
        );
    }

    #[test]
    fn test_running_max_spread() {
        let mut series = RollingSeries::default();
        assert_eq!(series.running_max_spread(), None);

        series.append(with_spread(1, "0.5")).unwrap();
        series.append(with_spread(2, "2.25")).unwrap();
        series.append(with_spread(3, "1")).unwrap();
        series.append(with_mid(4, None)).unwrap();

        assert_eq!(series.running_max_spread(), Some(Decimal::from_str("2.25").unwrap()));
    }

    #[test]
    fn test_max_entries_retention() {
        let mut series = RollingSeries::with_horizons(
            RetentionPolicy::MaxEntries(3),
            &[Duration::from_secs(60)],
        );
        for i in 1..=3 {
            series.append(with_mid(secs(i), Some(i * 10))).unwrap();
        }
        assert_eq!(
            series.rolling_mean_mid_price(Duration::from_secs(60), secs(3)),
            Some(Decimal::from(20))
        );

        // Evicts t=1 and t=2 while both are inside the tracked window
        series.append(with_mid(secs(4), Some(40))).unwrap();
        series.append(with_mid(secs(5), Some(50))).unwrap();

        assert_eq!(series.len(), 3);
        assert_eq!(series.total_appended(), 5);
        assert_eq!(
            series.rolling_mean_mid_price(Duration::from_secs(60), secs(5)),
            Some(Decimal::from(40))
        );
        assert_eq!(
            series.scan_mean_mid_price(Duration::from_secs(60), secs(5)),
            Some(Decimal::from(40))
        );
    }

    #[test]
    fn test_max_age_retention() {
        let mut series = RollingSeries::new(RetentionPolicy::MaxAge(Duration::from_secs(10)));
        for i in 0..=30 {
            series.append(with_mid(secs(i), Some(1))).unwrap();
        }
        // Keeps (20, 30]
        assert_eq!(series.len(), 10);
        assert_eq!(series.iter().next().unwrap().window_start, secs(21));
    }

    #[test]
    fn test_retention_keeps_max_spread() {
        let mut series = RollingSeries::new(RetentionPolicy::MaxEntries(1));
        series.append(with_spread(1, "9")).unwrap();
        series.append(with_spread(2, "1")).unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series.running_max_spread(), Some(Decimal::from(9)));
    }

    #[test]
    fn test_tracked_mean_recovers_after_rounded_sums() {
        let horizon = Duration::from_secs(2);
        let mut series = RollingSeries::with_horizons(RetentionPolicy::Unbounded, &[horizon]);
        let mids = [
            "30000.123456789012345678901234",
            "30001.123456789012345678901234",
            "30002.123456789012345678901234",
            "30003.5",
            "30004.5",
            "30005.5",
        ];

        for (i, mid) in mids.iter().enumerate() {
            let t = secs(i as i64 + 1);
            let summary = BatchSummary {
                mid_price: Some(Decimal::from_str(mid).unwrap()),
                ..BatchSummary::empty(t)
            };
            series.append(summary).unwrap();
            assert_eq!(
                series.rolling_mean_mid_price(horizon, t),
                series.scan_mean_mid_price(horizon, t)
            );
        }

        // Only 30004.5 and 30005.5 remain in (4s, 6s]
        assert_eq!(
            series.rolling_mean_mid_price(horizon, secs(6)),
            Some(Decimal::from(30005))
        );
    }

    #[test]
    fn test_tracked_sum_resets_when_window_empties() {
        let horizon = Duration::from_secs(1);
        let mut series = RollingSeries::with_horizons(RetentionPolicy::Unbounded, &[horizon]);
        let fine = Decimal::from_str("0.1234567890123456789012345678").unwrap();
        series
            .append(BatchSummary { mid_price: Some(fine), ..BatchSummary::empty(secs(1)) })
            .unwrap();
        assert_eq!(series.rolling_mean_mid_price(horizon, secs(1)), Some(fine));

        series.append(with_mid(secs(5), None)).unwrap();
        assert_eq!(series.rolling_mean_mid_price(horizon, secs(5)), None);

        series.append(with_mid(secs(6), Some(7))).unwrap();
        assert_eq!(series.rolling_mean_mid_price(horizon, secs(6)), Some(Decimal::from(7)));
    }

    fn arb_mid() -> impl Strategy<Value = Decimal> {
        prop_oneof![
            (1i64..100_000).prop_map(|m| Decimal::new(m, 2)),
            // 29 significant digits, so running sums must round
            (20_000i64..40_000, 0i64..1_000_000_000_000_000_000)
                .prop_map(|(whole, frac)| Decimal::from(whole) + Decimal::new(frac, 24)),
        ]
    }

    fn arb_retention() -> impl Strategy<Value = RetentionPolicy> {
        prop_oneof![
            Just(RetentionPolicy::Unbounded),
            (1usize..40).prop_map(RetentionPolicy::MaxEntries),
            (1u64..20_000).prop_map(|ms| RetentionPolicy::MaxAge(Duration::from_millis(ms))),
        ]
    }

    fn arb_series() -> impl Strategy<Value = Vec<(i64, Option<Decimal>)>> {
        prop::collection::vec((0i64..4_000, prop::option::of(arb_mid())), 1..80)
    }

    proptest! {
        #[test]
        fn prop_tracked_matches_scan(
            steps in arb_series(),
            horizon_ms in 1u64..20_000,
            retention in arb_retention(),
        ) {
            let horizon = Duration::from_millis(horizon_ms);
            let mut series = RollingSeries::with_horizons(retention, &[horizon]);

            let mut t = 0i64;
            for (gap_ms, mid) in steps {
                t += gap_ms * 1_000_000;
                let summary = BatchSummary {
                    mid_price: mid,
                    ..BatchSummary::empty(t)
                };
                series.append(summary).unwrap();

                let scanned = series.scan_mean_mid_price(horizon, t);
                let tracked = series.rolling_mean_mid_price(horizon, t);
                prop_assert_eq!(tracked, scanned);
            }
        }

        #[test]
        fn prop_scan_matches_naive_mean(steps in arb_series(), horizon_ms in 1u64..20_000) {
            let horizon = Duration::from_millis(horizon_ms);
            let mut series = RollingSeries::default();
            let mut t = 0i64;
            let mut appended = Vec::new();
            for (gap_ms, mid) in steps {
                t += gap_ms * 1_000_000;
                appended.push((t, mid));
                series.append(BatchSummary { mid_price: mid, ..BatchSummary::empty(t) }).unwrap();
            }

            let lower = t - horizon_ms as i64 * 1_000_000;
            let eligible: Vec<Decimal> = appended
                .iter()
                .filter(|(ts, _)| *ts > lower && *ts <= t)
                .filter_map(|(_, mid)| *mid)
                .collect();
            let expected = if eligible.is_empty() {
                None
            } else {
                Some(eligible.iter().copied().sum::<Decimal>().normalize() / Decimal::from(eligible.len()))
            };

            prop_assert_eq!(series.scan_mean_mid_price(horizon, t), expected);
        }
    }
}

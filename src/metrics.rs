//! Per-run latency metrics.
//!
//! [`RunMetrics`] accumulates one `(backend, latency)` outcome per request, in
//! arrival order, and answers summary queries over them:
//!
//! - mean, min, max, population standard deviation,
//! - nearest-rank percentiles (`ceil(p / 100 * n)`-th smallest, no interpolation),
//! - cumulative regret against a fixed optimal latency,
//! - a rolling mean over the most recent outcomes,
//! - a selection histogram and a bucketed latency trend.
//!
//! Every accessor returns `0.0` (or an empty vector) before the first outcome.

use std::collections::VecDeque;

/// Bounded FIFO of the most recent latencies.
#[derive(Debug, Clone)]
struct RollingWindow {
    cap: usize,
    buf: VecDeque<f64>,
}

impl RollingWindow {
    fn new(cap: usize) -> Self {
        Self {
            cap: cap.max(1),
            buf: VecDeque::with_capacity(cap.max(1)),
        }
    }

    fn push(&mut self, latency: f64) {
        if self.buf.len() == self.cap {
            self.buf.pop_front();
        }
        self.buf.push_back(latency);
    }

    fn mean(&self) -> f64 {
        if self.buf.is_empty() {
            return 0.0;
        }
        self.buf.iter().sum::<f64>() / self.buf.len() as f64
    }
}

/// Point-in-time summary of a run.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RunSummary {
    pub label: String,
    pub total_requests: usize,
    pub mean_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub std_dev_ms: f64,
    pub cumulative_regret_ms: f64,
}

/// Outcome log and summary statistics for one simulation run.
#[derive(Debug, Clone)]
pub struct RunMetrics {
    label: String,
    optimal_latency_ms: f64,
    latencies: Vec<f64>,
    selections: Vec<usize>,
    cumulative_regret: f64,
    window: RollingWindow,
}

impl RunMetrics {
    /// Create an empty log.
    ///
    /// `window_cap` is the rolling-average window size (minimum 1).
    pub fn new(label: impl Into<String>, optimal_latency_ms: f64, window_cap: usize) -> Self {
        Self {
            label: label.into(),
            optimal_latency_ms,
            latencies: Vec::new(),
            selections: Vec::new(),
            cumulative_regret: 0.0,
            window: RollingWindow::new(window_cap),
        }
    }

    /// Append one outcome.
    pub fn record(&mut self, index: usize, latency_ms: f64) {
        self.latencies.push(latency_ms);
        self.selections.push(index);
        self.cumulative_regret += (latency_ms - self.optimal_latency_ms).max(0.0);
        self.window.push(latency_ms);
    }

    /// Algorithm label this run was recorded under.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn optimal_latency(&self) -> f64 {
        self.optimal_latency_ms
    }

    pub fn total_requests(&self) -> usize {
        self.latencies.len()
    }

    /// Latencies in arrival order.
    pub fn latencies(&self) -> &[f64] {
        &self.latencies
    }

    /// Chosen backend indices in arrival order (parallel to [`Self::latencies`]).
    pub fn selections(&self) -> &[usize] {
        &self.selections
    }

    /// Sum over outcomes of `max(0, latency - optimal)`.
    pub fn cumulative_regret(&self) -> f64 {
        self.cumulative_regret
    }

    pub fn mean(&self) -> f64 {
        if self.latencies.is_empty() {
            return 0.0;
        }
        self.latencies.iter().sum::<f64>() / self.latencies.len() as f64
    }

    /// Mean over the most recent `window_cap` latencies.
    pub fn rolling_average(&self) -> f64 {
        self.window.mean()
    }

    /// Nearest-rank percentile, `p` in `[0, 100]`.
    ///
    /// Sorts a copy on every call. The rank is `ceil(p / 100 * n) - 1`,
    /// clamped to `[0, n - 1]`.
    pub fn percentile(&self, p: f64) -> f64 {
        if self.latencies.is_empty() {
            return 0.0;
        }
        let mut sorted = self.latencies.clone();
        sorted.sort_by(f64::total_cmp);
        let n = sorted.len();
        let rank = (p / 100.0 * n as f64).ceil();
        let idx = if rank.is_nan() || rank < 1.0 {
            0
        } else {
            (rank as usize - 1).min(n - 1)
        };
        sorted[idx]
    }

    pub fn min(&self) -> f64 {
        if self.latencies.is_empty() {
            return 0.0;
        }
        self.latencies.iter().copied().fold(f64::INFINITY, f64::min)
    }

    pub fn max(&self) -> f64 {
        if self.latencies.is_empty() {
            return 0.0;
        }
        self.latencies.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    /// Population standard deviation.
    pub fn std_dev(&self) -> f64 {
        if self.latencies.is_empty() {
            return 0.0;
        }
        let mean = self.mean();
        let var = self
            .latencies
            .iter()
            .map(|l| (l - mean) * (l - mean))
            .sum::<f64>()
            / self.latencies.len() as f64;
        var.sqrt()
    }

    /// Requests routed to each of `backend_count` backends.
    ///
    /// Indices outside `0..backend_count` are not counted.
    pub fn selection_histogram(&self, backend_count: usize) -> Vec<usize> {
        let mut counts = vec![0usize; backend_count];
        for &i in &self.selections {
            if let Some(c) = counts.get_mut(i) {
                *c += 1;
            }
        }
        counts
    }

    /// Mean latency per contiguous bucket of arrivals.
    ///
    /// Bucket size is `max(1, n / buckets)`; trailing buckets past the end of
    /// the log are `0.0`. Empty when there is no data or `buckets == 0`.
    pub fn latency_trend(&self, buckets: usize) -> Vec<f64> {
        let n = self.latencies.len();
        if n == 0 || buckets == 0 {
            return Vec::new();
        }
        let size = (n / buckets).max(1);
        (0..buckets)
            .map(|b| {
                let start = (b * size).min(n);
                let end = (start + size).min(n);
                let slice = &self.latencies[start..end];
                if slice.is_empty() {
                    0.0
                } else {
                    slice.iter().sum::<f64>() / slice.len() as f64
                }
            })
            .collect()
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            label: self.label.clone(),
            total_requests: self.total_requests(),
            mean_ms: self.mean(),
            p50_ms: self.percentile(50.0),
            p95_ms: self.percentile(95.0),
            p99_ms: self.percentile(99.0),
            min_ms: self.min(),
            max_ms: self.max(),
            std_dev_ms: self.std_dev(),
            cumulative_regret_ms: self.cumulative_regret,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn filled(latencies: &[f64]) -> RunMetrics {
        let mut m = RunMetrics::new("test", 20.0, 3);
        for (i, l) in latencies.iter().enumerate() {
            m.record(i % 2, *l);
        }
        m
    }

    #[test]
    fn empty_metrics_are_all_zero() {
        let m = RunMetrics::new("empty", 20.0, 10);
        assert_eq!(m.total_requests(), 0);
        assert_eq!(m.mean(), 0.0);
        assert_eq!(m.percentile(99.0), 0.0);
        assert_eq!(m.min(), 0.0);
        assert_eq!(m.max(), 0.0);
        assert_eq!(m.std_dev(), 0.0);
        assert_eq!(m.rolling_average(), 0.0);
        assert_eq!(m.cumulative_regret(), 0.0);
        assert!(m.latency_trend(10).is_empty());
    }

    #[test]
    fn basic_statistics() {
        let m = filled(&[10.0, 20.0, 30.0, 40.0]);
        assert_eq!(m.total_requests(), 4);
        assert_eq!(m.mean(), 25.0);
        assert_eq!(m.min(), 10.0);
        assert_eq!(m.max(), 40.0);
        // Population: sqrt(125).
        assert!((m.std_dev() - 125f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn nearest_rank_percentiles() {
        let m = filled(&[15.0, 20.0, 35.0, 40.0, 50.0]);
        assert_eq!(m.percentile(0.0), 15.0);
        assert_eq!(m.percentile(5.0), 15.0);
        assert_eq!(m.percentile(30.0), 20.0);
        assert_eq!(m.percentile(40.0), 20.0);
        assert_eq!(m.percentile(50.0), 35.0);
        assert_eq!(m.percentile(100.0), 50.0);
        assert_eq!(m.percentile(250.0), 50.0);
    }

    #[test]
    fn percentile_ignores_arrival_order() {
        let a = filled(&[50.0, 15.0, 40.0, 20.0, 35.0]);
        let b = filled(&[15.0, 20.0, 35.0, 40.0, 50.0]);
        for p in [1.0, 25.0, 50.0, 75.0, 99.0] {
            assert_eq!(a.percentile(p), b.percentile(p));
        }
    }

    #[test]
    fn regret_only_counts_excess() {
        let m = filled(&[10.0, 20.0, 25.0, 50.0]);
        assert_eq!(m.cumulative_regret(), 5.0 + 30.0);
    }

    #[test]
    fn rolling_window_evicts_oldest() {
        let m = filled(&[100.0, 1.0, 2.0, 3.0]);
        assert_eq!(m.rolling_average(), 2.0);
        assert_eq!(m.mean(), 26.5);
    }

    #[test]
    fn histogram_and_sequences_stay_parallel() {
        let mut m = RunMetrics::new("h", 0.0, 5);
        for i in [0, 2, 2, 1, 2, 7] {
            m.record(i, 1.0);
        }
        assert_eq!(m.latencies().len(), m.selections().len());
        assert_eq!(m.selection_histogram(3), vec![1, 1, 3]);
    }

    #[test]
    fn trend_buckets_average_in_order() {
        let m = filled(&[1.0, 3.0, 5.0, 7.0, 9.0, 11.0]);
        assert_eq!(m.latency_trend(3), vec![2.0, 6.0, 10.0]);
        // More buckets than data: trailing zeros.
        assert_eq!(m.latency_trend(8), vec![1.0, 3.0, 5.0, 7.0, 9.0, 11.0, 0.0, 0.0]);
    }

    #[test]
    fn summary_matches_accessors() {
        let m = filled(&[12.0, 30.0, 22.0]);
        let s = m.summary();
        assert_eq!(s.label, "test");
        assert_eq!(s.total_requests, 3);
        assert_eq!(s.mean_ms, m.mean());
        assert_eq!(s.p95_ms, 30.0);
        assert_eq!(s.cumulative_regret_ms, 12.0);
    }

    proptest! {
        #[test]
        fn regret_matches_recomputation(
            latencies in proptest::collection::vec(1.0f64..500.0, 0..300),
            optimal in 0.0f64..100.0,
        ) {
            let mut m = RunMetrics::new("p", optimal, 100);
            for (i, l) in latencies.iter().enumerate() {
                m.record(i % 5, *l);
            }
            let expected: f64 = m.latencies().iter().map(|l| (l - optimal).max(0.0)).sum();
            prop_assert!((m.cumulative_regret() - expected).abs() < 1e-6);
            prop_assert_eq!(m.latencies().len(), m.selections().len());
        }

        #[test]
        fn percentile_is_an_observed_value_within_range(
            latencies in proptest::collection::vec(1.0f64..500.0, 1..200),
            p in 0.0f64..=100.0,
        ) {
            let mut m = RunMetrics::new("p", 20.0, 10);
            for l in &latencies {
                m.record(0, *l);
            }
            let v = m.percentile(p);
            prop_assert!(latencies.contains(&v));
            prop_assert!(v >= m.min() && v <= m.max());
        }
    }
}

//! Lock-free metrics primitives + the recompute-engine metrics surface.
//!
//! Design goals:
//! - Hot-path recording: O(1), no allocations, no locks.
//! - Snapshotting: lock-free loads + derived quantiles (approx) for histograms.
//!
//! This is intentionally lightweight (std-only) so all crates can record
//! metrics without pulling in a wire-format export dependency — the
//! Prometheus/OTLP translation is an external collaborator's job (§6).

#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{LazyLock, RwLock};

use serde::Serialize;

// ---------------------------------------------------------------------------
// Primitives
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct Counter {
    v: AtomicU64,
}

impl Counter {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            v: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn inc(&self) {
        self.v.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add(&self, delta: u64) {
        self.v.fetch_add(delta, Ordering::Relaxed);
    }

    #[inline]
    #[must_use]
    pub fn load(&self) -> u64 {
        self.v.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Default)]
pub struct GaugeI64 {
    v: AtomicI64,
}

impl GaugeI64 {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            v: AtomicI64::new(0),
        }
    }

    #[inline]
    pub fn set(&self, value: i64) {
        self.v.store(value, Ordering::Relaxed);
    }

    #[inline]
    #[must_use]
    pub fn load(&self) -> i64 {
        self.v.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Default)]
pub struct GaugeU64 {
    v: AtomicU64,
}

impl GaugeU64 {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            v: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn set(&self, value: u64) {
        self.v.store(value, Ordering::Relaxed);
    }

    #[inline]
    #[must_use]
    pub fn load(&self) -> u64 {
        self.v.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// Fixed-bucket histogram (Prometheus-style, explicit boundaries)
// ---------------------------------------------------------------------------

/// The bucket boundaries for `recompute_duration_seconds`, exactly as named
/// in the metrics-sink contract.
pub const RECOMPUTE_DURATION_BUCKETS: [f64; 7] = [0.1, 0.25, 0.5, 1.0, 2.0, 5.0, 10.0];

/// A histogram with caller-supplied ascending bucket boundaries (seconds),
/// plus an implicit `+Inf` bucket. Unlike `Log2Histogram` below, the
/// boundaries are not derived from the value's bit pattern — they are the
/// literal cutoffs a metrics backend would export.
#[derive(Debug)]
pub struct FixedBucketHistogram {
    bounds: &'static [f64],
    /// `counts[i]` = number of observations `<= bounds[i]`; `counts[bounds.len()]`
    /// is the `+Inf` bucket.
    counts: Vec<AtomicU64>,
    count: AtomicU64,
    /// Sum of observed values in whole microseconds (avoids atomic f64).
    sum_micros: AtomicU64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FixedBucketSnapshot {
    pub count: u64,
    pub sum_seconds: f64,
    /// Cumulative counts, one per bound plus the trailing `+Inf` bucket.
    pub cumulative_counts: Vec<u64>,
}

impl FixedBucketHistogram {
    #[must_use]
    pub fn new(bounds: &'static [f64]) -> Self {
        let counts = (0..=bounds.len()).map(|_| AtomicU64::new(0)).collect();
        Self {
            bounds,
            counts,
            count: AtomicU64::new(0),
            sum_micros: AtomicU64::new(0),
        }
    }

    /// Record one observation, in seconds.
    pub fn observe(&self, seconds: f64) {
        let idx = self
            .bounds
            .iter()
            .position(|&b| seconds <= b)
            .unwrap_or(self.bounds.len());
        self.counts[idx].fetch_add(1, Ordering::Relaxed);
        let micros = (seconds * 1_000_000.0).round().clamp(0.0, u64::MAX as f64) as u64;
        self.sum_micros.fetch_add(micros, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Release);
    }

    #[must_use]
    pub fn snapshot(&self) -> FixedBucketSnapshot {
        let count = self.count.load(Ordering::Acquire);
        let mut cumulative_counts = vec![0u64; self.counts.len()];
        let mut running = 0u64;
        for (i, c) in self.counts.iter().enumerate() {
            running = running.saturating_add(c.load(Ordering::Relaxed));
            cumulative_counts[i] = running;
        }
        FixedBucketSnapshot {
            count,
            sum_seconds: self.sum_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0,
            cumulative_counts,
        }
    }
}

// ---------------------------------------------------------------------------
// Log2 histogram (general-purpose, used where bucket boundaries don't matter)
// ---------------------------------------------------------------------------

const LOG2_BUCKETS: usize = 64;

#[derive(Debug)]
pub struct Log2Histogram {
    buckets: [AtomicU64; LOG2_BUCKETS],
    count: AtomicU64,
    sum: AtomicU64,
    min: AtomicU64,
    max: AtomicU64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct HistogramSnapshot {
    pub count: u64,
    pub sum: u64,
    pub min: u64,
    pub max: u64,
    pub p50: u64,
    pub p95: u64,
    pub p99: u64,
}

impl Default for Log2Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Log2Histogram {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            count: AtomicU64::new(0),
            sum: AtomicU64::new(0),
            min: AtomicU64::new(u64::MAX),
            max: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record(&self, value: u64) {
        self.sum.fetch_add(value, Ordering::Relaxed);
        self.min.fetch_min(value, Ordering::Relaxed);
        self.max.fetch_max(value, Ordering::Relaxed);
        let idx = bucket_index(value);
        self.buckets[idx].fetch_add(1, Ordering::Relaxed);
        // count is written LAST with Release so that an Acquire load on count
        // in snapshot() establishes a happens-before edge for all prior writes.
        self.count.fetch_add(1, Ordering::Release);
    }

    #[must_use]
    pub fn snapshot(&self) -> HistogramSnapshot {
        let count = self.count.load(Ordering::Acquire);
        if count == 0 {
            return HistogramSnapshot::default();
        }
        let buckets: [u64; LOG2_BUCKETS] =
            std::array::from_fn(|i| self.buckets[i].load(Ordering::Relaxed));
        let raw_min = self.min.load(Ordering::Relaxed);
        let max = self.max.load(Ordering::Relaxed);
        let min = raw_min.min(max);
        let p50 = estimate_quantile_frac(&buckets, count, 1, 2, max);
        let p95 = estimate_quantile_frac(&buckets, count, 19, 20, max);
        let p99 = estimate_quantile_frac(&buckets, count, 99, 100, max);
        HistogramSnapshot {
            count,
            sum: self.sum.load(Ordering::Relaxed),
            min,
            max,
            p50,
            p95,
            p99,
        }
    }
}

#[inline]
const fn bucket_index(value: u64) -> usize {
    if value == 0 {
        return 0;
    }
    let lz = value.leading_zeros() as usize;
    63usize.saturating_sub(lz)
}

const fn bucket_upper_bound(idx: usize) -> u64 {
    if idx >= 63 {
        return u64::MAX;
    }
    (1u64 << (idx + 1)).saturating_sub(1)
}

fn estimate_quantile_frac(
    buckets: &[u64; LOG2_BUCKETS],
    count: u64,
    numerator: u64,
    denominator: u64,
    observed_max: u64,
) -> u64 {
    debug_assert!(denominator > 0);
    let numerator = numerator.min(denominator);
    let mut rank = count
        .saturating_mul(numerator)
        .saturating_add(denominator.saturating_sub(1))
        / denominator;
    rank = rank.clamp(1, count);

    let mut cumulative = 0u64;
    for (idx, c) in buckets.iter().copied().enumerate() {
        cumulative = cumulative.saturating_add(c);
        if cumulative >= rank {
            return bucket_upper_bound(idx).min(observed_max);
        }
    }
    observed_max
}

// ---------------------------------------------------------------------------
// Generic job-metrics interface (§6) + the recompute-engine surface
// ---------------------------------------------------------------------------

/// The generic job-metrics interface named in the metrics-sink contract.
/// `RecomputeEngine` is written against this trait, not against
/// `RecomputeMetrics` directly, so a collaborator can swap in its own
/// Prometheus/OTLP-backed sink without the engine changing.
pub trait JobMetricsSink: Send + Sync {
    fn inc_total(&self, name: &str, status: &str);
    fn observe_duration(&self, name: &str, seconds: f64);
    fn inc_errors(&self, name: &str, reason: &str);

    /// Records the gauges for the most recently completed cycle of `name`.
    /// Sinks that don't track per-job gauges (a generic Prometheus shim,
    /// say) can leave this a no-op.
    fn set_last_run(&self, _name: &str, _timestamp_unix_seconds: u64, _item_count: u64) {}
}

/// The four named recompute metrics plus the generic job-metrics surface,
/// backing the default in-process `JobMetricsSink` implementation.
#[derive(Debug)]
pub struct RecomputeMetrics {
    pub recompute_total: Counter,
    pub recompute_errors_total: RwLock<HashMap<String, Counter>>,
    pub recompute_duration_seconds: FixedBucketHistogram,
    pub last_recompute_timestamp: GaugeU64,
    pub last_recompute_scene_count: GaugeU64,
}

impl Default for RecomputeMetrics {
    fn default() -> Self {
        Self {
            recompute_total: Counter::new(),
            recompute_errors_total: RwLock::new(HashMap::new()),
            recompute_duration_seconds: FixedBucketHistogram::new(&RECOMPUTE_DURATION_BUCKETS),
            last_recompute_timestamp: GaugeU64::new(),
            last_recompute_scene_count: GaugeU64::new(),
        }
    }
}

impl RecomputeMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of `recompute_errors_total` by reason, for tests/inspection.
    #[must_use]
    pub fn errors_by_reason(&self, reason: &str) -> u64 {
        self.recompute_errors_total
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(reason)
            .map_or(0, Counter::load)
    }
}

impl JobMetricsSink for RecomputeMetrics {
    fn inc_total(&self, name: &str, _status: &str) {
        if name == "recompute" {
            self.recompute_total.inc();
        }
    }

    fn observe_duration(&self, name: &str, seconds: f64) {
        if name == "recompute" {
            self.recompute_duration_seconds.observe(seconds);
        }
    }

    fn inc_errors(&self, name: &str, reason: &str) {
        if name != "recompute" {
            return;
        }
        let mut map = self
            .recompute_errors_total
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        map.entry(reason.to_string()).or_default().inc();
    }

    fn set_last_run(&self, name: &str, timestamp_unix_seconds: u64, item_count: u64) {
        if name != "recompute" {
            return;
        }
        self.last_recompute_timestamp.set(timestamp_unix_seconds);
        self.last_recompute_scene_count.set(item_count);
    }
}

static GLOBAL_RECOMPUTE_METRICS: LazyLock<RecomputeMetrics> = LazyLock::new(RecomputeMetrics::default);

/// The process-wide default recompute metrics instance. Most callers should
/// prefer constructing their own `RecomputeMetrics` and injecting it into a
/// `RecomputeEngine`, but a shared singleton is convenient for small
/// binaries and tests.
#[must_use]
pub fn global_recompute_metrics() -> &'static RecomputeMetrics {
    &GLOBAL_RECOMPUTE_METRICS
}

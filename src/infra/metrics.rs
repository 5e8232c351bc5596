//! Lock-free lookup metrics
//!
//! Uses atomics so concurrent lookup tasks never contend on a mutex.
//! `report()` takes a consistent-enough snapshot for end-of-run logging.
//!
//! NOTE: All atomics use Relaxed ordering intentionally. These are statistical
//! counters only and must not drive scheduling decisions.

use crate::domain::error::FailureReason;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{info, warn};

/// Exponential bucket boundaries (milliseconds)
/// Buckets: ≤10, ≤20, ≤40, ≤80, ≤160, ≤320, ≤640, ≤1280, ≤2560, ≤5120, >5120
pub const LATENCY_BOUNDS_MS: [u64; 10] = [10, 20, 40, 80, 160, 320, 640, 1280, 2560, 5120];
pub const NUM_BUCKETS: usize = 11;

#[inline]
fn bucket_index(latency_ms: u64) -> usize {
    LATENCY_BOUNDS_MS.partition_point(|&bound| bound < latency_ms)
}

/// Update an atomic max value using compare-and-swap loop
#[inline]
fn update_atomic_max(atomic_max: &AtomicU64, new_value: u64) {
    let mut current_max = atomic_max.load(Ordering::Relaxed);
    while new_value > current_max {
        match atomic_max.compare_exchange_weak(
            current_max,
            new_value,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break,
            Err(actual) => current_max = actual,
        }
    }
}

#[inline]
fn load_buckets(buckets: &[AtomicU64; NUM_BUCKETS]) -> [u64; NUM_BUCKETS] {
    std::array::from_fn(|i| buckets[i].load(Ordering::Relaxed))
}

/// Returns the upper bound of the bucket containing the percentile
fn percentile_from_buckets(buckets: &[u64; NUM_BUCKETS], percentile: f64) -> u64 {
    let total: u64 = buckets.iter().sum();
    if total == 0 {
        return 0;
    }

    let target = ((total as f64 * percentile).ceil() as u64).max(1);
    let mut cumulative = 0u64;

    const UPPER_BOUNDS: [u64; NUM_BUCKETS] =
        [10, 20, 40, 80, 160, 320, 640, 1280, 2560, 5120, 10240];

    for (i, &count) in buckets.iter().enumerate() {
        cumulative += count;
        if cumulative >= target {
            return UPPER_BOUNDS[i];
        }
    }
    UPPER_BOUNDS[NUM_BUCKETS - 1]
}

/// Lock-free lookup metrics collector
pub struct Metrics {
    lookups_started: AtomicU64,
    lookups_succeeded: AtomicU64,
    failed_upstream_status: AtomicU64,
    failed_no_data: AtomicU64,
    failed_parse: AtomicU64,
    failed_transport: AtomicU64,
    /// Tasks whose result never came back (panicked or aborted)
    tasks_lost: AtomicU64,
    latency_sum_ms: AtomicU64,
    latency_max_ms: AtomicU64,
    latency_buckets: [AtomicU64; NUM_BUCKETS],
    in_flight: AtomicU64,
    in_flight_peak: AtomicU64,
    started_at: Mutex<Instant>,
}

/// Holds one in-flight slot of the gauge
pub struct InFlightGuard<'a> {
    in_flight: &'a AtomicU64,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            lookups_started: AtomicU64::new(0),
            lookups_succeeded: AtomicU64::new(0),
            failed_upstream_status: AtomicU64::new(0),
            failed_no_data: AtomicU64::new(0),
            failed_parse: AtomicU64::new(0),
            failed_transport: AtomicU64::new(0),
            tasks_lost: AtomicU64::new(0),
            latency_sum_ms: AtomicU64::new(0),
            latency_max_ms: AtomicU64::new(0),
            latency_buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            in_flight: AtomicU64::new(0),
            in_flight_peak: AtomicU64::new(0),
            started_at: Mutex::new(Instant::now()),
        }
    }

    /// Reset the rate clock (call right before a batch is dispatched)
    pub fn mark_batch_start(&self) {
        *self.started_at.lock() = Instant::now();
    }

    /// Record a lookup entering the network (after acquiring a pool slot).
    ///
    /// The lookup stays counted as in flight until the returned guard drops,
    /// which also happens when the task unwinds.
    #[inline]
    #[must_use = "dropping the guard ends the in-flight interval"]
    pub fn lookup_started(&self) -> InFlightGuard<'_> {
        self.lookups_started.fetch_add(1, Ordering::Relaxed);
        let now = self.in_flight.fetch_add(1, Ordering::Relaxed) + 1;
        update_atomic_max(&self.in_flight_peak, now);
        InFlightGuard { in_flight: &self.in_flight }
    }

    /// Record a lookup's latency and outcome
    #[inline]
    pub fn lookup_finished(&self, latency_ms: u64, failure: Option<&FailureReason>) {
        self.latency_sum_ms.fetch_add(latency_ms, Ordering::Relaxed);
        self.latency_buckets[bucket_index(latency_ms)].fetch_add(1, Ordering::Relaxed);
        update_atomic_max(&self.latency_max_ms, latency_ms);

        let counter = match failure {
            None => &self.lookups_succeeded,
            Some(FailureReason::UpstreamStatus(_)) => &self.failed_upstream_status,
            Some(FailureReason::NoData) => &self.failed_no_data,
            Some(FailureReason::Parse(_)) => &self.failed_parse,
            Some(FailureReason::Transport(_)) => &self.failed_transport,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn task_lost(&self) {
        self.tasks_lost.fetch_add(1, Ordering::Relaxed);
    }

    /// Lookups currently holding a pool slot
    pub fn in_flight(&self) -> u64 {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Highest number of concurrently in-flight lookups observed
    pub fn in_flight_peak(&self) -> u64 {
        self.in_flight_peak.load(Ordering::Relaxed)
    }

    pub fn lookups_started(&self) -> u64 {
        self.lookups_started.load(Ordering::Relaxed)
    }

    /// Build a summary snapshot
    pub fn report(&self) -> MetricsSummary {
        let succeeded = self.lookups_succeeded.load(Ordering::Relaxed);
        let failed_upstream_status = self.failed_upstream_status.load(Ordering::Relaxed);
        let failed_no_data = self.failed_no_data.load(Ordering::Relaxed);
        let failed_parse = self.failed_parse.load(Ordering::Relaxed);
        let failed_transport = self.failed_transport.load(Ordering::Relaxed);
        let completed =
            succeeded + failed_upstream_status + failed_no_data + failed_parse + failed_transport;

        let buckets = load_buckets(&self.latency_buckets);
        let elapsed_secs = self.started_at.lock().elapsed().as_secs_f64();
        let lookups_per_sec =
            if elapsed_secs > 0.0 { completed as f64 / elapsed_secs } else { 0.0 };
        let avg_latency_ms =
            self.latency_sum_ms.load(Ordering::Relaxed).checked_div(completed).unwrap_or(0);

        MetricsSummary {
            lookups_started: self.lookups_started.load(Ordering::Relaxed),
            succeeded,
            failed_upstream_status,
            failed_no_data,
            failed_parse,
            failed_transport,
            tasks_lost: self.tasks_lost.load(Ordering::Relaxed),
            lookups_per_sec,
            avg_latency_ms,
            max_latency_ms: self.latency_max_ms.load(Ordering::Relaxed),
            p50_latency_ms: percentile_from_buckets(&buckets, 0.50),
            p95_latency_ms: percentile_from_buckets(&buckets, 0.95),
            p99_latency_ms: percentile_from_buckets(&buckets, 0.99),
            latency_buckets: buckets,
            in_flight_peak: self.in_flight_peak(),
        }
    }
}

/// Point-in-time view of lookup metrics
#[derive(Debug, Clone)]
pub struct MetricsSummary {
    pub lookups_started: u64,
    pub succeeded: u64,
    pub failed_upstream_status: u64,
    pub failed_no_data: u64,
    pub failed_parse: u64,
    pub failed_transport: u64,
    pub tasks_lost: u64,
    pub lookups_per_sec: f64,
    pub avg_latency_ms: u64,
    pub max_latency_ms: u64,
    pub p50_latency_ms: u64,
    pub p95_latency_ms: u64,
    pub p99_latency_ms: u64,
    /// Bounds: ≤10, ≤20, ≤40, ≤80, ≤160, ≤320, ≤640, ≤1280, ≤2560, ≤5120, >5120 ms
    pub latency_buckets: [u64; NUM_BUCKETS],
    pub in_flight_peak: u64,
}

impl MetricsSummary {
    pub fn failed_total(&self) -> u64 {
        self.failed_upstream_status
            + self.failed_no_data
            + self.failed_parse
            + self.failed_transport
            + self.tasks_lost
    }

    pub fn log(&self) {
        info!(
            lookups = %self.lookups_started,
            succeeded = %self.succeeded,
            failed = %self.failed_total(),
            lookups_per_sec = format!("{:.1}", self.lookups_per_sec),
            avg_latency_ms = %self.avg_latency_ms,
            max_latency_ms = %self.max_latency_ms,
            p50_ms = %self.p50_latency_ms,
            p95_ms = %self.p95_latency_ms,
            p99_ms = %self.p99_latency_ms,
            in_flight_peak = %self.in_flight_peak,
            "lookup_metrics"
        );

        if self.failed_total() > 0 {
            warn!(
                upstream_status = %self.failed_upstream_status,
                no_data = %self.failed_no_data,
                parse_error = %self.failed_parse,
                transport = %self.failed_transport,
                tasks_lost = %self.tasks_lost,
                "lookup_failures"
            );
        }
    }
}

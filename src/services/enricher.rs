//! Enrichment scheduler
//!
//! Dispatches one land-cover lookup per event over a bounded worker pool.
//! Each task owns a copy of its coordinate and returns `(index, result)`;
//! results are merged back by index, so completion order never matters.
//! A failed lookup leaves that event's code unset and is only counted.

use crate::domain::error::{FailureReason, LookupFailure};
use crate::domain::types::{Event, LandcoverCode};
use crate::infra::metrics::Metrics;
use crate::io::landcover::LandcoverClient;
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Per-run tally of lookup outcomes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnrichSummary {
    pub requested: usize,
    pub succeeded: usize,
    pub failed_upstream_status: usize,
    pub failed_no_data: usize,
    pub failed_parse: usize,
    pub failed_transport: usize,
    /// Tasks that panicked before reporting a result
    pub tasks_lost: usize,
}

impl EnrichSummary {
    fn record_failure(&mut self, reason: &FailureReason) {
        match reason {
            FailureReason::UpstreamStatus(_) => self.failed_upstream_status += 1,
            FailureReason::NoData => self.failed_no_data += 1,
            FailureReason::Parse(_) => self.failed_parse += 1,
            FailureReason::Transport(_) => self.failed_transport += 1,
        }
    }

    pub fn failed(&self) -> usize {
        self.failed_upstream_status
            + self.failed_no_data
            + self.failed_parse
            + self.failed_transport
            + self.tasks_lost
    }
}

/// Events with codes merged in, plus the outcome tally
#[derive(Debug)]
pub struct EnrichOutcome {
    pub events: Vec<Event>,
    pub summary: EnrichSummary,
}

/// Bounded-concurrency lookup scheduler
pub struct Enricher {
    client: Arc<dyn LandcoverClient>,
    max_in_flight: usize,
    metrics: Arc<Metrics>,
}

impl Enricher {
    pub fn new(
        client: Arc<dyn LandcoverClient>,
        max_in_flight: usize,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self { client, max_in_flight: max_in_flight.max(1), metrics }
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    /// Annotate every event with its land-cover code.
    ///
    /// Returns the same events in the same order. Waits for every dispatched
    /// lookup to finish before returning; no failure escapes.
    pub async fn enrich(&self, mut events: Vec<Event>) -> EnrichOutcome {
        let mut summary = EnrichSummary { requested: events.len(), ..Default::default() };
        if events.is_empty() {
            return EnrichOutcome { events, summary };
        }

        info!(events = %events.len(), max_in_flight = %self.max_in_flight, "enrichment_started");
        self.metrics.mark_batch_start();

        let semaphore = Arc::new(Semaphore::new(self.max_in_flight));
        let mut lookups = JoinSet::new();
        let mut task_index = FxHashMap::default();

        for (index, event) in events.iter().enumerate() {
            let client = Arc::clone(&self.client);
            let metrics = Arc::clone(&self.metrics);
            let sem = Arc::clone(&semaphore);
            let (lon, lat) = (event.longitude, event.latitude);

            let handle = lookups.spawn(async move {
                let result = match sem.acquire_owned().await {
                    Ok(_permit) => timed_lookup(client.as_ref(), &metrics, lon, lat).await,
                    Err(_) => Err(LookupFailure::new(FailureReason::Transport(
                        "worker pool closed".to_string(),
                    ))),
                };
                (index, result)
            });
            task_index.insert(handle.id(), index);
        }

        // Barrier: drain every task regardless of outcome
        while let Some(joined) = lookups.join_next_with_id().await {
            match joined {
                Ok((_, (index, Ok(code)))) => {
                    events[index].landcover_code = Some(code);
                    summary.succeeded += 1;
                }
                Ok((_, (index, Err(failure)))) => {
                    debug!(
                        event_id = %events[index].event_id,
                        reason = %failure.reason,
                        "landcover_lookup_failed"
                    );
                    summary.record_failure(&failure.reason);
                }
                Err(join_err) => {
                    match task_index.get(&join_err.id()) {
                        Some(&index) => warn!(
                            event_id = %events[index].event_id,
                            error = %join_err,
                            "lookup_task_lost"
                        ),
                        None => warn!(error = %join_err, "lookup_task_lost"),
                    }
                    self.metrics.task_lost();
                    summary.tasks_lost += 1;
                }
            }
        }

        info!(
            succeeded = %summary.succeeded,
            failed = %summary.failed(),
            "enrichment_complete"
        );
        EnrichOutcome { events, summary }
    }
}

/// Run one lookup while it holds a pool slot, recording latency and outcome
async fn timed_lookup(
    client: &dyn LandcoverClient,
    metrics: &Metrics,
    lon: f64,
    lat: f64,
) -> Result<LandcoverCode, LookupFailure> {
    let _slot = metrics.lookup_started();
    let started = Instant::now();
    let result = client.lookup(lon, lat).await;
    let latency_ms = started.elapsed().as_millis() as u64;
    metrics.lookup_finished(latency_ms, result.as_ref().err().map(|f| &f.reason));
    result
}

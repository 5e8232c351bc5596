//! Temporal gap analysis
//!
//! Groups events by individual, stable-sorts each group by timestamp and
//! measures the time between consecutive fixes. Spans strictly longer than
//! the threshold are reported as gaps.

use crate::domain::types::{seconds_between, Event, IndividualId, IndividualStats, TimeSpan};
use rustc_hash::FxHashMap;
use serde::Serialize;

/// Result of one analysis pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GapAnalysis {
    /// One entry per distinct individual, sorted by id
    pub stats: Vec<IndividualStats>,
    /// Spans with `seconds > threshold`, grouped by individual then time
    pub gaps: Vec<TimeSpan>,
    /// Spans between equal timestamps
    pub zero_spans: usize,
    pub threshold_seconds: f64,
}

/// Consecutive-pair spans of one already sorted group
fn spans_of(group: &[&Event]) -> Vec<TimeSpan> {
    group
        .windows(2)
        .map(|pair| TimeSpan {
            individual_id: pair[1].individual_id.clone(),
            from_event: pair[0].event_id.clone(),
            to_event: pair[1].event_id.clone(),
            from_time: pair[0].timestamp,
            to_time: pair[1].timestamp,
            seconds: seconds_between(pair[0].timestamp, pair[1].timestamp),
        })
        .collect()
}

fn stats_of(
    individual_id: &IndividualId,
    event_count: usize,
    spans: &[TimeSpan],
) -> IndividualStats {
    let mut stats = IndividualStats {
        individual_id: individual_id.clone(),
        event_count,
        span_count: spans.len(),
        min_seconds: None,
        mean_seconds: None,
        max_seconds: None,
    };
    if spans.is_empty() {
        return stats;
    }

    let (mut min, mut max, mut sum) = (f64::INFINITY, f64::NEG_INFINITY, 0.0);
    for span in spans {
        min = min.min(span.seconds);
        max = max.max(span.seconds);
        sum += span.seconds;
    }
    stats.min_seconds = Some(min);
    stats.mean_seconds = Some(sum / spans.len() as f64);
    stats.max_seconds = Some(max);
    stats
}

/// Per-individual span statistics and gaps exceeding `threshold_seconds`
pub fn analyze_gaps(events: &[Event], threshold_seconds: f64) -> GapAnalysis {
    let mut groups: FxHashMap<&IndividualId, Vec<&Event>> = FxHashMap::default();
    for event in events {
        groups.entry(&event.individual_id).or_default().push(event);
    }

    let mut groups: Vec<(&IndividualId, Vec<&Event>)> = groups.into_iter().collect();
    groups.sort_by(|a, b| a.0.cmp(b.0));

    let mut analysis = GapAnalysis { threshold_seconds, ..Default::default() };
    for (id, mut group) in groups {
        // sort_by_key is stable: equal timestamps keep input order
        group.sort_by_key(|event| event.timestamp);

        let spans = spans_of(&group);
        analysis.stats.push(stats_of(id, group.len(), &spans));
        analysis.zero_spans += spans.iter().filter(|span| span.seconds == 0.0).count();
        analysis.gaps.extend(spans.into_iter().filter(|span| span.seconds > threshold_seconds));
    }

    analysis
}

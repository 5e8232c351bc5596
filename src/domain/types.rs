//! Shared types for the telemetry pipeline

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

/// Newtype wrapper for event IDs to provide type safety
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct EventId(pub String);

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Newtype wrapper for tracked individual IDs
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct IndividualId(pub String);

impl std::fmt::Display for IndividualId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Land-cover classification code as returned by the lookup service
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct LandcoverCode(pub String);

impl std::fmt::Display for LandcoverCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Legend mapping land-cover codes to class names. Loaded once per run.
pub type LegendMap = HashMap<LandcoverCode, String>;

/// Class name used when a code is present but missing from the legend
pub const UNKNOWN_CLASS: &str = "Unknown";

/// One GPS fix of a tracked individual
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub event_id: EventId,
    pub individual_id: IndividualId,
    pub timestamp: DateTime<Utc>,
    pub longitude: f64,
    pub latitude: f64,
    /// Set once by the enricher; `None` when never enriched or the lookup failed
    pub landcover_code: Option<LandcoverCode>,
}

impl Event {
    pub fn new(
        event_id: impl Into<String>,
        individual_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        longitude: f64,
        latitude: f64,
    ) -> Self {
        Self {
            event_id: EventId(event_id.into()),
            individual_id: IndividualId(individual_id.into()),
            timestamp,
            longitude,
            latitude,
            landcover_code: None,
        }
    }
}

/// Planar position derived from an event's geographic coordinates
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReprojectedPoint {
    pub event_id: EventId,
    pub easting: f64,
    pub northing: f64,
}

/// Elapsed time between two timestamp-adjacent events of one individual
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSpan {
    pub individual_id: IndividualId,
    pub from_event: EventId,
    pub to_event: EventId,
    pub from_time: DateTime<Utc>,
    pub to_time: DateTime<Utc>,
    pub seconds: f64,
}

/// Per-individual span statistics.
///
/// Individuals with a single event have `span_count == 0` and no min/mean/max.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndividualStats {
    pub individual_id: IndividualId,
    pub event_count: usize,
    pub span_count: usize,
    pub min_seconds: Option<f64>,
    pub mean_seconds: Option<f64>,
    pub max_seconds: Option<f64>,
}

/// Parse a telemetry timestamp.
///
/// Accepts `YYYY-MM-DD HH:MM:SS[.fff]` (interpreted as UTC) and RFC 3339.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    DateTime::parse_from_rfc3339(value).ok().map(|dt| dt.with_timezone(&Utc))
}

/// Fractional seconds from `from` to `to` (negative if `to` is earlier)
#[inline]
pub fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let delta = to.signed_duration_since(from);
    delta.num_seconds() as f64 + f64::from(delta.subsec_nanos()) * 1e-9
}

/// Convert a threshold expressed in hours to seconds
#[inline]
pub fn hours_to_seconds(hours: f64) -> f64 {
    hours * 3600.0
}

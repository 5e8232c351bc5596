//! Error taxonomy
//!
//! Per-record problems (`RecordError`, `LookupFailure`) are recovered locally
//! and only counted. Structural problems (`PipelineError`) abort the run.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from the coordinate reprojector
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordError {
    #[error("invalid coordinate: lon={lon}, lat={lat} is not a finite number pair")]
    InvalidCoordinate { lon: f64, lat: f64 },
    #[error("projection failed for lon={lon}, lat={lat}: {reason}")]
    Projection { lon: f64, lat: f64, reason: &'static str },
}

/// Problems with a single input row; the row is skipped
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordError {
    #[error("row {row}: missing field '{column}'")]
    MissingField { row: u64, column: String },
    #[error("row {row}: invalid coordinate in '{column}': {value:?}")]
    InvalidCoordinate { row: u64, column: String, value: String },
    #[error("row {row}: invalid timestamp {value:?}")]
    InvalidTimestamp { row: u64, value: String },
}

impl RecordError {
    /// Short label used for skip counters
    pub fn kind(&self) -> &'static str {
        match self {
            RecordError::MissingField { .. } => "missing_field",
            RecordError::InvalidCoordinate { .. } => "invalid_coordinate",
            RecordError::InvalidTimestamp { .. } => "invalid_timestamp",
        }
    }
}

/// Why a land-cover lookup failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// Non-2xx HTTP status from the service
    UpstreamStatus(u16),
    /// Service answered with an empty result list
    NoData,
    /// Body was not the expected JSON shape
    Parse(String),
    /// Request never produced a response (connect error, timeout)
    Transport(String),
}

impl FailureReason {
    pub fn kind(&self) -> &'static str {
        match self {
            FailureReason::UpstreamStatus(_) => "upstream_status",
            FailureReason::NoData => "no_data",
            FailureReason::Parse(_) => "parse_error",
            FailureReason::Transport(_) => "transport",
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::UpstreamStatus(code) => write!(f, "upstream status code {}", code),
            FailureReason::NoData => f.write_str("no data"),
            FailureReason::Parse(msg) => write!(f, "parse error: {}", msg),
            FailureReason::Transport(msg) => write!(f, "transport error: {}", msg),
        }
    }
}

/// A failed remote lookup. Never escalated past the enricher.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("lookup failed: {reason}")]
pub struct LookupFailure {
    pub reason: FailureReason,
}

impl LookupFailure {
    pub fn new(reason: FailureReason) -> Self {
        Self { reason }
    }
}

impl From<FailureReason> for LookupFailure {
    fn from(reason: FailureReason) -> Self {
        Self::new(reason)
    }
}

/// Structural failures that abort a run
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("input file not found: {}", .0.display())]
    FileNotFound(PathBuf),
    #[error("required column '{0}' missing from header")]
    MissingColumn(String),
    #[error("legend fetch failed: {0}")]
    Legend(#[source] LookupFailure),
    #[error(transparent)]
    Coord(#[from] CoordError),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

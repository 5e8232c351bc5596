//! Domain models - telemetry events and analysis artifacts
//!
//! This module contains the canonical data types used throughout the system:
//! - `Event` - one GPS fix of a tracked individual
//! - `ReprojectedPoint` - planar position derived from an event
//! - `TimeSpan` / `IndividualStats` - temporal analysis results
//! - `error` - error taxonomy for records, lookups and whole runs

pub mod error;
pub mod types;

pub use error::{CoordError, FailureReason, LookupFailure, PipelineError, RecordError};
pub use types::{
    Event, EventId, IndividualId, IndividualStats, LandcoverCode, LegendMap, ReprojectedPoint,
    TimeSpan, UNKNOWN_CLASS,
};

//! Services - pipeline stages and orchestration
//!
//! - `reproject` - WGS 84 to Web Mercator transform
//! - `enricher` - Bounded-concurrency land-cover lookups
//! - `aggregator` - Per-individual and per-class counts
//! - `gap_analyzer` - Time between fixes and gap detection
//! - `pipeline` - One full run, input to outputs

pub mod aggregator;
pub mod enricher;
pub mod gap_analyzer;
pub mod pipeline;
pub mod reproject;

// Re-export commonly used types
pub use aggregator::{aggregate, Aggregates};
pub use enricher::{EnrichOutcome, EnrichSummary, Enricher};
pub use gap_analyzer::{analyze_gaps, GapAnalysis};
pub use pipeline::{run, RunReport};
pub use reproject::Reprojector;

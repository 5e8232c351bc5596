//! IO modules - external system interfaces
//!
//! This module contains all external IO operations:
//! - `csv_input` - Telemetry CSV ingest with header-keyed columns
//! - `landcover` - HTTP client for the land-cover lookup service
//! - `egress` - Result files (enriched CSV, reprojected points, gaps, JSON report)

pub mod csv_input;
pub mod egress;
pub mod landcover;

// Re-export commonly used types
pub use csv_input::{check_input_path, load_events, truncate_identifier, Dataset, InputOptions};
pub use egress::Egress;
pub use landcover::{HttpLandcoverClient, LandcoverClient};

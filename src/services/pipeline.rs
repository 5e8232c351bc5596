//! One pipeline run, input file to output files
//!
//! Order: load (file check, columns, rows) -> legend -> reproject -> enrich
//! -> aggregate + gap analysis -> write outputs. Every structural failure
//! surfaces before the first output file is created.

use crate::domain::error::PipelineError;
use crate::domain::types::{hours_to_seconds, ReprojectedPoint};
use crate::infra::config::Config;
use crate::infra::metrics::Metrics;
use crate::io::csv_input::{load_events, InputOptions, SkipSummary};
use crate::io::egress::Egress;
use crate::io::landcover::LandcoverClient;
use crate::services::aggregator::{aggregate, Aggregates};
use crate::services::enricher::{EnrichSummary, Enricher};
use crate::services::gap_analyzer::{analyze_gaps, GapAnalysis};
use crate::services::reproject::Reprojector;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Everything a run produced, serialized as the JSON report
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub input: String,
    pub events: usize,
    pub skipped_rows: SkipSummary,
    pub reprojected: usize,
    pub enrichment: EnrichSummary,
    pub counts: Aggregates,
    pub analysis: GapAnalysis,
}

/// Execute a full run and write all outputs
pub async fn run(
    config: &Config,
    client: Arc<dyn LandcoverClient>,
    metrics: Arc<Metrics>,
) -> Result<RunReport, PipelineError> {
    let started = Instant::now();

    let options = InputOptions::from_config(config);
    let dataset = load_events(config.input_path(), &options)?;

    let legend = client.fetch_legend().await.map_err(PipelineError::Legend)?;

    let points: Vec<ReprojectedPoint> = if config.reproject_enabled() {
        let reprojector = Reprojector::web_mercator();
        reprojector.reproject_all(&dataset.events)?
    } else {
        Vec::new()
    };

    let enricher = Enricher::new(client, config.max_in_flight(), Arc::clone(&metrics));
    let outcome = enricher.enrich(dataset.events).await;
    metrics.report().log();

    let events = outcome.events;
    let counts = aggregate(&events, &legend);
    let analysis = analyze_gaps(&events, hours_to_seconds(config.gap_threshold_hours()));

    let egress = Egress::from_config(config);
    egress.write_enriched(&dataset.headers, &dataset.rows, &events)?;
    if config.reproject_enabled() {
        egress.write_reprojected(&points)?;
    }
    egress.write_gaps(&analysis.gaps)?;

    let report = RunReport {
        input: config.input_path().display().to_string(),
        events: events.len(),
        skipped_rows: dataset.skipped,
        reprojected: points.len(),
        enrichment: outcome.summary,
        counts,
        analysis,
    };
    egress.write_report(&report)?;

    info!(
        events = %report.events,
        classified = %report.enrichment.succeeded,
        unclassified = %report.counts.unclassified,
        individuals = %report.analysis.stats.len(),
        gaps = %report.analysis.gaps.len(),
        elapsed_ms = %started.elapsed().as_millis(),
        "run_complete"
    );
    Ok(report)
}

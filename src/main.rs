//! track-enrich - land-cover enrichment and gap analysis for GPS animal tracks
//!
//! Module structure:
//! - `domain/` - Core types (Event, TimeSpan, IndividualStats, errors)
//! - `io/` - External interfaces (CSV input, land-cover service, output files)
//! - `services/` - Pipeline stages (Reprojector, Enricher, Aggregator, GapAnalyzer)
//! - `infra/` - Infrastructure (Config, Metrics, Logging)

use anyhow::Context;
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use track_enrich::infra::{logging, Config, Metrics};
use track_enrich::io::HttpLandcoverClient;
use track_enrich::services::{pipeline, RunReport};

/// Enrich animal GPS fixes with land-cover classes and find tracking gaps
#[derive(Parser, Debug)]
#[command(name = "track-enrich", version, about)]
struct Args {
    /// Path to TOML configuration file (falls back to CONFIG_FILE, then config/dev.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Input CSV file (overrides [input].path)
    #[arg(short, long)]
    input: Option<String>,

    /// Output directory (overrides [output].dir)
    #[arg(short, long)]
    output_dir: Option<String>,

    /// Gap threshold in hours (overrides [analysis].gap_threshold_hours)
    #[arg(long)]
    gap_hours: Option<f64>,

    /// Maximum in-flight lookups (overrides [lookup].max_in_flight)
    #[arg(long)]
    concurrency: Option<usize>,

    /// Land-cover service endpoint (overrides [lookup].endpoint)
    #[arg(long)]
    endpoint: Option<String>,

    /// Skip the reprojection stage
    #[arg(long)]
    no_reproject: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

impl Args {
    fn apply(&self, mut config: Config) -> Config {
        if let Some(input) = &self.input {
            config = config.with_input_path(input);
        }
        if let Some(dir) = &self.output_dir {
            config = config.with_output_dir(dir);
        }
        if let Some(hours) = self.gap_hours {
            config = config.with_gap_threshold_hours(hours);
        }
        if let Some(n) = self.concurrency {
            config = config.with_max_in_flight(n);
        }
        if let Some(endpoint) = &self.endpoint {
            config = config.with_lookup_endpoint(endpoint);
        }
        if self.no_reproject {
            config = config.with_reproject_enabled(false);
        }
        config
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    logging::init(args.log_json);

    info!(version = env!("CARGO_PKG_VERSION"), git = env!("GIT_HASH"), "track-enrich starting");

    let config_path = Config::resolve_config_path(args.config.as_deref());
    let config = args.apply(Config::load_from_path(&config_path));

    info!(
        config_file = %config.config_file(),
        input = %config.input_path().display(),
        output_dir = %config.output_dir().display(),
        endpoint = %config.lookup_endpoint(),
        max_in_flight = %config.max_in_flight(),
        timeout_ms = %config.lookup_timeout_ms(),
        gap_threshold_hours = %config.gap_threshold_hours(),
        reproject = %config.reproject_enabled(),
        "config_loaded"
    );

    match execute(&config).await {
        Ok(report) => {
            print_summary(&report);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %format!("{e:#}"), "run_failed");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn execute(config: &Config) -> anyhow::Result<RunReport> {
    let timeout = Duration::from_millis(config.lookup_timeout_ms());
    let client = HttpLandcoverClient::new(config.lookup_endpoint(), timeout)
        .context("failed to build land-cover client")?;
    let metrics = Arc::new(Metrics::new());

    let report = pipeline::run(config, Arc::new(client), metrics).await?;
    Ok(report)
}

fn print_summary(report: &RunReport) {
    for line in report.counts.individual_lines() {
        println!("{line}");
    }

    println!();
    println!("Land-cover classes:");
    for line in report.counts.class_lines() {
        println!("  {line}");
    }
    if report.counts.unclassified > 0 {
        println!("  (unclassified: {})", report.counts.unclassified);
    }

    println!();
    println!("Time between fixes (seconds):");
    for stats in &report.analysis.stats {
        match (stats.min_seconds, stats.mean_seconds, stats.max_seconds) {
            (Some(min), Some(mean), Some(max)) => println!(
                "  {}: min {:.1}, mean {:.1}, max {:.1} over {} spans",
                stats.individual_id, min, mean, max, stats.span_count
            ),
            _ => println!("  {}: single fix, no spans", stats.individual_id),
        }
    }

    println!();
    println!(
        "{} gaps longer than {:.0} s",
        report.analysis.gaps.len(),
        report.analysis.threshold_seconds
    );
    for gap in &report.analysis.gaps {
        println!(
            "  {}: {} -> {} ({:.0} s)",
            gap.individual_id, gap.from_event, gap.to_event, gap.seconds
        );
    }

    let failed = report.enrichment.failed();
    if failed > 0 || report.skipped_rows.total() > 0 {
        println!();
        println!(
            "{} of {} lookups failed, {} input rows skipped",
            failed,
            report.enrichment.requested,
            report.skipped_rows.total()
        );
    }
}

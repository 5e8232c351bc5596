//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument
//! 2. CONFIG_FILE environment variable
//! 3. Default: config/dev.toml

use anyhow::Context;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct InputConfig {
    #[serde(default = "default_input_path")]
    pub path: String,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self { path: default_input_path(), delimiter: default_delimiter() }
    }
}

fn default_input_path() -> String {
    "input/tracks.csv".to_string()
}

fn default_delimiter() -> char {
    ','
}

/// Header names of the logical input columns
#[derive(Debug, Clone, Deserialize)]
pub struct ColumnsConfig {
    #[serde(default = "default_event_id_column")]
    pub event_id: String,
    #[serde(default = "default_individual_column")]
    pub individual: String,
    #[serde(default = "default_longitude_column")]
    pub longitude: String,
    #[serde(default = "default_latitude_column")]
    pub latitude: String,
    #[serde(default = "default_timestamp_column")]
    pub timestamp: String,
}

impl Default for ColumnsConfig {
    fn default() -> Self {
        Self {
            event_id: default_event_id_column(),
            individual: default_individual_column(),
            longitude: default_longitude_column(),
            latitude: default_latitude_column(),
            timestamp: default_timestamp_column(),
        }
    }
}

fn default_event_id_column() -> String {
    "event-id".to_string()
}

fn default_individual_column() -> String {
    "individual-taxon-canonical-name".to_string()
}

fn default_longitude_column() -> String {
    "location-long".to_string()
}

fn default_latitude_column() -> String {
    "location-lat".to_string()
}

fn default_timestamp_column() -> String {
    "timestamp".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct NormalizeConfig {
    /// Column to truncate; defaults to the individual column
    #[serde(default)]
    pub truncate_column: Option<String>,
    /// Number of characters to keep (0 disables truncation)
    #[serde(default = "default_truncate_width")]
    pub truncate_width: usize,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self { truncate_column: None, truncate_width: default_truncate_width() }
    }
}

fn default_truncate_width() -> usize {
    4
}

#[derive(Debug, Clone, Deserialize)]
pub struct LookupConfig {
    #[serde(default = "default_lookup_endpoint")]
    pub endpoint: String,
    /// Upper bound on concurrent in-flight lookup requests
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
    #[serde(default = "default_lookup_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            endpoint: default_lookup_endpoint(),
            max_in_flight: default_max_in_flight(),
            timeout_ms: default_lookup_timeout_ms(),
        }
    }
}

fn default_lookup_endpoint() -> String {
    "http://localhost:9300/landcover".to_string()
}

fn default_max_in_flight() -> usize {
    200
}

fn default_lookup_timeout_ms() -> u64 {
    10_000
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReprojectConfig {
    #[serde(default = "default_reproject_enabled")]
    pub enabled: bool,
}

impl Default for ReprojectConfig {
    fn default() -> Self {
        Self { enabled: default_reproject_enabled() }
    }
}

fn default_reproject_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    /// Spans longer than this are flagged as gaps
    #[serde(default = "default_gap_threshold_hours")]
    pub gap_threshold_hours: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self { gap_threshold_hours: default_gap_threshold_hours() }
    }
}

fn default_gap_threshold_hours() -> f64 {
    1.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: String,
    #[serde(default = "default_enriched_file")]
    pub enriched_file: String,
    #[serde(default = "default_reprojected_file")]
    pub reprojected_file: String,
    #[serde(default = "default_report_file")]
    pub report_file: String,
    #[serde(default = "default_gaps_file")]
    pub gaps_file: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            enriched_file: default_enriched_file(),
            reprojected_file: default_reprojected_file(),
            report_file: default_report_file(),
            gaps_file: default_gaps_file(),
        }
    }
}

fn default_output_dir() -> String {
    "output".to_string()
}

fn default_enriched_file() -> String {
    "enriched.csv".to_string()
}

fn default_reprojected_file() -> String {
    "reprojected.csv".to_string()
}

fn default_report_file() -> String {
    "report.json".to_string()
}

fn default_gaps_file() -> String {
    "gaps.csv".to_string()
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub columns: ColumnsConfig,
    #[serde(default)]
    pub normalize: NormalizeConfig,
    #[serde(default)]
    pub lookup: LookupConfig,
    #[serde(default)]
    pub reproject: ReprojectConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    config_file: String,
    input_path: PathBuf,
    delimiter: u8,
    columns: ColumnsConfig,
    truncate_column: Option<String>,
    truncate_width: usize,
    lookup_endpoint: String,
    max_in_flight: usize,
    lookup_timeout_ms: u64,
    reproject_enabled: bool,
    gap_threshold_hours: f64,
    output_dir: PathBuf,
    enriched_file: String,
    reprojected_file: String,
    report_file: String,
    gaps_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_toml(TomlConfig::default(), "default".to_string())
    }
}

impl Config {
    /// Determine config file path: explicit argument, then CONFIG_FILE, then default
    pub fn resolve_config_path(cli_path: Option<&str>) -> String {
        if let Some(path) = cli_path {
            return path.to_string();
        }

        if let Ok(path) = env::var("CONFIG_FILE") {
            return path;
        }

        "config/dev.toml".to_string()
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(Self::from_toml(toml_config, path.display().to_string()))
    }

    /// Load configuration from a path, falling back to defaults on any error
    pub fn load_from_path(path: &str) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: {:#}. Using defaults.", e);
                Self::default()
            }
        }
    }

    fn from_toml(toml_config: TomlConfig, config_file: String) -> Self {
        // Non-ASCII delimiters cannot be expressed as a single csv byte
        let delimiter = u8::try_from(toml_config.input.delimiter)
            .ok()
            .filter(u8::is_ascii)
            .unwrap_or(b',');

        Self {
            config_file,
            input_path: PathBuf::from(toml_config.input.path),
            delimiter,
            columns: toml_config.columns,
            truncate_column: toml_config.normalize.truncate_column,
            truncate_width: toml_config.normalize.truncate_width,
            lookup_endpoint: toml_config.lookup.endpoint,
            max_in_flight: toml_config.lookup.max_in_flight.max(1),
            lookup_timeout_ms: toml_config.lookup.timeout_ms,
            reproject_enabled: toml_config.reproject.enabled,
            gap_threshold_hours: toml_config.analysis.gap_threshold_hours,
            output_dir: PathBuf::from(toml_config.output.dir),
            enriched_file: toml_config.output.enriched_file,
            reprojected_file: toml_config.output.reprojected_file,
            report_file: toml_config.output.report_file,
            gaps_file: toml_config.output.gaps_file,
        }
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    pub fn delimiter(&self) -> u8 {
        self.delimiter
    }

    pub fn columns(&self) -> &ColumnsConfig {
        &self.columns
    }

    /// Column shortened in written rows; the individual column unless overridden
    pub fn truncate_column(&self) -> &str {
        self.truncate_column.as_deref().unwrap_or(&self.columns.individual)
    }

    pub fn truncate_width(&self) -> usize {
        self.truncate_width
    }

    pub fn lookup_endpoint(&self) -> &str {
        &self.lookup_endpoint
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    pub fn lookup_timeout_ms(&self) -> u64 {
        self.lookup_timeout_ms
    }

    pub fn reproject_enabled(&self) -> bool {
        self.reproject_enabled
    }

    pub fn gap_threshold_hours(&self) -> f64 {
        self.gap_threshold_hours
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn enriched_path(&self) -> PathBuf {
        self.output_dir.join(&self.enriched_file)
    }

    pub fn reprojected_path(&self) -> PathBuf {
        self.output_dir.join(&self.reprojected_file)
    }

    pub fn report_path(&self) -> PathBuf {
        self.output_dir.join(&self.report_file)
    }

    pub fn gaps_path(&self) -> PathBuf {
        self.output_dir.join(&self.gaps_file)
    }

    // CLI overrides

    pub fn with_input_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.input_path = path.into();
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_gap_threshold_hours(mut self, hours: f64) -> Self {
        self.gap_threshold_hours = hours;
        self
    }

    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    pub fn with_lookup_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.lookup_endpoint = endpoint.into();
        self
    }

    pub fn with_reproject_enabled(mut self, enabled: bool) -> Self {
        self.reproject_enabled = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.config_file(), "default");
        assert_eq!(config.delimiter(), b',');
        assert_eq!(config.columns().event_id, "event-id");
        assert_eq!(config.columns().individual, "individual-taxon-canonical-name");
        assert_eq!(config.truncate_width(), 4);
        assert_eq!(config.max_in_flight(), 200);
        assert_eq!(config.lookup_timeout_ms(), 10_000);
        assert!(config.reproject_enabled());
        assert_eq!(config.gap_threshold_hours(), 1.0);
    }

    #[test]
    fn test_truncate_column_defaults_to_individual() {
        let config = Config::default();
        assert_eq!(config.truncate_column(), "individual-taxon-canonical-name");
    }

    #[test]
    fn test_output_paths_join_dir() {
        let config = Config::default().with_output_dir("/tmp/out");
        assert_eq!(config.enriched_path(), PathBuf::from("/tmp/out/enriched.csv"));
        assert_eq!(config.report_path(), PathBuf::from("/tmp/out/report.json"));
        assert_eq!(config.gaps_path(), PathBuf::from("/tmp/out/gaps.csv"));
    }

    #[test]
    fn test_max_in_flight_never_zero() {
        let config = Config::default().with_max_in_flight(0);
        assert_eq!(config.max_in_flight(), 1);
    }

    #[test]
    fn test_non_ascii_delimiter_falls_back_to_comma() {
        let toml_config: TomlConfig = toml::from_str("[input]\ndelimiter = \"§\"\n").unwrap();
        let config = Config::from_toml(toml_config, "test".into());
        assert_eq!(config.delimiter(), b',');
    }

    #[test]
    fn test_resolve_config_path_prefers_cli() {
        assert_eq!(Config::resolve_config_path(Some("config/bats.toml")), "config/bats.toml");
    }

    #[test]
    fn test_load_from_path_fallback() {
        let config = Config::load_from_path("/nonexistent/track-enrich.toml");
        assert_eq!(config.config_file(), "default");
        assert_eq!(config.max_in_flight(), 200);
    }
}

//! Telemetry CSV ingest
//!
//! Columns are resolved by header name once, then every row is parsed into an
//! `Event`. Rows that cannot be parsed are skipped and counted; a missing
//! required header aborts the load.

use crate::domain::error::{PipelineError, RecordError};
use crate::domain::types::{parse_timestamp, Event};
use crate::infra::config::{ColumnsConfig, Config};
use csv::StringRecord;
use serde::Serialize;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Options controlling how an input file is read
#[derive(Debug, Clone)]
pub struct InputOptions {
    pub delimiter: u8,
    pub columns: ColumnsConfig,
    pub truncate_column: Option<String>,
    pub truncate_width: usize,
}

impl Default for InputOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl InputOptions {
    pub fn from_config(config: &Config) -> Self {
        let truncate_column =
            (config.truncate_width() > 0).then(|| config.truncate_column().to_string());
        Self {
            delimiter: config.delimiter(),
            columns: config.columns().clone(),
            truncate_column,
            truncate_width: config.truncate_width(),
        }
    }
}

/// Positions of the logical columns within a header row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnIndex {
    pub event_id: usize,
    pub individual: usize,
    pub longitude: usize,
    pub latitude: usize,
    pub timestamp: usize,
    pub truncate: Option<usize>,
}

impl ColumnIndex {
    /// Resolve every required column by name
    pub fn resolve(headers: &StringRecord, options: &InputOptions) -> Result<Self, PipelineError> {
        let columns = &options.columns;
        let truncate = match &options.truncate_column {
            Some(name) => Some(find_column(headers, name)?),
            None => None,
        };

        Ok(Self {
            event_id: find_column(headers, &columns.event_id)?,
            individual: find_column(headers, &columns.individual)?,
            longitude: find_column(headers, &columns.longitude)?,
            latitude: find_column(headers, &columns.latitude)?,
            timestamp: find_column(headers, &columns.timestamp)?,
            truncate,
        })
    }
}

fn find_column(headers: &StringRecord, name: &str) -> Result<usize, PipelineError> {
    headers
        .iter()
        .position(|h| normalize_header(h) == name)
        .ok_or_else(|| PipelineError::MissingColumn(name.to_string()))
}

/// Strip whitespace and a UTF-8 byte order mark from a header cell
fn normalize_header(header: &str) -> &str {
    header.trim().trim_start_matches('\u{feff}')
}

/// Keep only the first `width` characters of an identifier
pub fn truncate_identifier(value: &str, width: usize) -> &str {
    match value.char_indices().nth(width) {
        Some((byte_idx, _)) => &value[..byte_idx],
        None => value,
    }
}

/// Rows dropped during load, by cause
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SkipSummary {
    pub missing_field: usize,
    pub invalid_coordinate: usize,
    pub invalid_timestamp: usize,
}

impl SkipSummary {
    pub fn record(&mut self, err: &RecordError) {
        match err {
            RecordError::MissingField { .. } => self.missing_field += 1,
            RecordError::InvalidCoordinate { .. } => self.invalid_coordinate += 1,
            RecordError::InvalidTimestamp { .. } => self.invalid_timestamp += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.missing_field + self.invalid_coordinate + self.invalid_timestamp
    }
}

/// Parsed input: raw rows kept alongside their events, index for index
#[derive(Debug, Clone)]
pub struct Dataset {
    pub headers: StringRecord,
    pub rows: Vec<StringRecord>,
    pub events: Vec<Event>,
    pub skipped: SkipSummary,
}

/// Confirm the input file exists before anything else happens
pub fn check_input_path(path: &Path) -> Result<PathBuf, PipelineError> {
    if !path.is_file() {
        return Err(PipelineError::FileNotFound(path.to_path_buf()));
    }
    let resolved = path.canonicalize()?;
    info!(path = %resolved.display(), "input_file_found");
    Ok(resolved)
}

/// Load events from a file on disk
pub fn load_events(path: &Path, options: &InputOptions) -> Result<Dataset, PipelineError> {
    let path = check_input_path(path)?;
    let file = File::open(&path)?;
    let dataset = read_events(file, options)?;

    info!(
        path = %path.display(),
        events = %dataset.events.len(),
        skipped = %dataset.skipped.total(),
        "input_loaded"
    );
    Ok(dataset)
}

/// Parse events from any reader
pub fn read_events<R: Read>(reader: R, options: &InputOptions) -> Result<Dataset, PipelineError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(options.delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    let index = ColumnIndex::resolve(&headers, options)?;
    debug!(?index, "columns_resolved");

    let mut rows = Vec::new();
    let mut events = Vec::new();
    let mut skipped = SkipSummary::default();

    for (i, record) in reader.records().enumerate() {
        let record = record?;
        let line = record.position().map_or(i as u64 + 2, |p| p.line());

        // Grouping uses the full identifier; only the written row is shortened
        match parse_event(&record, &index, &options.columns, line) {
            Ok(event) => {
                let record = fit_to_width(&record, headers.len(), line);
                let record = match index.truncate {
                    Some(col) => truncate_field(&record, col, options.truncate_width),
                    None => record,
                };
                rows.push(record);
                events.push(event);
            }
            Err(e) => {
                debug!(error = %e, "row_skipped");
                skipped.record(&e);
            }
        }
    }

    if skipped.total() > 0 {
        warn!(
            missing_field = %skipped.missing_field,
            invalid_coordinate = %skipped.invalid_coordinate,
            invalid_timestamp = %skipped.invalid_timestamp,
            "rows_skipped"
        );
    }

    Ok(Dataset { headers, rows, events, skipped })
}

/// Pad or cut a row to the header width so appended columns line up
fn fit_to_width(record: &StringRecord, width: usize, row: u64) -> StringRecord {
    if record.len() == width {
        return record.clone();
    }
    debug!(row = %row, fields = %record.len(), expected = %width, "row_width_adjusted");
    (0..width).map(|i| record.get(i).unwrap_or("")).collect()
}

fn truncate_field(record: &StringRecord, col: usize, width: usize) -> StringRecord {
    record
        .iter()
        .enumerate()
        .map(|(i, field)| if i == col { truncate_identifier(field, width) } else { field })
        .collect()
}

fn parse_event(
    record: &StringRecord,
    index: &ColumnIndex,
    columns: &ColumnsConfig,
    row: u64,
) -> Result<Event, RecordError> {
    let field = |idx: usize, column: &str| required_field(record, idx, column, row);

    let event_id = field(index.event_id, &columns.event_id)?;
    let individual = field(index.individual, &columns.individual)?;
    let longitude =
        parse_coordinate(field(index.longitude, &columns.longitude)?, &columns.longitude, row)?;
    let latitude =
        parse_coordinate(field(index.latitude, &columns.latitude)?, &columns.latitude, row)?;
    let raw_ts = field(index.timestamp, &columns.timestamp)?;
    let timestamp = parse_timestamp(raw_ts)
        .ok_or_else(|| RecordError::InvalidTimestamp { row, value: raw_ts.to_string() })?;

    Ok(Event::new(event_id, individual, timestamp, longitude, latitude))
}

fn required_field<'a>(
    record: &'a StringRecord,
    idx: usize,
    column: &str,
    row: u64,
) -> Result<&'a str, RecordError> {
    record
        .get(idx)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| RecordError::MissingField { row, column: column.to_string() })
}

fn parse_coordinate(value: &str, column: &str, row: u64) -> Result<f64, RecordError> {
    value.parse::<f64>().ok().filter(|v| v.is_finite()).ok_or_else(|| {
        RecordError::InvalidCoordinate { row, column: column.to_string(), value: value.to_string() }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "event-id,timestamp,location-long,location-lat,individual-taxon-canonical-name";

    fn read(body: &str) -> Result<Dataset, PipelineError> {
        let input = format!("{HEADER}\n{body}");
        read_events(input.as_bytes(), &InputOptions::default())
    }

    #[test]
    fn test_truncate_identifier() {
        assert_eq!(truncate_identifier("Tadarida teniotis", 4), "Tada");
        assert_eq!(truncate_identifier("abc", 4), "abc");
        assert_eq!(truncate_identifier("", 4), "");
        assert_eq!(truncate_identifier("abcd", 0), "");
    }

    #[test]
    fn test_truncate_identifier_respects_char_boundaries() {
        assert_eq!(truncate_identifier("Ñandú-7", 4), "Ñand");
    }

    #[test]
    fn test_reads_events_by_header_name() {
        let dataset = read(
            "1,2019-05-02 21:54:53.000,14.21,40.85,Tadarida teniotis\n\
             2,2019-05-02 21:55:53.000,14.22,40.86,Tadarida teniotis\n",
        )
        .unwrap();

        assert_eq!(dataset.events.len(), 2);
        assert_eq!(dataset.rows.len(), 2);
        let first = &dataset.events[0];
        assert_eq!(first.event_id.0, "1");
        assert_eq!(first.individual_id.0, "Tadarida teniotis");
        assert_eq!(first.longitude, 14.21);
        assert_eq!(first.latitude, 40.85);
        assert!(first.landcover_code.is_none());
    }

    #[test]
    fn test_truncation_is_applied_to_raw_row() {
        let dataset = read("1,2019-05-02 21:54:53,14.21,40.85,Tadarida teniotis\n").unwrap();
        assert_eq!(dataset.rows[0].get(4), Some("Tada"));
    }

    #[test]
    fn test_shared_prefix_keeps_individuals_apart() {
        let dataset = read(
            "1,2019-05-02 20:00:00,14.0,40.0,bat-1\n\
             2,2019-05-02 20:00:00,14.0,40.0,bat-2\n",
        )
        .unwrap();

        assert_eq!(dataset.events[0].individual_id.0, "bat-1");
        assert_eq!(dataset.events[1].individual_id.0, "bat-2");
        assert_eq!(dataset.rows[0].get(4), Some("bat-"));
        assert_eq!(dataset.rows[1].get(4), Some("bat-"));
    }

    #[test]
    fn test_rows_are_fitted_to_header_width() {
        let dataset = read(
            "1,2019-05-02 20:00:00,14.0,40.0,bat-1,extra,more\n\
             2,2019-05-02 20:00:00,14.0,40.0,bat-1\n",
        )
        .unwrap();

        assert_eq!(dataset.events.len(), 2);
        assert_eq!(dataset.rows[0].len(), 5);
        assert_eq!(dataset.rows[0].get(4), Some("bat-"));
        assert_eq!(dataset.rows[1].len(), 5);

        let input = "event-id,timestamp,location-long,location-lat,individual-taxon-canonical-name,note\n\
                     1,2019-05-02 20:00:00,14.0,40.0,bat-1\n";
        let dataset = read_events(input.as_bytes(), &InputOptions::default()).unwrap();
        assert_eq!(dataset.rows[0].len(), 6);
        assert_eq!(dataset.rows[0].get(5), Some(""));
    }

    #[test]
    fn test_column_order_does_not_matter() {
        let input = "individual-taxon-canonical-name;location-lat;location-long;timestamp;event-id\n\
                     bat-1;40.0;14.0;2019-05-02 21:54:53;e1\n";
        let options = InputOptions { delimiter: b';', truncate_column: None, ..Default::default() };
        let dataset = read_events(input.as_bytes(), &options).unwrap();
        let event = &dataset.events[0];
        assert_eq!(event.event_id.0, "e1");
        assert_eq!(event.individual_id.0, "bat-1");
        assert_eq!(event.longitude, 14.0);
        assert_eq!(event.latitude, 40.0);
    }

    #[test]
    fn test_missing_column_is_fatal() {
        let input = "event-id,timestamp,location-lat,individual-taxon-canonical-name\n";
        let err = read_events(input.as_bytes(), &InputOptions::default()).unwrap_err();
        assert!(matches!(err, PipelineError::MissingColumn(ref c) if c == "location-long"));
    }

    #[test]
    fn test_header_with_bom_and_whitespace() {
        let input = "\u{feff}event-id, timestamp ,location-long,location-lat,individual-taxon-canonical-name\n\
                     1,2019-05-02 21:54:53,14.0,40.0,bat-1\n";
        let dataset = read_events(input.as_bytes(), &InputOptions::default()).unwrap();
        assert_eq!(dataset.events.len(), 1);
    }

    #[test]
    fn test_bad_rows_are_skipped_and_counted() {
        let dataset = read(
            "1,2019-05-02 21:54:53,14.0,40.0,bat-1\n\
             2,2019-05-02 21:55:53,,40.0,bat-1\n\
             3,2019-05-02 21:56:53,abc,40.0,bat-1\n\
             4,not a time,14.0,40.0,bat-1\n\
             5,2019-05-02 21:57:53,NaN,40.0,bat-1\n\
             6,2019-05-02 21:58:53,14.0\n",
        )
        .unwrap();

        assert_eq!(dataset.events.len(), 1);
        assert_eq!(dataset.rows.len(), 1);
        assert_eq!(
            dataset.skipped,
            SkipSummary { missing_field: 2, invalid_coordinate: 2, invalid_timestamp: 1 }
        );
        assert_eq!(dataset.skipped.total(), 5);
    }

    #[test]
    fn test_check_input_path_missing_file() {
        let err = check_input_path(Path::new("/nonexistent/tracks.csv")).unwrap_err();
        assert!(matches!(err, PipelineError::FileNotFound(_)));
    }

    #[test]
    fn test_load_events_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracks.csv");
        let body = format!("{HEADER}\n1,2019-05-02 21:54:53,14.0,40.0,bat-1\n");
        std::fs::write(&path, body).unwrap();

        let dataset = load_events(&path, &InputOptions::default()).unwrap();
        assert_eq!(dataset.events.len(), 1);
        assert_eq!(dataset.headers.len(), 5);
    }
}

//! Result egress - writes run outputs to the output directory
//!
//! - enriched table: original columns plus a trailing `landcover` column
//! - reprojected points: `event-id,easting,northing`
//! - flagged gaps: one row per span over the threshold
//! - run report: pretty JSON

use crate::domain::error::PipelineError;
use crate::domain::types::{Event, ReprojectedPoint, TimeSpan};
use crate::infra::config::Config;
use csv::StringRecord;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::info;

pub const LANDCOVER_COLUMN: &str = "landcover";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";
const GAPS_HEADER: [&str; 6] =
    ["individual", "from_event", "to_event", "from_time", "to_time", "seconds"];

/// Egress writer for one run's outputs
pub struct Egress {
    enriched_path: PathBuf,
    reprojected_path: PathBuf,
    gaps_path: PathBuf,
    report_path: PathBuf,
    delimiter: u8,
}

impl Egress {
    pub fn from_config(config: &Config) -> Self {
        let egress = Self {
            enriched_path: config.enriched_path(),
            reprojected_path: config.reprojected_path(),
            gaps_path: config.gaps_path(),
            report_path: config.report_path(),
            delimiter: config.delimiter(),
        };
        info!(dir = %config.output_dir().display(), "egress_initialized");
        egress
    }

    pub fn enriched_path(&self) -> &Path {
        &self.enriched_path
    }

    pub fn reprojected_path(&self) -> &Path {
        &self.reprojected_path
    }

    pub fn gaps_path(&self) -> &Path {
        &self.gaps_path
    }

    pub fn report_path(&self) -> &Path {
        &self.report_path
    }

    /// Write input rows with their land-cover code appended.
    /// `rows[i]` must belong to `events[i]`. Missing codes are written empty.
    pub fn write_enriched(
        &self,
        headers: &StringRecord,
        rows: &[StringRecord],
        events: &[Event],
    ) -> Result<usize, PipelineError> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .flexible(true)
            .from_writer(create_file(&self.enriched_path)?);

        let mut header = headers.clone();
        header.push_field(LANDCOVER_COLUMN);
        writer.write_record(&header)?;

        let mut written = 0;
        for (row, event) in rows.iter().zip(events) {
            let mut out = row.clone();
            out.push_field(event.landcover_code.as_ref().map_or("", |code| code.0.as_str()));
            writer.write_record(&out)?;
            written += 1;
        }
        writer.flush()?;

        info!(file = %self.enriched_path.display(), rows = %written, "enriched_written");
        Ok(written)
    }

    pub fn write_reprojected(&self, points: &[ReprojectedPoint]) -> Result<usize, PipelineError> {
        let mut writer = csv::Writer::from_writer(create_file(&self.reprojected_path)?);
        writer.write_record(["event-id", "easting", "northing"])?;
        for point in points {
            writer.write_record([
                point.event_id.0.clone(),
                point.easting.to_string(),
                point.northing.to_string(),
            ])?;
        }
        writer.flush()?;

        info!(
            file = %self.reprojected_path.display(),
            rows = %points.len(),
            "reprojected_written"
        );
        Ok(points.len())
    }

    pub fn write_gaps(&self, gaps: &[TimeSpan]) -> Result<usize, PipelineError> {
        let mut writer = csv::Writer::from_writer(create_file(&self.gaps_path)?);
        writer.write_record(GAPS_HEADER)?;
        for gap in gaps {
            writer.write_record([
                gap.individual_id.0.clone(),
                gap.from_event.0.clone(),
                gap.to_event.0.clone(),
                gap.from_time.format(TIMESTAMP_FORMAT).to_string(),
                gap.to_time.format(TIMESTAMP_FORMAT).to_string(),
                gap.seconds.to_string(),
            ])?;
        }
        writer.flush()?;

        info!(file = %self.gaps_path.display(), gaps = %gaps.len(), "gaps_written");
        Ok(gaps.len())
    }

    pub fn write_report<T: Serialize>(&self, report: &T) -> Result<(), PipelineError> {
        let file = create_file(&self.report_path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), report)?;
        info!(file = %self.report_path.display(), "report_written");
        Ok(())
    }
}

/// Create (truncate) a file, making parent directories as needed
fn create_file(path: &Path) -> Result<File, PipelineError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(File::create(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{EventId, IndividualId, LandcoverCode};
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    fn egress_in(dir: &Path) -> Egress {
        Egress::from_config(&Config::default().with_output_dir(dir.join("out")))
    }

    #[test]
    fn test_write_enriched_appends_landcover_column() {
        let dir = tempdir().unwrap();
        let egress = egress_in(dir.path());

        let headers = StringRecord::from(vec!["event-id", "location-long"]);
        let rows =
            vec![StringRecord::from(vec!["1", "14.0"]), StringRecord::from(vec!["2", "14.1"])];
        let ts = Utc.with_ymd_and_hms(2019, 5, 2, 20, 0, 0).unwrap();
        let mut first = Event::new("1", "bat-1", ts, 14.0, 40.0);
        first.landcover_code = Some(LandcoverCode("311".into()));
        let events = vec![first, Event::new("2", "bat-1", ts, 14.1, 40.0)];

        let written = egress.write_enriched(&headers, &rows, &events).unwrap();
        assert_eq!(written, 2);

        let content = std::fs::read_to_string(egress.enriched_path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines, vec!["event-id,location-long,landcover", "1,14.0,311", "2,14.1,"]);
    }

    #[test]
    fn test_write_gaps() {
        let dir = tempdir().unwrap();
        let egress = egress_in(dir.path());
        let from = Utc.with_ymd_and_hms(2019, 5, 2, 20, 30, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2019, 5, 2, 22, 30, 0).unwrap();
        let gap = TimeSpan {
            individual_id: IndividualId("bat-1".into()),
            from_event: EventId("3".into()),
            to_event: EventId("5".into()),
            from_time: from,
            to_time: to,
            seconds: 7200.0,
        };

        egress.write_gaps(&[gap]).unwrap();

        let content = std::fs::read_to_string(egress.gaps_path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "individual,from_event,to_event,from_time,to_time,seconds");
        assert_eq!(lines[1], "bat-1,3,5,2019-05-02 20:30:00.000,2019-05-02 22:30:00.000,7200");
    }

    #[test]
    fn test_write_reprojected() {
        let dir = tempdir().unwrap();
        let egress = egress_in(dir.path());
        let points =
            vec![ReprojectedPoint { event_id: EventId("1".into()), easting: 1.5, northing: -2.0 }];

        assert_eq!(egress.write_reprojected(&points).unwrap(), 1);
        let content = std::fs::read_to_string(egress.reprojected_path()).unwrap();
        assert_eq!(content, "event-id,easting,northing\n1,1.5,-2\n");
    }

    #[test]
    fn test_write_report_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let egress = egress_in(dir.path());
        assert!(!dir.path().join("out").exists());

        egress.write_report(&serde_json::json!({ "events": 3 })).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(egress.report_path()).unwrap()).unwrap();
        assert_eq!(value["events"], 3);
    }

    #[test]
    fn test_rewrite_truncates_previous_output() {
        let dir = tempdir().unwrap();
        let egress = egress_in(dir.path());
        egress.write_gaps(&[]).unwrap();
        egress.write_gaps(&[]).unwrap();

        let content = std::fs::read_to_string(egress.gaps_path()).unwrap();
        assert_eq!(content.lines().count(), 1);
    }
}

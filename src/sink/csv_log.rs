use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::Sink;
use crate::decision::ThresholdVerdict;
use crate::observation::{format_optional, SensorReading};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One persisted line: `timestamp,temperature,humidity,soil,light`.
#[derive(Clone, Debug, PartialEq)]
pub struct LogRecord {
    pub timestamp: String,
    pub temperature: Option<f32>,
    pub humidity: Option<f32>,
    pub soil_state: &'static str,
    pub light_state: &'static str,
}

impl LogRecord {
    pub fn from_reading(reading: &SensorReading) -> Self {
        Self {
            timestamp: reading.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            temperature: reading.temperature,
            humidity: reading.humidity,
            soil_state: reading.soil_state(),
            light_state: reading.light_state(),
        }
    }

    pub fn to_line(&self) -> String {
        format!(
            "{},{},{},{},{}\n",
            self.timestamp,
            format_optional(self.temperature),
            format_optional(self.humidity),
            self.soil_state,
            self.light_state
        )
    }
}

/// Append-only reading log. Existing content is never truncated.
pub struct LogSink {
    path: PathBuf,
    file: File,
    records: u64,
}

impl LogSink {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("open reading log {}", path.display()))?;
        log::info!("LogSink: appending to {}", path.display());
        Ok(Self {
            path,
            file,
            records: 0,
        })
    }

    pub fn records_written(&self) -> u64 {
        self.records
    }

    pub fn append(&mut self, record: &LogRecord) -> Result<()> {
        // One write per line keeps concurrent appenders from interleaving.
        self.file
            .write_all(record.to_line().as_bytes())
            .and_then(|_| self.file.flush())
            .with_context(|| format!("append to {}", self.path.display()))?;
        self.records += 1;
        Ok(())
    }
}

impl Sink<SensorReading, ThresholdVerdict> for LogSink {
    fn name(&self) -> &'static str {
        "log"
    }

    fn consume(&mut self, reading: &SensorReading, _verdict: &ThresholdVerdict) -> Result<()> {
        self.append(&LogRecord::from_reading(reading))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::Reason;
    use crate::process::{evaluate_thresholds, Thresholds};
    use chrono::{Local, TimeZone};

    fn reading(temperature: Option<f32>) -> SensorReading {
        SensorReading {
            temperature,
            humidity: Some(45.5),
            soil_wet: true,
            light_good: false,
            soil_read_failed: false,
            light_read_failed: false,
            timestamp: Local.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap(),
        }
    }

    #[test]
    fn record_has_fixed_field_order() {
        let line = LogRecord::from_reading(&reading(Some(31.25))).to_line();
        assert_eq!(line, "2024-05-01 08:30:00,31.25,45.5,Wet,Low\n");
    }

    #[test]
    fn absent_reading_is_written_as_marker() {
        let line = LogRecord::from_reading(&reading(None)).to_line();
        assert_eq!(line, "2024-05-01 08:30:00,N/A,45.5,Wet,Low\n");
    }

    #[test]
    fn unreadable_soil_is_logged_as_marker_but_still_alerts() {
        let mut unreadable = reading(Some(21.0));
        unreadable.soil_wet = false;
        unreadable.soil_read_failed = true;

        let line = LogRecord::from_reading(&unreadable).to_line();
        assert_eq!(line, "2024-05-01 08:30:00,21,45.5,N/A,Low\n");

        let verdict = evaluate_thresholds(&unreadable, &Thresholds::default());
        assert!(verdict.reasons.contains(&Reason::DrySoil));
    }

    #[test]
    fn reopening_appends_instead_of_truncating() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("readings.csv");
        std::fs::write(&path, "earlier,line\n").unwrap();

        let mut sink = LogSink::open(&path).unwrap();
        sink.consume(&reading(Some(20.0)), &ThresholdVerdict::default())
            .unwrap();
        drop(sink);
        let mut sink = LogSink::open(&path).unwrap();
        sink.consume(&reading(None), &ThresholdVerdict::default())
            .unwrap();
        assert_eq!(sink.records_written(), 1);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "earlier,line");
        assert!(lines[1].contains(",20,"));
        assert!(lines[2].contains(",N/A,"));
    }
}

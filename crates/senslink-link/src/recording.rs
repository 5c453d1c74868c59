//! Recording sinks for measurement samples.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tracing::debug;

use crate::error::SinkError;
use crate::message::{Contact, Sample};

const CSV_HEADER: &str = "timestamp_ms,adc_raw,voltage_v,status,host_time_ms";

/// One recorded sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SampleRecord {
    pub timestamp_ms: u32,
    pub adc_raw: u16,
    pub voltage: f64,
    pub contact: Contact,
    /// Host wall clock when the sample was dispatched, ms since the Unix epoch.
    pub host_time_ms: u64,
}

impl SampleRecord {
    /// Stamp `sample` with the current host time.
    pub fn now(sample: &Sample) -> Self {
        let host_time_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            timestamp_ms: sample.timestamp_ms,
            adc_raw: sample.adc_raw,
            voltage: sample.voltage,
            contact: sample.contact,
            host_time_ms,
        }
    }
}

/// Append-only destination for samples while recording is on.
///
/// A sink is opened by the caller, handed to the reader thread for the
/// duration of the recording and closed by it. Errors are reported to the
/// reader, which logs them and carries on.
pub trait RecordingSink: Send {
    fn append(&mut self, record: &SampleRecord) -> Result<(), SinkError>;

    /// Flush and release the sink.
    fn close(self: Box<Self>) -> Result<(), SinkError>;

    /// Name for logs.
    fn describe(&self) -> String;
}

/// Writes samples to a CSV file.
#[derive(Debug)]
pub struct CsvRecorder {
    out: BufWriter<File>,
    path: PathBuf,
}

impl CsvRecorder {
    /// Create `sensor_data_<unix-seconds>.csv` in `dir`. A numeric suffix is
    /// added when a recording with the same name already exists.
    pub fn create(dir: impl AsRef<Path>) -> Result<Self, SinkError> {
        let dir = dir.as_ref();
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        let mut suffix = 0u32;
        loop {
            let name = if suffix == 0 {
                format!("sensor_data_{stamp}.csv")
            } else {
                format!("sensor_data_{stamp}_{suffix}.csv")
            };
            match Self::create_new(dir.join(name)) {
                Err(SinkError::Open { source, .. })
                    if source.kind() == ErrorKind::AlreadyExists && suffix < 1000 =>
                {
                    suffix += 1;
                }
                other => return other,
            }
        }
    }

    /// Create a recording at exactly `path`; fails if the file exists.
    pub fn create_new(path: impl Into<PathBuf>) -> Result<Self, SinkError> {
        let path = path.into();
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|source| SinkError::Open {
                path: path.clone(),
                source,
            })?;

        let mut out = BufWriter::new(file);
        writeln!(out, "{CSV_HEADER}").map_err(|source| SinkError::Open {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), "created recording");
        Ok(Self { out, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordingSink for CsvRecorder {
    fn append(&mut self, record: &SampleRecord) -> Result<(), SinkError> {
        writeln!(
            self.out,
            "{},{},{:.4},{},{}",
            record.timestamp_ms,
            record.adc_raw,
            record.voltage,
            record.contact.as_str(),
            record.host_time_ms
        )
        .map_err(SinkError::Write)
    }

    fn close(mut self: Box<Self>) -> Result<(), SinkError> {
        self.out.flush().map_err(SinkError::Flush)?;
        self.out.get_ref().sync_all().map_err(SinkError::Flush)?;
        debug!(path = %self.path.display(), "closed recording");
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Keeps samples in memory; clones share the same record list.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<SampleRecord>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far.
    pub fn records(&self) -> Vec<SampleRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RecordingSink for MemorySink {
    fn append(&mut self, record: &SampleRecord) -> Result<(), SinkError> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(*record);
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<(), SinkError> {
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "senslink-recording-{tag}-{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn csv_rows_follow_header() {
        let dir = temp_dir("rows");
        let recorder = CsvRecorder::create(&dir).unwrap();
        let path = recorder.path().to_path_buf();
        let mut sink: Box<dyn RecordingSink> = Box::new(recorder);

        let mut record = SampleRecord::now(&Sample::from_adc(16, 19264));
        record.host_time_ms = 1_700_000_000_123;
        sink.append(&record).unwrap();
        sink.append(&SampleRecord {
            host_time_ms: 1_700_000_000_124,
            ..SampleRecord::now(&Sample::from_adc(20, 100))
        })
        .unwrap();
        sink.close().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(lines[1], "16,19264,0.6020,released,1700000000123");
        assert_eq!(lines[2], "20,100,0.0031,pressed,1700000000124");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn csv_names_do_not_collide() {
        let dir = temp_dir("names");
        let first = CsvRecorder::create(&dir).unwrap();
        let second = CsvRecorder::create(&dir).unwrap();
        assert_ne!(first.path(), second.path());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn csv_open_failure_is_open_error() {
        let err = CsvRecorder::create("/nonexistent/senslink/dir").unwrap_err();
        assert!(matches!(err, SinkError::Open { .. }));
    }

    #[test]
    fn memory_sink_clones_share_records() {
        let sink = MemorySink::new();
        let mut writer: Box<dyn RecordingSink> = Box::new(sink.clone());
        writer
            .append(&SampleRecord::now(&Sample::from_adc(1, 2)))
            .unwrap();
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.records()[0].timestamp_ms, 1);
    }
}

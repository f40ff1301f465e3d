//! Telemetry sink (§4.9): one newline-delimited JSON file per kernel per
//! run, system-info record first, window rows after, flushed line-by-line.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::error::CortexError;
use crate::system_info::SystemInfoRecord;

/// One window's telemetry row (§3.4).
#[derive(Debug, Clone, Serialize)]
pub struct TelemetryRow {
    pub run_id: u64,
    pub plugin_name: String,
    pub window_index: u64,
    pub release_ts_ns: u64,
    pub deadline_ts_ns: u64,
    pub start_ts_ns: u64,
    pub end_ts_ns: u64,
    pub deadline_missed: bool,
    #[serde(rename = "W")]
    pub window_length_samples: u32,
    #[serde(rename = "H")]
    pub hop_samples: u32,
    #[serde(rename = "C")]
    pub channels: u32,
    #[serde(rename = "Fs")]
    pub sample_rate_hz: u32,
    pub warmup: bool,
    pub repeat: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_tin_ns: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_tstart_ns: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_tend_ns: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_tfirst_tx_ns: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_tlast_tx_ns: Option<u64>,
}

impl TelemetryRow {
    /// `deadline_missed` is derived, never set by the caller directly.
    pub fn new(
        run_id: u64,
        plugin_name: impl Into<String>,
        window_index: u64,
        release_ts_ns: u64,
        deadline_ts_ns: u64,
        start_ts_ns: u64,
        end_ts_ns: u64,
        window_length_samples: u32,
        hop_samples: u32,
        channels: u32,
        sample_rate_hz: u32,
        warmup: bool,
        repeat: u32,
    ) -> Self {
        TelemetryRow {
            run_id,
            plugin_name: plugin_name.into(),
            window_index,
            release_ts_ns,
            deadline_ts_ns,
            start_ts_ns,
            end_ts_ns,
            deadline_missed: end_ts_ns > deadline_ts_ns,
            window_length_samples,
            hop_samples,
            channels,
            sample_rate_hz,
            warmup,
            repeat,
            device_tin_ns: None,
            device_tstart_ns: None,
            device_tend_ns: None,
            device_tfirst_tx_ns: None,
            device_tlast_tx_ns: None,
        }
    }

    /// Attach remote-execution device-clock timestamps (§3.4).
    pub fn with_device_timestamps(
        mut self,
        tin_ns: u64,
        tstart_ns: u64,
        tend_ns: u64,
        tfirst_tx_ns: u64,
        tlast_tx_ns: u64,
    ) -> Self {
        self.device_tin_ns = Some(tin_ns);
        self.device_tstart_ns = Some(tstart_ns);
        self.device_tend_ns = Some(tend_ns);
        self.device_tfirst_tx_ns = Some(tfirst_tx_ns);
        self.device_tlast_tx_ns = Some(tlast_tx_ns);
        self
    }
}

/// A fatal run error recorded in the telemetry stream so no failure is
/// silently swallowed (§7).
#[derive(Debug, Clone, Serialize)]
pub struct TelemetryErrorRecord {
    #[serde(rename = "_type")]
    pub record_type: &'static str,
    pub run_id: u64,
    pub window_index: Option<u64>,
    pub kind: String,
    pub message: String,
}

impl TelemetryErrorRecord {
    pub fn new(run_id: u64, window_index: Option<u64>, kind: &str, message: impl Into<String>) -> Self {
        TelemetryErrorRecord {
            record_type: "error",
            run_id,
            window_index,
            kind: kind.to_string(),
            message: message.into(),
        }
    }
}

/// Append-only, line-buffered NDJSON writer to one file per kernel per run
/// (§6.3). The first write is always the system-info record.
pub struct TelemetrySink {
    writer: BufWriter<File>,
    wrote_system_info: bool,
}

impl TelemetrySink {
    /// Create (truncating any existing file at `path`) and immediately
    /// write the leading system-info record.
    pub fn create(path: &Path) -> Result<Self, CortexError> {
        let file = File::create(path)?;
        let mut sink = TelemetrySink {
            writer: BufWriter::new(file),
            wrote_system_info: false,
        };
        sink.write_system_info(&SystemInfoRecord::gather())?;
        Ok(sink)
    }

    fn write_system_info(&mut self, record: &SystemInfoRecord) -> Result<(), CortexError> {
        self.write_line(record)?;
        self.wrote_system_info = true;
        Ok(())
    }

    /// Append one window's telemetry row, flushing after the write.
    pub fn write_row(&mut self, row: &TelemetryRow) -> Result<(), CortexError> {
        debug_assert!(
            self.wrote_system_info,
            "telemetry sink must write its system-info record before any window row"
        );
        self.write_line(row)
    }

    /// Append a fatal-error record, flushing after the write.
    pub fn write_error(&mut self, record: &TelemetryErrorRecord) -> Result<(), CortexError> {
        self.write_line(record)
    }

    fn write_line<T: Serialize>(&mut self, value: &T) -> Result<(), CortexError> {
        let line = serde_json::to_string(value)
            .map_err(|e| CortexError::ConfigInvalid(format!("telemetry row did not serialize: {e}")))?;
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader};

    fn sample_row(window_index: u64, end_ts_ns: u64) -> TelemetryRow {
        TelemetryRow::new(
            1,
            "notch_iir@f32",
            window_index,
            1_000,
            1_500,
            1_000,
            end_ts_ns,
            160,
            80,
            64,
            160,
            false,
            0,
        )
    }

    #[test]
    fn deadline_missed_is_derived_from_timestamps() {
        assert!(!sample_row(0, 1_400).deadline_missed);
        assert!(sample_row(0, 1_600).deadline_missed);
    }

    #[test]
    fn sink_writes_system_info_first_then_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.ndjson");
        let mut sink = TelemetrySink::create(&path).unwrap();
        sink.write_row(&sample_row(0, 1_200)).unwrap();
        sink.write_row(&sample_row(1, 1_200)).unwrap();

        let file = File::open(&path).unwrap();
        let lines: Vec<String> = BufReader::new(file)
            .lines()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains(r#""_type":"system_info""#));
        assert!(lines[1].contains(r#""window_index":0"#));
        assert!(lines[2].contains(r#""window_index":1"#));
    }

    #[test]
    fn error_record_is_tagged_and_flushed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.ndjson");
        let mut sink = TelemetrySink::create(&path).unwrap();
        sink.write_error(&TelemetryErrorRecord::new(1, Some(9), "ProtocolViolation", "crc mismatch"))
            .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.lines().last().unwrap().contains(r#""kind":"ProtocolViolation""#));
    }
}

//! Append-only result table.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::Result;
use crate::types::{format_timestamp, CycleResult};

pub const CSV_HEADER: [&str; 5] = [
    "Serial Number",
    "Cycle",
    "Reboot Duration (s)",
    "Reboot Completed Time",
    "Bugreport Triggered",
];

pub trait ResultSink {
    fn append(&mut self, serial: &str, result: &CycleResult) -> Result<()>;
}

impl<S: ResultSink + ?Sized> ResultSink for &mut S {
    fn append(&mut self, serial: &str, result: &CycleResult) -> Result<()> {
        (**self).append(serial, result)
    }
}

/// Collects rows in memory.
impl ResultSink for Vec<CycleResult> {
    fn append(&mut self, _serial: &str, result: &CycleResult) -> Result<()> {
        self.push(result.clone());
        Ok(())
    }
}

/// CSV writer that flushes after every row so an aborted run still leaves a
/// readable file.
pub struct CsvSink<W: Write> {
    out: W,
}

impl CsvSink<BufWriter<File>> {
    /// Create (or truncate) `path` and write the header row.
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        CsvSink::new(BufWriter::new(file))
    }
}

impl<W: Write> CsvSink<W> {
    pub fn new(out: W) -> Result<Self> {
        let mut sink = Self { out };
        sink.write_record(&CSV_HEADER)?;
        Ok(sink)
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_record(&mut self, fields: &[&str]) -> Result<()> {
        let line = fields
            .iter()
            .map(|f| escape(f))
            .collect::<Vec<_>>()
            .join(",");
        self.out.write_all(line.as_bytes())?;
        self.out.write_all(b"\r\n")?;
        self.out.flush()?;
        Ok(())
    }
}

impl<W: Write> ResultSink for CsvSink<W> {
    fn append(&mut self, serial: &str, result: &CycleResult) -> Result<()> {
        let cycle = result.cycle.to_string();
        let duration = result.duration_cell();
        let completed = format_timestamp(&result.completed_at);
        self.write_record(&[serial, &cycle, &duration, &completed, result.anomaly_cell()])
    }
}

/// Quote a field when it contains a delimiter, quote or line break.
fn escape(field: &str) -> String {
    if field.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

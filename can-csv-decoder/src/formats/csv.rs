//! CSV log reader and decoded-signal writer
//!
//! The input must have a header naming the `timestamp`, `can_id` and `data`
//! columns (any order, extra columns ignored). The output always has the
//! columns listed in [`OUTPUT_COLUMNS`].

use crate::pipeline::{InputRecord, SignalSink};
use crate::types::{DecodedSignal, DecoderError, Result};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// Input columns that must be present in the header
pub const REQUIRED_COLUMNS: [&str; 3] = ["timestamp", "can_id", "data"];

/// Output columns, in order
pub const OUTPUT_COLUMNS: [&str; 8] = [
    "timestamp",
    "can_id",
    "message_name",
    "signal_name",
    "raw_value",
    "physical_value",
    "state",
    "unit",
];

const NOT_AVAILABLE: &str = "N/A";

/// CSV log reader yielding one [`InputRecord`] per data row
pub struct CsvLogReader<R: Read> {
    reader: ::csv::Reader<R>,
    /// Indices of the timestamp, can_id and data columns
    columns: [usize; 3],
}

impl CsvLogReader<File> {
    /// Open a CSV log file and validate its header
    pub fn open(path: &Path) -> Result<Self> {
        log::info!("Reading CSV file: {:?}", path);

        if !path.exists() {
            return Err(DecoderError::LogParseError(format!(
                "CSV file not found: {:?}",
                path
            )));
        }

        let file = File::open(path).map_err(|e| {
            DecoderError::LogParseError(format!("Failed to open CSV file {:?}: {}", path, e))
        })?;

        Self::from_reader(file)
    }
}

impl<R: Read> CsvLogReader<R> {
    /// Wrap any reader; fails if a required column is missing from the header
    pub fn from_reader(rdr: R) -> Result<Self> {
        let mut reader = ::csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(rdr);

        let headers = reader.headers()?.clone();
        let position = |name: &str| headers.iter().position(|h| h.trim() == name);

        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|name| position(**name).is_none())
            .map(|name| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(DecoderError::MissingColumns(missing));
        }

        let mut columns = [0usize; 3];
        for (slot, name) in columns.iter_mut().zip(REQUIRED_COLUMNS) {
            *slot = position(name).unwrap_or_default();
        }

        Ok(Self { reader, columns })
    }

    /// Iterate over data rows; short rows yield empty fields
    pub fn records(self) -> impl Iterator<Item = Result<InputRecord>> {
        let [ts_idx, id_idx, data_idx] = self.columns;

        self.reader
            .into_records()
            .enumerate()
            .map(move |(index, row)| -> Result<InputRecord> {
                let row = row?;
                let line = row
                    .position()
                    .map(|pos| pos.line())
                    .unwrap_or(index as u64 + 2);
                let field = |idx: usize| row.get(idx).unwrap_or_default().to_string();

                Ok(InputRecord {
                    line,
                    timestamp: field(ts_idx),
                    can_id: field(id_idx),
                    data: field(data_idx),
                })
            })
    }
}

/// Render a record as output CSV fields
pub fn format_record(signal: &DecodedSignal) -> [String; 8] {
    [
        signal.timestamp.clone(),
        signal.can_id_hex(),
        signal.message_name.clone(),
        signal
            .signal_name
            .clone()
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        signal
            .raw_value
            .map(|raw| raw.to_string())
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        signal
            .physical_value
            .map(|value| format!("{:.3}", value))
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        signal
            .state
            .clone()
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        signal.unit.clone(),
    ]
}

/// Writes decoded signals as CSV with a header row
pub struct CsvSignalWriter<W: Write> {
    writer: ::csv::Writer<W>,
}

impl CsvSignalWriter<File> {
    /// Create (or truncate) an output file
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)?;
        Self::new(file)
    }
}

impl<W: Write> CsvSignalWriter<W> {
    pub fn new(inner: W) -> Result<Self> {
        let mut writer = ::csv::Writer::from_writer(inner);
        writer.write_record(OUTPUT_COLUMNS)?;
        Ok(Self { writer })
    }

    /// Flush and return the underlying writer
    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| DecoderError::IoError(e.into_error()))
    }
}

impl<W: Write> SignalSink for CsvSignalWriter<W> {
    fn write_signal(&mut self, signal: &DecodedSignal) -> Result<()> {
        self.writer.write_record(&format_record(signal))?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

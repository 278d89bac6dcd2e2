//! Row pipeline
//!
//! Turns textual input records (timestamp, CAN ID, payload hex) into decoded
//! signal records. Malformed rows are skipped and counted; they never stop a
//! batch. Decoding a row is a pure function of the decoder and the row, so
//! rows may be decoded on several threads and accepted afterwards in order.

use crate::decoder::Decoder;
use crate::types::{DecodedSignal, RawFrame, Result};
use serde::Serialize;
use std::fmt;

/// One textual input record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputRecord {
    /// Line number in the source (header is line 1)
    pub line: u64,
    pub timestamp: String,
    pub can_id: String,
    pub data: String,
}

/// Why a row was skipped
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RowError {
    #[error("Missing timestamp, can_id, or data")]
    MissingField,

    #[error("Invalid CAN ID: {0}")]
    InvalidCanId(String),

    #[error("Invalid data format: {data} ({reason})")]
    InvalidData { data: String, reason: String },
}

/// Outcome of decoding one row
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Decoded(Vec<DecodedSignal>),
    Skipped(RowError),
}

/// Counters reported at the end of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub rows_seen: u64,
    pub rows_skipped: u64,
    pub signals_produced: u64,
}

impl fmt::Display for PipelineStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Processed {} rows, decoded {} signals, skipped {} rows",
            self.rows_seen, self.signals_produced, self.rows_skipped
        )
    }
}

/// Destination for decoded signal records
pub trait SignalSink {
    fn write_signal(&mut self, signal: &DecodedSignal) -> Result<()>;

    /// Flush buffered output
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

impl SignalSink for Vec<DecodedSignal> {
    fn write_signal(&mut self, signal: &DecodedSignal) -> Result<()> {
        self.push(signal.clone());
        Ok(())
    }
}

/// Trim surrounding whitespace and quote characters
pub fn normalize_field(text: &str) -> &str {
    text.trim_matches(|c: char| c.is_whitespace() || c == '"' || c == '\'')
}

fn strip_hex_prefix(text: &str) -> Option<&str> {
    let prefix = text.get(..2)?;
    if prefix.eq_ignore_ascii_case("0x") {
        Some(&text[2..])
    } else {
        None
    }
}

/// Parse a CAN ID: hex with a `0x`/`0X` prefix, decimal otherwise
pub fn parse_can_id(text: &str) -> std::result::Result<u32, RowError> {
    let text = normalize_field(text);
    let parsed = match strip_hex_prefix(text) {
        Some(hex_digits) => u32::from_str_radix(hex_digits, 16),
        None => text.parse::<u32>(),
    };
    parsed.map_err(|_| RowError::InvalidCanId(text.to_string()))
}

/// Normalize payload text to a plain hex string
///
/// Removes quotes and all whitespace, then every `0x`/`0X` occurrence. The
/// result must be a non-empty, even-length string of hex digits.
pub fn normalize_hex_payload(data: &str) -> std::result::Result<String, RowError> {
    let compact: String = data
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '"' && *c != '\'')
        .collect();

    let mut normalized = String::with_capacity(compact.len());
    let mut rest = compact.as_str();
    while !rest.is_empty() {
        if strip_hex_prefix(rest).is_some() {
            rest = &rest[2..];
        } else {
            let mut chars = rest.chars();
            if let Some(c) = chars.next() {
                normalized.push(c);
            }
            rest = chars.as_str();
        }
    }

    let invalid = |reason: String| RowError::InvalidData {
        data: data.to_string(),
        reason,
    };

    if normalized.is_empty() {
        return Err(invalid("no hex digits".to_string()));
    }
    if normalized.len() % 2 != 0 {
        return Err(invalid(format!("Invalid hex string length: {}", normalized)));
    }
    if !normalized.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid(format!("Invalid hex characters: {}", normalized)));
    }

    Ok(normalized)
}

/// Convert payload text to bytes, first digit pair = byte 0
pub fn parse_payload(data: &str) -> std::result::Result<Vec<u8>, RowError> {
    let normalized = normalize_hex_payload(data)?;
    hex::decode(&normalized).map_err(|e| RowError::InvalidData {
        data: data.to_string(),
        reason: e.to_string(),
    })
}

/// Validate a record and build the frame it describes
pub fn parse_record(record: &InputRecord) -> std::result::Result<RawFrame, RowError> {
    let timestamp = normalize_field(&record.timestamp);
    let can_id = normalize_field(&record.can_id);
    let data = normalize_field(&record.data);

    if timestamp.is_empty() || can_id.is_empty() || data.is_empty() {
        return Err(RowError::MissingField);
    }

    Ok(RawFrame::new(timestamp, parse_can_id(can_id)?, parse_payload(data)?))
}

/// Drives records through the decoder into a sink, keeping counters
pub struct RowPipeline<'a> {
    decoder: &'a Decoder,
    stats: PipelineStats,
}

impl<'a> RowPipeline<'a> {
    pub fn new(decoder: &'a Decoder) -> Self {
        Self {
            decoder,
            stats: PipelineStats::default(),
        }
    }

    /// Decode one record without touching the counters
    pub fn decode_record(&self, record: &InputRecord) -> RowOutcome {
        match parse_record(record) {
            Ok(frame) => RowOutcome::Decoded(self.decoder.decode_frame(&frame)),
            Err(e) => RowOutcome::Skipped(e),
        }
    }

    /// Count an outcome and forward its records to the sink
    pub fn accept<S: SignalSink + ?Sized>(
        &mut self,
        record: &InputRecord,
        outcome: RowOutcome,
        sink: &mut S,
    ) -> Result<()> {
        self.stats.rows_seen += 1;

        match outcome {
            RowOutcome::Decoded(signals) => {
                for signal in &signals {
                    sink.write_signal(signal)?;
                }
                self.stats.signals_produced += signals.len() as u64;
            }
            RowOutcome::Skipped(e) => {
                log::warn!("Skipping row {}: {}", record.line, e);
                self.stats.rows_skipped += 1;
            }
        }

        Ok(())
    }

    /// Decode and accept one record
    pub fn process<S: SignalSink + ?Sized>(&mut self, record: &InputRecord, sink: &mut S) -> Result<()> {
        let outcome = self.decode_record(record);
        self.accept(record, outcome, sink)
    }

    /// Process every record, stopping only on a reader or sink error
    pub fn run<I, S>(&mut self, records: I, sink: &mut S) -> Result<PipelineStats>
    where
        I: IntoIterator<Item = Result<InputRecord>>,
        S: SignalSink + ?Sized,
    {
        for record in records {
            self.process(&record?, sink)?;
        }
        sink.finish()?;

        log::info!("{}", self.stats);
        Ok(self.stats)
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }
}

//! Core types for the CAN CSV decoder library
//!
//! This module defines the frame the decoder consumes and the flat signal
//! record it emits. Records are built once per (frame, signal) pair and never
//! mutated afterwards.

use serde::{Serialize, Serializer};
use std::fmt;

/// Result type for decoder operations
pub type Result<T> = std::result::Result<T, DecoderError>;

/// Raw CAN frame as read from an input record
///
/// The timestamp is carried as the original text; the decoder never
/// interprets it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    /// Timestamp text, passed through unchanged
    pub timestamp: String,
    /// CAN message ID (11-bit or 29-bit)
    pub frame_id: u32,
    /// Frame data bytes (0-8 bytes for classic CAN, longer payloads tolerated)
    pub payload: Vec<u8>,
}

impl RawFrame {
    pub fn new(timestamp: impl Into<String>, frame_id: u32, payload: Vec<u8>) -> Self {
        Self {
            timestamp: timestamp.into(),
            frame_id,
            payload,
        }
    }

    /// Get the data length code (DLC) - number of data bytes
    pub fn dlc(&self) -> usize {
        self.payload.len()
    }
}

/// Errors that can occur during loading and decoding
#[derive(Debug, thiserror::Error)]
pub enum DecoderError {
    #[error("Failed to parse log file: {0}")]
    LogParseError(String),

    #[error("Failed to parse DBC file: {0}")]
    DbcParseError(String),

    #[error("Input is missing required column(s): {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Signal '{signal}' requires {required_bytes} bytes but frame only has {available_bytes} bytes")]
    SignalOutOfRange {
        signal: String,
        required_bytes: usize,
        available_bytes: usize,
    },

    #[error("Invalid signal definition: {0}")]
    InvalidSignalDefinition(String),

    #[error("Message '{message}' expects {expected} bytes but frame only has {actual} bytes")]
    TruncatedFrame {
        message: String,
        expected: usize,
        actual: usize,
    },

    #[error("Message '{0}' defines no signals")]
    EmptyMessage(String),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Raw integer extracted from the payload
///
/// Signed signals carry the sign-extended value; unsigned ones keep the full
/// 64-bit range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RawValue {
    Unsigned(u64),
    Signed(i64),
}

impl RawValue {
    /// Convert to f64 for physical scaling
    pub fn as_f64(&self) -> f64 {
        match self {
            RawValue::Unsigned(v) => *v as f64,
            RawValue::Signed(v) => *v as f64,
        }
    }

    /// Check if the value is negative
    pub fn is_negative(&self) -> bool {
        matches!(self, RawValue::Signed(v) if *v < 0)
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Unsigned(v) => write!(f, "{}", v),
            RawValue::Signed(v) => write!(f, "{}", v),
        }
    }
}

/// Result of interpreting one raw signal value
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedValue {
    /// Linear conversion: raw * factor + offset
    Physical { raw: RawValue, value: f64 },
    /// Raw value matched an entry of the signal's choices
    State { raw: RawValue, label: String },
}

impl DecodedValue {
    pub fn raw(&self) -> RawValue {
        match self {
            DecodedValue::Physical { raw, .. } | DecodedValue::State { raw, .. } => *raw,
        }
    }
}

/// One output record: a decoded signal, a failed signal, or a whole-frame placeholder
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedSignal {
    /// Timestamp text from the input record
    pub timestamp: String,
    /// CAN message ID
    #[serde(rename = "can_id", serialize_with = "serialize_frame_id")]
    pub frame_id: u32,
    /// Message name from the DBC, or `Unknown_<ID>` for unmatched frames
    pub message_name: String,
    /// Signal name (absent for unmatched frames and message-level failures)
    pub signal_name: Option<String>,
    /// Raw value before scaling
    pub raw_value: Option<RawValue>,
    /// Scaled value (absent when a choice matched)
    pub physical_value: Option<f64>,
    /// Choice label (absent when no choice matched)
    pub state: Option<String>,
    /// Engineering unit, empty if none
    pub unit: String,
}

fn serialize_frame_id<S: Serializer>(frame_id: &u32, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("{:#x}", frame_id))
}

impl DecodedSignal {
    /// Placeholder record with every signal field absent
    pub fn placeholder(timestamp: &str, frame_id: u32, message_name: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.to_string(),
            frame_id,
            message_name: message_name.into(),
            signal_name: None,
            raw_value: None,
            physical_value: None,
            state: None,
            unit: String::new(),
        }
    }

    /// Frame ID as lowercase `0x`-prefixed hex, e.g. `0x1a3`
    pub fn can_id_hex(&self) -> String {
        format!("{:#x}", self.frame_id)
    }

    /// True if this record carries a decoded value
    pub fn is_decoded(&self) -> bool {
        self.physical_value.is_some() || self.state.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_value_conversions() {
        assert_eq!(RawValue::Unsigned(42).as_f64(), 42.0);
        assert_eq!(RawValue::Signed(-3).as_f64(), -3.0);
        assert!(RawValue::Signed(-1).is_negative());
        assert!(!RawValue::Unsigned(u64::MAX).is_negative());
    }

    #[test]
    fn test_raw_value_display() {
        assert_eq!(format!("{}", RawValue::Unsigned(u64::MAX)), "18446744073709551615");
        assert_eq!(format!("{}", RawValue::Signed(-586)), "-586");
    }

    #[test]
    fn test_placeholder_record() {
        let record = DecodedSignal::placeholder("1.0", 0x200, "Unknown_200");
        assert_eq!(record.can_id_hex(), "0x200");
        assert!(record.signal_name.is_none());
        assert!(record.raw_value.is_none());
        assert!(!record.is_decoded());
        assert_eq!(record.unit, "");
    }

    #[test]
    fn test_frame_dlc() {
        let frame = RawFrame::new("0.5", 0x123, vec![0xE8, 0x03]);
        assert_eq!(frame.dlc(), 2);
    }
}

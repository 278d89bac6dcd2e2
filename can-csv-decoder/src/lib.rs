//! CAN CSV Decoder Library
//!
//! A stateless, reusable library for decoding CAN frames logged as CSV rows
//! into named, physically scaled signal values using DBC signal definitions.
//!
//! # Architecture
//!
//! - Loads DBC files into a read-only signal database keyed by CAN ID
//! - Extracts bit fields (Intel and Motorola layouts), sign-extends, scales
//!   and maps raw values through value tables
//! - Decodes truncated payloads signal by signal instead of dropping them
//! - Normalizes textual CSV rows and counts the ones it has to skip
//!
//! The library does NOT:
//! - Encode physical values back into frames
//! - Decode multiplexed signal layouts
//! - Handle CAN-FD payloads beyond what classic frames need
//!
//! Argument handling and output selection live in the application layer
//! (can-csv-cli).
//!
//! # Example Usage
//!
//! ```no_run
//! use can_csv_decoder::{CsvLogReader, CsvSignalWriter, Decoder, RowPipeline};
//! use std::path::Path;
//!
//! let mut decoder = Decoder::new();
//! decoder.add_dbc(Path::new("Small_CAR_CANbus.dbc")).unwrap();
//!
//! let reader = CsvLogReader::open(Path::new("can_log.csv")).unwrap();
//! let mut writer = CsvSignalWriter::create(Path::new("decoded_signals.csv")).unwrap();
//!
//! let stats = RowPipeline::new(&decoder)
//!     .run(reader.records(), &mut writer)
//!     .unwrap();
//! println!("{}", stats);
//! ```

// Public modules
pub mod config;
pub mod decoder;
pub mod formats;
pub mod message_decoder;
pub mod pipeline;
pub mod signals;
pub mod types;

// Re-export main types for convenience
pub use config::DecoderConfig;
pub use decoder::{DatabaseStats, Decoder};
pub use formats::{CsvLogReader, CsvSignalWriter};
pub use message_decoder::{decode_signal, extract_bits, sign_extend, BitSpanError};
pub use pipeline::{InputRecord, PipelineStats, RowError, RowOutcome, RowPipeline, SignalSink};
pub use signals::{ByteOrder, MessageDefinition, SignalDefinition, ValueType};
pub use types::{DecodedSignal, DecodedValue, DecoderError, RawFrame, RawValue, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

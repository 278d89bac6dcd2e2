//! Log file formats
//!
//! Readers turn a log file into a stream of textual input records; writers
//! are signal sinks for the decoded output.

pub mod csv;

// Re-export reader/writer types
pub use self::csv::{CsvLogReader, CsvSignalWriter, OUTPUT_COLUMNS, REQUIRED_COLUMNS};

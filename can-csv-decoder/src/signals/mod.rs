//! Signal database and DBC parser
//!
//! This module contains the DBC loader and the unified signal database it
//! feeds.

pub mod dbc;
pub mod database;

// Re-export key types for convenience
pub use database::{
    ByteOrder, DatabaseStats, MessageDefinition, SignalDatabase, SignalDefinition, ValueType,
};

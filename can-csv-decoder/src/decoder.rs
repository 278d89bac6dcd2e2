//! Main decoder API
//!
//! This module provides the primary interface for the decoder library.
//! The Decoder struct is the entry point for loading signal definitions and
//! decoding individual frames.

use crate::config::DecoderConfig;
use crate::message_decoder::MessageDecoder;
use crate::signals::{MessageDefinition, SignalDatabase};
use crate::types::{DecodedSignal, DecodedValue, RawFrame, Result};
use std::path::Path;

/// The main decoder struct - entry point for all decoding operations
///
/// Once loading is finished the decoder is only read, so a shared reference
/// can be used from several threads.
#[derive(Debug, Default)]
pub struct Decoder {
    /// Internal signal database (loaded from DBC files)
    signal_db: SignalDatabase,
    config: DecoderConfig,
}

impl Decoder {
    /// Create a new decoder instance
    pub fn new() -> Self {
        Self::with_config(DecoderConfig::default())
    }

    /// Create a decoder with a specific configuration
    pub fn with_config(config: DecoderConfig) -> Self {
        Self {
            signal_db: SignalDatabase::new(),
            config,
        }
    }

    /// Load a DBC file and add its definitions to the signal database
    ///
    /// Messages whose CAN ID is already known are ignored.
    ///
    /// # Example
    /// ```no_run
    /// use can_csv_decoder::Decoder;
    /// use std::path::Path;
    ///
    /// let mut decoder = Decoder::new();
    /// decoder.add_dbc(Path::new("Small_CAR_CANbus.dbc")).unwrap();
    /// ```
    pub fn add_dbc(&mut self, path: &Path) -> Result<()> {
        log::info!("Loading DBC file: {:?}", path);

        let messages = crate::signals::dbc::parse_dbc_file(path)?;
        let count = messages.len();
        for message in messages {
            self.signal_db.add_message(message);
        }

        log::info!("Loaded DBC file: {:?}, found {} messages", path, count);
        Ok(())
    }

    /// Parse DBC text and add its definitions to the signal database
    pub fn add_dbc_str(&mut self, content: &str, source: &str) -> Result<()> {
        for message in crate::signals::dbc::parse_dbc_str(content, source)? {
            self.signal_db.add_message(message);
        }
        Ok(())
    }

    /// Add a single message definition (first definition per CAN ID wins)
    pub fn add_message(&mut self, message: MessageDefinition) -> bool {
        self.signal_db.add_message(message)
    }

    /// Look up the message definition for a CAN ID
    pub fn lookup(&self, frame_id: u32) -> Option<&MessageDefinition> {
        self.signal_db.get_message(frame_id)
    }

    /// Decode one frame into signal records
    ///
    /// Never fails and always returns at least one record:
    /// - unknown CAN ID: one `Unknown_<ID>` record with no signal fields
    /// - message-level failure: one record named after the message, no signal fields
    /// - otherwise one record per signal; signals that could not be decoded
    ///   keep their name but carry no values
    ///
    /// # Example
    /// ```
    /// use can_csv_decoder::{Decoder, RawFrame};
    ///
    /// let decoder = Decoder::new();
    /// let records = decoder.decode_frame(&RawFrame::new("0.0", 0x200, vec![0x01]));
    /// assert_eq!(records.len(), 1);
    /// assert_eq!(records[0].message_name, "Unknown_200");
    /// ```
    pub fn decode_frame(&self, frame: &RawFrame) -> Vec<DecodedSignal> {
        let can_id = frame.frame_id;

        let Some(message_def) = self.signal_db.get_message(can_id) else {
            log::trace!("Unknown CAN ID: 0x{:X}", can_id);
            return vec![DecodedSignal::placeholder(
                &frame.timestamp,
                can_id,
                format!("Unknown_{:X}", can_id),
            )];
        };

        log::debug!("Decoding message: {} (ID 0x{:X})", message_def.name, can_id);

        let results = match MessageDecoder::decode_message(&frame.payload, message_def, &self.config) {
            Ok(results) => results,
            Err(e) => {
                log::warn!("Error decoding message {} (ID 0x{:X}): {}", message_def.name, can_id, e);
                return vec![DecodedSignal::placeholder(
                    &frame.timestamp,
                    can_id,
                    message_def.name.clone(),
                )];
            }
        };

        results
            .into_iter()
            .map(|(signal, decoded)| {
                let mut record =
                    DecodedSignal::placeholder(&frame.timestamp, can_id, message_def.name.clone());
                record.signal_name = Some(signal.name.clone());
                record.unit = signal.unit.clone().unwrap_or_default();

                match decoded {
                    Ok(DecodedValue::Physical { raw, value }) => {
                        record.raw_value = Some(raw);
                        record.physical_value = Some(value);
                    }
                    Ok(DecodedValue::State { raw, label }) => {
                        record.raw_value = Some(raw);
                        record.state = Some(label);
                    }
                    Err(e) => {
                        log::warn!("Message {} (ID 0x{:X}): {}", message_def.name, can_id, e);
                    }
                }

                record
            })
            .collect()
    }

    /// Get statistics about the loaded signal database
    pub fn database_stats(&self) -> DatabaseStats {
        self.signal_db.stats()
    }

    /// Active decoder configuration
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }
}

// Re-export DatabaseStats for public API
pub use crate::signals::DatabaseStats;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::SignalDefinition;
    use crate::types::RawValue;

    fn engine_decoder(config: DecoderConfig) -> Decoder {
        let mut decoder = Decoder::with_config(config);
        decoder.add_message(MessageDefinition {
            id: 0x123,
            name: "EngineData".to_string(),
            size: 8,
            sender: None,
            signals: vec![
                SignalDefinition::new("RPM", 0, 16)
                    .with_scaling(0.25, 0.0)
                    .with_unit("rpm"),
                SignalDefinition::new("Status", 16, 2).with_choice(2, "FAULT"),
                SignalDefinition::new("Load", 56, 8).with_unit("%"),
            ],
            source: "test.dbc".to_string(),
        });
        decoder
    }

    #[test]
    fn test_decoder_creation() {
        let decoder = Decoder::new();
        let stats = decoder.database_stats();
        assert_eq!(stats.num_messages, 0);
        assert_eq!(stats.num_signals, 0);
        assert!(decoder.config().allow_truncated);
    }

    #[test]
    fn test_decode_known_frame() {
        let decoder = engine_decoder(DecoderConfig::new());
        let frame = RawFrame::new("1.25", 0x123, vec![0xE8, 0x03, 0x02, 0, 0, 0, 0, 0x50]);
        let records = decoder.decode_frame(&frame);

        assert_eq!(records.len(), 3);

        let rpm = &records[0];
        assert_eq!(rpm.timestamp, "1.25");
        assert_eq!(rpm.message_name, "EngineData");
        assert_eq!(rpm.signal_name.as_deref(), Some("RPM"));
        assert_eq!(rpm.raw_value, Some(RawValue::Unsigned(1000)));
        assert_eq!(rpm.physical_value, Some(250.0));
        assert_eq!(rpm.state, None);
        assert_eq!(rpm.unit, "rpm");

        let status = &records[1];
        assert_eq!(status.state.as_deref(), Some("FAULT"));
        assert_eq!(status.physical_value, None);
        assert_eq!(status.unit, "");

        assert_eq!(records[2].physical_value, Some(80.0));
    }

    #[test]
    fn test_decode_unknown_frame() {
        let decoder = engine_decoder(DecoderConfig::new());
        let records = decoder.decode_frame(&RawFrame::new("2.0", 0x1ABCDEF, vec![]));

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].message_name, "Unknown_1ABCDEF");
        assert_eq!(records[0].can_id_hex(), "0x1abcdef");
        assert!(records[0].signal_name.is_none());
    }

    #[test]
    fn test_decode_truncated_frame_per_signal() {
        let decoder = engine_decoder(DecoderConfig::new());
        let records = decoder.decode_frame(&RawFrame::new("3.0", 0x123, vec![0xE8, 0x03]));

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].physical_value, Some(250.0));

        for failed in &records[1..] {
            assert!(failed.signal_name.is_some());
            assert_eq!(failed.raw_value, None);
            assert_eq!(failed.physical_value, None);
            assert_eq!(failed.state, None);
            assert_eq!(failed.message_name, "EngineData");
        }
        assert_eq!(records[2].unit, "%");
    }

    #[test]
    fn test_decode_truncated_frame_strict() {
        let decoder = engine_decoder(DecoderConfig::new().with_truncated(false));
        let records = decoder.decode_frame(&RawFrame::new("3.0", 0x123, vec![0xE8, 0x03]));

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].message_name, "EngineData");
        assert!(records[0].signal_name.is_none());
        assert!(records[0].raw_value.is_none());
    }

    #[test]
    fn test_decode_empty_payload_is_total() {
        let decoder = engine_decoder(DecoderConfig::new());
        let records = decoder.decode_frame(&RawFrame::new("4.0", 0x123, vec![]));
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| !r.is_decoded()));
    }

    #[test]
    fn test_add_dbc_str() {
        let mut decoder = Decoder::new();
        decoder
            .add_dbc_str(
                "VERSION \"\"\n\nNS_ :\n\nBS_:\n\nBU_: ECU1\n\nBO_ 256 Speed: 2 ECU1\n SG_ VehicleSpeed : 0|16@1+ (0.01,0) [0|655.35] \"km/h\" Vector__XXX\n",
                "inline.dbc",
            )
            .unwrap();

        assert_eq!(decoder.database_stats().num_messages, 1);
        assert_eq!(decoder.lookup(0x100).map(|m| m.name.as_str()), Some("Speed"));
    }
}

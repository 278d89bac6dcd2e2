//! DBC file parser
//!
//! Parses Vector DBC files and converts them into our internal signal database format.

use crate::signals::database::{ByteOrder, MessageDefinition, SignalDefinition, ValueType};
use crate::types::{DecoderError, Result};
use std::collections::HashMap;
use std::path::Path;

/// Flag bit DBC files set on extended (29-bit) message IDs
const EXTENDED_ID_FLAG: u32 = 0x8000_0000;
const EXTENDED_ID_MASK: u32 = 0x1FFF_FFFF;

/// Parse a DBC file and return message definitions
pub fn parse_dbc_file(path: &Path) -> Result<Vec<MessageDefinition>> {
    log::info!("Parsing DBC file: {:?}", path);

    if !path.exists() {
        return Err(DecoderError::DbcParseError(format!(
            "DBC file not found: {:?}",
            path
        )));
    }

    // Read the DBC file as bytes first (handle non-UTF8 encodings)
    let bytes = std::fs::read(path).map_err(|e| {
        DecoderError::DbcParseError(format!("Failed to read file {:?}: {}", path, e))
    })?;

    // Try UTF-8 first, then fall back to Latin-1 (compatible with Windows-1252)
    let dbc_content = match String::from_utf8(bytes) {
        Ok(content) => content,
        Err(e) => {
            log::warn!("DBC file is not UTF-8, trying Latin-1 encoding");
            e.into_bytes().iter().map(|&b| b as char).collect()
        }
    };

    let source_filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown.dbc");

    let messages = parse_dbc_str(&dbc_content, source_filename)?;

    log::info!("Parsed {} messages from {:?}", messages.len(), path);

    Ok(messages)
}

/// Parse DBC text; `source` is recorded on every message for diagnostics
pub fn parse_dbc_str(content: &str, source: &str) -> Result<Vec<MessageDefinition>> {
    let dbc = can_dbc::DBC::from_slice(content.as_bytes()).map_err(|e| {
        DecoderError::DbcParseError(format!("Failed to parse DBC {}: {:?}", source, e))
    })?;

    dbc.messages()
        .iter()
        .map(|dbc_msg| convert_message(&dbc, dbc_msg, source))
        .collect()
}

/// Convert a can-dbc message to our MessageDefinition
fn convert_message(
    dbc: &can_dbc::DBC,
    dbc_msg: &can_dbc::Message,
    source: &str,
) -> Result<MessageDefinition> {
    let raw_id = dbc_msg.message_id().0;
    let id = if raw_id & EXTENDED_ID_FLAG != 0 {
        raw_id & EXTENDED_ID_MASK
    } else {
        raw_id
    };

    let multiplexed = dbc_msg.signals().iter().any(|sig| {
        !matches!(
            sig.multiplexer_indicator(),
            can_dbc::MultiplexIndicator::Plain
        )
    });
    if multiplexed {
        log::warn!(
            "Message '{}' (0x{:X}) uses multiplexing; all signals will be decoded as plain signals",
            dbc_msg.message_name(),
            id
        );
    }

    let signals = dbc_msg
        .signals()
        .iter()
        .map(|dbc_sig| {
            let descriptions =
                dbc.value_descriptions_for_signal(*dbc_msg.message_id(), dbc_sig.name());
            convert_signal(dbc_sig, descriptions)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(MessageDefinition {
        id,
        name: dbc_msg.message_name().to_string(),
        size: *dbc_msg.message_size() as usize,
        sender: match dbc_msg.transmitter() {
            can_dbc::Transmitter::NodeName(name) => Some(name.to_string()),
            _ => None,
        },
        signals,
        source: source.to_string(),
    })
}

/// Convert a can-dbc signal to our SignalDefinition
fn convert_signal(
    dbc_sig: &can_dbc::Signal,
    descriptions: Option<&[can_dbc::ValDescription]>,
) -> Result<SignalDefinition> {
    let length = *dbc_sig.signal_size();
    if length == 0 || length > 64 {
        return Err(DecoderError::InvalidSignalDefinition(format!(
            "Signal '{}' has unsupported length {}",
            dbc_sig.name(),
            length
        )));
    }

    let byte_order = match *dbc_sig.byte_order() {
        can_dbc::ByteOrder::LittleEndian => ByteOrder::LittleEndian,
        can_dbc::ByteOrder::BigEndian => ByteOrder::BigEndian,
    };

    let value_type = match *dbc_sig.value_type() {
        can_dbc::ValueType::Signed => ValueType::Signed,
        can_dbc::ValueType::Unsigned => ValueType::Unsigned,
    };

    let choices = descriptions
        .filter(|descs| !descs.is_empty())
        .map(|descs| {
            descs
                .iter()
                .map(|desc| (choice_key(*desc.a(), length), desc.b().to_string()))
                .collect::<HashMap<u64, String>>()
        });

    Ok(SignalDefinition {
        name: dbc_sig.name().to_string(),
        start_bit: *dbc_sig.start_bit() as u16,
        length: length as u16,
        byte_order,
        value_type,
        factor: *dbc_sig.factor(),
        offset: *dbc_sig.offset(),
        min: *dbc_sig.min(),
        max: *dbc_sig.max(),
        unit: if dbc_sig.unit().is_empty() {
            None
        } else {
            Some(dbc_sig.unit().to_string())
        },
        choices,
    })
}

/// Map a value description key onto the unsigned raw bit pattern it matches
///
/// Negative keys (written for signed signals) become their two's complement
/// within `length` bits.
fn choice_key(value: f64, length: u64) -> u64 {
    let key = value as i64 as u64;
    if length >= 64 {
        key
    } else {
        key & ((1u64 << length) - 1)
    }
}

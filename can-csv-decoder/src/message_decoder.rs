//! Message Decoding Engine
//!
//! Extracts signal values from raw CAN payloads based on signal definitions
//! from the signal database. Handles bit extraction, endianness, sign
//! extension, choice lookup and physical value conversion.

use crate::config::DecoderConfig;
use crate::signals::database::{ByteOrder, MessageDefinition, SignalDefinition};
use crate::types::{DecodedValue, DecoderError, RawValue, Result};
use byteorder::{BigEndian, ByteOrder as _, LittleEndian};

/// Why a bit span could not be read from a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BitSpanError {
    #[error("span needs {required_bytes} bytes but payload has {available_bytes}")]
    OutOfRange {
        required_bytes: usize,
        available_bytes: usize,
    },

    #[error("bit length {0} is outside 1..=64")]
    InvalidLength(usize),
}

/// Extract `length` bits from `payload` as an unsigned integer
///
/// Little-endian: `start_bit` is the field's LSB, counted from bit 0 of byte 0
/// upwards through increasing byte indices.
///
/// Big-endian (Motorola): bits are numbered `byte * 8 + bit`, where bit 7 is
/// the MSB of a byte. `start_bit` is the field's MSB; the field continues
/// down to bit 0 of that byte, then from bit 7 of the next byte.
pub fn extract_bits(
    payload: &[u8],
    start_bit: usize,
    length: usize,
    byte_order: ByteOrder,
) -> std::result::Result<u64, BitSpanError> {
    if length == 0 || length > 64 {
        return Err(BitSpanError::InvalidLength(length));
    }

    let first_byte = start_bit / 8;
    let bit_in_byte = start_bit % 8;

    let last_byte = match byte_order {
        ByteOrder::LittleEndian => (start_bit + length - 1) / 8,
        ByteOrder::BigEndian => {
            // Bits available from the MSB down to bit 0 of the first byte
            let available = bit_in_byte + 1;
            if length <= available {
                first_byte
            } else {
                first_byte + (length - available + 7) / 8
            }
        }
    };

    if last_byte >= payload.len() {
        return Err(BitSpanError::OutOfRange {
            required_bytes: last_byte + 1,
            available_bytes: payload.len(),
        });
    }

    // At most 9 bytes: a 64-bit field that does not start on a byte boundary
    let window = &payload[first_byte..=last_byte];
    let mask = (1u128 << length) - 1;

    let value = match byte_order {
        ByteOrder::LittleEndian => {
            let bits = LittleEndian::read_uint128(window, window.len());
            (bits >> bit_in_byte) & mask
        }
        ByteOrder::BigEndian => {
            let bits = BigEndian::read_uint128(window, window.len());
            let msb_index = (window.len() - 1) * 8 + bit_in_byte;
            (bits >> (msb_index + 1 - length)) & mask
        }
    };

    Ok(value as u64)
}

/// Sign-extend a value from N bits to 64 bits
///
/// If the value's MSB is 1, the upper bits are filled with 1s.
pub fn sign_extend(value: u64, bit_length: usize) -> i64 {
    if bit_length == 0 || bit_length >= 64 {
        return value as i64;
    }

    let shift = 64 - bit_length;
    ((value << shift) as i64) >> shift
}

/// Interpret an extracted raw value according to the signal definition
///
/// Choices are matched against the unsigned raw value, before sign
/// extension. Without a match the physical value is `raw * factor + offset`.
pub fn decode_signal(raw: u64, signal: &SignalDefinition, decode_choices: bool) -> DecodedValue {
    let raw_value = if signal.is_signed() {
        RawValue::Signed(sign_extend(raw, signal.length as usize))
    } else {
        RawValue::Unsigned(raw)
    };

    if decode_choices {
        if let Some(label) = signal.choices.as_ref().and_then(|table| table.get(&raw)) {
            return DecodedValue::State {
                raw: raw_value,
                label: label.clone(),
            };
        }
    }

    DecodedValue::Physical {
        raw: raw_value,
        value: raw_value.as_f64() * signal.factor + signal.offset,
    }
}

/// Message decoder - extracts signals from CAN payloads
pub struct MessageDecoder;

impl MessageDecoder {
    /// Decode every signal of a message from a payload
    ///
    /// # Returns
    /// * `Ok` with one entry per signal, in declaration order. Each entry holds
    ///   either the decoded value or the reason that signal failed.
    /// * `Err` if the message as a whole cannot be decoded (no signals, or a
    ///   short payload while truncation is disallowed).
    pub fn decode_message<'a>(
        payload: &[u8],
        message_def: &'a MessageDefinition,
        config: &DecoderConfig,
    ) -> Result<Vec<(&'a SignalDefinition, Result<DecodedValue>)>> {
        if message_def.signals.is_empty() {
            return Err(DecoderError::EmptyMessage(message_def.name.clone()));
        }

        if !config.accepts_payload(payload.len(), message_def.size) {
            return Err(DecoderError::TruncatedFrame {
                message: message_def.name.clone(),
                expected: message_def.size,
                actual: payload.len(),
            });
        }

        Ok(message_def
            .signals
            .iter()
            .map(|signal| {
                let decoded = Self::extract_signal_value(payload, signal)
                    .map(|raw| decode_signal(raw, signal, config.decode_choices));
                (signal, decoded)
            })
            .collect())
    }

    /// Extract the raw, unsigned signal value from a payload
    pub fn extract_signal_value(data: &[u8], signal: &SignalDefinition) -> Result<u64> {
        extract_bits(
            data,
            signal.start_bit as usize,
            signal.length as usize,
            signal.byte_order,
        )
        .map_err(|e| match e {
            BitSpanError::OutOfRange {
                required_bytes,
                available_bytes,
            } => DecoderError::SignalOutOfRange {
                signal: signal.name.clone(),
                required_bytes,
                available_bytes,
            },
            BitSpanError::InvalidLength(length) => DecoderError::InvalidSignalDefinition(format!(
                "Signal '{}' has unsupported length {}",
                signal.name, length
            )),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(signals: Vec<SignalDefinition>) -> MessageDefinition {
        MessageDefinition {
            id: 0x123,
            name: "EngineData".to_string(),
            size: 8,
            sender: None,
            signals,
            source: "test.dbc".to_string(),
        }
    }

    #[test]
    fn test_extract_little_endian_simple() {
        let data = vec![0xAB, 0xCD, 0xEF, 0x12];
        let value = extract_bits(&data, 0, 8, ByteOrder::LittleEndian).unwrap();
        assert_eq!(value, 0xAB);
    }

    #[test]
    fn test_extract_little_endian_cross_byte() {
        let data = vec![0xAB, 0xCD, 0xEF, 0x12];
        let value = extract_bits(&data, 0, 16, ByteOrder::LittleEndian).unwrap();
        assert_eq!(value, 0xCDAB);
    }

    #[test]
    fn test_extract_little_endian_unaligned() {
        // 12 bits starting at bit 8: byte 1 plus the low nibble of byte 2
        let data = vec![0x00, 0x5A, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00];
        let value = extract_bits(&data, 8, 12, ByteOrder::LittleEndian).unwrap();
        assert_eq!(value, 0x35A);

        let value = extract_bits(&[0b1011_0100], 2, 3, ByteOrder::LittleEndian).unwrap();
        assert_eq!(value, 0b101);
    }

    #[test]
    fn test_extract_little_endian_full_width() {
        let data = [0xFF; 9];
        let value = extract_bits(&data, 4, 64, ByteOrder::LittleEndian).unwrap();
        assert_eq!(value, u64::MAX);

        let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        let value = extract_bits(&data, 0, 64, ByteOrder::LittleEndian).unwrap();
        assert_eq!(value, 0x0807_0605_0403_0201);
    }

    #[test]
    fn test_extract_big_endian_simple() {
        let data = vec![0xAB, 0xCD, 0xEF, 0x12];
        let value = extract_bits(&data, 7, 8, ByteOrder::BigEndian).unwrap();
        assert_eq!(value, 0xAB);

        let value = extract_bits(&data, 7, 16, ByteOrder::BigEndian).unwrap();
        assert_eq!(value, 0xABCD);
    }

    #[test]
    fn test_extract_big_endian_motorola_layout() {
        // Frame A5 B6 D9: 12-bit field with MSB at bit 0 of byte 0
        let data = vec![0xA5, 0xB6, 0xD9, 0x00, 0x00, 0x00, 0x00, 0x00];
        let value = extract_bits(&data, 0, 12, ByteOrder::BigEndian).unwrap();
        assert_eq!(value, 0xDB6);

        // 6-bit field with MSB at bit 6 of byte 0
        let value = extract_bits(&data, 6, 6, ByteOrder::BigEndian).unwrap();
        assert_eq!(value, 18);

        // single bit at the MSB of byte 0
        let value = extract_bits(&data, 7, 1, ByteOrder::BigEndian).unwrap();
        assert_eq!(value, 1);
    }

    #[test]
    fn test_extract_out_of_range() {
        let data = vec![0xE8, 0x03];
        assert_eq!(
            extract_bits(&data, 16, 8, ByteOrder::LittleEndian),
            Err(BitSpanError::OutOfRange {
                required_bytes: 3,
                available_bytes: 2
            })
        );
        assert_eq!(
            extract_bits(&data, 15, 16, ByteOrder::BigEndian),
            Err(BitSpanError::OutOfRange {
                required_bytes: 3,
                available_bytes: 2
            })
        );
        assert!(extract_bits(&[], 0, 1, ByteOrder::LittleEndian).is_err());
    }

    #[test]
    fn test_extract_invalid_length() {
        let data = [0u8; 8];
        assert_eq!(
            extract_bits(&data, 0, 0, ByteOrder::LittleEndian),
            Err(BitSpanError::InvalidLength(0))
        );
        assert_eq!(
            extract_bits(&data, 0, 65, ByteOrder::BigEndian),
            Err(BitSpanError::InvalidLength(65))
        );
    }

    #[test]
    fn test_sign_extend_positive() {
        assert_eq!(sign_extend(0x7F, 8), 127);
    }

    #[test]
    fn test_sign_extend_negative() {
        assert_eq!(sign_extend(0xFF, 8), -1);
        assert_eq!(sign_extend(0x8000, 16), -32768);
        assert_eq!(sign_extend(0xDB6, 12), -586);
        assert_eq!(sign_extend(1, 1), -1);
        assert_eq!(sign_extend(u64::MAX, 64), -1);
    }

    #[test]
    fn test_decode_signal_physical() {
        let rpm = SignalDefinition::new("RPM", 0, 16).with_scaling(0.25, 0.0);
        let decoded = decode_signal(1000, &rpm, true);
        assert_eq!(
            decoded,
            DecodedValue::Physical {
                raw: RawValue::Unsigned(1000),
                value: 250.0
            }
        );
    }

    #[test]
    fn test_decode_signal_signed_with_offset() {
        let temp = SignalDefinition::new("Temperature", 0, 12)
            .signed()
            .with_scaling(0.01, 250.0);
        match decode_signal(0xDB6, &temp, true) {
            DecodedValue::Physical { raw, value } => {
                assert_eq!(raw, RawValue::Signed(-586));
                assert!((value - 244.14).abs() < 1e-9);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_decode_signal_choice() {
        let status = SignalDefinition::new("Status", 0, 2).with_choice(2, "FAULT");
        assert_eq!(
            decode_signal(2, &status, true),
            DecodedValue::State {
                raw: RawValue::Unsigned(2),
                label: "FAULT".to_string()
            }
        );

        // No matching entry falls back to scaling
        assert!(matches!(
            decode_signal(1, &status, true),
            DecodedValue::Physical { value, .. } if value == 1.0
        ));

        // Choice lookup disabled
        assert!(matches!(
            decode_signal(2, &status, false),
            DecodedValue::Physical { .. }
        ));
    }

    #[test]
    fn test_decode_signal_choice_uses_unsigned_raw() {
        let gear = SignalDefinition::new("Gear", 0, 4)
            .signed()
            .with_choice(0xF, "REVERSE");
        assert_eq!(
            decode_signal(0xF, &gear, true),
            DecodedValue::State {
                raw: RawValue::Signed(-1),
                label: "REVERSE".to_string()
            }
        );
    }

    #[test]
    fn test_decode_message_partial_payload() {
        let msg = message(vec![
            SignalDefinition::new("RPM", 0, 16).with_scaling(0.25, 0.0),
            SignalDefinition::new("Load", 48, 8),
        ]);

        let results = MessageDecoder::decode_message(&[0xE8, 0x03], &msg, &DecoderConfig::new()).unwrap();
        assert_eq!(results.len(), 2);

        assert_eq!(results[0].0.name, "RPM");
        assert!(matches!(
            results[0].1,
            Ok(DecodedValue::Physical { value, .. }) if value == 250.0
        ));

        assert_eq!(results[1].0.name, "Load");
        assert!(matches!(
            results[1].1,
            Err(DecoderError::SignalOutOfRange { required_bytes: 7, available_bytes: 2, .. })
        ));
    }

    #[test]
    fn test_decode_message_strict_truncation() {
        let msg = message(vec![SignalDefinition::new("RPM", 0, 16)]);
        let strict = DecoderConfig::new().with_truncated(false);

        let result = MessageDecoder::decode_message(&[0xE8, 0x03], &msg, &strict);
        assert!(matches!(
            result,
            Err(DecoderError::TruncatedFrame { expected: 8, actual: 2, .. })
        ));
    }

    #[test]
    fn test_decode_message_without_signals() {
        let msg = message(Vec::new());
        let result = MessageDecoder::decode_message(&[0u8; 8], &msg, &DecoderConfig::new());
        assert!(matches!(result, Err(DecoderError::EmptyMessage(_))));
    }
}

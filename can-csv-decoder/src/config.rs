//! Decoder configuration types
//!
//! The decoder only needs to know how to treat enumerated values and short
//! payloads. Input/output handling is configured by the application layer.

use serde::{Deserialize, Serialize};

/// Configuration for the decoder library
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoderConfig {
    /// Whether to map raw values through the signal's choices
    #[serde(default = "default_true")]
    pub decode_choices: bool,

    /// Whether payloads shorter than the message's declared size are decoded
    /// signal by signal (true) or rejected as a whole (false)
    #[serde(default = "default_true")]
    pub allow_truncated: bool,
}

fn default_true() -> bool {
    true
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            decode_choices: true,
            allow_truncated: true,
        }
    }
}

impl DecoderConfig {
    /// Create a new decoder configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: enable or disable choice lookup
    pub fn with_choices(mut self, enabled: bool) -> Self {
        self.decode_choices = enabled;
        self
    }

    /// Builder method: allow or reject truncated payloads
    pub fn with_truncated(mut self, allowed: bool) -> Self {
        self.allow_truncated = allowed;
        self
    }

    /// Check if a payload of `len` bytes may be decoded for a message of `size` bytes
    pub fn accepts_payload(&self, len: usize, size: usize) -> bool {
        self.allow_truncated || len >= size
    }
}

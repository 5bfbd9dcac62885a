use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bytes exactly as one read returned them
#[derive(Debug, Clone)]
pub struct RawChunk {
    pub bytes: Vec<u8>,
    pub received_at: Instant,
}

impl RawChunk {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            received_at: Instant::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl From<&[u8]> for RawChunk {
    fn from(bytes: &[u8]) -> Self {
        Self::new(bytes.to_vec())
    }
}

impl From<&str> for RawChunk {
    fn from(text: &str) -> Self {
        Self::new(text.as_bytes().to_vec())
    }
}

/// One decoded six-digit reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumericSample {
    pub value: f64,
    pub decoded_at: Instant,
}

impl NumericSample {
    pub fn new(value: f64, decoded_at: Instant) -> Self {
        Self { value, decoded_at }
    }
}

/// A reading confirmed by repetition; the authoritative weight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StableReading {
    pub value: f64,
    pub confirmed_at: DateTime<Utc>,
}

impl StableReading {
    pub fn new(value: f64) -> Self {
        Self {
            value,
            confirmed_at: Utc::now(),
        }
    }

    pub fn display(&self) -> String {
        format_weight(self.value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReadingKind {
    /// Every decoded sample, undebounced
    Raw,
    /// Confirmed readings only
    Stable,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightEvent {
    pub value: f64,
    pub kind: ReadingKind,
}

/// Operator display format, kilograms to two decimals
pub fn format_weight(value: f64) -> String {
    format!("{:.2} kg", value)
}

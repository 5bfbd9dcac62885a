//! Operator settings for the weighbridge link.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::serial::{DataBits, Parity, PortConfig, StopBits};
use crate::weight::StabilizerConfig;

/// Baud rates offered in the settings dialog
pub const STANDARD_BAUD_RATES: [u32; 9] = [600, 1200, 2400, 4800, 9600, 14400, 19200, 57600, 115200];

pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Weighbridge section of the settings file, as the operator entered it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeighbridgeSettings {
    pub com_port: String,
    pub baud_rate: u32,
    pub data_bits: u8,
    pub parity: String,
    pub stop_bits: f64,
}

impl Default for WeighbridgeSettings {
    fn default() -> Self {
        Self {
            com_port: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            data_bits: 8,
            parity: "None".to_string(),
            stop_bits: 1.0,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Failed to read settings: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid settings JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl WeighbridgeSettings {
    /// Parse either the bare weighbridge record or a whole settings document
    /// holding it under `"weighbridge"`
    pub fn from_json_str(json: &str) -> Result<Self, SettingsError> {
        let mut value: serde_json::Value = serde_json::from_str(json)?;
        if let Some(section) = value.get_mut("weighbridge") {
            return Ok(serde_json::from_value(section.take())?);
        }
        Ok(serde_json::from_value(value)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Validate into a port config, falling back to defaults for bad values
    pub fn to_port_config(&self) -> PortConfig {
        let baud_rate = if self.baud_rate == 0 {
            log::warn!("Invalid baud rate 0, using {}", DEFAULT_BAUD_RATE);
            DEFAULT_BAUD_RATE
        } else {
            self.baud_rate
        };

        let data_bits = DataBits::from_bits(self.data_bits).unwrap_or_else(|| {
            log::warn!("Invalid data bits {}, using 8", self.data_bits);
            DataBits::Eight
        });

        let parity = Parity::from_code(&self.parity).unwrap_or_else(|| {
            log::warn!("Invalid parity '{}', using None", self.parity);
            Parity::None
        });

        let stop_bits = StopBits::from_value(self.stop_bits).unwrap_or_else(|| {
            log::warn!("Invalid stop bits {}, using 1", self.stop_bits);
            StopBits::One
        });

        PortConfig {
            port_name: self.com_port.trim().to_string(),
            baud_rate,
            data_bits,
            parity,
            stop_bits,
        }
    }
}

impl From<&PortConfig> for WeighbridgeSettings {
    fn from(config: &PortConfig) -> Self {
        Self {
            com_port: config.port_name.clone(),
            baud_rate: config.baud_rate,
            data_bits: config.data_bits.bits(),
            parity: config.parity.as_str().to_string(),
            stop_bits: config.stop_bits.value(),
        }
    }
}

/// Timing and thresholds for the read/decode pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub read_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub error_backoff_ms: u64,
    pub stop_wait_ms: u64,
    pub tick_ms: u64,
    pub window_ms: u64,
    pub window_capacity: usize,
    pub min_repeats: usize,
    pub tolerance: f64,
    pub max_chunk_bytes: usize,
    pub carry_partial_runs: bool,
    pub event_capacity: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            read_timeout_ms: 2000,
            poll_interval_ms: 50,
            error_backoff_ms: 1000,
            stop_wait_ms: 1000,
            tick_ms: 200,
            window_ms: 1000,
            window_capacity: 64,
            min_repeats: 2,
            tolerance: 0.1,
            max_chunk_bytes: 4096,
            carry_partial_runs: false,
            event_capacity: 256,
        }
    }
}

impl PipelineSettings {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }

    pub fn stop_wait(&self) -> Duration {
        Duration::from_millis(self.stop_wait_ms)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }

    pub fn stabilizer(&self) -> StabilizerConfig {
        StabilizerConfig {
            window: Duration::from_millis(self.window_ms),
            capacity: self.window_capacity,
            min_repeats: self.min_repeats,
            tolerance: self.tolerance,
        }
    }
}

pub mod config;
pub mod discovery;
pub mod interface;
pub mod simulated;

pub use config::{DataBits, Parity, PortConfig, StopBits};
pub use discovery::PortDiscovery;
pub use interface::{SerialBackend, SerialDevice, SystemBackend};
pub use simulated::SimulatedBackend;

use serde::{Deserialize, Serialize};

/// A serial port as reported by enumeration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerialPortInfo {
    pub port_name: String,
    pub vid: Option<u16>,
    pub pid: Option<u16>,
    pub serial_number: Option<String>,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
}

impl SerialPortInfo {
    pub fn named(port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            vid: None,
            pid: None,
            serial_number: None,
            manufacturer: None,
            product: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SerialError {
    #[error("Port not open")]
    NotOpen,

    #[error("Communication timeout")]
    Timeout,

    #[error("Unsupported port setting: {0}")]
    UnsupportedSetting(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialport error: {0}")]
    SerialportError(#[from] serialport::Error),
}

pub type Result<T> = std::result::Result<T, SerialError>;

//! Serial line settings and their mapping onto the serialport crate.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serialport::{DataBits as SpDataBits, Parity as SpParity, StopBits as SpStopBits};

use super::{Result, SerialError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataBits {
    Five,
    Six,
    Seven,
    Eight,
}

impl DataBits {
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            5 => Some(DataBits::Five),
            6 => Some(DataBits::Six),
            7 => Some(DataBits::Seven),
            8 => Some(DataBits::Eight),
            _ => None,
        }
    }

    pub fn bits(&self) -> u8 {
        match self {
            DataBits::Five => 5,
            DataBits::Six => 6,
            DataBits::Seven => 7,
            DataBits::Eight => 8,
        }
    }
}

impl Default for DataBits {
    fn default() -> Self {
        DataBits::Eight
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Parity {
    None,
    Odd,
    Even,
    Mark,
    Space,
}

impl Parity {
    /// Parse an operator parity code ("None", "odd", "E", ...)
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_lowercase().as_str() {
            "none" | "n" => Some(Parity::None),
            "odd" | "o" => Some(Parity::Odd),
            "even" | "e" => Some(Parity::Even),
            "mark" | "m" => Some(Parity::Mark),
            "space" | "s" => Some(Parity::Space),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Parity::None => "None",
            Parity::Odd => "Odd",
            Parity::Even => "Even",
            Parity::Mark => "Mark",
            Parity::Space => "Space",
        }
    }
}

impl Default for Parity {
    fn default() -> Self {
        Parity::None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopBits {
    One,
    OnePointFive,
    Two,
}

impl StopBits {
    pub fn from_value(value: f64) -> Option<Self> {
        if (value - 1.0).abs() < f64::EPSILON {
            Some(StopBits::One)
        } else if (value - 1.5).abs() < f64::EPSILON {
            Some(StopBits::OnePointFive)
        } else if (value - 2.0).abs() < f64::EPSILON {
            Some(StopBits::Two)
        } else {
            None
        }
    }

    pub fn value(&self) -> f64 {
        match self {
            StopBits::One => 1.0,
            StopBits::OnePointFive => 1.5,
            StopBits::Two => 2.0,
        }
    }
}

impl Default for StopBits {
    fn default() -> Self {
        StopBits::One
    }
}

/// Line settings for one weighbridge connection.
///
/// A config is fixed for the lifetime of a connection; changing any field
/// means disconnecting and connecting again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortConfig {
    pub port_name: String,
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
}

impl PortConfig {
    pub fn new(port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate: 9600,
            data_bits: DataBits::default(),
            parity: Parity::default(),
            stop_bits: StopBits::default(),
        }
    }

    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn with_data_bits(mut self, data_bits: DataBits) -> Self {
        self.data_bits = data_bits;
        self
    }

    pub fn with_parity(mut self, parity: Parity) -> Self {
        self.parity = parity;
        self
    }

    pub fn with_stop_bits(mut self, stop_bits: StopBits) -> Self {
        self.stop_bits = stop_bits;
        self
    }

    /// Build a serialport builder for this config
    pub fn to_builder(&self, read_timeout: Duration) -> Result<serialport::SerialPortBuilder> {
        Ok(serialport::new(self.port_name.as_str(), self.baud_rate)
            .data_bits(to_serialport_data_bits(self.data_bits))
            .parity(to_serialport_parity(self.parity)?)
            .stop_bits(to_serialport_stop_bits(self.stop_bits)?)
            .timeout(read_timeout))
    }
}

impl fmt::Display for PortConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} @ {} baud {}{}{}",
            self.port_name,
            self.baud_rate,
            self.data_bits.bits(),
            self.parity.as_str().chars().next().unwrap_or('N'),
            self.stop_bits.value()
        )
    }
}

pub fn to_serialport_data_bits(bits: DataBits) -> SpDataBits {
    match bits {
        DataBits::Five => SpDataBits::Five,
        DataBits::Six => SpDataBits::Six,
        DataBits::Seven => SpDataBits::Seven,
        DataBits::Eight => SpDataBits::Eight,
    }
}

/// The serialport driver has no Mark/Space parity
pub fn to_serialport_parity(parity: Parity) -> Result<SpParity> {
    match parity {
        Parity::None => Ok(SpParity::None),
        Parity::Odd => Ok(SpParity::Odd),
        Parity::Even => Ok(SpParity::Even),
        Parity::Mark | Parity::Space => Err(SerialError::UnsupportedSetting(format!(
            "{} parity",
            parity.as_str()
        ))),
    }
}

pub fn to_serialport_stop_bits(stop_bits: StopBits) -> Result<SpStopBits> {
    match stop_bits {
        StopBits::One => Ok(SpStopBits::One),
        StopBits::Two => Ok(SpStopBits::Two),
        StopBits::OnePointFive => Err(SerialError::UnsupportedSetting(
            "1.5 stop bits".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parity_codes() {
        assert_eq!(Parity::from_code("None"), Some(Parity::None));
        assert_eq!(Parity::from_code(" even "), Some(Parity::Even));
        assert_eq!(Parity::from_code("M"), Some(Parity::Mark));
        assert_eq!(Parity::from_code("bogus"), None);
    }

    #[test]
    fn test_stop_bits_values() {
        assert_eq!(StopBits::from_value(1.0), Some(StopBits::One));
        assert_eq!(StopBits::from_value(1.5), Some(StopBits::OnePointFive));
        assert_eq!(StopBits::from_value(2.0), Some(StopBits::Two));
        assert_eq!(StopBits::from_value(3.0), None);
    }

    #[test]
    fn test_data_bits_range() {
        assert_eq!(DataBits::from_bits(5), Some(DataBits::Five));
        assert_eq!(DataBits::from_bits(8).map(|b| b.bits()), Some(8));
        assert_eq!(DataBits::from_bits(9), None);
    }

    #[test]
    fn test_unsupported_driver_settings() {
        assert!(to_serialport_parity(Parity::Mark).is_err());
        assert!(to_serialport_parity(Parity::Space).is_err());
        assert!(to_serialport_stop_bits(StopBits::OnePointFive).is_err());
        assert!(matches!(to_serialport_parity(Parity::Odd), Ok(SpParity::Odd)));
        assert!(matches!(to_serialport_stop_bits(StopBits::Two), Ok(SpStopBits::Two)));
    }

    #[test]
    fn test_display() {
        let config = PortConfig::new("COM3").with_parity(Parity::Even);
        assert_eq!(config.to_string(), "COM3 @ 9600 baud 8E1");
    }
}

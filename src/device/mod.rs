pub mod manager;
pub mod models;

pub use manager::WeighbridgeLink;
pub use models::*;

use crate::serial::SerialError;

/// Classified connection failure, shown to the operator with guidance
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LinkError {
    #[error("No serial port selected")]
    NoPortSelected,

    #[error("Port {port} was not found")]
    PortNotFound { port: String },

    #[error("Port {port} is in use by another application: {detail}")]
    PortInUse { port: String, detail: String },

    #[error("Weighbridge on {port} is not responding: {detail}")]
    DeviceNotResponding { port: String, detail: String },

    #[error("Failed to open {port}: {detail}")]
    OtherIo { port: String, detail: String },

    #[error("No previous connection attempt to retry")]
    NoPriorAttempt,
}

impl LinkError {
    /// Sort a low-level open error into the operator-facing taxonomy
    pub fn classify(port: &str, error: &SerialError) -> Self {
        let detail = error.to_string();
        let text = detail.to_lowercase();
        let port = port.to_string();

        let io_kind = match error {
            SerialError::IoError(e) => Some(e.kind()),
            SerialError::SerialportError(e) => match e.kind() {
                serialport::ErrorKind::NoDevice => return LinkError::PortNotFound { port },
                serialport::ErrorKind::Io(kind) => Some(kind),
                _ => None,
            },
            SerialError::Timeout => return LinkError::DeviceNotResponding { port, detail },
            SerialError::UnsupportedSetting(_) | SerialError::NotOpen => {
                return LinkError::OtherIo { port, detail }
            }
        };

        if text.contains("not functioning")
            || text.contains("timed out")
            || io_kind == Some(std::io::ErrorKind::TimedOut)
        {
            LinkError::DeviceNotResponding { port, detail }
        } else if text.contains("not found")
            || text.contains("no such file")
            || text.contains("cannot find")
            || io_kind == Some(std::io::ErrorKind::NotFound)
        {
            LinkError::PortNotFound { port }
        } else if text.contains("permission")
            || text.contains("access is denied")
            || text.contains("busy")
            || io_kind == Some(std::io::ErrorKind::PermissionDenied)
            || io_kind == Some(std::io::ErrorKind::AddrInUse)
        {
            LinkError::PortInUse { port, detail }
        } else {
            LinkError::OtherIo { port, detail }
        }
    }

    /// What the operator should do about it
    pub fn guidance(&self) -> &'static str {
        match self {
            LinkError::NoPortSelected => "Select a COM port in the weighbridge settings.",
            LinkError::PortNotFound { .. } => {
                "Refresh the port list and check that the indicator cable is plugged in."
            }
            LinkError::PortInUse { .. } => {
                "Close any other application that might be using the port and try again."
            }
            LinkError::DeviceNotResponding { .. } => {
                "Check the physical connection and that the indicator is powered on, then retry."
            }
            LinkError::OtherIo { .. } => {
                "Check the port settings (baud rate, parity, stop bits) and the cable, then retry."
            }
            LinkError::NoPriorAttempt => "Connect to a port first.",
        }
    }

    /// Whether a retry affordance makes sense for this failure
    pub fn offers_retry(&self) -> bool {
        matches!(
            self,
            LinkError::PortInUse { .. }
                | LinkError::DeviceNotResponding { .. }
                | LinkError::OtherIo { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, LinkError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn io_error(kind: io::ErrorKind, msg: &str) -> SerialError {
        SerialError::IoError(io::Error::new(kind, msg))
    }

    #[test]
    fn test_classify_by_kind() {
        let err = LinkError::classify("COM3", &io_error(io::ErrorKind::NotFound, "x"));
        assert_eq!(err, LinkError::PortNotFound { port: "COM3".into() });

        let err = LinkError::classify("COM3", &io_error(io::ErrorKind::PermissionDenied, "x"));
        assert!(matches!(err, LinkError::PortInUse { .. }));

        let no_device = serialport::Error::new(serialport::ErrorKind::NoDevice, "gone");
        let err = LinkError::classify("COM3", &SerialError::SerialportError(no_device));
        assert!(matches!(err, LinkError::PortNotFound { .. }));
    }

    #[test]
    fn test_classify_by_text() {
        let err = LinkError::classify(
            "COM4",
            &io_error(
                io::ErrorKind::Other,
                "A device attached to the system is not functioning.",
            ),
        );
        assert!(matches!(err, LinkError::DeviceNotResponding { .. }));

        let err = LinkError::classify("COM4", &io_error(io::ErrorKind::Other, "Access is denied."));
        assert!(matches!(err, LinkError::PortInUse { .. }));

        let err = LinkError::classify(
            "/dev/ttyUSB0",
            &io_error(io::ErrorKind::Other, "Device or resource busy"),
        );
        assert!(matches!(err, LinkError::PortInUse { .. }));

        let err = LinkError::classify("COM4", &io_error(io::ErrorKind::Other, "framing mismatch"));
        match err {
            LinkError::OtherIo { detail, .. } => assert!(detail.contains("framing mismatch")),
            other => panic!("unexpected class {:?}", other),
        }
    }

    #[test]
    fn test_timeout_and_settings() {
        assert!(matches!(
            LinkError::classify("COM1", &SerialError::Timeout),
            LinkError::DeviceNotResponding { .. }
        ));
        assert!(matches!(
            LinkError::classify("COM1", &SerialError::UnsupportedSetting("Mark parity".into())),
            LinkError::OtherIo { .. }
        ));
    }

    #[test]
    fn test_retry_affordance() {
        assert!(!LinkError::PortNotFound { port: "COM1".into() }.offers_retry());
        assert!(LinkError::PortInUse { port: "COM1".into(), detail: String::new() }.offers_retry());
        assert!(!LinkError::NoPriorAttempt.offers_retry());
    }
}

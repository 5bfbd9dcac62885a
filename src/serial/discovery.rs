use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{Result, SerialBackend, SerialPortInfo};
use crate::device::LinkError;

/// Whether a port can be opened by this process right now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortAvailability {
    Free,
    InUse,
    /// The probe failed for a reason other than another holder
    Unknown,
}

/// Enumerates serial ports and checks them before use
#[derive(Clone)]
pub struct PortDiscovery {
    backend: Arc<dyn SerialBackend>,
}

impl PortDiscovery {
    pub fn new(backend: Arc<dyn SerialBackend>) -> Self {
        Self { backend }
    }

    /// All ports the system currently reports
    pub fn list_ports(&self) -> Result<Vec<SerialPortInfo>> {
        self.backend.available_ports()
    }

    pub fn port_names(&self) -> Result<Vec<String>> {
        Ok(self
            .list_ports()?
            .into_iter()
            .map(|info| info.port_name)
            .collect())
    }

    pub fn is_present(&self, port_name: &str) -> Result<bool> {
        Ok(self.list_ports()?.iter().any(|info| info.port_name == port_name))
    }

    /// Probe the port with a short exclusive open
    pub fn availability(&self, port_name: &str) -> PortAvailability {
        match self.backend.probe(port_name) {
            Ok(()) => PortAvailability::Free,
            Err(e) => match LinkError::classify(port_name, &e) {
                LinkError::PortInUse { .. } => PortAvailability::InUse,
                other => {
                    log::debug!("Probe of {} inconclusive: {}", port_name, other);
                    PortAvailability::Unknown
                }
            },
        }
    }

    /// Fail with `PortInUse` if another process holds the port.
    /// Inconclusive probes pass; the real open reports those.
    pub fn ensure_free(&self, port_name: &str) -> std::result::Result<(), LinkError> {
        match self.backend.probe(port_name) {
            Ok(()) => Ok(()),
            Err(e) => match LinkError::classify(port_name, &e) {
                in_use @ LinkError::PortInUse { .. } => Err(in_use),
                other => {
                    log::debug!("Probe of {} inconclusive: {}", port_name, other);
                    Ok(())
                }
            },
        }
    }

    pub fn is_port_in_use(&self, port_name: &str) -> bool {
        self.availability(port_name) == PortAvailability::InUse
    }

    /// Enumerate and probe every port
    pub fn scan(&self) -> Result<Vec<(SerialPortInfo, PortAvailability)>> {
        Ok(self
            .list_ports()?
            .into_iter()
            .map(|info| {
                let availability = self.availability(&info.port_name);
                (info, availability)
            })
            .collect())
    }
}

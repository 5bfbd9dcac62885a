use std::io::Read;
use std::time::Duration;

use serialport::{SerialPort, SerialPortType};

use super::{PortConfig, Result, SerialError, SerialPortInfo};

/// Probe opens use a short timeout; nothing is read from the port
const PROBE_TIMEOUT: Duration = Duration::from_millis(50);

/// Byte-level access to an open serial device
pub trait SerialDevice: Send {
    /// Number of bytes waiting in the input buffer
    fn bytes_to_read(&mut self) -> Result<u32>;

    /// Read into `buf`, returning the number of bytes read
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    fn name(&self) -> Option<String>;
}

/// Source of serial ports: enumeration, availability probing and opening.
///
/// `WeighbridgeLink` only touches hardware through this trait so tests and
/// the simulator can stand in for real ports.
pub trait SerialBackend: Send + Sync {
    fn available_ports(&self) -> Result<Vec<SerialPortInfo>>;

    /// Briefly open and release the port; `Ok` means nobody else holds it
    fn probe(&self, port_name: &str) -> Result<()>;

    fn open(&self, config: &PortConfig, read_timeout: Duration) -> Result<Box<dyn SerialDevice>>;
}

/// Open serialport handle
pub struct SystemDevice {
    port: Box<dyn SerialPort>,
}

impl SystemDevice {
    pub fn new(port: Box<dyn SerialPort>) -> Self {
        Self { port }
    }
}

impl SerialDevice for SystemDevice {
    fn bytes_to_read(&mut self) -> Result<u32> {
        Ok(self.port.bytes_to_read()?)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => Err(SerialError::Timeout),
            Err(e) => Err(SerialError::IoError(e)),
        }
    }

    fn name(&self) -> Option<String> {
        self.port.name()
    }
}

/// Real serial ports through the serialport crate
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBackend;

impl SystemBackend {
    pub fn new() -> Self {
        Self
    }
}

impl SerialBackend for SystemBackend {
    fn available_ports(&self) -> Result<Vec<SerialPortInfo>> {
        let ports = serialport::available_ports()?;
        let devices = ports
            .into_iter()
            .map(|port| match port.port_type {
                SerialPortType::UsbPort(usb_info) => SerialPortInfo {
                    port_name: port.port_name,
                    vid: Some(usb_info.vid),
                    pid: Some(usb_info.pid),
                    serial_number: usb_info.serial_number,
                    manufacturer: usb_info.manufacturer,
                    product: usb_info.product,
                },
                _ => SerialPortInfo::named(port.port_name),
            })
            .collect();

        Ok(devices)
    }

    fn probe(&self, port_name: &str) -> Result<()> {
        let port = serialport::new(port_name, 9600)
            .timeout(PROBE_TIMEOUT)
            .open()?;
        drop(port);
        Ok(())
    }

    fn open(&self, config: &PortConfig, read_timeout: Duration) -> Result<Box<dyn SerialDevice>> {
        let port = config.to_builder(read_timeout)?.open()?;
        log::info!("Opened serial port {}", config);
        Ok(Box::new(SystemDevice::new(port)))
    }
}

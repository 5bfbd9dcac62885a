//! A stand-in weighbridge for test mode.
//!
//! The simulated indicator emits `ST,GS,+025000kg\r\n` style frames on a
//! fixed interval, cycling through a short pattern of offsets around the
//! target weight. Each offset repeats so the stabilizer can settle on it.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use super::{PortConfig, Result, SerialBackend, SerialDevice, SerialError, SerialPortInfo};

pub const SIMULATED_PORT: &str = "SIMULATED";

const OFFSETS: [i64; 12] = [0, 0, 0, 5, 5, 5, -4, -4, -4, 2, 2, 2];

#[derive(Debug, Clone)]
pub struct SimulatedBackend {
    target_weight: u32,
    frame_interval: Duration,
}

impl SimulatedBackend {
    pub fn new(target_weight: u32) -> Self {
        Self {
            target_weight,
            frame_interval: Duration::from_millis(500),
        }
    }

    pub fn with_frame_interval(mut self, frame_interval: Duration) -> Self {
        self.frame_interval = frame_interval;
        self
    }

    fn check_port(&self, port_name: &str) -> Result<()> {
        if port_name == SIMULATED_PORT {
            Ok(())
        } else {
            Err(SerialError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} not found", port_name),
            )))
        }
    }
}

impl Default for SimulatedBackend {
    fn default() -> Self {
        Self::new(25_000)
    }
}

impl SerialBackend for SimulatedBackend {
    fn available_ports(&self) -> Result<Vec<SerialPortInfo>> {
        let mut info = SerialPortInfo::named(SIMULATED_PORT);
        info.product = Some("Simulated weighbridge".to_string());
        Ok(vec![info])
    }

    fn probe(&self, port_name: &str) -> Result<()> {
        self.check_port(port_name)
    }

    fn open(&self, config: &PortConfig, _read_timeout: Duration) -> Result<Box<dyn SerialDevice>> {
        self.check_port(&config.port_name)?;
        log::info!(
            "Test mode: simulating weighbridge around {} kg",
            self.target_weight
        );
        Ok(Box::new(SimulatedScale {
            target_weight: self.target_weight,
            frame_interval: self.frame_interval,
            next_frame_at: Instant::now(),
            step: 0,
            pending: VecDeque::new(),
        }))
    }
}

struct SimulatedScale {
    target_weight: u32,
    frame_interval: Duration,
    next_frame_at: Instant,
    step: usize,
    pending: VecDeque<u8>,
}

impl SimulatedScale {
    fn next_weight(&mut self) -> u32 {
        let offset = OFFSETS[self.step % OFFSETS.len()];
        self.step += 1;
        (i64::from(self.target_weight) + offset).clamp(0, 999_999) as u32
    }

    fn emit_due_frames(&mut self) {
        let now = Instant::now();
        while now >= self.next_frame_at {
            let weight = self.next_weight();
            let frame = format!("ST,GS,+{:06}kg\r\n", weight);
            self.pending.extend(frame.bytes());
            self.next_frame_at += self.frame_interval;
        }
    }
}

impl SerialDevice for SimulatedScale {
    fn bytes_to_read(&mut self) -> Result<u32> {
        self.emit_due_frames();
        Ok(self.pending.len() as u32)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.emit_due_frames();
        let n = buf.len().min(self.pending.len());
        for (slot, byte) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn name(&self) -> Option<String> {
        Some(SIMULATED_PORT.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulated_frames_are_six_digit_runs() {
        let backend = SimulatedBackend::new(25_000).with_frame_interval(Duration::from_secs(60));
        let mut device = backend
            .open(&PortConfig::new(SIMULATED_PORT), Duration::from_secs(1))
            .expect("simulated port opens");

        let available = device.bytes_to_read().unwrap() as usize;
        let mut buf = vec![0u8; available];
        let n = device.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"ST,GS,+025000kg\r\n");
        assert_eq!(device.bytes_to_read().unwrap(), 0);
    }

    #[test]
    fn test_unknown_port_is_rejected() {
        let backend = SimulatedBackend::default();
        assert!(backend.probe("COM9").is_err());
        assert!(backend.open(&PortConfig::new("COM9"), Duration::from_secs(1)).is_err());
        assert!(backend.probe(SIMULATED_PORT).is_ok());
    }
}

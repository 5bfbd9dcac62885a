//! Weighbridge serial link.
//!
//! Reads the byte stream of a truck-scale indicator, extracts six-digit
//! weight frames, debounces them into stable readings and fans both out to
//! any number of observers.

pub mod config;
pub mod device;
pub mod serial;
pub mod weight;

pub use config::{PipelineSettings, WeighbridgeSettings};
pub use device::{ConnectionState, LinkError, WeighbridgeLink};
pub use serial::{PortConfig, PortDiscovery};
pub use weight::{Broadcaster, ObserverId, ReadingKind, StableReading, WeightEvent};

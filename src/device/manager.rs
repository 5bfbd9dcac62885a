use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;

use super::{ConnectionState, LinkError, Result};
use crate::config::PipelineSettings;
use crate::serial::{
    PortConfig, PortDiscovery, SerialBackend, SerialDevice, SimulatedBackend, SystemBackend,
};
use crate::weight::reader::SharedDevice;
use crate::weight::{Broadcaster, DecodePipeline, StableReading, StreamReader, WeightCells};

/// Background tasks and device handle of an open connection
struct Session {
    config: PortConfig,
    device: SharedDevice,
    running: Arc<AtomicBool>,
    reader: JoinHandle<()>,
    decoder: JoinHandle<()>,
}

impl Drop for Session {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

/// Owns the weighbridge serial connection.
/// Handles discovery checks, connect/disconnect/retry and the background
/// read and decode tasks. Weight values reach consumers through the
/// broadcaster; the device handle never leaves this type.
pub struct WeighbridgeLink {
    backend: Arc<dyn SerialBackend>,
    discovery: PortDiscovery,
    settings: PipelineSettings,
    broadcaster: Arc<Broadcaster>,
    cells: Arc<WeightCells>,
    state_tx: watch::Sender<ConnectionState>,
    session: Mutex<Option<Session>>,
    last_config: parking_lot::Mutex<Option<PortConfig>>,
}

impl WeighbridgeLink {
    pub fn new(backend: Arc<dyn SerialBackend>, settings: PipelineSettings) -> Self {
        let (state_tx, _state_rx) = watch::channel(ConnectionState::Disconnected);
        Self {
            discovery: PortDiscovery::new(backend.clone()),
            broadcaster: Arc::new(Broadcaster::new(settings.event_capacity)),
            cells: Arc::new(WeightCells::new()),
            backend,
            settings,
            state_tx,
            session: Mutex::new(None),
            last_config: parking_lot::Mutex::new(None),
        }
    }

    /// Link over the system's real serial ports
    pub fn system(settings: PipelineSettings) -> Self {
        Self::new(Arc::new(SystemBackend::new()), settings)
    }

    /// Link over a simulated indicator (test mode)
    pub fn simulated(target_weight: u32, settings: PipelineSettings) -> Self {
        Self::new(Arc::new(SimulatedBackend::new(target_weight)), settings)
    }

    pub fn discovery(&self) -> &PortDiscovery {
        &self.discovery
    }

    pub fn broadcaster(&self) -> Arc<Broadcaster> {
        self.broadcaster.clone()
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn state(&self) -> ConnectionState {
        self.state_tx.borrow().clone()
    }

    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.state_tx.borrow().is_connected()
    }

    /// Most recent decoded sample, undebounced
    pub fn current_weight(&self) -> Option<f64> {
        self.cells.latest().map(|s| s.value)
    }

    pub fn stable_reading(&self) -> Option<StableReading> {
        self.cells.stable()
    }

    pub fn stable_receiver(&self) -> watch::Receiver<Option<StableReading>> {
        self.cells.subscribe_stable()
    }

    /// Config of the most recent connect attempt, successful or not
    pub fn last_config(&self) -> Option<PortConfig> {
        self.last_config.lock().clone()
    }

    /// Config of the open connection
    pub async fn active_config(&self) -> Option<PortConfig> {
        self.session.lock().await.as_ref().map(|s| s.config.clone())
    }

    /// Connect to the weighbridge. An open connection is closed first.
    pub async fn connect(&self, config: PortConfig) -> Result<()> {
        *self.last_config.lock() = Some(config.clone());

        let mut session_guard = self.session.lock().await;
        if let Some(previous) = session_guard.take() {
            log::info!("Closing {} before reconnecting", previous.config.port_name);
            self.stop_session(previous).await;
        }

        if config.port_name.trim().is_empty() {
            return self.fail(LinkError::NoPortSelected);
        }

        self.set_state(ConnectionState::Connecting);
        log::info!("Attempting to connect to weighbridge on {}", config);

        let discovery = self.discovery.clone();
        let backend = self.backend.clone();
        let read_timeout = self.settings.read_timeout();
        let open_config = config.clone();
        let opened = tokio::task::spawn_blocking(move || {
            open_device(&discovery, backend.as_ref(), &open_config, read_timeout)
        })
        .await
        .unwrap_or_else(|e| {
            Err(LinkError::OtherIo {
                port: config.port_name.clone(),
                detail: format!("open task failed: {}", e),
            })
        });

        match opened {
            Ok(device) => {
                self.set_state(ConnectionState::Connected);
                *session_guard = Some(self.start_session(config.clone(), device));
                log::info!("Connected to weighbridge on {}", config.port_name);
                Ok(())
            }
            Err(e) => self.fail(e),
        }
    }

    /// Repeat the last connect attempt
    pub async fn retry(&self) -> Result<()> {
        let config = self.last_config().ok_or(LinkError::NoPriorAttempt)?;
        log::info!("Retrying weighbridge connection on {}", config.port_name);
        self.connect(config).await
    }

    /// Stop the background tasks and close the port. Safe to call when
    /// already disconnected. Returns false only if a task ended abnormally.
    pub async fn disconnect(&self) -> bool {
        let session = self.session.lock().await.take();
        let clean = match session {
            Some(session) => self.stop_session(session).await,
            None => {
                log::debug!("Weighbridge already disconnected");
                true
            }
        };
        self.set_state(ConnectionState::Disconnected);
        clean
    }

    fn start_session(&self, config: PortConfig, device: Box<dyn SerialDevice>) -> Session {
        let device: SharedDevice = Arc::new(parking_lot::Mutex::new(Some(device)));
        let running = Arc::new(AtomicBool::new(true));
        let (chunk_tx, chunk_rx) = mpsc::unbounded_channel();

        self.cells.reset();

        let reader = StreamReader::new(device.clone(), running.clone(), chunk_tx, &self.settings);
        let reader = tokio::task::spawn_blocking(move || reader.run());

        let pipeline = DecodePipeline::new(&self.settings, self.broadcaster.clone(), self.cells.clone());
        let decoder = tokio::spawn(pipeline.run(chunk_rx, running.clone()));

        Session {
            config,
            device,
            running,
            reader,
            decoder,
        }
    }

    async fn stop_session(&self, mut session: Session) -> bool {
        session.running.store(false, Ordering::Release);
        let wait = self.settings.stop_wait();

        let reader_stopped = join_task("reader", &mut session.reader, wait).await;
        let decoder_stopped = join_task("decoder", &mut session.decoder, wait).await;

        if reader_stopped.is_some() {
            // Reader is gone, so nothing else touches the handle
            session.device.lock().take();
        } else {
            log::warn!(
                "Port {} will close when the reader exits",
                session.config.port_name
            );
        }

        log::info!("Disconnected from weighbridge on {}", session.config.port_name);
        reader_stopped.unwrap_or(true) && decoder_stopped.unwrap_or(true)
    }

    fn set_state(&self, state: ConnectionState) {
        self.state_tx.send_replace(state);
    }

    fn fail<T>(&self, error: LinkError) -> Result<T> {
        log::error!("Weighbridge connection failed: {} ({})", error, error.guidance());
        self.set_state(ConnectionState::Failed(error.clone()));
        Err(error)
    }
}

impl Drop for WeighbridgeLink {
    fn drop(&mut self) {
        if let Ok(mut session) = self.session.try_lock() {
            session.take();
        }
    }
}

/// Wait up to `wait` for a task. `Some(ok)` if it finished, `None` on timeout.
async fn join_task(name: &str, handle: &mut JoinHandle<()>, wait: Duration) -> Option<bool> {
    match tokio::time::timeout(wait, handle).await {
        Ok(Ok(())) => Some(true),
        Ok(Err(e)) => {
            log::error!("Weighbridge {} task failed: {}", name, e);
            Some(false)
        }
        Err(_) => {
            log::warn!("Weighbridge {} task did not stop within {:?}", name, wait);
            None
        }
    }
}

/// Presence check, in-use probe, then the real open
fn open_device(
    discovery: &PortDiscovery,
    backend: &dyn SerialBackend,
    config: &PortConfig,
    read_timeout: Duration,
) -> Result<Box<dyn SerialDevice>> {
    let port = config.port_name.as_str();

    let present = discovery
        .is_present(port)
        .map_err(|e| LinkError::classify(port, &e))?;
    if !present {
        return Err(LinkError::PortNotFound {
            port: port.to_string(),
        });
    }

    discovery.ensure_free(port)?;

    backend
        .open(config, read_timeout)
        .map_err(|e| LinkError::classify(port, &e))
}

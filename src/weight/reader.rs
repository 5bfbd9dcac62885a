//! Background loops of a live connection.
//!
//! `StreamReader` drains the device on a blocking thread and hands every
//! chunk, untouched, to `DecodePipeline` over an unbounded channel. The
//! pipeline decodes, debounces and publishes on an async task.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

use super::broadcaster::Broadcaster;
use super::decoder::FrameDecoder;
use super::stabilizer::Stabilizer;
use super::types::{NumericSample, RawChunk, ReadingKind, StableReading};
use crate::config::PipelineSettings;
use crate::serial::{SerialDevice, SerialError};

pub(crate) type SharedDevice = Arc<Mutex<Option<Box<dyn SerialDevice>>>>;

/// Longest single sleep while waiting, so a stop request is noticed quickly
const STOP_CHECK_STEP: Duration = Duration::from_millis(25);

/// Poll step while the rest of a line is still arriving
const LINE_WAIT_STEP: Duration = Duration::from_millis(5);

/// Latest raw sample and current stable reading.
///
/// Written only by the decode loop; `watch` makes each update a single swap,
/// so readers see the old value or the new one.
#[derive(Debug)]
pub struct WeightCells {
    latest: watch::Sender<Option<NumericSample>>,
    stable: watch::Sender<Option<StableReading>>,
}

impl WeightCells {
    pub fn new() -> Self {
        let (latest, _) = watch::channel(None);
        let (stable, _) = watch::channel(None);
        Self { latest, stable }
    }

    pub fn latest(&self) -> Option<NumericSample> {
        *self.latest.borrow()
    }

    pub fn stable(&self) -> Option<StableReading> {
        self.stable.borrow().clone()
    }

    pub fn subscribe_stable(&self) -> watch::Receiver<Option<StableReading>> {
        self.stable.subscribe()
    }

    pub(crate) fn reset(&self) {
        self.latest.send_replace(None);
        self.stable.send_replace(None);
    }

    fn set_latest(&self, sample: NumericSample) {
        self.latest.send_replace(Some(sample));
    }

    fn set_stable(&self, reading: StableReading) {
        self.stable.send_replace(Some(reading));
    }
}

impl Default for WeightCells {
    fn default() -> Self {
        Self::new()
    }
}

pub struct StreamReader {
    device: SharedDevice,
    running: Arc<AtomicBool>,
    chunk_tx: mpsc::UnboundedSender<RawChunk>,
    poll_interval: Duration,
    error_backoff: Duration,
    line_timeout: Duration,
    max_chunk_bytes: usize,
}

impl StreamReader {
    pub(crate) fn new(
        device: SharedDevice,
        running: Arc<AtomicBool>,
        chunk_tx: mpsc::UnboundedSender<RawChunk>,
        settings: &PipelineSettings,
    ) -> Self {
        Self {
            device,
            running,
            chunk_tx,
            poll_interval: settings.poll_interval(),
            error_backoff: settings.error_backoff(),
            line_timeout: settings.read_timeout(),
            max_chunk_bytes: settings.max_chunk_bytes.max(1),
        }
    }

    /// Blocking read loop; returns once the running flag is cleared
    pub fn run(self) {
        log::info!("Weighbridge stream reader started");

        while self.running.load(Ordering::Acquire) {
            let result = {
                let mut guard = self.device.lock();
                match guard.as_mut() {
                    Some(device) => {
                        read_available(device.as_mut(), self.max_chunk_bytes, self.line_timeout)
                    }
                    None => Err(SerialError::NotOpen),
                }
            };

            match result {
                Ok(Some(bytes)) => {
                    log::trace!("Read {} bytes from weighbridge", bytes.len());
                    if self.chunk_tx.send(RawChunk::new(bytes)).is_err() {
                        log::debug!("Decode loop gone, stopping reader");
                        break;
                    }
                }
                Ok(None) | Err(SerialError::Timeout) => {}
                Err(e) => {
                    log::warn!("Weighbridge read error: {}", e);
                    self.pause(self.error_backoff);
                    continue;
                }
            }

            self.pause(self.poll_interval);
        }

        log::info!("Weighbridge stream reader stopped");
    }

    fn pause(&self, duration: Duration) {
        let deadline = Instant::now() + duration;
        while self.running.load(Ordering::Acquire) {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            std::thread::sleep((deadline - now).min(STOP_CHECK_STEP));
        }
    }
}

/// Read one line's worth of input.
///
/// Once bytes have arrived, keeps reading until the chunk ends in `\n` or
/// `\r`, so a frame still on the wire is not split across chunks. Gives up
/// waiting after `line_timeout` (or at `max_bytes`) and returns whatever
/// arrived.
pub fn read_available(
    device: &mut dyn SerialDevice,
    max_bytes: usize,
    line_timeout: Duration,
) -> Result<Option<Vec<u8>>, SerialError> {
    let mut pending = device.bytes_to_read()? as usize;
    if pending == 0 {
        return Ok(None);
    }

    let deadline = Instant::now() + line_timeout;
    let mut bytes = Vec::new();

    while bytes.len() < max_bytes {
        if pending > 0 {
            let start = bytes.len();
            let want = pending.min(max_bytes - start);
            bytes.resize(start + want, 0);
            let n = match device.read(&mut bytes[start..]) {
                Ok(n) => n,
                Err(SerialError::Timeout) => 0,
                Err(e) => return Err(e),
            };
            bytes.truncate(start + n);

            if ends_line(&bytes) {
                break;
            }
            if n > 0 {
                pending = device.bytes_to_read()? as usize;
                continue;
            }
        }

        // Mid-line with nothing buffered: wait for the rest of the frame
        if bytes.is_empty() || Instant::now() >= deadline {
            break;
        }
        std::thread::sleep(LINE_WAIT_STEP);
        pending = device.bytes_to_read()? as usize;
    }

    if !bytes.is_empty() && !ends_line(&bytes) {
        log::debug!(
            "No line terminator after {} bytes, passing partial chunk on",
            bytes.len()
        );
    }

    Ok(if bytes.is_empty() { None } else { Some(bytes) })
}

fn ends_line(bytes: &[u8]) -> bool {
    bytes.ends_with(b"\n") || bytes.ends_with(b"\r")
}

/// Decode → stabilize → broadcast
pub struct DecodePipeline {
    decoder: FrameDecoder,
    stabilizer: Stabilizer,
    broadcaster: Arc<Broadcaster>,
    cells: Arc<WeightCells>,
    tick: Duration,
}

impl DecodePipeline {
    pub fn new(
        settings: &PipelineSettings,
        broadcaster: Arc<Broadcaster>,
        cells: Arc<WeightCells>,
    ) -> Self {
        Self {
            decoder: FrameDecoder::with_carry(settings.carry_partial_runs),
            stabilizer: Stabilizer::new(settings.stabilizer()),
            broadcaster,
            cells,
            tick: settings.tick(),
        }
    }

    /// Handle one chunk; every sample is published raw before it is debounced
    pub fn process_chunk(&mut self, chunk: &RawChunk) {
        for sample in self.decoder.decode(chunk) {
            log::debug!("Weighbridge sample {}", sample.value);
            self.cells.set_latest(sample);
            self.broadcaster.publish(sample.value, ReadingKind::Raw);

            self.stabilizer.push(sample);
            self.evaluate(sample.decoded_at);
        }
    }

    pub fn on_tick(&mut self) {
        if self.stabilizer.pending_samples() > 0 {
            self.evaluate(Instant::now());
        }
    }

    fn evaluate(&mut self, now: Instant) {
        if let Some(reading) = self.stabilizer.evaluate(now) {
            log::info!("Stable weight: {}", reading.display());
            let value = reading.value;
            self.cells.set_stable(reading);
            self.broadcaster.publish(value, ReadingKind::Stable);
        }
    }

    pub async fn run(
        mut self,
        mut chunk_rx: mpsc::UnboundedReceiver<RawChunk>,
        running: Arc<AtomicBool>,
    ) {
        log::info!("Weight decode loop started");
        let mut tick = tokio::time::interval(self.tick);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                maybe_chunk = chunk_rx.recv() => match maybe_chunk {
                    Some(chunk) => self.process_chunk(&chunk),
                    None => break,
                },
                _ = tick.tick() => {
                    if !running.load(Ordering::Acquire) {
                        break;
                    }
                    self.on_tick();
                }
            }
        }

        log::info!("Weight decode loop stopped");
    }
}

//! ALFA BioCrypt - Biometric Sensor
//!
//! Platform boundary for the fingerprint sensor plus a scriptable simulation.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

use super::SensorCallback;
use crate::cipher_session::CryptoObject;
use crate::error::{CryptoError, CryptoResult};

/// Message the hardware reports when a scan is cancelled through its signal
pub const HW_CANCELED_MESSAGE: &str = "Fingerprint operation canceled.";

type CancelListener = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct CancellationInner {
    cancelled: AtomicBool,
    listener: Mutex<Option<CancelListener>>,
}

/// Cancellation token handed to the sensor with each scan
#[derive(Clone, Default)]
pub struct CancellationSignal {
    inner: Arc<CancellationInner>,
}

impl CancellationSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel; the registered listener runs at most once
    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        let listener = self.inner.listener.lock().take();
        if let Some(listener) = listener {
            listener();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Register the sensor-side cancel hook; runs immediately if already cancelled
    pub fn set_on_cancel_listener(&self, listener: impl FnOnce() + Send + 'static) {
        if self.is_cancelled() {
            listener();
            return;
        }
        *self.inner.listener.lock() = Some(Box::new(listener));
    }
}

impl fmt::Debug for CancellationSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationSignal")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Biometric sensor service (platform)
pub trait BiometricSensor: Send + Sync {
    fn is_hardware_detected(&self) -> bool;

    fn has_enrolled_biometrics(&self) -> bool;

    /// Arm the sensor for one authentication bound to `crypto`
    ///
    /// Outcomes arrive through `callback`, possibly before this returns.
    /// After `cancel` is signalled the sensor reports a hardware cancel error.
    fn authenticate(
        &self,
        crypto: CryptoObject,
        cancel: CancellationSignal,
        callback: SensorCallback,
    ) -> CryptoResult<()>;
}

/// One reading produced by the simulated sensor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimulatedReading {
    Match,
    NoMatch,
    /// Transient condition, e.g. a dirty sensor
    Help(String),
    /// Hardware fault or lockout
    Error(String),
}

impl SimulatedReading {
    fn is_terminal(&self) -> bool {
        matches!(self, SimulatedReading::Match | SimulatedReading::Error(_))
    }

    fn apply(&self, callback: &SensorCallback) {
        match self {
            SimulatedReading::Match => callback.on_authentication_succeeded(),
            SimulatedReading::NoMatch => callback.on_authentication_failed(),
            SimulatedReading::Help(message) => callback.on_authentication_help(message),
            SimulatedReading::Error(message) => callback.on_authentication_error(message),
        }
    }
}

struct PendingScan {
    callback: SensorCallback,
    cancel: CancellationSignal,
}

/// Deterministic sensor for tests and the demo CLI
///
/// Queued readings are delivered synchronously when a scan is armed. Once the
/// queue runs dry without a terminal reading the scan stays pending until
/// [`SimulatedSensor::deliver`] is called.
pub struct SimulatedSensor {
    hardware: AtomicBool,
    enrolled: AtomicBool,
    always_match: bool,
    queued: Mutex<VecDeque<SimulatedReading>>,
    pending: Mutex<Option<PendingScan>>,
    scans_started: AtomicUsize,
}

impl SimulatedSensor {
    /// Scans wait for [`SimulatedSensor::deliver`]
    pub fn manual() -> Self {
        Self::build(false, Vec::new())
    }

    /// Every scan matches immediately
    pub fn always_match() -> Self {
        Self::build(true, Vec::new())
    }

    /// Scans consume `readings` in order
    pub fn scripted(readings: impl IntoIterator<Item = SimulatedReading>) -> Self {
        Self::build(false, readings.into_iter().collect())
    }

    fn build(always_match: bool, queued: Vec<SimulatedReading>) -> Self {
        Self {
            hardware: AtomicBool::new(true),
            enrolled: AtomicBool::new(true),
            always_match,
            queued: Mutex::new(queued.into()),
            pending: Mutex::new(None),
            scans_started: AtomicUsize::new(0),
        }
    }

    pub fn set_hardware_detected(&self, detected: bool) {
        self.hardware.store(detected, Ordering::SeqCst);
    }

    pub fn set_enrolled(&self, enrolled: bool) {
        self.enrolled.store(enrolled, Ordering::SeqCst);
    }

    /// Queue readings for the current or next scan
    pub fn enqueue(&self, reading: SimulatedReading) {
        self.queued.lock().push_back(reading);
    }

    /// Number of scans armed so far
    pub fn scans_started(&self) -> usize {
        self.scans_started.load(Ordering::SeqCst)
    }

    /// Whether a scan is armed and waiting for a reading
    pub fn has_pending_scan(&self) -> bool {
        self.pending
            .lock()
            .as_ref()
            .map_or(false, |scan| !scan.cancel.is_cancelled())
    }

    /// Deliver a reading to the pending scan; `false` if none is armed
    pub fn deliver(&self, reading: SimulatedReading) -> bool {
        let callback = {
            let mut pending = self.pending.lock();
            match pending.as_ref() {
                Some(scan) if !scan.cancel.is_cancelled() => {
                    let callback = scan.callback.clone();
                    if reading.is_terminal() {
                        *pending = None;
                    }
                    callback
                }
                _ => {
                    *pending = None;
                    return false;
                }
            }
        };

        reading.apply(&callback);
        true
    }
}

impl BiometricSensor for SimulatedSensor {
    fn is_hardware_detected(&self) -> bool {
        self.hardware.load(Ordering::SeqCst)
    }

    fn has_enrolled_biometrics(&self) -> bool {
        self.enrolled.load(Ordering::SeqCst)
    }

    fn authenticate(
        &self,
        crypto: CryptoObject,
        cancel: CancellationSignal,
        callback: SensorCallback,
    ) -> CryptoResult<()> {
        if !self.is_hardware_detected() {
            return Err(CryptoError::SensorUnavailable("no fingerprint hardware".into()));
        }

        self.scans_started.fetch_add(1, Ordering::SeqCst);
        debug!("Simulated sensor armed for operation {}", crypto.operation_id());

        let on_cancel = callback.clone();
        cancel.set_on_cancel_listener(move || on_cancel.on_authentication_error(HW_CANCELED_MESSAGE));

        if self.always_match {
            callback.on_authentication_succeeded();
            return Ok(());
        }

        loop {
            let next = self.queued.lock().pop_front();
            match next {
                Some(reading) => {
                    reading.apply(&callback);
                    if reading.is_terminal() {
                        return Ok(());
                    }
                }
                None => break,
            }
        }

        *self.pending.lock() = Some(PendingScan { callback, cancel });
        Ok(())
    }
}

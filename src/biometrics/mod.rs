//! ALFA BioCrypt - Biometric Gate
//!
//! Drives the live sensor handshake for one cipher context at a time.
//!
//! ```text
//! idle ──start_scan──▶ scanning ──▶ matched
//!                        │  ▲   ──▶ error      (unrecoverable)
//!             no match / │  │   ──▶ cancelled  (self-cancel)
//!             help       └──┘
//! ```
//!
//! Every scan reports `Started` followed by outcomes on one channel. After a
//! self-cancel the hardware's own cancel error is swallowed, so the listener
//! sees exactly one `Cancelled`.

mod prompt;
mod sensor;

pub use prompt::{PromptConfig, PromptIcon, PromptStatus, ScanPrompt};
pub use sensor::{
    BiometricSensor, CancellationSignal, SimulatedReading, SimulatedSensor, HW_CANCELED_MESSAGE,
};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info, warn};
use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use crate::cipher_session::{CipherContext, OperationAuthorization};
use crate::error::{CryptoError, CryptoResult};

/// Lifecycle state of a scan session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Scanning,
    Matched,
    Error,
    Cancelled,
}

impl ScanState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ScanState::Matched | ScanState::Error | ScanState::Cancelled)
    }
}

/// Outcome of a sensor reading
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    Matched,
    /// Sensor stays armed
    NoMatch,
    /// Transient sensor-side condition; sensor stays armed
    RecoverableError(String),
    /// Hardware fault or lockout; the session is over
    UnrecoverableError(String),
    Cancelled,
}

impl ScanOutcome {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ScanOutcome::Matched | ScanOutcome::UnrecoverableError(_) | ScanOutcome::Cancelled
        )
    }
}

/// Event delivered to a scan listener
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    Started { context_id: Uuid },
    Outcome(ScanOutcome),
}

/// Subscriber for scan events
pub type ScanListener = UnboundedSender<ScanEvent>;

struct ScanShared {
    context_id: Uuid,
    authorization: Arc<OperationAuthorization>,
    listener: ScanListener,
    state: Mutex<ScanState>,
    self_cancelled: AtomicBool,
    cancellation: CancellationSignal,
}

impl ScanShared {
    fn emit(&self, event: ScanEvent) {
        if self.listener.send(event).is_err() {
            debug!("Scan listener for {} went away", self.context_id);
        }
    }

    /// Record `outcome` unless the session already ended
    fn report(&self, outcome: ScanOutcome) {
        {
            let mut state = self.state.lock();
            if state.is_terminal() {
                debug!("Dropping {:?} after {:?} on {}", outcome, *state, self.context_id);
                return;
            }
            *state = match &outcome {
                ScanOutcome::Matched => {
                    self.authorization.grant();
                    ScanState::Matched
                }
                ScanOutcome::NoMatch | ScanOutcome::RecoverableError(_) => ScanState::Scanning,
                ScanOutcome::UnrecoverableError(_) => ScanState::Error,
                ScanOutcome::Cancelled => ScanState::Cancelled,
            };
        }
        self.emit(ScanEvent::Outcome(outcome));
    }

    fn cancel(&self) {
        if self.self_cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        self.report(ScanOutcome::Cancelled);
        self.cancellation.cancel();
    }

    fn state(&self) -> ScanState {
        *self.state.lock()
    }
}

/// Callbacks the sensor invokes for the scan it was armed with
#[derive(Clone)]
pub struct SensorCallback {
    shared: Arc<ScanShared>,
}

impl SensorCallback {
    pub fn on_authentication_succeeded(&self) {
        self.shared.report(ScanOutcome::Matched);
    }

    /// Valid reading that did not match; the sensor stays armed
    pub fn on_authentication_failed(&self) {
        self.shared.report(ScanOutcome::NoMatch);
    }

    pub fn on_authentication_help(&self, message: &str) {
        self.shared.report(ScanOutcome::RecoverableError(message.to_string()));
    }

    pub fn on_authentication_error(&self, message: &str) {
        if self.shared.self_cancelled.load(Ordering::SeqCst) {
            debug!("Suppressed sensor error after self-cancel: {}", message);
            return;
        }
        self.shared.report(ScanOutcome::UnrecoverableError(message.to_string()));
    }
}

/// Handle to one running scan
#[derive(Clone)]
pub struct ScanSession {
    shared: Arc<ScanShared>,
}

impl ScanSession {
    pub fn context_id(&self) -> Uuid {
        self.shared.context_id
    }

    pub fn state(&self) -> ScanState {
        self.shared.state()
    }

    /// Self-cancel this scan; idempotent
    pub fn cancel(&self) {
        self.shared.cancel();
    }
}

/// Biometric Gate
pub struct BiometricGate {
    sensor: Arc<dyn BiometricSensor>,
    active: Mutex<Option<Arc<ScanShared>>>,
}

impl BiometricGate {
    pub fn new(sensor: Arc<dyn BiometricSensor>) -> Self {
        Self {
            sensor,
            active: Mutex::new(None),
        }
    }

    pub fn sensor(&self) -> &Arc<dyn BiometricSensor> {
        &self.sensor
    }

    /// State of the most recent scan
    pub fn state(&self) -> ScanState {
        self.active
            .lock()
            .as_ref()
            .map_or(ScanState::Idle, |scan| scan.state())
    }

    /// Begin a cancellable scan bound to `context`
    ///
    /// A scan still pending on another context is self-cancelled first.
    pub fn start_scan(
        &self,
        context: &CipherContext,
        listener: ScanListener,
    ) -> CryptoResult<ScanSession> {
        let crypto = context.crypto_object();

        let (shared, previous) = {
            let mut active = self.active.lock();
            if let Some(current) = active.as_ref() {
                if !current.state().is_terminal() && current.context_id == context.id() {
                    return Err(CryptoError::ScanAlreadyActive(context.id().to_string()));
                }
            }

            let shared = Arc::new(ScanShared {
                context_id: context.id(),
                authorization: Arc::clone(&crypto.authorization),
                listener,
                state: Mutex::new(ScanState::Scanning),
                self_cancelled: AtomicBool::new(false),
                cancellation: CancellationSignal::new(),
            });
            let previous = active.replace(Arc::clone(&shared));
            (shared, previous)
        };

        if let Some(previous) = previous {
            if !previous.state().is_terminal() {
                info!("Cancelling scan on {} for {}", previous.context_id, context.id());
                previous.cancel();
            }
        }

        shared.emit(ScanEvent::Started {
            context_id: context.id(),
        });

        let callback = SensorCallback {
            shared: Arc::clone(&shared),
        };
        if let Err(e) = self
            .sensor
            .authenticate(crypto, shared.cancellation.clone(), callback)
        {
            warn!("Sensor refused scan for {}: {}", context.id(), e);
            shared.report(ScanOutcome::UnrecoverableError(e.to_string()));
        }

        Ok(ScanSession { shared })
    }

    /// Self-cancel the active scan; no-op when idle
    pub fn cancel(&self) {
        let active = self.active.lock().clone();
        if let Some(scan) = active {
            scan.cancel();
        }
    }
}

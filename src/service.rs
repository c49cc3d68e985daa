//! ALFA BioCrypt - Biometric Crypto Service
//!
//! Encrypt / decrypt orchestration. Every call resolves to exactly one
//! [`CryptoOutcome`]; the biometric scan is the only suspend point.

use std::fmt;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use log::{debug, error, info, warn};
use secrecy::SecretVec;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio::time::{timeout_at, Instant};

use crate::biometrics::{
    BiometricGate, BiometricSensor, ScanEvent, ScanListener, ScanOutcome, ScanSession,
};
use crate::cipher_session::{CipherContext, CipherMode, CipherSession, Prepared};
use crate::config::CryptoConfig;
use crate::credentials::CredentialStore;
use crate::crypto::KeyAlias;
use crate::error::{CryptoError, CryptoResult};
use crate::key_vault::KeyVault;
use crate::keystore::SecureKeyStore;

/// Caller-visible result of an encrypt or decrypt
pub enum CryptoOutcome {
    /// Base64 of the stored ciphertext
    Encrypted(String),
    Decrypted(SecretVec<u8>),
    Failure(String),
    /// Key invalidated by an enrollment or lock-screen change; re-enroll and encrypt again
    KeystoreInvalidated,
    AuthenticationFailed(String),
    NoSuchCredential,
}

impl fmt::Debug for CryptoOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CryptoOutcome::Encrypted(display) => f.debug_tuple("Encrypted").field(display).finish(),
            CryptoOutcome::Decrypted(_) => f.write_str("Decrypted([REDACTED])"),
            CryptoOutcome::Failure(message) => f.debug_tuple("Failure").field(message).finish(),
            CryptoOutcome::KeystoreInvalidated => f.write_str("KeystoreInvalidated"),
            CryptoOutcome::AuthenticationFailed(message) => {
                f.debug_tuple("AuthenticationFailed").field(message).finish()
            }
            CryptoOutcome::NoSuchCredential => f.write_str("NoSuchCredential"),
        }
    }
}

/// Whether the device can run biometric-gated operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Ready,
    NoHardware,
    NoSecureLockScreen,
    NoEnrolledBiometrics,
}

/// Biometric crypto service
pub struct BiometricCrypto {
    vault: Arc<KeyVault>,
    sessions: CipherSession,
    gate: Arc<BiometricGate>,
    credentials: Arc<dyn CredentialStore>,
    config: CryptoConfig,
}

impl BiometricCrypto {
    pub fn new(
        store: Arc<dyn SecureKeyStore>,
        sensor: Arc<dyn BiometricSensor>,
        credentials: Arc<dyn CredentialStore>,
        config: CryptoConfig,
    ) -> Self {
        let vault = Arc::new(KeyVault::new(store));
        Self {
            sessions: CipherSession::new(Arc::clone(&vault)),
            vault,
            gate: Arc::new(BiometricGate::new(sensor)),
            credentials,
            config,
        }
    }

    pub fn vault(&self) -> &KeyVault {
        &self.vault
    }

    pub fn gate(&self) -> &Arc<BiometricGate> {
        &self.gate
    }

    pub fn config(&self) -> &CryptoConfig {
        &self.config
    }

    pub fn availability(&self) -> Availability {
        let sensor = self.gate.sensor();
        if !sensor.is_hardware_detected() {
            Availability::NoHardware
        } else if !self.vault.is_lock_screen_secure() {
            Availability::NoSecureLockScreen
        } else if !sensor.has_enrolled_biometrics() {
            Availability::NoEnrolledBiometrics
        } else {
            Availability::Ready
        }
    }

    pub fn aliases(&self) -> CryptoResult<Vec<KeyAlias>> {
        self.vault.aliases()
    }

    /// Remove the key and stored record for `alias`; `true` if anything existed
    pub fn delete(&self, alias: &KeyAlias) -> CryptoResult<bool> {
        let key = self.vault.delete_key(alias);
        let record = self.credentials.remove_record(alias)?;
        if key || record {
            info!("Deleted credential for {}", alias);
        }
        Ok(key || record)
    }

    /// Self-cancel any running scan
    pub fn cancel(&self) {
        self.gate.cancel();
    }

    pub async fn encrypt(&self, alias: &KeyAlias, plaintext: &[u8]) -> CryptoOutcome {
        self.encrypt_observed(alias, plaintext, None).await
    }

    /// Encrypt, forwarding every scan event to `observer`
    pub async fn encrypt_observed(
        &self,
        alias: &KeyAlias,
        plaintext: &[u8],
        observer: Option<ScanListener>,
    ) -> CryptoOutcome {
        if self.config.regenerate_key_on_encrypt || !self.vault.has_key(alias) {
            if let Err(e) = self.vault.create_key(alias) {
                return failure(alias, "Key generation", e);
            }
        }

        // The previous ciphertext must never be paired with the new IV
        if let Err(e) = self.credentials.remove_record(alias) {
            return failure(alias, "Removing stale record", e);
        }

        let context = match self.prepare(alias, CipherMode::Encrypt, None) {
            Ok(context) => context,
            Err(outcome) => return outcome,
        };

        if let Err(e) = self.credentials.put_iv(alias, context.iv()) {
            return failure(alias, "Storing IV", e);
        }

        if let Err(outcome) = self.authenticate(&context, observer).await {
            return outcome;
        }

        let iv = context.iv().to_vec();
        let ciphertext = match self.sessions.finish(context, plaintext) {
            Ok(ciphertext) => ciphertext,
            Err(e) => return failure(alias, "Encryption", e),
        };

        if let Err(e) = self.credentials.put_record(alias, &iv, &ciphertext) {
            return failure(alias, "Storing ciphertext", e);
        }

        info!("Encrypted credential for {}", alias);
        CryptoOutcome::Encrypted(STANDARD.encode(&ciphertext))
    }

    pub async fn decrypt(&self, alias: &KeyAlias) -> CryptoOutcome {
        self.decrypt_observed(alias, None).await
    }

    /// Decrypt, forwarding every scan event to `observer`
    pub async fn decrypt_observed(
        &self,
        alias: &KeyAlias,
        observer: Option<ScanListener>,
    ) -> CryptoOutcome {
        let record = match self.credentials.get_record(alias) {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!("No stored credential for {}", alias);
                return CryptoOutcome::NoSuchCredential;
            }
            Err(e) => return failure(alias, "Reading credential", e),
        };

        if !self.vault.has_key(alias) {
            warn!("Stored credential for {} has no key", alias);
            return CryptoOutcome::NoSuchCredential;
        }

        let iv = Some(record.iv.as_slice());
        let context = match self.prepare(alias, CipherMode::Decrypt, iv) {
            Ok(context) => context,
            Err(outcome) => return outcome,
        };

        if let Err(outcome) = self.authenticate(&context, observer).await {
            return outcome;
        }

        match self.sessions.finish(context, &record.ciphertext) {
            Ok(plaintext) => {
                info!("Decrypted credential for {}", alias);
                CryptoOutcome::Decrypted(SecretVec::new(plaintext))
            }
            Err(e) => failure(alias, "Decryption", e),
        }
    }

    fn prepare(
        &self,
        alias: &KeyAlias,
        mode: CipherMode,
        iv: Option<&[u8]>,
    ) -> Result<CipherContext, CryptoOutcome> {
        match self.sessions.prepare(alias, mode, iv) {
            Ok(Prepared::Ready(context)) => Ok(context),
            Ok(Prepared::Invalidated(signal)) => {
                warn!("Keystore invalidated for {}: {}", signal.alias, signal.reason);
                Err(CryptoOutcome::KeystoreInvalidated)
            }
            Err(e) => Err(failure(alias, "Cipher init", e)),
        }
    }

    /// Run one scan on `context` until it matches or ends
    async fn authenticate(
        &self,
        context: &CipherContext,
        observer: Option<ScanListener>,
    ) -> Result<(), CryptoOutcome> {
        let (tx, mut rx) = unbounded_channel();
        let scan = match self.gate.start_scan(context, tx) {
            Ok(session) => ScanGuard(session),
            Err(e) => return Err(failure(context.alias(), "Starting scan", e)),
        };

        let deadline = self.config.scan_timeout().map(|t| Instant::now() + t);
        let forward = |event: &ScanEvent| {
            if let Some(observer) = observer.as_ref() {
                let _ = observer.send(event.clone());
            }
        };

        loop {
            let event = match deadline {
                Some(deadline) => match timeout_at(deadline, rx.recv()).await {
                    Ok(event) => event,
                    Err(_) => {
                        warn!("Scan for {} timed out", context.alias());
                        scan.0.cancel();
                        drain(&mut rx, &forward);
                        return Err(CryptoOutcome::AuthenticationFailed("scan timed out".into()));
                    }
                },
                None => rx.recv().await,
            };

            let Some(event) = event else {
                return Err(CryptoOutcome::AuthenticationFailed(
                    "scan ended without an outcome".into(),
                ));
            };
            forward(&event);

            match event {
                ScanEvent::Started { .. } => {}
                ScanEvent::Outcome(ScanOutcome::Matched) => return Ok(()),
                ScanEvent::Outcome(ScanOutcome::NoMatch) => {
                    debug!("No match for {}, sensor still armed", context.alias());
                }
                ScanEvent::Outcome(ScanOutcome::RecoverableError(message)) => {
                    debug!("Recoverable sensor condition: {}", message);
                }
                ScanEvent::Outcome(ScanOutcome::UnrecoverableError(message)) => {
                    warn!("Scan for {} failed: {}", context.alias(), message);
                    return Err(CryptoOutcome::AuthenticationFailed(message));
                }
                ScanEvent::Outcome(ScanOutcome::Cancelled) => {
                    return Err(CryptoOutcome::AuthenticationFailed("scan cancelled".into()));
                }
            }
        }
    }
}

/// Log a failed step (security-critical faults at error level) and wrap it
fn failure(alias: &KeyAlias, step: &str, e: CryptoError) -> CryptoOutcome {
    if e.is_security_critical() {
        error!("{} for {} failed: {}", step, alias, e);
    } else {
        warn!("{} for {} failed: {}", step, alias, e);
    }
    CryptoOutcome::Failure(e.to_string())
}

/// Self-cancels a scan still running when its operation is dropped
struct ScanGuard(ScanSession);

impl Drop for ScanGuard {
    fn drop(&mut self) {
        if !self.0.state().is_terminal() {
            debug!("Operation dropped, cancelling scan on {}", self.0.context_id());
            self.0.cancel();
        }
    }
}

fn drain(rx: &mut UnboundedReceiver<ScanEvent>, forward: &impl Fn(&ScanEvent)) {
    while let Ok(event) = rx.try_recv() {
        forward(&event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::biometrics::{ScanState, SimulatedReading, SimulatedSensor};
    use crate::credentials::MemoryCredentialStore;
    use crate::keystore::{DeviceSecurityState, SoftwareKeyStore};
    use secrecy::ExposeSecret;
    use std::time::Duration;

    struct Fixture {
        store: Arc<SoftwareKeyStore>,
        sensor: Arc<SimulatedSensor>,
        credentials: Arc<MemoryCredentialStore>,
        service: BiometricCrypto,
    }

    fn fixture_with(sensor: SimulatedSensor, config: CryptoConfig) -> Fixture {
        let store = Arc::new(SoftwareKeyStore::in_memory(DeviceSecurityState::ready()));
        let sensor = Arc::new(sensor);
        let credentials = Arc::new(MemoryCredentialStore::new());
        let service = BiometricCrypto::new(
            store.clone(),
            sensor.clone(),
            credentials.clone(),
            config,
        );
        Fixture {
            store,
            sensor,
            credentials,
            service,
        }
    }

    fn fixture(sensor: SimulatedSensor) -> Fixture {
        fixture_with(sensor, CryptoConfig::default())
    }

    fn alice() -> KeyAlias {
        KeyAlias::new("alice")
    }

    async fn wait_for_scan(sensor: &SimulatedSensor) {
        while !sensor.has_pending_scan() {
            tokio::task::yield_now().await;
        }
    }

    fn plaintext(outcome: CryptoOutcome) -> Vec<u8> {
        match outcome {
            CryptoOutcome::Decrypted(secret) => secret.expose_secret().clone(),
            other => panic!("expected Decrypted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_encrypt_decrypt_roundtrip() {
        let fx = fixture(SimulatedSensor::always_match());

        let display = match fx.service.encrypt(&alice(), b"s3cret").await {
            CryptoOutcome::Encrypted(display) => display,
            other => panic!("expected Encrypted, got {:?}", other),
        };

        let record = fx.credentials.get_record(&alice()).unwrap().unwrap();
        assert_eq!(record.iv.len(), 16);
        assert_eq!(STANDARD.decode(display).unwrap(), record.ciphertext);

        assert_eq!(plaintext(fx.service.decrypt(&alice()).await), b"s3cret");
    }

    #[tokio::test]
    async fn test_roundtrip_arbitrary_bytes() {
        let fx = fixture(SimulatedSensor::always_match());
        let samples: [&[u8]; 3] = [b"", &[0u8; 16], "pässwörd ✓".as_bytes()];

        for sample in samples {
            assert!(matches!(
                fx.service.encrypt(&alice(), sample).await,
                CryptoOutcome::Encrypted(_)
            ));
            assert_eq!(plaintext(fx.service.decrypt(&alice()).await), sample);
        }
    }

    #[tokio::test]
    async fn test_reencrypt_replaces_key() {
        let fx = fixture(SimulatedSensor::always_match());

        fx.service.encrypt(&alice(), b"first").await;
        let old = fx.credentials.get_record(&alice()).unwrap().unwrap();
        fx.service.encrypt(&alice(), b"second").await;

        assert_eq!(fx.service.aliases().unwrap(), vec![alice()]);
        assert_eq!(plaintext(fx.service.decrypt(&alice()).await), b"second");

        // Record written under the replaced key no longer decrypts
        fx.credentials
            .put_record(&alice(), &old.iv, &old.ciphertext)
            .unwrap();
        assert!(!matches!(
            fx.service.decrypt(&alice()).await,
            CryptoOutcome::Decrypted(ref p) if p.expose_secret().as_slice() == b"first"
        ));
    }

    #[tokio::test]
    async fn test_decrypt_without_encrypt() {
        let fx = fixture(SimulatedSensor::always_match());
        fx.store.set_available(false);

        assert!(matches!(
            fx.service.decrypt(&alice()).await,
            CryptoOutcome::NoSuchCredential
        ));
        assert_eq!(fx.sensor.scans_started(), 0);
    }

    #[tokio::test]
    async fn test_invalidation_skips_scan() {
        let fx = fixture(SimulatedSensor::always_match());
        fx.service.encrypt(&alice(), b"s3cret").await;
        assert_eq!(fx.sensor.scans_started(), 1);

        fx.store.enroll_biometric().unwrap();

        assert!(matches!(
            fx.service.decrypt(&alice()).await,
            CryptoOutcome::KeystoreInvalidated
        ));
        assert_eq!(fx.sensor.scans_started(), 1);
    }

    #[tokio::test]
    async fn test_invalidation_without_regeneration() {
        let config = CryptoConfig {
            regenerate_key_on_encrypt: false,
            ..Default::default()
        };
        let fx = fixture_with(SimulatedSensor::always_match(), config);
        fx.service.encrypt(&alice(), b"s3cret").await;

        fx.store.set_lock_screen_secure(false).unwrap();
        fx.store.set_lock_screen_secure(true).unwrap();

        assert!(matches!(
            fx.service.encrypt(&alice(), b"s3cret").await,
            CryptoOutcome::KeystoreInvalidated
        ));
        assert_eq!(fx.sensor.scans_started(), 1);
    }

    #[tokio::test]
    async fn test_reuse_key_when_regeneration_disabled() {
        let config = CryptoConfig {
            regenerate_key_on_encrypt: false,
            ..Default::default()
        };
        let fx = fixture_with(SimulatedSensor::always_match(), config);

        fx.service.encrypt(&alice(), b"first").await;
        let old = fx.credentials.get_record(&alice()).unwrap().unwrap();
        fx.service.encrypt(&alice(), b"second").await;

        fx.credentials
            .put_record(&alice(), &old.iv, &old.ciphertext)
            .unwrap();
        assert_eq!(plaintext(fx.service.decrypt(&alice()).await), b"first");
    }

    #[tokio::test]
    async fn test_interrupted_reencrypt_without_regeneration() {
        let config = CryptoConfig {
            regenerate_key_on_encrypt: false,
            ..Default::default()
        };
        let fx = fixture_with(SimulatedSensor::scripted([SimulatedReading::Match]), config);
        let alias = alice();
        let secret = b"thirty-six bytes spanning two blocks";

        assert!(matches!(
            fx.service.encrypt(&alias, secret).await,
            CryptoOutcome::Encrypted(_)
        ));

        fx.sensor.enqueue(SimulatedReading::Error("Too many attempts".into()));
        match fx.service.encrypt(&alias, b"replacement").await {
            CryptoOutcome::AuthenticationFailed(message) => assert_eq!(message, "Too many attempts"),
            other => panic!("expected AuthenticationFailed, got {:?}", other),
        }

        // Old ciphertext is gone rather than paired with the new IV
        assert!(fx.service.vault().has_key(&alias));
        assert!(fx.credentials.get_record(&alias).unwrap().is_none());
        fx.sensor.enqueue(SimulatedReading::Match);
        assert!(matches!(
            fx.service.decrypt(&alias).await,
            CryptoOutcome::NoSuchCredential
        ));
        assert_eq!(fx.sensor.scans_started(), 2);

        fx.sensor.enqueue(SimulatedReading::Match);
        assert!(matches!(
            fx.service.encrypt(&alias, secret).await,
            CryptoOutcome::Encrypted(_)
        ));
        assert_eq!(plaintext(fx.service.decrypt(&alias).await), secret);
    }

    #[tokio::test]
    async fn test_no_match_then_match() {
        let fx = fixture(SimulatedSensor::manual());
        let alias = alice();
        let (tx, mut rx) = unbounded_channel();

        let driver = async {
            wait_for_scan(&fx.sensor).await;
            assert!(fx.sensor.deliver(SimulatedReading::NoMatch));
            assert!(fx.sensor.deliver(SimulatedReading::Help("Sensor dirty".into())));
            assert!(fx.sensor.deliver(SimulatedReading::Match));
        };
        let (outcome, _) = tokio::join!(fx.service.encrypt_observed(&alias, b"s3cret", Some(tx)), driver);
        assert!(matches!(outcome, CryptoOutcome::Encrypted(_)));

        let mut outcomes = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let ScanEvent::Outcome(outcome) = event {
                outcomes.push(outcome);
            }
        }
        assert_eq!(
            outcomes,
            vec![
                ScanOutcome::NoMatch,
                ScanOutcome::RecoverableError("Sensor dirty".into()),
                ScanOutcome::Matched,
            ]
        );

        fx.sensor.enqueue(SimulatedReading::Match);
        assert_eq!(plaintext(fx.service.decrypt(&alice()).await), b"s3cret");
    }

    #[tokio::test]
    async fn test_observer_sees_every_event() {
        let fx = fixture(SimulatedSensor::scripted([
            SimulatedReading::NoMatch,
            SimulatedReading::Match,
        ]));
        let (tx, mut rx) = unbounded_channel();

        let outcome = fx.service.encrypt_observed(&alice(), b"s3cret", Some(tx)).await;
        assert!(matches!(outcome, CryptoOutcome::Encrypted(_)));

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], ScanEvent::Started { .. }));
        assert_eq!(events[1], ScanEvent::Outcome(ScanOutcome::NoMatch));
        assert_eq!(events[2], ScanEvent::Outcome(ScanOutcome::Matched));
    }

    #[tokio::test]
    async fn test_cancel_reports_authentication_failed() {
        let fx = fixture(SimulatedSensor::manual());
        let alias = alice();
        let (tx, mut rx) = unbounded_channel();

        let driver = async {
            wait_for_scan(&fx.sensor).await;
            fx.service.cancel();
            fx.service.cancel();
        };
        let (outcome, _) = tokio::join!(fx.service.encrypt_observed(&alias, b"s3cret", Some(tx)), driver);
        assert!(matches!(outcome, CryptoOutcome::AuthenticationFailed(_)));

        let mut outcomes = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let ScanEvent::Outcome(outcome) = event {
                outcomes.push(outcome);
            }
        }
        assert_eq!(outcomes, vec![ScanOutcome::Cancelled]);

        // IV was stored before the scan, ciphertext never was
        assert!(fx.credentials.get_record(&alice()).unwrap().is_none());
        assert!(matches!(
            fx.service.decrypt(&alice()).await,
            CryptoOutcome::NoSuchCredential
        ));
    }

    #[tokio::test]
    async fn test_unrecoverable_error_fails_operation() {
        let fx = fixture(SimulatedSensor::scripted([SimulatedReading::Error(
            "Too many attempts. Try again later.".into(),
        )]));

        match fx.service.encrypt(&alice(), b"s3cret").await {
            CryptoOutcome::AuthenticationFailed(message) => {
                assert_eq!(message, "Too many attempts. Try again later.")
            }
            other => panic!("expected AuthenticationFailed, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_timeout() {
        let config = CryptoConfig {
            scan_timeout_secs: Some(5),
            ..Default::default()
        };
        let fx = fixture_with(SimulatedSensor::manual(), config);

        let outcome = fx.service.encrypt(&alice(), b"s3cret").await;
        assert!(matches!(outcome, CryptoOutcome::AuthenticationFailed(_)));
        assert!(!fx.sensor.has_pending_scan());
        assert_eq!(fx.service.gate().state(), ScanState::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_operation_cancels_scan() {
        let fx = fixture(SimulatedSensor::manual());
        let alias = alice();

        let abandoned = tokio::time::timeout(
            Duration::from_secs(1),
            fx.service.encrypt(&alias, b"s3cret"),
        )
        .await;
        assert!(abandoned.is_err());

        assert!(!fx.sensor.has_pending_scan());
        assert_eq!(fx.service.gate().state(), ScanState::Cancelled);
        assert!(!fx.sensor.deliver(SimulatedReading::Match));
        assert!(fx.credentials.get_record(&alias).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_removed_biometrics() {
        let fx = fixture(SimulatedSensor::always_match());
        fx.service.encrypt(&alice(), b"s3cret").await;

        fx.store.remove_all_biometrics().unwrap();
        fx.sensor.set_enrolled(false);

        assert_eq!(fx.service.availability(), Availability::NoEnrolledBiometrics);
        assert!(matches!(
            fx.service.decrypt(&alice()).await,
            CryptoOutcome::KeystoreInvalidated
        ));
        assert!(matches!(
            fx.service.encrypt(&alice(), b"s3cret").await,
            CryptoOutcome::Failure(_)
        ));
        assert_eq!(fx.sensor.scans_started(), 1);
    }

    #[tokio::test]
    async fn test_key_generation_failure() {
        let fx = fixture(SimulatedSensor::always_match());
        fx.store.set_lock_screen_secure(false).unwrap();

        assert!(matches!(
            fx.service.encrypt(&alice(), b"s3cret").await,
            CryptoOutcome::Failure(_)
        ));
        assert_eq!(fx.service.availability(), Availability::NoSecureLockScreen);
    }

    #[tokio::test]
    async fn test_delete() {
        let fx = fixture(SimulatedSensor::always_match());
        fx.service.encrypt(&alice(), b"s3cret").await;

        assert!(fx.service.delete(&alice()).unwrap());
        assert!(!fx.service.delete(&alice()).unwrap());
        assert!(fx.service.aliases().unwrap().is_empty());
        assert!(matches!(
            fx.service.decrypt(&alice()).await,
            CryptoOutcome::NoSuchCredential
        ));
    }

    #[test]
    fn test_availability() {
        let fx = fixture(SimulatedSensor::manual());
        assert_eq!(fx.service.availability(), Availability::Ready);

        fx.sensor.set_enrolled(false);
        assert_eq!(fx.service.availability(), Availability::NoEnrolledBiometrics);

        fx.sensor.set_hardware_detected(false);
        assert_eq!(fx.service.availability(), Availability::NoHardware);
    }
}

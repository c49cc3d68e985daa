//! ALFA BioCrypt - Secure Key Store
//!
//! Platform boundary for hardware-backed, authentication-bound AES keys.
//! Implementations raise [`CryptoError::KeyPermanentlyInvalidated`] instead of
//! a generic fault when enrollment or lock-screen state has changed since a key
//! was generated.
//!
//! [`CryptoError::KeyPermanentlyInvalidated`]: crate::error::CryptoError::KeyPermanentlyInvalidated

mod software;

pub use software::{DeviceSecurityState, SoftwareKeyStore};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crypto::{KeyAlias, KeyMaterial, KeySpec};
use crate::error::CryptoResult;

/// A symmetric key living inside the secure key store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedKey {
    /// Identity of this generation of the key
    pub key_id: Uuid,
    pub alias: KeyAlias,
    pub spec: KeySpec,
    pub created_at: DateTime<Utc>,
    /// Biometric enrollment epoch at generation time
    pub enrollment_epoch: u64,
    /// Lock-screen epoch at generation time
    pub lock_screen_epoch: u64,
}

/// A usable key handed out by the store for one cipher operation
#[derive(Debug)]
pub struct StoredKey {
    info: ManagedKey,
    material: KeyMaterial,
}

impl StoredKey {
    pub fn new(info: ManagedKey, material: KeyMaterial) -> Self {
        Self { info, material }
    }

    pub fn info(&self) -> &ManagedKey {
        &self.info
    }

    pub(crate) fn material(&self) -> &KeyMaterial {
        &self.material
    }
}

/// Secure key store (platform service)
pub trait SecureKeyStore: Send + Sync {
    /// Generate a key under `alias`, replacing any existing entry
    fn generate_key(&self, alias: &KeyAlias, spec: &KeySpec) -> CryptoResult<ManagedKey>;

    /// True if a secret key entry exists under `alias`
    fn is_key_entry(&self, alias: &KeyAlias) -> CryptoResult<bool>;

    /// Remove the entry, `false` if it was absent
    fn delete_entry(&self, alias: &KeyAlias) -> CryptoResult<bool>;

    /// All key-entry aliases
    fn aliases(&self) -> CryptoResult<Vec<KeyAlias>>;

    /// Load a key for use, failing with `KeyPermanentlyInvalidated` if it can no longer be used
    fn load_key(&self, alias: &KeyAlias) -> CryptoResult<StoredKey>;

    /// Whether the device currently has a secure lock screen
    fn is_lock_screen_secure(&self) -> bool;
}

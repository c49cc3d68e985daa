//! ALFA BioCrypt - Key Vault
//!
//! Named, authentication-bound keys in the secure key store. Only the store ever
//! sees key material; nothing here touches plaintext secrets.

use std::sync::Arc;

use log::{debug, warn};

use crate::crypto::{KeyAlias, KeySpec};
use crate::error::{CryptoError, CryptoResult};
use crate::keystore::{ManagedKey, SecureKeyStore, StoredKey};

/// Key Vault
pub struct KeyVault {
    store: Arc<dyn SecureKeyStore>,
    spec: KeySpec,
}

impl KeyVault {
    /// Vault issuing AES/CBC/PKCS7 biometric-bound keys
    pub fn new(store: Arc<dyn SecureKeyStore>) -> Self {
        Self::with_spec(store, KeySpec::biometric_bound())
    }

    pub fn with_spec(store: Arc<dyn SecureKeyStore>, spec: KeySpec) -> Self {
        Self { store, spec }
    }

    pub fn spec(&self) -> &KeySpec {
        &self.spec
    }

    /// Generate a key under `alias`, replacing any existing one
    pub fn create_key(&self, alias: &KeyAlias) -> CryptoResult<ManagedKey> {
        let key = self.store.generate_key(alias, &self.spec).map_err(|e| match e {
            CryptoError::KeyGeneration(_) => e,
            other => CryptoError::KeyGeneration(other.to_string()),
        })?;

        debug!("Created key {} for {}", key.key_id, alias);
        Ok(key)
    }

    /// True iff a key entry exists under `alias`
    pub fn has_key(&self, alias: &KeyAlias) -> bool {
        match self.store.is_key_entry(alias) {
            Ok(present) => present,
            Err(e) => {
                warn!("Key lookup for {} failed: {}", alias, e);
                false
            }
        }
    }

    /// Remove the key entry; `false` if the store cannot be opened or the alias was absent
    pub fn delete_key(&self, alias: &KeyAlias) -> bool {
        match self.store.delete_entry(alias) {
            Ok(removed) => removed,
            Err(e) => {
                warn!("Deleting key for {} failed: {}", alias, e);
                false
            }
        }
    }

    /// All key-entry aliases in the store
    pub fn aliases(&self) -> CryptoResult<Vec<KeyAlias>> {
        self.store.aliases()
    }

    /// Whether the device lock screen is secure
    pub fn is_lock_screen_secure(&self) -> bool {
        self.store.is_lock_screen_secure()
    }

    pub(crate) fn load_key(&self, alias: &KeyAlias) -> CryptoResult<StoredKey> {
        self.store.load_key(alias)
    }

    /// Fails unless `key` is still the current, usable generation for its alias
    pub(crate) fn ensure_current(&self, key: &ManagedKey) -> CryptoResult<()> {
        let current = self.store.load_key(&key.alias).map_err(|e| match e {
            CryptoError::KeyPermanentlyInvalidated(reason) => {
                CryptoError::CipherFinalization(format!("key permanently invalidated: {}", reason))
            }
            CryptoError::KeyLookup(alias) => {
                CryptoError::CipherFinalization(format!("key for {} was deleted", alias))
            }
            other => other,
        })?;

        if current.info().key_id != key.key_id {
            return Err(CryptoError::CipherFinalization(format!(
                "key for {} was replaced during the operation",
                key.alias
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keystore::{DeviceSecurityState, SoftwareKeyStore};

    fn vault() -> (Arc<SoftwareKeyStore>, KeyVault) {
        let store = Arc::new(SoftwareKeyStore::in_memory(DeviceSecurityState::ready()));
        let vault = KeyVault::new(store.clone());
        (store, vault)
    }

    #[test]
    fn test_has_key_after_create() {
        let (_, vault) = vault();
        let alias = KeyAlias::new("alice");

        assert!(!vault.has_key(&alias));
        vault.create_key(&alias).unwrap();
        assert!(vault.has_key(&alias));
    }

    #[test]
    fn test_create_twice_leaves_one_key() {
        let (_, vault) = vault();
        let alias = KeyAlias::new("alice");

        let first = vault.create_key(&alias).unwrap();
        let second = vault.create_key(&alias).unwrap();

        assert_ne!(first.key_id, second.key_id);
        assert_eq!(vault.aliases().unwrap(), vec![alias.clone()]);
        assert!(vault.ensure_current(&second).is_ok());
        assert!(matches!(
            vault.ensure_current(&first),
            Err(CryptoError::CipherFinalization(_))
        ));
    }

    #[test]
    fn test_delete_key() {
        let (_, vault) = vault();
        let alias = KeyAlias::new("alice");

        assert!(!vault.delete_key(&alias));
        vault.create_key(&alias).unwrap();
        assert!(vault.delete_key(&alias));
        assert!(!vault.has_key(&alias));
    }

    #[test]
    fn test_unavailable_store_is_non_fatal() {
        let (store, vault) = vault();
        let alias = KeyAlias::new("alice");
        vault.create_key(&alias).unwrap();

        store.set_available(false);
        assert!(!vault.has_key(&alias));
        assert!(!vault.delete_key(&alias));
        assert!(matches!(vault.create_key(&alias), Err(CryptoError::KeyGeneration(_))));
    }

    #[test]
    fn test_generation_error_surfaces() {
        let store = Arc::new(SoftwareKeyStore::in_memory(DeviceSecurityState::default()));
        let vault = KeyVault::new(store);

        assert!(matches!(
            vault.create_key(&KeyAlias::new("alice")),
            Err(CryptoError::KeyGeneration(_))
        ));
    }
}

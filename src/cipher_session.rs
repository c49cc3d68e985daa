//! ALFA BioCrypt - Cipher Session
//!
//! One encrypt-or-decrypt operation: `prepare` binds a cipher to a named key and
//! mode, `finish` runs the transform once the exact context has been
//! authenticated by a biometric match.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, warn};
use uuid::Uuid;

use crate::crypto::{decrypt_cbc, encrypt_cbc, generate_iv, KeyAlias, IV_LEN};
use crate::error::{CryptoError, CryptoResult};
use crate::key_vault::KeyVault;
use crate::keystore::StoredKey;

/// Cipher operation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherMode {
    Encrypt,
    Decrypt,
}

impl fmt::Display for CipherMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CipherMode::Encrypt => f.write_str("encrypt"),
            CipherMode::Decrypt => f.write_str("decrypt"),
        }
    }
}

/// Authorization of a single cipher operation, granted by a biometric match
#[derive(Debug, Default)]
pub(crate) struct OperationAuthorization {
    granted: AtomicBool,
}

impl OperationAuthorization {
    pub(crate) fn grant(&self) {
        self.granted.store(true, Ordering::SeqCst);
    }

    pub(crate) fn is_granted(&self) -> bool {
        self.granted.load(Ordering::SeqCst)
    }
}

/// Opaque handle passed to the biometric sensor; a match authorizes exactly this operation
#[derive(Debug, Clone)]
pub struct CryptoObject {
    operation_id: Uuid,
    pub(crate) authorization: Arc<OperationAuthorization>,
}

impl CryptoObject {
    pub fn operation_id(&self) -> Uuid {
        self.operation_id
    }
}

/// Stateful cipher bound to one key and one mode; single use
pub struct CipherContext {
    id: Uuid,
    mode: CipherMode,
    iv: [u8; IV_LEN],
    key: StoredKey,
    authorization: Arc<OperationAuthorization>,
}

impl CipherContext {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn alias(&self) -> &KeyAlias {
        &self.key.info().alias
    }

    pub fn mode(&self) -> CipherMode {
        self.mode
    }

    /// IV generated for encryption, or loaded for decryption
    pub fn iv(&self) -> &[u8] {
        &self.iv
    }

    /// Whether the transform needs a preceding biometric match
    pub fn requires_authentication(&self) -> bool {
        self.key.info().spec.user_authentication_required
    }

    /// Whether a biometric match has authorized this context
    pub fn is_authenticated(&self) -> bool {
        self.authorization.is_granted()
    }

    /// Handle for the biometric sensor
    pub fn crypto_object(&self) -> CryptoObject {
        CryptoObject {
            operation_id: self.id,
            authorization: Arc::clone(&self.authorization),
        }
    }
}

impl fmt::Debug for CipherContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CipherContext")
            .field("id", &self.id)
            .field("alias", self.alias())
            .field("mode", &self.mode)
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}

/// Key was permanently invalidated by the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidationSignal {
    pub alias: KeyAlias,
    pub reason: String,
}

/// Result of [`CipherSession::prepare`]
#[derive(Debug)]
pub enum Prepared {
    Ready(CipherContext),
    Invalidated(InvalidationSignal),
}

/// Cipher Session
pub struct CipherSession {
    vault: Arc<KeyVault>,
}

impl CipherSession {
    pub fn new(vault: Arc<KeyVault>) -> Self {
        Self { vault }
    }

    /// Build and initialize a cipher for `alias` in `mode`
    ///
    /// Encryption generates a fresh IV and must not be given one; decryption
    /// requires the IV stored alongside the ciphertext. Fails with `KeyLookup`
    /// if the alias has no entry.
    pub fn prepare(
        &self,
        alias: &KeyAlias,
        mode: CipherMode,
        stored_iv: Option<&[u8]>,
    ) -> CryptoResult<Prepared> {
        let iv = match (mode, stored_iv) {
            (CipherMode::Encrypt, None) => generate_iv(),
            (CipherMode::Encrypt, Some(_)) => {
                return Err(CryptoError::CipherInit(
                    "caller-provided IV not permitted for encryption".into(),
                ))
            }
            (CipherMode::Decrypt, Some(iv)) => iv.try_into().map_err(|_| {
                CryptoError::CipherInit(format!("IV must be {} bytes, got {}", IV_LEN, iv.len()))
            })?,
            (CipherMode::Decrypt, None) => {
                return Err(CryptoError::CipherInit("IV required for decryption".into()))
            }
        };

        let key = match self.vault.load_key(alias) {
            Ok(key) => key,
            Err(CryptoError::KeyPermanentlyInvalidated(reason)) => {
                warn!("Key for {} permanently invalidated", alias);
                return Ok(Prepared::Invalidated(InvalidationSignal {
                    alias: alias.clone(),
                    reason,
                }));
            }
            Err(e) => return Err(e),
        };

        let transformation = key.info().spec.transformation();
        let purposes = key.info().spec.purposes;
        let permitted = match mode {
            CipherMode::Encrypt => purposes.encrypt,
            CipherMode::Decrypt => purposes.decrypt,
        };
        if !permitted {
            return Err(CryptoError::CipherInit(format!(
                "key for {} is not authorized to {}",
                alias, mode
            )));
        }

        let context = CipherContext {
            id: Uuid::new_v4(),
            mode,
            iv,
            key,
            authorization: Arc::new(OperationAuthorization::default()),
        };
        debug!("Prepared {} {} context {} for {}", transformation, mode, context.id, alias);

        Ok(Prepared::Ready(context))
    }

    /// Complete the transform; consumes the context
    pub fn finish(&self, context: CipherContext, input: &[u8]) -> CryptoResult<Vec<u8>> {
        if context.requires_authentication() && !context.is_authenticated() {
            return Err(CryptoError::CipherFinalization("key user not authenticated".into()));
        }

        self.vault.ensure_current(context.key.info())?;

        let material = context.key.material();
        let output = match context.mode {
            CipherMode::Encrypt => encrypt_cbc(material, &context.iv, input)?,
            CipherMode::Decrypt => decrypt_cbc(material, &context.iv, input)?,
        };

        debug!("Finished {} context {}", context.mode, context.id);
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keystore::{DeviceSecurityState, SoftwareKeyStore};

    struct Fixture {
        store: Arc<SoftwareKeyStore>,
        vault: Arc<KeyVault>,
        session: CipherSession,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(SoftwareKeyStore::in_memory(DeviceSecurityState::ready()));
        let vault = Arc::new(KeyVault::new(store.clone()));
        let session = CipherSession::new(vault.clone());
        Fixture { store, vault, session }
    }

    fn ready(prepared: Prepared) -> CipherContext {
        match prepared {
            Prepared::Ready(context) => context,
            Prepared::Invalidated(signal) => panic!("unexpected invalidation: {:?}", signal),
        }
    }

    #[test]
    fn test_prepare_finish_roundtrip() {
        let fx = fixture();
        let alias = KeyAlias::new("alice");
        fx.vault.create_key(&alias).unwrap();

        let enc = ready(fx.session.prepare(&alias, CipherMode::Encrypt, None).unwrap());
        let iv = enc.iv().to_vec();
        assert_eq!(iv.len(), IV_LEN);

        enc.crypto_object().authorization.grant();
        let ciphertext = fx.session.finish(enc, b"s3cret").unwrap();

        let dec = ready(fx.session.prepare(&alias, CipherMode::Decrypt, Some(iv.as_slice())).unwrap());
        dec.crypto_object().authorization.grant();
        assert_eq!(fx.session.finish(dec, &ciphertext).unwrap(), b"s3cret");
    }

    #[test]
    fn test_finish_without_authentication_fails() {
        let fx = fixture();
        let alias = KeyAlias::new("alice");
        fx.vault.create_key(&alias).unwrap();

        let enc = ready(fx.session.prepare(&alias, CipherMode::Encrypt, None).unwrap());
        assert!(enc.requires_authentication());
        assert!(!enc.is_authenticated());

        assert!(matches!(
            fx.session.finish(enc, b"s3cret"),
            Err(CryptoError::CipherFinalization(_))
        ));
    }

    #[test]
    fn test_authorization_is_per_context() {
        let fx = fixture();
        let alias = KeyAlias::new("alice");
        fx.vault.create_key(&alias).unwrap();

        let first = ready(fx.session.prepare(&alias, CipherMode::Encrypt, None).unwrap());
        let second = ready(fx.session.prepare(&alias, CipherMode::Encrypt, None).unwrap());
        first.crypto_object().authorization.grant();

        assert!(first.is_authenticated());
        assert!(!second.is_authenticated());
        assert!(fx.session.finish(second, b"s3cret").is_err());
    }

    #[test]
    fn test_invalidation_is_a_signal() {
        let fx = fixture();
        let alias = KeyAlias::new("alice");
        fx.vault.create_key(&alias).unwrap();
        fx.store.enroll_biometric().unwrap();

        match fx.session.prepare(&alias, CipherMode::Encrypt, None).unwrap() {
            Prepared::Invalidated(signal) => assert_eq!(signal.alias, alias),
            Prepared::Ready(_) => panic!("expected invalidation"),
        }
    }

    #[test]
    fn test_missing_key_is_lookup_error() {
        let fx = fixture();
        let result = fx.session.prepare(&KeyAlias::new("nobody"), CipherMode::Decrypt, Some(&[0u8; IV_LEN]));
        assert!(matches!(result, Err(CryptoError::KeyLookup(_))));
    }

    #[test]
    fn test_iv_rules() {
        let fx = fixture();
        let alias = KeyAlias::new("alice");
        fx.vault.create_key(&alias).unwrap();

        assert!(matches!(
            fx.session.prepare(&alias, CipherMode::Decrypt, None),
            Err(CryptoError::CipherInit(_))
        ));
        assert!(matches!(
            fx.session.prepare(&alias, CipherMode::Decrypt, Some(&[0u8; 8])),
            Err(CryptoError::CipherInit(_))
        ));
        assert!(matches!(
            fx.session.prepare(&alias, CipherMode::Encrypt, Some(&[0u8; IV_LEN])),
            Err(CryptoError::CipherInit(_))
        ));
    }

    #[test]
    fn test_malformed_ciphertext_surfaces() {
        let fx = fixture();
        let alias = KeyAlias::new("alice");
        fx.vault.create_key(&alias).unwrap();

        let dec = ready(fx.session.prepare(&alias, CipherMode::Decrypt, Some(&[7u8; IV_LEN])).unwrap());
        dec.crypto_object().authorization.grant();

        assert!(matches!(
            fx.session.finish(dec, b"not a block multiple"),
            Err(CryptoError::CipherFinalization(_))
        ));
    }

    #[test]
    fn test_invalidated_mid_operation() {
        let fx = fixture();
        let alias = KeyAlias::new("alice");
        fx.vault.create_key(&alias).unwrap();

        let enc = ready(fx.session.prepare(&alias, CipherMode::Encrypt, None).unwrap());
        enc.crypto_object().authorization.grant();
        fx.store.enroll_biometric().unwrap();

        assert!(matches!(
            fx.session.finish(enc, b"s3cret"),
            Err(CryptoError::CipherFinalization(_))
        ));
    }
}

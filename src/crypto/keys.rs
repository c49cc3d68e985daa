//! ALFA BioCrypt - Key Material and Key Specs
//!
//! Describes the authentication-bound AES keys held by the key store.

use std::fmt;

use hkdf::Hkdf;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::{CryptoError, CryptoResult};

/// Key length for AES-256
pub const KEY_LEN: usize = 32;

/// AES block size, also the CBC IV length
pub const AES_BLOCK_LEN: usize = 16;

/// IV length for AES/CBC
pub const IV_LEN: usize = AES_BLOCK_LEN;

/// Cipher transformation used for every managed key
pub const TRANSFORMATION: &str = "AES/CBC/PKCS7Padding";

/// HKDF contexts for key derivation
pub mod contexts {
    /// Context for wrapping key-store entries at rest
    pub const KEY_WRAP: &[u8] = b"ALFA:BIOCRYPT:WRAP:v1";
}

/// Caller-supplied identifier of a logical credential
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyAlias(String);

impl KeyAlias {
    pub fn new(alias: impl Into<String>) -> Self {
        Self(alias.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for KeyAlias {
    fn from(alias: &str) -> Self {
        Self::new(alias)
    }
}

impl From<String> for KeyAlias {
    fn from(alias: String) -> Self {
        Self(alias)
    }
}

/// Key algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyAlgorithm {
    Aes,
}

/// Block mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockMode {
    Cbc,
}

/// Encryption padding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Padding {
    Pkcs7,
}

/// What a key may be used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPurposes {
    pub encrypt: bool,
    pub decrypt: bool,
}

/// Generation parameters for a managed key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySpec {
    pub algorithm: KeyAlgorithm,
    pub key_size_bits: u32,
    pub block_mode: BlockMode,
    pub padding: Padding,
    pub purposes: KeyPurposes,
    /// Every use needs a fresh biometric match on the exact cipher instance
    pub user_authentication_required: bool,
}

impl KeySpec {
    /// AES-256/CBC/PKCS7, encrypt + decrypt, biometric-gated
    pub fn biometric_bound() -> Self {
        Self {
            algorithm: KeyAlgorithm::Aes,
            key_size_bits: (KEY_LEN * 8) as u32,
            block_mode: BlockMode::Cbc,
            padding: Padding::Pkcs7,
            purposes: KeyPurposes {
                encrypt: true,
                decrypt: true,
            },
            user_authentication_required: true,
        }
    }

    /// Transformation string for this spec
    pub fn transformation(&self) -> &'static str {
        TRANSFORMATION
    }
}

impl Default for KeySpec {
    fn default() -> Self {
        Self::biometric_bound()
    }
}

/// Raw AES key bytes, zeroized on drop
pub struct KeyMaterial {
    inner: Zeroizing<[u8; KEY_LEN]>,
}

impl KeyMaterial {
    /// Create key material from bytes
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self {
            inner: Zeroizing::new(bytes),
        }
    }

    /// Create key material from a slice of exactly KEY_LEN bytes
    pub fn from_slice(bytes: &[u8]) -> CryptoResult<Self> {
        let array: [u8; KEY_LEN] = bytes.try_into().map_err(|_| CryptoError::InvalidKeyLength {
            expected: KEY_LEN,
            actual: bytes.len(),
        })?;
        Ok(Self::new(array))
    }

    /// Expose the key bytes (use with caution)
    pub fn expose(&self) -> &[u8; KEY_LEN] {
        &self.inner
    }

    /// Generate a random key
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self::new(bytes)
    }

    /// Copy of the key, still zeroized on drop
    pub(crate) fn duplicate(&self) -> Self {
        Self::new(*self.inner)
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeyMaterial([REDACTED])")
    }
}

/// Derive a key using HKDF-SHA256
pub fn derive_key(ikm: &[u8], salt: &[u8], info: &[u8]) -> CryptoResult<KeyMaterial> {
    let hk = Hkdf::<Sha256>::new(Some(salt), ikm);
    let mut okm = [0u8; KEY_LEN];

    hk.expand(info, &mut okm)
        .map_err(|e| CryptoError::KeyDerivationFailed(e.to_string()))?;

    Ok(KeyMaterial::new(okm))
}

/// Generate a random IV for AES/CBC
pub fn generate_iv() -> [u8; IV_LEN] {
    let mut iv = [0u8; IV_LEN];
    rand::thread_rng().fill_bytes(&mut iv);
    iv
}

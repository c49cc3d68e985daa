//! ALFA BioCrypt - AEAD Sealing
//!
//! AES-256-GCM, used by the key-store emulator to keep key material sealed at rest.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use rand::RngCore;

use super::keys::KeyMaterial;
use crate::error::{CryptoError, CryptoResult};

/// Nonce length for AES-GCM
pub const NONCE_LEN: usize = 12;

/// GCM authentication tag size
const TAG_LEN: usize = 16;

/// Sealed data with nonce prepended
pub struct SealedBlob {
    /// Nonce (12 bytes)
    pub nonce: Vec<u8>,
    /// Ciphertext with authentication tag
    pub ciphertext: Vec<u8>,
}

impl SealedBlob {
    /// Serialize to bytes (nonce || ciphertext)
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut result = Vec::with_capacity(self.nonce.len() + self.ciphertext.len());
        result.extend_from_slice(&self.nonce);
        result.extend_from_slice(&self.ciphertext);
        result
    }

    /// Deserialize from bytes
    pub fn from_bytes(data: &[u8]) -> CryptoResult<Self> {
        if data.len() < NONCE_LEN + TAG_LEN {
            return Err(CryptoError::SealFailed("Data too short".into()));
        }

        Ok(Self {
            nonce: data[..NONCE_LEN].to_vec(),
            ciphertext: data[NONCE_LEN..].to_vec(),
        })
    }
}

/// Seal data with AES-256-GCM, binding `aad`
pub fn seal(key: &KeyMaterial, plaintext: &[u8], aad: &[u8]) -> CryptoResult<SealedBlob> {
    let cipher = Aes256Gcm::new_from_slice(key.expose())
        .map_err(|e| CryptoError::SealFailed(e.to_string()))?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, Payload { msg: plaintext, aad })
        .map_err(|e| CryptoError::SealFailed(e.to_string()))?;

    Ok(SealedBlob {
        nonce: nonce_bytes.to_vec(),
        ciphertext,
    })
}

/// Open data sealed with [`seal`]
pub fn open(key: &KeyMaterial, sealed: &SealedBlob, aad: &[u8]) -> CryptoResult<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key.expose())
        .map_err(|e| CryptoError::SealFailed(e.to_string()))?;

    if sealed.nonce.len() != NONCE_LEN {
        return Err(CryptoError::SealFailed("Invalid nonce length".into()));
    }

    let nonce = Nonce::from_slice(&sealed.nonce);

    cipher
        .decrypt(
            nonce,
            Payload {
                msg: sealed.ciphertext.as_slice(),
                aad,
            },
        )
        .map_err(|_| CryptoError::SealFailed("Authentication failed".into()))
}

//! ALFA BioCrypt - Error Types

use thiserror::Error;

/// Result type for biometric crypto operations
pub type CryptoResult<T> = Result<T, CryptoError>;

/// BioCrypt error types
#[derive(Error, Debug)]
pub enum CryptoError {
    // ═══════════════════════════════════════════════════════════════
    // KEY STORE ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("Failed to create a symmetric key: {0}")]
    KeyGeneration(String),

    #[error("No key entry for alias: {0}")]
    KeyLookup(String),

    #[error("Key permanently invalidated: {0}")]
    KeyPermanentlyInvalidated(String),

    #[error("Key store unavailable: {0}")]
    KeyStoreUnavailable(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    #[error("Invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    // ═══════════════════════════════════════════════════════════════
    // CIPHER ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("Failed to init cipher: {0}")]
    CipherInit(String),

    #[error("Cipher finalization failed: {0}")]
    CipherFinalization(String),

    #[error("Sealing failed: {0}")]
    SealFailed(String),

    // ═══════════════════════════════════════════════════════════════
    // BIOMETRIC ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("A scan is already active for cipher context {0}")]
    ScanAlreadyActive(String),

    #[error("Biometric sensor unavailable: {0}")]
    SensorUnavailable(String),

    // ═══════════════════════════════════════════════════════════════
    // CREDENTIAL ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("Credential store error: {0}")]
    CredentialStore(String),

    // ═══════════════════════════════════════════════════════════════
    // IO / SERIALIZATION ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl CryptoError {
    /// Check if this is a security-critical error
    pub fn is_security_critical(&self) -> bool {
        matches!(
            self,
            CryptoError::CipherFinalization(_)
                | CryptoError::SealFailed(_)
                | CryptoError::KeyPermanentlyInvalidated(_)
        )
    }
}

impl From<serde_json::Error> for CryptoError {
    fn from(e: serde_json::Error) -> Self {
        CryptoError::SerializationError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(CryptoError::CipherFinalization("bad padding".into()).is_security_critical());
        assert!(CryptoError::KeyPermanentlyInvalidated("alice".into()).is_security_critical());
        assert!(!CryptoError::KeyGeneration("no provider".into()).is_security_critical());
        assert!(!CryptoError::KeyStoreUnavailable("locked".into()).is_security_critical());
    }
}

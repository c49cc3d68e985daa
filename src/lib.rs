//! # ALFA BioCrypt
//!
//! Biometric-gated credential encryption. A secret is encrypted with an
//! AES/CBC/PKCS7 key that the key store only releases for a cipher operation
//! after a live fingerprint match on that exact operation.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                     ALFA BIOCRYPT                        │
//! │  ┌─────────────────────────────────────────────────────┐ │
//! │  │        BiometricCrypto (encrypt / decrypt)          │ │
//! │  └──────┬──────────────┬───────────────┬───────────────┘ │
//! │         │              │               │                 │
//! │  ┌──────┴──────┐ ┌─────┴───────┐ ┌─────┴─────────────┐   │
//! │  │  KEY VAULT  │ │   CIPHER    │ │  BIOMETRIC GATE   │   │
//! │  │  (aliases)  │ │   SESSION   │ │  (scan handshake) │   │
//! │  └──────┬──────┘ └─────────────┘ └─────┬─────────────┘   │
//! │  ┌──────┴──────┐ ┌─────────────┐ ┌─────┴─────────────┐   │
//! │  │  KEY STORE  │ │ CREDENTIALS │ │  SENSOR           │   │
//! │  │  (platform) │ │ .iv / .pass │ │  (platform)       │   │
//! │  └─────────────┘ └─────────────┘ └───────────────────┘   │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Security Model
//!
//! - Keys require user authentication and never leave the key store
//! - Enrolling a biometric or changing the lock screen permanently
//!   invalidates existing keys
//! - A cipher context is single use and authorized per operation
//! - Key material is zeroized on drop

pub mod biometrics;
pub mod cipher_session;
pub mod config;
pub mod credentials;
pub mod crypto;
pub mod error;
pub mod key_vault;
pub mod keystore;
pub mod secure_fs;
pub mod service;

pub use biometrics::{BiometricGate, BiometricSensor, ScanEvent, ScanOutcome, ScanSession};
pub use cipher_session::{CipherContext, CipherMode, CipherSession, InvalidationSignal, Prepared};
pub use config::CryptoConfig;
pub use credentials::{CredentialStore, EncryptedRecord, FileCredentialStore, MemoryCredentialStore};
pub use crypto::KeyAlias;
pub use error::{CryptoError, CryptoResult};
pub use key_vault::KeyVault;
pub use keystore::{SecureKeyStore, SoftwareKeyStore};
pub use service::{Availability, BiometricCrypto, CryptoOutcome};

/// ALFA BioCrypt version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// ALFA BioCrypt signature
pub const SIGNATURE: &str = "ALFA_BIOCRYPT_v1";

//! ALFA BioCrypt - Cryptographic Core
//!
//! AES/CBC/PKCS7 for credentials, AES-256-GCM + HKDF for sealing key-store entries.

pub mod keys;
pub mod cbc_mode;
pub mod aead;

pub use keys::*;
pub use cbc_mode::*;
pub use aead::*;

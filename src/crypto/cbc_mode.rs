//! ALFA BioCrypt - AES-256/CBC/PKCS7
//!
//! The single-shot transform behind every cipher context.

use aes::Aes256;
use ::cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};

use super::keys::{KeyMaterial, AES_BLOCK_LEN, IV_LEN};
use crate::error::{CryptoError, CryptoResult};

type Aes256CbcEnc = ::cbc::Encryptor<Aes256>;
type Aes256CbcDec = ::cbc::Decryptor<Aes256>;

/// Encrypt with AES-256-CBC and PKCS#7 padding
pub fn encrypt_cbc(key: &KeyMaterial, iv: &[u8; IV_LEN], plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
    let cipher = Aes256CbcEnc::new_from_slices(key.expose(), iv)
        .map_err(|e| CryptoError::CipherInit(e.to_string()))?;

    Ok(cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext))
}

/// Decrypt AES-256-CBC with PKCS#7 padding
pub fn decrypt_cbc(key: &KeyMaterial, iv: &[u8; IV_LEN], ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
    if ciphertext.is_empty() || ciphertext.len() % AES_BLOCK_LEN != 0 {
        return Err(CryptoError::CipherFinalization(format!(
            "input length {} is not a positive multiple of {} bytes",
            ciphertext.len(),
            AES_BLOCK_LEN
        )));
    }

    let cipher = Aes256CbcDec::new_from_slices(key.expose(), iv)
        .map_err(|e| CryptoError::CipherInit(e.to_string()))?;

    cipher
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| CryptoError::CipherFinalization("bad padding".into()))
}

//! ALFA BioCrypt - Credential Store
//!
//! Durable per-alias IV and ciphertext records. Entries are keyed
//! `<alias>.iv` and `<alias>.pass`; the file store keeps them Base64 encoded in
//! one JSON document.

use std::collections::BTreeMap;
use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use log::debug;
use parking_lot::RwLock;

use crate::crypto::KeyAlias;
use crate::error::{CryptoError, CryptoResult};
use crate::secure_fs::SecureFs;

pub const IV_SUFFIX: &str = ".iv";
pub const CIPHERTEXT_SUFFIX: &str = ".pass";

fn iv_key(alias: &KeyAlias) -> String {
    format!("{}{}", alias, IV_SUFFIX)
}

fn ciphertext_key(alias: &KeyAlias) -> String {
    format!("{}{}", alias, CIPHERTEXT_SUFFIX)
}

/// Persisted IV and ciphertext for one alias
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedRecord {
    pub iv: Vec<u8>,
    pub ciphertext: Vec<u8>,
}

/// Credential store (external persistence)
pub trait CredentialStore: Send + Sync {
    /// Store the IV ahead of the ciphertext
    fn put_iv(&self, alias: &KeyAlias, iv: &[u8]) -> CryptoResult<()>;

    fn put_record(&self, alias: &KeyAlias, iv: &[u8], ciphertext: &[u8]) -> CryptoResult<()>;

    /// Complete record, `None` unless both IV and ciphertext are present
    fn get_record(&self, alias: &KeyAlias) -> CryptoResult<Option<EncryptedRecord>>;

    /// Remove both entries; `false` if nothing was stored
    fn remove_record(&self, alias: &KeyAlias) -> CryptoResult<bool>;
}

/// Alias-keyed entries shared by both stores
#[derive(Debug, Default)]
struct Entries(BTreeMap<String, Vec<u8>>);

impl Entries {
    fn put_iv(&mut self, alias: &KeyAlias, iv: &[u8]) {
        self.0.insert(iv_key(alias), iv.to_vec());
    }

    fn put_record(&mut self, alias: &KeyAlias, iv: &[u8], ciphertext: &[u8]) {
        self.0.insert(iv_key(alias), iv.to_vec());
        self.0.insert(ciphertext_key(alias), ciphertext.to_vec());
    }

    fn get_record(&self, alias: &KeyAlias) -> Option<EncryptedRecord> {
        let iv = self.0.get(&iv_key(alias))?;
        let ciphertext = self.0.get(&ciphertext_key(alias))?;
        Some(EncryptedRecord {
            iv: iv.clone(),
            ciphertext: ciphertext.clone(),
        })
    }

    fn remove_record(&mut self, alias: &KeyAlias) -> bool {
        let iv = self.0.remove(&iv_key(alias)).is_some();
        let ciphertext = self.0.remove(&ciphertext_key(alias)).is_some();
        iv || ciphertext
    }
}

/// Volatile credential store
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    entries: RwLock<Entries>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn put_iv(&self, alias: &KeyAlias, iv: &[u8]) -> CryptoResult<()> {
        self.entries.write().put_iv(alias, iv);
        Ok(())
    }

    fn put_record(&self, alias: &KeyAlias, iv: &[u8], ciphertext: &[u8]) -> CryptoResult<()> {
        self.entries.write().put_record(alias, iv, ciphertext);
        Ok(())
    }

    fn get_record(&self, alias: &KeyAlias) -> CryptoResult<Option<EncryptedRecord>> {
        Ok(self.entries.read().get_record(alias))
    }

    fn remove_record(&self, alias: &KeyAlias) -> CryptoResult<bool> {
        Ok(self.entries.write().remove_record(alias))
    }
}

/// JSON-file credential store, rewritten atomically on every change
pub struct FileCredentialStore {
    fs: SecureFs,
    file_name: String,
    entries: RwLock<Entries>,
}

impl FileCredentialStore {
    pub fn open(dir: &Path, file_name: &str) -> CryptoResult<Self> {
        let fs = SecureFs::new(dir);

        let mut entries = Entries::default();
        if let Some(raw) = fs.read_file(file_name)? {
            let encoded: BTreeMap<String, String> = serde_json::from_slice(&raw)?;
            for (key, value) in encoded {
                let bytes = STANDARD.decode(&value).map_err(|e| {
                    CryptoError::CredentialStore(format!("entry {} is not valid base64: {}", key, e))
                })?;
                entries.0.insert(key, bytes);
            }
            debug!("Loaded {} credential entries from {}", entries.0.len(), file_name);
        }

        Ok(Self {
            fs,
            file_name: file_name.to_string(),
            entries: RwLock::new(entries),
        })
    }

    fn flush(&self, entries: &Entries) -> CryptoResult<()> {
        // Last record gone: wipe the file
        if entries.0.is_empty() {
            debug!("Credential store empty, removing {}", self.file_name);
            return self.fs.delete_file(&self.file_name);
        }

        let encoded: BTreeMap<&str, String> = entries
            .0
            .iter()
            .map(|(key, value)| (key.as_str(), STANDARD.encode(value)))
            .collect();

        let json = serde_json::to_vec_pretty(&encoded)?;
        self.fs.write_file(&self.file_name, &json)
    }
}

impl CredentialStore for FileCredentialStore {
    fn put_iv(&self, alias: &KeyAlias, iv: &[u8]) -> CryptoResult<()> {
        let mut entries = self.entries.write();
        entries.put_iv(alias, iv);
        self.flush(&entries)
    }

    fn put_record(&self, alias: &KeyAlias, iv: &[u8], ciphertext: &[u8]) -> CryptoResult<()> {
        let mut entries = self.entries.write();
        entries.put_record(alias, iv, ciphertext);
        self.flush(&entries)
    }

    fn get_record(&self, alias: &KeyAlias) -> CryptoResult<Option<EncryptedRecord>> {
        Ok(self.entries.read().get_record(alias))
    }

    fn remove_record(&self, alias: &KeyAlias) -> CryptoResult<bool> {
        let mut entries = self.entries.write();
        let removed = entries.remove_record(alias);
        if removed {
            self.flush(&entries)?;
        }
        Ok(removed)
    }
}

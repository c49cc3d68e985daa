//! Software key-store emulator
//!
//! Mirrors the behaviour of a hardware-backed store: generation preconditions,
//! permanent invalidation on enrollment / lock-screen changes, and an optional
//! file-backed mode where key material is sealed at rest under a device secret.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use log::{debug, info};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ManagedKey, SecureKeyStore, StoredKey};
use crate::crypto::{contexts, derive_key, open, seal, KeyAlias, KeyMaterial, KeySpec, SealedBlob};
use crate::error::{CryptoError, CryptoResult};
use crate::secure_fs::SecureFs;

/// Per-device secret used to seal entries at rest
const DEVICE_SECRET_FILE: &str = "device.key";

/// Current on-disk format version
const FILE_VERSION: u32 = 1;

/// Lock-screen and enrollment state of the emulated device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeviceSecurityState {
    pub lock_screen_secure: bool,
    pub enrolled_biometrics: u32,
    /// Bumped whenever the enrolled set changes
    pub enrollment_epoch: u64,
    /// Bumped whenever the lock screen is disabled or reset
    pub lock_screen_epoch: u64,
}

impl DeviceSecurityState {
    /// Secure lock screen with one enrolled biometric
    pub fn ready() -> Self {
        Self {
            lock_screen_secure: true,
            enrolled_biometrics: 1,
            ..Default::default()
        }
    }

    fn invalidation_reason(&self, key: &ManagedKey) -> Option<&'static str> {
        if !key.spec.user_authentication_required {
            return None;
        }

        if !self.lock_screen_secure || key.lock_screen_epoch != self.lock_screen_epoch {
            Some("secure lock screen was disabled or reset after the key was generated")
        } else if key.enrollment_epoch != self.enrollment_epoch {
            Some("biometric enrollment changed after the key was generated")
        } else {
            None
        }
    }
}

struct Entry {
    info: ManagedKey,
    material: KeyMaterial,
}

struct Persistence {
    fs: SecureFs,
    file_name: String,
    device_secret: KeyMaterial,
}

#[derive(Serialize, Deserialize)]
struct KeyStoreFile {
    version: u32,
    device: DeviceSecurityState,
    entries: Vec<PersistedEntry>,
}

#[derive(Serialize, Deserialize)]
struct PersistedEntry {
    info: ManagedKey,
    /// Base64 of nonce || AES-GCM(key material)
    sealed_key: String,
}

/// Software emulation of a hardware-backed key store
pub struct SoftwareKeyStore {
    entries: RwLock<BTreeMap<KeyAlias, Entry>>,
    device: RwLock<DeviceSecurityState>,
    available: AtomicBool,
    persistence: Option<Persistence>,
}

impl SoftwareKeyStore {
    /// Volatile store, nothing touches disk
    pub fn in_memory(device: DeviceSecurityState) -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            device: RwLock::new(device),
            available: AtomicBool::new(true),
            persistence: None,
        }
    }

    /// Open (or create) a file-backed store in `dir`
    pub fn open(dir: &Path, file_name: &str) -> CryptoResult<Self> {
        let fs = SecureFs::new(dir);

        // Load or create the device secret
        let device_secret = match fs.read_file(DEVICE_SECRET_FILE)? {
            Some(bytes) => KeyMaterial::from_slice(&bytes)?,
            None => {
                let secret = KeyMaterial::generate();
                fs.write_file(DEVICE_SECRET_FILE, secret.expose())?;
                info!("Created device secret in {}", dir.display());
                secret
            }
        };

        let mut entries = BTreeMap::new();
        let mut device = DeviceSecurityState::default();

        if let Some(raw) = fs.read_file(file_name)? {
            let file: KeyStoreFile = serde_json::from_slice(&raw)?;
            if file.version != FILE_VERSION {
                return Err(CryptoError::SerializationError(format!(
                    "unsupported key store version {}",
                    file.version
                )));
            }

            device = file.device;
            for persisted in file.entries {
                // Unseal under the per-alias wrapping key
                let wrap_key = wrapping_key(&device_secret, &persisted.info.alias)?;
                let sealed = SealedBlob::from_bytes(&STANDARD.decode(&persisted.sealed_key)?)?;
                let material = KeyMaterial::from_slice(&open(
                    &wrap_key,
                    &sealed,
                    persisted.info.key_id.as_bytes(),
                )?)?;

                entries.insert(
                    persisted.info.alias.clone(),
                    Entry {
                        info: persisted.info,
                        material,
                    },
                );
            }
            debug!("Loaded {} key entries from {}", entries.len(), file_name);
        }

        Ok(Self {
            entries: RwLock::new(entries),
            device: RwLock::new(device),
            available: AtomicBool::new(true),
            persistence: Some(Persistence {
                fs,
                file_name: file_name.to_string(),
                device_secret,
            }),
        })
    }

    /// Current device security state
    pub fn device_state(&self) -> DeviceSecurityState {
        *self.device.read()
    }

    /// Simulate the store becoming unreachable (or reachable again)
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Enroll another biometric; invalidates existing authentication-bound keys
    pub fn enroll_biometric(&self) -> CryptoResult<()> {
        {
            let mut device = self.device.write();
            device.enrolled_biometrics += 1;
            device.enrollment_epoch += 1;
            info!("Biometric enrolled ({} total)", device.enrolled_biometrics);
        }
        self.persist()
    }

    /// Remove every enrolled biometric
    pub fn remove_all_biometrics(&self) -> CryptoResult<()> {
        {
            let mut device = self.device.write();
            device.enrolled_biometrics = 0;
            device.enrollment_epoch += 1;
            info!("All biometrics removed");
        }
        self.persist()
    }

    /// Enable or disable the secure lock screen
    pub fn set_lock_screen_secure(&self, secure: bool) -> CryptoResult<()> {
        {
            let mut device = self.device.write();
            if device.lock_screen_secure == secure {
                return Ok(());
            }
            device.lock_screen_secure = secure;
            device.lock_screen_epoch += 1;
            info!("Secure lock screen {}", if secure { "enabled" } else { "disabled" });
        }
        self.persist()
    }

    /// Reset the lock-screen credential
    pub fn reset_lock_screen(&self) -> CryptoResult<()> {
        self.device.write().lock_screen_epoch += 1;
        self.persist()
    }

    fn ensure_available(&self) -> CryptoResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(CryptoError::KeyStoreUnavailable("key store cannot be opened".into()))
        }
    }

    fn persist(&self) -> CryptoResult<()> {
        let Some(ref persistence) = self.persistence else {
            return Ok(());
        };

        let entries = self.entries.read();
        let mut persisted = Vec::with_capacity(entries.len());

        // Seal each key, bound to its key id
        for entry in entries.values() {
            let wrap_key = wrapping_key(&persistence.device_secret, &entry.info.alias)?;
            let sealed = seal(&wrap_key, entry.material.expose(), entry.info.key_id.as_bytes())?;
            persisted.push(PersistedEntry {
                info: entry.info.clone(),
                sealed_key: STANDARD.encode(sealed.to_bytes()),
            });
        }

        let file = KeyStoreFile {
            version: FILE_VERSION,
            device: *self.device.read(),
            entries: persisted,
        };

        // Save (atomic)
        let json = serde_json::to_vec_pretty(&file)?;
        persistence.fs.write_file(&persistence.file_name, &json)
    }
}

impl SecureKeyStore for SoftwareKeyStore {
    fn generate_key(&self, alias: &KeyAlias, spec: &KeySpec) -> CryptoResult<ManagedKey> {
        self.ensure_available()?;

        // Check device preconditions
        let device = self.device_state();
        if spec.user_authentication_required {
            if !device.lock_screen_secure {
                return Err(CryptoError::KeyGeneration(
                    "secure lock screen must be enabled to create keys requiring user authentication".into(),
                ));
            }
            if device.enrolled_biometrics == 0 {
                return Err(CryptoError::KeyGeneration(
                    "at least one biometric must be enrolled to create keys requiring user authentication".into(),
                ));
            }
        }

        // Stamp with the current epochs
        let info = ManagedKey {
            key_id: Uuid::new_v4(),
            alias: alias.clone(),
            spec: spec.clone(),
            created_at: Utc::now(),
            enrollment_epoch: device.enrollment_epoch,
            lock_screen_epoch: device.lock_screen_epoch,
        };

        let replaced = self
            .entries
            .write()
            .insert(
                alias.clone(),
                Entry {
                    info: info.clone(),
                    material: KeyMaterial::generate(),
                },
            )
            .is_some();

        if replaced {
            debug!("Replaced existing key entry for {}", alias);
        }

        self.persist()?;
        Ok(info)
    }

    fn is_key_entry(&self, alias: &KeyAlias) -> CryptoResult<bool> {
        self.ensure_available()?;
        Ok(self.entries.read().contains_key(alias))
    }

    fn delete_entry(&self, alias: &KeyAlias) -> CryptoResult<bool> {
        self.ensure_available()?;

        let removed = self.entries.write().remove(alias).is_some();
        if removed {
            self.persist()?;
        }
        Ok(removed)
    }

    fn aliases(&self) -> CryptoResult<Vec<KeyAlias>> {
        self.ensure_available()?;
        Ok(self.entries.read().keys().cloned().collect())
    }

    fn load_key(&self, alias: &KeyAlias) -> CryptoResult<StoredKey> {
        self.ensure_available()?;

        let entries = self.entries.read();
        let entry = entries
            .get(alias)
            .ok_or_else(|| CryptoError::KeyLookup(alias.to_string()))?;

        if let Some(reason) = self.device.read().invalidation_reason(&entry.info) {
            return Err(CryptoError::KeyPermanentlyInvalidated(format!("{}: {}", alias, reason)));
        }

        Ok(StoredKey::new(entry.info.clone(), entry.material.duplicate()))
    }

    fn is_lock_screen_secure(&self) -> bool {
        self.device.read().lock_screen_secure
    }
}

fn wrapping_key(device_secret: &KeyMaterial, alias: &KeyAlias) -> CryptoResult<KeyMaterial> {
    derive_key(device_secret.expose(), alias.as_str().as_bytes(), contexts::KEY_WRAP)
}

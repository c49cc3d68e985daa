//! ALFA BioCrypt - Configuration

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::biometrics::PromptConfig;
use crate::error::{CryptoError, CryptoResult};

/// Service configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// Root for the credential file and the key-store emulator
    pub data_dir: PathBuf,
    pub credentials_file: String,
    pub keystore_file: String,
    /// Generate a fresh key on every encrypt
    pub regenerate_key_on_encrypt: bool,
    /// Give up on a scan after this many seconds
    pub scan_timeout_secs: Option<u64>,
    pub prompt: PromptConfig,
    /// env_logger filter, overridden by RUST_LOG
    pub log_filter: String,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".alfa_biocrypt"),
            credentials_file: "fingerprint_crypto_service_credentials.json".into(),
            keystore_file: "keystore.json".into(),
            regenerate_key_on_encrypt: true,
            scan_timeout_secs: Some(30),
            prompt: PromptConfig::default(),
            log_filter: "info".into(),
        }
    }
}

impl CryptoConfig {
    /// Load from a JSON file; missing fields take their defaults
    pub fn load(path: &Path) -> CryptoResult<Self> {
        let raw = std::fs::read(path)
            .map_err(|e| CryptoError::Config(format!("{}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_slice(&raw)
            .map_err(|e| CryptoError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> CryptoResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> CryptoResult<()> {
        if self.credentials_file.trim().is_empty() || self.keystore_file.trim().is_empty() {
            return Err(CryptoError::Config("store file names must not be empty".into()));
        }
        if self.credentials_file == self.keystore_file {
            return Err(CryptoError::Config(
                "credential and key-store files must differ".into(),
            ));
        }
        if self.scan_timeout_secs == Some(0) {
            return Err(CryptoError::Config("scan timeout must be positive".into()));
        }
        Ok(())
    }

    pub fn scan_timeout(&self) -> Option<Duration> {
        self.scan_timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = CryptoConfig::default();
        assert!(config.regenerate_key_on_encrypt);
        assert_eq!(config.scan_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.prompt.error_timeout_ms, 1600);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        let config = CryptoConfig {
            regenerate_key_on_encrypt: false,
            scan_timeout_secs: None,
            ..Default::default()
        };
        config.save(&path).unwrap();

        assert_eq!(CryptoConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"log_filter": "debug"}"#).unwrap();

        let config = CryptoConfig::load(&path).unwrap();
        assert_eq!(config.log_filter, "debug");
        assert_eq!(config.keystore_file, "keystore.json");
    }

    #[test]
    fn test_invalid_config_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"scan_timeout_secs": 0}"#).unwrap();

        assert!(matches!(CryptoConfig::load(&path), Err(CryptoError::Config(_))));
    }
}

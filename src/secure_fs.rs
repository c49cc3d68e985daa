//! ALFA BioCrypt - Secure Filesystem Operations
//!
//! Atomic writes for the file-backed credential store and key-store emulator.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::error::CryptoResult;

/// Secure Filesystem Handler
#[derive(Debug, Clone)]
pub struct SecureFs {
    /// Root directory
    root: PathBuf,
}

impl SecureFs {
    /// Create new SecureFs with root directory
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    fn full_path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Write file atomically (temp file + rename)
    pub fn write_file(&self, relative_path: &str, data: &[u8]) -> CryptoResult<()> {
        let path = self.full_path(relative_path);

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write to temp file first (atomic write)
        let temp_path = path.with_extension("tmp");

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)?;

        file.write_all(data)?;
        file.sync_all()?;

        // Rename to final path
        fs::rename(&temp_path, &path)?;

        Ok(())
    }

    /// Read file, `None` if it does not exist
    pub fn read_file(&self, relative_path: &str) -> CryptoResult<Option<Vec<u8>>> {
        if !self.exists(relative_path) {
            return Ok(None);
        }

        let mut file = File::open(self.full_path(relative_path))?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;

        Ok(Some(data))
    }

    /// Delete file, overwriting it with zeros first
    pub fn delete_file(&self, relative_path: &str) -> CryptoResult<()> {
        let path = self.full_path(relative_path);

        if path.exists() {
            // Overwrite with zeros before removal
            let size = fs::metadata(&path)?.len() as usize;
            if size > 0 {
                let mut file = OpenOptions::new().write(true).open(&path)?;
                file.write_all(&vec![0u8; size])?;
                file.sync_all()?;
            }

            fs::remove_file(&path)?;
        }

        Ok(())
    }

    /// Check if file exists
    pub fn exists(&self, relative_path: &str) -> bool {
        self.full_path(relative_path).exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_secure_fs() {
        let dir = tempdir().unwrap();
        let fs = SecureFs::new(dir.path());

        fs.write_file("state/credentials.json", b"{}").unwrap();
        assert!(fs.exists("state/credentials.json"));
        assert!(!fs.exists("state/credentials.tmp"));

        let data = fs.read_file("state/credentials.json").unwrap();
        assert_eq!(data.as_deref(), Some(&b"{}"[..]));

        fs.delete_file("state/credentials.json").unwrap();
        assert!(!fs.exists("state/credentials.json"));
        assert!(fs.read_file("state/credentials.json").unwrap().is_none());
    }
}

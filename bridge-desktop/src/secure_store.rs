//! Secure Credential Storage using encrypted files
//!
//! Each secret lives in its own file named after the hex-encoded key. File
//! contents are `nonce (12 bytes) || AES-256-GCM ciphertext`. The cipher key
//! is derived from a stable installation identifier, so copying the files to
//! another installation does not make them readable there.

use aes_gcm::{
    aead::{rand_core::RngCore, Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::SecureStore,
};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const FILE_EXTENSION: &str = "bin";
const KEY_DOMAIN: &[u8] = b"short-poster/credential-store/v1:";

/// Encrypted file-backed secure storage implementation
pub struct EncryptedFileStore {
    directory: PathBuf,
    cipher: Aes256Gcm,
}

impl EncryptedFileStore {
    /// Create a store rooted at `directory`, keyed by `installation_id`.
    pub fn new(directory: impl Into<PathBuf>, installation_id: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(KEY_DOMAIN);
        hasher.update(installation_id.as_bytes());
        let digest = hasher.finalize();

        let key = aes_gcm::Key::<Aes256Gcm>::from_slice(&digest);
        Self {
            directory: directory.into(),
            cipher: Aes256Gcm::new(key),
        }
    }

    /// Store under `<data dir>/short-poster/credentials`, keyed by the
    /// application data directory path.
    pub fn for_current_installation() -> Result<Self> {
        let app_dir = dirs::data_dir()
            .ok_or_else(|| {
                BridgeError::NotAvailable("No application data directory".to_string())
            })?
            .join(crate::APP_DIR_NAME);

        let installation_id = app_dir.to_string_lossy().into_owned();
        Ok(Self::new(app_dir.join("credentials"), &installation_id))
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.directory
            .join(format!("{}.{}", hex::encode(key.as_bytes()), FILE_EXTENSION))
    }

    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| BridgeError::OperationFailed(format!("Encryption failed: {}", e)))?;

        let mut result = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        result.extend_from_slice(&nonce_bytes);
        result.extend_from_slice(&ciphertext);
        Ok(result)
    }

    fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        if data.len() < NONCE_LEN + TAG_LEN {
            return Err(BridgeError::OperationFailed(
                "Invalid ciphertext: too short".to_string(),
            ));
        }

        let (nonce, ciphertext) = data.split_at(NONCE_LEN);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|e| BridgeError::OperationFailed(format!("Decryption failed: {}", e)))
    }

    async fn ensure_directory(&self) -> Result<()> {
        fs::create_dir_all(&self.directory).await?;
        Ok(())
    }
}

impl fmt::Debug for EncryptedFileStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptedFileStore")
            .field("directory", &self.directory)
            .field("cipher", &"[REDACTED]")
            .finish()
    }
}

#[async_trait]
impl SecureStore for EncryptedFileStore {
    async fn set_secret(&self, key: &str, value: &[u8]) -> Result<()> {
        self.ensure_directory().await?;

        let encrypted = self.encrypt(value)?;
        let path = self.path_for(key);
        let tmp_path = path.with_extension("tmp");

        // Atomic replace: write a temp file, then rename.
        fs::write(&tmp_path, &encrypted).await?;
        fs::rename(&tmp_path, &path).await?;

        debug!(key = key, "Stored secret");
        Ok(())
    }

    async fn get_secret(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key);
        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(key = key, "Secret not found");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        match self.decrypt(&data) {
            Ok(plaintext) => Ok(Some(plaintext)),
            Err(e) => {
                warn!(key = key, error = %e, "Failed to decrypt secret");
                Err(e)
            }
        }
    }

    async fn delete_secret(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => {
                debug!(key = key, "Deleted secret");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn has_secret(&self, key: &str) -> Result<bool> {
        Ok(fs::try_exists(self.path_for(key)).await?)
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        let mut read_dir = match fs::read_dir(&self.directory).await {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        while let Some(entry) = read_dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(FILE_EXTENSION) {
                continue;
            }
            let decoded = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| hex::decode(s).ok())
                .and_then(|bytes| String::from_utf8(bytes).ok());
            if let Some(key) = decoded {
                keys.push(key);
            }
        }

        keys.sort();
        Ok(keys)
    }
}

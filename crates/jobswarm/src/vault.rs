//! Encrypted credential vault.
//!
//! Credentials are serialized to JSON and sealed with AES-256-GCM. The key
//! and the ciphertext live in two separate owner-only files:
//!
//! - key file: 64 hex chars (32 bytes)
//! - data file: hex of `<12-byte nonce><ciphertext+tag>`
//!
//! Rotation stages the new ciphertext (`<data>.next`) first, then the new
//! key (`<key>.next`), whose presence commits the rotation. Both staged files
//! are then renamed over the live ones. [`SecretVault::open`] finishes a
//! committed rotation or discards an uncommitted one.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use secrecy::{ExposeSecret, SecretString};
use tracing::{info, warn};

use crate::private_file::{sibling, write_private, WriteError};

/// Nonce size for AES-256-GCM (96 bits = 12 bytes).
const NONCE_SIZE: usize = 12;
const KEY_SIZE: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("Credential store failed authentication: wrong key or tampered ciphertext")]
    Integrity,

    #[error("Vault I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Credential serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid vault key: {0}")]
    InvalidKey(String),

    #[error("Failed to generate random bytes: {0}")]
    Rng(String),
}

pub type Result<T> = std::result::Result<T, VaultError>;

impl From<WriteError> for VaultError {
    fn from(e: WriteError) -> Self {
        VaultError::Io {
            path: e.path,
            source: e.source,
        }
    }
}

/// Portal-scoped secrets, e.g. `linkedin_email` -> value.
#[derive(Clone, Default)]
pub struct Credentials {
    values: BTreeMap<String, SecretString>,
}

impl Credentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values
            .insert(key.into(), SecretString::from(value.into()));
    }

    pub fn get(&self, key: &str) -> Option<&SecretString> {
        self.values.get(key)
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.values.remove(key).is_some()
    }

    pub fn keys(&self) -> Vec<&str> {
        self.values.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The subset whose keys start with `<portal>_`.
    pub fn scoped(&self, portal: &str) -> Credentials {
        let prefix = format!("{}_", portal);
        Credentials {
            values: self
                .values
                .iter()
                .filter(|(k, _)| k.starts_with(&prefix))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    fn to_plain(&self) -> BTreeMap<&str, &str> {
        self.values
            .iter()
            .map(|(k, v)| (k.as_str(), v.expose_secret()))
            .collect()
    }

    fn from_plain(plain: BTreeMap<String, String>) -> Self {
        Self {
            values: plain
                .into_iter()
                .map(|(k, v)| (k, SecretString::from(v)))
                .collect(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("keys", &self.keys())
            .finish_non_exhaustive()
    }
}

impl PartialEq for Credentials {
    fn eq(&self, other: &Self) -> bool {
        self.to_plain() == other.to_plain()
    }
}

/// AES-256-GCM with a hex-encoded key.
struct KeyCipher {
    cipher: Aes256Gcm,
}

impl KeyCipher {
    fn from_hex_key(key_hex: &str) -> Result<Self> {
        let key_bytes = hex::decode(key_hex.trim())
            .map_err(|e| VaultError::InvalidKey(format!("Invalid hex key: {}", e)))?;

        if key_bytes.len() != KEY_SIZE {
            return Err(VaultError::InvalidKey(format!(
                "Key must be 32 bytes (64 hex chars), got {} bytes",
                key_bytes.len()
            )));
        }

        let cipher = Aes256Gcm::new_from_slice(&key_bytes)
            .map_err(|e| VaultError::InvalidKey(format!("Failed to create cipher: {}", e)))?;

        Ok(Self { cipher })
    }

    /// Fresh random key, returned with its hex encoding.
    fn generate() -> Result<(String, Self)> {
        let key_hex = hex::encode(rand_bytes::<KEY_SIZE>()?);
        let cipher = Self::from_hex_key(&key_hex)?;
        Ok((key_hex, cipher))
    }

    fn encrypt(&self, plaintext: &[u8]) -> Result<String> {
        let nonce_bytes = rand_bytes::<NONCE_SIZE>()?;
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|_| VaultError::Integrity)?;

        let mut combined = nonce_bytes.to_vec();
        combined.extend(ciphertext);
        Ok(hex::encode(combined))
    }

    /// Any malformation or tag mismatch is an integrity failure.
    fn decrypt(&self, ciphertext_hex: &str) -> Result<Vec<u8>> {
        let combined = hex::decode(ciphertext_hex.trim()).map_err(|_| VaultError::Integrity)?;
        if combined.len() < NONCE_SIZE {
            return Err(VaultError::Integrity);
        }

        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_SIZE);
        self.cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| VaultError::Integrity)
    }
}

fn rand_bytes<const N: usize>() -> Result<[u8; N]> {
    let mut bytes = [0u8; N];
    getrandom::getrandom(&mut bytes).map_err(|e| VaultError::Rng(e.to_string()))?;
    Ok(bytes)
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> VaultError + '_ {
    move |source| VaultError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn read_trimmed(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .map_err(io_error(path))
}

/// Credential vault backed by a key file and a ciphertext file.
#[derive(Debug, Clone)]
pub struct SecretVault {
    key_path: PathBuf,
    data_path: PathBuf,
}

impl SecretVault {
    /// Opens the vault, completing or discarding an interrupted rotation.
    pub fn open(key_path: impl Into<PathBuf>, data_path: impl Into<PathBuf>) -> Result<Self> {
        let vault = Self {
            key_path: key_path.into(),
            data_path: data_path.into(),
        };
        vault.recover_staged_rotation()?;
        Ok(vault)
    }

    pub fn key_path(&self) -> &Path {
        &self.key_path
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    /// True once credentials have been stored.
    pub fn is_configured(&self) -> bool {
        self.data_path.exists()
    }

    fn load_or_create_key(&self) -> Result<KeyCipher> {
        if self.key_path.exists() {
            return KeyCipher::from_hex_key(&read_trimmed(&self.key_path)?);
        }
        let (key_hex, cipher) = KeyCipher::generate()?;
        write_private(&self.key_path, &key_hex)?;
        info!(path = %self.key_path.display(), "Generated new vault key");
        Ok(cipher)
    }

    /// Seals `credentials`, replacing any stored set.
    pub fn encrypt(&self, credentials: &Credentials) -> Result<()> {
        let cipher = self.load_or_create_key()?;
        let plaintext = serde_json::to_vec(&credentials.to_plain())?;
        Ok(write_private(&self.data_path, &cipher.encrypt(&plaintext)?)?)
    }

    /// Returns the stored credentials; empty when nothing was stored yet.
    pub fn decrypt(&self) -> Result<Credentials> {
        if !self.data_path.exists() {
            return Ok(Credentials::new());
        }
        if !self.key_path.exists() {
            return Err(VaultError::InvalidKey(format!(
                "key file {} is missing but ciphertext exists",
                self.key_path.display()
            )));
        }

        let cipher = KeyCipher::from_hex_key(&read_trimmed(&self.key_path)?)?;
        let plaintext = cipher.decrypt(&read_trimmed(&self.data_path)?)?;
        let plain: BTreeMap<String, String> = serde_json::from_slice(&plaintext)?;
        Ok(Credentials::from_plain(plain))
    }

    /// Decrypt, modify, re-encrypt.
    pub fn update<F>(&self, f: F) -> Result<Credentials>
    where
        F: FnOnce(&mut Credentials),
    {
        let mut credentials = self.decrypt()?;
        f(&mut credentials);
        self.encrypt(&credentials)?;
        Ok(credentials)
    }

    pub fn set(&self, key: &str, value: impl Into<String>) -> Result<()> {
        let value = value.into();
        self.update(|c| c.insert(key, value)).map(|_| ())
    }

    /// Returns whether the key existed.
    pub fn remove(&self, key: &str) -> Result<bool> {
        let mut removed = false;
        self.update(|c| removed = c.remove(key))?;
        Ok(removed)
    }

    /// Re-encrypts the stored credentials under a freshly generated key.
    pub fn rotate(&self) -> Result<()> {
        let credentials = self.decrypt()?;
        let (key_hex, cipher) = KeyCipher::generate()?;
        let plaintext = serde_json::to_vec(&credentials.to_plain())?;

        let staged_data = sibling(&self.data_path, ".next");
        let staged_key = sibling(&self.key_path, ".next");

        write_private(&staged_data, &cipher.encrypt(&plaintext)?)?;
        // The staged key is the commit marker.
        write_private(&staged_key, &key_hex)?;

        self.promote_staged(&staged_data, &staged_key)?;
        info!(entries = credentials.len(), "Vault key rotated");
        Ok(())
    }

    fn promote_staged(&self, staged_data: &Path, staged_key: &Path) -> Result<()> {
        if staged_data.exists() {
            std::fs::rename(staged_data, &self.data_path).map_err(io_error(&self.data_path))?;
        }
        std::fs::rename(staged_key, &self.key_path).map_err(io_error(&self.key_path))
    }

    fn recover_staged_rotation(&self) -> Result<()> {
        let staged_data = sibling(&self.data_path, ".next");
        let staged_key = sibling(&self.key_path, ".next");

        if staged_key.exists() {
            warn!("Completing interrupted vault key rotation");
            self.promote_staged(&staged_data, &staged_key)?;
        } else if staged_data.exists() {
            warn!("Discarding uncommitted vault key rotation");
            std::fs::remove_file(&staged_data).map_err(io_error(&staged_data))?;
        }
        Ok(())
    }
}

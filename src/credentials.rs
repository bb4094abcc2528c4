//! Credential encryption
//!
//! Passwords are stored in the node registry in whatever form the configured
//! cipher produces. `AesGcmCipher` keeps them encrypted at rest under a key
//! file that lives next to the database; `PassthroughCipher` stores them as
//! given and is what a bare `Coordinator` uses.

use crate::DiverError;
use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Marks values produced by [`AesGcmCipher`]
const CIPHERTEXT_PREFIX: &str = "aes256gcm:";

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// Reversible transformation applied to passwords at rest
///
/// `decrypt` must not fail: input that is not ciphertext (empty strings,
/// legacy plaintext) is returned unchanged so a crawl never aborts on it.
pub trait CredentialCipher: Send + Sync + fmt::Debug {
    fn encrypt(&self, plaintext: &str) -> String;

    fn decrypt(&self, ciphertext: &str) -> String;
}

/// Cipher that stores passwords as given
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughCipher;

impl CredentialCipher for PassthroughCipher {
    fn encrypt(&self, plaintext: &str) -> String {
        plaintext.to_string()
    }

    fn decrypt(&self, ciphertext: &str) -> String {
        ciphertext.to_string()
    }
}

/// AES-256-GCM cipher with a random nonce per value
///
/// Ciphertext is `aes256gcm:` followed by base64 of nonce and sealed bytes.
/// Empty passwords stay empty.
pub struct AesGcmCipher {
    cipher: Aes256Gcm,
}

impl fmt::Debug for AesGcmCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AesGcmCipher").finish_non_exhaustive()
    }
}

impl AesGcmCipher {
    pub fn new(key: &[u8; KEY_LEN]) -> Self {
        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key)),
        }
    }

    /// Loads the key stored at `path`, creating a fresh random key if the
    /// file does not exist yet
    ///
    /// # Returns
    ///
    /// * `Ok(AesGcmCipher)` - Cipher for the stored or new key
    /// * `Err(DiverError::CredentialKey)` - The file exists but is not a key
    /// * `Err(DiverError::Io)` - The file could not be read or written
    pub fn load_or_create(path: &Path) -> Result<Self, DiverError> {
        let mut key = [0u8; KEY_LEN];

        match std::fs::read(path) {
            Ok(bytes) if bytes.len() == KEY_LEN => key.copy_from_slice(&bytes),
            Ok(bytes) => {
                return Err(DiverError::CredentialKey(format!(
                    "{} holds {} bytes, expected {}",
                    path.display(),
                    bytes.len(),
                    KEY_LEN
                )));
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                key.copy_from_slice(&Aes256Gcm::generate_key(OsRng));
                if let Some(parent) = path.parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent)?;
                    }
                }
                std::fs::write(path, key)?;
                info!("Created credential key {}", path.display());
            }
            Err(e) => return Err(e.into()),
        }

        Ok(Self::new(&key))
    }

    fn open(&self, encoded: &str) -> Option<String> {
        let bytes = STANDARD.decode(encoded).ok()?;
        if bytes.len() <= NONCE_LEN {
            return None;
        }
        let (nonce, sealed) = bytes.split_at(NONCE_LEN);
        let plain = self.cipher.decrypt(Nonce::from_slice(nonce), sealed).ok()?;
        String::from_utf8(plain).ok()
    }
}

impl CredentialCipher for AesGcmCipher {
    fn encrypt(&self, plaintext: &str) -> String {
        if plaintext.is_empty() {
            return String::new();
        }

        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        match self.cipher.encrypt(&nonce, plaintext.as_bytes()) {
            Ok(sealed) => {
                let mut bytes = nonce.to_vec();
                bytes.extend_from_slice(&sealed);
                format!("{}{}", CIPHERTEXT_PREFIX, STANDARD.encode(bytes))
            }
            Err(_) => {
                warn!("Password encryption failed, storing it unencrypted");
                plaintext.to_string()
            }
        }
    }

    fn decrypt(&self, ciphertext: &str) -> String {
        let Some(encoded) = ciphertext.strip_prefix(CIPHERTEXT_PREFIX) else {
            return ciphertext.to_string();
        };

        self.open(encoded).unwrap_or_else(|| {
            warn!("Could not decrypt a stored password");
            ciphertext.to_string()
        })
    }
}

/// Key file used for a database: same path with a `.key` extension
pub fn key_path_for(database_path: &Path) -> PathBuf {
    database_path.with_extension("key")
}

/// Versioned AES-256-GCM secret box
///
/// Seals short secrets (storage secret keys) before they are written to the
/// database. Each sealed value carries the nonce and the version of the master
/// key that produced it, so the master key can be rotated without re-encrypting
/// every row at once: new values use the current key, older rows stay readable
/// as long as their key version is still registered.
///
/// Callers pass associated data identifying the owning record. A ciphertext
/// copied onto another record fails authentication.
use std::collections::HashMap;
use std::fmt;

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use base64::engine::{general_purpose::STANDARD, Engine};
use rand::Rng;
use thiserror::Error;

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum SecretBoxError {
    #[error("invalid master key: {0}")]
    InvalidKey(String),

    #[error("duplicate master key version {0}")]
    DuplicateKeyVersion(i16),

    #[error("unknown master key version {0}")]
    UnknownKeyVersion(i16),

    #[error("encryption failed")]
    EncryptionFailed,

    #[error("decryption failed: {0}")]
    DecryptionFailed(String),
}

/// Ciphertext plus the metadata needed to open it
#[derive(Clone, PartialEq, Eq)]
pub struct SealedSecret {
    pub ciphertext: Vec<u8>,
    pub nonce: Vec<u8>,
    pub key_version: i16,
}

impl fmt::Debug for SealedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SealedSecret")
            .field("ciphertext_len", &self.ciphertext.len())
            .field("key_version", &self.key_version)
            .finish()
    }
}

pub struct SecretBox {
    current_version: i16,
    ciphers: HashMap<i16, Aes256Gcm>,
}

impl fmt::Debug for SecretBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut versions: Vec<_> = self.ciphers.keys().copied().collect();
        versions.sort_unstable();
        f.debug_struct("SecretBox")
            .field("current_version", &self.current_version)
            .field("versions", &versions)
            .finish()
    }
}

impl SecretBox {
    /// Build a secret box from a base64-encoded 256-bit master key
    pub fn new(current_version: i16, key_base64: &str) -> Result<Self, SecretBoxError> {
        let mut ciphers = HashMap::new();
        ciphers.insert(current_version, cipher_from_base64(key_base64)?);
        Ok(Self {
            current_version,
            ciphers,
        })
    }

    /// Register a retired key so rows sealed with it can still be opened
    pub fn with_previous_key(
        mut self,
        version: i16,
        key_base64: &str,
    ) -> Result<Self, SecretBoxError> {
        if self.ciphers.contains_key(&version) {
            return Err(SecretBoxError::DuplicateKeyVersion(version));
        }
        self.ciphers.insert(version, cipher_from_base64(key_base64)?);
        Ok(self)
    }

    pub fn current_version(&self) -> i16 {
        self.current_version
    }

    /// Encrypt `plaintext` with the current key, binding it to `aad`
    pub fn seal(&self, plaintext: &str, aad: &[u8]) -> Result<SealedSecret, SecretBoxError> {
        let cipher = self
            .ciphers
            .get(&self.current_version)
            .ok_or(SecretBoxError::UnknownKeyVersion(self.current_version))?;

        let nonce_bytes: [u8; NONCE_LEN] = rand::thread_rng().gen();
        let ciphertext = cipher
            .encrypt(
                Nonce::from_slice(&nonce_bytes),
                Payload {
                    msg: plaintext.as_bytes(),
                    aad,
                },
            )
            .map_err(|_| SecretBoxError::EncryptionFailed)?;

        Ok(SealedSecret {
            ciphertext,
            nonce: nonce_bytes.to_vec(),
            key_version: self.current_version,
        })
    }

    /// Decrypt a sealed secret; any tampering or key mismatch is an error
    pub fn open(&self, sealed: &SealedSecret, aad: &[u8]) -> Result<String, SecretBoxError> {
        let cipher = self
            .ciphers
            .get(&sealed.key_version)
            .ok_or(SecretBoxError::UnknownKeyVersion(sealed.key_version))?;

        if sealed.nonce.len() != NONCE_LEN {
            return Err(SecretBoxError::DecryptionFailed(format!(
                "nonce must be {} bytes, got {}",
                NONCE_LEN,
                sealed.nonce.len()
            )));
        }
        if sealed.ciphertext.len() < TAG_LEN {
            return Err(SecretBoxError::DecryptionFailed(
                "ciphertext too short".to_string(),
            ));
        }

        let plaintext = cipher
            .decrypt(
                Nonce::from_slice(&sealed.nonce),
                Payload {
                    msg: &sealed.ciphertext,
                    aad,
                },
            )
            .map_err(|_| SecretBoxError::DecryptionFailed("authentication failed".to_string()))?;

        String::from_utf8(plaintext)
            .map_err(|e| SecretBoxError::DecryptionFailed(format!("invalid UTF-8: {}", e)))
    }
}

fn cipher_from_base64(key_base64: &str) -> Result<Aes256Gcm, SecretBoxError> {
    let key_bytes = STANDARD
        .decode(key_base64.trim())
        .map_err(|e| SecretBoxError::InvalidKey(format!("failed to decode base64: {}", e)))?;

    if key_bytes.len() != KEY_LEN {
        return Err(SecretBoxError::InvalidKey(format!(
            "key must be {} bytes, got {}",
            KEY_LEN,
            key_bytes.len()
        )));
    }

    Aes256Gcm::new_from_slice(&key_bytes).map_err(|e| SecretBoxError::InvalidKey(e.to_string()))
}

/// Generate a random base64-encoded 256-bit master key
pub fn generate_key() -> String {
    let key_bytes: [u8; KEY_LEN] = rand::thread_rng().gen();
    STANDARD.encode(key_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const AAD: &[u8] = b"user:7d2c";

    #[test]
    fn seal_then_open_returns_plaintext() {
        let sb = SecretBox::new(1, &generate_key()).unwrap();
        let sealed = sb.seal("wJalrXUtnFEMI/K7MDENG", AAD).unwrap();

        assert_eq!(sealed.key_version, 1);
        assert_eq!(sealed.nonce.len(), NONCE_LEN);
        assert_eq!(sb.open(&sealed, AAD).unwrap(), "wJalrXUtnFEMI/K7MDENG");
    }

    #[test]
    fn ciphertext_never_contains_plaintext() {
        let sb = SecretBox::new(1, &generate_key()).unwrap();
        let sealed = sb.seal("super-secret-value", AAD).unwrap();

        let needle = b"super-secret-value";
        assert!(!sealed
            .ciphertext
            .windows(needle.len())
            .any(|w| w == needle));
    }

    #[test]
    fn nonces_differ_between_seals() {
        let sb = SecretBox::new(1, &generate_key()).unwrap();
        let a = sb.seal("same", AAD).unwrap();
        let b = sb.seal("same", AAD).unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn tampered_ciphertext_is_rejected() {
        let sb = SecretBox::new(1, &generate_key()).unwrap();
        let mut sealed = sb.seal("secret", AAD).unwrap();
        sealed.ciphertext[0] ^= 0xFF;

        assert!(matches!(
            sb.open(&sealed, AAD),
            Err(SecretBoxError::DecryptionFailed(_))
        ));
    }

    #[test]
    fn wrong_associated_data_is_rejected() {
        let sb = SecretBox::new(1, &generate_key()).unwrap();
        let sealed = sb.seal("secret", b"user:a").unwrap();

        assert!(sb.open(&sealed, b"team:a").is_err());
    }

    #[test]
    fn different_master_key_cannot_open() {
        let a = SecretBox::new(1, &generate_key()).unwrap();
        let b = SecretBox::new(1, &generate_key()).unwrap();
        let sealed = a.seal("secret", AAD).unwrap();

        assert!(b.open(&sealed, AAD).is_err());
    }

    #[test]
    fn rotated_keys_still_open_old_values() {
        let old_key = generate_key();
        let old = SecretBox::new(1, &old_key).unwrap();
        let sealed_old = old.seal("legacy", AAD).unwrap();

        let rotated = SecretBox::new(2, &generate_key())
            .unwrap()
            .with_previous_key(1, &old_key)
            .unwrap();

        assert_eq!(rotated.open(&sealed_old, AAD).unwrap(), "legacy");
        assert_eq!(rotated.seal("fresh", AAD).unwrap().key_version, 2);
    }

    #[test]
    fn unknown_key_version_is_reported() {
        let sb = SecretBox::new(2, &generate_key()).unwrap();
        let sealed = SealedSecret {
            ciphertext: vec![0; 32],
            nonce: vec![0; NONCE_LEN],
            key_version: 1,
        };

        assert!(matches!(
            sb.open(&sealed, AAD),
            Err(SecretBoxError::UnknownKeyVersion(1))
        ));
    }

    #[test]
    fn duplicate_version_is_rejected() {
        let key = generate_key();
        let result = SecretBox::new(1, &key).unwrap().with_previous_key(1, &key);
        assert!(matches!(result, Err(SecretBoxError::DuplicateKeyVersion(1))));
    }

    #[test]
    fn invalid_keys_are_rejected() {
        assert!(SecretBox::new(1, "not@base64!").is_err());
        assert!(SecretBox::new(1, &STANDARD.encode("too_short")).is_err());
    }

    #[test]
    fn debug_output_hides_material() {
        let sb = SecretBox::new(3, &generate_key()).unwrap();
        let sealed = sb.seal("secret", AAD).unwrap();

        let rendered = format!("{:?} {:?}", sb, sealed);
        assert!(rendered.contains("current_version: 3"));
        assert!(!rendered.contains("secret\""));
    }
}

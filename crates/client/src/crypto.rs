//! Encryption for locally cached user data.
//!
//! Values are sealed with ChaCha20-Poly1305 and stored as
//! `enc:v1:<nonce>:<ciphertext>` with URL-safe base64 parts.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chacha20poly1305::aead::Aead;
use chacha20poly1305::{ChaCha20Poly1305, Key, KeyInit, Nonce};
use rand::Rng;
use secrecy::ExposeSecret;
use thiserror::Error;

use crate::config::CacheKey;

const ENVELOPE_PREFIX: &str = "enc:v1:";
const NONCE_LENGTH: usize = 12;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("value is not an encrypted envelope")]
    NotEncrypted,
    #[error("malformed envelope: {0}")]
    Malformed(String),
    #[error("decryption failed (wrong key or tampered data)")]
    Decrypt,
    #[error("encryption failed")]
    Encrypt,
}

/// Seals and opens cache values with a fixed key.
#[derive(Clone)]
pub struct CacheCipher {
    aead: ChaCha20Poly1305,
}

impl std::fmt::Debug for CacheCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheCipher").finish_non_exhaustive()
    }
}

impl CacheCipher {
    #[must_use]
    pub fn new(key: &CacheKey) -> Self {
        let key = Key::from_slice(key.expose_secret());
        Self {
            aead: ChaCha20Poly1305::new(key),
        }
    }

    /// Whether `value` looks like an envelope produced by [`CacheCipher::seal`].
    #[must_use]
    pub fn is_sealed(value: &str) -> bool {
        value.starts_with(ENVELOPE_PREFIX)
    }

    /// Encrypt `plaintext` with a fresh random nonce.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Encrypt`] if the AEAD rejects the input.
    pub fn seal(&self, plaintext: &str) -> Result<String, CryptoError> {
        let mut nonce_bytes = [0u8; NONCE_LENGTH];
        rand::rng().fill(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .aead
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| CryptoError::Encrypt)?;

        Ok(format!(
            "{ENVELOPE_PREFIX}{}:{}",
            URL_SAFE_NO_PAD.encode(nonce_bytes),
            URL_SAFE_NO_PAD.encode(ciphertext)
        ))
    }

    /// Decrypt an envelope produced by [`CacheCipher::seal`].
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError`] if the value is not an envelope, is malformed,
    /// or fails authentication.
    pub fn open(&self, sealed: &str) -> Result<String, CryptoError> {
        let body = sealed
            .strip_prefix(ENVELOPE_PREFIX)
            .ok_or(CryptoError::NotEncrypted)?;
        let (nonce_b64, ciphertext_b64) = body
            .split_once(':')
            .ok_or_else(|| CryptoError::Malformed("missing ciphertext".to_string()))?;

        let nonce_bytes = URL_SAFE_NO_PAD
            .decode(nonce_b64)
            .map_err(|e| CryptoError::Malformed(format!("nonce: {e}")))?;
        if nonce_bytes.len() != NONCE_LENGTH {
            return Err(CryptoError::Malformed(format!(
                "nonce must be {NONCE_LENGTH} bytes"
            )));
        }
        let ciphertext = URL_SAFE_NO_PAD
            .decode(ciphertext_b64)
            .map_err(|e| CryptoError::Malformed(format!("ciphertext: {e}")))?;

        let plaintext = self
            .aead
            .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_slice())
            .map_err(|_| CryptoError::Decrypt)?;
        String::from_utf8(plaintext).map_err(|_| CryptoError::Decrypt)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretBox;

    use super::*;

    fn cipher(fill: u8) -> CacheCipher {
        CacheCipher::new(&SecretBox::new(Box::new([fill; 32])))
    }

    #[test]
    fn test_seal_open() {
        let c = cipher(7);
        let sealed = c.seal(r#"{"name":"Asha"}"#).unwrap();
        assert!(CacheCipher::is_sealed(&sealed));
        assert!(!sealed.contains("Asha"));
        assert_eq!(c.open(&sealed).unwrap(), r#"{"name":"Asha"}"#);
    }

    #[test]
    fn test_nonce_differs_per_seal() {
        let c = cipher(7);
        assert_ne!(c.seal("same").unwrap(), c.seal("same").unwrap());
    }

    #[test]
    fn test_wrong_key_fails() {
        let sealed = cipher(1).seal("hello").unwrap();
        assert!(matches!(cipher(2).open(&sealed), Err(CryptoError::Decrypt)));
    }

    #[test]
    fn test_plaintext_is_not_an_envelope() {
        assert!(matches!(
            cipher(1).open(r#"{"name":"Asha"}"#),
            Err(CryptoError::NotEncrypted)
        ));
        assert!(matches!(
            cipher(1).open("enc:v1:onlyonepart"),
            Err(CryptoError::Malformed(_))
        ));
    }
}

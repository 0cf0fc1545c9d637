//! Sealing of the LLM credential at rest.
//!
//! The configuration store holds the credential AES-256-GCM-sealed; the
//! 32-byte key arrives base64-encoded via environment. The plaintext exists
//! only in memory at request-construction time and never reaches logs or
//! the read API.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::error::CryptoError;

const NONCE_LEN: usize = 12;

/// AES-256-GCM seal/open for a single secret string.
pub struct CredentialSealer {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for CredentialSealer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialSealer").field("key", &"[REDACTED]").finish()
    }
}

impl CredentialSealer {
    /// Build a sealer from a base64-encoded 32-byte key.
    pub fn from_base64_key(key_b64: &str) -> Result<Self, CryptoError> {
        let key_bytes = BASE64
            .decode(key_b64.trim())
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        if key_bytes.len() != 32 {
            return Err(CryptoError::InvalidKey(format!(
                "expected 32 bytes, got {}",
                key_bytes.len()
            )));
        }
        let key = Key::<Aes256Gcm>::from_slice(&key_bytes);
        Ok(Self { cipher: Aes256Gcm::new(key) })
    }

    /// Seal a secret into a base64 `nonce || ciphertext` payload.
    pub fn seal(&self, plaintext: &str) -> Result<String, CryptoError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| CryptoError::Seal)?;

        let mut payload = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        payload.extend_from_slice(&nonce);
        payload.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(payload))
    }

    /// Open a payload produced by [`seal`](Self::seal).
    pub fn open(&self, sealed: &str) -> Result<String, CryptoError> {
        let payload = BASE64
            .decode(sealed.trim())
            .map_err(|e| CryptoError::Open(format!("base64 decode: {e}")))?;
        if payload.len() < NONCE_LEN {
            return Err(CryptoError::Open("payload shorter than nonce".to_string()));
        }

        let (nonce, ciphertext) = payload.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CryptoError::Open("authentication failed".to_string()))?;

        String::from_utf8(plaintext).map_err(|e| CryptoError::Open(e.to_string()))
    }
}

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::Engine as _;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::AuthError;

/// Handles AES-256-GCM encryption for stored platform credentials.
pub struct CryptoEngine {
    cipher: Aes256Gcm,
}

impl CryptoEngine {
    /// Create a new CryptoEngine from a base64-encoded 32-byte key.
    pub fn new(master_key_b64: &str) -> Result<Self, AuthError> {
        let master_key = base64::engine::general_purpose::STANDARD
            .decode(master_key_b64)
            .map_err(|e| AuthError::CryptoError(format!("Invalid MASTER_KEY base64: {e}")))?;

        if master_key.len() != 32 {
            return Err(AuthError::CryptoError(format!(
                "MASTER_KEY must be 32 bytes, got {}",
                master_key.len()
            )));
        }

        let cipher = Aes256Gcm::new_from_slice(&master_key)
            .map_err(|e| AuthError::CryptoError(format!("Failed to init AES cipher: {e}")))?;

        Ok(Self { cipher })
    }

    /// Encrypt plaintext using AES-256-GCM. Returns base64(nonce || ciphertext).
    pub fn encrypt(&self, plaintext: &str) -> Result<String, AuthError> {
        let mut nonce_bytes = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| AuthError::Encryption(e.to_string()))?;

        let mut combined = nonce_bytes.to_vec();
        combined.extend_from_slice(&ciphertext);

        Ok(base64::engine::general_purpose::STANDARD.encode(&combined))
    }

    /// Decrypt base64(nonce || ciphertext) back to plaintext.
    pub fn decrypt(&self, encrypted_b64: &str) -> Result<String, AuthError> {
        let combined = base64::engine::general_purpose::STANDARD
            .decode(encrypted_b64)
            .map_err(|e| AuthError::Decryption(format!("Invalid base64: {e}")))?;

        if combined.len() < 12 {
            return Err(AuthError::Decryption("Ciphertext too short".into()));
        }

        let (nonce_bytes, ciphertext) = combined.split_at(12);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| AuthError::Decryption(e.to_string()))?;

        String::from_utf8(plaintext)
            .map_err(|e| AuthError::Decryption(format!("Invalid UTF-8 after decrypt: {e}")))
    }
}

/// 32 random bytes, URL-safe base64 without padding. Used for tickets and PKCE verifiers.
pub fn random_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// RFC 7636 S256 code challenge for a verifier.
pub fn pkce_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest)
}

/// Compare a caller-supplied secret against the configured one without
/// short-circuiting on the first differing byte. An empty expected secret never matches.
pub fn secrets_match(provided: &str, expected: &str) -> bool {
    if expected.is_empty() {
        return false;
    }
    let a = Sha256::digest(provided.as_bytes());
    let b = Sha256::digest(expected.as_bytes());
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
pub(crate) fn test_engine() -> CryptoEngine {
    let key = base64::engine::general_purpose::STANDARD.encode([0x42u8; 32]);
    CryptoEngine::new(&key).unwrap()
}

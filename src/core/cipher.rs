//! # Message Obfuscation
//!
//! Outgoing text can be wrapped as `$dt_<base64(nonce ‖ ciphertext)>` using a
//! key derived from the shared password. Anyone with the same password sees
//! the plain text; everyone else sees the wrapped form.

use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

/// Marks message content as cipher-wrapped.
pub const CIPHER_PREFIX: &str = "$dt_";

const NONCE_LEN: usize = 12;

#[derive(Debug)]
pub enum CipherError {
    Encrypt,
}

impl fmt::Display for CipherError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CipherError::Encrypt => write!(f, "encryption failed"),
        }
    }
}

impl std::error::Error for CipherError {}

#[derive(Debug, PartialEq, Eq)]
pub enum DecryptError {
    Encoding,
    Truncated,
    /// Wrong key or tampered payload.
    Authentication,
    Utf8,
}

impl fmt::Display for DecryptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecryptError::Encoding => write!(f, "payload is not valid base64"),
            DecryptError::Truncated => write!(f, "payload is too short"),
            DecryptError::Authentication => write!(f, "payload failed authentication"),
            DecryptError::Utf8 => write!(f, "decrypted text is not UTF-8"),
        }
    }
}

impl std::error::Error for DecryptError {}

/// Symmetric password-based cipher.
pub trait Cipher: Send + Sync {
    fn encrypt(&self, plaintext: &str, password: &str) -> Result<String, CipherError>;
    fn decrypt(&self, payload: &str, password: &str) -> Result<String, DecryptError>;
}

/// ChaCha20-Poly1305 with a SHA-256 password-derived key and a random nonce per message.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChaChaCipher;

fn derive_key(password: &str) -> Key {
    let digest = Sha256::digest(password.as_bytes());
    Key::clone_from_slice(&digest)
}

impl Cipher for ChaChaCipher {
    fn encrypt(&self, plaintext: &str, password: &str) -> Result<String, CipherError> {
        let cipher = ChaCha20Poly1305::new(&derive_key(password));
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
            .map_err(|_| CipherError::Encrypt)?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(blob))
    }

    fn decrypt(&self, payload: &str, password: &str) -> Result<String, DecryptError> {
        let blob = STANDARD
            .decode(payload.trim())
            .map_err(|_| DecryptError::Encoding)?;
        if blob.len() <= NONCE_LEN {
            return Err(DecryptError::Truncated);
        }
        let (nonce, ciphertext) = blob.split_at(NONCE_LEN);
        let cipher = ChaCha20Poly1305::new(&derive_key(password));
        let plain = cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| DecryptError::Authentication)?;
        String::from_utf8(plain).map_err(|_| DecryptError::Utf8)
    }
}

/// Encrypt and prefix outgoing text.
pub fn wrap(cipher: &dyn Cipher, text: &str, password: &str) -> Result<String, CipherError> {
    Ok(format!("{CIPHER_PREFIX}{}", cipher.encrypt(text, password)?))
}

/// Decrypt prefixed content if possible.
///
/// A failed decryption yields the original content unchanged: messages meant
/// for another key are shown as they arrived, without an error line.
pub fn unwrap_or_original(cipher: &dyn Cipher, content: &str, password: &str) -> String {
    let Some(payload) = content.strip_prefix(CIPHER_PREFIX) else {
        return content.to_string();
    };
    match cipher.decrypt(payload, password) {
        Ok(plain) => plain,
        Err(e) => {
            log::debug!("Leaving wrapped message as-is: {}", e);
            content.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_then_unwrap() {
        let wrapped = wrap(&ChaChaCipher, "meet at noon", "hunter2").unwrap();
        assert!(wrapped.starts_with(CIPHER_PREFIX));
        assert!(!wrapped.contains("noon"));
        assert_eq!(
            unwrap_or_original(&ChaChaCipher, &wrapped, "hunter2"),
            "meet at noon"
        );
    }

    #[test]
    fn test_nonce_varies_per_message() {
        let a = ChaChaCipher.encrypt("same", "k").unwrap();
        let b = ChaChaCipher.encrypt("same", "k").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_key_keeps_original() {
        let wrapped = wrap(&ChaChaCipher, "secret", "right").unwrap();
        assert_eq!(unwrap_or_original(&ChaChaCipher, &wrapped, "wrong"), wrapped);
        let payload = wrapped.strip_prefix(CIPHER_PREFIX).unwrap();
        assert_eq!(
            ChaChaCipher.decrypt(payload, "wrong"),
            Err(DecryptError::Authentication)
        );
    }

    #[test]
    fn test_malformed_payloads() {
        assert_eq!(ChaChaCipher.decrypt("%%%", "k"), Err(DecryptError::Encoding));
        assert_eq!(
            ChaChaCipher.decrypt(&STANDARD.encode([0u8; 4]), "k"),
            Err(DecryptError::Truncated)
        );
        assert_eq!(unwrap_or_original(&ChaChaCipher, "$dt_%%%", "k"), "$dt_%%%");
    }

    #[test]
    fn test_plain_content_untouched() {
        assert_eq!(unwrap_or_original(&ChaChaCipher, "hello", "k"), "hello");
    }
}

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::{STANDARD as BASE64, URL_SAFE_NO_PAD as BASE64_URL};
use base64::Engine as _;
use rand::RngCore;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("encryption failed")]
    Encrypt,
    #[error("decryption failed")]
    Decrypt,
    #[error("bad encoding: {0}")]
    Encoding(String),
}

/// Output of the assisted (server-side) encryption. Ciphertext and IV are
/// standard base64, the same opaque shape a browser client uploads. The key
/// is URL-safe base64 because it rides in a URL fragment.
pub struct SealedSecret {
    pub ciphertext: String,
    pub iv: String,
    pub key: String,
}

/// AES-256-GCM under a fresh 256-bit key and 96-bit IV. Used only by the
/// assisted flow; the zero-knowledge path never calls this.
pub fn seal(plaintext: &str) -> Result<SealedSecret, CryptoError> {
    let mut key_bytes = [0u8; 32];
    let mut iv_bytes = [0u8; 12];
    rand::rngs::OsRng.fill_bytes(&mut key_bytes);
    rand::rngs::OsRng.fill_bytes(&mut iv_bytes);

    let cipher = Aes256Gcm::new_from_slice(&key_bytes).map_err(|_| CryptoError::Encrypt)?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&iv_bytes), plaintext.as_bytes())
        .map_err(|_| CryptoError::Encrypt)?;

    Ok(SealedSecret {
        ciphertext: BASE64.encode(&ciphertext),
        iv: BASE64.encode(iv_bytes),
        key: BASE64_URL.encode(key_bytes),
    })
}

/// Inverse of `seal`. The recipient's browser normally does this; the server
/// only needs it under test.
pub fn open(ciphertext_b64: &str, iv_b64: &str, key_b64: &str) -> Result<String, CryptoError> {
    let ciphertext = BASE64
        .decode(ciphertext_b64)
        .map_err(|e| CryptoError::Encoding(e.to_string()))?;
    let iv = BASE64
        .decode(iv_b64)
        .map_err(|e| CryptoError::Encoding(e.to_string()))?;
    let key = BASE64_URL
        .decode(key_b64)
        .map_err(|e| CryptoError::Encoding(e.to_string()))?;
    if iv.len() != 12 {
        return Err(CryptoError::Decrypt);
    }

    let cipher = Aes256Gcm::new_from_slice(&key).map_err(|_| CryptoError::Decrypt)?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(&iv), ciphertext.as_ref())
        .map_err(|_| CryptoError::Decrypt)?;
    String::from_utf8(plaintext).map_err(|e| CryptoError::Encoding(e.to_string()))
}

//! At-rest sealing for the session token.
//!
//! The bearer token is stored as Base64 of `nonce (12 bytes) || AES-256-GCM ciphertext`.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, Nonce, OsRng};
use aes_gcm::Aes256Gcm;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};

use crate::error::{Error, Result};

const NONCE_LEN: usize = 12;

/// Keeps tokens out of plain sight in the session file; not a secret from local users.
const SESSION_KEY: &[u8; 32] = b"DispatchConsoleSessionKey-2026!!";

fn sealing_error(stage: &str, detail: impl std::fmt::Display) -> Error {
    Error::Invalid {
        message: format!("Stored token {stage} failed: {detail}"),
    }
}

fn cipher() -> Aes256Gcm {
    Aes256Gcm::new(SESSION_KEY.into())
}

/// Seal a token for storage
pub fn seal(token: &str) -> Result<String> {
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let sealed = cipher()
        .encrypt(&nonce, token.as_bytes())
        .map_err(|e| sealing_error("encryption", e))?;

    let mut stored = Vec::with_capacity(NONCE_LEN + sealed.len());
    stored.extend_from_slice(&nonce);
    stored.extend_from_slice(&sealed);
    Ok(BASE64.encode(stored))
}

/// Recover a token written by [`seal`]
pub fn unseal(stored: &str) -> Result<String> {
    let bytes = BASE64
        .decode(stored)
        .map_err(|e| sealing_error("decoding", e))?;
    if bytes.len() < NONCE_LEN {
        return Err(sealing_error("decoding", "value is truncated"));
    }

    let (nonce, sealed) = bytes.split_at(NONCE_LEN);
    let plain = cipher()
        .decrypt(Nonce::<Aes256Gcm>::from_slice(nonce), sealed)
        .map_err(|e| sealing_error("decryption", e))?;

    String::from_utf8(plain).map_err(|e| sealing_error("decoding", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sealed_token_is_recoverable() {
        let token = "eyJhbGciOiJIUzI1NiJ9.payload.sig";
        let stored = seal(token).expect("seal");
        assert!(!stored.contains("payload"));
        assert_eq!(unseal(&stored).expect("unseal"), token);
    }

    #[test]
    fn test_fresh_nonce_per_seal() {
        assert_ne!(seal("t").expect("seal"), seal("t").expect("seal"));
    }

    #[test]
    fn test_unseal_rejects_garbage() {
        assert!(unseal("not base64!!").is_err());
        assert!(unseal("AQIDBA==").is_err());
        // Valid length, wrong tag
        assert!(unseal(&BASE64.encode([7u8; 40])).is_err());
    }
}

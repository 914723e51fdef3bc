//! AES-256-GCM Cipher.
//!
//! Ciphertext layout: `nonce (12 bytes) || AEAD output (ciphertext + 16-byte tag)`.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::error::CipherError;
use crate::ports::Cipher;

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// Process master key. Decoded once at startup and moved into the cipher.
#[derive(Clone)]
pub struct MasterKey([u8; KEY_LEN]);

impl MasterKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CipherError> {
        let key: [u8; KEY_LEN] = bytes.try_into().map_err(|_| CipherError::InvalidKeyLength {
            expected: KEY_LEN,
            actual: bytes.len(),
        })?;
        Ok(Self(key))
    }

    /// Standard (padded) base64, as usually found in secret managers.
    pub fn from_base64(encoded: &str) -> Result<Self, CipherError> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|_| CipherError::KeyEncoding)?;
        Self::from_bytes(&bytes)
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterKey(<redacted>)")
    }
}

pub struct AesGcmCipher {
    aead: Aes256Gcm,
    key_version: i32,
}

impl AesGcmCipher {
    pub fn new(key: MasterKey, key_version: i32) -> Self {
        Self {
            aead: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key.0)),
            key_version,
        }
    }
}

impl Cipher for AesGcmCipher {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let sealed = self
            .aead
            .encrypt(&nonce, plaintext)
            .map_err(|_| CipherError::Encrypt)?;

        let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CipherError> {
        if ciphertext.len() < NONCE_LEN {
            return Err(CipherError::Truncated);
        }
        let (nonce, sealed) = ciphertext.split_at(NONCE_LEN);
        self.aead
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| CipherError::Decrypt)
    }

    fn key_version(&self) -> i32 {
        self.key_version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher(fill: u8) -> AesGcmCipher {
        AesGcmCipher::new(MasterKey::from_bytes(&[fill; KEY_LEN]).unwrap(), 1)
    }

    #[test]
    fn encrypt_then_decrypt() {
        let cipher = cipher(7);
        let sealed = cipher.encrypt_str("gho_secret").unwrap();

        assert_ne!(&sealed[NONCE_LEN..], b"gho_secret");
        assert_eq!(cipher.decrypt_str(&sealed).unwrap(), "gho_secret");
    }

    #[test]
    fn nonces_are_fresh_per_call() {
        let cipher = cipher(7);
        let a = cipher.encrypt_str("same").unwrap();
        let b = cipher.encrypt_str("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_key_or_tampering_fails() {
        let sealed = cipher(7).encrypt_str("token").unwrap();
        assert!(matches!(cipher(8).decrypt(&sealed), Err(CipherError::Decrypt)));

        let mut tampered = sealed.clone();
        let last = tampered.len() - 1;
        tampered[last] ^= 0xff;
        assert!(matches!(cipher(7).decrypt(&tampered), Err(CipherError::Decrypt)));

        assert!(matches!(cipher(7).decrypt(&sealed[..4]), Err(CipherError::Truncated)));
    }

    #[test]
    fn master_key_from_base64() {
        let encoded = STANDARD.encode([1u8; KEY_LEN]);
        assert!(MasterKey::from_base64(&encoded).is_ok());

        let short = STANDARD.encode([1u8; 16]);
        assert!(matches!(MasterKey::from_base64("%%%"), Err(CipherError::KeyEncoding)));
        assert!(matches!(
            MasterKey::from_base64(&short),
            Err(CipherError::InvalidKeyLength { expected: 32, actual: 16 })
        ));
        assert_eq!(format!("{:?}", MasterKey::from_bytes(&[0; 32]).unwrap()), "MasterKey(<redacted>)");
    }
}

//! Cipher port - the encryption service.
//!
//! The master key is handed to the implementation once at startup and held
//! for the lifetime of the process.

use crate::error::CipherError;

pub trait Cipher: Send + Sync {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CipherError>;

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CipherError>;

    /// Recorded alongside every ciphertext written with this key.
    fn key_version(&self) -> i32;

    fn encrypt_str(&self, plaintext: &str) -> Result<Vec<u8>, CipherError> {
        self.encrypt(plaintext.as_bytes())
    }

    fn decrypt_str(&self, ciphertext: &[u8]) -> Result<String, CipherError> {
        String::from_utf8(self.decrypt(ciphertext)?).map_err(|_| CipherError::NotUtf8)
    }
}

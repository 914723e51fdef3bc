use thiserror::Error;

/// Failure reported by a storage port implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A persisted row could not be mapped back into a domain value.
    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// The job is no longer `processing` under this worker's lock: the
    /// reaper released it and it may belong to someone else now.
    #[error("lease lost: job {job} is not held by {worker}")]
    LeaseLost { job: String, worker: String },

    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn backend(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Backend(Box::new(err))
    }
}

#[derive(Debug, Error)]
pub enum CipherError {
    #[error("master key must be {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("master key is not valid base64")]
    KeyEncoding,

    #[error("ciphertext too short")]
    Truncated,

    #[error("encryption failed")]
    Encrypt,

    /// Wrong key, tampered ciphertext, or a ciphertext from another key version.
    #[error("decryption failed")]
    Decrypt,

    #[error("decrypted value is not valid utf-8")]
    NotUtf8,
}

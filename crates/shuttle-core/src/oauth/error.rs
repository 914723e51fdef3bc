use thiserror::Error;

use crate::domain::{ProjectId, Provider};
use crate::error::{CipherError, StoreError};
use crate::ports::OAuthClientError;

/// Why a credential operation failed. Callers match on the variant; the
/// durable reason lives on the integration row.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("{provider} is not connected for {project_id}")]
    NotConnected {
        project_id: ProjectId,
        provider: Provider,
    },

    #[error("no stored credentials for {0}")]
    CredentialsMissing(Provider),

    #[error("credentials for {0} have been revoked")]
    Revoked(Provider),

    #[error("no refresh token stored for {0}")]
    RefreshTokenMissing(Provider),

    #[error("token refresh failed after {attempts} attempts: {source}")]
    RefreshFailed {
        attempts: u32,
        #[source]
        source: OAuthClientError,
    },

    /// Unknown or already-consumed `state`.
    #[error("invalid oauth state")]
    InvalidState,

    #[error("oauth state expired")]
    StateExpired,

    #[error("authorization code exchange failed: {0}")]
    Exchange(#[source] OAuthClientError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Cipher(#[from] CipherError),
}

//! TokenEndpoint port - the OAuth provider's token URL.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Token endpoint response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    /// Lifetime in seconds, relative to our own clock at receipt.
    #[serde(default)]
    pub expires_in: Option<i64>,
}

#[derive(Debug, Error)]
pub enum OAuthClientError {
    #[error("token endpoint unreachable: {0}")]
    Transport(String),

    #[error("token endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("token endpoint response could not be decoded: {0}")]
    Decode(String),
}

#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    /// `grant_type=authorization_code` with the PKCE verifier.
    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
        redirect_uri: &str,
    ) -> Result<TokenResponse, OAuthClientError>;

    /// `grant_type=refresh_token`.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, OAuthClientError>;
}

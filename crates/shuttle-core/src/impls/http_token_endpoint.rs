//! TokenEndpoint over HTTPS (reqwest + rustls).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument};

use crate::oauth::OAuthProviderConfig;
use crate::ports::{OAuthClientError, TokenEndpoint, TokenResponse};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Upper bound on how much of an error body ends up in `last_error`.
const MAX_ERROR_BODY: usize = 512;

pub struct HttpTokenEndpoint {
    client: Client,
    config: OAuthProviderConfig,
}

impl HttpTokenEndpoint {
    pub fn new(config: OAuthProviderConfig) -> Result<Self, OAuthClientError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| OAuthClientError::Transport(e.to_string()))?;
        Ok(Self { client, config })
    }

    /// Grant-specific fields plus the client credentials.
    fn form<'a>(&'a self, grant: &[(&'a str, &'a str)]) -> Vec<(&'a str, &'a str)> {
        let mut form = grant.to_vec();
        form.push(("client_id", self.config.client_id.as_str()));
        if let Some(secret) = &self.config.client_secret {
            form.push(("client_secret", secret.as_str()));
        }
        form
    }

    async fn post(&self, form: &[(&str, &str)]) -> Result<TokenResponse, OAuthClientError> {
        let response = self
            .client
            .post(self.config.token_url.clone())
            .header(reqwest::header::ACCEPT, "application/json")
            .form(form)
            .send()
            .await
            .map_err(|e| OAuthClientError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| OAuthClientError::Transport(e.to_string()))?;
        debug!(status = status.as_u16(), "token endpoint responded");

        if !status.is_success() {
            return Err(OAuthClientError::Status {
                status: status.as_u16(),
                body: truncate(body, MAX_ERROR_BODY),
            });
        }
        serde_json::from_str(&body).map_err(|e| OAuthClientError::Decode(e.to_string()))
    }
}

fn truncate(mut s: String, max: usize) -> String {
    if s.len() > max {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        s.truncate(end);
    }
    s
}

#[async_trait]
impl TokenEndpoint for HttpTokenEndpoint {
    #[instrument(skip_all, fields(provider = %self.config.provider))]
    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
        redirect_uri: &str,
    ) -> Result<TokenResponse, OAuthClientError> {
        let form = self.form(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("code_verifier", code_verifier),
            ("redirect_uri", redirect_uri),
        ]);
        self.post(&form).await
    }

    #[instrument(skip_all, fields(provider = %self.config.provider))]
    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, OAuthClientError> {
        let form = self.form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ]);
        self.post(&form).await
    }
}

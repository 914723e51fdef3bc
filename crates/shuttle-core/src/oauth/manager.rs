//! Token lifecycle manager: authorization, callback, cached access with
//! refresh, and disconnect for one provider.
//!
//! Integration state machine per `(project, provider)`:
//! `disabled -> connected -> {expired, disabled}`, with `error` settable
//! from any state.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::config::{OAuthProviderConfig, RefreshPolicy};
use super::error::TokenError;
use super::pkce;
use crate::domain::{
    CredentialsUpdate, Integration, IntegrationTransition, OAuthCredentials, OAuthSession,
    ProjectId, Provider, SESSION_TTL,
};
use crate::ports::{
    Cipher, Clock, CredentialStore, IntegrationStore, OAuthClientError, SessionStore, TokenEndpoint,
    TokenResponse,
};

/// The persistence the manager reads and writes.
#[derive(Clone)]
pub struct OAuthStores {
    pub integrations: Arc<dyn IntegrationStore>,
    pub credentials: Arc<dyn CredentialStore>,
    pub sessions: Arc<dyn SessionStore>,
}

/// Where to send the user after a successful callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackOutcome {
    pub project_id: ProjectId,
    pub return_url: Option<String>,
}

pub struct TokenLifecycleManager {
    config: OAuthProviderConfig,
    refresh: RefreshPolicy,
    stores: OAuthStores,
    endpoint: Arc<dyn TokenEndpoint>,
    cipher: Arc<dyn Cipher>,
    clock: Arc<dyn Clock>,
}

impl TokenLifecycleManager {
    pub fn new(
        config: OAuthProviderConfig,
        stores: OAuthStores,
        endpoint: Arc<dyn TokenEndpoint>,
        cipher: Arc<dyn Cipher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            refresh: RefreshPolicy::default(),
            stores,
            endpoint,
            cipher,
            clock,
        }
    }

    pub fn with_refresh_policy(mut self, refresh: RefreshPolicy) -> Self {
        self.refresh = refresh;
        self
    }

    pub fn provider(&self) -> &Provider {
        &self.config.provider
    }

    /// `<redirect_base>/oauth/<provider>/callback`.
    pub fn redirect_uri(&self, redirect_base: &str) -> String {
        format!(
            "{}/oauth/{}/callback",
            redirect_base.trim_end_matches('/'),
            self.config.provider
        )
    }

    /// Begin an authorization-code flow and return the provider URL to send
    /// the user to.
    #[instrument(skip(self, return_url, redirect_base), fields(provider = %self.config.provider))]
    pub async fn start_authorization(
        &self,
        project_id: ProjectId,
        return_url: Option<&str>,
        redirect_base: &str,
    ) -> Result<Url, TokenError> {
        let integration = self
            .stores
            .integrations
            .ensure(project_id, &self.config.provider)
            .await?;

        let verifier = pkce::generate_verifier();
        let challenge = pkce::challenge_s256(&verifier);
        let state = pkce::generate_state();
        let redirect_uri = self.redirect_uri(redirect_base);
        let now = self.clock.now();

        self.stores
            .sessions
            .insert(OAuthSession {
                state: state.clone(),
                project_id,
                provider: self.config.provider.clone(),
                code_verifier_ciphertext: self.cipher.encrypt_str(&verifier)?,
                code_challenge: challenge.clone(),
                redirect_uri: redirect_uri.clone(),
                return_url: return_url.map(str::to_string),
                expires_at: now + SESSION_TTL,
                created_at: now,
            })
            .await?;

        let mut url = self.config.authorize_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("response_type", "code")
                .append_pair("client_id", &self.config.client_id)
                .append_pair("redirect_uri", &redirect_uri)
                .append_pair("state", &state)
                .append_pair("code_challenge", &challenge)
                .append_pair("code_challenge_method", pkce::CHALLENGE_METHOD);
            if let Some(scope) = self.config.scope_param() {
                query.append_pair("scope", &scope);
            }
        }

        self.stores
            .integrations
            .transition(integration.id, IntegrationTransition::Disabled)
            .await?;

        info!(integration = %integration.id, "authorization started");
        Ok(url)
    }

    /// Complete the flow started by [`start_authorization`](Self::start_authorization).
    ///
    /// The session is consumed before anything else is checked, so a
    /// `state` value works at most once whatever the outcome.
    #[instrument(skip_all, fields(provider = %self.config.provider))]
    pub async fn handle_callback(&self, code: &str, state: &str) -> Result<CallbackOutcome, TokenError> {
        let session = self
            .stores
            .sessions
            .take(state)
            .await?
            .ok_or(TokenError::InvalidState)?;

        let now = self.clock.now();
        if session.is_expired(now) {
            warn!(project = %session.project_id, "oauth state expired");
            return Err(TokenError::StateExpired);
        }
        if session.provider != self.config.provider {
            return Err(TokenError::InvalidState);
        }

        let integration = self
            .stores
            .integrations
            .ensure(session.project_id, &self.config.provider)
            .await?;
        let verifier = self.cipher.decrypt_str(&session.code_verifier_ciphertext)?;

        let exchanged = self
            .endpoint
            .exchange_code(code, &verifier, &session.redirect_uri)
            .await;
        let now = self.clock.now();
        let (tokens, expires_at) = match exchanged.and_then(|tokens| with_expiry(tokens, now)) {
            Ok(issued) => issued,
            Err(err) => {
                warn!(integration = %integration.id, error = %err, "code exchange failed");
                self.stores
                    .integrations
                    .transition(
                        integration.id,
                        IntegrationTransition::Errored {
                            error: err.to_string(),
                        },
                    )
                    .await?;
                return Err(TokenError::Exchange(err));
            }
        };

        let update = self.encrypt_tokens(&tokens, expires_at)?;
        self.stores
            .credentials
            .upsert(integration.id, &self.config.provider, update)
            .await?;
        self.stores
            .integrations
            .transition(integration.id, IntegrationTransition::Connected { at: now })
            .await?;

        info!(integration = %integration.id, "integration connected");
        Ok(CallbackOutcome {
            project_id: session.project_id,
            return_url: session.return_url,
        })
    }

    /// A usable access token, refreshed first when it is inside the skew
    /// window.
    #[instrument(skip(self), fields(provider = %self.config.provider))]
    pub async fn get_access_token(&self, project_id: ProjectId) -> Result<String, TokenError> {
        let integration = self.connected_integration(project_id).await?;
        let credentials = self
            .stores
            .credentials
            .get(integration.id, &self.config.provider)
            .await?
            .ok_or_else(|| TokenError::CredentialsMissing(self.config.provider.clone()))?;
        if credentials.is_revoked() {
            return Err(TokenError::Revoked(self.config.provider.clone()));
        }

        let now = self.clock.now();
        if let Some(ciphertext) = &credentials.access_token_ciphertext {
            if !self.is_stale(credentials.expires_at, now) {
                return Ok(self.cipher.decrypt_str(ciphertext)?);
            }
            debug!(expires_at = ?credentials.expires_at, "access token inside skew window");
        }

        self.refresh_token(&integration, &credentials).await
    }

    /// Revoke stored credentials and return the integration to `disabled`.
    #[instrument(skip(self), fields(provider = %self.config.provider))]
    pub async fn disconnect(&self, project_id: ProjectId) -> Result<(), TokenError> {
        let Some(integration) = self
            .stores
            .integrations
            .get(project_id, &self.config.provider)
            .await?
        else {
            return Ok(());
        };

        self.stores
            .credentials
            .revoke(integration.id, &self.config.provider, self.clock.now())
            .await?;
        self.stores
            .integrations
            .transition(integration.id, IntegrationTransition::Disabled)
            .await?;

        info!(integration = %integration.id, "integration disconnected");
        Ok(())
    }

    async fn connected_integration(&self, project_id: ProjectId) -> Result<Integration, TokenError> {
        match self
            .stores
            .integrations
            .get(project_id, &self.config.provider)
            .await?
        {
            Some(integration) if integration.is_connected() => Ok(integration),
            _ => Err(TokenError::NotConnected {
                project_id,
                provider: self.config.provider.clone(),
            }),
        }
    }

    /// Expiry checks run on our own clock in epoch milliseconds. A token
    /// without a recorded expiry never goes stale.
    fn is_stale(&self, expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        let skew_ms = self.refresh.skew.as_millis() as i64;
        expires_at.is_some_and(|at| at.timestamp_millis() - skew_ms <= now.timestamp_millis())
    }

    async fn refresh_token(
        &self,
        integration: &Integration,
        credentials: &OAuthCredentials,
    ) -> Result<String, TokenError> {
        let Some(ciphertext) = &credentials.refresh_token_ciphertext else {
            let err = TokenError::RefreshTokenMissing(self.config.provider.clone());
            self.mark_expired(integration, err.to_string()).await?;
            return Err(err);
        };
        let refresh_token = self.cipher.decrypt_str(ciphertext)?;

        let max_attempts = self.refresh.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let received = self.endpoint.refresh(&refresh_token).await;
            let now = self.clock.now();
            match received.and_then(|tokens| with_expiry(tokens, now)) {
                Ok((tokens, expires_at)) => {
                    let mut update = self.encrypt_tokens(&tokens, expires_at)?;
                    update.last_refresh_at = Some(now);
                    self.stores
                        .credentials
                        .upsert(integration.id, &self.config.provider, update)
                        .await?;
                    info!(integration = %integration.id, attempt, "access token refreshed");
                    return Ok(tokens.access_token);
                }
                Err(err) if attempt >= max_attempts => {
                    warn!(integration = %integration.id, attempt, error = %err, "token refresh exhausted");
                    self.mark_expired(integration, err.to_string()).await?;
                    return Err(TokenError::RefreshFailed {
                        attempts: attempt,
                        source: err,
                    });
                }
                Err(err) => {
                    warn!(integration = %integration.id, attempt, error = %err, "token refresh failed, retrying");
                    tokio::time::sleep(self.refresh.delay_after(attempt)).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn mark_expired(&self, integration: &Integration, error: String) -> Result<(), TokenError> {
        self.stores
            .integrations
            .transition(
                integration.id,
                IntegrationTransition::Expired { error: Some(error) },
            )
            .await?;
        Ok(())
    }

    /// Token response -> coalescing update. A missing refresh token leaves
    /// the stored one in place; `revoked_at = None` un-revokes.
    fn encrypt_tokens(
        &self,
        tokens: &TokenResponse,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<CredentialsUpdate, TokenError> {
        Ok(CredentialsUpdate {
            access_token_ciphertext: Some(self.cipher.encrypt_str(&tokens.access_token)?),
            refresh_token_ciphertext: tokens
                .refresh_token
                .as_deref()
                .map(|t| self.cipher.encrypt_str(t))
                .transpose()?,
            expires_at,
            scopes: tokens.scope.clone(),
            token_type: tokens.token_type.clone(),
            last_refresh_at: None,
            revoked_at: None,
            key_version: Some(self.cipher.key_version()),
        })
    }
}

/// Resolve `expires_in` against our clock. Negative or unrepresentable
/// lifetimes are rejected as a malformed response.
fn with_expiry(
    tokens: TokenResponse,
    now: DateTime<Utc>,
) -> Result<(TokenResponse, Option<DateTime<Utc>>), OAuthClientError> {
    let Some(secs) = tokens.expires_in else {
        return Ok((tokens, None));
    };
    let expires_at = Duration::try_seconds(secs)
        .filter(|lifetime| *lifetime >= Duration::zero())
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .ok_or_else(|| OAuthClientError::Decode(format!("expires_in out of range: {secs}")))?;
    Ok((tokens, Some(expires_at)))
}

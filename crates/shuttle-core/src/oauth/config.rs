//! Provider registration and refresh tuning.

use std::time::Duration;

use url::Url;

use crate::domain::Provider;

/// Static registration of one OAuth provider (confidential or public client).
#[derive(Clone)]
pub struct OAuthProviderConfig {
    pub provider: Provider,
    pub client_id: String,
    /// `None` for public clients relying on PKCE alone.
    pub client_secret: Option<String>,
    pub authorize_url: Url,
    pub token_url: Url,
    pub scopes: Vec<String>,
}

impl OAuthProviderConfig {
    /// Space-separated `scope` parameter, if any scopes are configured.
    pub fn scope_param(&self) -> Option<String> {
        (!self.scopes.is_empty()).then(|| self.scopes.join(" "))
    }
}

impl std::fmt::Debug for OAuthProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthProviderConfig")
            .field("provider", &self.provider)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
            .field("authorize_url", &self.authorize_url.as_str())
            .field("token_url", &self.token_url.as_str())
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// When to refresh and how hard to try.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshPolicy {
    /// Tokens expiring within this window are treated as already stale.
    pub skew: Duration,
    pub max_attempts: u32,
    /// Delay before attempt `n + 1` is `base_delay * n` (linear).
    pub base_delay: Duration,
}

impl RefreshPolicy {
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            skew: Duration::from_secs(60),
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
        }
    }
}

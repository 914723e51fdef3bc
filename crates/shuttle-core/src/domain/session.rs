//! One-time OAuth authorization session (PKCE state).

use chrono::{DateTime, Duration, Utc};

use super::{ProjectId, Provider};

/// How long an authorization attempt stays redeemable.
pub const SESSION_TTL: Duration = Duration::minutes(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthSession {
    /// Random nonce echoed back by the provider; the primary key.
    pub state: String,
    pub project_id: ProjectId,
    pub provider: Provider,
    pub code_verifier_ciphertext: Vec<u8>,
    pub code_challenge: String,
    pub redirect_uri: String,
    pub return_url: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl OAuthSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.timestamp_millis() <= now.timestamp_millis()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    #[test]
    fn session_expires_at_ttl_boundary() {
        let now = Utc::now();
        let session = OAuthSession {
            state: "s".into(),
            project_id: ProjectId::from_ulid(Ulid::new()),
            provider: Provider::new("linear"),
            code_verifier_ciphertext: vec![1, 2, 3],
            code_challenge: "c".into(),
            redirect_uri: "https://app/cb".into(),
            return_url: None,
            expires_at: now + SESSION_TTL,
            created_at: now,
        };

        assert!(!session.is_expired(now));
        assert!(!session.is_expired(now + Duration::minutes(9)));
        assert!(session.is_expired(now + SESSION_TTL));
    }
}

//! Row types and their mapping onto domain values.

use chrono::{DateTime, Utc};
use shuttle_core::StoreError;
use shuttle_core::domain::{
    Integration, IntegrationId, IntegrationStatus, JobId, JobKind, OAuthCredentials,
    OAuthSession, ProjectId, Provider,
};
use shuttle_core::queue::{JobRecord, JobStatus};
use sqlx::FromRow;

fn corrupt(what: &str, detail: impl std::fmt::Display) -> StoreError {
    StoreError::Corrupt(format!("{what}: {detail}"))
}

fn parse_project(raw: &str) -> Result<ProjectId, StoreError> {
    ProjectId::parse(raw).map_err(|e| corrupt("project_id", e))
}

fn parse_integration(raw: &str) -> Result<IntegrationId, StoreError> {
    IntegrationId::parse(raw).map_err(|e| corrupt("integration_id", e))
}

fn to_u32(column: &str, value: i32) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|e| corrupt(column, e))
}

/// Column list shared by every statement that returns a job.
pub(crate) const JOB_COLUMNS: &str = "id, project_id, provider, kind, payload, status, attempts, \
     max_attempts, next_run_at, locked_at, locked_by, last_error, created_at, updated_at";

#[derive(Debug, FromRow)]
pub(crate) struct JobRow {
    pub id: i64,
    pub project_id: Option<String>,
    pub provider: String,
    pub kind: String,
    pub payload: serde_json::Value,
    pub status: String,
    pub attempts: i32,
    pub max_attempts: i32,
    pub next_run_at: DateTime<Utc>,
    pub locked_at: Option<DateTime<Utc>>,
    pub locked_by: Option<String>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<JobRow> for JobRecord {
    type Error = StoreError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        Ok(JobRecord {
            id: JobId::new(row.id),
            project_id: row.project_id.as_deref().map(parse_project).transpose()?,
            provider: Provider::new(row.provider),
            kind: JobKind::new(row.kind),
            payload: row.payload,
            status: row
                .status
                .parse::<JobStatus>()
                .map_err(|e| corrupt("jobs.status", e))?,
            attempts: to_u32("jobs.attempts", row.attempts)?,
            max_attempts: to_u32("jobs.max_attempts", row.max_attempts)?,
            next_run_at: row.next_run_at,
            locked_at: row.locked_at,
            locked_by: row.locked_by,
            last_error: row.last_error,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub(crate) const INTEGRATION_COLUMNS: &str =
    "id, project_id, provider, status, last_error, connected_at, created_at, updated_at";

#[derive(Debug, FromRow)]
pub(crate) struct IntegrationRow {
    pub id: String,
    pub project_id: String,
    pub provider: String,
    pub status: String,
    pub last_error: Option<String>,
    pub connected_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<IntegrationRow> for Integration {
    type Error = StoreError;

    fn try_from(row: IntegrationRow) -> Result<Self, Self::Error> {
        Ok(Integration {
            id: parse_integration(&row.id)?,
            project_id: parse_project(&row.project_id)?,
            provider: Provider::new(row.provider),
            status: row
                .status
                .parse::<IntegrationStatus>()
                .map_err(|e| corrupt("integrations.status", e))?,
            last_error: row.last_error,
            connected_at: row.connected_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub(crate) const CREDENTIAL_COLUMNS: &str = "integration_id, provider, access_token_ciphertext, \
     refresh_token_ciphertext, expires_at, scopes, token_type, last_refresh_at, revoked_at, \
     key_version, created_at, updated_at";

#[derive(FromRow)]
pub(crate) struct CredentialRow {
    pub integration_id: String,
    pub provider: String,
    pub access_token_ciphertext: Option<Vec<u8>>,
    pub refresh_token_ciphertext: Option<Vec<u8>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub scopes: Option<String>,
    pub token_type: Option<String>,
    pub last_refresh_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub key_version: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<CredentialRow> for OAuthCredentials {
    type Error = StoreError;

    fn try_from(row: CredentialRow) -> Result<Self, Self::Error> {
        Ok(OAuthCredentials {
            integration_id: parse_integration(&row.integration_id)?,
            provider: Provider::new(row.provider),
            access_token_ciphertext: row.access_token_ciphertext,
            refresh_token_ciphertext: row.refresh_token_ciphertext,
            expires_at: row.expires_at,
            scopes: row.scopes,
            token_type: row.token_type,
            last_refresh_at: row.last_refresh_at,
            revoked_at: row.revoked_at,
            key_version: row.key_version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub(crate) const SESSION_COLUMNS: &str = "state, project_id, provider, code_verifier_ciphertext, \
     code_challenge, redirect_uri, return_url, expires_at, created_at";

#[derive(FromRow)]
pub(crate) struct SessionRow {
    pub state: String,
    pub project_id: String,
    pub provider: String,
    pub code_verifier_ciphertext: Vec<u8>,
    pub code_challenge: String,
    pub redirect_uri: String,
    pub return_url: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<SessionRow> for OAuthSession {
    type Error = StoreError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        Ok(OAuthSession {
            state: row.state,
            project_id: parse_project(&row.project_id)?,
            provider: Provider::new(row.provider),
            code_verifier_ciphertext: row.code_verifier_ciphertext,
            code_challenge: row.code_challenge,
            redirect_uri: row.redirect_uri,
            return_url: row.return_url,
            expires_at: row.expires_at,
            created_at: row.created_at,
        })
    }
}

//! Domain model (ids, job routing, integrations, credentials, sessions).

pub mod credentials;
pub mod ids;
pub mod integration;
pub mod job;
pub mod session;

pub use credentials::{CredentialsUpdate, OAuthCredentials};
pub use ids::{IntegrationId, JobId, ProjectId};
pub use integration::{Integration, IntegrationStatus, IntegrationTransition};
pub use job::{DEFAULT_MAX_ATTEMPTS, JobKind, JobRoute, NewJob, Provider};
pub use session::{OAuthSession, SESSION_TTL};

//! shuttle-pg
//!
//! PostgreSQL implementations of the shuttle-core store ports (sqlx).
//! The reference schema lives in `migrations/`; applying it is left to the
//! deployment's migration tooling.
//!
//! 時刻は Clock から取得して bind します（`now()` は SQL 側で使いません）。

mod credentials;
mod integrations;
mod jobs;
mod projects;
mod schema;
mod sessions;

pub use credentials::PgCredentialStore;
pub use integrations::PgIntegrationStore;
pub use jobs::PgJobStore;
pub use projects::PgProjectSource;
pub use sessions::PgSessionStore;

use shuttle_core::StoreError;

pub(crate) fn db(err: sqlx::Error) -> StoreError {
    StoreError::backend(err)
}

/// Counters are `u32` in the domain and `INTEGER` in the schema.
pub(crate) fn to_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

//! Domain identifiers (strongly-typed IDs).
//!
//! Project と Integration の ID は ULID ベースの `Id<T>` で表現します。
//! `T` は PhantomData のマーカー型で、実行時のコストはありませんが、
//! ProjectId と IntegrationId をコンパイル時に区別できます。
//!
//! Job の ID だけは DB の bigserial が採番するため `JobId(i64)` です。
//! claim の順序 `(next_run_at, id)` はこの値に依存します。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;
use ulid::Ulid;

/// IdMarker は各 ID 型のマーカー trait
///
/// Display で使うプレフィックス（"project-", "integration-"）を提供します。
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// ジェネリック ID 型
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }

    /// Storage form: the bare 26-character ULID, without the display prefix.
    pub fn to_storage(&self) -> String {
        self.ulid.to_string()
    }

    /// Parse either the storage form or the prefixed display form.
    pub fn parse(s: &str) -> Result<Self, ulid::DecodeError> {
        let raw = s.strip_prefix(T::prefix()).unwrap_or(s);
        Ulid::from_string(raw).map(Self::from_ulid)
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> FromStr for Id<T> {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

// ========================================
// マーカー型の定義
// ========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Project {}

impl IdMarker for Project {
    fn prefix() -> &'static str {
        "project-"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Integration {}

impl IdMarker for Integration {
    fn prefix() -> &'static str {
        "integration-"
    }
}

/// Identifier of a project (owned by the management API, read here).
pub type ProjectId = Id<Project>;

/// Identifier of an integration row (one per project per provider).
pub type IntegrationId = Id<Integration>;

/// Database-allocated job identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(i64);

impl JobId {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_distinct_types() {
        let ulid = Ulid::new();
        let project = ProjectId::from_ulid(ulid);
        let integration = IntegrationId::from_ulid(ulid);

        assert!(project.to_string().starts_with("project-"));
        assert!(integration.to_string().starts_with("integration-"));
        // let _: ProjectId = integration; // <- does not compile
    }

    #[test]
    fn parse_accepts_storage_and_display_forms() {
        let id = ProjectId::from_ulid(Ulid::new());

        assert_eq!(ProjectId::parse(&id.to_storage()).unwrap(), id);
        assert_eq!(ProjectId::parse(&id.to_string()).unwrap(), id);
        assert!(ProjectId::parse("not-a-ulid").is_err());
    }

    #[test]
    fn serialized_id_is_the_bare_ulid() {
        let ulid = Ulid::new();
        let id = IntegrationId::from_ulid(ulid);

        let s = serde_json::to_string(&id).unwrap();
        assert_eq!(s, format!("\"{ulid}\""));
        let back: IntegrationId = serde_json::from_str(&s).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn job_ids_order_numerically() {
        assert!(JobId::new(2) < JobId::new(10));
        assert_eq!(JobId::new(7).to_string(), "job-7");
    }
}

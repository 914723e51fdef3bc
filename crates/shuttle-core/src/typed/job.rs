//! Job trait - 型付き Job の定義
//!
//! payload の struct と `(provider, kind)` のルートを型で結びつけます。

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::domain::{JobRoute, NewJob, ProjectId};

/// Job は payload 型とルートを対応付ける
///
/// # 使用例
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct ReconcileProject {
///     project_id: ProjectId,
/// }
///
/// impl Job for ReconcileProject {
///     const PROVIDER: &'static str = Provider::INTERNAL;
///     const KIND: &'static str = "reconcile.project";
/// }
/// ```
pub trait Job: Serialize + DeserializeOwned + Send + Sync + 'static {
    const PROVIDER: &'static str;
    const KIND: &'static str;

    fn route() -> JobRoute {
        JobRoute::new(Self::PROVIDER, Self::KIND)
    }

    /// Enqueue request for this payload, due immediately.
    fn to_new_job(&self, project_id: Option<ProjectId>) -> Result<NewJob, serde_json::Error> {
        let job = NewJob::new(Self::route(), serde_json::to_value(self)?);
        Ok(match project_id {
            Some(project_id) => job.for_project(project_id),
            None => job,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::Ping;
    use super::*;
    use ulid::Ulid;

    #[test]
    fn to_new_job_encodes_route_and_payload() {
        let project = ProjectId::from_ulid(Ulid::new());
        let job = Ping { value: 7 }.to_new_job(Some(project)).unwrap();

        assert_eq!(job.route(), Ping::route());
        assert_eq!(job.project_id, Some(project));
        assert_eq!(job.payload, serde_json::json!({ "value": 7 }));
        assert!(job.run_at.is_none());
    }
}

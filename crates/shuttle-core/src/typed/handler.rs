//! Handler trait - Job を実行する Handler の定義
//!
//! - `Handler<T>`: 型付き（payload を decode 済みで受け取る）
//! - `DynHandler`: object-safe（registry に格納する形）
//! - `TypedHandler<T, H>`: 型消去のアダプタ

use std::marker::PhantomData;

use anyhow::Context as _;
use async_trait::async_trait;

use super::job::Job;
use crate::domain::{JobId, ProjectId};

/// Per-execution metadata handed to every handler alongside its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobContext {
    pub job_id: JobId,
    pub project_id: Option<ProjectId>,
    /// 1 for the first execution, `attempts + 1` on retries.
    pub attempt: u32,
}

/// Handler は Job を実行する
///
/// 成功時の戻り値は捨てられます。`Err` のエラーチェーンが last_error になります。
#[async_trait]
pub trait Handler<T: Job>: Send + Sync {
    async fn handle(&self, job: T, ctx: JobContext) -> anyhow::Result<()>;
}

/// DynHandler は object-safe な Handler
///
/// 生の JSON payload を受け取るので、型を持たないルートにも直接登録できます。
#[async_trait]
pub trait DynHandler: Send + Sync {
    async fn handle_dyn(&self, payload: serde_json::Value, ctx: JobContext) -> anyhow::Result<()>;
}

pub struct TypedHandler<T: Job, H: Handler<T>> {
    handler: H,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Job, H: Handler<T>> TypedHandler<T, H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<T: Job, H: Handler<T>> DynHandler for TypedHandler<T, H> {
    async fn handle_dyn(&self, payload: serde_json::Value, ctx: JobContext) -> anyhow::Result<()> {
        let job: T = serde_json::from_value(payload)
            .with_context(|| format!("decode {} payload", T::route()))?;
        self.handler.handle(job, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typed::job::fixtures::Ping;
    use serde_json::json;

    struct EvenOnly;

    #[async_trait]
    impl Handler<Ping> for EvenOnly {
        async fn handle(&self, job: Ping, _ctx: JobContext) -> anyhow::Result<()> {
            anyhow::ensure!(job.value % 2 == 0, "odd value {}", job.value);
            Ok(())
        }
    }

    fn ctx() -> JobContext {
        JobContext {
            job_id: JobId::new(1),
            project_id: None,
            attempt: 1,
        }
    }

    #[tokio::test]
    async fn typed_handler_decodes_payload() {
        let handler = TypedHandler::<Ping, _>::new(EvenOnly);

        handler.handle_dyn(json!({ "value": 4 }), ctx()).await.unwrap();
        let err = handler.handle_dyn(json!({ "value": 3 }), ctx()).await.unwrap_err();
        assert_eq!(err.to_string(), "odd value 3");
    }

    #[tokio::test]
    async fn undecodable_payload_is_an_error() {
        let handler = TypedHandler::<Ping, _>::new(EvenOnly);

        let err = handler.handle_dyn(json!({ "nope": true }), ctx()).await.unwrap_err();
        assert!(format!("{err:#}").starts_with("decode internal/ping payload"));
    }
}

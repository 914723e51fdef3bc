//! TypedRegistry - Handler の登録と管理
//!
//! 起動時に組み立て（mutable）、実行時は `Arc` 越しに読むだけ（immutable）なので
//! ロックは不要です。

use std::collections::HashMap;
use std::sync::Arc;

use super::handler::{DynHandler, Handler, TypedHandler};
use super::job::Job;
use crate::domain::JobRoute;

/// TypedRegistry は `(provider, kind)` ごとに Handler を一つだけ持つ
///
/// # 使用例
/// ```ignore
/// let mut registry = TypedRegistry::new();
/// registry.register::<ReconcileProject, _>(ReconcileHandler)?;
///
/// let handler = registry.get(&ReconcileProject::route());
/// ```
#[derive(Default)]
pub struct TypedRegistry {
    handlers: HashMap<JobRoute, Arc<dyn DynHandler>>,
}

/// RegistryError は TypedRegistry の操作エラー
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("handler for route '{0}' is already registered")]
    AlreadyRegistered(JobRoute),
}

impl TypedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: Job, H: Handler<T> + 'static>(
        &mut self,
        handler: H,
    ) -> Result<(), RegistryError> {
        self.register_dyn(T::route(), Arc::new(TypedHandler::<T, H>::new(handler)))
    }

    /// Register an untyped handler against an explicit route.
    pub fn register_dyn(
        &mut self,
        route: JobRoute,
        handler: Arc<dyn DynHandler>,
    ) -> Result<(), RegistryError> {
        if self.handlers.contains_key(&route) {
            return Err(RegistryError::AlreadyRegistered(route));
        }
        self.handlers.insert(route, handler);
        Ok(())
    }

    pub fn get(&self, route: &JobRoute) -> Option<Arc<dyn DynHandler>> {
        self.handlers.get(route).cloned()
    }

    /// Registered routes, sorted.
    pub fn registered_routes(&self) -> Vec<JobRoute> {
        let mut routes: Vec<JobRoute> = self.handlers.keys().cloned().collect();
        routes.sort();
        routes
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

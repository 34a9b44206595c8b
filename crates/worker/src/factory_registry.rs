use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::{CreatedWorker, WorkerError, WorkerFactory, WorkerIdentity, WorkerResult};

/// Worker类型到工厂的注册表
///
/// 启动时填充，之后只读。同一类型重复注册时保留第一次注册的工厂。
pub struct WorkerFactoryRegistry {
    factories: Arc<RwLock<HashMap<String, Arc<dyn WorkerFactory>>>>,
}

impl WorkerFactoryRegistry {
    pub fn new() -> Self {
        Self {
            factories: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// 注册工厂，返回本次调用是否生效
    pub async fn register(
        &self,
        worker_type: impl Into<String>,
        factory: Arc<dyn WorkerFactory>,
    ) -> bool {
        let worker_type = worker_type.into();
        let mut factories = self.factories.write().await;
        if factories.contains_key(&worker_type) {
            warn!(worker_type = %worker_type, "Worker类型已注册，忽略重复注册");
            return false;
        }
        debug!(worker_type = %worker_type, "注册Worker工厂");
        factories.insert(worker_type, factory);
        true
    }

    pub async fn resolve(&self, worker_type: &str) -> Option<Arc<dyn WorkerFactory>> {
        self.factories.read().await.get(worker_type).cloned()
    }

    pub async fn contains(&self, worker_type: &str) -> bool {
        self.factories.read().await.contains_key(worker_type)
    }

    /// 已注册的类型，按名称排序
    pub async fn types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.factories.read().await.keys().cloned().collect();
        types.sort();
        types
    }

    /// 用新生成的标识构造指定类型的Worker
    pub async fn create(&self, worker_type: &str) -> WorkerResult<CreatedWorker> {
        let factory = self
            .resolve(worker_type)
            .await
            .ok_or_else(|| WorkerError::UnknownImplementation(worker_type.to_string()))?;

        let identity = WorkerIdentity::generate(worker_type);
        let worker = factory.create(identity.clone())?;
        if worker.identity() != &identity {
            return Err(WorkerError::Instantiation(format!(
                "factory for '{}' returned a worker with identity {:?}",
                worker_type,
                worker.identity()
            )));
        }

        Ok(CreatedWorker::new(identity, worker))
    }
}

impl Default for WorkerFactoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

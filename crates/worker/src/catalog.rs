use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::info;

use crate::{
    IdleWorker, Worker, WorkerError, WorkerFactory, WorkerFactoryRegistry, WorkerIdentity,
    WorkerResult,
};

/// 进程内可用的Worker实现，按配置文件中使用的实现名称索引
#[derive(Clone, Default)]
pub struct WorkerCatalog {
    implementations: HashMap<String, Arc<dyn WorkerFactory>>,
}

impl WorkerCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置内建`idle` Worker的实现目录
    pub fn with_builtins() -> Self {
        let mut catalog = Self::new();
        catalog.add(
            IdleWorker::IMPLEMENTATION,
            Arc::new(|identity: WorkerIdentity| -> WorkerResult<Box<dyn Worker>> {
                Ok(Box::new(IdleWorker::new(identity)))
            }),
        );
        catalog
    }

    /// 添加实现，同名时覆盖
    pub fn add(&mut self, implementation: impl Into<String>, factory: Arc<dyn WorkerFactory>) {
        self.implementations.insert(implementation.into(), factory);
    }

    pub fn get(&self, implementation: &str) -> Option<Arc<dyn WorkerFactory>> {
        self.implementations.get(implementation).cloned()
    }

    pub fn implementations(&self) -> Vec<String> {
        let mut names: Vec<String> = self.implementations.keys().cloned().collect();
        names.sort();
        names
    }

    /// 根据`Worker类型 -> 实现名称`表构建工厂注册表
    ///
    /// 遇到第一个未知的实现名称时失败
    pub async fn build_registry(
        &self,
        workers: &BTreeMap<String, String>,
    ) -> WorkerResult<WorkerFactoryRegistry> {
        let registry = WorkerFactoryRegistry::new();
        for (worker_type, implementation) in workers {
            let factory = self
                .get(implementation)
                .ok_or_else(|| WorkerError::UnknownImplementation(implementation.clone()))?;
            registry.register(worker_type.clone(), factory).await;
            info!(
                worker_type = %worker_type,
                implementation = %implementation,
                "Worker类型已注册"
            );
        }
        Ok(registry)
    }
}

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::WorkerInstance;

/// 实例ID到运行实例的并发安全映射
#[derive(Clone, Default)]
pub struct RunningWorkerRegistry {
    workers: Arc<RwLock<HashMap<String, Arc<WorkerInstance>>>>,
}

impl RunningWorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 不存在时插入实例；ID已存在时不做修改并返回已有实例
    pub async fn put(
        &self,
        id: impl Into<String>,
        instance: Arc<WorkerInstance>,
    ) -> Result<(), Arc<WorkerInstance>> {
        let mut workers = self.workers.write().await;
        match workers.entry(id.into()) {
            std::collections::hash_map::Entry::Occupied(existing) => Err(existing.get().clone()),
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(instance);
                Ok(())
            }
        }
    }

    pub async fn get(&self, id: &str) -> Option<Arc<WorkerInstance>> {
        self.workers.read().await.get(id).cloned()
    }

    pub async fn remove(&self, id: &str) -> Option<Arc<WorkerInstance>> {
        self.workers.write().await.remove(id)
    }

    pub async fn len(&self) -> usize {
        self.workers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.workers.read().await.is_empty()
    }

    pub async fn ids(&self) -> Vec<String> {
        self.workers.read().await.keys().cloned().collect()
    }

    /// 取出全部实例并清空注册表
    pub async fn drain(&self) -> Vec<Arc<WorkerInstance>> {
        self.workers
            .write()
            .await
            .drain()
            .map(|(_, instance)| instance)
            .collect()
    }
}

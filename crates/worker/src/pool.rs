use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::WorkerInstance;

/// 所有上下文共享的Worker执行池
///
/// 不设上限时每个Worker立即在独立任务中运行；设置上限后，
/// 超出的Worker在获得许可之前等待，提交本身不会阻塞。
#[derive(Clone)]
pub struct ExecutionPool {
    permits: Option<Arc<Semaphore>>,
    limit: Option<usize>,
    active: Arc<AtomicUsize>,
}

impl ExecutionPool {
    pub fn unbounded() -> Self {
        Self {
            permits: None,
            limit: None,
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn bounded(max_workers: usize) -> Self {
        Self {
            permits: Some(Arc::new(Semaphore::new(max_workers))),
            limit: Some(max_workers),
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// `None`表示不设上限
    pub fn with_limit(limit: Option<usize>) -> Self {
        match limit {
            Some(max_workers) if max_workers > 0 => Self::bounded(max_workers),
            _ => Self::unbounded(),
        }
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// 正在执行运行循环的Worker数量
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// 提交Worker到执行池
    pub fn submit(&self, instance: Arc<WorkerInstance>) -> JoinHandle<()> {
        let permits = self.permits.clone();
        let active = self.active.clone();

        tokio::spawn(async move {
            let _permit = match permits {
                Some(semaphore) => match semaphore.acquire_owned().await {
                    Ok(permit) => Some(permit),
                    Err(_) => {
                        error!(worker_id = %instance.id(), "执行池已关闭");
                        return;
                    }
                },
                None => None,
            };

            active.fetch_add(1, Ordering::SeqCst);
            if let Err(e) = instance.run().await {
                debug!(worker_id = %instance.id(), error = %e, "Worker运行循环返回错误");
            }
            active.fetch_sub(1, Ordering::SeqCst);
        })
    }
}

impl Default for ExecutionPool {
    fn default() -> Self {
        Self::unbounded()
    }
}

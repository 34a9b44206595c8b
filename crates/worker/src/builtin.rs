//! 内置Worker实现

use async_trait::async_trait;
use loadctl_core::ConfigurationOptions;
use tokio::sync::watch;
use tracing::debug;

use crate::{Worker, WorkerIdentity, WorkerResult, WorkerStatistics};

/// 一直等待直到被停止的Worker，不产生统计数据
pub struct IdleWorker {
    identity: WorkerIdentity,
    stop_tx: watch::Sender<bool>,
}

impl IdleWorker {
    pub const IMPLEMENTATION: &'static str = "idle";

    pub fn new(identity: WorkerIdentity) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self { identity, stop_tx }
    }
}

#[async_trait]
impl Worker for IdleWorker {
    fn identity(&self) -> &WorkerIdentity {
        &self.identity
    }

    async fn initialize(&mut self, options: &ConfigurationOptions) -> WorkerResult<()> {
        debug!(
            worker_id = %self.identity.id,
            options = options.len(),
            "Idle worker initialized"
        );
        Ok(())
    }

    async fn run(&self) -> WorkerResult<()> {
        let mut stop_rx = self.stop_tx.subscribe();
        // 发送端与self同生命周期，wait_for只会因停止信号返回
        let _ = stop_rx.wait_for(|stopped| *stopped).await;
        Ok(())
    }

    async fn statistics(&self) -> Option<WorkerStatistics> {
        None
    }

    async fn shutdown(&self) -> WorkerResult<()> {
        self.stop_tx.send_replace(true);
        Ok(())
    }
}

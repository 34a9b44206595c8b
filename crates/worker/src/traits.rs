use async_trait::async_trait;
use loadctl_core::ConfigurationOptions;

use crate::{WorkerIdentity, WorkerResult};

/// Worker自行定义的统计数据
pub type WorkerStatistics = serde_json::Map<String, serde_json::Value>;

/// 可插拔Worker的能力契约
///
/// 调度器只通过该契约与Worker交互：
/// - `initialize` 在进入注册表之前调用一次，失败的实例会被丢弃
/// - `run` 在执行池中运行，直到Worker自然结束或被`shutdown`通知停止
/// - `shutdown` 是唯一的取消方式，需要可重复调用
#[async_trait]
pub trait Worker: Send + Sync {
    fn identity(&self) -> &WorkerIdentity;

    async fn initialize(&mut self, options: &ConfigurationOptions) -> WorkerResult<()>;

    async fn run(&self) -> WorkerResult<()>;

    /// 没有统计数据时返回None
    async fn statistics(&self) -> Option<WorkerStatistics>;

    async fn shutdown(&self) -> WorkerResult<()>;
}

/// 根据生成的标识构造Worker
pub trait WorkerFactory: Send + Sync {
    fn create(&self, identity: WorkerIdentity) -> WorkerResult<Box<dyn Worker>>;
}

impl<F> WorkerFactory for F
where
    F: Fn(WorkerIdentity) -> WorkerResult<Box<dyn Worker>> + Send + Sync,
{
    fn create(&self, identity: WorkerIdentity) -> WorkerResult<Box<dyn Worker>> {
        self(identity)
    }
}

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use loadctl_core::ConfigurationOptions;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{Worker, WorkerError, WorkerResult, WorkerStatistics};

/// Worker实例标识
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkerIdentity {
    pub id: String,
    pub worker_type: String,
}

impl WorkerIdentity {
    pub fn new(id: impl Into<String>, worker_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            worker_type: worker_type.into(),
        }
    }

    /// 为指定类型生成一个进程内唯一的标识
    pub fn generate(worker_type: impl Into<String>) -> Self {
        Self::new(Uuid::new_v4().to_string(), worker_type)
    }
}

/// Worker生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerState {
    Created,
    Initialized,
    Running,
    Stopped,
    Failed,
}

impl WorkerState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkerState::Stopped | WorkerState::Failed)
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerState::Created => "CREATED",
            WorkerState::Initialized => "INITIALIZED",
            WorkerState::Running => "RUNNING",
            WorkerState::Stopped => "STOPPED",
            WorkerState::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// 由工厂构造、尚未初始化的Worker
///
/// 只有初始化成功后才会得到[`WorkerInstance`]，初始化失败的Worker直接丢弃。
pub struct CreatedWorker {
    identity: WorkerIdentity,
    worker: Box<dyn Worker>,
}

impl CreatedWorker {
    pub fn new(identity: WorkerIdentity, worker: Box<dyn Worker>) -> Self {
        Self { identity, worker }
    }

    pub fn identity(&self) -> &WorkerIdentity {
        &self.identity
    }

    pub fn state(&self) -> WorkerState {
        WorkerState::Created
    }

    /// 在超时限制内初始化Worker
    pub async fn initialize(
        mut self,
        options: &ConfigurationOptions,
        timeout: Duration,
    ) -> WorkerResult<WorkerInstance> {
        match tokio::time::timeout(timeout, self.worker.initialize(options)).await {
            Ok(Ok(())) => {
                debug!(
                    worker_id = %self.identity.id,
                    worker_type = %self.identity.worker_type,
                    "Worker初始化完成"
                );
                Ok(WorkerInstance::new(self.identity, self.worker))
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(WorkerError::Timeout {
                operation: "initialize",
                timeout,
            }),
        }
    }
}

impl fmt::Debug for CreatedWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreatedWorker")
            .field("identity", &self.identity)
            .finish()
    }
}

#[derive(Debug)]
struct Lifecycle {
    state: WorkerState,
    last_error: Option<String>,
}

/// 已初始化的Worker实例
pub struct WorkerInstance {
    identity: WorkerIdentity,
    worker: Box<dyn Worker>,
    lifecycle: RwLock<Lifecycle>,
    started_at: DateTime<Utc>,
}

/// 实例状态快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerSnapshot {
    pub id: String,
    pub worker_type: String,
    pub state: WorkerState,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl WorkerInstance {
    fn new(identity: WorkerIdentity, worker: Box<dyn Worker>) -> Self {
        Self {
            identity,
            worker,
            lifecycle: RwLock::new(Lifecycle {
                state: WorkerState::Initialized,
                last_error: None,
            }),
            started_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.identity.id
    }

    pub fn worker_type(&self) -> &str {
        &self.identity.worker_type
    }

    pub fn identity(&self) -> &WorkerIdentity {
        &self.identity
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub async fn state(&self) -> WorkerState {
        self.lifecycle.read().await.state
    }

    pub async fn last_error(&self) -> Option<String> {
        self.lifecycle.read().await.last_error.clone()
    }

    /// 执行Worker的运行循环，由执行池调用
    ///
    /// 执行池轮到该实例之前已被停止时直接跳过运行循环。
    pub async fn run(&self) -> WorkerResult<()> {
        {
            let mut lifecycle = self.lifecycle.write().await;
            match lifecycle.state {
                WorkerState::Initialized => lifecycle.state = WorkerState::Running,
                state if state.is_terminal() => {
                    debug!(worker_id = %self.identity.id, %state, "Worker已停止，跳过运行");
                    return Ok(());
                }
                state => {
                    return Err(WorkerError::InvalidState {
                        id: self.identity.id.clone(),
                        operation: "run",
                        state,
                    })
                }
            }
        }

        info!(
            worker_id = %self.identity.id,
            worker_type = %self.identity.worker_type,
            "Worker开始运行"
        );
        let result = self.worker.run().await;

        let mut lifecycle = self.lifecycle.write().await;
        match &result {
            Ok(()) => {
                if lifecycle.state == WorkerState::Running {
                    lifecycle.state = WorkerState::Stopped;
                }
                info!(worker_id = %self.identity.id, "Worker运行结束");
            }
            Err(e) => {
                if lifecycle.state != WorkerState::Stopped {
                    lifecycle.state = WorkerState::Failed;
                    lifecycle.last_error = Some(e.to_string());
                }
                warn!(worker_id = %self.identity.id, error = %e, "Worker运行失败");
            }
        }
        result
    }

    /// 在超时限制内停止Worker
    ///
    /// 已处于`Stopped`状态的实例直接返回成功。
    pub async fn shutdown(&self, timeout: Duration) -> WorkerResult<()> {
        if self.state().await == WorkerState::Stopped {
            return Ok(());
        }

        let result = match tokio::time::timeout(timeout, self.worker.shutdown()).await {
            Ok(result) => result,
            Err(_) => Err(WorkerError::Timeout {
                operation: "shutdown",
                timeout,
            }),
        };

        let mut lifecycle = self.lifecycle.write().await;
        match &result {
            Ok(()) => {
                lifecycle.state = WorkerState::Stopped;
                info!(worker_id = %self.identity.id, "Worker已停止");
            }
            Err(e) => {
                lifecycle.state = WorkerState::Failed;
                lifecycle.last_error = Some(e.to_string());
                warn!(worker_id = %self.identity.id, error = %e, "Worker停止失败");
            }
        }
        result
    }

    pub async fn statistics(&self) -> Option<WorkerStatistics> {
        self.worker.statistics().await
    }

    pub async fn snapshot(&self) -> WorkerSnapshot {
        let lifecycle = self.lifecycle.read().await;
        WorkerSnapshot {
            id: self.identity.id.clone(),
            worker_type: self.identity.worker_type.clone(),
            state: lifecycle.state,
            started_at: self.started_at,
            last_error: lifecycle.last_error.clone(),
        }
    }
}

impl fmt::Debug for WorkerInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerInstance")
            .field("identity", &self.identity)
            .field("started_at", &self.started_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mockall::mock;

    mock! {
        pub TestWorker {}

        #[async_trait]
        impl Worker for TestWorker {
            fn identity(&self) -> &WorkerIdentity;
            async fn initialize(&mut self, options: &ConfigurationOptions) -> WorkerResult<()>;
            async fn run(&self) -> WorkerResult<()>;
            async fn statistics(&self) -> Option<WorkerStatistics>;
            async fn shutdown(&self) -> WorkerResult<()>;
        }
    }

    fn identity() -> WorkerIdentity {
        WorkerIdentity::new("worker-1", "jms")
    }

    async fn initialized(mock: MockTestWorker) -> WorkerInstance {
        CreatedWorker::new(identity(), Box::new(mock))
            .initialize(&ConfigurationOptions::new(), Duration::from_secs(1))
            .await
            .unwrap()
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let first = WorkerIdentity::generate("jms");
        let second = WorkerIdentity::generate("jms");
        assert_ne!(first.id, second.id);
        assert_eq!(first.worker_type, "jms");
    }

    #[test]
    fn test_state_display() {
        assert_eq!(WorkerState::Running.to_string(), "RUNNING");
        assert!(WorkerState::Failed.is_terminal());
        assert!(!WorkerState::Initialized.is_terminal());
    }

    #[tokio::test]
    async fn test_initialize_passes_options() {
        let mut mock = MockTestWorker::new();
        mock.expect_initialize()
            .withf(|options| options.first("jms.queue") == Some("orders"))
            .times(1)
            .returning(|_| Ok(()));

        let mut options = ConfigurationOptions::new();
        options.append("jms.queue", "orders");

        let created = CreatedWorker::new(identity(), Box::new(mock));
        assert_eq!(created.state(), WorkerState::Created);

        let instance = created
            .initialize(&options, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(instance.id(), "worker-1");
        assert_eq!(instance.worker_type(), "jms");
        assert_eq!(instance.state().await, WorkerState::Initialized);
    }

    #[tokio::test]
    async fn test_initialize_failure_discards_worker() {
        let mut mock = MockTestWorker::new();
        mock.expect_initialize()
            .returning(|_| Err(WorkerError::Initialization("broker unreachable".to_string())));

        let result = CreatedWorker::new(identity(), Box::new(mock))
            .initialize(&ConfigurationOptions::new(), Duration::from_secs(1))
            .await;

        assert_eq!(
            result.unwrap_err(),
            WorkerError::Initialization("broker unreachable".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialize_timeout() {
        struct SlowWorker(WorkerIdentity);

        #[async_trait]
        impl Worker for SlowWorker {
            fn identity(&self) -> &WorkerIdentity {
                &self.0
            }
            async fn initialize(&mut self, _: &ConfigurationOptions) -> WorkerResult<()> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            }
            async fn run(&self) -> WorkerResult<()> {
                Ok(())
            }
            async fn statistics(&self) -> Option<WorkerStatistics> {
                None
            }
            async fn shutdown(&self) -> WorkerResult<()> {
                Ok(())
            }
        }

        let result = CreatedWorker::new(identity(), Box::new(SlowWorker(identity())))
            .initialize(&ConfigurationOptions::new(), Duration::from_secs(5))
            .await;

        assert!(matches!(
            result,
            Err(WorkerError::Timeout {
                operation: "initialize",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_run_to_completion_stops_worker() {
        let mut mock = MockTestWorker::new();
        mock.expect_initialize().returning(|_| Ok(()));
        mock.expect_run().times(1).returning(|| Ok(()));

        let instance = initialized(mock).await;
        instance.run().await.unwrap();

        assert_eq!(instance.state().await, WorkerState::Stopped);
    }

    #[tokio::test]
    async fn test_run_failure_marks_failed() {
        let mut mock = MockTestWorker::new();
        mock.expect_initialize().returning(|_| Ok(()));
        mock.expect_run()
            .returning(|| Err(WorkerError::Execution("connection lost".to_string())));

        let instance = initialized(mock).await;
        assert!(instance.run().await.is_err());

        let snapshot = instance.snapshot().await;
        assert_eq!(snapshot.state, WorkerState::Failed);
        assert_eq!(
            snapshot.last_error.as_deref(),
            Some("run loop failed: connection lost")
        );
    }

    #[tokio::test]
    async fn test_run_skipped_after_stop() {
        let mut mock = MockTestWorker::new();
        mock.expect_initialize().returning(|_| Ok(()));
        mock.expect_shutdown().times(1).returning(|| Ok(()));
        mock.expect_run().never();

        let instance = initialized(mock).await;
        instance.shutdown(Duration::from_secs(1)).await.unwrap();
        instance.run().await.unwrap();

        assert_eq!(instance.state().await, WorkerState::Stopped);
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent_once_stopped() {
        let mut mock = MockTestWorker::new();
        mock.expect_initialize().returning(|_| Ok(()));
        mock.expect_shutdown().times(1).returning(|| Ok(()));

        let instance = initialized(mock).await;
        instance.shutdown(Duration::from_secs(1)).await.unwrap();
        instance.shutdown(Duration::from_secs(1)).await.unwrap();

        assert_eq!(instance.state().await, WorkerState::Stopped);
    }

    #[tokio::test]
    async fn test_shutdown_failure_marks_failed() {
        let mut mock = MockTestWorker::new();
        mock.expect_initialize().returning(|_| Ok(()));
        mock.expect_shutdown()
            .returning(|| Err(WorkerError::Shutdown("session busy".to_string())));

        let instance = initialized(mock).await;
        let error = instance.shutdown(Duration::from_secs(1)).await.unwrap_err();

        assert_eq!(error.to_string(), "shutdown failed: session busy");
        assert_eq!(instance.state().await, WorkerState::Failed);
        assert_eq!(
            instance.last_error().await.as_deref(),
            Some("shutdown failed: session busy")
        );
    }

    #[tokio::test]
    async fn test_statistics_delegates_to_worker() {
        let mut mock = MockTestWorker::new();
        mock.expect_initialize().returning(|_| Ok(()));
        mock.expect_statistics().returning(|| {
            let mut stats = WorkerStatistics::new();
            stats.insert("messages".to_string(), serde_json::json!(42));
            Some(stats)
        });

        let instance = initialized(mock).await;
        let stats = instance.statistics().await.unwrap();

        assert_eq!(stats.get("messages"), Some(&serde_json::json!(42)));
    }
}

//! 控制上下文
//!
//! 每个上下文拥有自己的Worker工厂注册表和运行实例注册表，执行池在所有上下文之间共享。
//! 单个请求的处理流程：
//! 1. 按优先级检测操作码
//! 2. 提取操作数
//! 3. 执行start/stop/collectStats并收集结果与错误
//! 4. 返回响应文档（始终返回，不会中途失败）

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use loadctl_core::{ConfigurationOptions, ContextConfig, LifecycleConfig, OpCodeConfig};
use loadctl_worker::{
    ExecutionPool, RunningWorkerRegistry, WorkerCatalog, WorkerError, WorkerFactoryRegistry,
    WorkerInstance, WorkerResult,
};
use metrics::{counter, gauge};
use tracing::{debug, info, warn};

use crate::request::{ControlRequest, OpCode};
use crate::response::{ConsumerStats, ResponseDocument, StartedWorker, StopRecord};
use crate::ControlError;

/// 负责某个路径前缀的请求处理器
#[async_trait]
pub trait ContextHandler: Send + Sync {
    fn name(&self) -> &str;

    async fn handle(&self, request: &ControlRequest) -> ResponseDocument;

    /// 进程退出时停止该上下文中的全部Worker
    async fn shutdown(&self);
}

/// 管理一组Worker生命周期的控制上下文
pub struct ConsumerContext {
    name: String,
    op_codes: OpCodeConfig,
    static_options: ConfigurationOptions,
    factories: Arc<WorkerFactoryRegistry>,
    running: RunningWorkerRegistry,
    pool: ExecutionPool,
    lifecycle: LifecycleConfig,
}

impl ConsumerContext {
    pub fn builder(name: impl Into<String>) -> ConsumerContextBuilder {
        ConsumerContextBuilder::new(name)
    }

    /// 根据上下文配置构建，未知的Worker实现名称会导致失败
    pub async fn from_config(
        config: &ContextConfig,
        catalog: &WorkerCatalog,
        pool: ExecutionPool,
        lifecycle: LifecycleConfig,
    ) -> WorkerResult<Self> {
        let factories = catalog.build_registry(&config.workers).await?;
        Ok(Self::builder(config.name.clone())
            .op_codes(config.op_codes.clone())
            .options(config.options.clone())
            .factories(factories)
            .pool(pool)
            .lifecycle(lifecycle)
            .build())
    }

    pub fn running(&self) -> &RunningWorkerRegistry {
        &self.running
    }

    pub fn factories(&self) -> &WorkerFactoryRegistry {
        &self.factories
    }

    /// 依次启动每个类型的Worker，单个类型失败不影响其他类型
    pub async fn start(
        &self,
        worker_types: &[String],
        parameters: &ConfigurationOptions,
    ) -> ResponseDocument {
        let options = self.static_options.merged_with(parameters);
        let mut started = Vec::with_capacity(worker_types.len());
        let mut errors = Vec::new();

        for worker_type in worker_types {
            match self.start_one(worker_type, &options).await {
                Ok(record) => {
                    counter!("loadctl_workers_started_total", "context" => self.name.clone())
                        .increment(1);
                    started.push(record);
                }
                Err(e) => {
                    warn!(context = %self.name, worker_type = %worker_type, error = %e, "启动Worker失败");
                    counter!("loadctl_workers_failed_total", "context" => self.name.clone())
                        .increment(1);
                    errors.push(e.to_entry());
                }
            }
        }

        self.update_registered_gauge().await;
        ResponseDocument::started(started, errors)
    }

    async fn start_one(
        &self,
        worker_type: &str,
        options: &ConfigurationOptions,
    ) -> Result<StartedWorker, ControlError> {
        let instantiation_failure = |e: WorkerError| ControlError::InstantiationFailure {
            worker_type: worker_type.to_string(),
            reason: e.to_string(),
        };

        if worker_type.is_empty() {
            return Err(ControlError::UnregisteredType(String::new()));
        }

        let created = match self.factories.create(worker_type).await {
            Ok(created) => created,
            Err(WorkerError::UnknownImplementation(_)) => {
                return Err(ControlError::UnregisteredType(worker_type.to_string()))
            }
            Err(e) => return Err(instantiation_failure(e)),
        };

        let instance = created
            .initialize(options, self.lifecycle.initialize_timeout())
            .await
            .map_err(instantiation_failure)?;
        let instance = Arc::new(instance);
        let id = instance.id().to_string();

        if self.running.put(id.clone(), instance.clone()).await.is_err() {
            // 已有同ID实例，丢弃新实例
            if let Err(e) = instance.shutdown(self.lifecycle.shutdown_timeout()).await {
                warn!(context = %self.name, worker_id = %id, error = %e, "停止重复ID的Worker失败");
            }
            return Err(instantiation_failure(WorkerError::Instantiation(format!(
                "duplicate consumer id {id}"
            ))));
        }

        self.pool.submit(instance);
        info!(context = %self.name, worker_id = %id, worker_type = %worker_type, "Worker已启动");

        Ok(StartedWorker {
            id,
            worker_type: worker_type.to_string(),
        })
    }

    /// 停止指定的Worker，每个ID对应一条结果
    pub async fn stop(&self, ids: &[String]) -> ResponseDocument {
        let mut records = Vec::with_capacity(ids.len());

        for id in ids {
            let Some(instance) = self.running.get(id).await else {
                debug!(context = %self.name, worker_id = %id, "停止请求的Worker不存在");
                records.push(StopRecord::unknown(id.clone()));
                continue;
            };

            match instance.shutdown(self.lifecycle.shutdown_timeout()).await {
                Ok(()) => {
                    if !self.lifecycle.retain_stopped_workers {
                        self.running.remove(id).await;
                    }
                    counter!("loadctl_workers_stopped_total", "context" => self.name.clone())
                        .increment(1);
                    records.push(StopRecord::success(id.clone()));
                }
                Err(e) => {
                    counter!("loadctl_workers_failed_total", "context" => self.name.clone())
                        .increment(1);
                    records.push(StopRecord::failed(id.clone(), e.to_string()));
                }
            }
        }

        self.update_registered_gauge().await;
        ResponseDocument::stopped(records)
    }

    /// 收集统计数据，任一ID不存在时整个请求失败
    pub async fn collect_stats(&self, ids: &[String]) -> ResponseDocument {
        let mut instances = Vec::with_capacity(ids.len());
        for id in ids {
            match self.running.get(id).await {
                Some(instance) => instances.push(instance),
                None => {
                    let error = ControlError::UnknownInstanceId(id.clone());
                    warn!(context = %self.name, error = %error, "收集统计数据失败");
                    return ResponseDocument::from_error(error.to_entry());
                }
            }
        }

        let mut stats = Vec::with_capacity(instances.len());
        for instance in instances {
            stats.push(consumer_stats(&instance).await);
        }
        ResponseDocument::statistics(stats)
    }

    async fn update_registered_gauge(&self) {
        gauge!("loadctl_workers_registered", "context" => self.name.clone())
            .set(self.running.len().await as f64);
    }
}

async fn consumer_stats(instance: &WorkerInstance) -> ConsumerStats {
    ConsumerStats {
        consumer_id: instance.id().to_string(),
        id: instance.id().to_string(),
        worker_type: instance.worker_type().to_string(),
        state: instance.state().await,
        stats: instance.statistics().await,
    }
}

#[async_trait]
impl ContextHandler for ConsumerContext {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, request: &ControlRequest) -> ResponseDocument {
        let Some(op) = request.op_code(&self.op_codes) else {
            debug!(context = %self.name, path = %request.path, "请求中没有有效的操作码");
            return ResponseDocument::from_error(ControlError::UnknownOpCode.to_entry());
        };
        debug!(context = %self.name, op = ?op, "处理控制请求");

        let operands = match request.operands(op, &self.op_codes) {
            Ok(operands) => operands,
            Err(e) => return ResponseDocument::from_error(e.to_entry()),
        };

        match op {
            OpCode::Start => self.start(&operands, &request.parameters).await,
            OpCode::Stop => self.stop(&operands).await,
            OpCode::CollectStats => self.collect_stats(&operands).await,
        }
    }

    async fn shutdown(&self) {
        let instances = self.running.drain().await;
        if instances.is_empty() {
            return;
        }
        info!(context = %self.name, count = instances.len(), "停止上下文中的全部Worker");

        let timeout = self.lifecycle.shutdown_timeout();
        let results = join_all(instances.iter().map(|instance| instance.shutdown(timeout))).await;
        for (instance, result) in instances.iter().zip(results) {
            if let Err(e) = result {
                warn!(context = %self.name, worker_id = %instance.id(), error = %e, "停止Worker失败");
            }
        }
        self.update_registered_gauge().await;
    }
}

/// [`ConsumerContext`]构建器
pub struct ConsumerContextBuilder {
    name: String,
    op_codes: OpCodeConfig,
    static_options: ConfigurationOptions,
    factories: WorkerFactoryRegistry,
    pool: ExecutionPool,
    lifecycle: LifecycleConfig,
}

impl ConsumerContextBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            op_codes: OpCodeConfig::default(),
            static_options: ConfigurationOptions::new(),
            factories: WorkerFactoryRegistry::new(),
            pool: ExecutionPool::unbounded(),
            lifecycle: LifecycleConfig::default(),
        }
    }

    pub fn op_codes(mut self, op_codes: OpCodeConfig) -> Self {
        self.op_codes = op_codes;
        self
    }

    pub fn options(mut self, options: ConfigurationOptions) -> Self {
        self.static_options = options;
        self
    }

    pub fn factories(mut self, factories: WorkerFactoryRegistry) -> Self {
        self.factories = factories;
        self
    }

    pub fn pool(mut self, pool: ExecutionPool) -> Self {
        self.pool = pool;
        self
    }

    pub fn lifecycle(mut self, lifecycle: LifecycleConfig) -> Self {
        self.lifecycle = lifecycle;
        self
    }

    pub fn build(self) -> ConsumerContext {
        ConsumerContext {
            name: self.name,
            op_codes: self.op_codes,
            static_options: self.static_options,
            factories: Arc::new(self.factories),
            running: RunningWorkerRegistry::new(),
            pool: self.pool,
            lifecycle: self.lifecycle,
        }
    }
}

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use loadctl_api::{create_app, ContextRouter, ContextTable};
use loadctl_core::AppConfig;
use loadctl_dispatcher::{ConsumerContext, ContextHandler};
use loadctl_worker::{ExecutionPool, WorkerCatalog};
use tokio::{net::TcpListener, sync::broadcast};
use tracing::info;

/// 主应用程序
pub struct Application {
    router: Arc<ContextRouter>,
    listener: TcpListener,
}

impl Application {
    /// 构建全部控制上下文并绑定监听地址
    pub async fn new(config: AppConfig, catalog: WorkerCatalog) -> Result<Self> {
        info!(
            hostname = %config.server.hostname,
            implementations = ?catalog.implementations(),
            "初始化控制平面"
        );

        let pool = ExecutionPool::with_limit(config.pool.limit());
        let table = build_context_table(&config, &catalog, &pool).await?;

        let router = Arc::new(ContextRouter::new());
        router
            .initialize(|| async move { table })
            .await
            .context("初始化上下文路由失败")?;

        let address = config.server.listen_address();
        let listener = TcpListener::bind(&address)
            .await
            .with_context(|| format!("绑定监听地址失败: {address}"))?;

        Ok(Self { router, listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().context("获取监听地址失败")
    }

    /// 运行HTTP服务直到收到关闭信号，然后停止所有Worker
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        info!(address = ?self.listener.local_addr().ok(), "HTTP服务已启动");

        let app = create_app(self.router.clone());
        axum::serve(self.listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await
            .context("HTTP服务运行失败")?;

        info!("HTTP服务已停止，开始停止所有Worker");
        self.router.shutdown().await;
        Ok(())
    }
}

async fn build_context_table(
    config: &AppConfig,
    catalog: &WorkerCatalog,
    pool: &ExecutionPool,
) -> Result<ContextTable> {
    let mut table = ContextTable::new();
    for context_config in &config.contexts {
        let context = ConsumerContext::from_config(
            context_config,
            catalog,
            pool.clone(),
            config.lifecycle.clone(),
        )
        .await
        .with_context(|| format!("创建控制上下文失败: {}", context_config.name))?;

        info!(
            context = %context.name(),
            path = %context_config.path,
            worker_types = ?context.factories().types().await,
            "控制上下文已创建"
        );
        table.add(context_config.path.clone(), Arc::new(context));
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shutdown::ShutdownManager;
    use serde_json::Value;

    const CONFIG: &str = r#"
[[contexts]]
name = "async"
path = "/asyncConsumer"

[contexts.workers]
jms = "idle"
"#;

    fn test_config() -> AppConfig {
        let mut config = AppConfig::from_toml(CONFIG).unwrap();
        config.server.bind_address = "127.0.0.1".to_string();
        config.server.port = 0;
        config
    }

    #[tokio::test]
    async fn test_application_serves_and_shuts_down() {
        let app = Application::new(test_config(), WorkerCatalog::with_builtins())
            .await
            .unwrap();
        let address = app.local_addr().unwrap();

        let shutdown_manager = ShutdownManager::new();
        let handle = tokio::spawn(app.run(shutdown_manager.subscribe()));

        let body: Value = reqwest::get(format!("http://{address}/asyncConsumer?start=jms"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let started = body["tsConsumerResponse"]["startConsumers"].as_array().unwrap();
        assert_eq!(started.len(), 1);
        assert_eq!(started[0]["type"], "jms");

        shutdown_manager.shutdown();
        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_unknown_implementation_is_fatal() {
        let mut config = test_config();
        config.contexts[0]
            .workers
            .insert("soap".to_string(), "com.example.SoapCaller".to_string());

        let result = Application::new(config, WorkerCatalog::with_builtins()).await;
        assert!(result.is_err());
    }
}

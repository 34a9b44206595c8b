#[cfg(test)]
pub mod workers {
    use std::sync::Arc;

    use async_trait::async_trait;
    use loadctl_core::ConfigurationOptions;
    use loadctl_worker::{
        Worker, WorkerError, WorkerFactory, WorkerIdentity, WorkerResult, WorkerStatistics,
    };
    use tokio::sync::watch;

    /// 测试Worker的行为脚本
    #[derive(Debug, Clone, Default)]
    pub struct WorkerScript {
        pub fail_initialize: bool,
        pub fail_shutdown: bool,
        /// 在统计数据中回显初始化时收到的选项
        pub report_options: bool,
    }

    pub struct ScriptedWorker {
        identity: WorkerIdentity,
        script: WorkerScript,
        options: ConfigurationOptions,
        stop_tx: watch::Sender<bool>,
    }

    #[async_trait]
    impl Worker for ScriptedWorker {
        fn identity(&self) -> &WorkerIdentity {
            &self.identity
        }

        async fn initialize(&mut self, options: &ConfigurationOptions) -> WorkerResult<()> {
            if self.script.fail_initialize {
                return Err(WorkerError::Initialization("scripted failure".to_string()));
            }
            self.options = options.clone();
            Ok(())
        }

        async fn run(&self) -> WorkerResult<()> {
            let mut stop_rx = self.stop_tx.subscribe();
            let _ = stop_rx.wait_for(|stopped| *stopped).await;
            Ok(())
        }

        async fn statistics(&self) -> Option<WorkerStatistics> {
            if !self.script.report_options {
                return None;
            }
            let mut stats = WorkerStatistics::new();
            stats.insert(
                "options".to_string(),
                serde_json::to_value(&self.options).unwrap_or_default(),
            );
            Some(stats)
        }

        async fn shutdown(&self) -> WorkerResult<()> {
            if self.script.fail_shutdown {
                return Err(WorkerError::Shutdown("scripted failure".to_string()));
            }
            self.stop_tx.send_replace(true);
            Ok(())
        }
    }

    pub fn scripted_factory(script: WorkerScript) -> Arc<dyn WorkerFactory> {
        Arc::new(move |identity: WorkerIdentity| -> WorkerResult<Box<dyn Worker>> {
            let (stop_tx, _) = watch::channel(false);
            Ok(Box::new(ScriptedWorker {
                identity,
                script: script.clone(),
                options: ConfigurationOptions::new(),
                stop_tx,
            }))
        })
    }

    pub fn failing_factory() -> Arc<dyn WorkerFactory> {
        Arc::new(|_: WorkerIdentity| -> WorkerResult<Box<dyn Worker>> {
            Err(WorkerError::Instantiation("constructor failed".to_string()))
        })
    }
}

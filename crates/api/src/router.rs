//! 上下文路由
//!
//! 路由表在进程内只初始化一次，之后只读。请求路径包含某个前缀即视为匹配，
//! 按注册顺序返回第一个匹配的上下文。

use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use loadctl_dispatcher::{ContextHandler, ControlRequest, ErrorCode, ErrorEntry, ResponseDocument};
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum RouterError {
    #[error("No context handlers configured")]
    EmptyTable,

    #[error("No handler found for path '{0}'")]
    NoHandlerFound(String),

    #[error("Unknown context")]
    UnknownContext,
}

impl RouterError {
    pub fn to_entry(&self) -> ErrorEntry {
        let code = match self {
            RouterError::UnknownContext => ErrorCode::UnknownContext,
            RouterError::EmptyTable | RouterError::NoHandlerFound(_) => ErrorCode::NoHandlerFound,
        };
        code.entry(self.to_string())
    }
}

struct ContextRoute {
    prefix: String,
    handler: Arc<dyn ContextHandler>,
}

/// 按注册顺序排列的路径前缀表
#[derive(Default)]
pub struct ContextTable {
    routes: Vec<ContextRoute>,
}

impl ContextTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加路由，前缀已存在时忽略并返回false
    pub fn add(&mut self, prefix: impl Into<String>, handler: Arc<dyn ContextHandler>) -> bool {
        let prefix = prefix.into();
        if self.routes.iter().any(|route| route.prefix == prefix) {
            warn!(prefix = %prefix, "路径前缀重复，忽略后注册的上下文");
            return false;
        }
        self.routes.push(ContextRoute { prefix, handler });
        true
    }

    pub fn with(mut self, prefix: impl Into<String>, handler: Arc<dyn ContextHandler>) -> Self {
        self.add(prefix, handler);
        self
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn prefixes(&self) -> Vec<&str> {
        self.routes.iter().map(|route| route.prefix.as_str()).collect()
    }

    pub fn route(&self, path: &str) -> Option<Arc<dyn ContextHandler>> {
        self.routes
            .iter()
            .find(|route| path.contains(route.prefix.as_str()))
            .map(|route| route.handler.clone())
    }

    fn handlers(&self) -> impl Iterator<Item = &Arc<dyn ContextHandler>> {
        self.routes.iter().map(|route| &route.handler)
    }
}

/// 将请求路径映射到负责该路径的上下文
#[derive(Default)]
pub struct ContextRouter {
    table: OnceCell<Arc<ContextTable>>,
}

impl ContextRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 初始化路由表
    ///
    /// 并发调用时只有一个`init`会执行，所有调用方得到同一张路由表。
    /// 路由表为空时初始化失败，之后仍可再次初始化。
    pub async fn initialize<F, Fut>(&self, init: F) -> Result<Arc<ContextTable>, RouterError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ContextTable>,
    {
        let table = self
            .table
            .get_or_try_init(|| async {
                let table = init().await;
                if table.is_empty() {
                    return Err(RouterError::EmptyTable);
                }
                info!(contexts = ?table.prefixes(), "上下文路由初始化完成");
                Ok(Arc::new(table))
            })
            .await?;
        Ok(table.clone())
    }

    pub fn is_initialized(&self) -> bool {
        self.table.initialized()
    }

    pub fn route(&self, path: &str) -> Result<Arc<dyn ContextHandler>, RouterError> {
        if path.trim_matches('/').is_empty() {
            return Err(RouterError::UnknownContext);
        }
        self.table
            .get()
            .and_then(|table| table.route(path))
            .ok_or_else(|| RouterError::NoHandlerFound(path.to_string()))
    }

    /// 将请求交给匹配的上下文处理，没有匹配时由路由自身返回错误文档
    pub async fn dispatch(&self, request: &ControlRequest) -> ResponseDocument {
        match self.route(&request.path) {
            Ok(handler) => {
                debug!(path = %request.path, context = %handler.name(), "路由控制请求");
                handler.handle(request).await
            }
            Err(e) => {
                warn!(path = %request.path, error = %e, "无法路由控制请求");
                ResponseDocument::from_error(e.to_entry())
            }
        }
    }

    /// 停止所有上下文中的Worker
    pub async fn shutdown(&self) {
        if let Some(table) = self.table.get() {
            join_all(table.handlers().map(|handler| handler.shutdown())).await;
        }
    }
}

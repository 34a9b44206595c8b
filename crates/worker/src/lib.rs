//! Worker契约、实例状态机与运行时组件
//!
//! - [`Worker`] / [`WorkerFactory`]: 可插拔Worker需要实现的能力
//! - [`WorkerInstance`]: 带生命周期状态的运行实例
//! - [`WorkerFactoryRegistry`]: Worker类型到工厂的映射
//! - [`RunningWorkerRegistry`]: 实例ID到运行实例的映射
//! - [`ExecutionPool`]: 所有上下文共享的执行池
//! - [`WorkerCatalog`]: 配置中的实现名称到工厂的映射

pub mod builtin;
pub mod catalog;
pub mod errors;
pub mod factory_registry;
pub mod instance;
pub mod pool;
pub mod running_registry;
pub mod traits;

pub use builtin::IdleWorker;
pub use catalog::WorkerCatalog;
pub use errors::{WorkerError, WorkerResult};
pub use factory_registry::WorkerFactoryRegistry;
pub use instance::{CreatedWorker, WorkerIdentity, WorkerInstance, WorkerSnapshot, WorkerState};
pub use pool::ExecutionPool;
pub use running_registry::RunningWorkerRegistry;
pub use traits::{Worker, WorkerFactory, WorkerStatistics};

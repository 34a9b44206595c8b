//! 控制请求调度
//!
//! 将控制请求解析为操作码和操作数，在上下文的注册表上执行操作，
//! 并把结果与错误汇总为响应文档。

pub mod context;
pub mod errors;
pub mod request;
pub mod response;

#[cfg(test)]
pub mod test_utils;

pub use context::{ConsumerContext, ConsumerContextBuilder, ContextHandler};
pub use errors::{ControlError, ErrorCode};
pub use request::{ControlRequest, OpCode};
pub use response::{
    ConsumerStats, ErrorEntry, ResponseBody, ResponseDocument, StartedWorker, StopRecord,
    StopState,
};

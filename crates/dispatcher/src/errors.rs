use thiserror::Error;

use crate::request::OpCode;
use crate::response::ErrorEntry;

/// 响应文档中错误条目的编号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NoWorkerTypes = 1,
    NoInstanceIds = 2,
    CollectStatsFailed = 3,
    StartFailed = 4,
    /// 保留，停止结果按条目记录在`shutdownConsumers`中
    StopFailed = 5,
    UnknownOpCode = 6,
    EncodingFailed = 7,
    NoHandlerFound = 8,
    UnknownContext = 9,
}

impl ErrorCode {
    pub fn value(self) -> u32 {
        self as u32
    }

    pub fn entry(self, msg: impl Into<String>) -> ErrorEntry {
        ErrorEntry::new(self.value(), msg)
    }
}

/// 控制请求处理中的错误，全部在调度器内部转换为错误条目
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ControlError {
    #[error("No consumer {} provided", .0.operand_kind())]
    MissingOperand(OpCode),

    #[error("No consumer class found for type '{0}'")]
    UnregisteredType(String),

    #[error("Failed to start consumer of type '{worker_type}': {reason}")]
    InstantiationFailure { worker_type: String, reason: String },

    #[error("No such consumer: {0}")]
    UnknownInstanceId(String),

    #[error("No valid op-code provided")]
    UnknownOpCode,

    #[error("Failed to encode response: {0}")]
    EncodingFailure(String),
}

impl ControlError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ControlError::MissingOperand(OpCode::Start) => ErrorCode::NoWorkerTypes,
            ControlError::MissingOperand(_) => ErrorCode::NoInstanceIds,
            ControlError::UnregisteredType(_) | ControlError::InstantiationFailure { .. } => {
                ErrorCode::StartFailed
            }
            ControlError::UnknownInstanceId(_) => ErrorCode::CollectStatsFailed,
            ControlError::UnknownOpCode => ErrorCode::UnknownOpCode,
            ControlError::EncodingFailure(_) => ErrorCode::EncodingFailed,
        }
    }

    pub fn to_entry(&self) -> ErrorEntry {
        self.code().entry(self.to_string())
    }
}

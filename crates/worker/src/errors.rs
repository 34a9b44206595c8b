use std::time::Duration;

use thiserror::Error;

use crate::WorkerState;

/// Worker生命周期中可能出现的错误
#[derive(Debug, Clone, Error, PartialEq)]
pub enum WorkerError {
    #[error("instantiation failed: {0}")]
    Instantiation(String),

    #[error("initialization failed: {0}")]
    Initialization(String),

    #[error("run loop failed: {0}")]
    Execution(String),

    #[error("shutdown failed: {0}")]
    Shutdown(String),

    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    #[error("worker {id} cannot {operation} in state {state}")]
    InvalidState {
        id: String,
        operation: &'static str,
        state: WorkerState,
    },

    #[error("unknown worker implementation: {0}")]
    UnknownImplementation(String),
}

pub type WorkerResult<T> = std::result::Result<T, WorkerError>;

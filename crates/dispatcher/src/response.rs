//! 响应文档与编码
//!
//! 文档结构：
//! ```json
//! {"tsConsumerResponse": {"startConsumers": [{"id": "...", "type": "jms"}], "errors": []}}
//! ```
//! 操作结果在前，`errors`始终存在且位于最后。

use loadctl_worker::{WorkerState, WorkerStatistics};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::ControlError;

/// 编码彻底失败时返回的最小响应
const FALLBACK_BODY: &[u8] =
    br#"{"tsConsumerResponse":{"errors":[{"id":7,"msg":"Failed to encode response"}]}}"#;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseDocument {
    #[serde(rename = "tsConsumerResponse")]
    pub body: ResponseBody,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_consumers: Option<Vec<StartedWorker>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shutdown_consumers: Option<Vec<StopRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statistics: Option<Vec<ConsumerStats>>,
    #[serde(default)]
    pub errors: Vec<ErrorEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub id: u32,
    pub msg: String,
}

impl ErrorEntry {
    pub fn new(id: u32, msg: impl Into<String>) -> Self {
        Self {
            id,
            msg: msg.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartedWorker {
    pub id: String,
    #[serde(rename = "type")]
    pub worker_type: String,
}

/// 单个实例的停止结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum StopState {
    Success = 1,
    UnknownId = 2,
    Failed = 3,
}

impl From<StopState> for u8 {
    fn from(state: StopState) -> Self {
        state as u8
    }
}

impl TryFrom<u8> for StopState {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(StopState::Success),
            2 => Ok(StopState::UnknownId),
            3 => Ok(StopState::Failed),
            other => Err(format!("invalid stop state: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopRecord {
    pub id: String,
    pub state: StopState,
    #[serde(default)]
    pub msg: String,
}

impl StopRecord {
    pub fn success(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: StopState::Success,
            msg: String::new(),
        }
    }

    pub fn unknown(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: StopState::UnknownId,
            msg: String::new(),
        }
    }

    pub fn failed(id: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: StopState::Failed,
            msg: msg.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumerStats {
    pub consumer_id: String,
    pub id: String,
    #[serde(rename = "type")]
    pub worker_type: String,
    pub state: WorkerState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<WorkerStatistics>,
}

impl ResponseDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// 只包含一个错误条目的文档
    pub fn from_error(entry: ErrorEntry) -> Self {
        let mut document = Self::new();
        document.body.errors.push(entry);
        document
    }

    pub fn started(started: Vec<StartedWorker>, errors: Vec<ErrorEntry>) -> Self {
        Self {
            body: ResponseBody {
                start_consumers: Some(started),
                errors,
                ..Default::default()
            },
        }
    }

    pub fn stopped(records: Vec<StopRecord>) -> Self {
        Self {
            body: ResponseBody {
                shutdown_consumers: Some(records),
                ..Default::default()
            },
        }
    }

    pub fn statistics(stats: Vec<ConsumerStats>) -> Self {
        Self {
            body: ResponseBody {
                statistics: Some(stats),
                ..Default::default()
            },
        }
    }

    pub fn errors(&self) -> &[ErrorEntry] {
        &self.body.errors
    }

    pub fn encode(&self) -> Result<Vec<u8>, ControlError> {
        serde_json::to_vec(self).map_err(|e| ControlError::EncodingFailure(e.to_string()))
    }

    /// 编码文档；编码失败时返回带有编码错误条目的文档，调用方总能得到响应内容
    pub fn to_bytes(&self) -> Vec<u8> {
        match self.encode() {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(error = %e, "响应编码失败");
                Self::from_error(e.to_entry())
                    .encode()
                    .unwrap_or_else(|_| FALLBACK_BODY.to_vec())
            }
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

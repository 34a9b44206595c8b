//! 控制请求解析
//!
//! 请求参数来自查询字符串；POST请求的表单内容中同名参数覆盖查询字符串中的参数。

use loadctl_core::{ConfigurationOptions, OpCodeConfig};
use url::form_urlencoded;

use crate::ControlError;

/// 控制操作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    Start,
    Stop,
    CollectStats,
}

impl OpCode {
    /// 按检测优先级排列
    pub const ALL: [OpCode; 3] = [OpCode::Start, OpCode::Stop, OpCode::CollectStats];

    /// 请求中对应的参数名
    pub fn parameter<'a>(&self, codes: &'a OpCodeConfig) -> &'a str {
        match self {
            OpCode::Start => &codes.start,
            OpCode::Stop => &codes.stop,
            OpCode::CollectStats => &codes.collect_stats,
        }
    }

    pub fn operand_kind(&self) -> &'static str {
        match self {
            OpCode::Start => "types",
            OpCode::Stop | OpCode::CollectStats => "identifiers",
        }
    }
}

/// 解码后的控制请求
#[derive(Debug, Clone, Default)]
pub struct ControlRequest {
    pub path: String,
    pub parameters: ConfigurationOptions,
    pub keep_alive: bool,
}

impl ControlRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn from_parts(path: &str, query: Option<&str>, body: Option<&[u8]>, keep_alive: bool) -> Self {
        let mut parameters = query
            .map(|query| parse_parameters(query.as_bytes()))
            .unwrap_or_default();

        if let Some(body) = body.filter(|body| !body.is_empty()) {
            parameters = parameters.merged_with(&parse_parameters(body));
        }

        Self {
            path: path.to_string(),
            parameters,
            keep_alive,
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.append(key, value);
        self
    }

    pub fn with_keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// 检测请求中的操作码，多个同时存在时按start、stop、collectStats的顺序取第一个
    pub fn op_code(&self, codes: &OpCodeConfig) -> Option<OpCode> {
        OpCode::ALL
            .into_iter()
            .find(|op| self.parameters.contains_key(op.parameter(codes)))
    }

    pub fn operands(&self, op: OpCode, codes: &OpCodeConfig) -> Result<Vec<String>, ControlError> {
        extract_operands(&self.parameters, op.parameter(codes), op)
    }
}

/// 解析`application/x-www-form-urlencoded`格式的参数，保留同名参数的顺序
pub fn parse_parameters(input: &[u8]) -> ConfigurationOptions {
    let mut parameters = ConfigurationOptions::new();
    for (key, value) in form_urlencoded::parse(input) {
        parameters.append(key.into_owned(), value.into_owned());
    }
    parameters
}

/// 提取操作数：去除首尾空白并保持顺序和数量，空值保留为空字符串；
/// 参数不存在或全部为空时返回`MissingOperand`
pub fn extract_operands(
    parameters: &ConfigurationOptions,
    key: &str,
    op: OpCode,
) -> Result<Vec<String>, ControlError> {
    let values: Vec<String> = parameters
        .get(key)
        .unwrap_or_default()
        .iter()
        .map(|value| value.trim().to_string())
        .collect();

    if values.iter().all(String::is_empty) {
        return Err(ControlError::MissingOperand(op));
    }
    Ok(values)
}

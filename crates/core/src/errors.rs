use thiserror::Error;

/// 控制平面错误类型定义
#[derive(Debug, Error)]
pub enum LoadctlError {
    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("配置加载失败: {0}")]
    ConfigLoad(#[from] ::config::ConfigError),

    #[error("TOML解析错误: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML序列化错误: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl LoadctlError {
    pub fn config_error(message: impl Into<String>) -> Self {
        LoadctlError::Configuration(message.into())
    }
}

/// 统一的Result类型
pub type LoadctlResult<T> = std::result::Result<T, LoadctlError>;

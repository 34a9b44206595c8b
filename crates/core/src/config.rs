//! 配置模型与加载
//!
//! 加载顺序：
//! 1. 各配置段的默认值
//! 2. 配置文件（TOML格式）
//! 3. 环境变量覆盖（前缀: `LOADCTL`，层级分隔符: `__`）
//!
//! 控制上下文（`[[contexts]]`）没有默认值，至少需要配置一个。

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;

use ::config::{Config as ConfigBuilder, Environment, File, FileFormat};
use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::{ConfigurationOptions, LoadctlError, LoadctlResult};

/// 默认配置文件搜索路径
pub const DEFAULT_CONFIG_PATHS: [&str; 3] = [
    "config/loadctl.toml",
    "loadctl.toml",
    "/etc/loadctl/config.toml",
];

/// 系统配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
    #[serde(default)]
    pub contexts: Vec<ContextConfig>,
}

/// HTTP服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 对外公布的主机名，仅用于日志
    pub hostname: String,
    pub bind_address: String,
    pub port: u16,
    /// 处理连接的工作线程数，0表示使用运行时默认值
    pub socket_pool_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            hostname: hostname::get()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_else(|_| "localhost".to_string()),
            bind_address: "0.0.0.0".to_string(),
            port: 9090,
            socket_pool_size: 0,
        }
    }
}

impl ServerConfig {
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

/// Worker执行池配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// 同时运行的Worker上限，0表示不限制
    pub max_workers: usize,
}

impl PoolConfig {
    pub fn limit(&self) -> Option<usize> {
        (self.max_workers > 0).then_some(self.max_workers)
    }
}

/// Worker生命周期配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    pub initialize_timeout_seconds: u64,
    pub shutdown_timeout_seconds: u64,
    /// 停止后的Worker是否保留在注册表中以供查询
    pub retain_stopped_workers: bool,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            initialize_timeout_seconds: 30,
            shutdown_timeout_seconds: 30,
            retain_stopped_workers: true,
        }
    }
}

impl LifecycleConfig {
    pub fn initialize_timeout(&self) -> Duration {
        Duration::from_secs(self.initialize_timeout_seconds)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_seconds)
    }

    pub fn validate(&self) -> LoadctlResult<()> {
        if self.initialize_timeout_seconds == 0 {
            return Err(LoadctlError::config_error(
                "lifecycle.initialize_timeout_seconds不能为0",
            ));
        }
        if self.shutdown_timeout_seconds == 0 {
            return Err(LoadctlError::config_error(
                "lifecycle.shutdown_timeout_seconds不能为0",
            ));
        }
        Ok(())
    }
}

/// 可观测性配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub log_format: String,
    pub metrics_enabled: bool,
    pub metrics_bind_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_bind_address: "0.0.0.0:9464".to_string(),
        }
    }
}

/// 控制请求中使用的操作码参数名
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpCodeConfig {
    pub start: String,
    pub stop: String,
    pub collect_stats: String,
}

impl Default for OpCodeConfig {
    fn default() -> Self {
        Self {
            start: "start".to_string(),
            stop: "stop".to_string(),
            collect_stats: "collectStats".to_string(),
        }
    }
}

/// 单个控制上下文的配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    pub name: String,
    /// 请求路径中需要包含的前缀
    pub path: String,
    #[serde(default)]
    pub op_codes: OpCodeConfig,
    /// Worker类型 -> 实现名称
    #[serde(default)]
    pub workers: BTreeMap<String, String>,
    /// 传给Worker初始化的静态选项
    #[serde(default)]
    pub options: ConfigurationOptions,
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// `config_path`为None时依次尝试[`DEFAULT_CONFIG_PATHS`]。
    pub fn load(config_path: Option<&str>) -> anyhow::Result<Self> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_path {
            if !Path::new(path).exists() {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        } else if let Some(path) = DEFAULT_CONFIG_PATHS
            .iter()
            .find(|path| Path::new(path).exists())
        {
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix("LOADCTL")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate().context("配置验证失败")?;

        Ok(config)
    }

    /// 从TOML字符串加载配置
    pub fn from_toml(toml_str: &str) -> LoadctlResult<Self> {
        let config: AppConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> LoadctlResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// 验证配置有效性
    pub fn validate(&self) -> LoadctlResult<()> {
        if self.server.port == 0 {
            return Err(LoadctlError::config_error("server.port不能为0"));
        }
        self.lifecycle.validate()?;

        if self.contexts.is_empty() {
            return Err(LoadctlError::config_error("至少需要配置一个控制上下文"));
        }

        let mut names = HashSet::new();
        for context in &self.contexts {
            context.validate()?;
            if !names.insert(context.name.as_str()) {
                return Err(LoadctlError::config_error(format!(
                    "控制上下文名称重复: {}",
                    context.name
                )));
            }
        }

        Ok(())
    }
}

impl ContextConfig {
    pub fn validate(&self) -> LoadctlResult<()> {
        if self.name.trim().is_empty() {
            return Err(LoadctlError::config_error("控制上下文名称不能为空"));
        }
        if self.path.trim().is_empty() {
            return Err(LoadctlError::config_error(format!(
                "控制上下文 {} 的路径不能为空",
                self.name
            )));
        }

        let op_codes = [
            &self.op_codes.start,
            &self.op_codes.stop,
            &self.op_codes.collect_stats,
        ];
        if op_codes.iter().any(|code| code.trim().is_empty()) {
            return Err(LoadctlError::config_error(format!(
                "控制上下文 {} 的操作码不能为空",
                self.name
            )));
        }
        let distinct: HashSet<_> = op_codes.iter().collect();
        if distinct.len() != op_codes.len() {
            return Err(LoadctlError::config_error(format!(
                "控制上下文 {} 的操作码必须互不相同",
                self.name
            )));
        }

        if let Some((worker_type, _)) = self
            .workers
            .iter()
            .find(|(worker_type, implementation)| {
                worker_type.trim().is_empty() || implementation.trim().is_empty()
            })
        {
            return Err(LoadctlError::config_error(format!(
                "控制上下文 {} 的Worker配置无效: '{}'",
                self.name, worker_type
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
[server]
hostname = "loadgen-01"
port = 9191

[pool]
max_workers = 4

[lifecycle]
initialize_timeout_seconds = 5

[[contexts]]
name = "async"
path = "/asyncConsumer"

[contexts.workers]
jms = "idle"
soap = "idle"

[contexts.options]
"jms.broker" = ["tcp://localhost:61616"]

[[contexts]]
name = "sync"
path = "/consumer"

[contexts.op_codes]
start = "startConsumer"
"#;

    #[test]
    fn test_from_toml_applies_defaults() {
        let config = AppConfig::from_toml(SAMPLE).unwrap();

        assert_eq!(config.server.hostname, "loadgen-01");
        assert_eq!(config.server.port, 9191);
        assert_eq!(config.server.bind_address, "0.0.0.0");
        assert_eq!(config.server.listen_address(), "0.0.0.0:9191");
        assert_eq!(config.pool.limit(), Some(4));
        assert_eq!(config.lifecycle.initialize_timeout(), Duration::from_secs(5));
        assert_eq!(config.lifecycle.shutdown_timeout(), Duration::from_secs(30));
        assert!(config.lifecycle.retain_stopped_workers);
        assert!(!config.observability.metrics_enabled);

        assert_eq!(config.contexts.len(), 2);
        let async_context = &config.contexts[0];
        assert_eq!(async_context.workers.get("jms").map(String::as_str), Some("idle"));
        assert_eq!(
            async_context.options.first("jms.broker"),
            Some("tcp://localhost:61616")
        );
        assert_eq!(async_context.op_codes, OpCodeConfig::default());

        let sync_context = &config.contexts[1];
        assert_eq!(sync_context.op_codes.start, "startConsumer");
        assert_eq!(sync_context.op_codes.stop, "stop");
        assert!(sync_context.workers.is_empty());
    }

    #[test]
    fn test_unbounded_pool_by_default() {
        assert_eq!(PoolConfig::default().limit(), None);
    }

    #[test]
    fn test_validate_requires_context() {
        let result = AppConfig::from_toml("[server]\nport = 9090\n");
        assert!(matches!(result, Err(LoadctlError::Configuration(_))));
    }

    #[test]
    fn test_validate_rejects_zero_timeouts() {
        let mut config = AppConfig::from_toml(SAMPLE).unwrap();
        config.lifecycle.shutdown_timeout_seconds = 0;
        assert!(matches!(config.validate(), Err(LoadctlError::Configuration(_))));

        let mut config = AppConfig::from_toml(SAMPLE).unwrap();
        config.lifecycle.initialize_timeout_seconds = 0;
        assert!(matches!(config.validate(), Err(LoadctlError::Configuration(_))));

        let toml_str = SAMPLE.replace(
            "initialize_timeout_seconds = 5",
            "initialize_timeout_seconds = 5\nshutdown_timeout_seconds = 0",
        );
        assert!(AppConfig::from_toml(&toml_str).is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_context_names() {
        let toml_str = r#"
[[contexts]]
name = "async"
path = "/a"

[[contexts]]
name = "async"
path = "/b"
"#;
        assert!(AppConfig::from_toml(toml_str).is_err());
    }

    #[test]
    fn test_validate_rejects_conflicting_op_codes() {
        let toml_str = r#"
[[contexts]]
name = "async"
path = "/a"

[contexts.op_codes]
start = "go"
stop = "go"
"#;
        assert!(AppConfig::from_toml(toml_str).is_err());
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let result = AppConfig::from_toml("[[contexts]\nname =");
        assert!(matches!(result, Err(LoadctlError::TomlParse(_))));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = AppConfig::from_toml(SAMPLE).unwrap();
        let serialized = config.to_toml().unwrap();
        let reloaded = AppConfig::from_toml(&serialized).unwrap();

        assert_eq!(reloaded.server.port, config.server.port);
        assert_eq!(reloaded.contexts.len(), config.contexts.len());
        assert_eq!(reloaded.contexts[0].workers, config.contexts[0].workers);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let path = file.path().to_str().unwrap();
        let config = AppConfig::load(Some(path)).unwrap();

        assert_eq!(config.server.port, 9191);
        assert_eq!(config.contexts[0].name, "async");
        assert_eq!(config.contexts[1].path, "/consumer");
    }

    #[test]
    fn test_bundled_config_is_valid() {
        let config = AppConfig::from_toml(include_str!("../../../config/loadctl.toml")).unwrap();
        assert_eq!(config.contexts.len(), 2);
        assert_eq!(config.contexts[1].op_codes.stop, "stopConsumer");
    }

    #[test]
    fn test_load_missing_file_fails() {
        let result = AppConfig::load(Some("/nonexistent/loadctl.toml"));
        assert!(result.is_err());
    }
}

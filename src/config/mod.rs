use serde::{Deserialize, Serialize};
use std::time::Duration;
use crate::error::Result;
use tracing::info;

/// 中继服务的主配置结构
/// 包含服务器、上游服务和对外暴露的模型描述
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// 服务器相关配置
    pub server: ServerConfig,
    /// 上游聊天服务配置
    pub upstream: UpstreamConfig,
    /// `/v1/models` 返回的模型信息，同时用于响应中的 model 字段
    pub model: ModelConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 服务器监听地址，例如 "0.0.0.0" 或 "127.0.0.1"
    pub host: String,
    /// 服务器监听端口，默认为8080
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// 上游服务配置
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// 上游聊天接口的完整URL
    pub url: String,
    /// 连接池空闲连接的回收时间，使用humantime格式（如 "60s"）
    #[serde(with = "humantime_serde")]
    pub pool_idle_timeout: Duration,
    /// 是否启用TCP Keep-Alive
    pub keep_alive: bool,
    /// 伪装请求头，上游据此通过反自动化检测
    pub headers: UpstreamHeaders,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: "https://chat.example.com/api/chat".to_string(),
            pool_idle_timeout: Duration::from_secs(60),
            keep_alive: true,
            headers: UpstreamHeaders::default(),
        }
    }
}

/// 上游要求的伪装请求头集合
///
/// 上游修改检测策略时只需要更新这里（或对应的配置文件段）。
/// 请求头的实际构造见 `proxy::headers`。
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamHeaders {
    pub referer: String,
    pub origin: String,
    pub user_agent: String,
    /// 辅助计数头的名称
    pub counter_header: String,
    /// 辅助计数头的固定取值
    pub counter_value: String,
}

impl Default for UpstreamHeaders {
    fn default() -> Self {
        Self {
            referer: "https://chat.example.com/".to_string(),
            origin: "https://chat.example.com".to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36"
                .to_string(),
            counter_header: "x-request-count".to_string(),
            counter_value: "1".to_string(),
        }
    }
}

/// 对外暴露的模型描述
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ModelConfig {
    /// 模型ID，同时作为响应中的 model 字段
    pub id: String,
    /// owned_by 字段
    pub owned_by: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            id: "upstream-chat".to_string(),
            owned_by: "chat-relay".to_string(),
        }
    }
}

impl Config {
    /// 从配置文件加载配置
    ///
    /// # 说明
    /// 1. 首先从指定文件加载配置（支持YAML、TOML、JSON等格式），文件不存在时跳过
    /// 2. 然后从环境变量覆盖配置（前缀为RELAY，分隔符为__）
    ///    例如：RELAY__SERVER__PORT=8081 会覆盖 server.port
    /// 3. 文件中缺失的字段使用默认值
    ///
    /// 文件存在但无法解析时返回错误。
    pub fn from_file(path: &str) -> Result<Self> {
        if !std::path::Path::new(path).exists() {
            info!("Config file {} not found, using defaults and environment", path);
        }

        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("RELAY").separator("__"))
            .build()
            .map_err(|e| crate::error::Error::Config(e.to_string()))?;

        settings
            .try_deserialize()
            .map_err(|e| crate::error::Error::Config(e.to_string()))
    }

    /// 服务监听地址，形如 "0.0.0.0:8080"
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

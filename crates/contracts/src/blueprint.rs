//! RelayBlueprint - Config Loader 输出
//!
//! 描述完整的中继配置：存储连接、消费者、消息源、分发策略、限流、路由。

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use validator::Validate;

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的中继配置蓝图
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RelayBlueprint {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    /// 存储连接
    #[validate(nested)]
    pub store: StoreConfig,

    /// 消费者 (worker pool)
    #[serde(default)]
    #[validate(nested)]
    pub consumer: ConsumerConfig,

    /// 消息源
    #[serde(default)]
    pub source: SourceConfig,

    /// 分发策略
    #[serde(default)]
    #[validate(nested)]
    pub dispatch: DispatchConfig,

    /// 按 key 限流 (可选)
    #[serde(default)]
    #[validate(nested)]
    pub rate_limit: Option<RateLimitConfig>,

    /// 路由列表
    #[serde(default)]
    #[validate(nested)]
    pub routes: Vec<RouteConfig>,
}

/// 存储连接配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct StoreConfig {
    /// Redis URL (e.g., "redis://127.0.0.1:6379")
    #[validate(length(min = 1, message = "store url cannot be empty"))]
    pub url: String,

    /// 连接超时 (毫秒)
    #[serde(default = "default_connect_timeout_ms")]
    #[validate(range(min = 1))]
    pub connect_timeout_ms: u64,
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

/// 消费者配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ConsumerConfig {
    /// 并发 worker 数
    #[serde(default = "default_concurrency")]
    #[validate(range(min = 1))]
    pub concurrency: usize,

    /// 单条消息最大投递次数
    #[serde(default = "default_max_attempts")]
    #[validate(range(min = 1))]
    pub max_attempts: u16,

    /// 重投间隔 (毫秒)
    #[serde(default = "default_requeue_delay_ms")]
    pub requeue_delay_ms: u64,

    /// 源与 worker 之间的缓冲容量 (in-flight)
    #[serde(default = "default_queue_capacity")]
    #[validate(range(min = 1))]
    pub queue_capacity: usize,
}

fn default_concurrency() -> usize {
    50
}

fn default_max_attempts() -> u16 {
    5
}

fn default_requeue_delay_ms() -> u64 {
    100
}

fn default_queue_capacity() -> usize {
    250
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            max_attempts: default_max_attempts(),
            requeue_delay_ms: default_requeue_delay_ms(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// 消息源类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// 标准输入 (NDJSON)
    #[default]
    Stdin,
    /// 文件 (NDJSON)
    File,
}

/// 消息源配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceConfig {
    /// 源类型
    #[serde(default)]
    pub kind: SourceKind,

    /// 文件路径 (kind = "file" 时必填)
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// 分发策略配置
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct DispatchConfig {
    /// 刷新间隔 (毫秒)：0 = 每条消息刷新，> 0 = 定时批量刷新
    #[serde(default)]
    #[validate(range(min = 0, message = "flush_interval_ms must not be negative"))]
    pub flush_interval_ms: i64,
}

/// 按 key 限流配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RateLimitConfig {
    /// 每秒令牌数，同时也是桶容量
    #[validate(range(min = 1))]
    pub rate: u32,

    /// 最多跟踪的 key 数 (LRU)
    #[validate(range(min = 1))]
    pub size: usize,

    /// 从 payload 中提取 key 的路径 (e.g., "projectId")
    #[validate(length(min = 1, message = "rate limit key cannot be empty"))]
    pub key: String,
}

/// 路由类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteKind {
    /// PUBLISH 到模板生成的 channel
    Publish,
    /// LPUSH + LTRIM 到模板生成的 key
    List,
}

/// 路由配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RouteConfig {
    /// 路由名称 (日志/指标)
    #[validate(length(min = 1, message = "route name cannot be empty"))]
    pub name: String,

    /// 路由类型
    pub kind: RouteKind,

    /// key / channel 模板
    pub format: String,

    /// 列表长度上限 (仅 list)
    #[serde(default)]
    pub size: Option<i64>,
}

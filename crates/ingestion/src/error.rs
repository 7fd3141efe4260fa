//! Ingestion 错误类型

use std::path::PathBuf;

use contracts::ContractError;
use thiserror::Error;

/// Ingestion 错误
#[derive(Debug, Error)]
pub enum IngestionError {
    /// 消费者配置无效
    #[error("invalid consumer config `{field}`: {message}")]
    InvalidConfig {
        /// 字段名
        field: &'static str,
        /// 错误消息
        message: String,
    },

    /// 输入文件无法打开
    #[error("failed to open input {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 消息源读取失败
    #[error("source '{source_name}' failed: {source}")]
    Source {
        /// 消息源名称
        source_name: String,
        #[source]
        source: ContractError,
    },

    /// 工作任务异常退出
    #[error("worker task failed: {0}")]
    Worker(String),
}

impl IngestionError {
    pub(crate) fn invalid_config(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field,
            message: message.into(),
        }
    }
}

/// Ingestion Result 类型别名
pub type Result<T> = std::result::Result<T, IngestionError>;

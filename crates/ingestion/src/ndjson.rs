//! NDJSON 消息源
//!
//! 每行一个 JSON 文档；消息 ID 按读取顺序分配。
//! 行内容不做校验，非 JSON 的行由 dispatcher 丢弃。

use std::path::Path;

use bytes::Bytes;
use contracts::{ContractError, Delivery, MessageId, MessageSource, SourceConfig, SourceKind};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Lines};
use tracing::{debug, info};

use crate::error::{IngestionError, Result};

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// 按行读取的消息源
pub struct NdjsonSource {
    name: String,
    lines: Lines<BufReader<BoxedReader>>,
    seq: u64,
}

impl std::fmt::Debug for NdjsonSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NdjsonSource")
            .field("name", &self.name)
            .field("seq", &self.seq)
            .finish()
    }
}

impl NdjsonSource {
    /// 从任意异步读取端创建
    pub fn from_reader(name: impl Into<String>, reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        let reader: BoxedReader = Box::new(reader);
        Self {
            name: name.into(),
            lines: BufReader::new(reader).lines(),
            seq: 0,
        }
    }

    /// 标准输入
    pub fn stdin() -> Self {
        Self::from_reader("stdin", tokio::io::stdin())
    }

    /// 打开文件
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|source| IngestionError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        info!(path = %path.display(), "reading deliveries from file");
        Ok(Self::from_reader(path.display().to_string(), file))
    }

    /// 按 `[source]` 配置创建
    pub async fn from_config(config: &SourceConfig) -> Result<Self> {
        match (&config.kind, &config.path) {
            (SourceKind::Stdin, _) => Ok(Self::stdin()),
            (SourceKind::File, Some(path)) => Self::open(path).await,
            (SourceKind::File, None) => Err(IngestionError::invalid_config(
                "source.path",
                "required when kind = \"file\"",
            )),
        }
    }

    /// 已产出的消息数
    pub fn produced(&self) -> u64 {
        self.seq
    }
}

impl MessageSource for NdjsonSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn next(&mut self) -> std::result::Result<Option<Delivery>, ContractError> {
        while let Some(line) = self.lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            self.seq += 1;
            let id = MessageId::from_sequence(self.seq);
            debug!(message_id = %id, "read delivery");
            return Ok(Some(Delivery::new(id, Bytes::copy_from_slice(line.as_bytes()))));
        }
        Ok(None)
    }
}

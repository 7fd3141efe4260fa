//! Redis store transport
//!
//! `RedisPool` owns one reconnecting, multiplexed `ConnectionManager`.
//! Each `RedisConnection` handed out keeps its own outbound pipeline, so
//! commands from different connections never interleave inside one flush.

use std::collections::VecDeque;
use std::time::Duration;

use bytes::Bytes;
use contracts::{Arg, Command, ContractError, Reply, StoreConfig, StoreConnection, StorePool};
use redis::aio::{ConnectionLike, ConnectionManager};
use redis::{Client, Cmd, Pipeline, RedisError, Value};
use tracing::{debug, info, instrument};

/// Redis connection pool
#[derive(Clone)]
pub struct RedisPool {
    conn: ConnectionManager,
    url: String,
}

impl RedisPool {
    /// Connect to the configured Redis server
    ///
    /// # Errors
    /// Returns `ContractError::StoreConnection` on an invalid URL, a refused
    /// connection, or when `connect_timeout_ms` elapses.
    #[instrument(name = "redis_pool_connect", skip(config), fields(url = %config.url))]
    pub async fn connect(config: &StoreConfig) -> Result<Self, ContractError> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| ContractError::store_connection(format!("invalid url: {e}")))?;

        let timeout = Duration::from_millis(config.connect_timeout_ms);
        let conn = tokio::time::timeout(timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| {
                ContractError::store_connection(format!(
                    "timed out after {}ms connecting to {}",
                    config.connect_timeout_ms, config.url
                ))
            })?
            .map_err(|e| ContractError::store_connection(e.to_string()))?;

        info!(url = %config.url, "Connected to Redis");

        Ok(Self {
            conn,
            url: config.url.clone(),
        })
    }

    /// Server URL
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl StorePool for RedisPool {
    type Conn = RedisConnection;

    async fn get(&self) -> Result<RedisConnection, ContractError> {
        Ok(RedisConnection::new(self.conn.clone()))
    }
}

/// One pipelined Redis connection
///
/// Commands stay local until `flush`, which packs them into one pipeline.
pub struct RedisConnection {
    conn: ConnectionManager,
    outbound: Vec<Cmd>,
    replies: VecDeque<Value>,
}

impl RedisConnection {
    fn new(conn: ConnectionManager) -> Self {
        Self {
            conn,
            outbound: Vec::new(),
            replies: VecDeque::new(),
        }
    }
}

impl StoreConnection for RedisConnection {
    fn send(&mut self, command: &Command) -> Result<(), ContractError> {
        let mut cmd = redis::cmd(command.name());
        for arg in command.args() {
            match arg {
                Arg::Bytes(b) => cmd.arg(b.as_ref()),
                Arg::Str(s) => cmd.arg(s.as_str()),
                Arg::Int(i) => cmd.arg(*i),
            };
        }
        self.outbound.push(cmd);
        Ok(())
    }

    fn discard(&mut self, count: usize) {
        let keep = self.outbound.len().saturating_sub(count);
        self.outbound.truncate(keep);
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        if self.outbound.is_empty() {
            return Ok(());
        }
        let count = self.outbound.len();
        let mut pipeline = Pipeline::with_capacity(count);
        for cmd in self.outbound.drain(..) {
            pipeline.add_command(cmd);
        }
        let result = self.conn.req_packed_commands(&pipeline, 0, count).await;

        let replies = result.map_err(|e| ContractError::store_flush(e.to_string()))?;
        debug!(commands = count, replies = replies.len(), "Redis pipeline flushed");
        self.replies.extend(replies);
        Ok(())
    }

    async fn receive(&mut self) -> Result<Reply, ContractError> {
        match self.replies.pop_front() {
            // Per-command errors (e.g. WRONGTYPE) arrive inside an Ok pipeline.
            Some(Value::ServerError(e)) => {
                Err(ContractError::store_receive(RedisError::from(e).to_string()))
            }
            Some(value) => Ok(into_reply(value)),
            None => Err(ContractError::store_receive("no reply pending")),
        }
    }
}

fn into_reply(value: Value) -> Reply {
    match value {
        Value::Nil => Reply::Nil,
        Value::Int(i) => Reply::Int(i),
        Value::BulkString(data) => Reply::Data(Bytes::from(data)),
        Value::SimpleString(s) => Reply::Status(s),
        Value::Okay => Reply::Status("OK".to_string()),
        Value::Array(items) => Reply::Array(items.into_iter().map(into_reply).collect()),
        other => Reply::Other(format!("{other:?}")),
    }
}

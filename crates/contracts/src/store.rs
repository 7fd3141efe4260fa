//! Store transport abstraction
//!
//! Defines the raw pipelined connection and the pool it is drawn from,
//! supporting the real Redis transport and the in-memory mock.

use std::future::Future;

use crate::{Command, ContractError, Reply};

/// Raw pipelined store connection
///
/// `send` only writes into the transport's outbound buffer; nothing reaches
/// the server until `flush`. Every accepted `send` produces exactly one reply
/// that must later be drained with `receive`, in send order. A rejected send
/// buffers nothing and produces no reply.
pub trait StoreConnection: Send {
    /// Buffer one command
    fn send(&mut self, command: &Command) -> Result<(), ContractError>;

    /// Drop the last `count` commands buffered since the previous flush
    fn discard(&mut self, count: usize);

    /// Write the outbound buffer to the server
    fn flush(&mut self) -> impl Future<Output = Result<(), ContractError>> + Send;

    /// Read the next reply
    fn receive(&mut self) -> impl Future<Output = Result<Reply, ContractError>> + Send;
}

/// Source of store connections
///
/// Dropping a connection releases it back to the pool.
pub trait StorePool: Send + Sync {
    /// Connection type handed out by this pool
    type Conn: StoreConnection + 'static;

    /// Acquire a connection (may wait on pool exhaustion)
    fn get(&self) -> impl Future<Output = Result<Self::Conn, ContractError>> + Send;
}

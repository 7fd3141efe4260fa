//! # Dispatcher
//!
//! 消息分发模块。
//!
//! 负责：
//! - 解析消息并按 key 限流
//! - 按注册顺序 fan-out 到多个 handlers
//! - 管理 pipelined 连接与刷新策略 (逐条 / 定时批量)

pub mod conn;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod metrics;

pub use conn::PipelinedConn;
pub use contracts::{Handler, Message};
pub use dispatcher::{Dispatcher, DispatcherConfig, DispatcherState, FlushPolicy};
pub use error::DispatcherError;
pub use handlers::{from_route, from_routes, ListHandler, PublishHandler};
pub use metrics::{DispatchMetrics, MetricsSnapshot};

//! # Ingestion
//!
//! Message consumption module.
//!
//! Responsibilities:
//! - Read deliveries from a `MessageSource` (NDJSON stdin/file, or mock)
//! - Fan deliveries out to a bounded pool of workers via async-channel
//! - At-least-once handling: a handler error requeues the delivery until
//!   `max_attempts` is reached
//! - Graceful shutdown driven by a `watch` signal
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{Consumer, NdjsonSource};
//!
//! let consumer = Consumer::new(blueprint.consumer.clone())?;
//! let source = NdjsonSource::from_config(&blueprint.source).await?;
//! let stats = consumer.run(source, Arc::new(dispatcher), shutdown_rx).await?;
//! ```

mod config;
mod consumer;
mod error;
mod mock;
mod ndjson;

// Re-exports
pub use config::{ConsumerMetrics, ConsumerStats};
pub use consumer::Consumer;
pub use contracts::{Delivery, DeliveryHandler, MessageSource};
pub use error::{IngestionError, Result};
pub use mock::MockSource;
pub use ndjson::NdjsonSource;

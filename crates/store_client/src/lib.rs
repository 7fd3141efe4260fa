//! # Store Client
//!
//! Store transports behind the `StorePool` / `StoreConnection` contracts.
//!
//! Responsibilities:
//! - Open the Redis connection used by the relay
//! - Provide pipelined connections (buffer on send, one round trip on flush)
//! - Provide an in-memory mock for tests and dry runs
//!
//! ## Feature Flags
//!
//! - `real-redis`: Enable the Redis transport (requires the redis crate)

pub mod mock_client;

#[cfg(feature = "real-redis")]
pub mod redis_client;

pub use contracts::{StoreConnection, StorePool};
pub use mock_client::{MockConfig, MockConnection, MockStore};

#[cfg(feature = "real-redis")]
pub use redis_client::{RedisConnection, RedisPool};

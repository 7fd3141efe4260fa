//! # Contracts
//!
//! Frozen interface contracts, defining inter-module data structures and traits.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Data Flow
//! - The queue hands over a `Delivery` (id + raw bytes)
//! - The dispatcher decodes it into a `Message` and runs every `Handler`
//! - Handlers buffer `Command`s into a `CommandBuffer`
//! - Buffered commands reach the store through a `StoreConnection`

mod blueprint;
mod command;
mod error;
mod handler;
mod message;
mod source;
mod store;

pub use blueprint::*;
pub use command::{Arg, Command, Reply};
pub use error::*;
pub use handler::{CommandBuffer, Handler};
pub use message::{Delivery, Message, MessageId, MESSAGE_ID_LEN};
pub use source::{DeliveryHandler, LocalDeliveryHandler, LocalMessageSource, MessageSource};
pub use store::{StoreConnection, StorePool};

//! Handler trait - routing handler interface
//!
//! A handler translates one message into zero or more buffered store
//! commands. It never performs I/O itself.

use crate::{Command, ContractError, Message};

/// Something commands can be buffered into
pub trait CommandBuffer {
    /// Buffer one command
    fn send(&mut self, command: Command) -> Result<(), ContractError>;
}

impl CommandBuffer for Vec<Command> {
    fn send(&mut self, command: Command) -> Result<(), ContractError> {
        self.push(command);
        Ok(())
    }
}

/// Routing handler
///
/// All handler implementations must implement this trait.
pub trait Handler: Send + Sync {
    /// Handler name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Buffer the store commands for `message`
    ///
    /// # Errors
    /// Returns the buffering error; the dispatcher aborts the remaining
    /// handlers for this message and asks the queue to redeliver.
    fn handle(&self, conn: &mut dyn CommandBuffer, message: &Message)
        -> Result<(), ContractError>;
}

//! ListHandler - capped history list per templated key

use std::num::NonZeroU32;

use contracts::{Command, CommandBuffer, ContractError, Handler, Message};
use template::Template;
use tracing::{debug, info};

/// Pushes every message onto a list and trims it to `size` entries
#[derive(Debug)]
pub struct ListHandler {
    name: String,
    template: Template,
    size: NonZeroU32,
}

impl ListHandler {
    pub fn new(name: impl Into<String>, template: Template, size: NonZeroU32) -> Self {
        Self {
            name: name.into(),
            template,
            size,
        }
    }

    /// Maximum list length kept after each push
    pub fn size(&self) -> NonZeroU32 {
        self.size
    }
}

impl Handler for ListHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, conn: &mut dyn CommandBuffer, message: &Message) -> Result<(), ContractError> {
        let key = self.template.eval(&message.json);

        info!(message_id = %message.id, key = %key, "push");
        debug!(message_id = %message.id, body = %String::from_utf8_lossy(&message.body), "contents");

        conn.send(Command::lpush(key.clone(), message.body.clone()))?;
        conn.send(Command::ltrim(key, 0, i64::from(self.size.get()) - 1))?;
        Ok(())
    }
}

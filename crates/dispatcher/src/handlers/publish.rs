//! PublishHandler - PUBLISH the raw body to a templated channel

use contracts::{Command, CommandBuffer, ContractError, Handler, Message};
use template::Template;
use tracing::{debug, info};

/// Publishes every message on the channel its template renders
#[derive(Debug)]
pub struct PublishHandler {
    name: String,
    template: Template,
}

impl PublishHandler {
    pub fn new(name: impl Into<String>, template: Template) -> Self {
        Self {
            name: name.into(),
            template,
        }
    }

    /// Channel format
    pub fn template(&self) -> &Template {
        &self.template
    }
}

impl Handler for PublishHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, conn: &mut dyn CommandBuffer, message: &Message) -> Result<(), ContractError> {
        let channel = self.template.eval(&message.json);

        info!(message_id = %message.id, channel = %channel, "publish");
        debug!(message_id = %message.id, body = %String::from_utf8_lossy(&message.body), "contents");

        conn.send(Command::publish(channel, message.body.clone()))?;
        Ok(())
    }
}

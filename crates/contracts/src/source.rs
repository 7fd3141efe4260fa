//! MessageSource / DeliveryHandler traits - queue side interfaces
//!
//! `MessageSource` yields deliveries; `DeliveryHandler` decides ack (Ok) or
//! redeliver (Err) for each one.

use crate::{ContractError, Delivery};

/// Source of queue deliveries
#[trait_variant::make(MessageSource: Send)]
pub trait LocalMessageSource {
    /// Source name (used for logging)
    fn name(&self) -> &str;

    /// Next delivery, `None` once the source is exhausted
    async fn next(&mut self) -> Result<Option<Delivery>, ContractError>;
}

/// Consumer of queue deliveries
#[trait_variant::make(DeliveryHandler: Send)]
pub trait LocalDeliveryHandler {
    /// Process one delivery
    ///
    /// # Errors
    /// Any error is a redelivery signal for the queue.
    async fn handle_delivery(&self, delivery: &Delivery) -> Result<(), ContractError>;
}

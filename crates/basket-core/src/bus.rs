use thiserror::Error;

use crate::OutboundMessage;

#[derive(Debug, Error, Clone)]
pub enum BusError {
    #[error("bus connect failed: {0}")]
    Connect(String),
    #[error("bus publish failed: {0}")]
    Publish(String),
}

/// Seam to the external message-bus session. One session is shared by every
/// connection handler; implementations must be safe to call concurrently and
/// must not block (enqueue-and-return semantics).
pub trait BusClient: Send + Sync {
    fn publish(&self, message: &OutboundMessage) -> Result<(), BusError>;
}

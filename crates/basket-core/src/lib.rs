mod bus;
mod codec;
mod logger;
mod message;
mod publisher;
mod server;

pub use bus::{BusClient, BusError};
pub use codec::{CodecError, DecodedFrame, FrameCodec};
pub use logger::PublishJournal;
pub use message::{DeviceInfo, GenericMessage, OutboundMessage, INFO_MESSAGE_TYPE};
pub use publisher::{EventEnvelope, TopicConfig};
pub use server::{start_bridge, Bridge, BridgeOptions, ServerError};

#[cfg(test)]
mod tests;

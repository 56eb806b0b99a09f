mod types;
mod wire;

pub use types::{AccelSample, DeviceId, PacketType, ProtocolError, TelemetryEvent};
pub use wire::{decode_event, encode_frame, frame_len, read_event, HEADER_LEN};

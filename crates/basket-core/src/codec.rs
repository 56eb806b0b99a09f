use std::io;

use basket_protocol::{frame_len, read_event, PacketType, ProtocolError, TelemetryEvent, HEADER_LEN};
use bytes::BytesMut;
use thiserror::Error;
use tokio_util::codec::Decoder;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// One complete frame off the wire: the decoded event plus the raw bytes it
/// was decoded from, kept for the publish journal.
#[derive(Clone, Debug)]
pub struct DecodedFrame {
    pub event: TelemetryEvent,
    pub raw: Vec<u8>,
}

/// Incremental framer for the `[type][device_id][payload]` stream.
///
/// Strict two-level state machine: the type byte fixes the frame length, and
/// a frame is only ever consumed whole. The format has no delimiters or
/// checksums, so there is no resynchronization — after an unknown type byte
/// the connection must be dropped, and leftover bytes at end-of-stream are a
/// truncated frame, never the start of a new one.
#[derive(Debug, Default)]
pub struct FrameCodec;

impl Decoder for FrameCodec {
    type Item = DecodedFrame;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match read_event(src)? {
            Some((event, consumed)) => {
                let raw = src.split_to(consumed).to_vec();
                Ok(Some(DecodedFrame { event, raw }))
            }
            None => Ok(None),
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            None => {
                let needed = src
                    .first()
                    .and_then(|byte| PacketType::from_code(*byte))
                    .map(frame_len)
                    .unwrap_or(HEADER_LEN);
                Err(ProtocolError::Truncated {
                    needed,
                    got: src.len(),
                }
                .into())
            }
        }
    }
}

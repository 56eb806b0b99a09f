use nom::number::complete::{le_f32, le_i32, le_u32};
use nom::IResult;

use crate::{AccelSample, DeviceId, PacketType, ProtocolError, TelemetryEvent};

/// One type byte plus the 4-byte device id.
pub const HEADER_LEN: usize = 5;

pub const fn frame_len(packet_type: PacketType) -> usize {
    HEADER_LEN + packet_type.payload_len()
}

/// Try to read one complete frame from the front of `input`.
///
/// Returns `Ok(None)` when the buffer holds only a prefix of a frame (more
/// bytes needed), `Ok(Some((event, consumed)))` for a complete frame, and an
/// error for a type byte outside the known set. The caller owns the decision
/// of what an incomplete prefix means: mid-stream it is backpressure, at
/// end-of-stream it is a truncated frame.
pub fn read_event(input: &[u8]) -> Result<Option<(TelemetryEvent, usize)>, ProtocolError> {
    let Some(type_byte) = input.first() else {
        return Ok(None);
    };
    let packet_type =
        PacketType::from_code(*type_byte).ok_or(ProtocolError::UnknownType(*type_byte))?;

    let total = frame_len(packet_type);
    if input.len() < total {
        return Ok(None);
    }

    let device_id = DeviceId::new(
        parse_exact(&input[1..HEADER_LEN], le_u32).ok_or(ProtocolError::Truncated {
            needed: total,
            got: input.len(),
        })?,
    );
    let event = decode_event(packet_type, device_id, &input[HEADER_LEN..total])?;
    Ok(Some((event, total)))
}

/// Decode the payload of a frame whose header has already been read.
pub fn decode_event(
    packet_type: PacketType,
    device_id: DeviceId,
    payload: &[u8],
) -> Result<TelemetryEvent, ProtocolError> {
    let short = || ProtocolError::Truncated {
        needed: packet_type.payload_len(),
        got: payload.len(),
    };
    if payload.len() != packet_type.payload_len() {
        return Err(short());
    }

    match packet_type {
        PacketType::Score => Ok(TelemetryEvent::Score { device_id }),
        PacketType::Accelerometer => {
            let fields = parse_exact(payload, accel_fields).ok_or_else(short)?;
            Ok(TelemetryEvent::Accelerometer {
                device_id,
                sample: AccelSample {
                    acc_x: fields[0],
                    acc_y: fields[1],
                    acc_z: fields[2],
                    gyro_x: fields[3],
                    gyro_y: fields[4],
                    gyro_z: fields[5],
                    temp: fields[6],
                },
            })
        }
        PacketType::CustomButton => {
            let button_index = parse_exact(payload, le_i32).ok_or_else(short)?;
            Ok(TelemetryEvent::CustomButton {
                device_id,
                button_index,
            })
        }
    }
}

/// Serialize an event back into wire bytes. Used by the traffic simulator
/// and tests; the bridge itself only decodes.
pub fn encode_frame(event: &TelemetryEvent) -> Vec<u8> {
    let mut out = Vec::with_capacity(frame_len(event.packet_type()));
    out.push(event.packet_type().code());
    out.extend_from_slice(&event.device_id().to_wire_bytes());

    match event {
        TelemetryEvent::Score { .. } => {}
        TelemetryEvent::Accelerometer { sample, .. } => {
            for value in [
                sample.acc_x,
                sample.acc_y,
                sample.acc_z,
                sample.gyro_x,
                sample.gyro_y,
                sample.gyro_z,
                sample.temp,
            ] {
                out.extend_from_slice(&value.to_le_bytes());
            }
        }
        TelemetryEvent::CustomButton { button_index, .. } => {
            out.extend_from_slice(&button_index.to_le_bytes());
        }
    }

    out
}

fn accel_fields(input: &[u8]) -> IResult<&[u8], [f32; 7]> {
    let mut rest = input;
    let mut fields = [0.0_f32; 7];
    for slot in &mut fields {
        let (next, value) = le_f32(rest)?;
        *slot = value;
        rest = next;
    }
    Ok((rest, fields))
}

fn parse_exact<'a, O, F>(input: &'a [u8], mut parser: F) -> Option<O>
where
    F: FnMut(&'a [u8]) -> IResult<&'a [u8], O>,
{
    let (rest, value) = parser(input).ok()?;
    if rest.is_empty() {
        Some(value)
    } else {
        None
    }
}

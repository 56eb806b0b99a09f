use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("unknown packet type: 0x{0:02X}")]
    UnknownType(u8),
    #[error("frame truncated: needed {needed} bytes, got {got}")]
    Truncated { needed: usize, got: usize },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PacketType {
    Score,
    Accelerometer,
    CustomButton,
}

impl PacketType {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x00 => Some(Self::Score),
            0x01 => Some(Self::Accelerometer),
            0x02 => Some(Self::CustomButton),
            _ => None,
        }
    }

    pub const fn code(self) -> u8 {
        match self {
            Self::Score => 0x00,
            Self::Accelerometer => 0x01,
            Self::CustomButton => 0x02,
        }
    }

    /// Payload bytes following the 5-byte header.
    pub const fn payload_len(self) -> usize {
        match self {
            Self::Score => 0,
            Self::Accelerometer => 28,
            Self::CustomButton => 4,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Score => "SCORE",
            Self::Accelerometer => "ACCELEROMETER",
            Self::CustomButton => "CUSTOM_BUTTON",
        }
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Device-generated 4-byte token identifying one basket unit. Opaque to the
/// bridge: it is decoded once from the wire and only ever rendered in its
/// canonical decimal form for topic derivation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(u32);

impl DeviceId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn from_wire_bytes(bytes: [u8; 4]) -> Self {
        Self(u32::from_le_bytes(bytes))
    }

    pub const fn to_wire_bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct AccelSample {
    pub acc_x: f32,
    pub acc_y: f32,
    pub acc_z: f32,
    pub gyro_x: f32,
    pub gyro_y: f32,
    pub gyro_z: f32,
    pub temp: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TelemetryEvent {
    Score {
        device_id: DeviceId,
    },
    Accelerometer {
        device_id: DeviceId,
        sample: AccelSample,
    },
    CustomButton {
        device_id: DeviceId,
        button_index: i32,
    },
}

impl TelemetryEvent {
    pub fn device_id(&self) -> DeviceId {
        match self {
            Self::Score { device_id }
            | Self::Accelerometer { device_id, .. }
            | Self::CustomButton { device_id, .. } => *device_id,
        }
    }

    pub fn packet_type(&self) -> PacketType {
        match self {
            Self::Score { .. } => PacketType::Score,
            Self::Accelerometer { .. } => PacketType::Accelerometer,
            Self::CustomButton { .. } => PacketType::CustomButton,
        }
    }
}

use std::time::SystemTime;

use basket_protocol::TelemetryEvent;
use serde::Serialize;
use serde_json::Value;

pub const INFO_MESSAGE_TYPE: &str = "INFO";

/// The JSON document published for every event:
/// `{"type": ..., "metadata": [...], "timestamp": <unix seconds>}`.
/// Metadata is an ordered sequence whose layout is fixed per message type.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GenericMessage {
    #[serde(rename = "type")]
    pub message_type: String,
    pub metadata: Vec<Value>,
    pub timestamp: u64,
}

impl GenericMessage {
    pub fn new(message_type: impl Into<String>, metadata: Vec<Value>) -> Self {
        Self::with_timestamp(message_type, metadata, unix_timestamp(SystemTime::now()))
    }

    pub fn with_timestamp(
        message_type: impl Into<String>,
        metadata: Vec<Value>,
        timestamp: u64,
    ) -> Self {
        Self {
            message_type: message_type.into(),
            metadata,
            timestamp,
        }
    }

    pub fn from_event(event: &TelemetryEvent) -> Self {
        Self::new(event.packet_type().as_str(), event_metadata(event))
    }
}

fn event_metadata(event: &TelemetryEvent) -> Vec<Value> {
    let device_id = Value::from(event.device_id().raw());
    match event {
        TelemetryEvent::Score { .. } => vec![device_id],
        TelemetryEvent::Accelerometer { sample, .. } => vec![
            device_id,
            Value::from(sample.acc_x),
            Value::from(sample.acc_y),
            Value::from(sample.acc_z),
            Value::from(sample.gyro_x),
            Value::from(sample.gyro_y),
            Value::from(sample.gyro_z),
            Value::from(sample.temp),
        ],
        TelemetryEvent::CustomButton { button_index, .. } => {
            vec![device_id, Value::from(*button_index)]
        }
    }
}

/// Identity the bridge announces once at startup as a retained message, so a
/// late-subscribing monitor still learns who is feeding the topic tree.
#[derive(Clone, Debug)]
pub struct DeviceInfo {
    pub bridge_id: String,
    pub city: String,
    pub manufacturer: String,
    pub software_version: String,
}

impl DeviceInfo {
    pub fn to_message(&self) -> GenericMessage {
        GenericMessage::new(
            INFO_MESSAGE_TYPE,
            vec![
                Value::from(self.bridge_id.clone()),
                Value::from(self.city.clone()),
                Value::from(self.manufacturer.clone()),
                Value::from(self.software_version.clone()),
            ],
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct OutboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub retain: bool,
}

pub(crate) fn unix_timestamp(now: SystemTime) -> u64 {
    now.duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_else(|_| std::time::Duration::from_secs(0))
        .as_secs()
}

#[cfg(test)]
mod tests {
    use basket_protocol::DeviceId;

    use super::*;

    #[test]
    fn score_message_matches_wire_contract() {
        let event = TelemetryEvent::Score {
            device_id: DeviceId::new(1),
        };
        let message = GenericMessage::with_timestamp(
            event.packet_type().as_str(),
            super::event_metadata(&event),
            1700000000,
        );
        let json = serde_json::to_string(&message).expect("serialize");
        assert_eq!(
            json,
            r#"{"type":"SCORE","metadata":[1],"timestamp":1700000000}"#
        );
    }

    #[test]
    fn custom_button_metadata_order_is_device_then_index() {
        let message = GenericMessage::from_event(&TelemetryEvent::CustomButton {
            device_id: DeviceId::new(42),
            button_index: 3,
        });
        assert_eq!(message.message_type, "CUSTOM_BUTTON");
        assert_eq!(message.metadata, vec![Value::from(42_u32), Value::from(3)]);
    }

    #[test]
    fn accelerometer_metadata_keeps_field_order() {
        let message = GenericMessage::from_event(&TelemetryEvent::Accelerometer {
            device_id: DeviceId::new(5),
            sample: basket_protocol::AccelSample {
                acc_x: 1.0,
                acc_y: 2.0,
                acc_z: 3.0,
                gyro_x: 4.0,
                gyro_y: 5.0,
                gyro_z: 6.0,
                temp: 7.0,
            },
        });
        assert_eq!(message.metadata.len(), 8);
        assert_eq!(message.metadata[0], Value::from(5_u32));
        assert_eq!(message.metadata[7], Value::from(7.0_f32));
    }

    #[test]
    fn device_info_message_is_info_typed() {
        let info = DeviceInfo {
            bridge_id: "bridge-1".to_string(),
            city: "Bologna".to_string(),
            manufacturer: "acme".to_string(),
            software_version: "0.1.0".to_string(),
        };
        let message = info.to_message();
        assert_eq!(message.message_type, INFO_MESSAGE_TYPE);
        assert_eq!(
            message.metadata,
            vec![
                Value::from("bridge-1"),
                Value::from("Bologna"),
                Value::from("acme"),
                Value::from("0.1.0"),
            ]
        );
    }
}

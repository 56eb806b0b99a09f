use std::sync::Arc;
use std::time::SystemTime;

use basket_protocol::{DeviceId, TelemetryEvent};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::{BusClient, GenericMessage, OutboundMessage, PublishJournal};

/// Topic namespace shared by every publish: telemetry goes to
/// `{base}/{basket}/{device_id}`, the retained device-info announcement to
/// `{base}/{basket}`.
#[derive(Clone, Debug)]
pub struct TopicConfig {
    pub base: String,
    pub basket: String,
}

impl TopicConfig {
    pub fn telemetry_topic(&self, device_id: DeviceId) -> String {
        format!("{}/{}/{}", self.base, self.basket, device_id)
    }

    pub fn info_topic(&self) -> String {
        format!("{}/{}", self.base, self.basket)
    }
}

/// One decoded frame on its way from a connection handler to the publisher.
#[derive(Clone, Debug)]
pub struct EventEnvelope {
    pub event: TelemetryEvent,
    pub raw: Vec<u8>,
    pub received_at: SystemTime,
}

/// Single writer for the shared bus session. Drains the envelope queue until
/// every sender is gone, which both serializes bus access and preserves
/// per-connection publish order (handlers await their sends in decode order).
pub(crate) fn spawn_publisher(
    mut receiver: mpsc::Receiver<EventEnvelope>,
    bus: Arc<dyn BusClient>,
    topics: TopicConfig,
    journal: Option<PublishJournal>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(envelope) = receiver.recv().await {
            publish_envelope(bus.as_ref(), &topics, journal.as_ref(), &envelope);
        }
        debug!("publisher queue closed");
    })
}

fn publish_envelope(
    bus: &dyn BusClient,
    topics: &TopicConfig,
    journal: Option<&PublishJournal>,
    envelope: &EventEnvelope,
) {
    let event = &envelope.event;
    let message = GenericMessage::from_event(event);
    let payload = match serde_json::to_vec(&message) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(packet_type = %event.packet_type(), error = %err, "failed to serialize event, dropping");
            return;
        }
    };
    let outbound = OutboundMessage {
        topic: topics.telemetry_topic(event.device_id()),
        payload,
        retain: false,
    };

    // A lost sample must not take the device's session down with it: log and
    // move on to the next queued event.
    match bus.publish(&outbound) {
        Ok(()) => debug!(
            topic = %outbound.topic,
            packet_type = %event.packet_type(),
            "published telemetry event"
        ),
        Err(err) => warn!(
            topic = %outbound.topic,
            packet_type = %event.packet_type(),
            error = %err,
            "publish failed, dropping message"
        ),
    }

    if let Some(journal) = journal {
        journal.record(&outbound, envelope.received_at, &envelope.raw);
    }
}

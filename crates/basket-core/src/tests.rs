use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use basket_protocol::{encode_frame, AccelSample, DeviceId, TelemetryEvent};
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use super::*;

#[derive(Clone, Default)]
struct RecordingBus {
    messages: Arc<Mutex<Vec<OutboundMessage>>>,
    fail: Arc<AtomicBool>,
}

impl RecordingBus {
    fn snapshot(&self) -> Vec<OutboundMessage> {
        self.messages.lock().expect("lock").clone()
    }

    fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }
}

impl BusClient for RecordingBus {
    fn publish(&self, message: &OutboundMessage) -> Result<(), BusError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(BusError::Publish("injected failure".to_string()));
        }
        self.messages.lock().expect("lock").push(message.clone());
        Ok(())
    }
}

fn test_topics() -> TopicConfig {
    TopicConfig {
        base: "court".to_string(),
        basket: "basket".to_string(),
    }
}

fn test_device_info() -> DeviceInfo {
    DeviceInfo {
        bridge_id: "bridge-under-test".to_string(),
        city: "Bologna".to_string(),
        manufacturer: "acme".to_string(),
        software_version: "0.1.0".to_string(),
    }
}

async fn start_test_bridge(bus: Arc<RecordingBus>) -> Bridge {
    start_bridge(
        BridgeOptions {
            addr: "127.0.0.1:0".to_string(),
            queue_buffer: 16,
            idle_timeout: None,
        },
        test_topics(),
        test_device_info(),
        bus,
        None,
    )
    .await
    .expect("start bridge")
}

async fn wait_for_count(bus: &RecordingBus, count: usize) -> Vec<OutboundMessage> {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let snapshot = bus.snapshot();
            if snapshot.len() >= count {
                return snapshot;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("timed out waiting for published messages")
}

fn body(message: &OutboundMessage) -> Value {
    serde_json::from_slice(&message.payload).expect("payload json")
}

#[tokio::test]
async fn device_info_is_published_retained_before_any_telemetry() {
    let bus = Arc::new(RecordingBus::default());
    let bridge = start_test_bridge(bus.clone()).await;

    let mut stream = TcpStream::connect(bridge.local_addr()).await.expect("connect");
    stream
        .write_all(&encode_frame(&TelemetryEvent::Score {
            device_id: DeviceId::new(7),
        }))
        .await
        .expect("write frame");

    let messages = wait_for_count(&bus, 2).await;
    assert_eq!(messages[0].topic, "court/basket");
    assert!(messages[0].retain);
    assert_eq!(body(&messages[0])["type"], "INFO");
    assert_eq!(
        body(&messages[0])["metadata"],
        serde_json::json!(["bridge-under-test", "Bologna", "acme", "0.1.0"])
    );

    assert_eq!(messages[1].topic, "court/basket/7");
    assert!(!messages[1].retain);

    bridge.shutdown().await;
}

#[tokio::test]
async fn frames_from_one_connection_publish_in_order() {
    let bus = Arc::new(RecordingBus::default());
    let bridge = start_test_bridge(bus.clone()).await;

    let device_id = DeviceId::new(99);
    let events = [
        TelemetryEvent::Score { device_id },
        TelemetryEvent::Accelerometer {
            device_id,
            sample: AccelSample {
                acc_x: 1.0,
                acc_y: 2.0,
                acc_z: 3.0,
                gyro_x: 4.0,
                gyro_y: 5.0,
                gyro_z: 6.0,
                temp: 21.5,
            },
        },
        TelemetryEvent::CustomButton {
            device_id,
            button_index: 2,
        },
    ];

    let mut wire = Vec::new();
    for event in &events {
        wire.extend_from_slice(&encode_frame(event));
    }
    let mut stream = TcpStream::connect(bridge.local_addr()).await.expect("connect");
    stream.write_all(&wire).await.expect("write frames");
    drop(stream);

    let messages = wait_for_count(&bus, 1 + events.len()).await;
    let telemetry = &messages[1..];
    assert_eq!(telemetry.len(), events.len());
    for (message, event) in telemetry.iter().zip(&events) {
        assert_eq!(message.topic, "court/basket/99");
        assert_eq!(body(message)["type"], event.packet_type().as_str());
    }

    // Clean close at a frame boundary: nothing beyond the three events.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(bus.snapshot().len(), 1 + events.len());

    bridge.shutdown().await;
}

#[tokio::test]
async fn score_example_vector_publishes_expected_json() {
    let bus = Arc::new(RecordingBus::default());
    let bridge = start_test_bridge(bus.clone()).await;

    let mut stream = TcpStream::connect(bridge.local_addr()).await.expect("connect");
    stream
        .write_all(&[0x00, 0x01, 0x00, 0x00, 0x00])
        .await
        .expect("write frame");

    let messages = wait_for_count(&bus, 2).await;
    assert_eq!(messages[1].topic, "court/basket/1");
    let parsed = body(&messages[1]);
    assert_eq!(parsed["type"], "SCORE");
    assert_eq!(parsed["metadata"], serde_json::json!([1]));
    assert!(parsed["timestamp"].as_u64().expect("timestamp") > 0);

    bridge.shutdown().await;
}

#[tokio::test]
async fn protocol_error_closes_only_offending_connection() {
    let bus = Arc::new(RecordingBus::default());
    let bridge = start_test_bridge(bus.clone()).await;

    let mut bad = TcpStream::connect(bridge.local_addr()).await.expect("connect");
    let mut good = TcpStream::connect(bridge.local_addr()).await.expect("connect");

    bad.write_all(&[0xAB]).await.expect("write bad header");

    // The bridge drops the offending connection; the peer observes EOF.
    let mut sink = [0_u8; 8];
    let closed = tokio::time::timeout(Duration::from_secs(2), bad.read(&mut sink))
        .await
        .expect("timed out waiting for close");
    assert!(matches!(closed, Ok(0) | Err(_)));

    good.write_all(&encode_frame(&TelemetryEvent::Score {
        device_id: DeviceId::new(5),
    }))
    .await
    .expect("write good frame");

    let messages = wait_for_count(&bus, 2).await;
    assert_eq!(messages[1].topic, "court/basket/5");

    bridge.shutdown().await;
}

#[tokio::test]
async fn truncated_stream_publishes_no_partial_event() {
    let bus = Arc::new(RecordingBus::default());
    let bridge = start_test_bridge(bus.clone()).await;

    // Accelerometer header plus 10 of the 28 payload bytes, then EOF.
    let mut stream = TcpStream::connect(bridge.local_addr()).await.expect("connect");
    let mut partial = vec![0x01, 0x2A, 0x00, 0x00, 0x00];
    partial.extend_from_slice(&[0_u8; 10]);
    stream.write_all(&partial).await.expect("write partial");
    drop(stream);

    // Only the device-info announcement ever shows up.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let messages = bus.snapshot();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].topic, "court/basket");

    bridge.shutdown().await;
}

#[tokio::test]
async fn publish_failure_does_not_break_connection() {
    let bus = Arc::new(RecordingBus::default());
    let bridge = start_test_bridge(bus.clone()).await;
    let baseline = wait_for_count(&bus, 1).await.len();

    bus.set_failing(true);
    let mut stream = TcpStream::connect(bridge.local_addr()).await.expect("connect");
    stream
        .write_all(&encode_frame(&TelemetryEvent::Score {
            device_id: DeviceId::new(1),
        }))
        .await
        .expect("write dropped frame");
    tokio::time::sleep(Duration::from_millis(100)).await;

    bus.set_failing(false);
    stream
        .write_all(&encode_frame(&TelemetryEvent::CustomButton {
            device_id: DeviceId::new(1),
            button_index: 0,
        }))
        .await
        .expect("write second frame");

    let messages = wait_for_count(&bus, baseline + 1).await;
    assert_eq!(body(&messages[baseline])["type"], "CUSTOM_BUTTON");

    bridge.shutdown().await;
}

#[tokio::test]
async fn shutdown_releases_open_connections() {
    let bus = Arc::new(RecordingBus::default());
    let bridge = start_test_bridge(bus.clone()).await;

    // A device that connects and then says nothing must not hold shutdown up.
    let _idle = TcpStream::connect(bridge.local_addr()).await.expect("connect");

    tokio::time::timeout(Duration::from_secs(2), bridge.shutdown())
        .await
        .expect("shutdown timed out");
}

#[tokio::test]
async fn idle_timeout_closes_silent_connection() {
    let bus = Arc::new(RecordingBus::default());
    let bridge = start_bridge(
        BridgeOptions {
            addr: "127.0.0.1:0".to_string(),
            queue_buffer: 16,
            idle_timeout: Some(Duration::from_millis(50)),
        },
        test_topics(),
        test_device_info(),
        bus.clone(),
        None,
    )
    .await
    .expect("start bridge");

    let mut stream = TcpStream::connect(bridge.local_addr()).await.expect("connect");
    let mut sink = [0_u8; 8];
    let closed = tokio::time::timeout(Duration::from_secs(2), stream.read(&mut sink))
        .await
        .expect("timed out waiting for idle close");
    assert!(matches!(closed, Ok(0) | Err(_)));

    bridge.shutdown().await;
}

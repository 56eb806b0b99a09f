use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use serde::Serialize;
use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::OutboundMessage;

#[derive(Serialize)]
struct JsonRecord<'a> {
    ts: String,
    topic: &'a str,
    retain: bool,
    frame_hex: String,
    body: Value,
}

/// Optional JSONL sink recording every message handed to the bus, one line
/// per publish. Shared between the device-info announcement and the
/// publisher task.
#[derive(Clone)]
pub struct PublishJournal {
    writer: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl PublishJournal {
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Arc::new(Mutex::new(writer)),
        }
    }

    pub(crate) fn record(&self, outbound: &OutboundMessage, received_at: SystemTime, frame: &[u8]) {
        let record = JsonRecord {
            ts: format_timestamp(received_at),
            topic: &outbound.topic,
            retain: outbound.retain,
            frame_hex: hex::encode(frame),
            body: serde_json::from_slice(&outbound.payload).unwrap_or(Value::Null),
        };

        if let Ok(line) = serde_json::to_string(&record) {
            if let Ok(mut guard) = self.writer.lock() {
                let _ = guard.write_all(line.as_bytes());
                let _ = guard.write_all(b"\n");
                let _ = guard.flush();
            }
        }
    }
}

fn format_timestamp(ts: SystemTime) -> String {
    let duration = ts
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_else(|_| std::time::Duration::from_secs(0));
    OffsetDateTime::from_unix_timestamp_nanos(duration.as_nanos() as i128)
        .ok()
        .and_then(|odt| odt.format(&Rfc3339).ok())
        .unwrap_or_else(|| "1970-01-01T00:00:00Z".to_string())
}

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use futures_util::StreamExt;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::codec::{CodecError, DecodedFrame, FrameCodec};
use crate::publisher::{spawn_publisher, EventEnvelope, TopicConfig};
use crate::{BusClient, DeviceInfo, OutboundMessage, PublishJournal};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind listener on {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },
}

#[derive(Clone, Debug)]
pub struct BridgeOptions {
    pub addr: String,
    /// Capacity of the envelope queue between handlers and the publisher.
    pub queue_buffer: usize,
    /// Close connections with no traffic for this long. None = wait forever.
    pub idle_timeout: Option<Duration>,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:2323".to_string(),
            queue_buffer: 256,
            idle_timeout: None,
        }
    }
}

/// A running bridge: accept loop, per-connection handlers and the publisher
/// task, all stopped together by `shutdown`.
pub struct Bridge {
    shutdown: CancellationToken,
    local_addr: SocketAddr,
    accept_task: JoinHandle<()>,
    publisher_task: JoinHandle<()>,
    connections: TaskTracker,
}

impl Bridge {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if let Err(err) = self.accept_task.await {
            if !err.is_cancelled() {
                warn!(error = %err, "accept task join failed during shutdown");
            }
        }
        self.connections.close();
        self.connections.wait().await;
        // Every envelope sender is gone now; the publisher drains what is
        // left in the queue and exits.
        if let Err(err) = self.publisher_task.await {
            if !err.is_cancelled() {
                warn!(error = %err, "publisher task join failed during shutdown");
            }
        }
    }
}

/// Announce the bridge (retained), bind the listener and start accepting
/// basket devices. The announcement goes out before the first accept so a
/// late subscriber always sees it ahead of any telemetry.
pub async fn start_bridge(
    options: BridgeOptions,
    topics: TopicConfig,
    device_info: DeviceInfo,
    bus: Arc<dyn BusClient>,
    journal: Option<PublishJournal>,
) -> Result<Bridge, ServerError> {
    publish_device_info(bus.as_ref(), &topics, &device_info, journal.as_ref());

    let listener =
        TcpListener::bind(&options.addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: options.addr.clone(),
                source,
            })?;
    let local_addr = listener.local_addr().map_err(|source| ServerError::Bind {
        addr: options.addr.clone(),
        source,
    })?;
    info!(%local_addr, "bridge listening for basket devices");

    let shutdown = CancellationToken::new();
    let (event_tx, event_rx) = mpsc::channel(options.queue_buffer.max(1));
    let publisher_task = spawn_publisher(event_rx, bus, topics, journal);
    let connections = TaskTracker::new();
    let accept_task = tokio::spawn(accept_loop(
        listener,
        event_tx,
        connections.clone(),
        shutdown.clone(),
        options.idle_timeout,
    ));

    Ok(Bridge {
        shutdown,
        local_addr,
        accept_task,
        publisher_task,
        connections,
    })
}

fn publish_device_info(
    bus: &dyn BusClient,
    topics: &TopicConfig,
    info: &DeviceInfo,
    journal: Option<&PublishJournal>,
) {
    let message = info.to_message();
    let payload = match serde_json::to_vec(&message) {
        Ok(payload) => payload,
        Err(err) => {
            error!(error = %err, "failed to serialize device info");
            return;
        }
    };
    let outbound = OutboundMessage {
        topic: topics.info_topic(),
        payload,
        retain: true,
    };

    match bus.publish(&outbound) {
        Ok(()) => info!(topic = %outbound.topic, bridge_id = %info.bridge_id, "announced bridge device info (retained)"),
        Err(err) => error!(topic = %outbound.topic, error = %err, "failed to announce bridge device info"),
    }

    if let Some(journal) = journal {
        journal.record(&outbound, SystemTime::now(), &[]);
    }
}

async fn accept_loop(
    listener: TcpListener,
    event_tx: mpsc::Sender<EventEnvelope>,
    connections: TaskTracker,
    shutdown: CancellationToken,
    idle_timeout: Option<Duration>,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        debug!(%peer, "basket device connected");
                        connections.spawn(handle_connection(
                            stream,
                            peer,
                            event_tx.clone(),
                            shutdown.clone(),
                            idle_timeout,
                        ));
                    }
                    Err(err) => {
                        // One failed accept is not a listener failure; keep going.
                        warn!(error = %err, "accept failed");
                    }
                }
            }
        }
    }
}

enum NextFrame {
    Frame(DecodedFrame),
    Eof,
    Idle,
    Failed(CodecError),
}

/// Read loop for one basket device. Ends on clean disconnect, idle timeout,
/// protocol error or shutdown; nothing here outlives the connection or
/// reaches the other handlers.
async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    events: mpsc::Sender<EventEnvelope>,
    shutdown: CancellationToken,
    idle_timeout: Option<Duration>,
) {
    let mut framed = FramedRead::new(stream, FrameCodec);

    loop {
        let next = tokio::select! {
            _ = shutdown.cancelled() => break,
            next = next_frame(&mut framed, idle_timeout) => next,
        };

        match next {
            NextFrame::Frame(frame) => {
                let envelope = EventEnvelope {
                    event: frame.event,
                    raw: frame.raw,
                    received_at: SystemTime::now(),
                };
                if events.send(envelope).await.is_err() {
                    debug!(%peer, "publisher queue closed, dropping connection");
                    break;
                }
            }
            NextFrame::Eof => {
                debug!(%peer, "basket device disconnected");
                break;
            }
            NextFrame::Idle => {
                info!(%peer, "closing idle connection");
                break;
            }
            NextFrame::Failed(err) => {
                warn!(%peer, error = %err, "closing connection after protocol error");
                break;
            }
        }
    }
}

async fn next_frame(
    framed: &mut FramedRead<TcpStream, FrameCodec>,
    idle_timeout: Option<Duration>,
) -> NextFrame {
    let next = match idle_timeout {
        Some(limit) => match tokio::time::timeout(limit, framed.next()).await {
            Ok(next) => next,
            Err(_) => return NextFrame::Idle,
        },
        None => framed.next().await,
    };

    match next {
        Some(Ok(frame)) => NextFrame::Frame(frame),
        Some(Err(err)) => NextFrame::Failed(err),
        None => NextFrame::Eof,
    }
}

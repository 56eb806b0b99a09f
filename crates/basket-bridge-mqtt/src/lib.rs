use std::sync::Mutex;
use std::time::Duration;

use basket_core::{BusClient, BusError, OutboundMessage};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Clone, Debug)]
pub struct MqttBusConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub keep_alive: Duration,
    pub connect_timeout: Duration,
    /// Capacity of rumqttc's request channel; `try_publish` fails once full.
    pub request_buf: usize,
}

impl Default for MqttBusConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 1883,
            client_id: "basket-bridge".to_string(),
            keep_alive: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            request_buf: 64,
        }
    }
}

/// The one broker session shared by the whole bridge. Publishing enqueues on
/// the client's request channel; a background driver task keeps the session
/// alive and reconnects after broker-side drops.
pub struct MqttBus {
    client: AsyncClient,
    shutdown: CancellationToken,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl MqttBus {
    /// Establish the session: the returned bus has seen the broker's ConnAck,
    /// so a publish right after connect lands on a live session.
    pub async fn connect(cfg: MqttBusConfig) -> Result<Self, BusError> {
        let mut options = MqttOptions::new(cfg.client_id.clone(), cfg.host.clone(), cfg.port);
        options.set_keep_alive(cfg.keep_alive);
        options.set_clean_session(true);

        let (client, mut event_loop) = AsyncClient::new(options, cfg.request_buf.max(1));

        let acked = tokio::time::timeout(cfg.connect_timeout, wait_for_connack(&mut event_loop)).await;
        match acked {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(err),
            Err(_) => {
                return Err(BusError::Connect(format!(
                    "no ConnAck from {}:{} within {:?}",
                    cfg.host, cfg.port, cfg.connect_timeout
                )))
            }
        }
        info!(host = %cfg.host, port = cfg.port, client_id = %cfg.client_id, "connected to broker");

        let shutdown = CancellationToken::new();
        let driver = spawn_driver(event_loop, shutdown.clone());

        Ok(Self {
            client,
            shutdown,
            driver: Mutex::new(Some(driver)),
        })
    }

    pub async fn disconnect(&self) {
        self.shutdown.cancel();
        let _ = self.client.disconnect().await;
        let driver = self.driver.lock().ok().and_then(|mut guard| guard.take());
        if let Some(task) = driver {
            if let Err(err) = task.await {
                if !err.is_cancelled() {
                    warn!(error = %err, "broker driver join failed");
                }
            }
        }
    }
}

impl BusClient for MqttBus {
    fn publish(&self, message: &OutboundMessage) -> Result<(), BusError> {
        self.client
            .try_publish(
                message.topic.clone(),
                QoS::AtMostOnce,
                message.retain,
                message.payload.clone(),
            )
            .map_err(|err| BusError::Publish(err.to_string()))
    }
}

async fn wait_for_connack(event_loop: &mut EventLoop) -> Result<(), BusError> {
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => return Ok(()),
            Ok(event) => debug!(?event, "broker event before ConnAck"),
            Err(err) => return Err(BusError::Connect(err.to_string())),
        }
    }
}

fn spawn_driver(mut event_loop: EventLoop, shutdown: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                polled = event_loop.poll() => match polled {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("broker session re-established");
                    }
                    Ok(event) => debug!(?event, "broker event"),
                    Err(err) => {
                        warn!(error = %err, "broker connection error, retrying");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        }
    })
}

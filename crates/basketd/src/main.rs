mod simulate;

use std::fs::File;
use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use basket_bridge_mqtt::{MqttBus, MqttBusConfig};
use basket_config::{load_or_default, BasketConfig, DEFAULT_CONFIG_PATH};
use basket_core::{
    start_bridge, BridgeOptions, BusClient, DeviceInfo, PublishJournal, TopicConfig,
};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "basketd", about = "Basket telemetry bridge")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    Serve(ServeArgs),
    Simulate(simulate::SimulateArgs),
}

#[derive(Args, Debug, Clone, Default)]
struct ServeArgs {
    #[arg(long, help = "Path to basket.toml config file")]
    config: Option<String>,
    #[arg(long, help = "TCP listen address for basket devices")]
    addr: Option<String>,
    #[arg(long = "broker-host", help = "MQTT broker host")]
    broker_host: Option<String>,
    #[arg(long = "broker-port", help = "MQTT broker port")]
    broker_port: Option<u16>,
    #[arg(long = "client-id", help = "MQTT client id (default: bridge id)")]
    client_id: Option<String>,
    #[arg(long = "base-topic", help = "Topic namespace root")]
    base_topic: Option<String>,
    #[arg(long = "basket-topic", help = "Topic segment for basket telemetry")]
    basket_topic: Option<String>,
    #[arg(long, help = "JSONL publish log path (enables the log; default sink: stdout)")]
    log: Option<String>,
    #[arg(long = "idle-timeout", help = "Idle connection timeout, e.g. 5m")]
    idle_timeout: Option<String>,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    init_tracing();

    let exit = run().await;
    if let Err(err) = exit {
        error!(error = %err, "basketd exited with error");
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Some(Command::Serve(args)) => run_serve(args).await,
        Some(Command::Simulate(args)) => simulate::run(args).await,
        None => run_serve(ServeArgs::default()).await,
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

async fn run_serve(args: ServeArgs) -> Result<()> {
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let (mut cfg, _found) = load_or_default(&config_path)?;
    apply_overrides(&mut cfg, &args);
    cfg.normalize();
    cfg.validate()?;

    let bridge_id = resolve_bridge_id(&cfg);
    let client_id = if cfg.broker.client_id.trim().is_empty() {
        bridge_id.clone()
    } else {
        cfg.broker.client_id.clone()
    };

    info!(
        config = %config_path,
        addr = %cfg.server.addr,
        broker = %format!("{}:{}", cfg.broker.host, cfg.broker.port),
        bridge_id = %bridge_id,
        "starting bridge"
    );

    let bus = Arc::new(
        MqttBus::connect(MqttBusConfig {
            host: cfg.broker.host.clone(),
            port: cfg.broker.port,
            client_id,
            keep_alive: cfg.broker.keep_alive_duration()?,
            connect_timeout: cfg.broker.connect_timeout_duration()?,
            request_buf: cfg.broker.request_buf,
        })
        .await?,
    );

    let device_info = DeviceInfo {
        bridge_id,
        city: cfg.bridge.city.clone(),
        manufacturer: cfg.bridge.manufacturer.clone(),
        software_version: cfg.bridge.software_version.clone(),
    };
    let topics = TopicConfig {
        base: cfg.topics.base.clone(),
        basket: cfg.topics.basket.clone(),
    };
    let options = BridgeOptions {
        addr: cfg.server.addr.clone(),
        queue_buffer: cfg.server.buf,
        idle_timeout: cfg.server.idle_timeout_duration()?,
    };
    let journal = build_journal(&cfg, args.log)?;

    let bridge = start_bridge(
        options,
        topics,
        device_info,
        bus.clone() as Arc<dyn BusClient>,
        journal,
    )
    .await?;

    tokio::signal::ctrl_c().await.context("failed to wait ctrl-c")?;
    info!("received ctrl-c, shutting down bridge");

    bridge.shutdown().await;
    bus.disconnect().await;
    Ok(())
}

fn apply_overrides(cfg: &mut BasketConfig, args: &ServeArgs) {
    if let Some(addr) = &args.addr {
        cfg.server.addr = addr.clone();
    }
    if let Some(host) = &args.broker_host {
        cfg.broker.host = host.clone();
    }
    if let Some(port) = args.broker_port {
        cfg.broker.port = port;
    }
    if let Some(client_id) = &args.client_id {
        cfg.broker.client_id = client_id.clone();
    }
    if let Some(base) = &args.base_topic {
        cfg.topics.base = base.clone();
    }
    if let Some(basket) = &args.basket_topic {
        cfg.topics.basket = basket.clone();
    }
    if let Some(idle) = &args.idle_timeout {
        cfg.server.idle_timeout = idle.clone();
    }
}

fn resolve_bridge_id(cfg: &BasketConfig) -> String {
    if cfg.bridge.id.trim().is_empty() {
        Uuid::new_v4().to_string()
    } else {
        cfg.bridge.id.trim().to_string()
    }
}

fn build_journal(cfg: &BasketConfig, log_override: Option<String>) -> Result<Option<PublishJournal>> {
    if !cfg.outputs.jsonl.enabled && log_override.is_none() {
        return Ok(None);
    }
    let path = log_override.unwrap_or_else(|| cfg.outputs.jsonl.path.clone());
    let writer: Box<dyn Write + Send> = if path.trim().is_empty() {
        Box::new(io::stdout())
    } else {
        Box::new(
            File::create(&path).with_context(|| format!("failed to open publish log {path}"))?,
        )
    };
    Ok(Some(PublishJournal::new(writer)))
}

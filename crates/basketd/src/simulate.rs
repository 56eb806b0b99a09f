use anyhow::{Context, Result};
use basket_protocol::{encode_frame, AccelSample, DeviceId, TelemetryEvent};
use clap::Args;
use rand::Rng;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, info};

/// Stand-in for a basket device: sends random telemetry frames over one TCP
/// connection, the way the real firmware would.
#[derive(Args, Debug, Clone)]
pub struct SimulateArgs {
    #[arg(long, default_value = "127.0.0.1:2323", help = "Bridge TCP address")]
    addr: String,
    #[arg(long = "device-id", help = "Device id (default: random)")]
    device_id: Option<u32>,
    #[arg(long, default_value_t = 0, help = "Frames to send (0 = unlimited)")]
    count: u64,
    #[arg(long, default_value = "1s", help = "Delay between frames")]
    interval: String,
}

pub async fn run(args: SimulateArgs) -> Result<()> {
    let interval = humantime::parse_duration(&args.interval).context("invalid --interval")?;
    let mut stream = TcpStream::connect(&args.addr)
        .await
        .with_context(|| format!("failed to connect to bridge at {}", args.addr))?;

    let device_id = DeviceId::new(args.device_id.unwrap_or_else(|| rand::rng().random()));
    info!(addr = %args.addr, device = %device_id, "simulator connected");

    let mut sent = 0_u64;
    loop {
        if args.count > 0 && sent >= args.count {
            break;
        }
        let event = random_event(device_id);
        let frame = encode_frame(&event);
        stream.write_all(&frame).await.context("failed to write frame")?;
        debug!(packet_type = %event.packet_type(), bytes = frame.len(), "sent frame");

        sent += 1;
        if args.count == 0 || sent < args.count {
            tokio::time::sleep(interval).await;
        }
    }

    info!(frames = sent, "simulator finished");
    Ok(())
}

fn random_event(device_id: DeviceId) -> TelemetryEvent {
    let mut rng = rand::rng();
    match rng.random_range(0..3_u8) {
        0 => TelemetryEvent::Score { device_id },
        1 => TelemetryEvent::Accelerometer {
            device_id,
            sample: AccelSample {
                acc_x: rng.random_range(-100.0..100.0),
                acc_y: rng.random_range(-100.0..100.0),
                acc_z: rng.random_range(-100.0..100.0),
                gyro_x: rng.random_range(-100.0..100.0),
                gyro_y: rng.random_range(-100.0..100.0),
                gyro_z: rng.random_range(-100.0..100.0),
                temp: rng.random_range(-10.0..50.0),
            },
        },
        _ => TelemetryEvent::CustomButton {
            device_id,
            button_index: rng.random_range(0..4),
        },
    }
}

mod cli;
mod host;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use clap::Parser;
use dotenv::dotenv;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use application::{ConnectionManager, SendOutcome};
use domain::driver::DiscoveredDevice;
use domain::protocol::CommandId;
use infrastructure::TransportFactory;
use infrastructure::config::AgentConfig;

use crate::cli::{Args, Command};
use crate::host::ConsoleHost;

/// Collect discovered devices until the scan window closes, or until
/// `stop_at` tells us we have what we need
async fn collect_devices(
    rx: &mut mpsc::UnboundedReceiver<DiscoveredDevice>,
    window: Duration,
    stop_at: impl Fn(&DiscoveredDevice) -> bool,
) -> Vec<DiscoveredDevice> {
    let deadline = tokio::time::Instant::now() + window;
    let mut devices = Vec::new();

    while let Ok(Some(device)) = tokio::time::timeout_at(deadline, rx.recv()).await {
        info!(id = %device.id, name = %device.name, rssi = ?device.rssi, "🔍 Found robot");
        let done = stop_at(&device);
        devices.push(device);
        if done {
            break;
        }
    }
    devices
}

fn report(action: &str, outcome: SendOutcome) {
    match outcome {
        SendOutcome::Sent => info!("✅ {} sent", action),
        other => warn!(?other, "{} was not sent", action),
    }
}

async fn query(manager: &ConnectionManager, command: CommandId, port: u8) -> Result<()> {
    let handle = manager.request_reading(command, port).await?;
    if !handle.outcome().is_sent() {
        bail!("{} request was not sent ({:?})", command, handle.outcome());
    }
    match handle.wait().await {
        Some(reading) => {
            println!("{} port {}: {}", command, port, reading.value.as_f64());
            Ok(())
        }
        None => bail!("No reply to {} on port {}", command, port),
    }
}

async fn execute(manager: &ConnectionManager, command: Command) -> Result<()> {
    match command {
        Command::Scan => {}
        Command::LedRgb { color: (r, g, b) } => {
            report("LED color", manager.set_led_rgb(r, g, b).await?);
        }
        Command::Traffic {
            port,
            red,
            yellow,
            green,
        } => {
            report(
                "Traffic light",
                manager.set_traffic_light(port, red, yellow, green).await?,
            );
        }
        Command::Motor {
            port,
            direction,
            power,
        } => {
            let outcome = match (direction, power) {
                (Some(direction), Some(power)) => manager.set_motor(port, direction, power).await?,
                (Some(direction), None) => manager.set_motor_direction(port, direction).await?,
                (None, Some(power)) => manager.set_motor_power(port, power).await?,
                (None, None) => bail!("motor needs --direction and/or --power"),
            };
            report("Motor command", outcome);
        }
        Command::Servo { port, a1, a2, a3 } => {
            report("Servo angles", manager.set_servo_angles(port, [a1, a2, a3]).await?);
        }
        Command::Ultrasonic { port } => query(manager, CommandId::GetUltrasonic, port).await?,
        Command::Button { port } => query(manager, CommandId::GetButtonState, port).await?,
        Command::Watch => {
            if manager.settings().poll_targets.is_empty() {
                warn!("No poll targets configured; nothing will be read");
            }
            info!("👀 Watching sensors, press Ctrl-C to stop");
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("🛑 Shutting down..."),
                Err(err) => warn!(error = %err, "Unable to listen for shutdown signal"),
            }
            manager.on_stop_all().await?;
        }
        Command::Stop => manager.on_stop_all().await?,
    }
    Ok(())
}

async fn run() -> Result<()> {
    dotenv().ok();
    let args = Args::parse();

    // 1. Load Configuration
    let mut config = AgentConfig::load(&args.config_dir)?;
    if let Some(kind) = args.transport {
        config.transport.kind = kind;
    }

    // 2. Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_filter.clone()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🤖 VietRobot Agent Starting...");
    info!(config_dir = %args.config_dir, transport = config.transport.kind.as_str(), "✅ Loaded configuration");

    // 3. Transport + driver
    let transport =
        TransportFactory::create_transport(config.transport.kind, config.transport.config.clone())?;
    let manager = ConnectionManager::new(transport, config.driver.clone());
    let (host, mut discovered) = ConsoleHost::new();
    manager.attach(Arc::new(host));

    // 4. Discover
    manager.scan().await?;
    let window = Duration::from_secs(args.scan_secs);
    let wanted = args.device.clone();
    let scan_only = args.command == Command::Scan;
    let devices = collect_devices(&mut discovered, window, |d| match &wanted {
        Some(id) => &d.id == id,
        None => !scan_only,
    })
    .await;

    if scan_only {
        for device in &devices {
            println!("{}\t{}\t{:?}", device.id, device.name, device.rssi);
        }
        if devices.is_empty() {
            println!("No robots found");
        }
        manager.disconnect().await;
        return Ok(());
    }

    let device_id = match (&args.device, devices.first()) {
        (Some(id), _) => id.clone(),
        (None, Some(device)) => device.id.clone(),
        (None, None) => bail!("No robot found within {}s", args.scan_secs),
    };

    // 5. Connect and run the command
    manager.connect(&device_id).await?;
    let result = execute(&manager, args.command).await;

    manager.disconnect().await;
    info!("👋 Good bye!");
    result
}

fn main() {
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("❌ Failed to start runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = rt.block_on(run()) {
        eprintln!("\n❌ CRITICAL ERROR: {:?}", e);
        std::process::exit(1);
    }
}

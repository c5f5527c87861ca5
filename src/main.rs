use clap::Parser;
use log::{error, info};
use pinwatch::bridge::SensorBridge;
use pinwatch::config::{self, Config};
use pinwatch::error::Result;
use pinwatch::hardware::SimulatedBoard;
use pinwatch::mqtt::{MqttClient, MqttTransport};
use pinwatch::service::{Station, dispatch_events, poll_loop};
use pinwatch::transport::MemoryTransport;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tokio::signal;
use tokio::sync::mpsc;

/// Delay before the MQTT event loop polls again after a connection error.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Time given to the event loop to flush queued publishes with `--once`.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Parser, Debug)]
#[command(name = "pinwatch")]
#[command(about = "Publish GPIO sensors and one-wire probes to Home Assistant over MQTT")]
struct Args {
    /// JSON configuration file
    #[arg(long, env = "PINWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Override the poll interval in seconds
    #[arg(long)]
    poll_secs: Option<u64>,

    /// Log what would be published instead of connecting to the broker
    #[arg(long)]
    dry_run: bool,

    /// Run a single poll cycle and exit
    #[arg(long)]
    once: bool,
}

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

fn main() -> ExitCode {
    // Load .env before the runtime spawns any threads
    config::load_dotenv();
    init_logger();

    let args = Args::parse();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to start tokio runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(args)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    info!("Starting pinwatch {}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(secs) = args.poll_secs {
        config.poll.interval_secs = secs;
    }

    let registry = config.registry()?;
    let namer = config.namer()?;
    info!("Configuration loaded:");
    info!("  Device: {}", namer.device_id());
    info!("  MAC: {}", config.device.mac);
    info!("  IP: {}", config.device.ip);
    info!(
        "  Broker: {}:{}",
        config.mqtt.broker_host, config.mqtt.broker_port
    );
    info!("  Poll interval: {}s", config.poll.interval_secs);

    let bridge = SensorBridge::new(registry, namer);
    let period = Duration::from_secs(config.poll.interval_secs.max(1));

    if args.dry_run {
        return run_dry(bridge, period, args.once).await;
    }

    let mqtt_client = MqttClient::new(&config.mqtt);
    let client = mqtt_client.client();
    let transport = MqttTransport::new(client.clone()).with_retain(config.mqtt.retain_discovery);

    let mut station = Station::new(bridge, SimulatedBoard::new(), transport);
    station.setup()?;
    let station = station.shared();

    let (tx, rx) = mpsc::channel(100);
    let mut mqtt_handle = tokio::spawn(mqtt_client.run(tx, RECONNECT_DELAY));
    let dispatch_handle = tokio::spawn(dispatch_events(station.clone(), rx));

    info!("pinwatch is running, press Ctrl+C to exit");

    tokio::select! {
        _ = poll_loop(station.clone(), period, args.once) => {
            if args.once {
                // Queue the disconnect behind the cycle's publishes
                if let Err(e) = client.disconnect().await {
                    error!("[MQTT] Disconnect failed: {}", e);
                }
            }
        }
        result = signal::ctrl_c() => {
            match result {
                Ok(()) => info!("Received shutdown signal"),
                Err(e) => error!("Failed to listen for shutdown signal: {}", e),
            }
        }
    }

    if args.once
        && tokio::time::timeout(FLUSH_TIMEOUT, &mut mqtt_handle)
            .await
            .is_err()
    {
        error!("[MQTT] Timed out flushing publishes");
    }

    dispatch_handle.abort();
    mqtt_handle.abort();
    info!("pinwatch stopped");
    Ok(())
}

/// Poll the simulated board and log every message instead of publishing it.
async fn run_dry(bridge: SensorBridge, period: Duration, once: bool) -> Result<()> {
    let mut station = Station::new(bridge, SimulatedBoard::new(), MemoryTransport::new());
    station.setup()?;
    for topic in station.transport.subscriptions() {
        info!("[Sim] Would subscribe to {}", topic);
    }

    let mut interval = tokio::time::interval(period);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                station.cycle();
                for message in station.transport.take() {
                    info!("[Sim] {} <- {}", message.topic, message.payload_str());
                }
                if once {
                    return Ok(());
                }
            }
            _ = signal::ctrl_c() => {
                info!("Received shutdown signal");
                return Ok(());
            }
        }
    }
}

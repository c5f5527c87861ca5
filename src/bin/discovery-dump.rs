//! Print the discovery documents and state values a device would publish.
//!
//! Usage:
//!   cargo run --bin discovery-dump -- --config pinwatch.json --high 5 --high 7
//!   cargo run --bin discovery-dump -- --probe 28ff641e0f84039a=71.5
//!
//! Loads the configuration, drives a simulated board with the requested pin
//! levels and probe readings, and runs one forced cycle against an in-memory
//! transport. Nothing is sent to a broker.

use clap::Parser;
use log::{error, info};
use pinwatch::bridge::SensorBridge;
use pinwatch::config::{self, Config};
use pinwatch::error::{BridgeError, Result};
use pinwatch::hardware::SimulatedBoard;
use pinwatch::sensors::ProbeAddress;
use pinwatch::service::Station;
use pinwatch::transport::MemoryTransport;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "discovery-dump")]
#[command(about = "Print what pinwatch would publish for a given pin state")]
struct Cli {
    /// JSON configuration file
    #[arg(long, env = "PINWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Pin to read as high (repeatable)
    #[arg(long = "high", value_name = "PIN")]
    high: Vec<i8>,

    /// Probe reading as ADDRESS=FAHRENHEIT (repeatable)
    #[arg(long = "probe", value_name = "ADDRESS=TEMP")]
    probes: Vec<String>,

    /// Pretty-print discovery documents
    #[arg(long)]
    pretty: bool,
}

fn parse_probe(arg: &str) -> Result<(ProbeAddress, f32)> {
    let invalid =
        || BridgeError::InvalidConfig(format!("bad probe {arg:?}, expected ADDRESS=TEMP"));
    let (address, temp) = arg.split_once('=').ok_or_else(invalid)?;
    let address = address.trim();
    if address.len() != 16 || !address.is_ascii() {
        return Err(invalid());
    }
    let mut bytes = [0u8; 8];
    for (i, byte) in bytes.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&address[i * 2..i * 2 + 2], 16).map_err(|_| invalid())?;
    }
    let temp = temp.trim().parse().map_err(|_| invalid())?;
    Ok((ProbeAddress(bytes), temp))
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    let bridge = SensorBridge::new(config.registry()?, config.namer()?);

    let mut board = SimulatedBoard::new();
    for pin in &cli.high {
        board.set_pin(*pin, true);
    }
    let probes = cli
        .probes
        .iter()
        .map(String::as_str)
        .map(parse_probe)
        .collect::<Result<Vec<_>>>()?;

    let mut station = Station::new(bridge, board, MemoryTransport::new());
    station.setup()?;
    for pin in &cli.high {
        // Setup drives switches low; put the requested levels back
        station.hardware.set_pin(*pin, true);
    }

    // A probe is only trusted after three agreeing samples
    let mut report = None;
    for _ in 0..3 {
        for (address, temp) in &probes {
            station.hardware.set_probe(*address, *temp);
        }
        station.transport.take();
        station.bridge.force_announce();
        report = Some(station.cycle());
    }

    for topic in station.transport.subscriptions() {
        println!("SUBSCRIBE {topic}");
    }
    for message in station.transport.messages() {
        if message.streamed {
            let payload = if cli.pretty {
                serde_json::from_slice::<serde_json::Value>(&message.payload)
                    .and_then(|value| serde_json::to_string_pretty(&value))?
            } else {
                message.payload_str().to_string()
            };
            println!("{} ({} bytes)\n{}\n", message.topic, message.payload.len(), payload);
        } else {
            println!("{} = {}\n", message.topic, message.payload_str());
        }
    }

    if let Some(report) = report {
        info!("{:?}", report);
    }
    Ok(())
}

fn main() -> ExitCode {
    config::load_dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

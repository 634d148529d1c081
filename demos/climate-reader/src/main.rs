//! `climate-reader` reads the sensors attached to a single-board computer and
//! prints their measurements, either as text or as a JSON object.
//!
//! The exit code is non-zero when any requested reading fails.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};

use envsense_drivers::bme680::{self, Address};
use envsense_drivers::{dht22, mhz19c};

use envsense_os::edge::{Edge, Sysfs};
use envsense_os::gpio::Pin;
use envsense_os::{Config, read_bme680, read_dht22, read_mhz19c};

use serde::Serialize;

use tracing::{error, info};
use tracing_subscriber::filter::LevelFilter;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// JSON configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print measurements as a JSON object.
    #[arg(long)]
    json: bool,

    /// Increase logging verbosity (-v for debug, -vv for trace).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// BCM index of the DHT22 data line.
    #[arg(long)]
    dht22_pin: Option<u8>,

    /// I²C device of the BME680.
    #[arg(long)]
    i2c_bus: Option<PathBuf>,

    /// I²C address of the BME680 (0x76 or 0x77).
    #[arg(long, value_parser = parse_address)]
    i2c_address: Option<Address>,

    /// Serial port of the MH-Z19C.
    #[arg(long)]
    serial_port: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Clone, Copy, PartialEq, Eq, Debug)]
enum Command {
    /// Read humidity and temperature from the DHT22.
    Dht22,
    /// Read temperature, pressure and humidity from the BME680.
    Bme680,
    /// Read the CO₂ concentration from the MH-Z19C.
    Mhz19c,
    /// Read every sensor.
    All,
    /// Wait for an edge on a GPIO line.
    Edge {
        /// BCM index of the line.
        pin: u8,

        /// Transition to wait for.
        #[arg(long, value_enum, default_value_t = EdgeKind::Falling)]
        edge: EdgeKind,

        /// Give up after this many milliseconds instead of waiting forever.
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
}

#[derive(ValueEnum, Clone, Copy, PartialEq, Eq, Debug)]
enum EdgeKind {
    Falling,
    Rising,
    Both,
}

impl From<EdgeKind> for Edge {
    fn from(kind: EdgeKind) -> Self {
        match kind {
            EdgeKind::Falling => Edge::Falling,
            EdgeKind::Rising => Edge::Rising,
            EdgeKind::Both => Edge::Both,
        }
    }
}

#[derive(Default, Serialize)]
struct Report {
    #[serde(skip_serializing_if = "Option::is_none")]
    dht22: Option<dht22::Measurement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bme680: Option<bme680::Measurement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mhz19c: Option<mhz19c::Measurement>,
}

fn parse_address(s: &str) -> Result<Address, String> {
    let value = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse(),
    }
    .map_err(|e| format!("invalid address `{s}`: {e}"))?;

    Address::try_from(value).map_err(|v| format!("{v:#04x} is not a BME680 address"))
}

fn load_config(cli: &Cli) -> envsense_os::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    if let Some(pin) = cli.dht22_pin {
        config.dht22.pin = pin;
    }
    if let Some(bus) = &cli.i2c_bus {
        config.bme680.bus.clone_from(bus);
    }
    if let Some(address) = cli.i2c_address {
        config.bme680.address = address;
    }
    if let Some(port) = &cli.serial_port {
        config.mhz19c.port.clone_from(port);
    }

    Ok(config)
}

const fn level(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

// Logs a failed reading and flags the run as failed.
fn record<T>(result: envsense_os::Result<T>, failed: &mut bool) -> Option<T> {
    result
        .inspect_err(|e| {
            error!("{e}");
            *failed = true;
        })
        .ok()
}

fn print_text(report: &Report) {
    if let Some(m) = report.dht22 {
        println!(
            "DHT22   temperature {:.1} °C, humidity {:.1} %RH",
            m.temperature, m.humidity
        );
    }
    if let Some(m) = report.bme680 {
        println!(
            "BME680  temperature {:.2} °C, pressure {:.2} hPa, humidity {:.3} %RH",
            m.temperature, m.pressure, m.humidity
        );
    }
    if let Some(m) = report.mhz19c {
        println!("MH-Z19C CO₂ {} ppm", m.co2);
    }
}

fn read_sensors(cli: &Cli, config: &Config) -> ExitCode {
    let wanted = |sensor: Command| cli.command == sensor || cli.command == Command::All;

    let mut failed = false;
    let mut report = Report::default();

    if wanted(Command::Dht22) {
        report.dht22 = record(read_dht22(config), &mut failed);
    }
    if wanted(Command::Bme680) {
        report.bme680 = record(read_bme680(config), &mut failed);
    }
    if wanted(Command::Mhz19c) {
        report.mhz19c = record(read_mhz19c(config), &mut failed);
    }

    if cli.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                error!("Unable to serialize the report: {e}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        print_text(&report);
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn wait_for_edge(
    config: &Config,
    pin: u8,
    edge: EdgeKind,
    timeout_ms: Option<u64>,
) -> envsense_os::Result<bool> {
    let pin = Pin::new(pin)?;
    let timeout = timeout_ms.map(Duration::from_millis);

    info!("Waiting for a {edge:?} edge on GPIO {}.", pin.index());

    Sysfs::new(&config.gpio.sysfs).wait_for_edge(pin, edge.into(), timeout)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr, stdout only carries measurements.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level(cli.verbose))
        .init();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Command::Edge {
            pin,
            edge,
            timeout_ms,
        } => match wait_for_edge(&config, pin, edge, timeout_ms) {
            Ok(true) => {
                println!("edge");
                ExitCode::SUCCESS
            }
            Ok(false) => {
                println!("timeout");
                ExitCode::FAILURE
            }
            Err(e) => {
                error!("{e}");
                ExitCode::FAILURE
            }
        },
        _ => read_sensors(&cli, &config),
    }
}

//! # Bematech CLI
//!
//! Command-line interface for inspecting a Bematech fiscal printer.
//!
//! ## Usage
//!
//! ```bash
//! # Status bytes and decoded fault
//! bematech status
//!
//! # Read a register by id or name
//! bematech register 6
//! bematech register serial
//!
//! # Last closing report as JSON
//! bematech last-closing
//!
//! # Use another device, more logging
//! bematech --device /dev/ttyS0 --baud 9600 -v taxes
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use bematech::{
    FiscalError, FiscalPrinter,
    printer::config::{CAPABILITIES, ConnectionConfig},
    protocol::registers::{self, REGISTERS, RegisterValue},
};

/// Bematech - Fiscal printer utility
#[derive(Parser, Debug)]
#[command(name = "bematech")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Printer device path
    #[arg(long, global = true)]
    device: Option<String>,

    /// Line speed
    #[arg(long, global = true)]
    baud: Option<u32>,

    /// JSON connection config file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the status bytes
    Status,

    /// Read one register
    Register {
        /// Register id or name (see `registers`)
        register: String,
    },

    /// Print the serial number
    Serial,

    /// Print the last closing report as JSON
    LastClosing,

    /// List programmed tax rates
    Taxes,

    /// List programmed payment methods
    Payments,

    /// List the field limits of the printer
    Capabilities,

    /// List the known registers
    Registers,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn run(cli: Cli) -> Result<(), FiscalError> {
    // Commands that never touch the device
    match &cli.command {
        Commands::Registers => {
            println!("{:>4}  {:<22} {:>5}  packed", "id", "name", "width");
            for r in REGISTERS {
                println!("{:>4}  {:<22} {:>5}  {}", r.id, r.name, r.width, r.packed);
            }
            return Ok(());
        }
        Commands::Capabilities => {
            let table: serde_json::Map<String, serde_json::Value> = CAPABILITIES
                .iter()
                .map(|(name, cap)| Ok(((*name).to_string(), serde_json::to_value(cap)?)))
                .collect::<Result<_, serde_json::Error>>()
                .map_err(json_error)?;
            print_json(&table)?;
            return Ok(());
        }
        _ => {}
    }

    let connection = connection_config(&cli)?;
    run_device(cli.command, &connection)
}

#[cfg(not(unix))]
fn run_device(_command: Commands, _connection: &ConnectionConfig) -> Result<(), FiscalError> {
    Err(FiscalError::Transport(
        "serial printers are only supported on Unix".to_string(),
    ))
}

#[cfg(unix)]
fn run_device(command: Commands, connection: &ConnectionConfig) -> Result<(), FiscalError> {
    let mut printer = FiscalPrinter::open(connection)?;

    match command {
        Commands::Status => {
            let status = printer.status()?;
            println!(
                "ack=0x{:02X} st1=0x{:02X} st2=0x{:02X}",
                status.ack, status.st1, status.st2
            );
            println!("coupon open: {}", status.is_coupon_open());
            match status.fault() {
                Some(fault) => println!("fault: {}", fault),
                None => println!("fault: none"),
            }
        }
        Commands::Register { register } => {
            let id = resolve_register(&register)?;
            match printer.read_register(id)? {
                RegisterValue::Number(n) => println!("{}", n),
                RegisterValue::Bytes(bytes) => println!("{:02X?}", bytes),
            }
        }
        Commands::Serial => println!("{}", printer.serial_number()?),
        Commands::LastClosing => match printer.last_closing()? {
            Some(report) => print_json(&report)?,
            None => println!("No closing recorded"),
        },
        Commands::Taxes => print_json(&printer.tax_constants()?)?,
        Commands::Payments => print_json(&printer.payment_methods()?)?,
        Commands::Registers | Commands::Capabilities => {}
    }

    Ok(())
}

/// File config first, then command-line overrides.
fn connection_config(cli: &Cli) -> Result<ConnectionConfig, FiscalError> {
    let mut config = match &cli.config {
        Some(path) => ConnectionConfig::from_json_file(path)?,
        None => ConnectionConfig::default(),
    };
    if let Some(device) = &cli.device {
        config.device = device.clone();
    }
    if let Some(baud) = cli.baud {
        config.baud_rate = baud;
    }
    log::debug!("connection: {:?}", config);
    Ok(config)
}

fn resolve_register(arg: &str) -> Result<u8, FiscalError> {
    if let Ok(id) = arg.parse::<u8>() {
        return Ok(id);
    }
    registers::by_name(arg)
        .map(|r| r.id)
        .ok_or_else(|| FiscalError::Config(format!("Unknown register: {}", arg)))
}

fn print_json<S: serde::Serialize>(value: &S) -> Result<(), FiscalError> {
    let text = serde_json::to_string_pretty(value).map_err(json_error)?;
    println!("{}", text);
    Ok(())
}

fn json_error(e: serde_json::Error) -> FiscalError {
    FiscalError::Config(format!("JSON output failed: {}", e))
}

//! Fan control for Clevo laptops.
//!
//! Without a subcommand this starts the privileged worker and a terminal
//! console for monitoring and manual control. `dump` and `set` talk to the
//! EC directly and exit.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use clevo_fan::config::Config;
use clevo_fan::duty::Duty;
use clevo_fan::ec::EmbeddedController;
use clevo_fan::ec::port::{DEV_PORT, DevPort};
use clevo_fan::supervisor;
use clevo_fan::telemetry::{DEFAULT_BANK_PATH, EcReadings};

#[derive(Debug, Parser)]
#[command(version, about = "Fan control for Clevo laptops")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// EC register bank dump read by the worker.
    #[arg(long, global = true, env = "CLEVO_FAN_BANK_PATH", default_value = DEFAULT_BANK_PATH)]
    bank_path: PathBuf,

    /// Port I/O device used to talk to the EC.
    #[arg(long, global = true, env = "CLEVO_FAN_PORT_PATH", default_value = DEV_PORT)]
    port_path: PathBuf,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the auto fan controller with a status console (default).
    Run,
    /// Print current fan and temperature readings.
    Dump {
        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Set a fixed fan duty, then print readings.
    Set {
        /// Duty percentage, 0 to 100.
        #[arg(allow_negative_numbers = true)]
        percent: i64,
    },
}

fn main() -> Result<()> {
    clevo_fan::tracing::init();
    let cli = Cli::parse();

    let config = Config {
        bank_path: cli.bank_path,
        port_path: cli.port_path,
        ..Config::default()
    };

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => supervisor::run(&config)?,
        Command::Dump { json } => cmd_dump(&config, json)?,
        Command::Set { percent } => cmd_set(&config, percent)?,
    }

    Ok(())
}

fn open_ec(config: &Config) -> Result<EmbeddedController<DevPort>> {
    Ok(EmbeddedController::new(DevPort::open(&config.port_path)?))
}

/// Print readings queried register by register.
fn cmd_dump(config: &Config, json: bool) -> Result<()> {
    let readings = open_ec(config)?.query_readings()?;
    print_readings(&readings, json)
}

/// Write a duty to both fans and print the result.
fn cmd_set(config: &Config, percent: i64) -> Result<()> {
    let duty = Duty::try_from(percent)?;
    let mut ec = open_ec(config)?;

    println!("Change fan duty to {duty}");
    ec.write_fan_duty(duty)?;
    println!();

    print_readings(&ec.query_readings()?, false)
}

fn print_readings(readings: &EcReadings, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(readings)?);
        return Ok(());
    }

    println!("Dump fan information");
    println!("  CPU FAN Duty: {}", readings.cpu_duty);
    println!("  GPU FAN Duty: {}", readings.gpu_duty);
    println!("  CPU FAN RPMs: {} RPM", readings.fan_rpm[0]);
    println!("  GPU FAN RPMs: {} RPM", readings.fan_rpm[1]);
    println!("  CPU Temp: {}°C", readings.cpu_temp_c);
    Ok(())
}

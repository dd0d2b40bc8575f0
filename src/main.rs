//! Command-line surface for the Lake Shore Model 625
//!
//! One flag per device operation. Each invocation opens the serial port, performs the
//! requested action(s) in a fixed order, and exits; `--log` then keeps the connection open and
//! records ramp data until interrupted.

use std::{
    path::PathBuf,
    time::Duration,
};
use anyhow::Context;
use clap::Parser;
use tokio_serial::SerialPortBuilderExt;
use tracing::debug;
use ls625::{ Ampere, AmpPerSec, Limits, Ls625, RampLogger, Volt };

/// Lake Shore 625 superconducting magnet power supply controller
///
/// Serial settings: 9600 baud, 7 data bits, odd parity, 1 stop bit.
#[derive(Parser, Debug)]
#[command(name = "ls625")]
#[command(about = "Lake Shore 625 superconducting magnet power supply controller")]
#[command(version)]
struct Args
{
    /// Serial port the supply is connected to
    #[arg(long, default_value = "/dev/ttyUSB0")]
    port: String,

    /// Seconds to wait for a query reply before giving up
    #[arg(long, default_value_t = 2.0)]
    read_timeout: f64,

    /// Get device information (*IDN?, BAUD?)
    #[arg(long)]
    info: bool,

    /// Get the current baud rate setting (BAUD?)
    #[arg(long)]
    get_baud: bool,

    /// Get the magnetic field reading (RDGF?)
    #[arg(long)]
    get_field: bool,

    /// Get the output current reading (RDGI?)
    #[arg(long)]
    get_current: bool,

    /// Get the output voltage reading (RDGV?)
    #[arg(long)]
    get_voltage: bool,

    /// Get the target current setting (SETI?)
    #[arg(long)]
    get_target_current: bool,

    /// Set the target current in amps (SETI)
    #[arg(long, value_name = "CURRENT")]
    set_current: Option<f64>,

    /// Get the compliance voltage limit (SETV?)
    #[arg(long)]
    get_compliance_voltage: bool,

    /// Set the compliance voltage limit in volts (SETV)
    #[arg(long, value_name = "VOLTAGE")]
    set_compliance_voltage: Option<f64>,

    /// Get the ramp rate (RATE?)
    #[arg(long)]
    get_rate: bool,

    /// Set the ramp rate in amps per second (RATE)
    #[arg(long, value_name = "RATE")]
    set_rate: Option<f64>,

    /// Start the current ramp (RAMP)
    #[arg(long)]
    start_ramp: bool,

    /// Stop the current ramp (STOP)
    #[arg(long)]
    stop_ramp: bool,

    /// Get all max limits (LIMIT?)
    #[arg(long)]
    get_max_limits: bool,

    /// Set max limits: current (0-60.1 A), voltage (0.1-5.0 V), rate (0.0001-99.999 A/s)
    #[arg(long, num_args = 3, value_names = ["CURRENT", "VOLTAGE", "RATE"])]
    set_max_limits: Option<Vec<f64>>,

    /// Get the quench detection status (QNCH?)
    #[arg(long)]
    quench_status: bool,

    /// Enable quench detection (QNCH 1)
    #[arg(long)]
    enable_quench: bool,

    /// Disable quench detection (QNCH 0)
    #[arg(long)]
    disable_quench: bool,

    /// Get the decoded operational status (OPST?)
    #[arg(long)]
    status: bool,

    /// Send a raw command line to the device
    #[arg(long, value_name = "COMMAND")]
    raw_command: Option<String>,

    /// Poll and record ramp data until interrupted
    #[arg(long)]
    log: bool,

    /// Seconds between log samples
    #[arg(long, default_value_t = 60)]
    log_interval: u64,

    /// Directory the log files are written into
    #[arg(long, default_value = "ramps")]
    log_dir: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()>
{
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let port = tokio_serial::new(&args.port, 9600)
        .data_bits(tokio_serial::DataBits::Seven)
        .parity(tokio_serial::Parity::Odd)
        .stop_bits(tokio_serial::StopBits::One)
        .flow_control(tokio_serial::FlowControl::None)
        .open_native_async()
        .with_context(|| format!("failed to open serial port {}", args.port))?;

    debug!("opened {}", args.port);

    let mut device = Ls625::with_timeout(port, Duration::from_secs_f64(args.read_timeout));

    // A raw command bypasses everything else, like a terminal session would
    if let Some(line) = &args.raw_command {
        println!("Command: {}", line);

        if let Some(reply) = device.raw_command(line).await? {
            println!("Response: {}", reply);
        }

        return Ok(());
    }

    if args.info {
        let identification = device.identification().await?;
        let baud = device.baud_rate().await?;
        println!("Device Information:");
        println!("  ID: {}", identification);
        println!("  Baud Rate: {} baud", baud);
    }

    if args.get_baud {
        let baud = device.baud_rate().await?;
        println!("Current baud rate: {} baud", baud);
    }

    if args.get_field {
        let field = device.get_field().await?;
        println!("Magnetic field: {} T", field);
    }

    if args.get_current {
        let current = device.get_current().await?;
        println!("Current: {} A", current);
    }

    if args.get_voltage {
        let voltage = device.get_voltage().await?;
        println!("Voltage: {} V", voltage);
    }

    if args.get_target_current {
        let target = device.get_target_current().await?;
        println!("Target current: {} A", target);
    }

    if args.get_compliance_voltage {
        let compliance = device.get_compliance_voltage().await?;
        println!("Compliance voltage limit: {} V", compliance);
    }

    if let Some(volts) = args.set_compliance_voltage {
        device.set_compliance_voltage(Volt::from_f64(volts)).await?;
        println!("Set compliance voltage limit to {} V", volts);
    }

    if let Some(amps) = args.set_current {
        device.set_target_current(Ampere::from_f64(amps)).await?;
        println!("Set target current to {} A", amps);
    }

    if args.get_rate {
        let rate = device.get_ramp_rate().await?;
        println!("Ramp rate: {} A/s", rate);
    }

    if let Some(rate) = args.set_rate {
        device.set_ramp_rate(AmpPerSec::from_f64(rate)).await?;
        println!("Set ramp rate to {} A/s", rate);
    }

    if args.start_ramp {
        device.start_ramp().await?;
        println!("Started current ramp");
        println!("Tip: run with --log in a separate terminal to record ramp data");
    }

    if args.stop_ramp {
        device.stop_ramp().await?;
        println!("Stopped current ramp");
    }

    if args.quench_status {
        let quench = device.get_quench_detection().await?;
        println!(
            "Quench detection: {}",
            if quench.enabled { "ON" } else { "OFF" },
        );
        println!("Step limit: {} A/s", quench.step_limit);
    }

    if args.enable_quench {
        device.enable_quench_detection().await?;
        println!("Enabled quench detection");
    }

    if args.disable_quench {
        device.disable_quench_detection().await?;
        println!("Disabled quench detection");
    }

    if args.status {
        let status = device.get_status().await?;
        println!("Status: {}", status);
    }

    if args.get_max_limits {
        let limits = device.get_max_limits().await?;
        println!("Current limit: {} A", limits.current);
        println!("Voltage limit: {} V", limits.voltage);
        println!("Rate limit: {} A/s", limits.rate);
    }

    if let Some(values) = &args.set_max_limits {
        let limits = Limits {
            current: Ampere::from_f64(values[0]),
            voltage: Volt::from_f64(values[1]),
            rate: AmpPerSec::from_f64(values[2]),
        };

        device.set_max_limits(limits).await?;
        println!(
            "Set limits to: Current={} A, Voltage={} V, Rate={} A/s",
            limits.current, limits.voltage, limits.rate,
        );
    }

    if args.log {
        let mut logger = RampLogger::create(device, &args.log_dir)
            .with_context(|| format!("failed to create log file under {}", args.log_dir.display()))?;

        println!("Recording interval: {} seconds", args.log_interval);
        println!("Log file: {}", logger.path().display());
        println!("Press Ctrl+C to stop recording");

        tokio::select! {
            result = logger.run(Duration::from_secs(args.log_interval)) => {
                result.context("ramp logging aborted")?;
            }
            _ = tokio::signal::ctrl_c() => {}
        }

        println!();
        println!("Stopped ramp data logging");
        println!("Total readings recorded: {}", logger.records());
        println!("File location: {}", logger.path().display());
    }

    Ok(())
}

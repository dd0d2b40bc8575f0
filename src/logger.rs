//! Fixed-interval ramp logging
//!
//! # Purpose
//! Repeatedly samples the supply's ramp rate, output current, output voltage, and field at a
//! fixed interval and appends one timestamped row per tick to a newly created CSV file. One
//! bad sample must not lose the rest of a monitoring window, so a failed query is reported and
//! the loop carries on; the tick's row is still written with the failed column left blank.
//!
//! The logger never decides to stop on its own. Termination comes from the caller, normally on
//! an interrupt signal, which drops the logger and with it the serial connection.

use std::{
    io,
    fs::{ self, File },
    path::{ Path, PathBuf },
    time::{ Duration, Instant },
};
use chrono::{ DateTime, Local };
use tokio::io::{ AsyncReadExt, AsyncWriteExt };
use tokio::time::{ self, MissedTickBehavior };
use tracing::{ info, warn };
use crate::{
    device::Ls625,
    units::{ Ampere, AmpPerSec, Tesla, Volt },
};

const CSV_HEADER: [&str; 6] = [
    "timestamp",
    "elapsed_s",
    "ramp_rate_a_per_s",
    "current_a",
    "voltage_v",
    "field_t",
];

/// One sampled row of the ramp log
///
/// A `None` reading means that query failed on this tick; the row is still recorded with the
/// column left blank.
#[derive(Debug, Clone)]
pub struct RampRecord
{
    pub timestamp: DateTime<Local>,
    pub elapsed: Duration,
    pub ramp_rate: Option<AmpPerSec>,
    pub current: Option<Ampere>,
    pub voltage: Option<Volt>,
    pub field: Option<Tesla>,
}

impl RampRecord
{
    /// Whether every reading on this tick succeeded
    pub fn is_complete(&self) -> bool
    {
        self.ramp_rate.is_some()
            && self.current.is_some()
            && self.voltage.is_some()
            && self.field.is_some()
    }

    fn csv_fields(&self) -> [String; 6]
    {
        [
            self.timestamp.to_rfc3339(),
            format!("{:.1}", self.elapsed.as_secs_f64()),
            format_reading(self.ramp_rate.map(|rate| rate.as_f64())),
            format_reading(self.current.map(|amps| amps.as_f64())),
            format_reading(self.voltage.map(|volts| volts.as_f64())),
            format_reading(self.field.map(|tesla| tesla.as_f64())),
        ]
    }
}

fn format_reading(maybe_value: Option<f64>) -> String
{
    match maybe_value {
        Some(value) => format!("{:.4}", value),
        None => String::new(),
    }
}

/// Finds an unused log file name for today's date
///
/// The base name is `<YYYY-MM-DD>_ramp_log.csv`; when taken, a numeric suffix counts up until
/// a free name appears, so an earlier session's record is never clobbered.
fn next_free_path(dir: &Path) -> PathBuf
{
    let date = Local::now().format("%Y-%m-%d");
    let base = dir.join(format!("{}_ramp_log.csv", date));

    if !base.exists() {
        return base;
    }

    let mut counter = 1u32;

    loop {
        let numbered = dir.join(format!("{}_ramp_log_{}.csv", date, counter));

        if !numbered.exists() {
            return numbered;
        }

        counter += 1;
    }
}

fn csv_to_io(err: csv::Error) -> io::Error
{
    io::Error::new(io::ErrorKind::Other, err)
}

macro_rules! read_or_warn
{
    ($query:expr, $what:literal) => {
        match $query.await {
            Ok(value) => Some(value),
            Err(err) => {
                warn!("{} query failed: {}", $what, err);
                None
            }
        }
    }
}

/// Interval sampler writing the supply's readings to a CSV file
pub struct RampLogger<T>
{
    device: Ls625<T>,
    writer: csv::Writer<File>,
    path: PathBuf,
    started: Instant,
    records: u64,
}

impl <T> RampLogger<T>
    where T: AsyncReadExt + AsyncWriteExt + Unpin + Send
{
    /// Creates the output directory and a fresh log file with its header row
    pub fn create(device: Ls625<T>, out_dir: &Path) -> Result<Self, io::Error>
    {
        fs::create_dir_all(out_dir)?;

        let path = next_free_path(out_dir);
        let file = File::create(&path)?;
        let mut writer = csv::Writer::from_writer(file);

        writer.write_record(CSV_HEADER).map_err(csv_to_io)?;
        writer.flush()?;

        Ok(Self {
            device: device,
            writer: writer,
            path: path,
            started: Instant::now(),
            records: 0,
        })
    }

    /// The file this session is writing to
    pub fn path(&self) -> &Path
    {
        &self.path
    }

    /// How many rows have been appended so far
    pub fn records(&self) -> u64
    {
        self.records
    }

    /// Takes one sample and appends its row to the log file
    ///
    /// Query failures are isolated per reading: the failed column is logged to the console and
    /// left blank in the row. Only a failure to write the file itself is an error.
    pub async fn sample(&mut self) -> Result<RampRecord, io::Error>
    {
        let timestamp = Local::now();
        let elapsed = self.started.elapsed();

        let ramp_rate = read_or_warn!(self.device.get_ramp_rate(), "ramp rate");
        let current = read_or_warn!(self.device.get_current(), "current");
        let voltage = read_or_warn!(self.device.get_voltage(), "voltage");
        let field = read_or_warn!(self.device.get_field(), "field");

        let record = RampRecord {
            timestamp: timestamp,
            elapsed: elapsed,
            ramp_rate: ramp_rate,
            current: current,
            voltage: voltage,
            field: field,
        };

        self.writer.write_record(record.csv_fields()).map_err(csv_to_io)?;
        self.writer.flush()?;
        self.records += 1;

        Ok(record)
    }

    /// Samples at the given interval until the future is dropped
    ///
    /// The first sample is taken immediately. Returns only on a file write error; query
    /// failures never terminate the session.
    pub async fn run(&mut self, interval: Duration) -> Result<(), io::Error>
    {
        info!(
            "logging to {} every {} s",
            self.path.display(),
            interval.as_secs_f64(),
        );

        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.sample().await?;
        }
    }
}

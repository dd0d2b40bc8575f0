//! Device definition and APIs
//!
//! # Purpose
//! This module defines a handle to an active I/O stream which provides high-level RPCs for:
//!   - Setting the operating point (target current, compliance voltage, ramp rate)
//!   - Configuring quench protection (limits, detection on/off)
//!   - Reading back measurements, settings, and the operational status
//!   - Starting and stopping the current ramp
//!
//! The handle never caches device state. The physical supply is the sole source of truth and
//! may be altered from the front panel or by other tools between calls, so every set is a
//! fresh write and every get is a fresh query.
//!
//! # Cancel Safety
//! **The query RPCs are not cancel safe,** i.e. they should not be used in a `tokio::select!`
//! call. Each has both a write and a read, so cancelling after the write but before the read
//! will leave the reply in the line and misalign it with the next query. Set RPCs are a single
//! write and carry no such hazard.

use std::time::Duration;
use tokio::io::{ AsyncReadExt, AsyncWriteExt };
use crate::{
    cmd::CmdSet,
    executor::Executor,
    response::{
        parse_reading, BaudSetting, CommandError, Limits, OperationStatus, QuenchStatus,
        RangeError,
    },
    units::{ Ampere, AmpPerSec, Tesla, Volt },
};

/// How long a query waits for its reply line before giving up
///
/// Matches the transport timeout the instrument's serial interface is documented against.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(2);

/// Settable spans as documented in the Model 625 manual
///
/// The instrument silently ignores out-of-span settings, so the handle range-checks them
/// before transmission and fails loudly instead.
const CURRENT_LIMIT_SPAN: (f64, f64) = (0.0, 60.1);
const VOLTAGE_LIMIT_SPAN: (f64, f64) = (0.1, 5.0);
const RATE_LIMIT_SPAN: (f64, f64) = (0.0001, 99.999);

fn check_span(
    param: &'static str,
    unit: &'static str,
    value: f64,
    span: (f64, f64),
)
    -> Result<(), CommandError>
{
    if value < span.0 || value > span.1 {
        Err(CommandError::from(RangeError {
            param: param,
            unit: unit,
            value: value,
            min: span.0,
            max: span.1,
        }))
    }
    else {
        Ok(())
    }
}

/// A connected Lake Shore Model 625 superconducting magnet power supply
pub struct Ls625<T>
{
    io_handle: Executor<T>,
}

impl <T> Ls625<T>
    where T: AsyncReadExt + AsyncWriteExt + Unpin + Send
{
    /// Construct a new device handle from an async I/O stream
    ///
    /// Creating I/O handles is not handled by this library so that you are not restricted to
    /// connecting to the device via a particular hardware interface. For instance, it may be
    /// desirable to use a TCP/IP serial bridge so that the supply can be controlled remotely
    /// instead of over a local RS232 line.
    ///
    /// Commands are terminated with CR+LF as the instrument requires.
    pub fn with(io_handle: T) -> Self
    {
        Self::with_timeout(io_handle, DEFAULT_READ_TIMEOUT)
    }

    /// Construct a new device handle with an explicit query read timeout
    pub fn with_timeout(io_handle: T, read_timeout: Duration) -> Self
    {
        Self {
            io_handle: Executor::with("\r\n", read_timeout, io_handle),
        }
    }

    /// Set the target output current in amps
    ///
    /// With the supply in ramp mode this starts the physical ramp immediately. That is a
    /// hardware side effect outside process control; this method's only responsibility is
    /// correct transmission.
    pub async fn set_target_current(&mut self, amps: Ampere) -> Result<(), CommandError>
    {
        self.io_handle.send(CmdSet::SetCurrent(amps)).await
    }

    /// Set the compliance voltage ceiling in volts
    pub async fn set_compliance_voltage(&mut self, volts: Volt) -> Result<(), CommandError>
    {
        check_span("Compliance voltage", "V", volts.as_f64(), VOLTAGE_LIMIT_SPAN)?;
        self.io_handle.send(CmdSet::SetComplianceVoltage(volts)).await
    }

    /// Set the output current ramp rate in amps per second
    pub async fn set_ramp_rate(&mut self, rate: AmpPerSec) -> Result<(), CommandError>
    {
        self.io_handle.send(CmdSet::SetRampRate(rate)).await
    }

    /// Set all three quench protection limits with a single command
    ///
    /// The limits must exceed the corresponding operating setpoints or the supply will abort
    /// the ramp before the target is reached. That ordering lives on the operator: the
    /// hardware is the authority on its own protection state and this handle does not try to
    /// second-guess it.
    pub async fn set_max_limits(&mut self, limits: Limits) -> Result<(), CommandError>
    {
        check_span("Current limit", "A", limits.current.as_f64(), CURRENT_LIMIT_SPAN)?;
        check_span("Voltage limit", "V", limits.voltage.as_f64(), VOLTAGE_LIMIT_SPAN)?;
        check_span("Rate limit", "A/s", limits.rate.as_f64(), RATE_LIMIT_SPAN)?;

        self.io_handle.send(CmdSet::SetLimits(limits)).await
    }

    /// Turn quench detection on
    pub async fn enable_quench_detection(&mut self) -> Result<(), CommandError>
    {
        self.io_handle.send(CmdSet::QuenchDetection(true)).await
    }

    /// Turn quench detection off
    pub async fn disable_quench_detection(&mut self) -> Result<(), CommandError>
    {
        self.io_handle.send(CmdSet::QuenchDetection(false)).await
    }

    /// Turn quench detection on with an explicit current step limit in amps per second
    pub async fn set_quench_step_limit(&mut self, rate: AmpPerSec) -> Result<(), CommandError>
    {
        check_span("Quench step limit", "A/s", rate.as_f64(), RATE_LIMIT_SPAN)?;
        self.io_handle.send(CmdSet::QuenchStepLimit(rate)).await
    }

    /// Read the measured output current in amps
    pub async fn get_current(&mut self) -> Result<Ampere, CommandError>
    {
        let reply = self.io_handle.query(CmdSet::GetCurrent).await?;
        Ok(parse_reading(&reply, "a decimal current reading")?)
    }

    /// Read the measured output voltage in volts
    pub async fn get_voltage(&mut self) -> Result<Volt, CommandError>
    {
        let reply = self.io_handle.query(CmdSet::GetVoltage).await?;
        Ok(parse_reading(&reply, "a decimal voltage reading")?)
    }

    /// Read the calculated magnetic field in tesla
    pub async fn get_field(&mut self) -> Result<Tesla, CommandError>
    {
        let reply = self.io_handle.query(CmdSet::GetField).await?;
        Ok(parse_reading(&reply, "a decimal field reading")?)
    }

    /// Read back the target current setting in amps
    pub async fn get_target_current(&mut self) -> Result<Ampere, CommandError>
    {
        let reply = self.io_handle.query(CmdSet::GetTargetCurrent).await?;
        Ok(parse_reading(&reply, "a decimal current setting")?)
    }

    /// Read back the compliance voltage setting in volts
    pub async fn get_compliance_voltage(&mut self) -> Result<Volt, CommandError>
    {
        let reply = self.io_handle.query(CmdSet::GetComplianceVoltage).await?;
        Ok(parse_reading(&reply, "a decimal voltage setting")?)
    }

    /// Read back the ramp rate setting in amps per second
    pub async fn get_ramp_rate(&mut self) -> Result<AmpPerSec, CommandError>
    {
        let reply = self.io_handle.query(CmdSet::GetRampRate).await?;
        Ok(parse_reading(&reply, "a decimal rate setting")?)
    }

    /// Read back all three quench protection limits
    pub async fn get_max_limits(&mut self) -> Result<Limits, CommandError>
    {
        let reply = self.io_handle.query(CmdSet::GetLimits).await?;
        Ok(reply.parse::<Limits>()?)
    }

    /// Read the quench detection configuration
    pub async fn get_quench_detection(&mut self) -> Result<QuenchStatus, CommandError>
    {
        let reply = self.io_handle.query(CmdSet::GetQuench).await?;
        Ok(reply.parse::<QuenchStatus>()?)
    }

    /// Read and decode the operational status register
    pub async fn get_status(&mut self) -> Result<OperationStatus, CommandError>
    {
        let reply = self.io_handle.query(CmdSet::GetOperationStatus).await?;
        Ok(reply.parse::<OperationStatus>()?)
    }

    /// Resume ramping toward the target current
    pub async fn start_ramp(&mut self) -> Result<(), CommandError>
    {
        self.io_handle.send(CmdSet::StartRamp).await
    }

    /// Pause the ramp at the present output current
    pub async fn stop_ramp(&mut self) -> Result<(), CommandError>
    {
        self.io_handle.send(CmdSet::StopRamp).await
    }

    /// Read the instrument identification string
    pub async fn identification(&mut self) -> Result<String, CommandError>
    {
        self.io_handle.query(CmdSet::Identify).await
    }

    /// Read the serial baud rate setting
    pub async fn baud_rate(&mut self) -> Result<BaudSetting, CommandError>
    {
        let reply = self.io_handle.query(CmdSet::GetBaud).await?;
        Ok(reply.parse::<BaudSetting>()?)
    }

    /// Send a verbatim command line
    ///
    /// Returns the reply line when the command ends in `?`, `None` otherwise.
    pub async fn raw_command(&mut self, line: &str) -> Result<Option<String>, CommandError>
    {
        let cmd = CmdSet::Raw(line.to_string());

        if cmd.expects_reply() {
            let reply = self.io_handle.query(cmd).await?;
            Ok(Some(reply))
        }
        else {
            self.io_handle.send(cmd).await?;
            Ok(None)
        }
    }
}

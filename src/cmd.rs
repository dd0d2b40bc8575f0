//! Device command definition and serialization

use std::fmt;
use crate::{
    response::Limits,
    units::{ Ampere, AmpPerSec, Volt },
};

/// The Model 625 remote command set
///
/// Each variant maps to exactly one ASCII command line. Query commands end in `?` and elicit
/// exactly one reply line; set commands elicit no reply at all. The link is half duplex, so a
/// command must not be sent while a reply is outstanding.
#[derive(Clone)]
pub enum CmdSet
{
    /// Set the target output current in amps
    ///
    /// Command: `SETI <amps>`
    ///
    /// If the supply is in ramp mode this starts the physical ramp immediately.
    SetCurrent(Ampere),
    /// Set the compliance voltage ceiling in volts
    ///
    /// Command: `SETV <volts>`
    SetComplianceVoltage(Volt),
    /// Set the output current ramp rate in amps per second
    ///
    /// Command: `RATE <amps/s>`
    SetRampRate(AmpPerSec),
    /// Set the quench protection limits for current, voltage, and ramp rate in one shot
    ///
    /// Command: `LIMIT <amps>, <volts>, <amps/s>`
    SetLimits(Limits),
    /// Turn quench detection on or off
    ///
    /// Command: `QNCH <1|0>`
    QuenchDetection(bool),
    /// Turn quench detection on with an explicit current step limit
    ///
    /// Command: `QNCH 1,<amps/s>`
    QuenchStepLimit(AmpPerSec),
    /// Read the measured output current
    ///
    /// Command: `RDGI?`
    GetCurrent,
    /// Read the measured output voltage
    ///
    /// Command: `RDGV?`
    GetVoltage,
    /// Read the calculated magnetic field
    ///
    /// Command: `RDGF?`
    GetField,
    /// Read back the target current setting
    ///
    /// Command: `SETI?`
    GetTargetCurrent,
    /// Read back the compliance voltage setting
    ///
    /// Command: `SETV?`
    GetComplianceVoltage,
    /// Read back the ramp rate setting
    ///
    /// Command: `RATE?`
    GetRampRate,
    /// Read back all three quench protection limits
    ///
    /// Command: `LIMIT?`
    GetLimits,
    /// Read the quench detection configuration
    ///
    /// Command: `QNCH?`
    GetQuench,
    /// Read the operational status register
    ///
    /// Command: `OPST?`
    GetOperationStatus,
    /// Resume ramping toward the target current
    ///
    /// Command: `RAMP`
    StartRamp,
    /// Pause the ramp at the present output current
    ///
    /// Command: `STOP`
    StopRamp,
    /// Read the instrument identification string
    ///
    /// Command: `*IDN?`
    Identify,
    /// Read the serial baud rate code
    ///
    /// Command: `BAUD?`
    GetBaud,
    /// Send a verbatim command line
    ///
    /// A reply is expected exactly when the line ends in `?`.
    Raw(String),
}

impl CmdSet
{
    /// Whether the device will answer this command with a reply line
    pub fn expects_reply(&self) -> bool
    {
        match self {
            Self::GetCurrent
            | Self::GetVoltage
            | Self::GetField
            | Self::GetTargetCurrent
            | Self::GetComplianceVoltage
            | Self::GetRampRate
            | Self::GetLimits
            | Self::GetQuench
            | Self::GetOperationStatus
            | Self::Identify
            | Self::GetBaud => true,
            Self::Raw(line) => line.trim_end().ends_with('?'),
            _ => false,
        }
    }
}

impl fmt::Display for CmdSet
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            Self::SetCurrent(amps) => write!(f, "SETI {}", amps),
            Self::SetComplianceVoltage(volts) => write!(f, "SETV {}", volts),
            Self::SetRampRate(rate) => write!(f, "RATE {}", rate),
            Self::SetLimits(limits) => write!(
                f,
                "LIMIT {}, {}, {}",
                limits.current,
                limits.voltage,
                limits.rate,
            ),
            Self::QuenchDetection(enable) => write!(f, "QNCH {}", if *enable { '1' } else { '0' }),
            Self::QuenchStepLimit(rate) => write!(f, "QNCH 1,{}", rate),
            Self::GetCurrent => f.write_str("RDGI?"),
            Self::GetVoltage => f.write_str("RDGV?"),
            Self::GetField => f.write_str("RDGF?"),
            Self::GetTargetCurrent => f.write_str("SETI?"),
            Self::GetComplianceVoltage => f.write_str("SETV?"),
            Self::GetRampRate => f.write_str("RATE?"),
            Self::GetLimits => f.write_str("LIMIT?"),
            Self::GetQuench => f.write_str("QNCH?"),
            Self::GetOperationStatus => f.write_str("OPST?"),
            Self::StartRamp => f.write_str("RAMP"),
            Self::StopRamp => f.write_str("STOP"),
            Self::Identify => f.write_str("*IDN?"),
            Self::GetBaud => f.write_str("BAUD?"),
            Self::Raw(line) => f.write_str(line.trim_end()),
        }
    }
}

//! Reply parsing and the error taxonomy for device exchanges

use std::{
    fmt,
    error::Error,
    str::FromStr,
};
use crate::units::{ scrub, Ampere, AmpPerSec, Decimal, Volt };

/// A description of the underlying cause of a reply parsing failure, if any
#[derive(Debug)]
enum ReplyErrorCause
{
    /// Expected an integer value
    InvalidInteger(std::num::ParseIntError),
    /// Expected a decimal value
    InvalidDecimal(std::num::ParseFloatError),
}

impl fmt::Display for ReplyErrorCause
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            Self::InvalidInteger(int_err) => write!(f, "Caused by: {}", int_err),
            Self::InvalidDecimal(float_err) => write!(f, "Caused by: {}", float_err),
        }
    }
}

impl From<std::num::ParseIntError> for ReplyErrorCause
{
    fn from(this: std::num::ParseIntError) -> Self
    {
        Self::InvalidInteger(this)
    }
}

impl From<std::num::ParseFloatError> for ReplyErrorCause
{
    fn from(this: std::num::ParseFloatError) -> Self
    {
        Self::InvalidDecimal(this)
    }
}

/// A parsing error caused by a reply line of unexpected or invalid format
#[derive(Debug)]
pub struct ReplyFormatError
{
    /// The reply line as received from the device, terminator stripped
    pub raw_reply: String,
    /// What the parser expected to find
    expected: &'static str,
    /// Some underlying cause, if any
    maybe_cause: Option<ReplyErrorCause>,
}

impl fmt::Display for ReplyFormatError
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "Expected {}, got \"{}\"", self.expected, self.raw_reply)?;

        if let Some(cause) = &self.maybe_cause {
            write!(f, ". {}", cause)
        }
        else {
            Ok(())
        }
    }
}

impl Error for ReplyFormatError {}

/// A parameter value outside the span the instrument will accept
#[derive(Debug)]
pub struct RangeError
{
    pub param: &'static str,
    pub unit: &'static str,
    pub value: f64,
    pub min: f64,
    pub max: f64,
}

impl fmt::Display for RangeError
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(
            f,
            "{} must be between {} and {} {}, got {}",
            self.param,
            Decimal(self.min),
            Decimal(self.max),
            self.unit,
            Decimal(self.value),
        )
    }
}

impl Error for RangeError {}

/// An error describing a failed command exchange with the device
#[derive(Debug)]
pub enum CommandError
{
    /// An I/O error occurred while moving bytes to or from the device
    Io(std::io::Error),
    /// The device sent no reply line within the read window
    ///
    /// # Implementation Notes
    /// Set commands never produce a reply on this instrument, so a timeout can only come from a
    /// query. The most common causes are a disconnected cable, a wrong port, or a baud/parity
    /// mismatch which leaves the device unable to recognize the command at all.
    Timeout,
    /// The reply could not be interpreted as a valid UTF8 string
    InvalidUtf8(std::string::FromUtf8Error),
    /// The reply was readable but not in the expected format
    Reply(ReplyFormatError),
    /// A requested setting falls outside the instrument's documented span
    Range(RangeError),
}

impl fmt::Display for CommandError
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            Self::Io(io_err) => write!(f, "Failed to exchange with device. {}", io_err),
            Self::Timeout => f.write_str("Device sent no reply within the read window"),
            Self::InvalidUtf8(decode_err) => write!(f, "Unable to decode reply. {}", decode_err),
            Self::Reply(fmt_err) => write!(f, "Unable to interpret reply. {}", fmt_err),
            Self::Range(range_err) => write!(f, "Refusing to send command. {}", range_err),
        }
    }
}

impl Error for CommandError {}

impl From<std::io::Error> for CommandError
{
    fn from(this: std::io::Error) -> Self
    {
        Self::Io(this)
    }
}

impl From<std::string::FromUtf8Error> for CommandError
{
    fn from(this: std::string::FromUtf8Error) -> Self
    {
        Self::InvalidUtf8(this)
    }
}

impl From<ReplyFormatError> for CommandError
{
    fn from(this: ReplyFormatError) -> Self
    {
        Self::Reply(this)
    }
}

impl From<RangeError> for CommandError
{
    fn from(this: RangeError) -> Self
    {
        Self::Range(this)
    }
}

/// Parses a single-value reading reply into a unit value
pub(crate) fn parse_reading<U>(raw: &str, expected: &'static str) -> Result<U, ReplyFormatError>
    where U: FromStr<Err = std::num::ParseFloatError>
{
    raw.parse::<U>().map_err(|cause| ReplyFormatError {
        raw_reply: raw.to_string(),
        expected: expected,
        maybe_cause: Some(cause.into()),
    })
}

/// The three quench protection limits as set with `LIMIT` and read back with `LIMIT?`
///
/// The reply is a comma separated triple in the same current, voltage, rate order the set
/// command uses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Limits
{
    pub current: Ampere,
    pub voltage: Volt,
    pub rate: AmpPerSec,
}

impl FromStr for Limits
{
    type Err = ReplyFormatError;

    fn from_str(reply: &str) -> Result<Self, Self::Err>
    {
        let expected = "three comma-separated limit values";
        let mut tokens = reply.split(',');

        let mut next_value = |what: &'static str| -> Result<f64, ReplyFormatError> {
            let token = tokens.next().ok_or(ReplyFormatError {
                raw_reply: reply.to_string(),
                expected: expected,
                maybe_cause: None,
            })?;

            scrub(token).parse::<f64>().map_err(|cause| ReplyFormatError {
                raw_reply: reply.to_string(),
                expected: what,
                maybe_cause: Some(cause.into()),
            })
        };

        let current = next_value("a decimal current limit")?;
        let voltage = next_value("a decimal voltage limit")?;
        let rate = next_value("a decimal rate limit")?;

        Ok(Self {
            current: Ampere::from_f64(current),
            voltage: Volt::from_f64(voltage),
            rate: AmpPerSec::from_f64(rate),
        })
    }
}

/// Quench detection configuration as read back with `QNCH?`
///
/// The reply is `<0|1>,<amps/s>`: the enable flag followed by the current step limit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuenchStatus
{
    pub enabled: bool,
    pub step_limit: AmpPerSec,
}

impl FromStr for QuenchStatus
{
    type Err = ReplyFormatError;

    fn from_str(reply: &str) -> Result<Self, Self::Err>
    {
        let expected = "an enable flag and a step limit";
        let mut tokens = reply.split(',');

        let flag_token = tokens.next().ok_or(ReplyFormatError {
            raw_reply: reply.to_string(),
            expected: expected,
            maybe_cause: None,
        })?;

        let enabled = match scrub(flag_token) {
            "0" => false,
            "1" => true,
            _ => return Err(ReplyFormatError {
                raw_reply: reply.to_string(),
                expected: "an enable flag of '0' or '1'",
                maybe_cause: None,
            }),
        };

        let limit_token = tokens.next().ok_or(ReplyFormatError {
            raw_reply: reply.to_string(),
            expected: expected,
            maybe_cause: None,
        })?;

        let step_limit = scrub(limit_token).parse::<f64>().map_err(|cause| ReplyFormatError {
            raw_reply: reply.to_string(),
            expected: "a decimal step limit",
            maybe_cause: Some(cause.into()),
        })?;

        Ok(Self {
            enabled: enabled,
            step_limit: AmpPerSec::from_f64(step_limit),
        })
    }
}

/// One-word summary of what the supply is doing right now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupplyState
{
    /// Output current is moving toward the target
    Ramping,
    /// The ramp has completed and the output is sitting at the target
    Holding,
    /// Quench detection has tripped and the output was shut down
    Quenched,
    /// The instrument reports a calibration error or hardware failure
    Fault,
}

impl fmt::Display for SupplyState
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            Self::Ramping => f.write_str("Ramping"),
            Self::Holding => f.write_str("Holding"),
            Self::Quenched => f.write_str("Quenched"),
            Self::Fault => f.write_str("Fault"),
        }
    }
}

/// Decoded operational status register as read with `OPST?`
///
/// The reply is the register value as a decimal integer. Each bit reports one condition; the
/// accessors below name them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationStatus
{
    bits: u16,
}

impl OperationStatus
{
    const COMPLIANCE: u16 = 1 << 0;
    const RAMP_DONE: u16 = 1 << 1;
    const CURRENT_STABILIZED: u16 = 1 << 2;
    const QUENCH_DETECTED: u16 = 1 << 3;
    const CALIBRATION_ERROR: u16 = 1 << 4;
    const HARDWARE_FAILURE: u16 = 1 << 5;

    pub fn from_bits(bits: u16) -> Self
    {
        Self {
            bits: bits,
        }
    }

    /// The output has hit the compliance voltage ceiling
    pub fn compliance(&self) -> bool
    {
        self.bits & Self::COMPLIANCE != 0
    }

    /// The output current has reached the target setting
    pub fn ramp_done(&self) -> bool
    {
        self.bits & Self::RAMP_DONE != 0
    }

    /// The output current is stable at its present value
    pub fn current_stabilized(&self) -> bool
    {
        self.bits & Self::CURRENT_STABILIZED != 0
    }

    /// Quench detection has tripped
    pub fn quench_detected(&self) -> bool
    {
        self.bits & Self::QUENCH_DETECTED != 0
    }

    pub fn calibration_error(&self) -> bool
    {
        self.bits & Self::CALIBRATION_ERROR != 0
    }

    pub fn hardware_failure(&self) -> bool
    {
        self.bits & Self::HARDWARE_FAILURE != 0
    }

    /// Collapses the register into a one-word state token
    pub fn state(&self) -> SupplyState
    {
        if self.quench_detected() {
            SupplyState::Quenched
        }
        else if self.calibration_error() || self.hardware_failure() {
            SupplyState::Fault
        }
        else if self.ramp_done() {
            SupplyState::Holding
        }
        else {
            SupplyState::Ramping
        }
    }
}

impl fmt::Display for OperationStatus
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}", self.state())?;

        let mut flags = Vec::new();

        if self.compliance() {
            flags.push("compliance");
        }
        if self.ramp_done() {
            flags.push("ramp done");
        }
        if self.current_stabilized() {
            flags.push("current stabilized");
        }
        if self.quench_detected() {
            flags.push("quench detected");
        }
        if self.calibration_error() {
            flags.push("calibration error");
        }
        if self.hardware_failure() {
            flags.push("hardware failure");
        }

        if flags.is_empty() {
            Ok(())
        }
        else {
            write!(f, " ({})", flags.join(", "))
        }
    }
}

impl FromStr for OperationStatus
{
    type Err = ReplyFormatError;

    fn from_str(reply: &str) -> Result<Self, Self::Err>
    {
        let bits = scrub(reply).parse::<u16>().map_err(|cause| ReplyFormatError {
            raw_reply: reply.to_string(),
            expected: "a status register integer",
            maybe_cause: Some(cause.into()),
        })?;

        Ok(Self::from_bits(bits))
    }
}

/// Serial baud rate setting as read back with `BAUD?`
///
/// The instrument reports a code rather than the rate itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaudSetting
{
    B9600,
    B19200,
    B38400,
    B57600,
}

impl BaudSetting
{
    /// The actual line rate in bits per second
    pub fn bits_per_sec(&self) -> u32
    {
        match self {
            Self::B9600 => 9600,
            Self::B19200 => 19_200,
            Self::B38400 => 38_400,
            Self::B57600 => 57_600,
        }
    }
}

impl fmt::Display for BaudSetting
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}", self.bits_per_sec())
    }
}

impl FromStr for BaudSetting
{
    type Err = ReplyFormatError;

    fn from_str(reply: &str) -> Result<Self, Self::Err>
    {
        match scrub(reply) {
            "0" => Ok(Self::B9600),
            "1" => Ok(Self::B19200),
            "2" => Ok(Self::B38400),
            "3" => Ok(Self::B57600),
            _ => Err(ReplyFormatError {
                raw_reply: reply.to_string(),
                expected: "a baud rate code of '0' through '3'",
                maybe_cause: None,
            }),
        }
    }
}

#[cfg(test)]
mod tests
{
    use super::{ BaudSetting, Limits, OperationStatus, QuenchStatus, SupplyState };
    use crate::units::{ Ampere, AmpPerSec, Volt };

    #[test]
    fn parse_limits_triple()
    {
        let limits = "+60.1000,+5.0000,+0.5000".parse::<Limits>().unwrap();

        assert_eq!(limits.current, Ampere::from_f64(60.1));
        assert_eq!(limits.voltage, Volt::from_f64(5.0));
        assert_eq!(limits.rate, AmpPerSec::from_f64(0.5));
    }

    #[test]
    fn parse_limits_rejects_short_reply()
    {
        assert!("+60.1000,+5.0000".parse::<Limits>().is_err());
    }

    #[test]
    fn parse_quench_status()
    {
        let quench = "1,0.5000".parse::<QuenchStatus>().unwrap();

        assert!(quench.enabled);
        assert_eq!(quench.step_limit, AmpPerSec::from_f64(0.5));

        let quench = "0,0.0100".parse::<QuenchStatus>().unwrap();

        assert!(!quench.enabled);
    }

    #[test]
    fn parse_quench_status_rejects_bad_flag()
    {
        assert!("2,0.5".parse::<QuenchStatus>().is_err());
    }

    #[test]
    fn status_register_decodes_flags()
    {
        let status = "6".parse::<OperationStatus>().unwrap();

        assert!(status.ramp_done());
        assert!(status.current_stabilized());
        assert!(!status.quench_detected());
        assert_eq!(status.state(), SupplyState::Holding);
    }

    #[test]
    fn status_register_quench_wins()
    {
        let status = "+10".parse::<OperationStatus>().unwrap();

        assert!(status.quench_detected());
        assert_eq!(status.state(), SupplyState::Quenched);
    }

    #[test]
    fn status_register_zero_is_ramping()
    {
        let status = "0".parse::<OperationStatus>().unwrap();

        assert_eq!(status.state(), SupplyState::Ramping);
        assert_eq!(&format!("{}", status), "Ramping");
    }

    #[test]
    fn status_register_rejects_garbage()
    {
        assert!("QNCH".parse::<OperationStatus>().is_err());
    }

    #[test]
    fn parse_baud_code()
    {
        assert_eq!("0".parse::<BaudSetting>().unwrap(), BaudSetting::B9600);
        assert_eq!("3".parse::<BaudSetting>().unwrap().bits_per_sec(), 57_600);
        assert!("4".parse::<BaudSetting>().is_err());
    }
}

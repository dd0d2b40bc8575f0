//! Asynchronous remote control for the Lake Shore Model 625 superconducting magnet power supply
//!
//! The Model 625 speaks a line-based ASCII protocol over RS232: every command is one line
//! terminated by CR+LF, queries end in `?` and are answered with exactly one reply line, and
//! set commands are answered with nothing at all. This crate wraps that protocol in a typed
//! device handle ([`Ls625`]) plus a fixed-interval ramp logger ([`RampLogger`]).
//!
//! The handle is generic over any async byte stream, so it works equally over a local serial
//! port, a TCP serial bridge, or an in-memory stream in tests.

pub mod cmd;
pub mod device;
pub mod logger;
pub mod response;
pub mod units;

mod executor;

pub use device::{ Ls625, DEFAULT_READ_TIMEOUT };
pub use logger::{ RampLogger, RampRecord };
pub use response::{
    BaudSetting, CommandError, Limits, OperationStatus, QuenchStatus, RangeError,
    ReplyFormatError, SupplyState,
};
pub use units::{ Ampere, AmpPerSec, Tesla, Volt };

//! Typed quantities exchanged with the power supply

use std::{
    fmt,
    str::FromStr,
};

/// Displays a value the way the Model 625 expects it on the wire
///
/// The supply accepts plain decimal notation with up to four places after the decimal point.
/// Trailing zeroes are dropped down to a single fractional digit so that `35.0` is sent as
/// `35.0` and `0.0125` as `0.0125`.
pub(crate) struct Decimal(pub f64);

impl fmt::Display for Decimal
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let mut formatted = format!("{:.4}", self.0);

        while formatted.ends_with('0') {
            formatted.pop();
        }

        if formatted.ends_with('.') {
            formatted.push('0');
        }

        f.write_str(&formatted)
    }
}

/// Strips the decorations a reply line may carry around its numeric value
///
/// Readings arrive with surrounding whitespace, an explicit leading sign, and occasionally a
/// unit suffix such as `A` or `A/s`. Scientific notation (`4.5000E-01`) is left intact.
pub(crate) fn scrub(reply: &str) -> &str
{
    let reply = reply.trim();
    let reply = reply.trim_end_matches(|ch: char| ch.is_ascii_alphabetic() || ch == '/');
    let reply = reply.trim_end();

    reply.strip_prefix('+').unwrap_or(reply)
}

macro_rules! unit
{
    ($u:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
        pub struct $u
        {
            value: f64,
        }

        impl $u
        {
            pub fn from_f64(value: f64) -> Self
            {
                Self {
                    value: value,
                }
            }

            pub fn as_f64(&self) -> f64
            {
                self.value
            }
        }

        impl fmt::Display for $u
        {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
            {
                write!(f, "{}", Decimal(self.value))
            }
        }

        impl FromStr for $u
        {
            type Err = std::num::ParseFloatError;

            fn from_str(reply: &str) -> Result<Self, Self::Err>
            {
                scrub(reply).parse::<f64>().map(Self::from_f64)
            }
        }
    }
}

unit!(Ampere, "Electric current in amps");
unit!(Volt, "Electric potential in volts");
unit!(Tesla, "Magnetic flux density in tesla");
unit!(AmpPerSec, "Current ramp rate in amps per second");

//! Integer frequency values with unit parsing and display.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A frequency in whole Hertz.
///
/// Clock-tree arithmetic is exact integer arithmetic: register settings select
/// integer factors, and every computed frequency is floored to a whole Hz.
/// Serialized as a bare integer.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hz(pub u64);

impl Hz {
    /// A stopped clock.
    pub const ZERO: Hz = Hz(0);

    /// Creates a frequency from a value in Hertz.
    pub const fn new(hz: u64) -> Self {
        Self(hz)
    }

    /// Creates a frequency from whole kilohertz.
    pub const fn khz(khz: u64) -> Self {
        Self(khz * 1_000)
    }

    /// Creates a frequency from whole megahertz.
    pub const fn mhz(mhz: u64) -> Self {
        Self(mhz * 1_000_000)
    }

    /// Returns the frequency in Hertz.
    pub const fn hz(self) -> u64 {
        self.0
    }

    /// Returns `true` for a stopped clock.
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Absolute difference between two frequencies.
    pub fn abs_diff(self, other: Hz) -> u64 {
        self.0.abs_diff(other.0)
    }
}

impl From<u64> for Hz {
    fn from(hz: u64) -> Self {
        Self(hz)
    }
}

impl fmt::Debug for Hz {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hz({self})")
    }
}

impl fmt::Display for Hz {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hz = self.0;
        let (unit, scale) = if hz >= 1_000_000_000 {
            ("GHz", 1_000_000_000)
        } else if hz >= 1_000_000 {
            ("MHz", 1_000_000)
        } else if hz >= 1_000 {
            ("kHz", 1_000)
        } else {
            return write!(f, "{hz}Hz");
        };
        let whole = hz / scale;
        let rest = hz % scale;
        if rest == 0 {
            return write!(f, "{whole}{unit}");
        }
        let digits = scale.ilog10() as usize;
        let frac = format!("{rest:0digits$}");
        write!(f, "{whole}.{}{unit}", frac.trim_end_matches('0'))
    }
}

/// Error type for parsing frequency strings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid frequency: '{input}'")]
pub struct ParseFrequencyError {
    /// The input string that failed to parse.
    pub input: String,
}

impl FromStr for Hz {
    type Err = ParseFrequencyError;

    /// Parses `"48000000"`, `"48000000Hz"`, `"12.288MHz"`, `"32.768kHz"`, `"1GHz"`.
    ///
    /// Suffixes are case-insensitive. Values that do not land on a whole Hz
    /// are rejected rather than rounded.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let err = || ParseFrequencyError {
            input: s.to_string(),
        };

        let lower = s.to_ascii_lowercase();
        let (number, scale) = if let Some(num) = lower.strip_suffix("ghz") {
            (num, 1_000_000_000)
        } else if let Some(num) = lower.strip_suffix("mhz") {
            (num, 1_000_000)
        } else if let Some(num) = lower.strip_suffix("khz") {
            (num, 1_000)
        } else if let Some(num) = lower.strip_suffix("hz") {
            (num, 1)
        } else {
            (lower.as_str(), 1)
        };

        parse_scaled(number.trim().replace('_', "").as_str(), scale)
            .map(Hz)
            .ok_or_else(err)
    }
}

/// Parses a decimal number with optional fraction digits and multiplies it by
/// `scale`, requiring the result to be an exact integer.
pub(crate) fn parse_scaled(number: &str, scale: u64) -> Option<u64> {
    let (whole, frac) = match number.split_once('.') {
        Some((w, f)) => (w, f),
        None => (number, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return None;
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let whole: u64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let mut value = whole.checked_mul(scale)?;

    if !frac.is_empty() {
        let frac_digits = u32::try_from(frac.len()).ok()?;
        let denom = 10u128.checked_pow(frac_digits)?;
        let frac_value: u128 = frac.parse().ok()?;
        let scaled = frac_value * u128::from(scale);
        if scaled % denom != 0 {
            return None;
        }
        let extra = u64::try_from(scaled / denom).ok()?;
        value = value.checked_add(extra)?;
    }
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_ghz() {
        let f: Hz = "1GHz".parse().unwrap();
        assert_eq!(f.hz(), 1_000_000_000);
    }

    #[test]
    fn parse_mhz() {
        let f: Hz = "200MHz".parse().unwrap();
        assert_eq!(f, Hz::mhz(200));
    }

    #[test]
    fn parse_fractional_mhz() {
        let f: Hz = "12.288MHz".parse().unwrap();
        assert_eq!(f.hz(), 12_288_000);
    }

    #[test]
    fn parse_khz() {
        let f: Hz = "32.768kHz".parse().unwrap();
        assert_eq!(f.hz(), 32_768);
    }

    #[test]
    fn parse_bare_number_and_underscores() {
        let f: Hz = "8_000_000".parse().unwrap();
        assert_eq!(f.hz(), 8_000_000);
        let f: Hz = "48000Hz".parse().unwrap();
        assert_eq!(f.hz(), 48_000);
    }

    #[test]
    fn parse_case_insensitive() {
        let f: Hz = "50mhz".parse().unwrap();
        assert_eq!(f, Hz::mhz(50));
    }

    #[test]
    fn parse_rejects_sub_hz() {
        assert!("1.5Hz".parse::<Hz>().is_err());
        assert!("0.0001kHz".parse::<Hz>().is_err());
    }

    #[test]
    fn parse_invalid() {
        assert!("not_a_freq".parse::<Hz>().is_err());
        assert!("-5MHz".parse::<Hz>().is_err());
        assert!("MHz".parse::<Hz>().is_err());
    }

    #[test]
    fn display_selects_best_unit() {
        assert_eq!(Hz::new(1_000_000_000).to_string(), "1GHz");
        assert_eq!(Hz::mhz(200).to_string(), "200MHz");
        assert_eq!(Hz::new(12_288_000).to_string(), "12.288MHz");
        assert_eq!(Hz::new(32_768).to_string(), "32.768kHz");
        assert_eq!(Hz::new(500).to_string(), "500Hz");
        assert_eq!(Hz::ZERO.to_string(), "0Hz");
    }

    #[test]
    fn display_parse_roundtrip() {
        for hz in [0, 1, 999, 32_768, 4_000_000, 12_288_000, 480_000_000, 1_600_000_001] {
            let f = Hz::new(hz);
            assert_eq!(f.to_string().parse::<Hz>().unwrap(), f);
        }
    }

    #[test]
    fn serde_is_plain_integer() {
        let json = serde_json::to_string(&Hz::mhz(8)).unwrap();
        assert_eq!(json, "8000000");
        let back: Hz = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Hz::mhz(8));
    }
}

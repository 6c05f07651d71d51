//! Acceptance windows around a requested frequency.

use crate::frequency::{parse_scaled, Hz};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How far an achieved frequency may deviate from the requested one.
///
/// The default is an exact match.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Tolerance {
    /// A fixed window in Hz on either side of the request.
    Absolute(Hz),
    /// A window proportional to the request, in parts per million.
    Ppm(u64),
}

impl Tolerance {
    /// Exact match.
    pub const EXACT: Tolerance = Tolerance::Absolute(Hz::ZERO);

    /// Largest deviation in Hz accepted for `desired`.
    pub fn allowance(self, desired: Hz) -> u64 {
        match self {
            Tolerance::Absolute(hz) => hz.hz(),
            Tolerance::Ppm(ppm) => {
                let window = u128::from(desired.hz()) * u128::from(ppm) / 1_000_000;
                u64::try_from(window).unwrap_or(u64::MAX)
            }
        }
    }

    /// Returns `true` if `actual` lies within the window around `desired`.
    pub fn accepts(self, desired: Hz, actual: Hz) -> bool {
        desired.abs_diff(actual) <= self.allowance(desired)
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Tolerance::EXACT
    }
}

impl fmt::Display for Tolerance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tolerance::Absolute(hz) => write!(f, "{hz}"),
            Tolerance::Ppm(ppm) if ppm % 10_000 == 0 => write!(f, "{}%", ppm / 10_000),
            Tolerance::Ppm(ppm) => write!(f, "{ppm}ppm"),
        }
    }
}

/// Error type for parsing tolerance strings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid tolerance: '{input}'")]
pub struct ParseToleranceError {
    /// The input string that failed to parse.
    pub input: String,
}

impl FromStr for Tolerance {
    type Err = ParseToleranceError;

    /// Parses `"0.5%"`, `"50ppm"` or an absolute frequency such as `"120kHz"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let err = || ParseToleranceError {
            input: s.to_string(),
        };

        let lower = s.to_ascii_lowercase();
        if let Some(num) = lower.strip_suffix('%') {
            return parse_scaled(num.trim(), 10_000)
                .map(Tolerance::Ppm)
                .ok_or_else(err);
        }
        if let Some(num) = lower.strip_suffix("ppm") {
            return parse_scaled(num.trim(), 1)
                .map(Tolerance::Ppm)
                .ok_or_else(err);
        }
        s.parse::<Hz>().map(Tolerance::Absolute).map_err(|_| err())
    }
}

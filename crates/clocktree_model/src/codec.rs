//! Mapping between raw register-field integers and the semantic quantities
//! they select: divisor factors, mux inputs and PLL multipliers.

use clocktree_common::Hz;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// The requested value has no raw encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("value {value} has no exact raw encoding")]
pub struct NoExactEncoding {
    /// The value that could not be encoded.
    pub value: u64,
}

/// Fixed-point field encoding: `value = (raw + offset) × scale`, with `raw`
/// constrained to `min..=max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldEncoding {
    /// Smallest legal raw value.
    pub min: u64,
    /// Largest legal raw value.
    pub max: u64,
    /// Added to the raw value before scaling.
    pub offset: i64,
    /// Multiplier applied after the offset. Never zero in a loaded graph.
    pub scale: u64,
}

impl FieldEncoding {
    /// Identity encoding over `min..=max`.
    pub fn identity(min: u64, max: u64) -> Self {
        Self {
            min,
            max,
            offset: 0,
            scale: 1,
        }
    }

    /// Legal raw values.
    pub fn raw_range(&self) -> RangeInclusive<u64> {
        self.min..=self.max
    }

    /// Number of legal raw values.
    pub fn len(&self) -> u64 {
        self.max.saturating_sub(self.min).saturating_add(1)
    }

    /// Returns `true` if `min > max`.
    pub fn is_empty(&self) -> bool {
        self.min > self.max
    }

    /// Decodes `raw`, or `None` if it is outside the legal range or the
    /// decoded value would be negative or overflow.
    pub fn decode(&self, raw: u64) -> Option<u64> {
        if raw < self.min || raw > self.max {
            return None;
        }
        let shifted = i128::from(raw) + i128::from(self.offset);
        let value = shifted.checked_mul(i128::from(self.scale))?;
        u64::try_from(value).ok()
    }

    /// Encodes `value` exactly.
    pub fn encode(&self, value: u64) -> Result<u64, NoExactEncoding> {
        let err = NoExactEncoding { value };
        if self.scale == 0 || value % self.scale != 0 {
            return Err(err);
        }
        let raw = i128::from(value / self.scale) - i128::from(self.offset);
        let raw = u64::try_from(raw).map_err(|_| err)?;
        if raw < self.min || raw > self.max {
            return Err(err);
        }
        Ok(raw)
    }

    /// The raw value whose decoded value is nearest to `value`, clipped to
    /// the legal range. Ties resolve to the lower raw value.
    pub fn nearest_raw(&self, value: u64) -> u64 {
        if self.scale == 0 || self.is_empty() {
            return self.min;
        }
        let scale = i128::from(self.scale);
        let lower = i128::from(value) / scale - i128::from(self.offset);
        let clip = |raw: i128| raw.clamp(i128::from(self.min), i128::from(self.max)) as u64;
        let below = clip(lower);
        let above = clip(lower + 1);
        let dist = |raw: u64| self.decode(raw).map_or(u64::MAX, |v| v.abs_diff(value));
        if dist(above) < dist(below) {
            above
        } else {
            below
        }
    }

    /// Decoded values of the legal range endpoints, `(lowest, highest)`.
    pub fn value_bounds(&self) -> Option<(u64, u64)> {
        let a = self.decode(self.min)?;
        let b = self.decode(self.max)?;
        Some((a.min(b), a.max(b)))
    }
}

/// Looks up a table entry by raw value.
pub fn table_lookup<T>(table: &[T], raw: u64) -> Option<&T> {
    usize::try_from(raw).ok().and_then(|i| table.get(i))
}

/// Every raw value whose table entry equals `wanted`, ascending.
pub fn table_reverse<T: PartialEq>(table: &[T], wanted: &T) -> Vec<u64> {
    table
        .iter()
        .enumerate()
        .filter(|(_, entry)| *entry == wanted)
        .map(|(raw, _)| raw as u64)
        .collect()
}

/// Decoded PLL multiplier `n + frac / den`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PllRatio {
    /// Integer feedback value.
    pub n: u64,
    /// Fractional feedback value.
    pub frac: u64,
    /// Fractional denominator, at least 1.
    pub den: u64,
}

impl PllRatio {
    /// Integer-only multiplier.
    pub fn integer(n: u64) -> Self {
        Self { n, frac: 0, den: 1 }
    }

    /// VCO frequency `input × (n·den + frac) / den`, floored. `None` on
    /// overflow or a zero denominator.
    pub fn apply(&self, input: Hz) -> Option<Hz> {
        if self.den == 0 {
            return None;
        }
        let numerator = u128::from(self.n)
            .checked_mul(u128::from(self.den))?
            .checked_add(u128::from(self.frac))?;
        let vco = u128::from(input.hz()).checked_mul(numerator)? / u128::from(self.den);
        u64::try_from(vco).ok().map(Hz)
    }
}

/// Fractional divider output `input × numerator / divisor`, floored. `None`
/// on overflow or a zero divisor.
pub fn divide_fractional(input: Hz, numerator: u64, divisor: u64) -> Option<Hz> {
    if divisor == 0 {
        return None;
    }
    let out = u128::from(input.hz()) * u128::from(numerator) / u128::from(divisor);
    u64::try_from(out).ok().map(Hz)
}

/// Integer feedback value giving exactly `vco` from `input` with the given
/// fractional part, if one exists.
pub fn solve_pll_integer(input: Hz, vco: Hz, frac: u64, den: u64) -> Option<u64> {
    let scaled = scaled_multiplier(input, vco, den)?;
    let whole = scaled.checked_sub(u128::from(frac))?;
    if whole % u128::from(den) != 0 {
        return None;
    }
    u64::try_from(whole / u128::from(den)).ok()
}

/// Fractional feedback value giving exactly `vco` from `input` with the given
/// integer part, if one exists.
pub fn solve_pll_fraction(input: Hz, vco: Hz, n: u64, den: u64) -> Option<u64> {
    let scaled = scaled_multiplier(input, vco, den)?;
    let frac = scaled.checked_sub(u128::from(n).checked_mul(u128::from(den))?)?;
    if frac >= u128::from(den) {
        return None;
    }
    u64::try_from(frac).ok()
}

/// Real-valued `vco × den / input` as `(floor, exact)`, used to seed
/// nearest-value searches when no exact solution exists.
pub fn pll_scaled_multiplier_floor(input: Hz, vco: Hz, den: u64) -> Option<(u64, bool)> {
    if input.is_zero() || den == 0 {
        return None;
    }
    let num = u128::from(vco.hz()) * u128::from(den);
    let input = u128::from(input.hz());
    let floor = u64::try_from(num / input).ok()?;
    Some((floor, num % input == 0))
}

fn scaled_multiplier(input: Hz, vco: Hz, den: u64) -> Option<u128> {
    match pll_scaled_multiplier_floor(input, vco, den)? {
        (value, true) => Some(u128::from(value)),
        (_, false) => None,
    }
}

/// Divisor nearest to `input / desired`, rounded half up. `None` for a zero
/// request.
pub fn ideal_divisor(input: Hz, desired: Hz) -> Option<u64> {
    if desired.is_zero() {
        return None;
    }
    let d = desired.hz();
    Some((input.hz() + d / 2) / d)
}

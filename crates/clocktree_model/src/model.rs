//! Serde-deserializable description of a chip's clock hardware.
//!
//! This is the unvalidated input to [`Graph::load`](crate::Graph::load). Names
//! are plain strings here; the loader interns them and resolves every
//! reference to an ID.

use clocktree_common::Hz;
use serde::{Deserialize, Serialize};

/// Mux input entry meaning "no clock": selects 0 Hz without a violation.
pub const MUX_OFF: &str = "";

/// Mux input entry marking an illegal selector pattern.
pub const MUX_RESERVED: &str = "-reserved-";

/// A complete chip clock-tree description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClockTreeModel {
    /// Optional chip family name, used in reports only.
    #[serde(default)]
    pub name: Option<String>,
    /// Explicitly declared signals. Signals referenced only by nodes are
    /// created implicitly with no bounds.
    #[serde(default)]
    pub signals: Vec<SignalModel>,
    /// Register field declarations (width and reset default).
    #[serde(default)]
    pub fields: Vec<FieldModel>,
    /// Oscillators and other frequency generators.
    #[serde(default)]
    pub sources: Vec<SourceModel>,
    /// Clock enables.
    #[serde(default)]
    pub gates: Vec<GateModel>,
    /// Integer prescalers.
    #[serde(default)]
    pub dividers: Vec<DividerModel>,
    /// Clock selectors.
    #[serde(default)]
    pub muxes: Vec<MuxModel>,
    /// Phase-locked loops.
    #[serde(default)]
    pub plls: Vec<PllModel>,
    /// Groups of signals sharing a frequency ceiling.
    #[serde(default)]
    pub domains: Vec<DomainModel>,
}

/// A named clock line with optional frequency bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignalModel {
    /// Unique signal name.
    pub name: String,
    /// Typical frequency. A signal nothing produces is driven at this value.
    #[serde(default)]
    pub nominal: Option<Hz>,
    /// Lowest legal nonzero frequency.
    #[serde(default)]
    pub min: Option<Hz>,
    /// Highest legal frequency.
    #[serde(default)]
    pub max: Option<Hz>,
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
}

/// A register field declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldModel {
    /// Register name, e.g. `RCC_CFGR`.
    pub reg: String,
    /// Field name within the register, e.g. `SW`.
    pub field: String,
    /// Width in bits.
    #[serde(default)]
    pub width: Option<u32>,
    /// Reset value.
    #[serde(default)]
    pub default: Option<u64>,
}

/// A frequency generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceModel {
    /// Unique node name.
    pub name: String,
    /// Produced signal.
    pub output: String,
    /// Selector register.
    #[serde(default)]
    pub reg: Option<String>,
    /// Selector field.
    #[serde(default)]
    pub field: Option<String>,
    /// Frequencies indexed by raw selector value; entry 0 Hz means off.
    #[serde(default)]
    pub frequencies: Vec<Hz>,
}

/// A clock enable bit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GateModel {
    /// Unique node name.
    pub name: String,
    /// Gated signal.
    pub input: String,
    /// Produced signal.
    pub output: String,
    /// Enable register.
    pub reg: String,
    /// One-bit enable field.
    pub bit: String,
    /// Enabled when the bit is clear.
    #[serde(default)]
    pub inverted: bool,
}

/// A prescaler. Exactly one of `fixed`, `factors` or `linear` is set.
///
/// With a `denominator` the divider is fractional and produces
/// `input × denominator / factor`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DividerModel {
    /// Unique node name.
    pub name: String,
    /// Divided signal.
    pub input: String,
    /// Produced signal.
    pub output: String,
    /// Control register, required for `factors` and `linear`.
    #[serde(default)]
    pub reg: Option<String>,
    /// Control field, required for `factors` and `linear`.
    #[serde(default)]
    pub field: Option<String>,
    /// Divisor indexed by raw value; 0 entries are illegal settings.
    #[serde(default)]
    pub factors: Option<Vec<u64>>,
    /// Constant divisor with no control field.
    #[serde(default)]
    pub fixed: Option<u64>,
    /// Divisor `(raw + offset) × scale`.
    #[serde(default)]
    pub linear: Option<EncodingModel>,
    /// Numerator field of a fractional divider.
    #[serde(default)]
    pub denominator: Option<FeedbackModel>,
}

/// Fixed-point encoding of a field: `value = (raw + offset) × scale`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EncodingModel {
    /// Inclusive `[min, max]` bounds on the raw value.
    pub value_range: [u64; 2],
    /// Added to the raw value before scaling.
    #[serde(default)]
    pub offset: i64,
    /// Multiplier applied after the offset.
    #[serde(default = "default_scale")]
    pub scale: u64,
}

fn default_scale() -> u64 {
    1
}

/// A clock selector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MuxModel {
    /// Unique node name.
    pub name: String,
    /// Selector register.
    pub reg: String,
    /// Selector field.
    pub field: String,
    /// Selected signal per raw value: a signal name, [`MUX_OFF`] or [`MUX_RESERVED`].
    pub inputs: Vec<String>,
    /// Produced signal.
    pub output: String,
}

/// A register field with a fixed-point encoding, as used by PLL descriptors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeedbackModel {
    /// Register name.
    pub reg: String,
    /// Field name.
    pub field: String,
    /// Inclusive `[min, max]` bounds on the raw value.
    pub value_range: [u64; 2],
    /// Added to the raw value before scaling.
    #[serde(default)]
    pub offset: i64,
    /// Multiplier applied after the offset.
    #[serde(default = "default_scale")]
    pub scale: u64,
    /// Fractional denominator (fractional feedback only).
    #[serde(default)]
    pub denominator: Option<u64>,
}

impl FeedbackModel {
    /// The encoding part of the descriptor.
    pub fn encoding(&self) -> EncodingModel {
        EncodingModel {
            value_range: self.value_range,
            offset: self.offset,
            scale: self.scale,
        }
    }
}

/// A phase-locked loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PllModel {
    /// Unique node name.
    pub name: String,
    /// Reference input signal.
    pub input: String,
    /// Produced signal (VCO, or VCO / post-divider).
    pub output: String,
    /// Integer multiplier descriptor.
    pub feedback_integer: FeedbackModel,
    /// Fractional multiplier descriptor.
    #[serde(default)]
    pub feedback_fraction: Option<FeedbackModel>,
    /// Output divider applied after the VCO.
    #[serde(default)]
    pub post_divider: Option<FeedbackModel>,
    /// Inclusive `[min, max]` VCO frequency range.
    #[serde(default)]
    pub vco_limits: Option<[Hz; 2]>,
    /// Integer expression over `input`, `n`, `frac` and `den` replacing the
    /// default VCO equation.
    #[serde(default)]
    pub vco_formula: Option<String>,
}

/// A set of signals sharing a frequency ceiling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DomainModel {
    /// Domain name.
    pub name: String,
    /// Highest legal frequency of every member.
    pub max: Hz,
    /// Member signal names.
    pub signals: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_model_from_json() {
        let json = r#"{
            "sources": [{"name": "HSE", "output": "hse_ck", "frequencies": [8000000]}],
            "dividers": [{"name": "HPRE", "input": "hse_ck", "output": "hclk",
                          "reg": "RCC_CFGR", "field": "HPRE", "factors": [1, 2, 4, 8]}]
        }"#;
        let model: ClockTreeModel = serde_json::from_str(json).unwrap();
        assert_eq!(model.sources.len(), 1);
        assert_eq!(model.sources[0].frequencies, vec![Hz::mhz(8)]);
        assert_eq!(model.dividers[0].factors.as_deref(), Some(&[1, 2, 4, 8][..]));
        assert!(model.plls.is_empty());
    }

    #[test]
    fn feedback_defaults() {
        let json = r#"{"reg": "RCC_PLLCFGR", "field": "PLLN", "value_range": [8, 120]}"#;
        let fb: FeedbackModel = serde_json::from_str(json).unwrap();
        assert_eq!(fb.offset, 0);
        assert_eq!(fb.scale, 1);
        assert_eq!(fb.denominator, None);
        assert_eq!(fb.encoding().value_range, [8, 120]);
    }

    #[test]
    fn divider_denominator_is_optional() {
        let json = r#"{"name": "SAI", "input": "a", "output": "b", "fixed": 4,
                       "denominator": {"reg": "R", "field": "NUM", "value_range": [1, 255]}}"#;
        let div: DividerModel = serde_json::from_str(json).unwrap();
        assert_eq!(div.denominator.map(|d| d.value_range), Some([1, 255]));
        let plain: DividerModel =
            serde_json::from_str(r#"{"name": "D", "input": "a", "output": "b", "fixed": 2}"#).unwrap();
        assert!(plain.denominator.is_none());
    }

    #[test]
    fn gate_inverted_defaults_false() {
        let json = r#"{"name": "G", "input": "a", "output": "b", "reg": "R", "bit": "EN"}"#;
        let gate: GateModel = serde_json::from_str(json).unwrap();
        assert!(!gate.inverted);
    }

    #[test]
    fn unknown_keys_rejected() {
        let json = r#"{"signals": [], "wires": []}"#;
        assert!(serde_json::from_str::<ClockTreeModel>(json).is_err());
    }

    #[test]
    fn mux_sentinels() {
        let json = r#"{"name": "SW", "reg": "R", "field": "SW",
                       "inputs": ["hsi_ck", "", "-reserved-", "pll_ck"], "output": "sys_ck"}"#;
        let mux: MuxModel = serde_json::from_str(json).unwrap();
        assert_eq!(mux.inputs[1], MUX_OFF);
        assert_eq!(mux.inputs[2], MUX_RESERVED);
    }
}

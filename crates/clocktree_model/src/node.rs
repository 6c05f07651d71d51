//! Typed clock-tree nodes with references resolved to IDs.

use crate::codec::FieldEncoding;
use crate::formula::Formula;
use crate::ids::{FieldId, SignalId};
use clocktree_common::{Hz, Ident};
use serde::{Deserialize, Serialize};

/// A functional element of the clock tree. Every node produces exactly one
/// signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    /// Oscillator or other generator.
    Source(Source),
    /// Clock enable.
    Gate(Gate),
    /// Integer or fractional prescaler.
    Divider(Divider),
    /// Clock selector.
    Mux(Mux),
    /// Phase-locked loop.
    Pll(Pll),
}

/// A generator selecting its frequency from a table, or emitting a constant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    /// Node name.
    pub name: Ident,
    /// Produced signal.
    pub output: SignalId,
    /// Selector field; `None` for a constant source.
    pub control: Option<FieldId>,
    /// Frequencies indexed by raw selector value.
    pub frequencies: Vec<Hz>,
    /// Frequency of a constant source.
    pub nominal: Hz,
}

/// A clock enable bit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gate {
    /// Node name.
    pub name: Ident,
    /// Gated signal.
    pub input: SignalId,
    /// Produced signal.
    pub output: SignalId,
    /// One-bit enable field.
    pub control: FieldId,
    /// Enabled when the bit is clear.
    pub inverted: bool,
}

impl Gate {
    /// Whether the gate passes its input for the given raw bit.
    pub fn is_enabled(&self, raw: u64) -> bool {
        (raw != 0) != self.inverted
    }
}

/// How a divider obtains its divisor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DividerFactor {
    /// Constant divisor.
    Fixed(u64),
    /// Divisor indexed by raw value; 0 marks an illegal setting.
    Table {
        /// Selector field.
        field: FieldId,
        /// Divisor per raw value.
        factors: Vec<u64>,
    },
    /// Divisor `(raw + offset) × scale`.
    Linear {
        /// Selector field.
        field: FieldId,
        /// Field encoding.
        encoding: FieldEncoding,
    },
}

/// A prescaler producing `input × denominator / factor`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Divider {
    /// Node name.
    pub name: Ident,
    /// Divided signal.
    pub input: SignalId,
    /// Produced signal.
    pub output: SignalId,
    /// Divisor source.
    pub factor: DividerFactor,
    /// Numerator field; `None` for an integer divider.
    pub denominator: Option<EncodedField>,
}

impl Divider {
    /// Divisor selected by `raw`, `None` if `raw` is not a legal setting.
    /// A zero divisor is returned as `Some(0)`.
    pub fn factor_for(&self, raw: u64) -> Option<u64> {
        match &self.factor {
            DividerFactor::Fixed(f) => Some(*f),
            DividerFactor::Table { factors, .. } => {
                crate::codec::table_lookup(factors, raw).copied()
            }
            DividerFactor::Linear { encoding, .. } => encoding.decode(raw),
        }
    }

    /// Field selecting the divisor, if any.
    pub fn factor_field(&self) -> Option<FieldId> {
        match &self.factor {
            DividerFactor::Fixed(_) => None,
            DividerFactor::Table { field, .. } | DividerFactor::Linear { field, .. } => {
                Some(*field)
            }
        }
    }

    /// Numerator selected by `raw`: 1 for an integer divider, `None` if `raw`
    /// is not a legal setting.
    pub fn denominator_for(&self, raw: u64) -> Option<u64> {
        match &self.denominator {
            Some(den) => den.encoding.decode(raw),
            None => Some(1),
        }
    }
}

/// One entry of a mux input table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MuxInput {
    /// Selects a signal.
    Signal(SignalId),
    /// No clock, 0 Hz.
    Off,
    /// Illegal selector pattern.
    Reserved,
}

/// A clock selector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mux {
    /// Node name.
    pub name: Ident,
    /// Selector field.
    pub control: FieldId,
    /// Input per raw selector value.
    pub inputs: Vec<MuxInput>,
    /// Produced signal.
    pub output: SignalId,
}

impl Mux {
    /// Distinct signals reachable through the input table, in table order.
    pub fn input_signals(&self) -> Vec<SignalId> {
        let mut out: Vec<SignalId> = Vec::new();
        for input in &self.inputs {
            if let MuxInput::Signal(s) = input {
                if !out.contains(s) {
                    out.push(*s);
                }
            }
        }
        out
    }
}

/// A register field with a fixed-point encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedField {
    /// Controlling field.
    pub field: FieldId,
    /// Field encoding.
    pub encoding: FieldEncoding,
}

/// Fractional feedback: adds `value / denominator` to the multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fraction {
    /// Fractional field.
    pub feedback: EncodedField,
    /// Denominator, at least 1.
    pub denominator: u64,
}

/// A phase-locked loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pll {
    /// Node name.
    pub name: Ident,
    /// Reference input.
    pub input: SignalId,
    /// Produced signal.
    pub output: SignalId,
    /// Integer multiplier.
    pub integer: EncodedField,
    /// Fractional multiplier.
    pub fraction: Option<Fraction>,
    /// Divider applied after the VCO.
    pub post_divider: Option<EncodedField>,
    /// Inclusive VCO range.
    pub vco_limits: Option<(Hz, Hz)>,
    /// Custom VCO equation.
    pub formula: Option<Formula>,
}

impl Pll {
    /// Fractional denominator, 1 for an integer-only PLL.
    pub fn denominator(&self) -> u64 {
        self.fraction.map_or(1, |f| f.denominator)
    }
}

/// What a register field controls on a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ControlRole {
    /// Source frequency selector.
    SourceSelect,
    /// Gate enable bit.
    GateEnable,
    /// Divider factor selector.
    DividerFactor,
    /// Fractional divider numerator.
    DividerDenominator,
    /// Mux input selector.
    MuxSelect,
    /// PLL integer feedback.
    PllInteger,
    /// PLL fractional feedback.
    PllFraction,
    /// PLL output divider.
    PllPostDivider,
}

impl ControlRole {
    /// Returns `true` for fields that change a PLL's VCO frequency.
    pub fn drives_vco(self) -> bool {
        matches!(self, ControlRole::PllInteger | ControlRole::PllFraction)
    }
}

impl Node {
    /// Node name.
    pub fn name(&self) -> Ident {
        match self {
            Node::Source(n) => n.name,
            Node::Gate(n) => n.name,
            Node::Divider(n) => n.name,
            Node::Mux(n) => n.name,
            Node::Pll(n) => n.name,
        }
    }

    /// Lowercase kind name for reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Source(_) => "source",
            Node::Gate(_) => "gate",
            Node::Divider(_) => "divider",
            Node::Mux(_) => "mux",
            Node::Pll(_) => "pll",
        }
    }

    /// The produced signal.
    pub fn output(&self) -> SignalId {
        match self {
            Node::Source(n) => n.output,
            Node::Gate(n) => n.output,
            Node::Divider(n) => n.output,
            Node::Mux(n) => n.output,
            Node::Pll(n) => n.output,
        }
    }

    /// Every signal the node may read, without duplicates.
    pub fn inputs(&self) -> Vec<SignalId> {
        match self {
            Node::Source(_) => Vec::new(),
            Node::Gate(n) => vec![n.input],
            Node::Divider(n) => vec![n.input],
            Node::Mux(n) => n.input_signals(),
            Node::Pll(n) => vec![n.input],
        }
    }

    /// Register fields the node reads, in decision order.
    ///
    /// For a PLL the order is integer, fraction, post-divider, so that the
    /// VCO is fully determined before its output divider is chosen. A
    /// fractional divider lists its factor before its numerator.
    pub fn controls(&self) -> Vec<(FieldId, ControlRole)> {
        match self {
            Node::Source(n) => n
                .control
                .map(|f| (f, ControlRole::SourceSelect))
                .into_iter()
                .collect(),
            Node::Gate(n) => vec![(n.control, ControlRole::GateEnable)],
            Node::Divider(n) => {
                let mut out: Vec<_> = n
                    .factor_field()
                    .map(|f| (f, ControlRole::DividerFactor))
                    .into_iter()
                    .collect();
                if let Some(den) = &n.denominator {
                    out.push((den.field, ControlRole::DividerDenominator));
                }
                out
            }
            Node::Mux(n) => vec![(n.control, ControlRole::MuxSelect)],
            Node::Pll(n) => {
                let mut out = vec![(n.integer.field, ControlRole::PllInteger)];
                if let Some(frac) = &n.fraction {
                    out.push((frac.feedback.field, ControlRole::PllFraction));
                }
                if let Some(post) = &n.post_divider {
                    out.push((post.field, ControlRole::PllPostDivider));
                }
                out
            }
        }
    }

    /// Returns `true` if any register field influences the node.
    pub fn is_controlled(&self) -> bool {
        !self.controls().is_empty()
    }
}

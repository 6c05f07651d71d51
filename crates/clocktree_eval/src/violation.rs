//! Limit violations and runtime configuration faults.

use clocktree_common::Hz;
use clocktree_diagnostics::{Category, Diagnostic, DiagnosticCode};
use clocktree_model::{DomainId, FieldId, FormulaFault, Graph, NodeId, SignalId};
use serde::{Deserialize, Serialize};

/// Something wrong with a register configuration. Never fatal: violations
/// are collected and returned alongside the frequencies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LimitViolation {
    /// A running signal is slower than its minimum.
    BelowMinimum {
        /// Offending signal.
        signal: SignalId,
        /// Computed frequency.
        actual: Hz,
        /// Declared minimum.
        min: Hz,
    },
    /// A signal is faster than its maximum.
    AboveMaximum {
        /// Offending signal.
        signal: SignalId,
        /// Computed frequency.
        actual: Hz,
        /// Declared maximum.
        max: Hz,
    },
    /// A running PLL's VCO is below its range.
    VcoBelowMinimum {
        /// Offending PLL.
        pll: NodeId,
        /// Computed VCO frequency.
        vco: Hz,
        /// Lower VCO limit.
        min: Hz,
    },
    /// A PLL's VCO is above its range.
    VcoAboveMaximum {
        /// Offending PLL.
        pll: NodeId,
        /// Computed VCO frequency.
        vco: Hz,
        /// Upper VCO limit.
        max: Hz,
    },
    /// A domain member is faster than the domain ceiling.
    DomainExceeded {
        /// Offending domain.
        domain: DomainId,
        /// Member signal over the ceiling.
        signal: SignalId,
        /// Computed frequency.
        actual: Hz,
        /// Domain ceiling.
        max: Hz,
    },
    /// A node reads a signal that nothing drives.
    UndrivenInput {
        /// Consuming node.
        node: NodeId,
        /// Undriven signal.
        signal: SignalId,
    },
    /// A divider or post-divider selects a divisor of zero.
    DivideByZero {
        /// Offending node.
        node: NodeId,
    },
    /// A mux selects a reserved pattern.
    ReservedSelection {
        /// Offending mux.
        node: NodeId,
        /// Selector value.
        raw: u64,
    },
    /// A field holds a value outside what the node accepts.
    RawOutOfRange {
        /// Offending node.
        node: NodeId,
        /// Field holding the value.
        field: FieldId,
        /// The raw value.
        raw: u64,
    },
    /// A custom VCO formula failed to evaluate.
    FormulaFault {
        /// Offending PLL.
        node: NodeId,
        /// What failed.
        fault: FormulaFault,
    },
    /// A computed frequency does not fit 64 bits.
    Overflow {
        /// Offending node.
        node: NodeId,
    },
}

impl LimitViolation {
    /// Hard limits are those the resolver prunes on as soon as they are
    /// determined: VCO range, signal and domain maxima, and faults that make
    /// a node's output meaningless.
    pub fn is_hard(&self) -> bool {
        !matches!(self, LimitViolation::BelowMinimum { .. })
    }

    /// The signal the violation is about, if it is a signal bound.
    pub fn signal(&self) -> Option<SignalId> {
        match self {
            LimitViolation::BelowMinimum { signal, .. }
            | LimitViolation::AboveMaximum { signal, .. }
            | LimitViolation::DomainExceeded { signal, .. } => Some(*signal),
            _ => None,
        }
    }

    /// The node the violation is about, if it is a node fault or VCO limit.
    pub fn node(&self) -> Option<NodeId> {
        match self {
            LimitViolation::VcoBelowMinimum { pll, .. }
            | LimitViolation::VcoAboveMaximum { pll, .. } => Some(*pll),
            LimitViolation::UndrivenInput { node, .. }
            | LimitViolation::DivideByZero { node }
            | LimitViolation::ReservedSelection { node, .. }
            | LimitViolation::RawOutOfRange { node, .. }
            | LimitViolation::FormulaFault { node, .. }
            | LimitViolation::Overflow { node } => Some(*node),
            _ => None,
        }
    }

    /// Returns `true` for a PLL VCO range violation.
    pub fn is_vco(&self) -> bool {
        matches!(
            self,
            LimitViolation::VcoBelowMinimum { .. } | LimitViolation::VcoAboveMaximum { .. }
        )
    }

    /// Diagnostic code in the `L` (limit) category.
    pub fn code(&self) -> DiagnosticCode {
        let number = match self {
            LimitViolation::BelowMinimum { .. } => 1,
            LimitViolation::AboveMaximum { .. } => 2,
            LimitViolation::VcoBelowMinimum { .. } => 3,
            LimitViolation::VcoAboveMaximum { .. } => 4,
            LimitViolation::DomainExceeded { .. } => 5,
            LimitViolation::UndrivenInput { .. } => 6,
            LimitViolation::DivideByZero { .. } => 7,
            LimitViolation::ReservedSelection { .. } => 8,
            LimitViolation::RawOutOfRange { .. } => 9,
            LimitViolation::FormulaFault { .. } => 10,
            LimitViolation::Overflow { .. } => 11,
        };
        DiagnosticCode::new(Category::Limit, number)
    }

    /// Human-readable description using the graph's names.
    pub fn describe(&self, graph: &Graph) -> String {
        match self {
            LimitViolation::BelowMinimum { signal, actual, min } => format!(
                "signal '{}' runs at {actual}, below its minimum of {min}",
                graph.signal_name(*signal)
            ),
            LimitViolation::AboveMaximum { signal, actual, max } => format!(
                "signal '{}' runs at {actual}, above its maximum of {max}",
                graph.signal_name(*signal)
            ),
            LimitViolation::VcoBelowMinimum { pll, vco, min } => format!(
                "PLL '{}' VCO at {vco} is below its minimum of {min}",
                graph.node_name(*pll)
            ),
            LimitViolation::VcoAboveMaximum { pll, vco, max } => format!(
                "PLL '{}' VCO at {vco} is above its maximum of {max}",
                graph.node_name(*pll)
            ),
            LimitViolation::DomainExceeded {
                domain,
                signal,
                actual,
                max,
            } => format!(
                "signal '{}' runs at {actual}, above the {max} ceiling of domain '{}'",
                graph.signal_name(*signal),
                graph.resolve(graph.domains()[*domain].name)
            ),
            LimitViolation::UndrivenInput { node, signal } => format!(
                "'{}' consumes undriven signal '{}'",
                graph.node_name(*node),
                graph.signal_name(*signal)
            ),
            LimitViolation::DivideByZero { node } => {
                format!("'{}' divides by zero", graph.node_name(*node))
            }
            LimitViolation::ReservedSelection { node, raw } => format!(
                "mux '{}' selects reserved input {raw}",
                graph.node_name(*node)
            ),
            LimitViolation::RawOutOfRange { node, field, raw } => format!(
                "'{}' does not accept {} = {raw}",
                graph.node_name(*node),
                graph.field_path(*field)
            ),
            LimitViolation::FormulaFault { node, fault } => format!(
                "PLL '{}' VCO formula failed: {fault}",
                graph.node_name(*node)
            ),
            LimitViolation::Overflow { node } => {
                format!("'{}' output overflows 64 bits", graph.node_name(*node))
            }
        }
    }

    /// Converts the violation into an error diagnostic.
    pub fn to_diagnostic(&self, graph: &Graph) -> Diagnostic {
        let subject = match (self.signal(), self.node()) {
            (Some(s), _) => graph.signal_name(s).to_string(),
            (None, Some(n)) => graph.node_name(n).to_string(),
            (None, None) => String::new(),
        };
        Diagnostic::error(self.code(), self.describe(graph)).with_subject(subject)
    }
}

//! Errors raised while loading a graph or resolving names against it.

use crate::formula::FormulaError;
use clocktree_diagnostics::{Category, Diagnostic, DiagnosticCode};

/// A structural defect in a clock-tree model. Fatal: no graph is built.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// Two nodes, signals or domains share a name.
    #[error("duplicate {kind} '{name}'")]
    DuplicateName {
        /// Entity kind (`signal`, `node`, `field`, `domain`).
        kind: &'static str,
        /// The repeated name.
        name: String,
    },

    /// A signal has more than one producer.
    #[error("signal '{signal}' is produced by both '{first}' and '{second}'")]
    MultipleProducers {
        /// The contested signal.
        signal: String,
        /// First producer in declaration order.
        first: String,
        /// Second producer.
        second: String,
    },

    /// A name does not refer to anything in the model.
    #[error("'{node}' references unknown {kind} '{name}'")]
    DanglingReference {
        /// Node or domain holding the reference.
        node: String,
        /// Kind of the missing entity.
        kind: &'static str,
        /// The missing name.
        name: String,
    },

    /// A divider or mux table length is not a power of two.
    #[error("'{node}' has a table of length {len}, which is not a power of two")]
    TableNotPowerOfTwo {
        /// Offending node.
        node: String,
        /// Table length.
        len: usize,
    },

    /// A table length disagrees with its field width.
    #[error("'{node}' has a table of length {len} but field '{field}' is {width} bits wide")]
    WidthMismatch {
        /// Offending node.
        node: String,
        /// Field path `REG.FIELD`.
        field: String,
        /// Field width in bits.
        width: u32,
        /// Table length.
        len: usize,
    },

    /// The signal dependency graph contains a cycle.
    #[error("combinational clock loop through {}", nodes.join(" -> "))]
    Cycle {
        /// Nodes on the loop, in declaration order.
        nodes: Vec<String>,
    },

    /// A descriptor is structurally invalid (missing control field, zero
    /// scale, inverted range, and similar).
    #[error("'{node}': {reason}")]
    BadDescriptor {
        /// Offending node or field.
        node: String,
        /// What is wrong.
        reason: String,
    },

    /// A VCO formula does not parse.
    #[error("'{node}' has a malformed VCO formula: {error}")]
    BadFormula {
        /// Offending PLL.
        node: String,
        /// Parse error.
        error: FormulaError,
    },
}

impl SchemaError {
    /// Diagnostic code in the `S` (schema) category.
    pub fn code(&self) -> DiagnosticCode {
        let number = match self {
            SchemaError::DuplicateName { .. } => 1,
            SchemaError::MultipleProducers { .. } => 2,
            SchemaError::DanglingReference { .. } => 3,
            SchemaError::TableNotPowerOfTwo { .. } => 4,
            SchemaError::WidthMismatch { .. } => 5,
            SchemaError::Cycle { .. } => 6,
            SchemaError::BadDescriptor { .. } => 7,
            SchemaError::BadFormula { .. } => 8,
        };
        DiagnosticCode::new(Category::Schema, number)
    }

    /// The node, signal or domain the error names, if a single one.
    pub fn subject(&self) -> Option<&str> {
        match self {
            SchemaError::DuplicateName { name, .. } => Some(name),
            SchemaError::MultipleProducers { signal, .. } => Some(signal),
            SchemaError::DanglingReference { node, .. }
            | SchemaError::TableNotPowerOfTwo { node, .. }
            | SchemaError::WidthMismatch { node, .. }
            | SchemaError::BadDescriptor { node, .. }
            | SchemaError::BadFormula { node, .. } => Some(node),
            SchemaError::Cycle { nodes } => nodes.first().map(String::as_str),
        }
    }

    /// Converts the error into a renderable diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let mut diag = Diagnostic::error(self.code(), self.to_string());
        if let Some(subject) = self.subject() {
            diag = diag.with_subject(subject);
        }
        match self {
            SchemaError::TableNotPowerOfTwo { .. } => {
                diag.with_help("pad the table with \"-reserved-\" entries or 0 factors")
            }
            SchemaError::Cycle { .. } => {
                diag.with_note("clock signals must form a directed acyclic graph")
            }
            _ => diag,
        }
    }
}

/// A name passed by a caller does not exist in the graph.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    /// No signal with this name.
    #[error("unknown signal '{0}'")]
    UnknownSignal(String),

    /// No field with this `REG.FIELD` path.
    #[error("unknown register field '{0}'")]
    UnknownField(String),

    /// A field path without a `.` separator.
    #[error("malformed register field '{0}', expected REG.FIELD")]
    MalformedField(String),
}

//! Clock-tree graph model for microcontroller clock hardware.
//!
//! A chip's clock tree is a DAG of typed nodes (sources, gates, dividers,
//! muxes and PLLs) connected by named signals and controlled by register
//! fields. This crate provides:
//!
//! - [`ClockTreeModel`]: the serde-deserializable description a loader produces
//! - [`Graph`]: the validated, immutable, shareable graph built from it
//! - [`codec`]: raw field value ↔ factor, input and multiplier mapping
//! - [`RegisterState`]: caller-owned field assignments
//! - [`lint`]: non-fatal model checks

#![warn(missing_docs)]

pub mod codec;
pub mod error;
pub mod formula;
pub mod graph;
pub mod ids;
pub mod lint;
pub mod model;
pub mod node;
pub mod state;

pub use codec::{FieldEncoding, NoExactEncoding, PllRatio};
pub use error::{LookupError, SchemaError};
pub use formula::{Bindings, Formula, FormulaError, FormulaFault};
pub use graph::{Domain, FieldDef, Graph, Signal};
pub use ids::{Arena, ArenaId, DomainId, FieldId, NodeId, SignalId};
pub use lint::{LintEngine, LintRule};
pub use model::ClockTreeModel;
pub use node::{ControlRole, Divider, DividerFactor, Gate, Mux, MuxInput, Node, Pll, Source};
pub use state::RegisterState;

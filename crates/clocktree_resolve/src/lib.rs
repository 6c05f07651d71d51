//! Reverse resolution: from target frequencies to register values.
//!
//! [`resolve`] searches the register fields upstream of each target for an
//! assignment that meets every [`Target`] without violating a limit, using
//! the forward evaluator as its oracle. The search is bounded by a step
//! budget ([`ResolveOptions`]) and always reports the closest state it saw
//! when no assignment is acceptable.
//!
//! ```text
//! targets ──► scope (free fields, readiness)
//!         ──► desired (back-propagated wanted frequencies)
//!         ──► search (ordered candidates, pruning, evaluate per step)
//!         ──► Resolution::Solved | Resolution::Infeasible
//! ```

#![warn(missing_docs)]

mod candidates;
mod desired;
pub mod outcome;
mod scope;
pub mod search;
pub mod targets;

pub use outcome::{
    Infeasible, InfeasibleReason, Resolution, SearchStats, Solution, TargetReport,
};
pub use search::{resolve, ResolveOptions, DEFAULT_STEP_BUDGET};
pub use targets::{Target, TargetSet};

//! Forward evaluation of clock trees.
//!
//! [`evaluate`] propagates a [`RegisterState`](clocktree_model::RegisterState)
//! through a [`Graph`](clocktree_model::Graph) in topological order and
//! returns every signal's frequency together with all faults and
//! [`LimitViolation`]s found by the [`LimitValidator`].

#![warn(missing_docs)]

pub mod evaluator;
pub mod limits;
pub mod violation;

pub use evaluator::{
    eval_node, evaluate, evaluate_with, Evaluation, Frequencies, NodeOutput, SignalValue,
};
pub use limits::LimitValidator;
pub use violation::LimitViolation;

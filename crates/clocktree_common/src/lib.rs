//! Shared foundational types used across the clocktree crates.
//!
//! This crate provides interned identifiers for signal, node and register names,
//! the integer [`Hz`] frequency type with unit parsing, and the [`Tolerance`]
//! used when comparing an achieved frequency against a requested one.

#![warn(missing_docs)]

pub mod frequency;
pub mod ident;
pub mod tolerance;

pub use frequency::{Hz, ParseFrequencyError};
pub use ident::{Ident, Interner};
pub use tolerance::{ParseToleranceError, Tolerance};

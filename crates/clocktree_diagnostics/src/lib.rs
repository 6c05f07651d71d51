//! Structured diagnostics for clock-tree loading, evaluation and resolution.
//!
//! Every user-facing report (schema problems, limit violations, unmet targets,
//! model lints) is a [`Diagnostic`] with a severity, a categorized code and the
//! clock-tree entity it concerns. A thread-safe [`DiagnosticSink`] accumulates
//! them and [`TerminalRenderer`] formats them for humans; the same values
//! serialize to JSON for machine consumers.

#![warn(missing_docs)]

pub mod code;
pub mod diagnostic;
pub mod renderer;
pub mod severity;
pub mod sink;

pub use code::{Category, DiagnosticCode, ParseCodeError};
pub use diagnostic::Diagnostic;
pub use renderer::{DiagnosticRenderer, TerminalRenderer};
pub use severity::Severity;
pub use sink::DiagnosticSink;

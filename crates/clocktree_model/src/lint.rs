//! Non-fatal model checks.
//!
//! A loaded graph is structurally sound, but may still contain things a model
//! author almost certainly did not intend. Each check is a [`LintRule`]; the
//! [`LintEngine`] runs them, dropping allowed rules and promoting denied ones
//! to errors.

use crate::graph::Graph;
use crate::node::{MuxInput, Node};
use clocktree_diagnostics::{Category, Diagnostic, DiagnosticCode, DiagnosticSink, Severity};
use std::collections::HashSet;

/// A single model check.
pub trait LintRule: Send + Sync {
    /// Diagnostic code of the rule, in the `W` category.
    fn code(&self) -> DiagnosticCode;

    /// Short kebab-case name used in allow/deny lists.
    fn name(&self) -> &str;

    /// One-line description.
    fn description(&self) -> &str;

    /// Checks the graph and emits warnings to the sink.
    fn check(&self, graph: &Graph, sink: &DiagnosticSink);
}

/// A declared signal that nothing produces or consumes.
pub struct OrphanSignal;

impl LintRule for OrphanSignal {
    fn code(&self) -> DiagnosticCode {
        DiagnosticCode::new(Category::Lint, 1)
    }

    fn name(&self) -> &str {
        "orphan-signal"
    }

    fn description(&self) -> &str {
        "signal is neither produced nor consumed by any node"
    }

    fn check(&self, graph: &Graph, sink: &DiagnosticSink) {
        for (id, signal) in graph.signals().iter() {
            if signal.producer.is_none() && graph.consumers(id).is_empty() {
                let name = graph.signal_name(id);
                sink.emit(
                    Diagnostic::warning(self.code(), format!("signal '{name}' is not connected"))
                        .with_subject(name),
                );
            }
        }
    }
}

/// A mux with no selectable clock.
pub struct DeadMux;

impl LintRule for DeadMux {
    fn code(&self) -> DiagnosticCode {
        DiagnosticCode::new(Category::Lint, 2)
    }

    fn name(&self) -> &str {
        "dead-mux"
    }

    fn description(&self) -> &str {
        "every mux input is off or reserved"
    }

    fn check(&self, graph: &Graph, sink: &DiagnosticSink) {
        for (id, node) in graph.nodes().iter() {
            let Node::Mux(mux) = node else { continue };
            if mux
                .inputs
                .iter()
                .all(|i| matches!(i, MuxInput::Off | MuxInput::Reserved))
            {
                let name = graph.node_name(id);
                sink.emit(
                    Diagnostic::warning(
                        self.code(),
                        format!("mux '{name}' cannot select any clock"),
                    )
                    .with_subject(name),
                );
            }
        }
    }
}

/// A declared field that no node reads.
pub struct UnusedField;

impl LintRule for UnusedField {
    fn code(&self) -> DiagnosticCode {
        DiagnosticCode::new(Category::Lint, 3)
    }

    fn name(&self) -> &str {
        "unused-field"
    }

    fn description(&self) -> &str {
        "declared register field controls nothing"
    }

    fn check(&self, graph: &Graph, sink: &DiagnosticSink) {
        for (id, field) in graph.fields().iter() {
            if field.declared && graph.field_users(id).is_empty() {
                let path = graph.field_path(id);
                sink.emit(
                    Diagnostic::warning(self.code(), format!("field {path} controls no node"))
                        .with_subject(path),
                );
            }
        }
    }
}

/// A signal whose minimum exceeds its maximum, so no nonzero frequency is legal.
pub struct InvertedBounds;

impl LintRule for InvertedBounds {
    fn code(&self) -> DiagnosticCode {
        DiagnosticCode::new(Category::Lint, 4)
    }

    fn name(&self) -> &str {
        "inverted-bounds"
    }

    fn description(&self) -> &str {
        "signal minimum is above its maximum"
    }

    fn check(&self, graph: &Graph, sink: &DiagnosticSink) {
        for (id, signal) in graph.signals().iter() {
            if let (Some(min), Some(max)) = (signal.min, signal.max) {
                if min > max {
                    let name = graph.signal_name(id);
                    sink.emit(
                        Diagnostic::warning(
                            self.code(),
                            format!("signal '{name}' has min {min} above max {max}"),
                        )
                        .with_subject(name)
                        .with_note("only a stopped clock satisfies these bounds"),
                    );
                }
            }
        }
    }
}

/// Rules picked out of an allow or deny list, by name or by code.
#[derive(Debug, Default)]
struct RuleSet {
    names: HashSet<String>,
    codes: HashSet<DiagnosticCode>,
}

impl RuleSet {
    fn new(entries: &[String]) -> Self {
        let mut set = Self::default();
        for entry in entries {
            match entry.parse::<DiagnosticCode>() {
                Ok(code) => set.codes.insert(code),
                Err(_) => set.names.insert(entry.clone()),
            };
        }
        set
    }

    fn contains(&self, rule: &dyn LintRule) -> bool {
        self.codes.contains(&rule.code()) || self.names.contains(rule.name())
    }
}

/// Runs lint rules with allow/deny overrides.
pub struct LintEngine {
    rules: Vec<Box<dyn LintRule>>,
    denied: RuleSet,
    allowed: RuleSet,
}

impl LintEngine {
    /// Creates an engine with every built-in rule registered. List entries
    /// are rule names (`dead-mux`) or codes (`W002`).
    pub fn new(allow: &[String], deny: &[String]) -> Self {
        let mut engine = Self {
            rules: Vec::new(),
            denied: RuleSet::new(deny),
            allowed: RuleSet::new(allow),
        };
        engine.register(Box::new(OrphanSignal));
        engine.register(Box::new(DeadMux));
        engine.register(Box::new(UnusedField));
        engine.register(Box::new(InvertedBounds));
        engine
    }

    /// Creates an engine with no overrides.
    pub fn with_defaults() -> Self {
        Self::new(&[], &[])
    }

    /// Adds a rule.
    pub fn register(&mut self, rule: Box<dyn LintRule>) {
        self.rules.push(rule);
    }

    /// Names of all registered rules.
    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Runs every rule not allowed, promoting findings of denied rules to
    /// errors.
    pub fn run(&self, graph: &Graph, sink: &DiagnosticSink) {
        for rule in &self.rules {
            if self.allowed.contains(rule.as_ref()) {
                continue;
            }
            let scratch = DiagnosticSink::new();
            rule.check(graph, &scratch);
            let denied = self.denied.contains(rule.as_ref());
            for mut diag in scratch.take_all() {
                if denied {
                    diag.severity = Severity::Error;
                }
                sink.emit(diag);
            }
        }
    }
}

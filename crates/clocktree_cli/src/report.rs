//! Machine-readable command output.

use std::collections::BTreeMap;

use clocktree_diagnostics::Diagnostic;
use clocktree_eval::Evaluation;
use clocktree_model::Graph;
use clocktree_resolve::{Resolution, TargetReport};
use serde::Serialize;

/// `clocktree eval --format json` output.
#[derive(Debug, Serialize)]
pub struct EvalReport {
    /// Signal name to frequency in Hz, `null` when undriven.
    pub signals: BTreeMap<String, Option<u64>>,
    /// PLL name to VCO frequency in Hz.
    pub vco: BTreeMap<String, u64>,
    /// Faults and limit violations.
    pub violations: Vec<Diagnostic>,
}

impl EvalReport {
    /// Builds the report for one evaluation.
    pub fn new(graph: &Graph, evaluation: &Evaluation) -> Self {
        let freqs = &evaluation.frequencies;
        Self {
            signals: freqs
                .iter()
                .map(|(id, value)| (graph.signal_name(id).to_string(), value.hz().map(|h| h.hz())))
                .collect(),
            vco: freqs
                .vcos()
                .map(|(id, hz)| (graph.node_name(id).to_string(), hz.hz()))
                .collect(),
            violations: evaluation
                .violations
                .iter()
                .map(|v| v.to_diagnostic(graph))
                .collect(),
        }
    }
}

/// One target line of a resolve report.
#[derive(Debug, Serialize)]
pub struct TargetLine {
    /// Signal name.
    pub signal: String,
    /// Requested frequency in Hz.
    pub desired: u64,
    /// Tolerance as displayed (`"0Hz"`, `"2500ppm"`, `"1%"`).
    pub tolerance: String,
    /// Achieved frequency in Hz, `null` when undriven.
    pub achieved: Option<u64>,
    /// `achieved - desired` in Hz.
    pub error_hz: Option<i64>,
    /// Whether the target is within tolerance.
    pub met: bool,
}

impl TargetLine {
    fn new(graph: &Graph, report: &TargetReport) -> Self {
        Self {
            signal: graph.signal_name(report.signal).to_string(),
            desired: report.desired.hz(),
            tolerance: report.tolerance.to_string(),
            achieved: report.achieved.hz().map(|h| h.hz()),
            error_hz: report.error_hz(),
            met: report.met,
        }
    }
}

/// Search effort, as printed.
#[derive(Debug, Serialize)]
pub struct StatsLine {
    /// Evaluated assignments.
    pub steps: u64,
    /// Rejected branches.
    pub pruned: u64,
    /// Searched fields.
    pub free_fields: usize,
}

/// `clocktree resolve --format json` output.
#[derive(Debug, Serialize)]
pub struct ResolveReport {
    /// `"solved"` or `"infeasible"`.
    pub status: &'static str,
    /// Why the search gave up, for an infeasible outcome.
    pub reason: Option<String>,
    /// Field path to raw value for every field written, default or not.
    pub registers: BTreeMap<String, u64>,
    /// Per-target results.
    pub targets: Vec<TargetLine>,
    /// Search effort.
    pub stats: StatsLine,
    /// Unmet targets and violations.
    pub diagnostics: Vec<Diagnostic>,
}

impl ResolveReport {
    /// Builds the report for one resolution.
    pub fn new(graph: &Graph, resolution: &Resolution) -> Self {
        let stats = resolution.stats();
        let (status, reason) = match resolution {
            Resolution::Solved(_) => ("solved", None),
            Resolution::Infeasible(inf) => ("infeasible", Some(inf.reason.to_string())),
        };
        Self {
            status,
            reason,
            registers: resolution.state().to_named(graph),
            targets: resolution
                .targets()
                .iter()
                .map(|t| TargetLine::new(graph, t))
                .collect(),
            stats: StatsLine {
                steps: stats.steps,
                pruned: stats.pruned,
                free_fields: stats.free_variables,
            },
            diagnostics: resolution.to_diagnostics(graph),
        }
    }
}


//! Resolution results.

use clocktree_common::{Hz, Tolerance};
use clocktree_diagnostics::{Category, Diagnostic, DiagnosticCode};
use clocktree_eval::{Evaluation, LimitViolation, SignalValue};
use clocktree_model::{Graph, RegisterState, SignalId};
use std::fmt;

/// Why a search ended without an accepted assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InfeasibleReason {
    /// Every candidate assignment was tried or pruned.
    Exhausted,
    /// The step budget ran out first.
    BudgetExceeded,
}

impl fmt::Display for InfeasibleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InfeasibleReason::Exhausted => "no assignment meets every target",
            InfeasibleReason::BudgetExceeded => "search step budget exceeded",
        })
    }
}

/// Search effort counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    /// Candidate assignments evaluated.
    pub steps: u64,
    /// Candidates rejected before descending further.
    pub pruned: u64,
    /// Free register fields searched over.
    pub free_variables: usize,
    /// Deepest variable index reached, plus one.
    pub max_depth: usize,
}

/// How one target fared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetReport {
    /// Target signal.
    pub signal: SignalId,
    /// Requested frequency.
    pub desired: Hz,
    /// Acceptance window.
    pub tolerance: Tolerance,
    /// Frequency reached.
    pub achieved: SignalValue,
    /// Whether `achieved` is within tolerance.
    pub met: bool,
}

impl TargetReport {
    /// Signed error `achieved - desired` in Hz, saturating; `None` when undriven.
    pub fn error_hz(&self) -> Option<i64> {
        let achieved = self.achieved.hz()?;
        let diff = i128::from(achieved.hz()) - i128::from(self.desired.hz());
        Some(diff.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64)
    }
}

/// An accepted assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solution {
    /// Pinned fields plus every searched field.
    pub state: RegisterState,
    /// Evaluation of `state`.
    pub evaluation: Evaluation,
    /// Per-target results, all met.
    pub targets: Vec<TargetReport>,
    /// Search effort.
    pub stats: SearchStats,
}

/// The closest assignment found when no accepted one exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Infeasible {
    /// Why the search stopped.
    pub reason: InfeasibleReason,
    /// Lowest-ranked state seen: fewest violations, then least aggregate
    /// relative error.
    pub best: RegisterState,
    /// Evaluation of `best`.
    pub evaluation: Evaluation,
    /// Per-target results for `best`.
    pub targets: Vec<TargetReport>,
    /// Violations of `best`.
    pub violations: Vec<LimitViolation>,
    /// Search effort.
    pub stats: SearchStats,
}

impl Infeasible {
    /// Targets `best` misses.
    pub fn unmet(&self) -> impl Iterator<Item = &TargetReport> + '_ {
        self.targets.iter().filter(|t| !t.met)
    }
}

/// Final state of a search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Every target met with no violation in the searched part of the tree.
    Solved(Solution),
    /// No acceptable assignment found.
    Infeasible(Infeasible),
}

impl Resolution {
    /// Returns `true` for [`Resolution::Solved`].
    pub fn is_solved(&self) -> bool {
        matches!(self, Resolution::Solved(_))
    }

    /// The accepted state, or the best state found.
    pub fn state(&self) -> &RegisterState {
        match self {
            Resolution::Solved(s) => &s.state,
            Resolution::Infeasible(i) => &i.best,
        }
    }

    /// Evaluation of [`state`](Self::state).
    pub fn evaluation(&self) -> &Evaluation {
        match self {
            Resolution::Solved(s) => &s.evaluation,
            Resolution::Infeasible(i) => &i.evaluation,
        }
    }

    /// Per-target results.
    pub fn targets(&self) -> &[TargetReport] {
        match self {
            Resolution::Solved(s) => &s.targets,
            Resolution::Infeasible(i) => &i.targets,
        }
    }

    /// Search effort.
    pub fn stats(&self) -> SearchStats {
        match self {
            Resolution::Solved(s) => s.stats,
            Resolution::Infeasible(i) => i.stats,
        }
    }

    /// Diagnostics describing an infeasible outcome: one for the outcome,
    /// one per unmet target and one per violation. Empty when solved.
    pub fn to_diagnostics(&self, graph: &Graph) -> Vec<Diagnostic> {
        let Resolution::Infeasible(inf) = self else {
            return Vec::new();
        };
        let number = match inf.reason {
            InfeasibleReason::Exhausted => 1,
            InfeasibleReason::BudgetExceeded => 2,
        };
        let mut out = vec![Diagnostic::error(
            DiagnosticCode::new(Category::Resolve, number),
            inf.reason.to_string(),
        )
        .with_note(format!(
            "{} steps, {} pruned, {} free fields",
            inf.stats.steps, inf.stats.pruned, inf.stats.free_variables
        ))];
        for t in inf.unmet() {
            let name = graph.signal_name(t.signal);
            let mut diag = Diagnostic::error(
                DiagnosticCode::new(Category::Resolve, 3),
                format!("target '{name}' = {} ± {} not met", t.desired, t.tolerance),
            )
            .with_subject(name);
            diag = match (t.achieved.hz(), t.error_hz()) {
                (Some(hz), Some(err)) => diag.with_note(format!(
                    "nearest achievable is {hz} ({} by {})",
                    if err < 0 { "short" } else { "over" },
                    Hz(err.unsigned_abs())
                )),
                _ => diag.with_note("signal is undriven in the best assignment"),
            };
            out.push(diag);
        }
        out.extend(inf.violations.iter().map(|v| v.to_diagnostic(graph)));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_sign() {
        let report = TargetReport {
            signal: SignalId::from_raw(0),
            desired: Hz::mhz(201),
            tolerance: Tolerance::EXACT,
            achieved: SignalValue::Driven(Hz::mhz(200)),
            met: false,
        };
        assert_eq!(report.error_hz(), Some(-1_000_000));
        let undriven = TargetReport {
            achieved: SignalValue::Undriven,
            ..report
        };
        assert_eq!(undriven.error_hz(), None);
    }

    #[test]
    fn reason_display() {
        assert_eq!(
            InfeasibleReason::BudgetExceeded.to_string(),
            "search step budget exceeded"
        );
    }
}

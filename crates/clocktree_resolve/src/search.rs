//! Depth-first search over the free register fields.
//!
//! Fields are assigned root-first, one per level, from candidate lists
//! ordered by [`candidates`](crate::candidates). Every assignment tried is a
//! complete register state (fields below the current level sit at their
//! defaults), so each step is a full [`evaluate`] and every step is a
//! possible best-effort answer.
//!
//! The search runs in two phases:
//!
//! 1. **Satisfy**: looks for a state meeting every target with no violation
//!    in the searched part of the tree. A branch is cut as soon as a
//!    violation or a missed target no deeper field can change appears.
//! 2. **Optimize**: entered only when phase 1 ran dry. Looks for the state
//!    closest to the targets, cutting branches that carry a hard violation
//!    or whose already-fixed targets are further off than the best clean
//!    state seen.

use crate::candidates::{candidates, Context};
use crate::desired::Desired;
use crate::outcome::{
    Infeasible, InfeasibleReason, Resolution, SearchStats, Solution, TargetReport,
};
use crate::scope::{determined, Scope};
use crate::targets::{Target, TargetSet};
use clocktree_common::Hz;
use clocktree_eval::{evaluate, Evaluation, LimitViolation};
use clocktree_model::{Graph, RegisterState, SignalId};

/// Steps allowed when the caller does not say otherwise.
pub const DEFAULT_STEP_BUDGET: u64 = 100_000;

/// Relative error charged for a target left undriven, in parts per billion.
const UNDRIVEN_PENALTY: u128 = 1_000_000_000_000_000;

/// Search limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Maximum number of evaluated assignments, counting the initial state,
    /// both phases and the simplification pass. Zero evaluates nothing.
    pub step_budget: u64,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            step_budget: DEFAULT_STEP_BUDGET,
        }
    }
}

/// Finds register values that bring every target signal within tolerance.
///
/// Fields in `pinned` keep their values and are never searched. The fields
/// searched are those controlling a node upstream of some target; everything
/// else stays at its default. A state is accepted when every target is met
/// and no limit violation touches a signal the searched fields can reach or
/// a target.
///
/// When several states are acceptable the first found in candidate order
/// wins, after which each searched field is reset to its default where that
/// keeps the state acceptable.
///
/// Deterministic: the same inputs always give the same [`Resolution`].
pub fn resolve(
    graph: &Graph,
    targets: &TargetSet,
    pinned: &RegisterState,
    options: &ResolveOptions,
) -> Resolution {
    let scope = Scope::new(graph, targets, pinned);
    let mut working = pinned.clone();
    for var in &scope.vars {
        working.set(var.field, var.default);
    }
    let mut search = Search {
        graph,
        targets,
        desired: Desired::compute(graph, targets),
        working,
        budget: options.step_budget,
        stats: SearchStats {
            free_variables: scope.vars.len(),
            ..SearchStats::default()
        },
        scope,
        best: None,
        best_clean_error: None,
    };

    if search.out_of_budget() {
        return search.infeasible(InfeasibleReason::BudgetExceeded);
    }
    let base = search.step();
    if search.accepted(&base) {
        return search.solved(base);
    }
    if search.scope.vars.is_empty() {
        return search.infeasible(InfeasibleReason::Exhausted);
    }
    match search.run(Phase::Satisfy, &base) {
        Outcome::Found(evaluation) => {
            let evaluation = search.simplify(evaluation);
            search.solved(evaluation)
        }
        Outcome::OutOfBudget => search.infeasible(InfeasibleReason::BudgetExceeded),
        Outcome::Exhausted => {
            search.run(Phase::Optimize, &base);
            search.infeasible(InfeasibleReason::Exhausted)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Satisfy,
    Optimize,
}

enum Outcome {
    Found(Evaluation),
    Exhausted,
    OutOfBudget,
}

/// Ordering of complete states; lower is better.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Rank {
    violations: usize,
    error_ppb: u128,
    writes: usize,
    raws: Vec<u64>,
}

struct Best {
    rank: Rank,
    state: RegisterState,
    evaluation: Evaluation,
}

struct Frame {
    var: usize,
    candidates: Vec<u64>,
    next: usize,
}

struct Search<'a> {
    graph: &'a Graph,
    targets: &'a TargetSet,
    scope: Scope,
    desired: Desired,
    working: RegisterState,
    budget: u64,
    stats: SearchStats,
    best: Option<Best>,
    /// Lowest error among evaluated states with no in-cone violation.
    best_clean_error: Option<u128>,
}

impl<'a> Search<'a> {
    fn run(&mut self, phase: Phase, base: &Evaluation) -> Outcome {
        let mut stack = vec![self.frame(0, base)];
        loop {
            let Some(frame) = stack.last_mut() else {
                return Outcome::Exhausted;
            };
            let var = frame.var;
            let Some(&raw) = frame.candidates.get(frame.next) else {
                stack.pop();
                let v = &self.scope.vars[var];
                self.working.set(v.field, v.default);
                continue;
            };
            frame.next += 1;

            if self.out_of_budget() {
                return Outcome::OutOfBudget;
            }
            self.working.set(self.scope.vars[var].field, raw);
            self.stats.max_depth = self.stats.max_depth.max(var + 1);
            let evaluation = self.step();

            if self.prune(phase, var, &evaluation) {
                self.stats.pruned += 1;
                continue;
            }
            if var + 1 < self.scope.vars.len() {
                let next = self.frame(var + 1, &evaluation);
                stack.push(next);
            } else if phase == Phase::Satisfy && self.accepted(&evaluation) {
                return Outcome::Found(evaluation);
            }
        }
    }

    fn frame(&self, var: usize, evaluation: &Evaluation) -> Frame {
        let cx = Context {
            graph: self.graph,
            desired: &self.desired,
            state: &self.working,
            freqs: &evaluation.frequencies,
        };
        Frame {
            var,
            candidates: candidates(&cx, &self.scope.vars[var]),
            next: 0,
        }
    }

    fn out_of_budget(&self) -> bool {
        self.stats.steps >= self.budget
    }

    /// Evaluates the working state and records it.
    fn step(&mut self) -> Evaluation {
        self.stats.steps += 1;
        let evaluation = evaluate(self.graph, &self.working);
        let rank = self.rank(&evaluation);
        if rank.violations == 0 {
            let error = rank.error_ppb;
            self.best_clean_error = Some(self.best_clean_error.map_or(error, |e| e.min(error)));
        }
        if self.best.as_ref().map_or(true, |b| rank < b.rank) {
            self.best = Some(Best {
                rank,
                state: self.working.clone(),
                evaluation: evaluation.clone(),
            });
        }
        evaluation
    }

    fn prune(&self, phase: Phase, depth: usize, evaluation: &Evaluation) -> bool {
        let fixed_violation = evaluation.violations.iter().any(|v| {
            self.scope
                .locate(self.graph, v)
                .is_some_and(|ready| determined(ready, depth))
                && (phase == Phase::Satisfy || v.is_hard())
        });
        if fixed_violation {
            return true;
        }
        let mut fixed_targets = self
            .targets
            .iter()
            .filter(|(s, _)| determined(self.scope.signal_ready(*s), depth));
        match phase {
            Phase::Satisfy => fixed_targets.any(|(s, t)| !met(evaluation, s, t)),
            Phase::Optimize => {
                let Some(limit) = self.best_clean_error else {
                    return false;
                };
                let partial = fixed_targets.fold(0u128, |acc, (s, t)| {
                    acc.saturating_add(relative_error_ppb(t.frequency, evaluation.frequencies.hz(s)))
                });
                partial > limit
            }
        }
    }

    fn in_cone(&self, violation: &LimitViolation) -> bool {
        self.scope.locate(self.graph, violation).is_some()
    }

    fn accepted(&self, evaluation: &Evaluation) -> bool {
        self.targets.iter().all(|(s, t)| met(evaluation, s, t))
            && !evaluation.violations.iter().any(|v| self.in_cone(v))
    }

    fn rank(&self, evaluation: &Evaluation) -> Rank {
        let violations = evaluation
            .violations
            .iter()
            .filter(|v| self.in_cone(v))
            .count();
        let error_ppb = self.targets.iter().fold(0u128, |acc, (s, t)| {
            acc.saturating_add(relative_error_ppb(t.frequency, evaluation.frequencies.hz(s)))
        });
        let raws: Vec<u64> = self
            .scope
            .vars
            .iter()
            .map(|v| self.working.value(self.graph, v.field))
            .collect();
        let writes = self
            .scope
            .vars
            .iter()
            .zip(&raws)
            .filter(|(v, raw)| **raw != v.default)
            .count();
        Rank {
            violations,
            error_ppb,
            writes,
            raws,
        }
    }

    /// Resets each searched field to its default where the state stays
    /// accepted, while budget remains.
    fn simplify(&mut self, mut evaluation: Evaluation) -> Evaluation {
        for i in 0..self.scope.vars.len() {
            let (field, default) = (self.scope.vars[i].field, self.scope.vars[i].default);
            let current = self.working.value(self.graph, field);
            if current == default {
                continue;
            }
            if self.out_of_budget() {
                break;
            }
            self.working.set(field, default);
            let candidate = self.step();
            if self.accepted(&candidate) {
                evaluation = candidate;
            } else {
                self.working.set(field, current);
            }
        }
        evaluation
    }

    fn reports(&self, evaluation: &Evaluation) -> Vec<TargetReport> {
        self.targets
            .iter()
            .map(|(signal, t)| TargetReport {
                signal,
                desired: t.frequency,
                tolerance: t.tolerance,
                achieved: evaluation.frequencies.get(signal),
                met: met(evaluation, signal, t),
            })
            .collect()
    }

    fn solved(self, evaluation: Evaluation) -> Resolution {
        let targets = self.reports(&evaluation);
        Resolution::Solved(Solution {
            state: self.working,
            evaluation,
            targets,
            stats: self.stats,
        })
    }

    fn infeasible(mut self, reason: InfeasibleReason) -> Resolution {
        let (best, evaluation) = match self.best.take() {
            Some(b) => (b.state, b.evaluation),
            None => (self.working.clone(), evaluate(self.graph, &self.working)),
        };
        let targets = self.reports(&evaluation);
        let violations = evaluation
            .violations
            .iter()
            .filter(|v| self.in_cone(v))
            .cloned()
            .collect();
        Resolution::Infeasible(Infeasible {
            reason,
            best,
            evaluation,
            targets,
            violations,
            stats: self.stats,
        })
    }
}

fn met(evaluation: &Evaluation, signal: SignalId, target: &Target) -> bool {
    evaluation
        .frequencies
        .hz(signal)
        .is_some_and(|actual| target.accepts(actual))
}

/// `|actual - desired| / desired` in parts per billion. A zero request
/// charges the actual frequency itself.
fn relative_error_ppb(desired: Hz, actual: Option<Hz>) -> u128 {
    let Some(actual) = actual else {
        return UNDRIVEN_PENALTY;
    };
    let diff = u128::from(desired.abs_diff(actual));
    if desired.is_zero() {
        return diff * 1_000_000_000;
    }
    diff * 1_000_000_000 / u128::from(desired.hz())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clocktree_common::Tolerance;
    use clocktree_eval::SignalValue;
    use clocktree_model::ClockTreeModel;

    fn load(json: &str) -> Graph {
        let model: ClockTreeModel = serde_json::from_str(json).unwrap();
        Graph::load(&model).unwrap()
    }

    fn simple() -> Graph {
        load(
            r#"{
            "signals": [{"name": "hse_ck", "nominal": 8000000}],
            "sources": [{"name": "HSE", "output": "hse_ck"}],
            "plls": [{"name": "PLL1", "input": "hse_ck", "output": "pll1_vco",
                      "feedback_integer": {"reg": "PLLCFGR", "field": "N", "value_range": [8, 120]},
                      "vco_limits": [64000000, 400000000]}],
            "dividers": [{"name": "P", "input": "pll1_vco", "output": "sys_ck",
                          "reg": "PLLCFGR", "field": "P", "factors": [2, 4, 6, 8]}]
        }"#,
        )
    }

    fn f4() -> Graph {
        load(
            r#"{
            "signals": [{"name": "hse_ck", "nominal": 8000000}],
            "sources": [{"name": "HSE", "output": "hse_ck"}],
            "dividers": [
                {"name": "PLLM", "input": "hse_ck", "output": "ref_ck",
                 "reg": "PLLCFGR", "field": "PLLM", "linear": {"value_range": [1, 63]}},
                {"name": "PLLP", "input": "vco_ck", "output": "sys_ck",
                 "reg": "PLLCFGR", "field": "PLLP", "factors": [2, 4, 6, 8]},
                {"name": "PLLQ", "input": "vco_ck", "output": "usb_ck",
                 "reg": "PLLCFGR", "field": "PLLQ", "linear": {"value_range": [2, 15]}}
            ],
            "plls": [{"name": "PLL", "input": "ref_ck", "output": "vco_ck",
                      "feedback_integer": {"reg": "PLLCFGR", "field": "PLLN", "value_range": [50, 432]},
                      "vco_limits": [100000000, 432000000]}]
        }"#,
        )
    }

    fn targets(g: &Graph, wanted: &[(&str, u64)]) -> TargetSet {
        let mut t = TargetSet::new();
        for (name, hz) in wanted {
            t.insert_named(g, name, Hz(*hz), Tolerance::EXACT).unwrap();
        }
        t
    }

    fn field(g: &Graph, state: &RegisterState, path: &str) -> Option<u64> {
        state.get(g.field_by_path(path).unwrap())
    }

    fn hz(res: &Resolution, g: &Graph, name: &str) -> Option<Hz> {
        res.evaluation()
            .frequencies
            .hz(g.signal_id(name).unwrap())
    }

    #[test]
    fn reaches_exact_target() {
        let g = simple();
        let t = targets(&g, &[("sys_ck", 200_000_000)]);
        let res = resolve(&g, &t, &RegisterState::new(), &ResolveOptions::default());
        let Resolution::Solved(sol) = &res else {
            panic!("expected a solution, got {res:?}");
        };
        assert_eq!(field(&g, &sol.state, "PLLCFGR.N"), Some(50));
        assert_eq!(field(&g, &sol.state, "PLLCFGR.P"), Some(0));
        assert_eq!(hz(&res, &g, "sys_ck"), Some(Hz::mhz(200)));
        assert!(sol.targets.iter().all(|t| t.met));
        assert_eq!(sol.stats.free_variables, 2);
    }

    #[test]
    fn unreachable_target_reports_nearest() {
        let g = simple();
        let t = targets(&g, &[("sys_ck", 201_000_000)]);
        let res = resolve(&g, &t, &RegisterState::new(), &ResolveOptions::default());
        let Resolution::Infeasible(inf) = &res else {
            panic!("expected infeasible, got {res:?}");
        };
        assert_eq!(inf.reason, InfeasibleReason::Exhausted);
        assert!(inf.violations.is_empty());
        let report = inf.unmet().next().unwrap();
        assert_eq!(report.achieved, SignalValue::Driven(Hz::mhz(200)));
        assert_eq!(report.error_hz(), Some(-1_000_000));

        let diags = res.to_diagnostics(&g);
        assert_eq!(diags[0].code.to_string(), "R001");
        assert_eq!(diags[1].code.to_string(), "R003");
    }

    #[test]
    fn budget_is_enforced() {
        let g = simple();
        let t = targets(&g, &[("sys_ck", 201_000_000)]);
        let res = resolve(&g, &t, &RegisterState::new(), &ResolveOptions { step_budget: 5 });
        let Resolution::Infeasible(inf) = &res else {
            panic!("expected infeasible, got {res:?}");
        };
        assert_eq!(inf.reason, InfeasibleReason::BudgetExceeded);
        assert_eq!(inf.stats.steps, 5);
    }

    #[test]
    fn zero_budget_evaluates_nothing() {
        let g = simple();
        let t = targets(&g, &[("sys_ck", 200_000_000)]);
        let res = resolve(&g, &t, &RegisterState::new(), &ResolveOptions { step_budget: 0 });
        let Resolution::Infeasible(inf) = &res else {
            panic!("expected infeasible, got {res:?}");
        };
        assert_eq!(inf.reason, InfeasibleReason::BudgetExceeded);
        assert_eq!(inf.stats.steps, 0);
        // the report still describes the starting state
        assert_eq!(field(&g, &inf.best, "PLLCFGR.N"), Some(0));
        assert_eq!(field(&g, &inf.best, "PLLCFGR.P"), Some(0));

        let one = resolve(&g, &t, &RegisterState::new(), &ResolveOptions { step_budget: 1 });
        assert_eq!(one.stats().steps, 1);
        assert!(!one.is_solved());
    }

    #[test]
    fn fractional_divider_numerator_is_searched() {
        let g = load(
            r#"{
            "sources": [{"name": "S", "output": "in_ck", "frequencies": [48000000]}],
            "dividers": [{"name": "SAI", "input": "in_ck", "output": "sai_ck",
                          "reg": "R", "field": "DIV", "factors": [1, 2, 4, 8],
                          "denominator": {"reg": "R", "field": "NUM", "value_range": [1, 15]}}]
        }"#,
        );
        let t = targets(&g, &[("sai_ck", 36_000_000)]);
        let res = resolve(&g, &t, &RegisterState::new(), &ResolveOptions::default());
        assert!(res.is_solved(), "{res:?}");
        assert_eq!(field(&g, res.state(), "R.DIV"), Some(2));
        assert_eq!(field(&g, res.state(), "R.NUM"), Some(3));
        assert_eq!(hz(&res, &g, "sai_ck"), Some(Hz::mhz(36)));
    }

    #[test]
    fn shared_pll_serves_two_targets() {
        let g = f4();
        let t = targets(&g, &[("sys_ck", 168_000_000), ("usb_ck", 48_000_000)]);
        let res = resolve(&g, &t, &RegisterState::new(), &ResolveOptions::default());
        assert!(res.is_solved(), "{res:?}");
        assert_eq!(hz(&res, &g, "vco_ck"), Some(Hz::mhz(336)));
        assert_eq!(hz(&res, &g, "sys_ck"), Some(Hz::mhz(168)));
        assert_eq!(hz(&res, &g, "usb_ck"), Some(Hz::mhz(48)));
        assert_eq!(field(&g, res.state(), "PLLCFGR.PLLQ"), Some(7));
        assert!(res.evaluation().violations.is_empty());
    }

    #[test]
    fn pinned_fields_are_kept() {
        let g = f4();
        let t = targets(&g, &[("sys_ck", 168_000_000)]);
        let pinned = RegisterState::from_named(&g, [("PLLCFGR.PLLM", 4)]).unwrap();
        let res = resolve(&g, &t, &pinned, &ResolveOptions::default());
        assert!(res.is_solved(), "{res:?}");
        assert_eq!(field(&g, res.state(), "PLLCFGR.PLLM"), Some(4));
        assert_eq!(field(&g, res.state(), "PLLCFGR.PLLN"), Some(168));
        assert_eq!(res.stats().free_variables, 2);
    }

    #[test]
    fn fixed_tree_is_checked_once() {
        let g = simple();
        let ok = resolve(
            &g,
            &targets(&g, &[("hse_ck", 8_000_000)]),
            &RegisterState::new(),
            &ResolveOptions::default(),
        );
        assert!(ok.is_solved());
        assert_eq!(ok.stats().steps, 1);

        let bad = resolve(
            &g,
            &targets(&g, &[("hse_ck", 9_000_000)]),
            &RegisterState::new(),
            &ResolveOptions::default(),
        );
        let Resolution::Infeasible(inf) = bad else {
            panic!("expected infeasible");
        };
        assert_eq!(inf.reason, InfeasibleReason::Exhausted);
        assert_eq!(inf.stats.steps, 1);
    }

    #[test]
    fn tolerance_widens_acceptance() {
        let g = simple();
        let mut t = TargetSet::new();
        t.insert_named(&g, "sys_ck", Hz::mhz(201), Tolerance::Ppm(5_000))
            .unwrap();
        let res = resolve(&g, &t, &RegisterState::new(), &ResolveOptions::default());
        assert!(res.is_solved());
        assert_eq!(hz(&res, &g, "sys_ck"), Some(Hz::mhz(200)));
    }

    #[test]
    fn deterministic() {
        let g = f4();
        let t = targets(&g, &[("sys_ck", 168_000_000), ("usb_ck", 48_000_000)]);
        let a = resolve(&g, &t, &RegisterState::new(), &ResolveOptions::default());
        let b = resolve(&g, &t, &RegisterState::new(), &ResolveOptions::default());
        assert_eq!(a, b);
    }
}

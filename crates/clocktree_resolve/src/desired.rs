//! Back-propagation of requested frequencies.
//!
//! Starting from the targets and walking the graph in reverse topological
//! order, each signal collects the frequencies that would let some choice of
//! downstream settings hit a target exactly: a divider's input wants
//! `target × factor / numerator` for each legal pair that divides evenly
//! (numerator 1 for an integer divider), a mux's inputs want whatever its
//! output wants, a PLL's VCO wants `target × post` within its limits, and its
//! reference wants `vco / n` where that divides evenly. The sets only order
//! candidates; they never exclude one.

use crate::targets::TargetSet;
use clocktree_model::{DividerFactor, FieldEncoding, Graph, Node, Signal};
use std::collections::BTreeSet;

/// Upper bound on the values kept per signal.
const MAX_DESIRED: usize = 2048;

/// Upper bound on the legal values enumerated for one encoded field while
/// propagating.
const MAX_ENUMERATED: u64 = 4096;

#[derive(Debug, Clone, Default)]
pub(crate) struct Desired {
    signals: Vec<Vec<u64>>,
    vcos: Vec<Vec<u64>>,
}

impl Desired {
    pub fn compute(graph: &Graph, targets: &TargetSet) -> Desired {
        let mut signals: Vec<BTreeSet<u64>> = vec![BTreeSet::new(); graph.signals().len()];
        let mut vcos: Vec<BTreeSet<u64>> = vec![BTreeSet::new(); graph.nodes().len()];
        for (signal, target) in targets.iter() {
            signals[signal.index()].insert(target.frequency.hz());
        }

        for &id in graph.topo_order().iter().rev() {
            let node = graph.node(id);
            let wanted: Vec<u64> = signals[node.output().index()]
                .iter()
                .copied()
                .filter(|&hz| hz != 0)
                .collect();
            if wanted.is_empty() {
                continue;
            }
            match node {
                Node::Source(_) => {}
                Node::Gate(gate) => {
                    let bounds = graph.signal(gate.input);
                    add_all(&mut signals[gate.input.index()], bounds, wanted.iter().copied());
                }
                Node::Divider(div) => {
                    let factors = divider_factors(&div.factor);
                    let numerators = match &div.denominator {
                        Some(den) => encoded_values(&den.encoding),
                        None => vec![1],
                    };
                    if (factors.len() as u64).saturating_mul(numerators.len() as u64)
                        > MAX_ENUMERATED
                    {
                        continue;
                    }
                    let bounds = graph.signal(div.input);
                    let set = &mut signals[div.input.index()];
                    for &hz in &wanted {
                        let inputs = factors.iter().flat_map(|&f| {
                            numerators.iter().filter_map(move |&num| undivided(hz, f, num))
                        });
                        add_all(set, bounds, inputs);
                    }
                }
                Node::Mux(mux) => {
                    for input in mux.input_signals() {
                        let bounds = graph.signal(input);
                        add_all(&mut signals[input.index()], bounds, wanted.iter().copied());
                    }
                }
                Node::Pll(pll) => {
                    let posts = match &pll.post_divider {
                        Some(p) => encoded_values(&p.encoding),
                        None => vec![1],
                    };
                    let vco_set = &mut vcos[id.index()];
                    for &hz in &wanted {
                        for &post in &posts {
                            let Some(vco) = hz.checked_mul(post) else { continue };
                            let in_limits = pll
                                .vco_limits
                                .map_or(true, |(lo, hi)| vco >= lo.hz() && vco <= hi.hz());
                            if in_limits && vco_set.len() < MAX_DESIRED {
                                vco_set.insert(vco);
                            }
                        }
                    }
                    if pll.formula.is_some() {
                        continue;
                    }
                    let multipliers = encoded_values(&pll.integer.encoding);
                    let bounds = graph.signal(pll.input);
                    let set = &mut signals[pll.input.index()];
                    for &vco in vco_set.iter() {
                        add_all(
                            set,
                            bounds,
                            multipliers
                                .iter()
                                .filter(|&&n| n != 0 && vco % n == 0)
                                .map(|&n| vco / n),
                        );
                    }
                }
            }
        }

        Desired {
            signals: signals.into_iter().map(|s| s.into_iter().collect()).collect(),
            vcos: vcos.into_iter().map(|s| s.into_iter().collect()).collect(),
        }
    }

    /// Wanted frequencies of a signal, ascending.
    pub fn signal(&self, signal: clocktree_model::SignalId) -> &[u64] {
        &self.signals[signal.index()]
    }

    /// Wanted VCO frequencies of a PLL, ascending.
    pub fn vco(&self, pll: clocktree_model::NodeId) -> &[u64] {
        &self.vcos[pll.index()]
    }
}

/// Distance from `value` to the nearest entry of a sorted set.
pub(crate) fn distance(wanted: &[u64], value: u64) -> Option<u64> {
    let i = wanted.partition_point(|&w| w < value);
    let above = wanted.get(i).map(|&w| w - value);
    let below = i.checked_sub(1).map(|j| value - wanted[j]);
    match (above, below) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn add_all(set: &mut BTreeSet<u64>, bounds: &Signal, values: impl Iterator<Item = u64>) {
    for hz in values {
        if set.len() >= MAX_DESIRED {
            return;
        }
        if bounds.max.is_some_and(|max| hz > max.hz()) || bounds.min.is_some_and(|min| hz < min.hz())
        {
            continue;
        }
        set.insert(hz);
    }
}

/// Input giving exactly `hz` through a divider with the given factor and
/// numerator.
fn undivided(hz: u64, factor: u64, numerator: u64) -> Option<u64> {
    let scaled = hz.checked_mul(factor)?;
    (numerator != 0 && scaled % numerator == 0).then(|| scaled / numerator)
}

fn divider_factors(factor: &DividerFactor) -> Vec<u64> {
    let mut out: Vec<u64> = match factor {
        DividerFactor::Fixed(f) => vec![*f],
        DividerFactor::Table { factors, .. } => factors.clone(),
        DividerFactor::Linear { encoding, .. } => encoded_values(encoding),
    };
    out.retain(|&f| f != 0);
    out.sort_unstable();
    out.dedup();
    out
}

fn encoded_values(encoding: &FieldEncoding) -> Vec<u64> {
    if encoding.len() > MAX_ENUMERATED {
        return Vec::new();
    }
    encoding
        .raw_range()
        .filter_map(|raw| encoding.decode(raw))
        .filter(|&v| v != 0)
        .collect()
}

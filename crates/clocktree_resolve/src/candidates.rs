//! Candidate raw values for one free field, most promising first.

use crate::desired::{distance, Desired};
use crate::scope::Variable;
use clocktree_common::Hz;
use clocktree_eval::{eval_node, Frequencies, SignalValue};
use clocktree_model::codec::{
    ideal_divisor, pll_scaled_multiplier_floor, solve_pll_fraction, solve_pll_integer,
    table_lookup,
};
use clocktree_model::{
    ControlRole, DividerFactor, FieldEncoding, FieldId, Graph, MuxInput, Node, NodeId,
    RegisterState,
};
use std::collections::BTreeSet;

/// Encoded ranges longer than this are sampled around computed seeds.
const MAX_ENUMERATED: u64 = 256;
/// Half-width of a seed window, in raw steps.
const WINDOW: u64 = 2;
/// Desired values used to seed one sampled field.
const MAX_SEEDS: usize = 16;
/// Sampled candidates kept after scoring.
const MAX_SAMPLED: usize = 64;

/// What candidate generation may look at.
pub(crate) struct Context<'a> {
    pub graph: &'a Graph,
    pub desired: &'a Desired,
    /// Working assignment; fields not yet searched hold their defaults.
    pub state: &'a RegisterState,
    /// Frequencies under `state`.
    pub freqs: &'a Frequencies,
}

/// Legal raw values for `var`, sorted by how close each brings the fields'
/// nodes to their wanted frequencies, then defaults first, then by value.
pub(crate) fn candidates(cx: &Context<'_>, var: &Variable) -> Vec<u64> {
    let mut pool = BTreeSet::new();
    let mut sampled = false;
    for &(node, role) in &var.controllers {
        let (raws, seeded) = proposals(cx, var, node, role);
        sampled |= seeded;
        pool.extend(raws);
    }
    pool.insert(var.default);

    let max_raw = cx.graph.field(var.field).max_raw();
    let mut scored: Vec<(u64, bool, u64)> = pool
        .into_iter()
        .filter(|&raw| max_raw.map_or(true, |m| raw <= m))
        .filter(|&raw| {
            var.controllers
                .iter()
                .all(|&(node, role)| legal(cx.graph, node, role, raw))
        })
        .map(|raw| (score(cx, var, raw), raw != var.default, raw))
        .collect();
    scored.sort_unstable();
    if sampled {
        scored.truncate(MAX_SAMPLED);
    }
    scored.into_iter().map(|(_, _, raw)| raw).collect()
}

/// Raw values one controller suggests, and whether they are a sample of a
/// larger range.
fn proposals(cx: &Context<'_>, var: &Variable, node: NodeId, role: ControlRole) -> (Vec<u64>, bool) {
    let upto = |len: usize| (0..len as u64).collect::<Vec<_>>();
    match cx.graph.node(node) {
        Node::Source(src) => (upto(src.frequencies.len()), false),
        Node::Gate(_) => (vec![0, 1], false),
        Node::Mux(mux) => (upto(mux.inputs.len()), false),
        Node::Divider(div) => match (&div.factor, role) {
            (_, ControlRole::DividerDenominator) => match &div.denominator {
                Some(den) => encoded(cx, var, node, role, &den.encoding),
                None => (Vec::new(), false),
            },
            (DividerFactor::Fixed(_), _) => (Vec::new(), false),
            (DividerFactor::Table { factors, .. }, _) => (upto(factors.len()), false),
            (DividerFactor::Linear { encoding, .. }, _) => encoded(cx, var, node, role, encoding),
        },
        Node::Pll(_) => match encoding(cx.graph.node(node), role) {
            Some(enc) => encoded(cx, var, node, role, &enc),
            None => (Vec::new(), false),
        },
    }
}

fn encoded(
    cx: &Context<'_>,
    var: &Variable,
    node: NodeId,
    role: ControlRole,
    enc: &FieldEncoding,
) -> (Vec<u64>, bool) {
    if enc.len() <= MAX_ENUMERATED {
        return (enc.raw_range().collect(), false);
    }
    let mut centres: Vec<u64> = seeds(cx, node, role)
        .into_iter()
        .map(|value| enc.encode(value).unwrap_or_else(|_| enc.nearest_raw(value)))
        .collect();
    centres.push(cx.state.value(cx.graph, var.field));
    let mut raws = Vec::new();
    for c in centres {
        let c = c.clamp(enc.min, enc.max);
        let lo = c.saturating_sub(WINDOW).max(enc.min);
        let hi = c.saturating_add(WINDOW).min(enc.max);
        raws.extend(lo..=hi);
    }
    (raws, true)
}

/// Decoded field values that would put a node's output (or VCO) on or next
/// to a wanted frequency.
fn seeds(cx: &Context<'_>, node: NodeId, role: ControlRole) -> Vec<u64> {
    let graph = cx.graph;
    let read = |f: FieldId| cx.state.value(graph, f);
    let mut values = Vec::new();
    match graph.node(node) {
        Node::Divider(div) => {
            let Some(input) = cx.freqs.hz(div.input) else { return values };
            let around = cx.freqs.hz(div.output).map(Hz::hz);
            let wanted = nearest(cx.desired.signal(div.output), around);
            if role == ControlRole::DividerDenominator {
                // numerator ≈ wanted × factor / input
                let factor = match div.factor_field() {
                    Some(f) => div.factor_for(read(f)),
                    None => div.factor_for(0),
                };
                let Some(factor) = factor.filter(|&f| f != 0) else { return values };
                for d in wanted {
                    if let Some(scaled) = d.checked_mul(factor) {
                        values.extend(ideal_divisor(Hz(scaled), input));
                    }
                }
            } else {
                let numerator = div
                    .denominator
                    .and_then(|den| den.encoding.decode(read(den.field)))
                    .filter(|&n| n != 0)
                    .unwrap_or(1);
                let Some(scaled) = input.hz().checked_mul(numerator) else { return values };
                for d in wanted {
                    values.extend(ideal_divisor(Hz(scaled), Hz(d)));
                }
            }
        }
        Node::Pll(pll) => {
            let den = pll.denominator();
            let around = cx.freqs.vco(node).map(Hz::hz);
            let vcos = nearest(cx.desired.vco(node), around);
            match (role, cx.freqs.hz(pll.input)) {
                (ControlRole::PllInteger, Some(input)) => {
                    let frac = pll
                        .fraction
                        .and_then(|f| f.feedback.encoding.decode(read(f.feedback.field)))
                        .unwrap_or(0);
                    for v in vcos {
                        values.extend(solve_pll_integer(input, Hz(v), frac, den));
                        if let Some((m, _)) = pll_scaled_multiplier_floor(input, Hz(v), den) {
                            let n = m.saturating_sub(frac) / den.max(1);
                            values.push(n);
                            values.push(n.saturating_add(1));
                        }
                    }
                }
                (ControlRole::PllFraction, Some(input)) => {
                    let Some(n) = pll.integer.encoding.decode(read(pll.integer.field)) else {
                        return values;
                    };
                    for v in vcos {
                        if let Some(frac) = solve_pll_fraction(input, Hz(v), n, den) {
                            values.push(frac);
                            continue;
                        }
                        let Some((m, _)) = pll_scaled_multiplier_floor(input, Hz(v), den) else {
                            continue;
                        };
                        if let Some(frac) = m.checked_sub(n.saturating_mul(den)) {
                            values.push(frac);
                            values.push(frac.saturating_add(1));
                        }
                    }
                }
                (ControlRole::PllPostDivider, _) => {
                    let Some(vco) = cx.freqs.vco(node) else { return values };
                    let around = cx.freqs.hz(pll.output).map(Hz::hz);
                    for d in nearest(cx.desired.signal(pll.output), around) {
                        values.extend(ideal_divisor(vco, Hz(d)));
                    }
                }
                _ => {}
            }
        }
        _ => {}
    }
    values
}

/// Up to [`MAX_SEEDS`] wanted values closest to `around`.
fn nearest(wanted: &[u64], around: Option<u64>) -> Vec<u64> {
    let mut out = wanted.to_vec();
    if let Some(around) = around {
        out.sort_by_key(|&w| (w.abs_diff(around), w));
    }
    out.truncate(MAX_SEEDS);
    out
}

fn encoding(node: &Node, role: ControlRole) -> Option<FieldEncoding> {
    match (node, role) {
        (Node::Divider(div), ControlRole::DividerDenominator) => div.denominator.map(|d| d.encoding),
        (Node::Divider(div), _) => match &div.factor {
            DividerFactor::Linear { encoding, .. } => Some(*encoding),
            _ => None,
        },
        (Node::Pll(pll), ControlRole::PllInteger) => Some(pll.integer.encoding),
        (Node::Pll(pll), ControlRole::PllFraction) => pll.fraction.map(|f| f.feedback.encoding),
        (Node::Pll(pll), ControlRole::PllPostDivider) => pll.post_divider.map(|p| p.encoding),
        _ => None,
    }
}

/// Whether `raw` is a setting the node accepts without faulting.
fn legal(graph: &Graph, node: NodeId, role: ControlRole, raw: u64) -> bool {
    match graph.node(node) {
        Node::Source(src) => table_lookup(&src.frequencies, raw).is_some(),
        Node::Gate(_) => raw <= 1,
        Node::Divider(div) if role == ControlRole::DividerDenominator => {
            div.denominator_for(raw).is_some_and(|n| n != 0)
        }
        Node::Divider(div) => div.factor_for(raw).is_some_and(|f| f != 0),
        Node::Mux(mux) => matches!(
            table_lookup(&mux.inputs, raw),
            Some(MuxInput::Signal(_) | MuxInput::Off)
        ),
        pll @ Node::Pll(_) => match encoding(pll, role).and_then(|e| e.decode(raw)) {
            Some(0) => role != ControlRole::PllPostDivider,
            Some(_) => true,
            None => false,
        },
    }
}

fn score(cx: &Context<'_>, var: &Variable, raw: u64) -> u64 {
    let read = |f: FieldId| {
        if f == var.field {
            raw
        } else {
            cx.state.value(cx.graph, f)
        }
    };
    var.controllers.iter().fold(0u64, |acc, &(node, role)| {
        acc.saturating_add(node_score(cx, node, role, &read))
    })
}

/// Distance of one node's result from what is wanted of it. Faults, an
/// undriven output and out-of-range results score worst.
fn node_score(cx: &Context<'_>, node: NodeId, role: ControlRole, read: &dyn Fn(FieldId) -> u64) -> u64 {
    let out = eval_node(cx.graph, node, cx.freqs, read);
    if !out.faults.is_empty() {
        return u64::MAX;
    }
    if let Node::Pll(pll) = cx.graph.node(node) {
        if let (Some(vco), Some((lo, hi))) = (out.vco, pll.vco_limits) {
            if vco > hi || (!vco.is_zero() && vco < lo) {
                return u64::MAX;
            }
        }
        if role.drives_vco() && !cx.desired.vco(node).is_empty() {
            return out
                .vco
                .and_then(|v| distance(cx.desired.vco(node), v.hz()))
                .unwrap_or(u64::MAX);
        }
    }
    let SignalValue::Driven(hz) = out.output else {
        return u64::MAX;
    };
    let output = cx.graph.node(node).output();
    let bounds = cx.graph.signal(output);
    if bounds.max.is_some_and(|max| hz > max)
        || bounds.min.is_some_and(|min| !hz.is_zero() && hz < min)
    {
        return u64::MAX;
    }
    distance(cx.desired.signal(output), hz.hz()).unwrap_or(0)
}

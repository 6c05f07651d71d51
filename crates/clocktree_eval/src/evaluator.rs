//! Forward evaluation: register state to signal frequencies.

use crate::limits::LimitValidator;
use crate::violation::LimitViolation;
use clocktree_common::Hz;
use clocktree_model::codec::{divide_fractional, table_lookup};
use clocktree_model::{
    Bindings, FieldId, Graph, MuxInput, Node, NodeId, PllRatio, RegisterState, SignalId,
};
use serde::{Deserialize, Serialize};

/// The value of one signal after evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalValue {
    /// Running (or stopped, at 0 Hz).
    Driven(Hz),
    /// No meaningful frequency: nothing drives the signal, or its producer
    /// faulted.
    Undriven,
}

impl SignalValue {
    /// The frequency, if driven.
    pub fn hz(self) -> Option<Hz> {
        match self {
            SignalValue::Driven(hz) => Some(hz),
            SignalValue::Undriven => None,
        }
    }
}

/// Frequencies of every signal, plus the VCO of every PLL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frequencies {
    signals: Vec<SignalValue>,
    vco: Vec<Option<Hz>>,
}

impl Frequencies {
    fn new(graph: &Graph) -> Self {
        Self {
            signals: vec![SignalValue::Undriven; graph.signals().len()],
            vco: vec![None; graph.nodes().len()],
        }
    }

    /// Value of a signal.
    pub fn get(&self, signal: SignalId) -> SignalValue {
        self.signals[signal.index()]
    }

    /// Frequency of a signal, if driven.
    pub fn hz(&self, signal: SignalId) -> Option<Hz> {
        self.get(signal).hz()
    }

    /// VCO frequency of a PLL node, if computed.
    pub fn vco(&self, pll: NodeId) -> Option<Hz> {
        self.vco[pll.index()]
    }

    /// Value of a signal looked up by name.
    pub fn by_name(&self, graph: &Graph, name: &str) -> Option<SignalValue> {
        graph.signal_id(name).map(|s| self.get(s))
    }

    /// `(signal, value)` pairs in signal ID order.
    pub fn iter(&self) -> impl Iterator<Item = (SignalId, SignalValue)> + '_ {
        self.signals
            .iter()
            .enumerate()
            .map(|(i, v)| (SignalId::from_raw(i as u32), *v))
    }

    /// `(pll, vco)` pairs for every PLL with a computed VCO.
    pub fn vcos(&self) -> impl Iterator<Item = (NodeId, Hz)> + '_ {
        self.vco
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.map(|hz| (NodeId::from_raw(i as u32), hz)))
    }

    fn set(&mut self, signal: SignalId, value: SignalValue) {
        self.signals[signal.index()] = value;
    }
}

/// Result of evaluating a register state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Every signal's frequency.
    pub frequencies: Frequencies,
    /// Node faults in evaluation order, then limit violations.
    pub violations: Vec<LimitViolation>,
}

impl Evaluation {
    /// Returns `true` if no violation was found.
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

/// What one node computes from its inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeOutput {
    /// Output signal value.
    pub output: SignalValue,
    /// VCO frequency, for a PLL that got that far.
    pub vco: Option<Hz>,
    /// Faults found while computing the output.
    pub faults: Vec<LimitViolation>,
}

/// Evaluates every signal of `graph` under `state`.
///
/// Pure and deterministic: the same graph and state always give the same
/// frequencies and the same violations in the same order.
pub fn evaluate(graph: &Graph, state: &RegisterState) -> Evaluation {
    evaluate_with(graph, &|field| state.value(graph, field))
}

/// Evaluates with field values supplied by `read`.
pub fn evaluate_with(graph: &Graph, read: &dyn Fn(FieldId) -> u64) -> Evaluation {
    let mut freqs = Frequencies::new(graph);
    let mut violations = Vec::new();

    for (id, signal) in graph.signals().iter() {
        if signal.producer.is_none() {
            if let Some(nominal) = signal.nominal {
                freqs.set(id, SignalValue::Driven(nominal));
            }
        }
    }

    for &id in graph.topo_order() {
        let out = eval_node(graph, id, &freqs, read);
        freqs.set(graph.node(id).output(), out.output);
        freqs.vco[id.index()] = out.vco;
        violations.extend(out.faults);
    }

    violations.extend(LimitValidator::new(graph).check(&freqs));
    Evaluation {
        frequencies: freqs,
        violations,
    }
}

/// Computes one node's output from the current values of its inputs.
///
/// The resolver uses this to score candidate field values without a full
/// evaluation.
pub fn eval_node(
    graph: &Graph,
    id: NodeId,
    freqs: &Frequencies,
    read: &dyn Fn(FieldId) -> u64,
) -> NodeOutput {
    let mut faults = Vec::new();
    let mut vco = None;
    let output = match graph.node(id) {
        Node::Source(src) => match src.control {
            None => SignalValue::Driven(src.nominal),
            Some(field) => {
                let raw = read(field);
                match table_lookup(&src.frequencies, raw) {
                    Some(hz) => SignalValue::Driven(*hz),
                    None => {
                        faults.push(LimitViolation::RawOutOfRange { node: id, field, raw });
                        SignalValue::Undriven
                    }
                }
            }
        },
        Node::Gate(gate) => {
            let raw = read(gate.control);
            match input(graph, id, gate.input, freqs, &mut faults) {
                None => SignalValue::Undriven,
                Some(_) if raw > 1 => {
                    faults.push(LimitViolation::RawOutOfRange {
                        node: id,
                        field: gate.control,
                        raw,
                    });
                    SignalValue::Undriven
                }
                Some(hz) if gate.is_enabled(raw) => SignalValue::Driven(hz),
                Some(_) => SignalValue::Driven(Hz::ZERO),
            }
        }
        Node::Divider(div) => match input(graph, id, div.input, freqs, &mut faults) {
            None => SignalValue::Undriven,
            Some(hz) => {
                let factor = setting(id, div.factor_field(), read, &mut faults, |raw| {
                    div.factor_for(raw)
                });
                let numerator = setting(
                    id,
                    div.denominator.map(|d| d.field),
                    read,
                    &mut faults,
                    |raw| div.denominator_for(raw),
                );
                match (factor, numerator) {
                    (Some(0), _) => {
                        faults.push(LimitViolation::DivideByZero { node: id });
                        SignalValue::Undriven
                    }
                    (Some(factor), Some(numerator)) => {
                        match divide_fractional(hz, numerator, factor) {
                            Some(out) => SignalValue::Driven(out),
                            None => {
                                faults.push(LimitViolation::Overflow { node: id });
                                SignalValue::Undriven
                            }
                        }
                    }
                    _ => SignalValue::Undriven,
                }
            }
        },
        Node::Mux(mux) => {
            let raw = read(mux.control);
            match table_lookup(&mux.inputs, raw) {
                None => {
                    faults.push(LimitViolation::RawOutOfRange {
                        node: id,
                        field: mux.control,
                        raw,
                    });
                    SignalValue::Undriven
                }
                Some(MuxInput::Off) => SignalValue::Driven(Hz::ZERO),
                Some(MuxInput::Reserved) => {
                    faults.push(LimitViolation::ReservedSelection { node: id, raw });
                    SignalValue::Undriven
                }
                Some(MuxInput::Signal(s)) => match input(graph, id, *s, freqs, &mut faults) {
                    Some(hz) => SignalValue::Driven(hz),
                    None => SignalValue::Undriven,
                },
            }
        }
        Node::Pll(pll) => {
            let reference = input(graph, id, pll.input, freqs, &mut faults);
            let mut decode = |field: FieldId, enc: &clocktree_model::FieldEncoding| {
                let raw = read(field);
                let value = enc.decode(raw);
                if value.is_none() {
                    faults.push(LimitViolation::RawOutOfRange { node: id, field, raw });
                }
                value
            };
            let n = decode(pll.integer.field, &pll.integer.encoding);
            let frac = match &pll.fraction {
                Some(f) => decode(f.feedback.field, &f.feedback.encoding),
                None => Some(0),
            };
            let post = match &pll.post_divider {
                Some(p) => decode(p.field, &p.encoding),
                None => Some(1),
            };
            match (reference, n, frac) {
                (Some(input), Some(n), Some(frac)) => {
                    let den = pll.denominator();
                    vco = match &pll.formula {
                        Some(formula) => {
                            let bindings = Bindings {
                                input: input.hz(),
                                n,
                                frac,
                                den,
                            };
                            match formula.eval(&bindings) {
                                Ok(hz) => Some(Hz(hz)),
                                Err(fault) => {
                                    faults.push(LimitViolation::FormulaFault { node: id, fault });
                                    None
                                }
                            }
                        }
                        None => {
                            let ratio = PllRatio { n, frac, den };
                            let vco = ratio.apply(input);
                            if vco.is_none() {
                                faults.push(LimitViolation::Overflow { node: id });
                            }
                            vco
                        }
                    };
                    match (vco, post) {
                        (Some(_), Some(0)) => {
                            faults.push(LimitViolation::DivideByZero { node: id });
                            SignalValue::Undriven
                        }
                        (Some(v), Some(post)) => SignalValue::Driven(Hz(v.hz() / post)),
                        _ => SignalValue::Undriven,
                    }
                }
                _ => SignalValue::Undriven,
            }
        }
    };
    NodeOutput {
        output,
        vco,
        faults,
    }
}

/// Decodes an optional control field, recording a raw value that decodes to
/// nothing. A missing field reads as 0.
fn setting(
    node: NodeId,
    field: Option<FieldId>,
    read: &dyn Fn(FieldId) -> u64,
    faults: &mut Vec<LimitViolation>,
    decode: impl Fn(u64) -> Option<u64>,
) -> Option<u64> {
    let raw = field.map(read).unwrap_or(0);
    let value = decode(raw);
    if let (Some(field), None) = (field, value) {
        faults.push(LimitViolation::RawOutOfRange { node, field, raw });
    }
    value
}

/// Reads an input signal. Consuming a signal nothing produces and nothing
/// drives nominally is a fault; an input left undriven by a faulted producer
/// propagates silently.
fn input(
    graph: &Graph,
    node: NodeId,
    signal: SignalId,
    freqs: &Frequencies,
    faults: &mut Vec<LimitViolation>,
) -> Option<Hz> {
    match freqs.get(signal) {
        SignalValue::Driven(hz) => Some(hz),
        SignalValue::Undriven => {
            if graph.signal(signal).producer.is_none() {
                faults.push(LimitViolation::UndrivenInput { node, signal });
            }
            None
        }
    }
}

//! The validated, immutable clock-tree graph.
//!
//! [`Graph::load`] resolves every name in a [`ClockTreeModel`] to an ID,
//! checks structural invariants and caches the two derived structures the
//! evaluator and resolver depend on: a topological node order and, per
//! signal, the set of register-controlled nodes that can influence it.

use crate::codec::FieldEncoding;
use crate::error::{LookupError, SchemaError};
use crate::formula::Formula;
use crate::ids::{Arena, DomainId, FieldId, NodeId, SignalId};
use crate::model::{
    ClockTreeModel, DividerModel, EncodingModel, FeedbackModel, GateModel, MuxModel, PllModel,
    SourceModel, MUX_OFF, MUX_RESERVED,
};
use crate::node::{
    Divider, DividerFactor, EncodedField, Fraction, Gate, Mux, MuxInput, Node, Pll, Source,
};
use clocktree_common::{Hz, Ident, Interner};
use petgraph::algo::tarjan_scc;
use petgraph::graph::DiGraph;
use std::collections::{BTreeSet, HashMap};

/// A named clock line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signal {
    /// Signal name.
    pub name: Ident,
    /// Typical frequency; drives the signal when nothing produces it.
    pub nominal: Option<Hz>,
    /// Lowest legal nonzero frequency.
    pub min: Option<Hz>,
    /// Highest legal frequency.
    pub max: Option<Hz>,
    /// Free-form description.
    pub description: Option<String>,
    /// The node producing this signal.
    pub producer: Option<NodeId>,
    /// Whether the model declared the signal or it was created by reference.
    pub declared: bool,
}

/// A register field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    /// Register name.
    pub register: Ident,
    /// Field name within the register.
    pub name: Ident,
    /// Width in bits, declared or inferred from a table length.
    pub width: Option<u32>,
    /// Value used when no state assigns the field.
    pub default: u64,
    /// Whether the model declared the field or it was created by reference.
    pub declared: bool,
}

impl FieldDef {
    /// Largest raw value representable in the field, if the width is known.
    pub fn max_raw(&self) -> Option<u64> {
        self.width.map(|w| {
            if w >= 64 {
                u64::MAX
            } else {
                (1u64 << w) - 1
            }
        })
    }
}

/// A group of signals sharing a frequency ceiling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Domain {
    /// Domain name.
    pub name: Ident,
    /// Ceiling applying to every member.
    pub max: Hz,
    /// Member signals.
    pub signals: Vec<SignalId>,
}

/// An immutable, validated clock tree.
///
/// The graph is `Send + Sync`; one instance per chip family can be shared by
/// any number of concurrent evaluations and resolutions.
#[derive(Debug)]
pub struct Graph {
    name: Option<String>,
    interner: Interner,
    signals: Arena<SignalId, Signal>,
    fields: Arena<FieldId, FieldDef>,
    nodes: Arena<NodeId, Node>,
    domains: Arena<DomainId, Domain>,
    signal_index: HashMap<Ident, SignalId>,
    node_index: HashMap<Ident, NodeId>,
    field_index: HashMap<(Ident, Ident), FieldId>,
    consumers: Vec<Vec<NodeId>>,
    field_users: Vec<Vec<NodeId>>,
    topo_order: Vec<NodeId>,
    topo_position: Vec<usize>,
    ancestors: Vec<Vec<NodeId>>,
}

impl Graph {
    /// Builds and validates a graph from a model description.
    pub fn load(model: &ClockTreeModel) -> Result<Graph, SchemaError> {
        let mut builder = Builder::new(model.name.clone());
        builder.declare_signals(model)?;
        builder.declare_fields(model)?;
        for source in &model.sources {
            builder.add_source(source)?;
        }
        for gate in &model.gates {
            builder.add_gate(gate)?;
        }
        for divider in &model.dividers {
            builder.add_divider(divider)?;
        }
        for mux in &model.muxes {
            builder.add_mux(mux)?;
        }
        for pll in &model.plls {
            builder.add_pll(pll)?;
        }
        builder.check_field_ranges()?;
        builder.add_domains(model)?;
        builder.finish()
    }

    /// Chip family name, if the model gave one.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The interner holding every name in the graph.
    pub fn interner(&self) -> &Interner {
        &self.interner
    }

    /// Resolves an interned name.
    pub fn resolve(&self, ident: Ident) -> &str {
        self.interner.resolve(ident)
    }

    /// All signals.
    pub fn signals(&self) -> &Arena<SignalId, Signal> {
        &self.signals
    }

    /// All register fields.
    pub fn fields(&self) -> &Arena<FieldId, FieldDef> {
        &self.fields
    }

    /// All nodes, in declaration order.
    pub fn nodes(&self) -> &Arena<NodeId, Node> {
        &self.nodes
    }

    /// All domains.
    pub fn domains(&self) -> &Arena<DomainId, Domain> {
        &self.domains
    }

    /// The signal with the given ID.
    pub fn signal(&self, id: SignalId) -> &Signal {
        &self.signals[id]
    }

    /// The field with the given ID.
    pub fn field(&self, id: FieldId) -> &FieldDef {
        &self.fields[id]
    }

    /// The node with the given ID.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    /// Name of a signal.
    pub fn signal_name(&self, id: SignalId) -> &str {
        self.resolve(self.signals[id].name)
    }

    /// Name of a node.
    pub fn node_name(&self, id: NodeId) -> &str {
        self.resolve(self.nodes[id].name())
    }

    /// `REG.FIELD` path of a field.
    pub fn field_path(&self, id: FieldId) -> String {
        let field = &self.fields[id];
        format!("{}.{}", self.resolve(field.register), self.resolve(field.name))
    }

    /// Looks up a signal by name.
    pub fn signal_id(&self, name: &str) -> Option<SignalId> {
        let ident = self.interner.lookup(name)?;
        self.signal_index.get(&ident).copied()
    }

    /// Looks up a signal by name, as a `Result`.
    pub fn expect_signal(&self, name: &str) -> Result<SignalId, LookupError> {
        self.signal_id(name)
            .ok_or_else(|| LookupError::UnknownSignal(name.to_string()))
    }

    /// Looks up a node by name.
    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        let ident = self.interner.lookup(name)?;
        self.node_index.get(&ident).copied()
    }

    /// Looks up a field by register and field name.
    pub fn field_id(&self, register: &str, field: &str) -> Option<FieldId> {
        let reg = self.interner.lookup(register)?;
        let name = self.interner.lookup(field)?;
        self.field_index.get(&(reg, name)).copied()
    }

    /// Looks up a field by its `REG.FIELD` path. The last `.` separates the
    /// field name from the register name.
    pub fn field_by_path(&self, path: &str) -> Result<FieldId, LookupError> {
        let (register, field) = path
            .trim()
            .rsplit_once('.')
            .ok_or_else(|| LookupError::MalformedField(path.to_string()))?;
        self.field_id(register, field)
            .ok_or_else(|| LookupError::UnknownField(path.to_string()))
    }

    /// Nodes in a valid evaluation order: every producer precedes its consumers.
    pub fn topo_order(&self) -> &[NodeId] {
        &self.topo_order
    }

    /// Position of a node in [`topo_order`](Self::topo_order).
    pub fn topo_position(&self, node: NodeId) -> usize {
        self.topo_position[node.index()]
    }

    /// Register-controlled nodes that can influence `signal`, ascending by ID.
    pub fn ancestors(&self, signal: SignalId) -> &[NodeId] {
        &self.ancestors[signal.index()]
    }

    /// Nodes reading `signal`.
    pub fn consumers(&self, signal: SignalId) -> &[NodeId] {
        &self.consumers[signal.index()]
    }

    /// Nodes controlled by `field`.
    pub fn field_users(&self, field: FieldId) -> &[NodeId] {
        &self.field_users[field.index()]
    }
}

fn is_power_of_two(len: usize) -> bool {
    len.is_power_of_two()
}

struct Builder {
    name: Option<String>,
    interner: Interner,
    signals: Arena<SignalId, Signal>,
    fields: Arena<FieldId, FieldDef>,
    nodes: Arena<NodeId, Node>,
    domains: Arena<DomainId, Domain>,
    signal_index: HashMap<Ident, SignalId>,
    node_index: HashMap<Ident, NodeId>,
    field_index: HashMap<(Ident, Ident), FieldId>,
    /// `(node name, field, largest raw value the node accepts)`, checked once
    /// every width is known.
    raw_bounds: Vec<(String, FieldId, u64)>,
}

impl Builder {
    fn new(name: Option<String>) -> Self {
        Self {
            name,
            interner: Interner::new(),
            signals: Arena::new(),
            fields: Arena::new(),
            nodes: Arena::new(),
            domains: Arena::new(),
            signal_index: HashMap::new(),
            node_index: HashMap::new(),
            field_index: HashMap::new(),
            raw_bounds: Vec::new(),
        }
    }

    fn declare_signals(&mut self, model: &ClockTreeModel) -> Result<(), SchemaError> {
        for s in &model.signals {
            let name = self.interner.intern(&s.name);
            if self.signal_index.contains_key(&name) {
                return Err(SchemaError::DuplicateName {
                    kind: "signal",
                    name: s.name.clone(),
                });
            }
            let id = self.signals.alloc(Signal {
                name,
                nominal: s.nominal,
                min: s.min,
                max: s.max,
                description: s.description.clone(),
                producer: None,
                declared: true,
            });
            self.signal_index.insert(name, id);
        }
        Ok(())
    }

    fn declare_fields(&mut self, model: &ClockTreeModel) -> Result<(), SchemaError> {
        for f in &model.fields {
            let path = format!("{}.{}", f.reg, f.field);
            let key = (
                self.interner.intern(&f.reg),
                self.interner.intern(&f.field),
            );
            if self.field_index.contains_key(&key) {
                return Err(SchemaError::DuplicateName {
                    kind: "field",
                    name: path,
                });
            }
            if let Some(width) = f.width {
                if width == 0 || width > 64 {
                    return Err(SchemaError::BadDescriptor {
                        node: path,
                        reason: format!("width {width} is outside 1..=64"),
                    });
                }
            }
            let id = self.fields.alloc(FieldDef {
                register: key.0,
                name: key.1,
                width: f.width,
                default: f.default.unwrap_or(0),
                declared: true,
            });
            self.field_index.insert(key, id);
        }
        Ok(())
    }

    fn signal(&mut self, name: &str) -> SignalId {
        let ident = self.interner.intern(name);
        if let Some(&id) = self.signal_index.get(&ident) {
            return id;
        }
        let id = self.signals.alloc(Signal {
            name: ident,
            nominal: None,
            min: None,
            max: None,
            description: None,
            producer: None,
            declared: false,
        });
        self.signal_index.insert(ident, id);
        id
    }

    fn field(&mut self, reg: &str, field: &str) -> FieldId {
        let key = (
            self.interner.intern(reg),
            self.interner.intern(field),
        );
        if let Some(&id) = self.field_index.get(&key) {
            return id;
        }
        let id = self.fields.alloc(FieldDef {
            register: key.0,
            name: key.1,
            width: None,
            default: 0,
            declared: false,
        });
        self.field_index.insert(key, id);
        id
    }

    fn optional_field(
        &mut self,
        node: &str,
        reg: &Option<String>,
        field: &Option<String>,
    ) -> Result<Option<FieldId>, SchemaError> {
        match (reg, field) {
            (Some(r), Some(f)) => Ok(Some(self.field(r, f))),
            (None, None) => Ok(None),
            _ => Err(SchemaError::BadDescriptor {
                node: node.to_string(),
                reason: "'reg' and 'field' must be given together".to_string(),
            }),
        }
    }

    /// Records that `field` must be exactly `width` bits wide.
    fn require_width(
        &mut self,
        node: &str,
        field: FieldId,
        width: u32,
        len: usize,
    ) -> Result<(), SchemaError> {
        let def = self.fields.get_mut(field);
        match def.width {
            None => {
                def.width = Some(width);
                Ok(())
            }
            Some(w) if w == width => Ok(()),
            Some(w) => Err(SchemaError::WidthMismatch {
                node: node.to_string(),
                field: format!(
                    "{}.{}",
                    self.interner.resolve(def.register),
                    self.interner.resolve(def.name)
                ),
                width: w,
                len,
            }),
        }
    }

    fn table_width(&mut self, node: &str, field: FieldId, len: usize) -> Result<(), SchemaError> {
        if !is_power_of_two(len) {
            return Err(SchemaError::TableNotPowerOfTwo {
                node: node.to_string(),
                len,
            });
        }
        self.require_width(node, field, len.trailing_zeros(), len)
    }

    fn encoding(&mut self, node: &str, field: FieldId, model: &EncodingModel) -> Result<FieldEncoding, SchemaError> {
        let [min, max] = model.value_range;
        let bad = |reason: String| SchemaError::BadDescriptor {
            node: node.to_string(),
            reason,
        };
        if min > max {
            return Err(bad(format!("value_range [{min}, {max}] is inverted")));
        }
        if model.scale == 0 {
            return Err(bad("scale must be nonzero".to_string()));
        }
        let encoding = FieldEncoding {
            min,
            max,
            offset: model.offset,
            scale: model.scale,
        };
        if encoding.decode(min).is_none() || encoding.decode(max).is_none() {
            return Err(bad(format!(
                "value_range [{min}, {max}] decodes outside the non-negative integers"
            )));
        }
        self.raw_bounds.push((node.to_string(), field, max));
        Ok(encoding)
    }

    fn encoded_field(&mut self, node: &str, model: &FeedbackModel) -> Result<EncodedField, SchemaError> {
        let field = self.field(&model.reg, &model.field);
        let encoding = self.encoding(node, field, &model.encoding())?;
        Ok(EncodedField { field, encoding })
    }

    fn add_node(&mut self, name: &str, node_of: impl FnOnce(Ident) -> Node) -> Result<NodeId, SchemaError> {
        let ident = self.interner.intern(name);
        if self.node_index.contains_key(&ident) {
            return Err(SchemaError::DuplicateName {
                kind: "node",
                name: name.to_string(),
            });
        }
        let node = node_of(ident);
        let output = node.output();
        let id = self.nodes.alloc(node);
        if let Some(first) = self.signals[output].producer {
            return Err(SchemaError::MultipleProducers {
                signal: self.interner.resolve(self.signals[output].name).to_string(),
                first: self.interner.resolve(self.nodes[first].name()).to_string(),
                second: name.to_string(),
            });
        }
        self.signals.get_mut(output).producer = Some(id);
        self.node_index.insert(ident, id);
        Ok(id)
    }

    fn add_source(&mut self, m: &SourceModel) -> Result<(), SchemaError> {
        let output = self.signal(&m.output);
        let control = self.optional_field(&m.name, &m.reg, &m.field)?;
        let nominal = match control {
            Some(field) => {
                if m.frequencies.is_empty() {
                    return Err(SchemaError::BadDescriptor {
                        node: m.name.clone(),
                        reason: "a controlled source needs a 'frequencies' table".to_string(),
                    });
                }
                self.raw_bounds
                    .push((m.name.clone(), field, m.frequencies.len() as u64 - 1));
                m.frequencies[0]
            }
            None => match self.signals[output].nominal.or(m.frequencies.first().copied()) {
                Some(hz) => hz,
                None => {
                    return Err(SchemaError::BadDescriptor {
                        node: m.name.clone(),
                        reason: "a constant source needs a frequency or a nominal output"
                            .to_string(),
                    })
                }
            },
        };
        let frequencies = m.frequencies.clone();
        self.add_node(&m.name, |name| {
            Node::Source(Source {
                name,
                output,
                control,
                frequencies,
                nominal,
            })
        })?;
        Ok(())
    }

    fn add_gate(&mut self, m: &GateModel) -> Result<(), SchemaError> {
        let input = self.signal(&m.input);
        let output = self.signal(&m.output);
        let control = self.field(&m.reg, &m.bit);
        self.require_width(&m.name, control, 1, 2)?;
        let inverted = m.inverted;
        self.add_node(&m.name, |name| {
            Node::Gate(Gate {
                name,
                input,
                output,
                control,
                inverted,
            })
        })?;
        Ok(())
    }

    fn add_divider(&mut self, m: &DividerModel) -> Result<(), SchemaError> {
        let input = self.signal(&m.input);
        let output = self.signal(&m.output);
        let control = self.optional_field(&m.name, &m.reg, &m.field)?;
        let bad = |reason: &str| SchemaError::BadDescriptor {
            node: m.name.clone(),
            reason: reason.to_string(),
        };
        let factor = match (m.fixed, &m.factors, &m.linear, control) {
            (Some(0), None, None, None) => return Err(bad("fixed divisor must be nonzero")),
            (Some(f), None, None, None) => DividerFactor::Fixed(f),
            (Some(_), None, None, Some(_)) => {
                return Err(bad("a fixed divisor takes no control field"))
            }
            (None, Some(factors), None, Some(field)) => {
                self.table_width(&m.name, field, factors.len())?;
                DividerFactor::Table {
                    field,
                    factors: factors.clone(),
                }
            }
            (None, None, Some(linear), Some(field)) => {
                let encoding = self.encoding(&m.name, field, linear)?;
                DividerFactor::Linear { field, encoding }
            }
            (None, Some(_), None, None) | (None, None, Some(_), None) => {
                return Err(bad("a divider table or encoding needs 'reg' and 'field'"))
            }
            _ => return Err(bad("exactly one of 'fixed', 'factors' or 'linear' is required")),
        };
        let denominator = match &m.denominator {
            Some(den) if den.denominator.is_some() => {
                return Err(bad("a divider denominator takes no 'denominator' of its own"))
            }
            Some(den) => Some(self.encoded_field(&m.name, den)?),
            None => None,
        };
        self.add_node(&m.name, |name| {
            Node::Divider(Divider {
                name,
                input,
                output,
                factor,
                denominator,
            })
        })?;
        Ok(())
    }

    fn add_mux(&mut self, m: &MuxModel) -> Result<(), SchemaError> {
        let control = self.field(&m.reg, &m.field);
        self.table_width(&m.name, control, m.inputs.len())?;
        let inputs: Vec<MuxInput> = m
            .inputs
            .iter()
            .map(|entry| match entry.as_str() {
                MUX_OFF => MuxInput::Off,
                MUX_RESERVED => MuxInput::Reserved,
                signal => MuxInput::Signal(self.signal(signal)),
            })
            .collect();
        let output = self.signal(&m.output);
        self.add_node(&m.name, |name| {
            Node::Mux(Mux {
                name,
                control,
                inputs,
                output,
            })
        })?;
        Ok(())
    }

    fn add_pll(&mut self, m: &PllModel) -> Result<(), SchemaError> {
        let input = self.signal(&m.input);
        let output = self.signal(&m.output);
        let integer = self.encoded_field(&m.name, &m.feedback_integer)?;
        let fraction = match &m.feedback_fraction {
            Some(fb) => {
                let feedback = self.encoded_field(&m.name, fb)?;
                let denominator = match fb.denominator {
                    Some(d) => d,
                    None => feedback
                        .encoding
                        .value_bounds()
                        .map_or(1, |(_, hi)| hi.saturating_add(1)),
                };
                if denominator == 0 {
                    return Err(SchemaError::BadDescriptor {
                        node: m.name.clone(),
                        reason: "fractional denominator must be nonzero".to_string(),
                    });
                }
                Some(Fraction {
                    feedback,
                    denominator,
                })
            }
            None => None,
        };
        let post_divider = match &m.post_divider {
            Some(pd) => Some(self.encoded_field(&m.name, pd)?),
            None => None,
        };
        let vco_limits = match m.vco_limits {
            Some([lo, hi]) if lo > hi => {
                return Err(SchemaError::BadDescriptor {
                    node: m.name.clone(),
                    reason: format!("VCO limits [{lo}, {hi}] are inverted"),
                })
            }
            Some([lo, hi]) => Some((lo, hi)),
            None => None,
        };
        let formula = match &m.vco_formula {
            Some(text) => Some(Formula::parse(text).map_err(|error| SchemaError::BadFormula {
                node: m.name.clone(),
                error,
            })?),
            None => None,
        };
        self.add_node(&m.name, |name| {
            Node::Pll(Pll {
                name,
                input,
                output,
                integer,
                fraction,
                post_divider,
                vco_limits,
                formula,
            })
        })?;
        Ok(())
    }

    fn check_field_ranges(&self) -> Result<(), SchemaError> {
        for (node, field, max) in &self.raw_bounds {
            if let Some(limit) = self.fields[*field].max_raw() {
                if *max > limit {
                    return Err(SchemaError::BadDescriptor {
                        node: node.clone(),
                        reason: format!(
                            "raw value {max} does not fit the {}-bit field {}.{}",
                            self.fields[*field].width.unwrap_or(0),
                            self.interner.resolve(self.fields[*field].register),
                            self.interner.resolve(self.fields[*field].name)
                        ),
                    });
                }
            }
        }
        for (_, def) in self.fields.iter() {
            if let Some(limit) = def.max_raw() {
                if def.default > limit {
                    return Err(SchemaError::BadDescriptor {
                        node: format!(
                            "{}.{}",
                            self.interner.resolve(def.register),
                            self.interner.resolve(def.name)
                        ),
                        reason: format!("default {} does not fit the field width", def.default),
                    });
                }
            }
        }
        Ok(())
    }

    fn add_domains(&mut self, model: &ClockTreeModel) -> Result<(), SchemaError> {
        let mut seen = BTreeSet::new();
        for d in &model.domains {
            if !seen.insert(d.name.as_str()) {
                return Err(SchemaError::DuplicateName {
                    kind: "domain",
                    name: d.name.clone(),
                });
            }
            let mut signals = Vec::with_capacity(d.signals.len());
            for s in &d.signals {
                let id = self
                    .interner
                    .lookup(s)
                    .and_then(|ident| self.signal_index.get(&ident).copied())
                    .ok_or_else(|| SchemaError::DanglingReference {
                        node: d.name.clone(),
                        kind: "signal",
                        name: s.clone(),
                    })?;
                signals.push(id);
            }
            let name = self.interner.intern(&d.name);
            self.domains.alloc(Domain {
                name,
                max: d.max,
                signals,
            });
        }
        Ok(())
    }

    fn finish(self) -> Result<Graph, SchemaError> {
        let mut consumers = vec![Vec::new(); self.signals.len()];
        let mut field_users = vec![Vec::new(); self.fields.len()];
        for (id, node) in self.nodes.iter() {
            for input in node.inputs() {
                consumers[input.index()].push(id);
            }
            for (field, _) in node.controls() {
                if !field_users[field.index()].contains(&id) {
                    field_users[field.index()].push(id);
                }
            }
        }

        let topo_order = self.kahn_order(&consumers)?;
        let mut topo_position = vec![0; self.nodes.len()];
        for (pos, id) in topo_order.iter().enumerate() {
            topo_position[id.index()] = pos;
        }

        let mut ancestors: Vec<Vec<NodeId>> = vec![Vec::new(); self.signals.len()];
        for &id in &topo_order {
            let node = &self.nodes[id];
            let mut set: BTreeSet<NodeId> = BTreeSet::new();
            for input in node.inputs() {
                set.extend(ancestors[input.index()].iter().copied());
            }
            if node.is_controlled() {
                set.insert(id);
            }
            ancestors[node.output().index()] = set.into_iter().collect();
        }

        Ok(Graph {
            name: self.name,
            interner: self.interner,
            signals: self.signals,
            fields: self.fields,
            nodes: self.nodes,
            domains: self.domains,
            signal_index: self.signal_index,
            node_index: self.node_index,
            field_index: self.field_index,
            consumers,
            field_users,
            topo_order,
            topo_position,
            ancestors,
        })
    }

    /// Kahn's algorithm, always taking the lowest ready node ID so the order
    /// depends only on declaration order.
    fn kahn_order(&self, consumers: &[Vec<NodeId>]) -> Result<Vec<NodeId>, SchemaError> {
        let mut in_degree = vec![0usize; self.nodes.len()];
        for (id, node) in self.nodes.iter() {
            in_degree[id.index()] = node
                .inputs()
                .iter()
                .filter(|s| self.signals[**s].producer.is_some())
                .count();
        }
        let mut ready: BTreeSet<NodeId> = self
            .nodes
            .ids()
            .filter(|id| in_degree[id.index()] == 0)
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(id) = ready.pop_first() {
            order.push(id);
            for &consumer in &consumers[self.nodes[id].output().index()] {
                in_degree[consumer.index()] -= 1;
                if in_degree[consumer.index()] == 0 {
                    ready.insert(consumer);
                }
            }
        }
        if order.len() == self.nodes.len() {
            return Ok(order);
        }
        Err(SchemaError::Cycle {
            nodes: self.find_cycle(&in_degree, consumers),
        })
    }

    /// Names the nodes of the first strongly connected component that forms
    /// a loop among the nodes Kahn's algorithm could not order.
    fn find_cycle(&self, in_degree: &[usize], consumers: &[Vec<NodeId>]) -> Vec<String> {
        let stuck: Vec<NodeId> = self
            .nodes
            .ids()
            .filter(|id| in_degree[id.index()] > 0)
            .collect();
        let mut graph: DiGraph<NodeId, ()> = DiGraph::new();
        let mut index = HashMap::new();
        for &id in &stuck {
            index.insert(id, graph.add_node(id));
        }
        for &id in &stuck {
            for consumer in &consumers[self.nodes[id].output().index()] {
                if let (Some(&a), Some(&b)) = (index.get(&id), index.get(consumer)) {
                    graph.add_edge(a, b, ());
                }
            }
        }
        let mut loops: Vec<Vec<NodeId>> = tarjan_scc(&graph)
            .into_iter()
            .filter(|scc| {
                scc.len() > 1 || scc.iter().any(|&n| graph.contains_edge(n, n))
            })
            .map(|scc| {
                let mut ids: Vec<NodeId> = scc.into_iter().map(|n| graph[n]).collect();
                ids.sort();
                ids
            })
            .collect();
        loops.sort();
        loops
            .into_iter()
            .next()
            .unwrap_or(stuck)
            .into_iter()
            .map(|id| self.interner.resolve(self.nodes[id].name()).to_string())
            .collect()
    }
}

//! Which register fields a resolution may change, and when each signal's
//! value becomes fixed during the search.

use crate::targets::TargetSet;
use clocktree_eval::LimitViolation;
use clocktree_model::{ControlRole, FieldId, Graph, Node, NodeId, RegisterState, SignalId};
use std::collections::{BTreeMap, HashMap};

/// A free register field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Variable {
    pub field: FieldId,
    pub default: u64,
    /// Every node the field controls, with the role it plays there.
    pub controllers: Vec<(NodeId, ControlRole)>,
}

/// Index of the last variable an item depends on. `None` means the item
/// depends on no variable and is fixed before the search starts.
pub(crate) type Ready = Option<usize>;

/// `true` once every variable up to `depth` is assigned.
pub(crate) fn determined(ready: Ready, depth: usize) -> bool {
    ready.map_or(true, |r| r <= depth)
}

#[derive(Debug)]
pub(crate) struct Scope {
    pub vars: Vec<Variable>,
    signal_ready: Vec<Ready>,
    vco_ready: Vec<Ready>,
    signal_in_cone: Vec<bool>,
}

impl Scope {
    /// Collects the fields of every controlled ancestor of a target, except
    /// fields pinned by the caller, ordered root-first by the topological
    /// position of their first controlling node.
    pub fn new(graph: &Graph, targets: &TargetSet, pinned: &RegisterState) -> Scope {
        let mut order: BTreeMap<FieldId, (usize, usize)> = BTreeMap::new();
        for (signal, _) in targets.iter() {
            for &node in graph.ancestors(signal) {
                let pos = graph.topo_position(node);
                for (slot, (field, _)) in graph.node(node).controls().into_iter().enumerate() {
                    if pinned.contains(field) {
                        continue;
                    }
                    let key = (pos, slot);
                    order
                        .entry(field)
                        .and_modify(|k| *k = (*k).min(key))
                        .or_insert(key);
                }
            }
        }
        let mut fields: Vec<(FieldId, (usize, usize))> = order.into_iter().collect();
        fields.sort_by_key(|&(field, key)| (key, field));

        let vars: Vec<Variable> = fields
            .into_iter()
            .map(|(field, _)| Variable {
                field,
                default: graph.field(field).default,
                controllers: graph
                    .field_users(field)
                    .iter()
                    .flat_map(|&n| {
                        graph
                            .node(n)
                            .controls()
                            .into_iter()
                            .filter(move |(f, _)| *f == field)
                            .map(move |(_, role)| (n, role))
                    })
                    .collect(),
            })
            .collect();
        let index: HashMap<FieldId, usize> =
            vars.iter().enumerate().map(|(i, v)| (v.field, i)).collect();

        let mut signal_ready: Vec<Ready> = vec![None; graph.signals().len()];
        let mut vco_ready: Vec<Ready> = vec![None; graph.nodes().len()];
        for &id in graph.topo_order() {
            let node = graph.node(id);
            let mut own: Ready = None;
            let mut own_vco: Ready = None;
            for (field, role) in node.controls() {
                if let Some(&i) = index.get(&field) {
                    own = own.max(Some(i));
                    if role.drives_vco() {
                        own_vco = own_vco.max(Some(i));
                    }
                }
            }
            let inputs = node
                .inputs()
                .iter()
                .map(|s| signal_ready[s.index()])
                .max()
                .flatten();
            signal_ready[node.output().index()] = inputs.max(own);
            if let Node::Pll(pll) = node {
                vco_ready[id.index()] = signal_ready[pll.input.index()].max(own_vco);
            }
        }

        let signal_in_cone = signal_ready
            .iter()
            .enumerate()
            .map(|(i, r)| r.is_some() || targets.contains(SignalId::from_raw(i as u32)))
            .collect();

        Scope {
            vars,
            signal_ready,
            vco_ready,
            signal_in_cone,
        }
    }

    /// When `signal` becomes fixed.
    pub fn signal_ready(&self, signal: SignalId) -> Ready {
        self.signal_ready[signal.index()]
    }

    /// Where a violation sits relative to the search: `None` if no free
    /// variable can influence it, otherwise when it becomes fixed.
    pub fn locate(&self, graph: &Graph, violation: &LimitViolation) -> Option<Ready> {
        if let Some(signal) = violation.signal() {
            return self.signal_locate(signal);
        }
        let node = violation.node()?;
        let output = graph.node(node).output();
        if violation.is_vco() {
            let ready = self.vco_ready[node.index()];
            if ready.is_some() || self.signal_in_cone[output.index()] {
                return Some(ready);
            }
            return None;
        }
        self.signal_locate(output)
    }

    fn signal_locate(&self, signal: SignalId) -> Option<Ready> {
        self.signal_in_cone[signal.index()].then(|| self.signal_ready[signal.index()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clocktree_common::{Hz, Tolerance};
    use clocktree_model::ClockTreeModel;

    fn graph() -> Graph {
        let model: ClockTreeModel = serde_json::from_str(
            r#"{
            "signals": [{"name": "hse_ck", "nominal": 8000000}],
            "sources": [{"name": "HSE", "output": "hse_ck"}],
            "dividers": [
                {"name": "PLLM", "input": "hse_ck", "output": "ref_ck",
                 "reg": "PLLCFGR", "field": "PLLM", "linear": {"value_range": [1, 63]}},
                {"name": "PLLP", "input": "vco_ck", "output": "sys_ck",
                 "reg": "PLLCFGR", "field": "PLLP", "factors": [2, 4, 6, 8]},
                {"name": "PLLQ", "input": "vco_ck", "output": "usb_ck",
                 "reg": "PLLCFGR", "field": "PLLQ", "linear": {"value_range": [2, 15]}},
                {"name": "APB", "input": "sys_ck", "output": "pclk",
                 "reg": "CFGR", "field": "PPRE", "factors": [1, 2]}
            ],
            "plls": [{"name": "PLL", "input": "ref_ck", "output": "vco_ck",
                      "feedback_integer": {"reg": "PLLCFGR", "field": "PLLN", "value_range": [50, 432]},
                      "vco_limits": [100000000, 432000000]}]
        }"#,
        )
        .unwrap();
        Graph::load(&model).unwrap()
    }

    fn names(g: &Graph, scope: &Scope) -> Vec<String> {
        scope.vars.iter().map(|v| g.field_path(v.field)).collect()
    }

    #[test]
    fn variables_are_root_first() {
        let g = graph();
        let mut targets = TargetSet::new();
        targets.insert_named(&g, "usb_ck", Hz::mhz(48), Tolerance::EXACT).unwrap();
        targets.insert_named(&g, "sys_ck", Hz::mhz(168), Tolerance::EXACT).unwrap();
        let scope = Scope::new(&g, &targets, &RegisterState::new());
        assert_eq!(
            names(&g, &scope),
            vec!["PLLCFGR.PLLM", "PLLCFGR.PLLN", "PLLCFGR.PLLP", "PLLCFGR.PLLQ"]
        );
    }

    #[test]
    fn pinned_fields_are_not_free() {
        let g = graph();
        let mut targets = TargetSet::new();
        targets.insert_named(&g, "sys_ck", Hz::mhz(168), Tolerance::EXACT).unwrap();
        let pinned = RegisterState::from_named(&g, [("PLLCFGR.PLLM", 8)]).unwrap();
        let scope = Scope::new(&g, &targets, &pinned);
        assert_eq!(names(&g, &scope), vec!["PLLCFGR.PLLN", "PLLCFGR.PLLP"]);
    }

    #[test]
    fn readiness_follows_dependencies() {
        let g = graph();
        let mut targets = TargetSet::new();
        targets.insert_named(&g, "sys_ck", Hz::mhz(168), Tolerance::EXACT).unwrap();
        let scope = Scope::new(&g, &targets, &RegisterState::new());
        assert_eq!(scope.signal_ready(g.signal_id("ref_ck").unwrap()), Some(0));
        assert_eq!(scope.signal_ready(g.signal_id("vco_ck").unwrap()), Some(1));
        assert_eq!(scope.signal_ready(g.signal_id("sys_ck").unwrap()), Some(2));
        assert_eq!(scope.signal_ready(g.signal_id("hse_ck").unwrap()), None);
        // PPRE is outside every target's ancestors, but pclk still follows sys_ck
        assert_eq!(scope.signal_ready(g.signal_id("pclk").unwrap()), Some(2));
        assert!(determined(None, 0));
        assert!(!determined(Some(2), 1));
    }

    #[test]
    fn violations_outside_cone_are_not_located() {
        let g = graph();
        let mut targets = TargetSet::new();
        targets.insert_named(&g, "ref_ck", Hz::mhz(1), Tolerance::EXACT).unwrap();
        let scope = Scope::new(&g, &targets, &RegisterState::new());
        let vco = LimitViolation::VcoAboveMaximum {
            pll: g.node_id("PLL").unwrap(),
            vco: Hz::mhz(500),
            max: Hz::mhz(432),
        };
        // the PLL's input depends on PLLM
        assert_eq!(scope.locate(&g, &vco), Some(Some(0)));
        let hse = LimitViolation::AboveMaximum {
            signal: g.signal_id("hse_ck").unwrap(),
            actual: Hz::mhz(8),
            max: Hz::mhz(4),
        };
        assert_eq!(scope.locate(&g, &hse), None);
    }
}

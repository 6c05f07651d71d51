//! Caller-owned register field assignments.

use crate::error::LookupError;
use crate::graph::Graph;
use crate::ids::FieldId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Raw values for a subset of a graph's register fields.
///
/// Fields without an entry read as their declared default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegisterState {
    values: BTreeMap<FieldId, u64>,
}

impl RegisterState {
    /// An empty state: every field at its default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a state from `(REG.FIELD, raw)` pairs.
    pub fn from_named<'a, I>(graph: &Graph, values: I) -> Result<Self, LookupError>
    where
        I: IntoIterator<Item = (&'a str, u64)>,
    {
        let mut state = Self::new();
        for (path, raw) in values {
            state.set_named(graph, path, raw)?;
        }
        Ok(state)
    }

    /// The explicitly assigned raw value of `field`.
    pub fn get(&self, field: FieldId) -> Option<u64> {
        self.values.get(&field).copied()
    }

    /// The raw value `field` reads as: the assignment, else the default.
    pub fn value(&self, graph: &Graph, field: FieldId) -> u64 {
        self.get(field).unwrap_or_else(|| graph.field(field).default)
    }

    /// Assigns `raw` to `field`, returning the previous assignment.
    pub fn set(&mut self, field: FieldId, raw: u64) -> Option<u64> {
        self.values.insert(field, raw)
    }

    /// Assigns `raw` to the field at `REG.FIELD`.
    pub fn set_named(&mut self, graph: &Graph, path: &str, raw: u64) -> Result<(), LookupError> {
        let field = graph.field_by_path(path)?;
        self.set(field, raw);
        Ok(())
    }

    /// Removes the assignment of `field`.
    pub fn remove(&mut self, field: FieldId) -> Option<u64> {
        self.values.remove(&field)
    }

    /// Returns `true` if `field` is explicitly assigned.
    pub fn contains(&self, field: FieldId) -> bool {
        self.values.contains_key(&field)
    }

    /// Number of explicit assignments.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if nothing is assigned.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Explicit assignments in field ID order.
    pub fn iter(&self) -> impl Iterator<Item = (FieldId, u64)> + '_ {
        self.values.iter().map(|(&f, &v)| (f, v))
    }

    /// Overlays every assignment of `other` onto `self`.
    pub fn extend_from(&mut self, other: &RegisterState) {
        self.values.extend(other.iter());
    }

    /// Assignments whose value differs from the field default.
    pub fn non_default_writes(&self, graph: &Graph) -> usize {
        self.iter()
            .filter(|&(f, v)| graph.field(f).default != v)
            .count()
    }

    /// Assignments keyed by `REG.FIELD`, sorted by path.
    pub fn to_named(&self, graph: &Graph) -> BTreeMap<String, u64> {
        self.iter()
            .map(|(f, v)| (graph.field_path(f), v))
            .collect()
    }
}

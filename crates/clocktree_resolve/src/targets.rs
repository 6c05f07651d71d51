//! Requested signal frequencies.

use clocktree_common::{Hz, Tolerance};
use clocktree_model::{Graph, LookupError, SignalId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A requested frequency and how far the result may deviate from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// Requested frequency.
    pub frequency: Hz,
    /// Acceptance window.
    pub tolerance: Tolerance,
}

impl Target {
    /// Returns `true` if `actual` satisfies the request.
    pub fn accepts(&self, actual: Hz) -> bool {
        self.tolerance.accepts(self.frequency, actual)
    }
}

/// Signals with requested frequencies, keyed by signal ID.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetSet {
    targets: BTreeMap<SignalId, Target>,
}

impl TargetSet {
    /// An empty target set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests `frequency` on `signal`, replacing any earlier request.
    pub fn insert(&mut self, signal: SignalId, frequency: Hz, tolerance: Tolerance) {
        self.targets.insert(
            signal,
            Target {
                frequency,
                tolerance,
            },
        );
    }

    /// Requests `frequency` on the signal called `name`.
    pub fn insert_named(
        &mut self,
        graph: &Graph,
        name: &str,
        frequency: Hz,
        tolerance: Tolerance,
    ) -> Result<(), LookupError> {
        let signal = graph.expect_signal(name)?;
        self.insert(signal, frequency, tolerance);
        Ok(())
    }

    /// The request on `signal`.
    pub fn get(&self, signal: SignalId) -> Option<&Target> {
        self.targets.get(&signal)
    }

    /// Returns `true` if `signal` has a request.
    pub fn contains(&self, signal: SignalId) -> bool {
        self.targets.contains_key(&signal)
    }

    /// Number of requests.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Returns `true` if nothing is requested.
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Requests in signal ID order.
    pub fn iter(&self) -> impl Iterator<Item = (SignalId, &Target)> + '_ {
        self.targets.iter().map(|(s, t)| (*s, t))
    }
}

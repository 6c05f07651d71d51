//! Frequency bound checks over a full set of signal frequencies.

use crate::evaluator::Frequencies;
use crate::violation::LimitViolation;
use clocktree_model::{Graph, Node};

/// Checks signal bounds, PLL VCO ranges and domain ceilings.
///
/// Minimum bounds apply only to running clocks: a gated-off signal or a
/// stopped VCO at 0 Hz is legal.
#[derive(Debug, Clone, Copy)]
pub struct LimitValidator<'g> {
    graph: &'g Graph,
}

impl<'g> LimitValidator<'g> {
    /// Creates a validator for `graph`.
    pub fn new(graph: &'g Graph) -> Self {
        Self { graph }
    }

    /// Returns every violation, in signal, PLL, then domain order.
    pub fn check(&self, freqs: &Frequencies) -> Vec<LimitViolation> {
        let mut out = Vec::new();

        for (id, signal) in self.graph.signals().iter() {
            let Some(actual) = freqs.hz(id) else { continue };
            if let Some(min) = signal.min {
                if !actual.is_zero() && actual < min {
                    out.push(LimitViolation::BelowMinimum {
                        signal: id,
                        actual,
                        min,
                    });
                }
            }
            if let Some(max) = signal.max {
                if actual > max {
                    out.push(LimitViolation::AboveMaximum {
                        signal: id,
                        actual,
                        max,
                    });
                }
            }
        }

        for (id, node) in self.graph.nodes().iter() {
            let Node::Pll(pll) = node else { continue };
            let (Some((min, max)), Some(vco)) = (pll.vco_limits, freqs.vco(id)) else {
                continue;
            };
            if !vco.is_zero() && vco < min {
                out.push(LimitViolation::VcoBelowMinimum { pll: id, vco, min });
            }
            if vco > max {
                out.push(LimitViolation::VcoAboveMaximum { pll: id, vco, max });
            }
        }

        for (id, domain) in self.graph.domains().iter() {
            for &signal in &domain.signals {
                if let Some(actual) = freqs.hz(signal) {
                    if actual > domain.max {
                        out.push(LimitViolation::DomainExceeded {
                            domain: id,
                            signal,
                            actual,
                            max: domain.max,
                        });
                    }
                }
            }
        }

        out
    }
}

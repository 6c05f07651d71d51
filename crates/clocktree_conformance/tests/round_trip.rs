//! Randomized round trip: resolving the frequencies of a clean random state
//! must succeed and reproduce those frequencies.

use clocktree_common::Tolerance;
use clocktree_conformance::*;
use clocktree_eval::{evaluate, SignalValue};
use clocktree_model::{Graph, RegisterState};
use clocktree_resolve::{resolve, ResolveOptions, TargetSet};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A state with every field set to a random raw value its width allows,
/// except the `fixed` ones.
fn random_state(graph: &Graph, rng: &mut StdRng, fixed: &[(&str, u64)]) -> RegisterState {
    let mut state = RegisterState::new();
    for (id, field) in graph.fields().iter() {
        let max = field.max_raw().unwrap_or(1);
        state.set(id, rng.gen_range(0..=max));
    }
    for &(path, raw) in fixed {
        state.set_named(graph, path, raw).unwrap();
    }
    state
}

/// Exact targets on the output of every controlled node.
fn targets_from(graph: &Graph, state: &RegisterState) -> Option<TargetSet> {
    let eval = evaluate(graph, state);
    if !eval.is_clean() {
        return None;
    }
    let mut targets = TargetSet::new();
    for (_, node) in graph.nodes().iter() {
        if !node.is_controlled() {
            continue;
        }
        match eval.frequencies.get(node.output()) {
            SignalValue::Driven(hz) => targets.insert(node.output(), hz, Tolerance::EXACT),
            SignalValue::Undriven => return None,
        }
    }
    Some(targets)
}

fn round_trip(json: &str, seed: u64, samples: usize) {
    round_trip_with(json, seed, samples, &[]);
}

fn round_trip_with(json: &str, seed: u64, samples: usize, fixed: &[(&str, u64)]) {
    let graph = load(json);
    let mut rng = StdRng::seed_from_u64(seed);
    let options = ResolveOptions {
        step_budget: 1_000_000,
    };
    let mut checked = 0;
    for _ in 0..20_000 {
        if checked == samples {
            break;
        }
        let original = random_state(&graph, &mut rng, fixed);
        let Some(targets) = targets_from(&graph, &original) else {
            continue;
        };
        checked += 1;

        let res = resolve(&graph, &targets, &RegisterState::new(), &options);
        assert!(
            res.is_solved(),
            "seed {seed}: no solution for {:?}: {res:?}",
            original.to_named(&graph)
        );
        let freqs = &res.evaluation().frequencies;
        for (signal, target) in targets.iter() {
            assert_eq!(
                freqs.hz(signal),
                Some(target.frequency),
                "seed {seed}: {} differs",
                graph.signal_name(signal)
            );
        }
    }
    assert_eq!(checked, samples, "too few clean random states");
}

#[test]
fn simple_pll_round_trip() {
    round_trip(SIMPLE_PLL, 0x5eed, 16);
}

#[test]
fn f4_round_trip() {
    round_trip(STM32F4_LIKE, 0xc10c, 24);
}

#[test]
fn gates_and_mux_round_trip() {
    round_trip(GATES_AND_MUX, 7, 8);
}

/// Random fractional VCOs. The post-divider is generated as 1 so that the
/// output lands exactly on a VCO step; the resolver still searches it.
#[test]
fn fractional_round_trip() {
    round_trip_with(FRACTIONAL_PLL, 0xf4ac, 12, &[("RCC_PLL2DIVR.DIVP", 0)]);
}

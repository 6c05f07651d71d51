//! Conformance test helpers for the clocktree crates.
//!
//! Provides reference clock-tree models and shared pipeline functions that
//! take a model through load, lint, evaluation and resolution, returning
//! structured results for assertion in integration tests.

#![warn(missing_docs)]

use clocktree_common::Hz;
use clocktree_config::ResolvedProfile;
use clocktree_diagnostics::{Diagnostic, DiagnosticSink, Severity};
use clocktree_eval::Evaluation;
use clocktree_model::{ClockTreeModel, Graph, LintEngine, RegisterState, SchemaError};
use clocktree_resolve::{resolve, Resolution, ResolveOptions, TargetSet};

/// One PLL behind an 8 MHz crystal with a four-entry output divider.
pub const SIMPLE_PLL: &str = r#"{
    "name": "simple-pll",
    "signals": [{"name": "hse_ck", "nominal": 8000000}],
    "fields": [{"reg": "RCC_PLLCFGR", "field": "PLLN", "width": 7}],
    "sources": [{"name": "HSE", "output": "hse_ck"}],
    "plls": [{"name": "PLL1", "input": "hse_ck", "output": "pll1_vco",
              "feedback_integer": {"reg": "RCC_PLLCFGR", "field": "PLLN", "value_range": [8, 120]},
              "vco_limits": [64000000, 400000000]}],
    "dividers": [{"name": "PLLP", "input": "pll1_vco", "output": "sys_ck",
                  "reg": "RCC_PLLCFGR", "field": "PLLP", "factors": [2, 4, 6, 8]}]
}"#;

/// An STM32F4-style tree: HSI/HSE into the main PLL, system clock mux, bus
/// prescalers and a gated 48 MHz clock. Reset values match the hardware.
pub const STM32F4_LIKE: &str = r#"{
    "name": "stm32f4-like",
    "signals": [
        {"name": "hse_ck", "nominal": 8000000, "description": "external crystal"},
        {"name": "pll48_ck", "max": 48000000},
        {"name": "sys_ck", "max": 168000000},
        {"name": "pclk1", "max": 42000000}
    ],
    "fields": [
        {"reg": "RCC_PLLCFGR", "field": "PLLSRC", "width": 1},
        {"reg": "RCC_PLLCFGR", "field": "PLLM", "width": 6, "default": 16},
        {"reg": "RCC_PLLCFGR", "field": "PLLN", "width": 9, "default": 192},
        {"reg": "RCC_PLLCFGR", "field": "PLLP", "width": 2},
        {"reg": "RCC_PLLCFGR", "field": "PLLQ", "width": 4, "default": 4},
        {"reg": "RCC_CFGR", "field": "SW", "width": 2},
        {"reg": "RCC_CFGR", "field": "HPRE", "width": 3},
        {"reg": "RCC_CFGR", "field": "PPRE1", "width": 3},
        {"reg": "RCC_AHB2ENR", "field": "OTGFSEN", "width": 1}
    ],
    "sources": [
        {"name": "HSI", "output": "hsi_ck", "frequencies": [16000000]},
        {"name": "HSE", "output": "hse_ck"}
    ],
    "muxes": [
        {"name": "PLLSRC", "reg": "RCC_PLLCFGR", "field": "PLLSRC",
         "inputs": ["hsi_ck", "hse_ck"], "output": "pll_in"},
        {"name": "SW", "reg": "RCC_CFGR", "field": "SW",
         "inputs": ["hsi_ck", "hse_ck", "pll_p_ck", "-reserved-"], "output": "sys_ck"}
    ],
    "dividers": [
        {"name": "PLLM", "input": "pll_in", "output": "pll_ref",
         "reg": "RCC_PLLCFGR", "field": "PLLM", "linear": {"value_range": [2, 63]}},
        {"name": "PLLP", "input": "pll_vco", "output": "pll_p_ck",
         "reg": "RCC_PLLCFGR", "field": "PLLP", "factors": [2, 4, 6, 8]},
        {"name": "PLLQ", "input": "pll_vco", "output": "pll48_ck",
         "reg": "RCC_PLLCFGR", "field": "PLLQ", "linear": {"value_range": [2, 15]}},
        {"name": "HPRE", "input": "sys_ck", "output": "hclk",
         "reg": "RCC_CFGR", "field": "HPRE", "factors": [1, 2, 4, 8, 16, 64, 128, 256]},
        {"name": "PPRE1", "input": "hclk", "output": "pclk1",
         "reg": "RCC_CFGR", "field": "PPRE1", "factors": [1, 1, 1, 1, 2, 4, 8, 16]}
    ],
    "gates": [
        {"name": "OTGFS", "input": "pll48_ck", "output": "otg_ck",
         "reg": "RCC_AHB2ENR", "bit": "OTGFSEN"}
    ],
    "plls": [
        {"name": "PLL", "input": "pll_ref", "output": "pll_vco",
         "feedback_integer": {"reg": "RCC_PLLCFGR", "field": "PLLN", "value_range": [50, 432]},
         "vco_limits": [100000000, 432000000]}
    ],
    "domains": [{"name": "VOS1", "max": 168000000, "signals": ["sys_ck", "hclk"]}]
}"#;

/// Clock enables of both polarities and a mux with off and reserved entries.
pub const GATES_AND_MUX: &str = r#"{
    "sources": [
        {"name": "HSI", "output": "hsi_ck", "frequencies": [16000000]},
        {"name": "LSE", "output": "lse_ck", "frequencies": [32768]}
    ],
    "gates": [
        {"name": "GPIOA", "input": "hsi_ck", "output": "gpioa_ck",
         "reg": "RCC_AHB1ENR", "bit": "GPIOAEN"},
        {"name": "SRAM_LP", "input": "hsi_ck", "output": "sram_lp_ck",
         "reg": "RCC_AHB1LPENR", "bit": "SRAMLPDIS", "inverted": true}
    ],
    "muxes": [
        {"name": "MCO1", "reg": "RCC_CFGR", "field": "MCO1",
         "inputs": ["hsi_ck", "", "-reserved-", "lse_ck"], "output": "mco1_ck"}
    ]
}"#;

/// An H7-style fractional PLL with a post-divider and a custom-formula PLL.
pub const FRACTIONAL_PLL: &str = r#"{
    "signals": [
        {"name": "ref_ck", "nominal": 2000000},
        {"name": "osc_ck", "nominal": 16000000}
    ],
    "fields": [
        {"reg": "RCC_PLL2DIVR", "field": "DIVN", "width": 9},
        {"reg": "RCC_PLL2FRACR", "field": "FRACN", "width": 13},
        {"reg": "RCC_PLL2DIVR", "field": "DIVP", "width": 7},
        {"reg": "RCC_PLLXCFGR", "field": "N", "width": 4}
    ],
    "plls": [
        {"name": "PLL2", "input": "ref_ck", "output": "pll2_p_ck",
         "feedback_integer": {"reg": "RCC_PLL2DIVR", "field": "DIVN", "value_range": [3, 511], "offset": 1},
         "feedback_fraction": {"reg": "RCC_PLL2FRACR", "field": "FRACN", "value_range": [0, 8191]},
         "post_divider": {"reg": "RCC_PLL2DIVR", "field": "DIVP", "value_range": [0, 127], "offset": 1},
         "vco_limits": [192000000, 960000000]},
        {"name": "PLLX", "input": "osc_ck", "output": "x_ck",
         "feedback_integer": {"reg": "RCC_PLLXCFGR", "field": "N", "value_range": [0, 15]},
         "vco_formula": "2 * input * n / (n - 2)"}
    ]
}"#;

/// Parses a JSON model.
pub fn parse_model(json: &str) -> ClockTreeModel {
    serde_json::from_str(json).unwrap()
}

/// Parses and loads a JSON model, returning the schema error if it fails.
pub fn try_load(json: &str) -> Result<Graph, SchemaError> {
    Graph::load(&parse_model(json))
}

/// Parses and loads a JSON model that is expected to be valid.
pub fn load(json: &str) -> Graph {
    match try_load(json) {
        Ok(graph) => graph,
        Err(e) => panic!("model failed to load: {e}"),
    }
}

/// Builds a register state from `REG.FIELD` paths.
pub fn state(graph: &Graph, values: &[(&str, u64)]) -> RegisterState {
    RegisterState::from_named(graph, values.iter().copied()).unwrap()
}

/// Frequency of a named signal in an evaluation.
pub fn freq(graph: &Graph, evaluation: &Evaluation, signal: &str) -> Option<Hz> {
    evaluation
        .frequencies
        .by_name(graph, signal)
        .and_then(|v| v.hz())
}

/// Result of running the load and lint checks on a model.
pub struct CheckResult {
    /// The loaded graph.
    pub graph: Graph,
    /// All lint diagnostics.
    pub diagnostics: Vec<Diagnostic>,
    /// Number of error-severity diagnostics.
    pub error_count: usize,
    /// Number of warning-severity diagnostics.
    pub warning_count: usize,
}

/// Loads a model and runs every lint with the given overrides.
pub fn check_model(json: &str, allow: &[&str], deny: &[&str]) -> CheckResult {
    let graph = load(json);
    let allow: Vec<String> = allow.iter().map(|s| s.to_string()).collect();
    let deny: Vec<String> = deny.iter().map(|s| s.to_string()).collect();
    let sink = DiagnosticSink::new();
    LintEngine::new(&allow, &deny).run(&graph, &sink);
    CheckResult {
        error_count: sink.error_count(),
        warning_count: sink.count(Severity::Warning),
        diagnostics: sink.diagnostics(),
        graph,
    }
}

/// Resolves exact targets given as `(signal, Hz)` pairs.
pub fn resolve_exact(
    graph: &Graph,
    targets: &[(&str, u64)],
    pinned: &[(&str, u64)],
) -> Resolution {
    let mut set = TargetSet::new();
    for &(name, hz) in targets {
        set.insert_named(graph, name, Hz(hz), clocktree_common::Tolerance::EXACT)
            .unwrap();
    }
    resolve(graph, &set, &state(graph, pinned), &ResolveOptions::default())
}

/// Resolves the pins and targets of a configuration profile.
pub fn resolve_profile(graph: &Graph, profile: &ResolvedProfile) -> Resolution {
    let mut pinned = RegisterState::new();
    for (path, raw) in &profile.pins {
        pinned.set_named(graph, path, *raw).unwrap();
    }
    let mut targets = TargetSet::new();
    for (signal, request) in &profile.targets {
        targets
            .insert_named(graph, signal, request.frequency, request.tolerance)
            .unwrap();
    }
    let options = ResolveOptions {
        step_budget: profile.step_budget,
    };
    resolve(graph, &targets, &pinned, &options)
}

/// Raw value the resolution assigned to a field path.
pub fn field_value(graph: &Graph, resolution: &Resolution, path: &str) -> u64 {
    let field = graph.field_by_path(path).unwrap();
    resolution.state().value(graph, field)
}

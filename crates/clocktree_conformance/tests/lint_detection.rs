//! Model lints with allow/deny overrides.

use clocktree_conformance::*;
use clocktree_diagnostics::Severity;

const SLOPPY: &str = r#"{
    "signals": [
        {"name": "spare_ck"},
        {"name": "hclk", "min": 200000000, "max": 100000000}
    ],
    "fields": [{"reg": "RCC_CR", "field": "CSSON", "width": 1}],
    "sources": [{"name": "HSI", "output": "hsi_ck", "frequencies": [16000000]}],
    "muxes": [
        {"name": "MCO2", "reg": "RCC_CFGR", "field": "MCO2",
         "inputs": ["", "-reserved-"], "output": "mco2_ck"}
    ],
    "dividers": [{"name": "HPRE", "input": "hsi_ck", "output": "hclk", "fixed": 1}]
}"#;

fn codes(result: &CheckResult) -> Vec<String> {
    result.diagnostics.iter().map(|d| d.code.to_string()).collect()
}

#[test]
fn every_rule_fires() {
    let result = check_model(SLOPPY, &[], &[]);
    assert_eq!(codes(&result), vec!["W001", "W002", "W003", "W004"]);
    assert_eq!(result.warning_count, 4);
    assert_eq!(result.error_count, 0);
}

#[test]
fn allow_by_name() {
    let result = check_model(SLOPPY, &["orphan-signal", "unused-field"], &[]);
    assert_eq!(codes(&result), vec!["W002", "W004"]);
}

#[test]
fn deny_by_code() {
    let result = check_model(SLOPPY, &[], &["W002"]);
    assert_eq!(result.error_count, 1);
    let dead = result
        .diagnostics
        .iter()
        .find(|d| d.code.to_string() == "W002")
        .unwrap();
    assert_eq!(dead.severity, Severity::Error);
    assert!(dead.message.contains("MCO2"));
}

#[test]
fn reference_models_are_clean() {
    for json in [SIMPLE_PLL, STM32F4_LIKE, GATES_AND_MUX, FRACTIONAL_PLL] {
        let result = check_model(json, &[], &[]);
        assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    }
}

//! Evaluation and resolution on the reference models.

use clocktree_common::Hz;
use clocktree_conformance::*;
use clocktree_eval::{evaluate, LimitViolation, SignalValue};
use clocktree_model::{RegisterState, SchemaError};
use clocktree_resolve::{InfeasibleReason, Resolution};

// ============================================================================
// Forward evaluation
// ============================================================================

#[test]
fn f4_reset_state() {
    let g = load(STM32F4_LIKE);
    let eval = evaluate(&g, &RegisterState::new());
    assert!(eval.is_clean(), "{:?}", eval.violations);
    // HSI 16 MHz / 16 x 192 = 192 MHz VCO
    assert_eq!(eval.frequencies.vco(g.node_id("PLL").unwrap()), Some(Hz::mhz(192)));
    assert_eq!(freq(&g, &eval, "pll_p_ck"), Some(Hz::mhz(96)));
    assert_eq!(freq(&g, &eval, "pll48_ck"), Some(Hz::mhz(48)));
    assert_eq!(freq(&g, &eval, "sys_ck"), Some(Hz::mhz(16)));
    assert_eq!(freq(&g, &eval, "pclk1"), Some(Hz::mhz(16)));
    assert_eq!(freq(&g, &eval, "otg_ck"), Some(Hz::ZERO));
}

#[test]
fn evaluation_is_deterministic() {
    let g = load(STM32F4_LIKE);
    let s = state(
        &g,
        &[
            ("RCC_PLLCFGR.PLLSRC", 1),
            ("RCC_PLLCFGR.PLLM", 8),
            ("RCC_PLLCFGR.PLLN", 432),
            ("RCC_CFGR.SW", 2),
        ],
    );
    let first = evaluate(&g, &s);
    for _ in 0..5 {
        assert_eq!(evaluate(&g, &s), first);
    }
}

#[test]
fn gate_polarity() {
    let g = load(GATES_AND_MUX);
    let off = evaluate(&g, &RegisterState::new());
    assert_eq!(freq(&g, &off, "gpioa_ck"), Some(Hz::ZERO));
    assert_eq!(freq(&g, &off, "sram_lp_ck"), Some(Hz::mhz(16)));

    let on = evaluate(
        &g,
        &state(&g, &[("RCC_AHB1ENR.GPIOAEN", 1), ("RCC_AHB1LPENR.SRAMLPDIS", 1)]),
    );
    assert_eq!(freq(&g, &on, "gpioa_ck"), Some(Hz::mhz(16)));
    assert_eq!(freq(&g, &on, "sram_lp_ck"), Some(Hz::ZERO));
    assert!(on.is_clean());
}

#[test]
fn mux_off_and_reserved() {
    let g = load(GATES_AND_MUX);
    let off = evaluate(&g, &state(&g, &[("RCC_CFGR.MCO1", 1)]));
    assert_eq!(freq(&g, &off, "mco1_ck"), Some(Hz::ZERO));
    assert!(off.is_clean());

    let lse = evaluate(&g, &state(&g, &[("RCC_CFGR.MCO1", 3)]));
    assert_eq!(freq(&g, &lse, "mco1_ck"), Some(Hz(32_768)));

    let reserved = evaluate(&g, &state(&g, &[("RCC_CFGR.MCO1", 2)]));
    assert_eq!(
        reserved.violations,
        vec![LimitViolation::ReservedSelection {
            node: g.node_id("MCO1").unwrap(),
            raw: 2
        }]
    );
}

#[test]
fn vco_below_range() {
    let g = load(FRACTIONAL_PLL);
    // 2 MHz x (7 + 1) = 16 MHz, far below 192 MHz
    let eval = evaluate(
        &g,
        &state(&g, &[("RCC_PLL2DIVR.DIVN", 7), ("RCC_PLLXCFGR.N", 4)]),
    );
    assert!(eval.violations.contains(&LimitViolation::VcoBelowMinimum {
        pll: g.node_id("PLL2").unwrap(),
        vco: Hz::mhz(16),
        min: Hz::mhz(192),
    }));
}

#[test]
fn fractional_multiplier_and_post_divider() {
    let g = load(FRACTIONAL_PLL);
    // 2 MHz x (199 + 1 + 4096 / 8192) = 401 MHz, / (1 + 1)
    let eval = evaluate(
        &g,
        &state(
            &g,
            &[
                ("RCC_PLL2DIVR.DIVN", 199),
                ("RCC_PLL2FRACR.FRACN", 4096),
                ("RCC_PLL2DIVR.DIVP", 1),
                ("RCC_PLLXCFGR.N", 4),
            ],
        ),
    );
    assert!(eval.is_clean(), "{:?}", eval.violations);
    assert_eq!(eval.frequencies.vco(g.node_id("PLL2").unwrap()), Some(Hz::mhz(401)));
    assert_eq!(freq(&g, &eval, "pll2_p_ck"), Some(Hz(200_500_000)));
    assert_eq!(freq(&g, &eval, "x_ck"), Some(Hz::mhz(64)));
}

#[test]
fn limits_and_domain() {
    let g = load(STM32F4_LIKE);
    // HSI / 16 x 432 = 432 MHz VCO, / 2 = 216 MHz system clock
    let eval = evaluate(
        &g,
        &state(&g, &[("RCC_PLLCFGR.PLLN", 432), ("RCC_CFGR.SW", 2)]),
    );
    let hclk = g.signal_id("hclk").unwrap();
    let sys = g.signal_id("sys_ck").unwrap();
    assert!(eval.violations.iter().any(|v| matches!(
        v,
        LimitViolation::DomainExceeded { signal, .. } if *signal == hclk
    )));
    assert!(eval.violations.contains(&LimitViolation::AboveMaximum {
        signal: sys,
        actual: Hz::mhz(216),
        max: Hz::mhz(168),
    }));
    // 432 / 4 = 108 MHz on the USB clock
    assert!(eval.violations.contains(&LimitViolation::AboveMaximum {
        signal: g.signal_id("pll48_ck").unwrap(),
        actual: Hz::mhz(108),
        max: Hz::mhz(48),
    }));
}

#[test]
fn loader_rejects_non_power_of_two_table() {
    let err = try_load(
        r#"{
        "sources": [{"name": "HSI", "output": "hsi_ck", "frequencies": [16000000]}],
        "dividers": [{"name": "HPRE", "input": "hsi_ck", "output": "hclk",
                      "reg": "RCC_CFGR", "field": "HPRE", "factors": [1, 2, 4]}]
    }"#,
    )
    .unwrap_err();
    assert!(matches!(err, SchemaError::TableNotPowerOfTwo { len: 3, .. }));
}

#[test]
fn loader_rejects_cycle() {
    let err = try_load(
        r#"{
        "dividers": [
            {"name": "A", "input": "a_ck", "output": "b_ck", "fixed": 2},
            {"name": "B", "input": "b_ck", "output": "a_ck", "fixed": 2}
        ]
    }"#,
    )
    .unwrap_err();
    assert!(matches!(err, SchemaError::Cycle { .. }));
}

// ============================================================================
// Resolution
// ============================================================================

#[test]
fn simple_pll_exact_target() {
    let g = load(SIMPLE_PLL);
    let res = resolve_exact(&g, &[("sys_ck", 200_000_000)], &[]);
    assert!(res.is_solved(), "{res:?}");
    assert_eq!(field_value(&g, &res, "RCC_PLLCFGR.PLLN"), 50);
    assert_eq!(field_value(&g, &res, "RCC_PLLCFGR.PLLP"), 0);
    assert_eq!(freq(&g, res.evaluation(), "sys_ck"), Some(Hz::mhz(200)));
}

#[test]
fn simple_pll_unreachable_target() {
    let g = load(SIMPLE_PLL);
    let res = resolve_exact(&g, &[("sys_ck", 201_000_000)], &[]);
    let Resolution::Infeasible(inf) = &res else {
        panic!("expected infeasible, got {res:?}");
    };
    assert_eq!(inf.reason, InfeasibleReason::Exhausted);
    let unmet: Vec<_> = inf.unmet().collect();
    assert_eq!(unmet.len(), 1);
    assert_eq!(unmet[0].achieved, SignalValue::Driven(Hz::mhz(200)));
    assert_eq!(unmet[0].error_hz(), Some(-1_000_000));
    assert!(inf.stats.steps > 0);
}

#[test]
fn f4_system_usb_and_bus() {
    let g = load(STM32F4_LIKE);
    let res = resolve_exact(
        &g,
        &[
            ("sys_ck", 168_000_000),
            ("pll48_ck", 48_000_000),
            ("pclk1", 42_000_000),
        ],
        &[],
    );
    assert!(res.is_solved(), "{res:?}");
    let eval = res.evaluation();
    assert!(eval.is_clean(), "{:?}", eval.violations);
    assert_eq!(freq(&g, eval, "sys_ck"), Some(Hz::mhz(168)));
    assert_eq!(freq(&g, eval, "pll48_ck"), Some(Hz::mhz(48)));
    assert_eq!(freq(&g, eval, "pclk1"), Some(Hz::mhz(42)));
    assert_eq!(field_value(&g, &res, "RCC_CFGR.SW"), 2);
    assert!(res.targets().iter().all(|t| t.met && t.error_hz() == Some(0)));
}

#[test]
fn f4_pinned_source_and_prescaler() {
    let g = load(STM32F4_LIKE);
    let res = resolve_exact(
        &g,
        &[("sys_ck", 168_000_000), ("pll48_ck", 48_000_000)],
        &[("RCC_PLLCFGR.PLLSRC", 1), ("RCC_PLLCFGR.PLLM", 8)],
    );
    assert!(res.is_solved(), "{res:?}");
    // 8 MHz / 8 = 1 MHz reference; only 336 MHz serves both outputs
    assert_eq!(field_value(&g, &res, "RCC_PLLCFGR.PLLSRC"), 1);
    assert_eq!(field_value(&g, &res, "RCC_PLLCFGR.PLLM"), 8);
    assert_eq!(field_value(&g, &res, "RCC_PLLCFGR.PLLN"), 336);
    assert_eq!(field_value(&g, &res, "RCC_PLLCFGR.PLLP"), 0);
    assert_eq!(field_value(&g, &res, "RCC_PLLCFGR.PLLQ"), 7);
    assert_eq!(res.stats().free_variables, 4);
}

#[test]
fn fractional_pll_reaches_sub_step_target() {
    let g = load(FRACTIONAL_PLL);
    // 2 MHz x (99 + 1 + 5000 / 8192) = 201.2207031 MHz, floored
    let res = resolve_exact(&g, &[("pll2_p_ck", 201_220_703)], &[]);
    assert!(res.is_solved(), "{res:?}");
    let eval = res.evaluation();
    assert_eq!(freq(&g, eval, "pll2_p_ck"), Some(Hz(201_220_703)));
    let vco = eval.frequencies.vco(g.node_id("PLL2").unwrap()).unwrap();
    let post = field_value(&g, &res, "RCC_PLL2DIVR.DIVP") + 1;
    assert_eq!(vco.hz() / post, 201_220_703);
}

#[test]
fn fractional_pll_uses_post_divider() {
    let g = load(FRACTIONAL_PLL);
    // 100 MHz is below the VCO range, so the post-divider must take part
    let res = resolve_exact(&g, &[("pll2_p_ck", 100_000_000)], &[]);
    assert!(res.is_solved(), "{res:?}");
    assert_eq!(field_value(&g, &res, "RCC_PLL2DIVR.DIVN"), 99);
    assert_eq!(field_value(&g, &res, "RCC_PLL2FRACR.FRACN"), 0);
    assert_eq!(field_value(&g, &res, "RCC_PLL2DIVR.DIVP"), 1);
    assert_eq!(
        res.evaluation().frequencies.vco(g.node_id("PLL2").unwrap()),
        Some(Hz::mhz(200))
    );
}

#[test]
fn formula_pll_target() {
    let g = load(FRACTIONAL_PLL);
    // 2 x 16 MHz x 4 / (4 - 2)
    let res = resolve_exact(&g, &[("x_ck", 64_000_000)], &[]);
    assert!(res.is_solved(), "{res:?}");
    assert_eq!(field_value(&g, &res, "RCC_PLLXCFGR.N"), 4);
    assert_eq!(res.stats().free_variables, 1);
}

#[test]
fn resolution_is_deterministic() {
    let g = load(STM32F4_LIKE);
    let wanted = [("sys_ck", 168_000_000), ("pll48_ck", 48_000_000)];
    let a = resolve_exact(&g, &wanted, &[]);
    let b = resolve_exact(&g, &wanted, &[]);
    assert_eq!(a.state(), b.state());
    assert_eq!(a.stats(), b.stats());
}

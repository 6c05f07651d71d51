//! Projects on disk: `clocktree.toml` plus a model file, resolved per profile.

use clocktree_common::{Hz, Tolerance};
use clocktree_config::{load_config, ConfigError};
use clocktree_conformance::*;
use clocktree_resolve::Resolution;
use std::path::Path;

const PROJECT: &str = r#"
[project]
name = "f4-board"
model = "models/f4.json"

[resolver]
step_budget = 200000

[targets]
sys_ck = "168MHz"
pll48_ck = { frequency = "48MHz", tolerance = "0.25%" }

[profiles.hse]
description = "8 MHz crystal, 1 MHz PLL reference"
pins = { "RCC_PLLCFGR.PLLSRC" = 1, "RCC_PLLCFGR.PLLM" = 8 }

[profiles.slow]
targets = { sys_ck = "16MHz" }

[profiles.starved]
pins = { "RCC_CFGR.SW" = 0 }
step_budget = 50
"#;

fn write_project(dir: &Path) {
    std::fs::write(dir.join("clocktree.toml"), PROJECT).unwrap();
    std::fs::create_dir_all(dir.join("models")).unwrap();
    std::fs::write(dir.join("models/f4.json"), STM32F4_LIKE).unwrap();
}

fn project_graph(dir: &Path) -> clocktree_model::Graph {
    let config = load_config(dir).unwrap();
    let model = config.project.model.as_deref().unwrap();
    load(&std::fs::read_to_string(dir.join(model)).unwrap())
}

#[test]
fn global_targets() {
    let dir = tempfile::tempdir().unwrap();
    write_project(dir.path());
    let config = load_config(dir.path()).unwrap();
    let profile = clocktree_config::resolve_profile(&config, None).unwrap();
    assert_eq!(profile.step_budget, 200_000);
    assert_eq!(profile.targets["pll48_ck"].tolerance, Tolerance::Ppm(2_500));

    let g = project_graph(dir.path());
    let res = resolve_profile(&g, &profile);
    assert!(res.is_solved(), "{res:?}");
    assert_eq!(freq(&g, res.evaluation(), "sys_ck"), Some(Hz::mhz(168)));
}

#[test]
fn profile_pins() {
    let dir = tempfile::tempdir().unwrap();
    write_project(dir.path());
    let config = load_config(dir.path()).unwrap();
    let profile = clocktree_config::resolve_profile(&config, Some("hse")).unwrap();
    let g = project_graph(dir.path());
    let res = resolve_profile(&g, &profile);
    assert!(res.is_solved(), "{res:?}");
    assert_eq!(field_value(&g, &res, "RCC_PLLCFGR.PLLM"), 8);
    assert_eq!(field_value(&g, &res, "RCC_PLLCFGR.PLLN"), 336);
    assert_eq!(field_value(&g, &res, "RCC_PLLCFGR.PLLQ"), 7);
}

#[test]
fn profile_target_override() {
    let dir = tempfile::tempdir().unwrap();
    write_project(dir.path());
    let config = load_config(dir.path()).unwrap();
    let profile = clocktree_config::resolve_profile(&config, Some("slow")).unwrap();
    assert_eq!(profile.targets["sys_ck"].frequency, Hz::mhz(16));
    assert_eq!(profile.targets.len(), 2);

    let g = project_graph(dir.path());
    let res = resolve_profile(&g, &profile);
    assert!(res.is_solved(), "{res:?}");
    assert_eq!(freq(&g, res.evaluation(), "sys_ck"), Some(Hz::mhz(16)));
}

#[test]
fn pinned_away_target_is_infeasible() {
    let dir = tempfile::tempdir().unwrap();
    write_project(dir.path());
    let config = load_config(dir.path()).unwrap();
    let profile = clocktree_config::resolve_profile(&config, Some("starved")).unwrap();
    assert_eq!(profile.step_budget, 50);

    let g = project_graph(dir.path());
    let res = resolve_profile(&g, &profile);
    let Resolution::Infeasible(inf) = &res else {
        panic!("expected infeasible, got {res:?}");
    };
    assert!(inf.stats.steps <= 50);
    assert_eq!(field_value(&g, &res, "RCC_CFGR.SW"), 0);
    assert!(inf
        .unmet()
        .any(|t| t.signal == g.signal_id("sys_ck").unwrap()));
}

#[test]
fn unknown_profile() {
    let dir = tempfile::tempdir().unwrap();
    write_project(dir.path());
    let config = load_config(dir.path()).unwrap();
    let err = clocktree_config::resolve_profile(&config, Some("turbo")).unwrap_err();
    assert!(matches!(err, ConfigError::UnknownProfile(_)));
}

#[test]
fn missing_config_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(load_config(dir.path()), Err(ConfigError::IoError(_))));
}

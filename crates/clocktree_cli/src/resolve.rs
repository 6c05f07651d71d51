//! `clocktree resolve`: search register values for target frequencies.

use std::collections::BTreeMap;

use clocktree_config::{resolve_profile, TargetRequest};
use clocktree_model::{Graph, RegisterState};
use clocktree_resolve::{resolve, Resolution, ResolveOptions, TargetSet, DEFAULT_STEP_BUDGET};

use crate::pipeline::{load_graph, load_project, model_path, render_diagnostics, Project};
use crate::report::ResolveReport;
use crate::{GlobalArgs, ReportFormat, ResolveArgs};

/// Inputs gathered from the configuration and the command line.
#[derive(Debug, PartialEq, Eq)]
struct Request {
    pins: BTreeMap<String, u64>,
    targets: BTreeMap<String, TargetRequest>,
    step_budget: u64,
}

/// Runs the `clocktree resolve` command.
///
/// Returns exit code 0 when solved, 2 when infeasible, 1 on a load or
/// lookup error.
pub fn run(args: &ResolveArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project = load_project(global)?;
    let request = gather(args, project.as_ref())?;
    if request.targets.is_empty() {
        return Err("no targets given: use --target SIGNAL=FREQ or [targets] in clocktree.toml".into());
    }
    let path = model_path(args.model.as_deref(), project.as_ref())?;
    let graph = match load_graph(&path, global)? {
        Ok(graph) => graph,
        Err(code) => return Ok(code),
    };

    let mut pinned = RegisterState::new();
    for (path, raw) in &request.pins {
        pinned.set_named(&graph, path, *raw)?;
    }
    let mut targets = TargetSet::new();
    for (signal, t) in &request.targets {
        targets.insert_named(&graph, signal, t.frequency, t.tolerance)?;
    }

    if !global.quiet {
        eprintln!(
            "   Resolving {} target(s) with {} pinned field(s)",
            targets.len(),
            pinned.len()
        );
    }
    let options = ResolveOptions {
        step_budget: request.step_budget,
    };
    let resolution = resolve(&graph, &targets, &pinned, &options);

    if global.verbose {
        let stats = resolution.stats();
        eprintln!(
            "   Searched {} free field(s): {} step(s), {} pruned, depth {}",
            stats.free_variables, stats.steps, stats.pruned, stats.max_depth
        );
    }

    match args.format {
        ReportFormat::Text => {
            print!("{}", format_resolution(&graph, &resolution));
            render_diagnostics(&resolution.to_diagnostics(&graph), global);
        }
        ReportFormat::Json => {
            let report = ResolveReport::new(&graph, &resolution);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(if resolution.is_solved() { 0 } else { 2 })
}

/// Merges the configuration (global settings plus `--profile`) with
/// command-line pins and targets; the command line wins.
fn gather(args: &ResolveArgs, project: Option<&Project>) -> Result<Request, Box<dyn std::error::Error>> {
    let mut request = match project {
        Some(p) => {
            let resolved = resolve_profile(&p.config, args.profile.as_deref())?;
            Request {
                pins: resolved.pins,
                targets: resolved.targets,
                step_budget: resolved.step_budget,
            }
        }
        None => {
            if let Some(name) = &args.profile {
                return Err(format!("profile '{name}' requested but no clocktree.toml found").into());
            }
            Request {
                pins: BTreeMap::new(),
                targets: BTreeMap::new(),
                step_budget: DEFAULT_STEP_BUDGET,
            }
        }
    };
    for a in &args.pin {
        request.pins.insert(a.path.clone(), a.raw);
    }
    for t in &args.target {
        request.targets.insert(t.signal.clone(), t.request);
    }
    if let Some(budget) = args.budget {
        request.step_budget = budget;
    }
    Ok(request)
}

/// Register values, then one line per target.
fn format_resolution(graph: &Graph, resolution: &Resolution) -> String {
    let mut out = String::new();
    match resolution {
        Resolution::Solved(_) => out.push_str("solved\n"),
        Resolution::Infeasible(inf) => {
            out.push_str(&format!("infeasible: {}\nbest effort:\n", inf.reason));
        }
    }
    for (path, raw) in resolution.state().to_named(graph) {
        out.push_str(&format!("  {path} = {raw}\n"));
    }
    for t in resolution.targets() {
        let achieved = match t.achieved.hz() {
            Some(hz) => hz.to_string(),
            None => "undriven".to_string(),
        };
        let mark = if t.met { "ok" } else { "MISS" };
        out.push_str(&format!(
            "  {} = {achieved} (wanted {} ± {}) {mark}\n",
            graph.signal_name(t.signal),
            t.desired,
            t.tolerance
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{parse_assignment, parse_target_arg};
    use clocktree_common::{Hz, Tolerance};
    use clocktree_model::ClockTreeModel;
    use std::path::PathBuf;

    fn args() -> ResolveArgs {
        ResolveArgs {
            model: None,
            target: vec![parse_target_arg("sys_ck=200MHz").unwrap()],
            pin: vec![parse_assignment("R.P=1").unwrap()],
            profile: None,
            budget: None,
            format: ReportFormat::Text,
        }
    }

    #[test]
    fn command_line_only() {
        let request = gather(&args(), None).unwrap();
        assert_eq!(request.step_budget, DEFAULT_STEP_BUDGET);
        assert_eq!(request.pins["R.P"], 1);
        assert_eq!(request.targets["sys_ck"].frequency, Hz::mhz(200));
    }

    #[test]
    fn command_line_overrides_profile() {
        let config = clocktree_config::load_config_from_str(
            r#"
[project]
name = "x"
[pins]
"R.P" = 0
"R.N" = 50
[targets]
sys_ck = "100MHz"
[profiles.fast]
step_budget = 10
"#,
        )
        .unwrap();
        let project = Project {
            root: PathBuf::from("."),
            config,
        };
        let mut a = args();
        a.profile = Some("fast".into());
        a.budget = Some(99);
        let request = gather(&a, Some(&project)).unwrap();
        assert_eq!(request.pins["R.P"], 1);
        assert_eq!(request.pins["R.N"], 50);
        assert_eq!(request.targets["sys_ck"].frequency, Hz::mhz(200));
        assert_eq!(request.step_budget, 99);
    }

    #[test]
    fn profile_without_config_errors() {
        let mut a = args();
        a.profile = Some("fast".into());
        assert!(gather(&a, None).is_err());
    }

    #[test]
    fn text_report_shows_writes_and_targets() {
        let model: ClockTreeModel = serde_json::from_str(
            r#"{
            "signals": [{"name": "hse_ck", "nominal": 8000000}],
            "sources": [{"name": "HSE", "output": "hse_ck"}],
            "plls": [{"name": "PLL1", "input": "hse_ck", "output": "pll1_vco",
                      "feedback_integer": {"reg": "R", "field": "N", "value_range": [8, 120]},
                      "vco_limits": [64000000, 400000000]}],
            "dividers": [{"name": "P", "input": "pll1_vco", "output": "sys_ck",
                          "reg": "R", "field": "P", "factors": [2, 4, 6, 8]}]
        }"#,
        )
        .unwrap();
        let graph = Graph::load(&model).unwrap();
        let mut targets = TargetSet::new();
        targets
            .insert_named(&graph, "sys_ck", Hz::mhz(200), Tolerance::EXACT)
            .unwrap();
        let res = resolve(&graph, &targets, &RegisterState::new(), &ResolveOptions::default());
        let text = format_resolution(&graph, &res);
        assert_eq!(
            text,
            "solved\n  R.N = 50\n  R.P = 0\n  sys_ck = 200MHz (wanted 200MHz ± 0Hz) ok\n"
        );
    }
}

//! `clocktree eval`: forward-evaluate a register state.

use std::path::Path;

use clocktree_eval::evaluate;
use clocktree_model::{Graph, RegisterState};

use crate::pipeline::{load_graph, load_project, model_path, render_diagnostics, Assignment};
use crate::report::EvalReport;
use crate::{EvalArgs, GlobalArgs, ReportFormat};

/// Runs the `clocktree eval` command.
///
/// Returns exit code 0 for a clean evaluation, 2 if any fault or limit
/// violation was found, 1 on a load error.
pub fn run(args: &EvalArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project = load_project(global)?;
    let path = model_path(args.model.as_deref(), project.as_ref())?;
    let graph = match load_graph(&path, global)? {
        Ok(graph) => graph,
        Err(code) => return Ok(code),
    };

    let state = build_state(&graph, args.state.as_deref().map(Path::new), &args.set)?;
    let evaluation = evaluate(&graph, &state);

    match args.format {
        ReportFormat::Text => {
            print!("{}", format_frequencies(&graph, &evaluation));
            let diags: Vec<_> = evaluation
                .violations
                .iter()
                .map(|v| v.to_diagnostic(&graph))
                .collect();
            render_diagnostics(&diags, global);
            if !global.quiet {
                eprintln!("   Result: {} violation(s)", diags.len());
            }
        }
        ReportFormat::Json => {
            let report = EvalReport::new(&graph, &evaluation);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(if evaluation.is_clean() { 0 } else { 2 })
}

/// Register state from an optional JSON file of `{"REG.FIELD": raw}`, with
/// `--set` assignments applied on top.
fn build_state(
    graph: &Graph,
    file: Option<&Path>,
    set: &[Assignment],
) -> Result<RegisterState, Box<dyn std::error::Error>> {
    let mut state = RegisterState::new();
    if let Some(file) = file {
        let content = std::fs::read_to_string(file)
            .map_err(|e| format!("failed to read state {}: {e}", file.display()))?;
        let values: std::collections::BTreeMap<String, u64> = serde_json::from_str(&content)
            .map_err(|e| format!("failed to parse state {}: {e}", file.display()))?;
        for (path, raw) in &values {
            state.set_named(graph, path, *raw)?;
        }
    }
    for a in set {
        state.set_named(graph, &a.path, a.raw)?;
    }
    Ok(state)
}

/// One line per signal in declaration order, then one per PLL VCO.
fn format_frequencies(graph: &Graph, evaluation: &clocktree_eval::Evaluation) -> String {
    let freqs = &evaluation.frequencies;
    let width = graph
        .signals()
        .iter()
        .map(|(id, _)| graph.signal_name(id).len())
        .max()
        .unwrap_or(0);
    let mut out = String::new();
    for (id, value) in freqs.iter() {
        let shown = match value.hz() {
            Some(hz) => hz.to_string(),
            None => "undriven".to_string(),
        };
        out.push_str(&format!("{:width$}  {shown}\n", graph.signal_name(id)));
    }
    for (id, hz) in freqs.vcos() {
        out.push_str(&format!("{} vco: {hz}\n", graph.node_name(id)));
    }
    out
}

//! `clocktree check`: load a model and run the model lints.

use clocktree_diagnostics::{DiagnosticSink, Severity};
use clocktree_model::LintEngine;

use crate::pipeline::{load_graph, load_project, model_path, render_diagnostics};
use crate::{CheckArgs, GlobalArgs, ReportFormat};

/// Runs the `clocktree check` command.
///
/// Returns exit code 0 if the model loads with no error-level lint, 1
/// otherwise.
pub fn run(args: &CheckArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project = load_project(global)?;
    let path = model_path(args.model.as_deref(), project.as_ref())?;
    if !global.quiet {
        eprintln!("   Checking {}", path.display());
    }
    let graph = match load_graph(&path, global)? {
        Ok(graph) => graph,
        Err(code) => return Ok(code),
    };

    let (allow, deny) = merge_lint_lists(
        project.as_ref().map(|p| (&p.config.lint.allow, &p.config.lint.deny)),
        args,
    );
    let sink = DiagnosticSink::new();
    LintEngine::new(&allow, &deny).run(&graph, &sink);
    let diagnostics = sink.diagnostics();

    match args.format {
        ReportFormat::Text => render_diagnostics(&diagnostics, global),
        ReportFormat::Json => {
            let json =
                serde_json::to_string_pretty(&diagnostics).unwrap_or_else(|_| "[]".to_string());
            println!("{json}");
        }
    }

    if !global.quiet && args.format == ReportFormat::Text {
        eprintln!(
            "   Result: {} signal(s), {} node(s), {} error(s), {} warning(s)",
            graph.signals().len(),
            graph.nodes().len(),
            sink.error_count(),
            sink.count(Severity::Warning)
        );
    }

    Ok(if sink.has_errors() { 1 } else { 0 })
}

/// Merges `--allow`/`--deny` with the configuration's `[lint]` lists.
///
/// Command-line flags win: a rule named on the command line is removed from
/// the opposite configured list.
fn merge_lint_lists(
    config: Option<(&Vec<String>, &Vec<String>)>,
    args: &CheckArgs,
) -> (Vec<String>, Vec<String>) {
    let (mut allow, mut deny) = config
        .map(|(a, d)| (a.clone(), d.clone()))
        .unwrap_or_default();
    for rule in &args.deny {
        allow.retain(|r| r != rule);
        if !deny.contains(rule) {
            deny.push(rule.clone());
        }
    }
    for rule in &args.allow {
        deny.retain(|r| r != rule);
        if !allow.contains(rule) {
            allow.push(rule.clone());
        }
    }
    (allow, deny)
}

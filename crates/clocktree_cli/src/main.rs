//! Clocktree CLI: check clock-tree models, evaluate register states and
//! resolve target frequencies into register values.
//!
//! Provides `clocktree check` for model validation and lints, `clocktree eval`
//! for forward evaluation, and `clocktree resolve` for the inverse search.

#![warn(missing_docs)]

mod check;
mod eval;
mod pipeline;
mod report;
mod resolve;

use std::io::IsTerminal;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};

use pipeline::{parse_assignment, parse_target_arg, Assignment, TargetArg};

/// Clocktree: clock-tree register calculator.
#[derive(Parser, Debug)]
#[command(name = "clocktree", version, about = "Clock-tree register calculator")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Print search statistics and other detail.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Control colored output.
    #[arg(long, global = true, value_enum, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,

    /// Path to a custom `clocktree.toml` configuration file.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate a model and run the model lints.
    Check(CheckArgs),
    /// Compute every signal frequency for a register state.
    Eval(EvalArgs),
    /// Find register values that produce the requested frequencies.
    Resolve(ResolveArgs),
}

/// Arguments for the `clocktree check` subcommand.
#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Model file (JSON, or TOML by extension). Defaults to `project.model`.
    pub model: Option<String>,

    /// Rule names or codes to suppress (e.g., `--allow dead-mux`).
    #[arg(long, num_args = 1..)]
    pub allow: Vec<String>,

    /// Rule names or codes to promote to errors (e.g., `--deny W003`).
    #[arg(long, num_args = 1..)]
    pub deny: Vec<String>,

    /// Output format for diagnostics.
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

/// Arguments for the `clocktree eval` subcommand.
#[derive(Parser, Debug)]
pub struct EvalArgs {
    /// Model file. Defaults to `project.model`.
    pub model: Option<String>,

    /// JSON file mapping `REG.FIELD` to raw values.
    #[arg(long)]
    pub state: Option<String>,

    /// Field assignment `REG.FIELD=raw`, applied after `--state`.
    #[arg(long = "set", value_parser = parse_assignment)]
    pub set: Vec<Assignment>,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

/// Arguments for the `clocktree resolve` subcommand.
#[derive(Parser, Debug)]
pub struct ResolveArgs {
    /// Model file. Defaults to `project.model`.
    pub model: Option<String>,

    /// Target `SIGNAL=FREQ[±TOL]` (e.g., `usb_ck=48MHz±0.25%`).
    #[arg(short, long, value_parser = parse_target_arg)]
    pub target: Vec<TargetArg>,

    /// Fixed field value `REG.FIELD=raw` that the search must not change.
    #[arg(long, value_parser = parse_assignment)]
    pub pin: Vec<Assignment>,

    /// Profile to select from `clocktree.toml`.
    #[arg(short, long)]
    pub profile: Option<String>,

    /// Maximum number of evaluated assignments.
    #[arg(long)]
    pub budget: Option<u64>,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

/// Controls whether colored output is produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ColorChoice {
    /// Detect from terminal capabilities.
    Auto,
    /// Always produce colored output.
    Always,
    /// Never produce colored output.
    Never,
}

/// Command output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable terminal output.
    Text,
    /// Machine-readable JSON output.
    Json,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to print search statistics.
    pub verbose: bool,
    /// Whether to use colored output.
    pub color: bool,
    /// Optional path to a custom config file.
    pub config: Option<String>,
}

fn main() {
    let cli = Cli::parse();

    let color = match cli.color {
        ColorChoice::Auto => std::io::stderr().is_terminal(),
        ColorChoice::Always => true,
        ColorChoice::Never => false,
    };

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        color,
        config: cli.config,
    };

    let result = match cli.command {
        Command::Check(ref args) => check::run(args, &global),
        Command::Eval(ref args) => eval::run(args, &global),
        Command::Resolve(ref args) => resolve::run(args, &global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use clocktree_common::{Hz, Tolerance};

    #[test]
    fn parse_check_defaults() {
        let cli = Cli::parse_from(["clocktree", "check", "f4.json"]);
        match cli.command {
            Command::Check(args) => {
                assert_eq!(args.model.as_deref(), Some("f4.json"));
                assert!(args.allow.is_empty());
                assert_eq!(args.format, ReportFormat::Text);
            }
            _ => panic!("expected Check command"),
        }
        assert_eq!(cli.color, ColorChoice::Auto);
    }

    #[test]
    fn parse_check_lint_lists() {
        let cli = Cli::parse_from([
            "clocktree", "check", "--allow", "dead-mux", "W004", "--deny", "W003",
        ]);
        match cli.command {
            Command::Check(args) => {
                assert!(args.model.is_none());
                assert_eq!(args.allow, vec!["dead-mux", "W004"]);
                assert_eq!(args.deny, vec!["W003"]);
            }
            _ => panic!("expected Check command"),
        }
    }

    #[test]
    fn parse_eval_assignments() {
        let cli = Cli::parse_from([
            "clocktree",
            "eval",
            "f4.json",
            "--set",
            "RCC_PLLCFGR.PLLN=336",
            "--set",
            "RCC_CFGR.SW=0x2",
            "--format",
            "json",
        ]);
        match cli.command {
            Command::Eval(args) => {
                assert_eq!(args.set.len(), 2);
                assert_eq!(args.set[1].raw, 2);
                assert_eq!(args.format, ReportFormat::Json);
            }
            _ => panic!("expected Eval command"),
        }
    }

    #[test]
    fn parse_eval_rejects_bad_assignment() {
        assert!(Cli::try_parse_from(["clocktree", "eval", "--set", "PLLN"]).is_err());
    }

    #[test]
    fn parse_resolve_targets_and_pins() {
        let cli = Cli::parse_from([
            "clocktree",
            "-q",
            "resolve",
            "-t",
            "sys_ck=168MHz",
            "-t",
            "usb_ck=48MHz±0.25%",
            "--pin",
            "RCC_PLLCFGR.PLLM=4",
            "--budget",
            "5000",
            "--profile",
            "fast",
        ]);
        assert!(cli.quiet);
        match cli.command {
            Command::Resolve(args) => {
                assert_eq!(args.target.len(), 2);
                assert_eq!(args.target[0].request.frequency, Hz::mhz(168));
                assert_eq!(args.target[1].request.tolerance, Tolerance::Ppm(2_500));
                assert_eq!(args.pin[0].path, "RCC_PLLCFGR.PLLM");
                assert_eq!(args.budget, Some(5000));
                assert_eq!(args.profile.as_deref(), Some("fast"));
            }
            _ => panic!("expected Resolve command"),
        }
    }

    #[test]
    fn parse_global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "clocktree", "resolve", "--color", "never", "--config", "board/clocktree.toml",
        ]);
        assert_eq!(cli.color, ColorChoice::Never);
        assert_eq!(cli.config.as_deref(), Some("board/clocktree.toml"));
    }
}

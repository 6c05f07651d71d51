//! Shared pipeline helpers for CLI commands.
//!
//! Project discovery, model loading, command-line value parsers and
//! diagnostic output used by `check`, `eval` and `resolve`.

use std::path::{Path, PathBuf};

use clocktree_config::{ClocktreeConfig, TargetRequest, TargetSpec, CONFIG_FILE_NAME};
use clocktree_diagnostics::{Diagnostic, DiagnosticRenderer, Severity, TerminalRenderer};
use clocktree_model::{ClockTreeModel, Graph};

use crate::GlobalArgs;

/// A loaded `clocktree.toml` and the directory it was found in.
pub struct Project {
    /// Directory relative paths in the configuration resolve against.
    pub root: PathBuf,
    /// The parsed configuration.
    pub config: ClocktreeConfig,
}

/// A `REG.FIELD=raw` command-line assignment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Assignment {
    /// Field path.
    pub path: String,
    /// Raw value.
    pub raw: u64,
}

/// A `SIGNAL=FREQ[±TOL]` command-line target.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetArg {
    /// Signal name.
    pub signal: String,
    /// Parsed request.
    pub request: TargetRequest,
}

/// Walks up from `start` looking for the nearest directory containing
/// `clocktree.toml`.
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(CONFIG_FILE_NAME).exists() {
            return Some(current);
        }
        if !current.pop() {
            return None;
        }
    }
}

/// Loads the project configuration.
///
/// With `--config`, the given file (or directory) must hold a configuration.
/// Without it, the current directory and its parents are searched and a
/// missing configuration is not an error.
pub fn load_project(global: &GlobalArgs) -> Result<Option<Project>, Box<dyn std::error::Error>> {
    if let Some(ref config_path) = global.config {
        let p = PathBuf::from(config_path);
        let (root, config) = if p.is_dir() {
            (p.clone(), clocktree_config::load_config(&p)?)
        } else {
            let root = p
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            (root, clocktree_config::load_config_file(&p)?)
        };
        return Ok(Some(Project { root, config }));
    }
    match find_project_root(&std::env::current_dir()?) {
        Some(root) => {
            let config = clocktree_config::load_config(&root)?;
            Ok(Some(Project { root, config }))
        }
        None => Ok(None),
    }
}

/// Picks the model file: the command-line argument, else `project.model`
/// relative to the configuration.
pub fn model_path(
    arg: Option<&str>,
    project: Option<&Project>,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    if let Some(arg) = arg {
        return Ok(PathBuf::from(arg));
    }
    project
        .and_then(|p| p.config.project.model.as_ref().map(|m| p.root.join(m)))
        .ok_or_else(|| "no model given and no `project.model` in clocktree.toml".into())
}

/// Reads a clock-tree model, choosing the format by extension (`.toml`,
/// anything else as JSON).
pub fn read_model(path: &Path) -> Result<ClockTreeModel, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read model {}: {e}", path.display()))?;
    let model = match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => toml::from_str(&content)
            .map_err(|e| format!("failed to parse model {}: {e}", path.display()))?,
        _ => serde_json::from_str(&content)
            .map_err(|e| format!("failed to parse model {}: {e}", path.display()))?,
    };
    Ok(model)
}

/// Reads and validates a model. Schema problems are rendered and returned
/// as `Ok(Err(exit_code))`.
pub fn load_graph(
    path: &Path,
    global: &GlobalArgs,
) -> Result<Result<Graph, i32>, Box<dyn std::error::Error>> {
    let model = read_model(path)?;
    match Graph::load(&model) {
        Ok(graph) => Ok(Ok(graph)),
        Err(e) => {
            render_diagnostics(&[e.to_diagnostic()], global);
            Ok(Err(1))
        }
    }
}

/// Parses `REG.FIELD=raw`; raw may be decimal, `0x` hex or `0b` binary.
pub fn parse_assignment(s: &str) -> Result<Assignment, String> {
    let (path, raw) = s
        .split_once('=')
        .ok_or_else(|| format!("expected REG.FIELD=value, got '{s}'"))?;
    let raw = raw.trim().replace('_', "");
    let parsed = if let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16)
    } else if let Some(bin) = raw.strip_prefix("0b").or_else(|| raw.strip_prefix("0B")) {
        u64::from_str_radix(bin, 2)
    } else {
        raw.parse()
    };
    let raw = parsed.map_err(|_| format!("invalid raw value in '{s}'"))?;
    Ok(Assignment {
        path: path.trim().to_string(),
        raw,
    })
}

/// Parses `SIGNAL=FREQ`, optionally followed by `±TOL` or `+-TOL`.
pub fn parse_target_arg(s: &str) -> Result<TargetArg, String> {
    let (signal, rest) = s
        .split_once('=')
        .ok_or_else(|| format!("expected SIGNAL=FREQ[±TOL], got '{s}'"))?;
    let (frequency, tolerance) = match rest.split_once('±').or_else(|| rest.split_once("+-")) {
        Some((f, t)) => (f.trim(), Some(t.trim().to_string())),
        None => (rest.trim(), None),
    };
    let spec = TargetSpec::Detailed {
        frequency: frequency.to_string(),
        tolerance,
    };
    let signal = signal.trim().to_string();
    let request =
        clocktree_config::parse_target(&signal, &spec, None).map_err(|e| e.to_string())?;
    Ok(TargetArg { signal, request })
}

/// Renders diagnostics to stderr; notes are dropped under `--quiet`.
pub fn render_diagnostics(diags: &[Diagnostic], global: &GlobalArgs) {
    let renderer = TerminalRenderer::new(global.color);
    for diag in diags {
        if global.quiet && diag.severity == Severity::Note {
            continue;
        }
        eprintln!("{}", renderer.render(diag));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clocktree_common::{Hz, Tolerance};

    #[test]
    fn assignment_forms() {
        assert_eq!(
            parse_assignment("RCC_PLLCFGR.PLLN=336").unwrap(),
            Assignment {
                path: "RCC_PLLCFGR.PLLN".into(),
                raw: 336
            }
        );
        assert_eq!(parse_assignment("R.F=0x1f").unwrap().raw, 31);
        assert_eq!(parse_assignment("R.F=0b101").unwrap().raw, 5);
        assert!(parse_assignment("R.F").is_err());
        assert!(parse_assignment("R.F=x").is_err());
    }

    #[test]
    fn target_forms() {
        let t = parse_target_arg("sys_ck=168MHz").unwrap();
        assert_eq!(t.signal, "sys_ck");
        assert_eq!(t.request.frequency, Hz::mhz(168));
        assert_eq!(t.request.tolerance, Tolerance::EXACT);

        let t = parse_target_arg("usb_ck=48MHz±0.25%").unwrap();
        assert_eq!(t.request.tolerance, Tolerance::Ppm(2_500));

        let t = parse_target_arg("usb_ck=48MHz+-120kHz").unwrap();
        assert_eq!(t.request.tolerance, Tolerance::Absolute(Hz::khz(120)));

        assert!(parse_target_arg("usb_ck=fast").is_err());
    }

    #[test]
    fn finds_project_root_upwards() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "[project]\nname = \"x\"\n").unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        assert_eq!(find_project_root(&nested), Some(dir.path().to_path_buf()));
    }

    #[test]
    fn model_format_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let toml_path = dir.path().join("m.toml");
        std::fs::write(
            &toml_path,
            "[[sources]]\nname = \"HSI\"\noutput = \"hsi_ck\"\nfrequencies = [16000000]\n",
        )
        .unwrap();
        let json_path = dir.path().join("m.json");
        std::fs::write(
            &json_path,
            r#"{"sources": [{"name": "HSI", "output": "hsi_ck", "frequencies": [16000000]}]}"#,
        )
        .unwrap();
        let a = Graph::load(&read_model(&toml_path).unwrap()).unwrap();
        let b = Graph::load(&read_model(&json_path).unwrap()).unwrap();
        assert_eq!(a.signals().len(), b.signals().len());
    }

    #[test]
    fn model_path_from_config() {
        let config = clocktree_config::load_config_from_str(
            "[project]\nname = \"x\"\nmodel = \"models/f4.json\"\n",
        )
        .unwrap();
        let project = Project {
            root: PathBuf::from("/proj"),
            config,
        };
        assert_eq!(
            model_path(None, Some(&project)).unwrap(),
            PathBuf::from("/proj/models/f4.json")
        );
        assert_eq!(
            model_path(Some("other.json"), Some(&project)).unwrap(),
            PathBuf::from("other.json")
        );
        assert!(model_path(None, None).is_err());
    }
}

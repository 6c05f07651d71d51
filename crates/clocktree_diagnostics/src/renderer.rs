//! Diagnostic rendering for terminal output.

use crate::diagnostic::Diagnostic;

/// Trait for rendering diagnostics into formatted output strings.
pub trait DiagnosticRenderer {
    /// Renders a single diagnostic into a formatted string.
    fn render(&self, diag: &Diagnostic) -> String;
}

/// Renders diagnostics in a rustc-style terminal format.
///
/// Produces output like:
/// ```text
/// error[L002]: VCO frequency 16MHz is below the minimum of 192MHz
///   --> pll pll1
///    = note: feedback N = 8
///    = help: ...
/// ```
pub struct TerminalRenderer {
    /// Whether to use ANSI color codes in output.
    pub color: bool,
}

impl TerminalRenderer {
    /// Creates a new terminal renderer.
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    fn paint(&self, sgr: &str, text: &str) -> String {
        if self.color {
            format!("\x1b[{sgr}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }
}

impl DiagnosticRenderer for TerminalRenderer {
    fn render(&self, diag: &Diagnostic) -> String {
        let mut out = String::new();

        let header = format!("{}[{}]", diag.severity, diag.code);
        let header = self.paint(&format!("1;{}", diag.severity.ansi_color()), &header);
        out.push_str(&format!("{header}: {}\n", diag.message));

        if let Some(subject) = &diag.subject {
            out.push_str(&format!("  {} {subject}\n", self.paint("34", "-->")));
        }

        for note in &diag.notes {
            out.push_str(&format!("   = note: {note}\n"));
        }

        for help in &diag.help {
            out.push_str(&format!("   = help: {help}\n"));
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::{Category, DiagnosticCode};

    #[test]
    fn render_error_with_subject() {
        let diag = Diagnostic::error(
            DiagnosticCode::new(Category::Limit, 2),
            "VCO frequency 16MHz is below the minimum of 192MHz",
        )
        .with_subject("pll pll1");

        let output = TerminalRenderer::new(false).render(&diag);
        assert!(output.starts_with("error[L002]: VCO frequency 16MHz"));
        assert!(output.contains("  --> pll pll1\n"));
    }

    #[test]
    fn render_warning_with_notes() {
        let diag = Diagnostic::warning(DiagnosticCode::new(Category::Lint, 101), "orphan signal")
            .with_note("signal 'lse_ck' is neither produced nor consumed")
            .with_help("remove it from the model");

        let output = TerminalRenderer::new(false).render(&diag);
        assert!(output.contains("warning[W101]: orphan signal"));
        assert!(output.contains("= note: signal 'lse_ck' is neither produced nor consumed"));
        assert!(output.contains("= help: remove it from the model"));
    }

    #[test]
    fn render_without_subject() {
        let diag = Diagnostic::error(DiagnosticCode::new(Category::Config, 1), "bad config");
        let output = TerminalRenderer::new(false).render(&diag);
        assert!(!output.contains("-->"));
    }

    #[test]
    fn color_wraps_header() {
        let diag = Diagnostic::error(DiagnosticCode::new(Category::Schema, 1), "cycle");
        let output = TerminalRenderer::new(true).render(&diag);
        assert!(output.starts_with("\x1b[1;31merror[S001]\x1b[0m: cycle"));
    }
}

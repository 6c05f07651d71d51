//! Error types for configuration loading and validation.

use clocktree_common::{ParseFrequencyError, ParseToleranceError};
use clocktree_diagnostics::{Category, Diagnostic, DiagnosticCode};

/// Errors that can occur when loading or validating a `clocktree.toml`.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An I/O error occurred while reading the configuration file.
    #[error("failed to read configuration: {0}")]
    IoError(#[from] std::io::Error),

    /// The TOML content could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    /// A referenced profile does not exist in the configuration.
    #[error("unknown profile '{0}'")]
    UnknownProfile(String),

    /// A required field is missing from the configuration.
    #[error("missing required field: {0}")]
    MissingField(String),

    /// A target frequency could not be parsed.
    #[error("target '{signal}': {source}")]
    InvalidFrequency {
        /// Target signal.
        signal: String,
        /// Parse failure.
        source: ParseFrequencyError,
    },

    /// A tolerance could not be parsed.
    #[error("{context}: {source}")]
    InvalidTolerance {
        /// Where the tolerance was written.
        context: String,
        /// Parse failure.
        source: ParseToleranceError,
    },

    /// A configuration value failed validation.
    #[error("validation error: {0}")]
    ValidationError(String),
}

impl ConfigError {
    /// The `C`-category code for this error.
    pub fn code(&self) -> DiagnosticCode {
        let number = match self {
            ConfigError::IoError(_) => 1,
            ConfigError::ParseError(_) => 2,
            ConfigError::UnknownProfile(_) => 3,
            ConfigError::MissingField(_) => 4,
            ConfigError::InvalidFrequency { .. } => 5,
            ConfigError::InvalidTolerance { .. } => 6,
            ConfigError::ValidationError(_) => 7,
        };
        DiagnosticCode::new(Category::Config, number)
    }

    /// Converts the error into an error diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let diag = Diagnostic::error(self.code(), self.to_string());
        match self {
            ConfigError::InvalidFrequency { .. } => {
                diag.with_help("write frequencies as integer Hz or with a Hz, kHz, MHz or GHz suffix")
            }
            ConfigError::InvalidTolerance { .. } => {
                diag.with_help("write tolerances as a frequency (\"120kHz\"), a percentage or ppm")
            }
            _ => diag,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_unknown_profile() {
        let err = ConfigError::UnknownProfile("lowpower".to_string());
        assert_eq!(format!("{err}"), "unknown profile 'lowpower'");
    }

    #[test]
    fn display_missing_field() {
        let err = ConfigError::MissingField("project.name".to_string());
        assert_eq!(format!("{err}"), "missing required field: project.name");
    }

    #[test]
    fn display_invalid_frequency() {
        let err = ConfigError::InvalidFrequency {
            signal: "sys_ck".to_string(),
            source: "fast".parse::<clocktree_common::Hz>().unwrap_err(),
        };
        assert_eq!(format!("{err}"), "target 'sys_ck': invalid frequency: 'fast'");
    }

    #[test]
    fn display_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = ConfigError::IoError(io_err);
        assert!(format!("{err}").starts_with("failed to read configuration:"));
    }

    #[test]
    fn diagnostic_codes() {
        let err = ConfigError::ParseError("bad".into());
        let diag = err.to_diagnostic();
        assert_eq!(diag.code.to_string(), "C002");
        assert!(diag.severity.is_error());
    }
}

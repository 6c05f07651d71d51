//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::resolve::parse_target;
use crate::types::ClocktreeConfig;
use std::path::Path;

/// File name looked up in a project directory.
pub const CONFIG_FILE_NAME: &str = "clocktree.toml";

/// Loads and validates `<project_dir>/clocktree.toml`.
pub fn load_config(project_dir: &Path) -> Result<ClocktreeConfig, ConfigError> {
    load_config_file(&project_dir.join(CONFIG_FILE_NAME))
}

/// Loads and validates a configuration file at an explicit path.
pub fn load_config_file(path: &Path) -> Result<ClocktreeConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    load_config_from_str(&content)
}

/// Parses and validates a `clocktree.toml` configuration from a string.
///
/// Useful for testing without filesystem dependencies.
pub fn load_config_from_str(content: &str) -> Result<ClocktreeConfig, ConfigError> {
    let config: ClocktreeConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Checks required fields and parses every frequency and tolerance once so
/// that mistakes surface at load time rather than at resolve time.
fn validate_config(config: &ClocktreeConfig) -> Result<(), ConfigError> {
    if config.project.name.is_empty() {
        return Err(ConfigError::MissingField("project.name".to_string()));
    }
    if config.resolver.step_budget == 0 {
        return Err(ConfigError::ValidationError(
            "resolver.step_budget must be at least 1".to_string(),
        ));
    }
    let default_tolerance = config.resolver.default_tolerance.as_deref();
    if let Some(text) = default_tolerance {
        text.parse::<clocktree_common::Tolerance>()
            .map_err(|source| ConfigError::InvalidTolerance {
                context: "resolver.default_tolerance".to_string(),
                source,
            })?;
    }
    check_pins("pins", config.pins.keys())?;
    for (signal, spec) in &config.targets {
        parse_target(signal, spec, default_tolerance)?;
    }
    for (name, profile) in &config.profiles {
        if profile.step_budget == Some(0) {
            return Err(ConfigError::ValidationError(format!(
                "profiles.{name}.step_budget must be at least 1"
            )));
        }
        check_pins(&format!("profiles.{name}.pins"), profile.pins.keys())?;
        for (signal, spec) in &profile.targets {
            parse_target(signal, spec, default_tolerance)?;
        }
    }
    Ok(())
}

fn check_pins<'a>(table: &str, keys: impl Iterator<Item = &'a String>) -> Result<(), ConfigError> {
    for key in keys {
        match key.rsplit_once('.') {
            Some((reg, field)) if !reg.is_empty() && !field.is_empty() => {}
            _ => {
                return Err(ConfigError::ValidationError(format!(
                    "{table}: '{key}' is not of the form REG.FIELD"
                )))
            }
        }
    }
    Ok(())
}

//! Profile resolution: merging global and profile-specific settings.

use crate::error::ConfigError;
use crate::types::{ClocktreeConfig, TargetSpec};
use clocktree_common::{Hz, Tolerance};
use std::collections::BTreeMap;

/// A parsed frequency request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetRequest {
    /// Requested frequency.
    pub frequency: Hz,
    /// Acceptance window.
    pub tolerance: Tolerance,
}

/// Global settings with one profile applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedProfile {
    /// The profile name, `None` for the global settings alone.
    pub name: Option<String>,
    /// Merged pins (global base + profile overlay).
    pub pins: BTreeMap<String, u64>,
    /// Merged targets with frequencies and tolerances parsed.
    pub targets: BTreeMap<String, TargetRequest>,
    /// Effective step budget.
    pub step_budget: u64,
}

/// Resolves the global settings, overlaid with profile `name` when given.
///
/// Pins and targets are merged key by key; a profile entry replaces the
/// global entry of the same name. A profile's step budget replaces the
/// global one.
pub fn resolve_profile(
    config: &ClocktreeConfig,
    name: Option<&str>,
) -> Result<ResolvedProfile, ConfigError> {
    let profile = match name {
        Some(name) => Some(
            config
                .profiles
                .get(name)
                .ok_or_else(|| ConfigError::UnknownProfile(name.to_string()))?,
        ),
        None => None,
    };

    let mut pins = config.pins.clone();
    let mut specs: BTreeMap<&String, &TargetSpec> = config.targets.iter().collect();
    if let Some(profile) = profile {
        pins.extend(profile.pins.iter().map(|(k, v)| (k.clone(), *v)));
        specs.extend(profile.targets.iter());
    }

    let default_tolerance = config.resolver.default_tolerance.as_deref();
    let targets = specs
        .into_iter()
        .map(|(signal, spec)| Ok((signal.clone(), parse_target(signal, spec, default_tolerance)?)))
        .collect::<Result<_, ConfigError>>()?;

    Ok(ResolvedProfile {
        name: name.map(str::to_string),
        pins,
        targets,
        step_budget: profile
            .and_then(|p| p.step_budget)
            .unwrap_or(config.resolver.step_budget),
    })
}

/// Parses one target entry. The entry's own tolerance wins over
/// `default_tolerance`, which in turn wins over an exact match.
pub fn parse_target(
    signal: &str,
    spec: &TargetSpec,
    default_tolerance: Option<&str>,
) -> Result<TargetRequest, ConfigError> {
    let frequency = spec
        .frequency()
        .parse::<Hz>()
        .map_err(|source| ConfigError::InvalidFrequency {
            signal: signal.to_string(),
            source,
        })?;
    let tolerance = match spec.tolerance().or(default_tolerance) {
        Some(text) => text
            .parse::<Tolerance>()
            .map_err(|source| ConfigError::InvalidTolerance {
                context: format!("target '{signal}'"),
                source,
            })?,
        None => Tolerance::EXACT,
    };
    Ok(TargetRequest {
        frequency,
        tolerance,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_config_from_str;

    const CONFIG: &str = r#"
[project]
name = "f4"

[resolver]
step_budget = 5000
default_tolerance = "100ppm"

[pins]
"RCC_PLLCFGR.PLLSRC" = 1
"RCC_CFGR.HPRE" = 0

[targets]
sys_ck = "168MHz"
usb_ck = { frequency = "48MHz", tolerance = "0.25%" }

[profiles.lowpower]
step_budget = 200
pins = { "RCC_CFGR.HPRE" = 8 }
targets = { sys_ck = { frequency = "16MHz", tolerance = "0Hz" } }

[profiles.plain]
"#;

    #[test]
    fn globals_only() {
        let config = load_config_from_str(CONFIG).unwrap();
        let resolved = resolve_profile(&config, None).unwrap();
        assert_eq!(resolved.name, None);
        assert_eq!(resolved.step_budget, 5000);
        assert_eq!(
            resolved.targets["sys_ck"],
            TargetRequest {
                frequency: Hz::mhz(168),
                tolerance: Tolerance::Ppm(100),
            }
        );
        assert_eq!(resolved.targets["usb_ck"].tolerance, Tolerance::Ppm(2_500));
    }

    #[test]
    fn profile_overrides() {
        let config = load_config_from_str(CONFIG).unwrap();
        let resolved = resolve_profile(&config, Some("lowpower")).unwrap();
        assert_eq!(resolved.name.as_deref(), Some("lowpower"));
        assert_eq!(resolved.step_budget, 200);
        assert_eq!(resolved.pins["RCC_CFGR.HPRE"], 8);
        assert_eq!(resolved.pins["RCC_PLLCFGR.PLLSRC"], 1);
        assert_eq!(resolved.targets["sys_ck"].frequency, Hz::mhz(16));
        assert_eq!(resolved.targets["sys_ck"].tolerance, Tolerance::EXACT);
        // untouched global targets survive
        assert_eq!(resolved.targets["usb_ck"].frequency, Hz::mhz(48));
    }

    #[test]
    fn empty_profile_keeps_globals() {
        let config = load_config_from_str(CONFIG).unwrap();
        let plain = resolve_profile(&config, Some("plain")).unwrap();
        let global = resolve_profile(&config, None).unwrap();
        assert_eq!(plain.pins, global.pins);
        assert_eq!(plain.targets, global.targets);
        assert_eq!(plain.step_budget, 5000);
    }

    #[test]
    fn unknown_profile_errors() {
        let config = load_config_from_str(CONFIG).unwrap();
        let err = resolve_profile(&config, Some("turbo")).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownProfile(ref n) if n == "turbo"));
    }

    #[test]
    fn bad_tolerance() {
        let spec = TargetSpec::Detailed {
            frequency: "48MHz".into(),
            tolerance: Some("loose".into()),
        };
        let err = parse_target("usb_ck", &spec, None).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTolerance { .. }));
    }
}

//! Configuration types deserialized from `clocktree.toml`.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;

/// Step budget used when `[resolver]` does not set one.
pub const DEFAULT_STEP_BUDGET: u64 = 100_000;

/// The top-level project configuration parsed from `clocktree.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClocktreeConfig {
    /// Project metadata and the clock-tree model to load.
    pub project: ProjectMeta,
    /// Search settings.
    #[serde(default)]
    pub resolver: ResolverConfig,
    /// Register fields fixed for every profile, `"REG.FIELD" = raw`.
    #[serde(default)]
    pub pins: BTreeMap<String, u64>,
    /// Requested signal frequencies shared by every profile.
    #[serde(default)]
    pub targets: BTreeMap<String, TargetSpec>,
    /// Named overlays of pins and targets.
    #[serde(default)]
    pub profiles: BTreeMap<String, ProfileConfig>,
    /// Model lint settings.
    #[serde(default)]
    pub lint: LintConfig,
}

/// Core project metadata.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectMeta {
    /// The project name.
    pub name: String,
    /// A brief description of the project.
    #[serde(default)]
    pub description: String,
    /// Path to the clock-tree model (`.json` or `.toml`), relative to the
    /// configuration file.
    #[serde(default)]
    pub model: Option<String>,
}

/// Resolver settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResolverConfig {
    /// Maximum number of evaluated assignments per resolution.
    #[serde(default = "default_step_budget")]
    pub step_budget: u64,
    /// Tolerance applied to targets that give none, e.g. `"0Hz"`, `"50ppm"`.
    #[serde(default)]
    pub default_tolerance: Option<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            step_budget: DEFAULT_STEP_BUDGET,
            default_tolerance: None,
        }
    }
}

fn default_step_budget() -> u64 {
    DEFAULT_STEP_BUDGET
}

/// A requested frequency for one signal.
///
/// Written either as a bare frequency (`sys_ck = "168MHz"` or
/// `sys_ck = 168000000`) or as a table with an explicit tolerance
/// (`usb_ck = { frequency = "48MHz", tolerance = "0.25%" }`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum TargetSpec {
    /// Frequency only; the default tolerance applies.
    Frequency(#[serde(deserialize_with = "deserialize_frequency_text")] String),
    /// Frequency with its own tolerance.
    Detailed {
        /// Requested frequency.
        #[serde(deserialize_with = "deserialize_frequency_text")]
        frequency: String,
        /// Acceptance window.
        #[serde(default)]
        tolerance: Option<String>,
    },
}

impl TargetSpec {
    /// The frequency text.
    pub fn frequency(&self) -> &str {
        match self {
            TargetSpec::Frequency(f) | TargetSpec::Detailed { frequency: f, .. } => f,
        }
    }

    /// The tolerance text, if given.
    pub fn tolerance(&self) -> Option<&str> {
        match self {
            TargetSpec::Frequency(_) => None,
            TargetSpec::Detailed { tolerance, .. } => tolerance.as_deref(),
        }
    }
}

/// Deserializes a frequency written as a string (`"48MHz"`) or as a bare
/// integer number of Hz (`48000000`).
fn deserialize_frequency_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    struct FrequencyText;

    impl<'de> Visitor<'de> for FrequencyText {
        type Value = String;

        fn expecting(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            formatter.write_str("a frequency string or an integer number of Hz")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            Ok(v.to_string())
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
            Ok(v.to_string())
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
            u64::try_from(v)
                .map(|v| v.to_string())
                .map_err(|_| E::custom("frequency must not be negative"))
        }
    }

    deserializer.deserialize_any(FrequencyText)
}

/// A named overlay on the global settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileConfig {
    /// What the profile is for.
    #[serde(default)]
    pub description: String,
    /// Pins added to, or overriding, the global pins.
    #[serde(default)]
    pub pins: BTreeMap<String, u64>,
    /// Targets added to, or overriding, the global targets.
    #[serde(default)]
    pub targets: BTreeMap<String, TargetSpec>,
    /// Overrides `[resolver] step_budget`.
    #[serde(default)]
    pub step_budget: Option<u64>,
}

/// Lint configuration controlling which model checks run and how strictly.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LintConfig {
    /// Rule names or codes to treat as errors.
    #[serde(default)]
    pub deny: Vec<String>,
    /// Rule names or codes to suppress.
    #[serde(default)]
    pub allow: Vec<String>,
}

//! Parsing and validation of `clocktree.toml` project configuration files.
//!
//! This crate reads the project configuration file and produces a strongly-typed
//! [`ClocktreeConfig`]. [`resolve_profile`] merges the global pins and targets
//! with a named profile into a [`ResolvedProfile`] with parsed frequencies and
//! tolerances, ready to hand to the resolver.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod resolve;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_file, load_config_from_str, CONFIG_FILE_NAME};
pub use resolve::{parse_target, resolve_profile, ResolvedProfile, TargetRequest};
pub use types::*;

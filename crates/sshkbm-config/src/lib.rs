//! Configuration parsing for sshkbm
//!
//! This crate handles parsing the KDL configuration file shared by the
//! `sshkbmd` daemon and the `sshkbm` CLI.

mod error;
mod model;
mod parser;

pub use error::{ConfigError, SourceLocation};
pub use model::*;
pub use parser::{parse_config, parse_config_str};

/// Default configuration file location (before tilde expansion)
pub const DEFAULT_CONFIG_PATH: &str = "~/.config/sshkbm/config.kdl";

//! Optional YAML configuration, named by the `PTX_CONFIG` environment
//! variable.
//!
//! ```yaml
//! defaults:
//!   output: table
//!   limit: 100
//! aliases:
//!   errors: 'status >= 500 group by path count sort by count desc'
//! regex:
//!   pattern: '^(?P<level>\w+) (?P<msg>.*)$'
//!   timestamp_field: ts
//!   types:
//!     code: int
//! aws:
//!   profile: default
//!   region: eu-west-1
//! gcp:
//!   project: my-project
//! kubernetes:
//!   namespace: prod
//! ```
//!
//! The `aws` / `gcp` / `kubernetes` sections configure the remote source
//! collaborators; they are parsed and retained but bind nothing in-core.

use std::collections::HashMap;
use std::env;
use std::fs;

use serde::Deserialize;

use crate::error::{CliError, Result};

pub const CONFIG_ENV: &str = "PTX_CONFIG";

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub defaults: Defaults,
    /// Named query shorthands, referenced as `@name` on the command line.
    #[serde(default)]
    pub aliases: HashMap<String, String>,
    /// A user-defined regex format, registered behind the built-in parsers.
    #[serde(default)]
    pub regex: Option<RegexFormat>,
    #[serde(default)]
    pub aws: Aws,
    #[serde(default)]
    pub gcp: Gcp,
    #[serde(default)]
    pub kubernetes: Kubernetes,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Defaults {
    pub output: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegexFormat {
    pub pattern: String,
    pub timestamp_field: Option<String>,
    pub timestamp_format: Option<String>,
    /// Field name to coercion: `int | float | bool | lower | upper`.
    #[serde(default)]
    pub types: HashMap<String, String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Aws {
    pub profile: Option<String>,
    pub region: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Gcp {
    pub project: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Kubernetes {
    pub namespace: Option<String>,
}

impl Config {
    /// Load the config file named by `PTX_CONFIG`, or defaults when unset.
    pub fn load() -> Result<Config> {
        match env::var_os(CONFIG_ENV) {
            None => Ok(Config::default()),
            Some(path) => {
                let text = fs::read_to_string(&path).map_err(|e| {
                    CliError::Config(format!("cannot read {}: {e}", path.to_string_lossy()))
                })?;
                Config::from_yaml(&text)
            }
        }
    }

    pub fn from_yaml(text: &str) -> Result<Config> {
        serde_yaml::from_str(text).map_err(|e| CliError::Config(e.to_string()))
    }

    /// Expand `@name` into the aliased query string; anything else passes
    /// through untouched.
    pub fn resolve_alias<'a>(&'a self, query: &'a str) -> Result<&'a str> {
        match query.strip_prefix('@') {
            None => Ok(query),
            Some(name) => self
                .aliases
                .get(name)
                .map(String::as_str)
                .ok_or_else(|| CliError::Config(format!("unknown alias '@{name}'"))),
        }
    }
}

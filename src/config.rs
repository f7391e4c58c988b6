//! Materialization settings
//!
//! Applications can load these from `config/config.toml` (section
//! `[materialize]`) or from environment variables such as
//! `LIFELINE__MATERIALIZE__EDGE_POLICY=append` using `MaterializeConfig::load()`.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

const CONFIG_FILE: &str = "config/config.toml";

/// What to do when the same child is bound to the same owner's collection twice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgePolicy {
    /// Append a canonical child to a canonical owner at most once per query
    #[default]
    Distinct,
    /// Append on every bind, even if the child is already in the collection
    Append,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MaterializeConfig {
    #[serde(default)]
    pub edge_policy: EdgePolicy,
    /// Trace-log every pair of lanes that share no relationship
    #[serde(default)]
    pub log_skipped_binds: bool,
}

impl MaterializeConfig {
    /// Load the materialization configuration from `config/config.toml`, falling back to env vars.
    ///
    /// A missing `[materialize]` section yields the defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(Environment::with_prefix("LIFELINE").separator("__"));

        let settings = match builder.build() {
            Ok(cfg) => cfg,
            Err(err) => {
                // File exists but is unreadable: warn and retry with env only
                if std::path::Path::new(CONFIG_FILE).exists() {
                    log::warn!("failed to load {CONFIG_FILE}, falling back to env: {err}");
                }
                Config::builder()
                    .add_source(Environment::with_prefix("LIFELINE").separator("__"))
                    .build()
                    .map_err(|env_err| {
                        ConfigError::Message(format!(
                            "Failed to load configuration from file and env: {err}, then env-only error: {env_err}"
                        ))
                    })?
            }
        };

        Self::from_config(&settings)
    }

    /// Extract the `[materialize]` section from an already built `Config`
    pub fn from_config(settings: &Config) -> Result<Self, ConfigError> {
        match settings.get::<MaterializeConfig>("materialize") {
            Ok(cfg) => Ok(cfg),
            Err(ConfigError::NotFound(_)) => Ok(Self::default()),
            Err(e) => Err(ConfigError::Message(format!(
                "Materialize configuration could not be loaded from file or environment: {e}"
            ))),
        }
    }

    pub fn with_edge_policy(mut self, edge_policy: EdgePolicy) -> Self {
        self.edge_policy = edge_policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn from_toml(toml: &str) -> Result<MaterializeConfig, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?;
        MaterializeConfig::from_config(&settings)
    }

    #[test]
    fn test_defaults() {
        let cfg = MaterializeConfig::default();
        assert_eq!(cfg.edge_policy, EdgePolicy::Distinct);
        assert!(!cfg.log_skipped_binds);
    }

    #[test]
    fn test_missing_section_uses_defaults() {
        let cfg = from_toml("[database]\nurl = \"postgres://localhost\"\n").unwrap();
        assert_eq!(cfg.edge_policy, EdgePolicy::Distinct);
    }

    #[test]
    fn test_parse_append_policy() {
        let cfg = from_toml("[materialize]\nedge_policy = \"append\"\nlog_skipped_binds = true\n")
            .unwrap();
        assert_eq!(cfg.edge_policy, EdgePolicy::Append);
        assert!(cfg.log_skipped_binds);
    }

    #[test]
    fn test_partial_section_fills_defaults() {
        let cfg = from_toml("[materialize]\nlog_skipped_binds = true\n").unwrap();
        assert_eq!(cfg.edge_policy, EdgePolicy::Distinct);
    }

    #[test]
    fn test_invalid_policy_is_error() {
        let err = from_toml("[materialize]\nedge_policy = \"sometimes\"\n").unwrap_err();
        assert!(err.to_string().contains("Materialize configuration"));
    }

    #[test]
    fn test_with_edge_policy() {
        let cfg = MaterializeConfig::default().with_edge_policy(EdgePolicy::Append);
        assert_eq!(cfg.edge_policy, EdgePolicy::Append);
    }
}

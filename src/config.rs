//! Runtime configuration for the replay binary.
//!
//! Layered, later sources win:
//!
//! - built-in defaults
//! - `binlob.toml` in the working directory, if present
//! - the file passed with `--config`
//! - `BINLOB_*` environment variables (e.g. `BINLOB_DEPTH=10`)

use std::path::Path;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AppConfig {
    /// Default `tracing` filter; `RUST_LOG` still takes precedence.
    pub log_filter: String,
    /// Levels per side printed after a replay.
    pub depth: usize,
    /// Bound on queued commands for the book task.
    pub channel_capacity: usize,
    /// Fail on the first update that does not apply cleanly.
    pub strict: bool,
    /// Port for the Prometheus exporter (`metrics-exporter` feature).
    pub metrics_port: u16,
}

const ENV_PREFIX: &str = "BINLOB";

impl AppConfig {
    /// Full layering: defaults, `binlob.toml`, `path`, then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Self::defaults()?.add_source(File::with_name("binlob").required(false));
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        Self::build(builder.add_source(Self::environment()))
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("log_filter", "info")?
            .set_default("depth", 5_i64)?
            .set_default("channel_capacity", 1024_i64)?
            .set_default("strict", false)?
            .set_default("metrics_port", 9000_i64)
    }

    fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX).try_parsing(true)
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let cfg: AppConfig = builder.build()?.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.depth == 0 {
            return Err(ConfigError::Message("depth must be at least 1".into()));
        }
        if self.channel_capacity == 0 {
            return Err(ConfigError::Message("channel_capacity must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{FileFormat, Map};

    // Tests layer explicit sources only, never the process environment or cwd.
    fn from_toml(text: &str) -> Result<AppConfig, ConfigError> {
        AppConfig::build(AppConfig::defaults()?.add_source(File::from_str(text, FileFormat::Toml)))
    }

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::build(AppConfig::defaults().unwrap()).unwrap();
        assert_eq!(cfg.log_filter, "info");
        assert_eq!(cfg.depth, 5);
        assert_eq!(cfg.channel_capacity, 1024);
        assert!(!cfg.strict);
        assert_eq!(cfg.metrics_port, 9000);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let cfg = from_toml("depth = 12\nstrict = true\n").unwrap();
        assert_eq!(cfg.depth, 12);
        assert!(cfg.strict);
        assert_eq!(cfg.channel_capacity, 1024);
    }

    #[test]
    fn test_zero_depth_rejected() {
        let err = from_toml("depth = 0\n").unwrap_err();
        assert!(err.to_string().contains("depth"));
    }

    #[test]
    fn test_environment_overrides_file() {
        let vars: Map<String, String> = [
            ("BINLOB_DEPTH".to_string(), "3".to_string()),
            ("BINLOB_STRICT".to_string(), "true".to_string()),
        ]
        .into_iter()
        .collect();

        let builder = AppConfig::defaults()
            .unwrap()
            .add_source(File::from_str("depth = 12\n", FileFormat::Toml))
            .add_source(AppConfig::environment().source(Some(vars)));
        let cfg = AppConfig::build(builder).unwrap();

        assert_eq!(cfg.depth, 3);
        assert!(cfg.strict);
    }
}

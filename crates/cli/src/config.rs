//! Server configuration.
//!
//! Settings come from three layers, lowest precedence first: an optional
//! TOML file, `TESTDECK_*` environment variables, then command-line flags
//! (applied by `main`).
//!
//! # Example
//!
//! ```toml
//! seed = "fixtures/demo.json"
//!
//! [server]
//! host = "127.0.0.1"
//! port = 9000
//! max_body_bytes = 262144
//!
//! [log]
//! format = "json"
//! filter = "testdeck_engine=debug,info"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::logging::LogFormat;

pub(crate) const ENV_PORT: &str = "TESTDECK_PORT";
pub(crate) const ENV_LOG: &str = "TESTDECK_LOG";

#[derive(Debug, thiserror::Error)]
pub(crate) enum ConfigError {
    #[error("could not read '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid {var} value '{value}': expected a port number")]
    Env { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct Config {
    pub(crate) server: ServerConfig,
    pub(crate) log: LogConfig,
    /// JSON seed file loaded into storage at startup.
    pub(crate) seed: Option<PathBuf>,
}

/// `[server]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct ServerConfig {
    pub(crate) host: String,
    pub(crate) port: u16,
    pub(crate) max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_body_bytes: 1024 * 1024,
        }
    }
}

impl ServerConfig {
    pub(crate) fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// `[log]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct LogConfig {
    pub(crate) format: LogFormat,
    /// Default `EnvFilter` directives; `RUST_LOG` takes precedence.
    pub(crate) filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            filter: "info".to_string(),
        }
    }
}

/// Read the config file at `path`, or start from defaults when there is
/// none, then apply environment overrides.
pub(crate) fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let config = match path {
        Some(path) => read_config(path)?,
        None => Config::default(),
    };
    apply_env(config, |var| std::env::var(var).ok())
}

fn read_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn apply_env<F>(mut config: Config, lookup: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup(ENV_PORT) {
        config.server.port = value.trim().parse().map_err(|_| ConfigError::Env {
            var: ENV_PORT,
            value: value.clone(),
        })?;
    }
    if let Some(filter) = lookup(ENV_LOG).filter(|f| !f.trim().is_empty()) {
        config.log.filter = filter;
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.addr(), "0.0.0.0:8080");
        assert_eq!(config.server.max_body_bytes, 1_048_576);
        assert_eq!(config.log.format, LogFormat::Pretty);
        assert_eq!(config.log.filter, "info");
        assert_eq!(config.seed, None);
    }

    #[test]
    fn test_read_partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "seed = \"demo.json\"\n\n[server]\nport = 9100\n\n[log]\nformat = \"json\""
        )
        .unwrap();

        let config = read_config(file.path()).unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.log.format, LogFormat::Json);
        assert_eq!(config.log.filter, "info");
        assert_eq!(config.seed, Some(PathBuf::from("demo.json")));
    }

    #[test]
    fn test_unknown_key_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nprot = 1").unwrap();
        let err = read_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }), "{err}");
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_config(&dir.path().join("absent.toml")).unwrap_err();
        assert!(err.to_string().contains("absent.toml"), "{err}");
    }

    #[test]
    fn test_env_overrides_file_values() {
        let config = apply_env(
            Config::default(),
            env(&[(ENV_PORT, "7000"), (ENV_LOG, "debug")]),
        )
        .unwrap();
        assert_eq!(config.server.port, 7000);
        assert_eq!(config.log.filter, "debug");
    }

    #[test]
    fn test_bad_env_port_rejected() {
        let err = apply_env(Config::default(), env(&[(ENV_PORT, "eighty")])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid TESTDECK_PORT value 'eighty': expected a port number"
        );
    }

    #[test]
    fn test_blank_env_filter_ignored() {
        let config = apply_env(Config::default(), env(&[(ENV_LOG, "  ")])).unwrap();
        assert_eq!(config.log.filter, "info");
    }
}

use crate::error::{RelayError, Result};
use crate::models::DEFAULT_MODEL_ID;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    /// AWS region of the Bedrock runtime. No default: a relay without one
    /// starts, but every invocation fails.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Replaces `https://bedrock-runtime.{region}.amazonaws.com` when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default = "default_model")]
    pub default_model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub defaults: SamplingDefaults,
}

/// Values filled in when a request leaves a sampling field out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingDefaults {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u64,
    #[serde(default = "default_top_p")]
    pub top_p: f64,
    #[serde(default = "default_top_k")]
    pub top_k: u64,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

impl Default for SamplingDefaults {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            top_p: default_top_p(),
            top_k: default_top_k(),
            temperature: default_temperature(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            region: None,
            endpoint: None,
            default_model: default_model(),
            timeout_secs: default_timeout_secs(),
            defaults: SamplingDefaults::default(),
        }
    }
}

fn default_port() -> u16 {
    3000
}

fn default_model() -> String {
    DEFAULT_MODEL_ID.to_string()
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_max_tokens() -> u64 {
    1000
}

fn default_top_p() -> f64 {
    1.0
}

fn default_top_k() -> u64 {
    250
}

fn default_temperature() -> f64 {
    0.5
}

impl RelayConfig {
    /// Load config from a TOML file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RelayError::config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Search standard locations for a config file.
    /// Priority: CLI arg > CWD > XDG config > home dir > built-in defaults
    pub fn find_and_load(explicit_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit_path {
            return Self::load(path);
        }

        for candidate in &config_search_paths() {
            if candidate.exists() {
                tracing::info!(path = %candidate.display(), "Loading config");
                return Self::load(candidate);
            }
        }

        tracing::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Apply `PORT` and `REGION` from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Same as [`apply_env`](Self::apply_env) with an injectable lookup.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT") {
            self.port = port.trim().parse().map_err(|_| {
                RelayError::config(format!("PORT must be a port number, got '{}'", port))
            })?;
        }
        if let Some(region) = lookup("REGION").filter(|r| !r.trim().is_empty()) {
            self.region = Some(region.trim().to_string());
        }
        Ok(())
    }
}

pub fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    paths.push(PathBuf::from("bedrock-relay.toml"));

    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        paths.push(PathBuf::from(xdg).join("bedrock-relay").join("config.toml"));
    }
    if let Some(home) = home_dir() {
        paths.push(home.join(".config").join("bedrock-relay").join("config.toml"));
        paths.push(home.join(".bedrock-relay.toml"));
    }

    paths
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(
            f,
            r#"
port = 5000
region = "eu-central-1"
timeout_secs = 30

[defaults]
max_tokens = 2048
"#
        )
        .unwrap();

        let config = RelayConfig::load(f.path()).unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.region.as_deref(), Some("eu-central-1"));
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.default_model, DEFAULT_MODEL_ID);
        assert_eq!(config.defaults.max_tokens, 2048);
        assert_eq!(config.defaults.top_k, 250);
        assert_eq!(config.defaults.temperature, 0.5);
    }

    #[test]
    fn test_defaults() {
        let config = RelayConfig::default();
        assert_eq!(config.port, 3000);
        assert!(config.region.is_none());
        assert_eq!(config.defaults.max_tokens, 1000);
        assert_eq!(config.defaults.top_p, 1.0);
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = RelayConfig {
            port: 5000,
            region: Some("eu-west-1".to_string()),
            ..RelayConfig::default()
        };
        config
            .apply_env_from(|key| match key {
                "PORT" => Some("8080".to_string()),
                "REGION" => Some("us-west-2".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.region.as_deref(), Some("us-west-2"));
    }

    #[test]
    fn test_bad_port_env_is_config_error() {
        let mut config = RelayConfig::default();
        let err = config
            .apply_env_from(|key| (key == "PORT").then(|| "not-a-port".to_string()))
            .unwrap_err();
        assert_eq!(err.kind(), "config");
    }
}

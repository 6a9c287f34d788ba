// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Runtime configuration

use crate::error::{Result, RuntimeError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Prefix of environment variables overriding configuration keys
pub const ENV_PREFIX: &str = "SCRIPTDECK_";

/// Configuration of a [`ScriptRuntime`](crate::ScriptRuntime)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Deadline of a top-level run in milliseconds
    pub execution_timeout_ms: Option<u64>,

    /// Maximum iterations of a single loop
    pub loop_iteration_limit: Option<u64>,

    /// Maximum call depth
    pub recursion_limit: Option<usize>,

    /// Request timeout for remote modules in seconds
    pub fetch_timeout_secs: u64,

    /// User agent sent when fetching remote modules
    pub user_agent: String,

    /// Forward console lines to the host log
    pub forward_console: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            execution_timeout_ms: None,
            loop_iteration_limit: None,
            recursion_limit: None,
            fetch_timeout_secs: 30,
            user_agent: format!("scriptdeck/{}", env!("CARGO_PKG_VERSION")),
            forward_console: true,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a TOML file, then apply environment overrides
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = Self::from_file(path)?;
        config.load_from_env();
        Ok(config)
    }

    /// Parse a TOML file. Missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| RuntimeError::Config(e.to_string()))
    }

    /// Defaults with environment overrides applied
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Apply `SCRIPTDECK_*` environment variables
    pub fn load_from_env(&mut self) {
        self.apply_vars(std::env::vars());
    }

    fn apply_vars(&mut self, vars: impl IntoIterator<Item = (String, String)>) {
        for (key, value) in vars {
            if let Some(config_key) = key.strip_prefix(ENV_PREFIX) {
                let config_key = config_key.to_lowercase().replace('_', "-");
                if let Err(e) = self.set(&config_key, &value) {
                    tracing::warn!("Ignoring {}: {}", key, e);
                }
            }
        }
    }

    /// Set a configuration value from its string form.
    ///
    /// Keys use kebab-case (`execution-timeout-ms`). An empty value clears
    /// optional limits.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "execution-timeout-ms" => self.execution_timeout_ms = parse_optional(key, value)?,
            "loop-iteration-limit" => self.loop_iteration_limit = parse_optional(key, value)?,
            "recursion-limit" => self.recursion_limit = parse_optional(key, value)?,
            "fetch-timeout-secs" => self.fetch_timeout_secs = parse(key, value)?,
            "user-agent" => self.user_agent = value.to_string(),
            "forward-console" => self.forward_console = parse(key, value)?,
            _ => return Err(RuntimeError::Config(format!("unknown key '{key}'"))),
        }
        Ok(())
    }

    /// Get a configuration value in its string form
    pub fn get(&self, key: &str) -> Option<String> {
        let optional = |value: Option<String>| Some(value.unwrap_or_default());
        match key {
            "execution-timeout-ms" => optional(self.execution_timeout_ms.map(|v| v.to_string())),
            "loop-iteration-limit" => optional(self.loop_iteration_limit.map(|v| v.to_string())),
            "recursion-limit" => optional(self.recursion_limit.map(|v| v.to_string())),
            "fetch-timeout-secs" => Some(self.fetch_timeout_secs.to_string()),
            "user-agent" => Some(self.user_agent.clone()),
            "forward-console" => Some(self.forward_console.to_string()),
            _ => None,
        }
    }

    /// Run deadline, if configured
    pub fn execution_timeout(&self) -> Option<Duration> {
        self.execution_timeout_ms.map(Duration::from_millis)
    }

    /// Request timeout for remote modules
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| RuntimeError::Config(format!("invalid value '{value}' for '{key}'")))
}

fn parse_optional<T: std::str::FromStr>(key: &str, value: &str) -> Result<Option<T>> {
    if value.trim().is_empty() {
        Ok(None)
    } else {
        parse(key, value).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.execution_timeout(), None);
        assert_eq!(config.fetch_timeout(), Duration::from_secs(30));
        assert!(config.user_agent.starts_with("scriptdeck/"));
        assert!(config.forward_console);
    }

    #[test]
    fn test_from_toml_keeps_defaults() {
        let config = RuntimeConfig::from_toml(
            "execution_timeout_ms = 2500\nrecursion_limit = 64\n",
        )
        .unwrap();
        assert_eq!(config.execution_timeout(), Some(Duration::from_millis(2500)));
        assert_eq!(config.recursion_limit, Some(64));
        assert_eq!(config.fetch_timeout_secs, 30);
    }

    #[test]
    fn test_from_toml_rejects_bad_types() {
        let err = RuntimeConfig::from_toml("fetch_timeout_secs = \"soon\"").unwrap_err();
        assert!(matches!(err, RuntimeError::Config(_)));
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "user_agent = \"ide/1.0\"\nforward_console = false").unwrap();

        let config = RuntimeConfig::from_file(file.path()).unwrap();
        assert_eq!(config.user_agent, "ide/1.0");
        assert!(!config.forward_console);
    }

    #[test]
    fn test_set_and_get() {
        let mut config = RuntimeConfig::default();
        config.set("execution-timeout-ms", "100").unwrap();
        config.set("forward-console", "false").unwrap();
        assert_eq!(config.get("execution-timeout-ms").as_deref(), Some("100"));
        assert_eq!(config.get("forward-console").as_deref(), Some("false"));

        config.set("execution-timeout-ms", "").unwrap();
        assert_eq!(config.execution_timeout_ms, None);
        assert_eq!(config.get("execution-timeout-ms").as_deref(), Some(""));

        assert!(config.set("loop-iteration-limit", "many").is_err());
        assert!(config.set("colour", "red").is_err());
        assert_eq!(config.get("colour"), None);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = RuntimeConfig::default();
        config.apply_vars([
            ("SCRIPTDECK_EXECUTION_TIMEOUT_MS".to_string(), "750".to_string()),
            ("SCRIPTDECK_USER_AGENT".to_string(), "custom".to_string()),
            ("SCRIPTDECK_NOT_A_KEY".to_string(), "x".to_string()),
            ("PATH".to_string(), "/bin".to_string()),
        ]);
        assert_eq!(config.execution_timeout_ms, Some(750));
        assert_eq!(config.user_agent, "custom");
    }
}

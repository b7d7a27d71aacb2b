//! Configuration Management
//!
//! Credentials and tuning for azrm. Sources, lowest precedence first: the
//! JSON file under the user config dir, `ARM_*` environment variables, then
//! whatever the CLI sets explicitly.

use crate::arm::auth::Credentials;
use crate::error::{ProviderError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variables read by [`Config::with_env`]
pub const ENV_CLIENT_ID: &str = "ARM_CLIENT_ID";
pub const ENV_TENANT_ID: &str = "ARM_TENANT_ID";
pub const ENV_SUBSCRIPTION_ID: &str = "ARM_SUBSCRIPTION_ID";
pub const ENV_CLIENT_SECRET: &str = "ARM_CLIENT_SECRET";
pub const ENV_ENVIRONMENT: &str = "ARM_ENVIRONMENT";

const DEFAULT_ENVIRONMENT: &str = "public";

/// User configuration
#[derive(Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub subscription_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Cloud name, e.g. `public` or `AZUREUSGOVERNMENTCLOUD`
    #[serde(default)]
    pub environment: Option<String>,
    /// Long-running operation poll interval
    #[serde(default)]
    pub poll_interval_secs: Option<u64>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("client_id", &self.client_id)
            .field("tenant_id", &self.tenant_id)
            .field("subscription_id", &self.subscription_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
            .field("environment", &self.environment)
            .field("poll_interval_secs", &self.poll_interval_secs)
            .finish()
    }
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("azrm").join("config.json"))
    }

    /// Load configuration from disk, then apply `ARM_*` overrides
    pub fn load() -> Result<Self> {
        let config = match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path)?,
            _ => Self::default(),
        };
        Ok(config.with_env(|key| std::env::var(key).ok()))
    }

    /// Load a config file. A missing or malformed file is a configuration
    /// error, unlike [`Config::load`] which tolerates a missing default file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ProviderError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            ProviderError::Config(format!("cannot parse {}: {}", path.display(), e))
        })
    }

    /// Save configuration to disk
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ProviderError::Config(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .map_err(|e| ProviderError::Config(format!("cannot write {}: {}", path.display(), e)))
    }

    /// Override fields from an environment lookup. Empty values are ignored.
    pub fn with_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(ENV_CLIENT_ID) {
            self.client_id = Some(v);
        }
        if let Some(v) = get(ENV_TENANT_ID) {
            self.tenant_id = Some(v);
        }
        if let Some(v) = get(ENV_SUBSCRIPTION_ID) {
            self.subscription_id = Some(v);
        }
        if let Some(v) = get(ENV_CLIENT_SECRET) {
            self.client_secret = Some(v);
        }
        if let Some(v) = get(ENV_ENVIRONMENT) {
            self.environment = Some(v);
        }
        self
    }

    pub fn poll_interval(&self) -> Option<Duration> {
        self.poll_interval_secs.map(Duration::from_secs)
    }

    /// Build the immutable credential set, naming every missing field
    pub fn credentials(&self) -> Result<Credentials> {
        let fields = [
            ("client_id", &self.client_id),
            ("tenant_id", &self.tenant_id),
            ("subscription_id", &self.subscription_id),
            ("client_secret", &self.client_secret),
        ];

        let missing: Vec<&str> = fields
            .iter()
            .filter(|(_, v)| v.as_deref().map_or(true, |s| s.trim().is_empty()))
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            return Err(ProviderError::Config(format!(
                "missing credential field(s): {}",
                missing.join(", ")
            )));
        }

        let value = |v: &Option<String>| v.clone().unwrap_or_default();
        Ok(Credentials::new(
            value(&self.client_id),
            value(&self.tenant_id),
            value(&self.subscription_id),
            value(&self.client_secret),
            self.environment
                .clone()
                .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn full() -> Config {
        Config {
            client_id: Some("client".to_string()),
            tenant_id: Some("tenant".to_string()),
            subscription_id: Some("sub".to_string()),
            client_secret: Some("secret".to_string()),
            environment: None,
            poll_interval_secs: None,
        }
    }

    #[test]
    fn test_credentials_default_environment() {
        let creds = full().credentials().unwrap();
        assert_eq!(creds.environment(), "public");
        assert_eq!(creds.subscription_id(), "sub");
    }

    #[test]
    fn test_credentials_names_missing_fields() {
        let config = Config {
            tenant_id: Some(" ".to_string()),
            client_secret: None,
            ..full()
        };
        let err = config.credentials().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("tenant_id"), "{msg}");
        assert!(msg.contains("client_secret"), "{msg}");
        assert!(!msg.contains("client_id,"), "{msg}");
    }

    #[test]
    fn test_env_overrides_file() {
        let env: HashMap<&str, &str> = [
            (ENV_CLIENT_ID, "from-env"),
            (ENV_ENVIRONMENT, "usgovernment"),
            (ENV_TENANT_ID, ""),
        ]
        .into_iter()
        .collect();

        let config = full().with_env(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.client_id.as_deref(), Some("from-env"));
        assert_eq!(config.environment.as_deref(), Some("usgovernment"));
        assert_eq!(config.tenant_id.as_deref(), Some("tenant"));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let shown = format!("{:?}", full());
        assert!(!shown.contains("secret\""), "{shown}");
        assert!(shown.contains("<redacted>"));
    }
}

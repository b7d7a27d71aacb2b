//! ARM resource identifiers
//!
//! `/subscriptions/{sub}/resourceGroups/{group}/providers/{namespace}/{type}/{name}[/...]`

use crate::error::{ProviderError, Result};
use std::fmt;

/// A parsed ARM resource ID
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceId {
    pub subscription_id: String,
    pub resource_group: String,
    pub provider: Option<String>,
    /// Remaining key/value segments in order, e.g. `[("servers", "db1")]`
    pub path: Vec<(String, String)>,
}

impl ResourceId {
    pub fn parse(id: &str) -> Result<Self> {
        let invalid = |reason: &str| ProviderError::InvalidResourceId {
            id: id.to_string(),
            reason: reason.to_string(),
        };

        let parsed = url::Url::parse("https://placeholder.invalid/")
            .and_then(|base| base.join(id))
            .map_err(|e| invalid(&e.to_string()))?;
        if parsed.host_str() != Some("placeholder.invalid") {
            return Err(invalid("expected a path, not an absolute URL"));
        }

        let path = id.trim().trim_matches('/');
        if path.is_empty() {
            return Err(invalid("the ID is empty"));
        }

        let components: Vec<&str> = path.split('/').collect();
        if components.len() % 2 != 0 {
            return Err(invalid("the number of path segments is not divisible by 2"));
        }

        let mut subscription_id = None;
        let mut resource_group = None;
        let mut provider = None;
        let mut rest = Vec::new();

        for pair in components.chunks(2) {
            let (key, value) = (pair[0], pair[1]);
            if key.is_empty() || value.is_empty() {
                return Err(invalid("the ID contains an empty segment"));
            }
            match key {
                "subscriptions" if subscription_id.is_none() => {
                    subscription_id = Some(value.to_string())
                }
                "resourceGroups" | "resourcegroups" if resource_group.is_none() => {
                    resource_group = Some(value.to_string())
                }
                "providers" if provider.is_none() => provider = Some(value.to_string()),
                _ => rest.push((key.to_string(), value.to_string())),
            }
        }

        let subscription_id = subscription_id.ok_or_else(|| invalid("no subscription ID found"))?;
        let resource_group =
            resource_group.ok_or_else(|| invalid("no resource group name found"))?;

        Ok(Self {
            subscription_id,
            resource_group,
            provider,
            path: rest,
        })
    }

    /// Value of a path segment, e.g. `id.get("servers")`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.path
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Like `get`, but a missing segment is a parse error
    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key).ok_or_else(|| ProviderError::InvalidResourceId {
            id: self.to_string(),
            reason: format!("no {:?} segment found", key),
        })
    }

    /// Type of the addressed resource (last key), `resourceGroups` for groups
    pub fn resource_type(&self) -> &str {
        self.path
            .last()
            .map(|(k, _)| k.as_str())
            .unwrap_or("resourceGroups")
    }

    /// Name of the addressed resource (last value)
    pub fn name(&self) -> &str {
        self.path
            .last()
            .map(|(_, v)| v.as_str())
            .unwrap_or(&self.resource_group)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "/subscriptions/{}/resourceGroups/{}",
            self.subscription_id, self.resource_group
        )?;
        if let Some(provider) = &self.provider {
            write!(f, "/providers/{}", provider)?;
        }
        for (key, value) in &self.path {
            write!(f, "/{}/{}", key, value)?;
        }
        Ok(())
    }
}

/// A Key Vault child object, `https://{vault}/{collection}/{name}[/{version}]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyVaultChildId {
    /// Vault base URL with a trailing slash
    pub vault_uri: String,
    pub collection: String,
    pub name: String,
    pub version: Option<String>,
}

impl KeyVaultChildId {
    pub fn parse(id: &str) -> Result<Self> {
        let invalid = |reason: &str| ProviderError::InvalidResourceId {
            id: id.to_string(),
            reason: reason.to_string(),
        };

        let url = url::Url::parse(id).map_err(|e| invalid(&e.to_string()))?;
        let host = url.host_str().ok_or_else(|| invalid("no vault host"))?;
        let vault_uri = match url.port() {
            Some(port) => format!("{}://{}:{}/", url.scheme(), host, port),
            None => format!("{}://{}/", url.scheme(), host),
        };

        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|p| !p.is_empty()).collect())
            .unwrap_or_default();

        match segments.as_slice() {
            [collection, name] => Ok(Self {
                vault_uri,
                collection: collection.to_string(),
                name: name.to_string(),
                version: None,
            }),
            [collection, name, version] => Ok(Self {
                vault_uri,
                collection: collection.to_string(),
                name: name.to_string(),
                version: Some(version.to_string()),
            }),
            _ => Err(invalid("expected /{collection}/{name}[/{version}]")),
        }
    }
}

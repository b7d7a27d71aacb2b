//! Azure cloud environments
//!
//! Each environment is a set of endpoint URLs keyed by name. Names are
//! matched case-insensitively, and short spellings such as `public` or
//! `german` are accepted by wrapping them as `AZURE<NAME>CLOUD`.

use crate::error::{ProviderError, Result};

/// Endpoints for one Azure cloud
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    pub name: String,
    pub resource_manager_endpoint: String,
    pub active_directory_endpoint: String,
    pub graph_endpoint: String,
    pub key_vault_dns_suffix: String,
    pub storage_endpoint_suffix: String,
}

/// (name, resource manager, active directory, graph, key vault suffix, storage suffix)
const KNOWN_ENVIRONMENTS: &[(&str, &str, &str, &str, &str, &str)] = &[
    (
        "AZUREPUBLICCLOUD",
        "https://management.azure.com/",
        "https://login.microsoftonline.com/",
        "https://graph.windows.net/",
        "vault.azure.net",
        "core.windows.net",
    ),
    (
        "AZURECHINACLOUD",
        "https://management.chinacloudapi.cn/",
        "https://login.chinacloudapi.cn/",
        "https://graph.chinacloudapi.cn/",
        "vault.azure.cn",
        "core.chinacloudapi.cn",
    ),
    (
        "AZUREGERMANCLOUD",
        "https://management.microsoftazure.de/",
        "https://login.microsoftonline.de/",
        "https://graph.cloudapi.de/",
        "vault.microsoftazure.de",
        "core.cloudapi.de",
    ),
    (
        "AZUREUSGOVERNMENTCLOUD",
        "https://management.usgovcloudapi.net/",
        "https://login.microsoftonline.us/",
        "https://graph.windows.net/",
        "vault.usgovcloudapi.net",
        "core.usgovcloudapi.net",
    ),
];

impl Environment {
    /// Look up an environment by its exact (case-insensitive) name
    pub fn from_name(name: &str) -> Option<Self> {
        let wanted = name.trim().to_uppercase();
        KNOWN_ENVIRONMENTS
            .iter()
            .find(|(known, ..)| *known == wanted)
            .map(|(name, rm, ad, graph, kv, storage)| Self {
                name: name.to_string(),
                resource_manager_endpoint: rm.to_string(),
                active_directory_endpoint: ad.to_string(),
                graph_endpoint: graph.to_string(),
                key_vault_dns_suffix: kv.to_string(),
                storage_endpoint_suffix: storage.to_string(),
            })
    }

    /// Resolve an environment name, retrying with the `AZURE<NAME>CLOUD`
    /// spelling before giving up
    pub fn resolve(name: &str) -> Result<Self> {
        if let Some(env) = Self::from_name(name) {
            return Ok(env);
        }

        let wrapped = format!("AZURE{}CLOUD", name.trim().to_uppercase());
        tracing::debug!("Environment {:?} not found, retrying as {}", name, wrapped);

        Self::from_name(&wrapped).ok_or_else(|| {
            ProviderError::Config(format!("Unknown Azure environment name: {:?}", name))
        })
    }

    /// Names of all built-in environments
    pub fn known_names() -> Vec<&'static str> {
        KNOWN_ENVIRONMENTS.iter().map(|(name, ..)| *name).collect()
    }

    /// Key Vault audience for this cloud (`https://vault.azure.net`)
    pub fn key_vault_resource(&self) -> String {
        format!("https://{}", self.key_vault_dns_suffix)
    }
}

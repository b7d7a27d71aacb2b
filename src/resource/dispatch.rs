//! Resource Dispatch
//!
//! Maps declarative type names to their adapters.

use super::key_vault_secret::KeyVaultSecret;
use super::mysql_server::MySqlServer;
use super::resource_group::ResourceGroup;
use super::Resource;
use crate::error::{ProviderError, Result};

/// Get the adapter for a resource type
pub fn get_resource(type_name: &str) -> Option<&'static dyn Resource> {
    tracing::debug!("get_resource: type={}", type_name);

    match type_name {
        "azurerm_resource_group" => Some(&ResourceGroup),
        "azurerm_mysql_server" => Some(&MySqlServer),
        "azurerm_key_vault_secret" => Some(&KeyVaultSecret),
        _ => None,
    }
}

/// Like [`get_resource`], failing with a validation error for unknown types
pub fn require_resource(type_name: &str) -> Result<&'static dyn Resource> {
    get_resource(type_name).ok_or_else(|| {
        ProviderError::validation(
            "type",
            format!(
                "unknown resource type {:?}; expected one of {:?}",
                type_name,
                super::get_all_resource_types()
            ),
        )
    })
}

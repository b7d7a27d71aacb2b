//! azurerm_key_vault_secret
//!
//! Secrets live on the vault data plane, addressed by absolute URLs and
//! authorized through the challenge flow. The identifier is the versioned
//! secret URL.

use super::helpers::{decode_config, expand_tags, flatten_tags};
use super::{Resource, ResourceData};
use crate::arm::registry::{ClientRegistry, ServiceFamily};
use crate::arm::resource_id::KeyVaultChildId;
use crate::error::{ProviderError, Result, StepExt};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;

pub struct KeyVaultSecret;

#[derive(Debug, Deserialize)]
struct SecretConfig {
    name: String,
    vault_uri: String,
    value: String,
    #[serde(default)]
    content_type: Option<String>,
    #[serde(default = "enabled_default")]
    enabled: bool,
    #[serde(default)]
    tags: BTreeMap<String, String>,
}

fn enabled_default() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SecretBundle {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    content_type: Option<String>,
    #[serde(default)]
    attributes: Option<SecretAttributes>,
    #[serde(default)]
    tags: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct SecretAttributes {
    #[serde(default)]
    enabled: Option<bool>,
}

/// Vault base URL with exactly one trailing slash
fn vault_base(vault_uri: &str) -> String {
    format!("{}/", vault_uri.trim_end_matches('/'))
}

fn describe(name: &str, vault_uri: &str) -> String {
    format!("Key Vault Secret {:?} (vault {:?})", name, vault_uri)
}

/// Set payload
pub fn expand(d: &ResourceData) -> Result<Value> {
    let config: SecretConfig = decode_config(d.attributes())?;
    Ok(expand_set(&config))
}

fn expand_set(config: &SecretConfig) -> Value {
    let mut body = expand_properties(config);
    body["value"] = Value::String(config.value.clone());
    body
}

/// Everything but the value, which only a new version can change
fn expand_properties(config: &SecretConfig) -> Value {
    let mut body = json!({
        "attributes": { "enabled": config.enabled },
        "tags": expand_tags(&config.tags),
    });
    if let Some(content_type) = &config.content_type {
        body["contentType"] = Value::String(content_type.clone());
    }
    body
}

/// Copy a secret bundle into the declarative attributes
pub fn flatten(body: &Value, d: &mut ResourceData) -> Result<()> {
    let bundle: SecretBundle = serde_json::from_value(body.clone())?;

    if let Some(id) = bundle.id.as_deref() {
        let id = KeyVaultChildId::parse(id)?;
        d.set("name", id.name);
        d.set("vault_uri", id.vault_uri);
        d.set_opt("version", id.version);
    }
    d.set_opt("value", bundle.value);
    d.set_opt("content_type", bundle.content_type);
    d.set(
        "enabled",
        bundle.attributes.and_then(|a| a.enabled).unwrap_or(true),
    );
    d.set("tags", flatten_tags(bundle.tags.as_ref()));
    Ok(())
}

fn existing_secret_id(d: &ResourceData) -> Result<KeyVaultChildId> {
    let id = d.id().ok_or_else(|| ProviderError::InvalidResourceId {
        id: String::new(),
        reason: "the resource has no identifier".to_string(),
    })?;
    parse_secret_id(id)
}

fn parse_secret_id(id: &str) -> Result<KeyVaultChildId> {
    let parsed = KeyVaultChildId::parse(id)?;
    if parsed.collection != "secrets" {
        return Err(ProviderError::InvalidResourceId {
            id: id.to_string(),
            reason: format!("expected a secret, found {:?}", parsed.collection),
        });
    }
    Ok(parsed)
}

impl KeyVaultSecret {
    /// The bundle returned after a write must name the new version
    fn set_from_bundle(&self, body: &Value, config: &SecretConfig, d: &mut ResourceData) -> Result<()> {
        let id = body
            .get("id")
            .and_then(|v| v.as_str())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                ProviderError::InconsistentState(format!(
                    "Cannot read {} ID",
                    describe(&config.name, &config.vault_uri)
                ))
            })?;
        d.set_id(id);
        flatten(body, d)
    }
}

#[async_trait]
impl Resource for KeyVaultSecret {
    fn type_name(&self) -> &'static str {
        "azurerm_key_vault_secret"
    }

    async fn create(&self, d: &mut ResourceData, registry: &ClientRegistry) -> Result<()> {
        self.prepare(d)?;
        let config: SecretConfig = decode_config(d.attributes())?;
        let client = registry.client(ServiceFamily::KeyVaultData)?;
        let url = client.with_api_version(&format!(
            "{}secrets/{}",
            vault_base(&config.vault_uri),
            urlencoding::encode(&config.name)
        ));

        tracing::info!("Setting {}", describe(&config.name, &config.vault_uri));
        let body = client
            .put(&url, &expand_set(&config))
            .await
            .step(|| format!("setting {}", describe(&config.name, &config.vault_uri)))?
            .json_value()?;

        self.set_from_bundle(&body, &config, d)
    }

    async fn read(&self, d: &mut ResourceData, registry: &ClientRegistry) -> Result<bool> {
        let id = existing_secret_id(d)?;
        let client = registry.client(ServiceFamily::KeyVaultData)?;
        let url = client.with_api_version(d.id().unwrap_or_default());

        let response = match client.get(&url).await {
            Ok(response) => response,
            Err(e) if e.is_not_found() => {
                tracing::info!("{} not found, removing from state", describe(&id.name, &id.vault_uri));
                d.clear();
                return Ok(false);
            }
            Err(e) => return Err(e).step(|| format!("reading {}", describe(&id.name, &id.vault_uri))),
        };

        flatten(&response.json_value()?, d)?;
        Ok(true)
    }

    async fn update(&self, d: &mut ResourceData, registry: &ClientRegistry) -> Result<()> {
        self.prepare(d)?;
        let id = existing_secret_id(d)?;
        let config: SecretConfig = decode_config(d.attributes())?;
        let client = registry.client(ServiceFamily::KeyVaultData)?;

        let mut url = format!("{}secrets/{}", id.vault_uri, urlencoding::encode(&id.name));
        if let Some(version) = &id.version {
            url = format!("{}/{}", url, version);
        }

        let body = client
            .patch(&client.with_api_version(&url), &expand_properties(&config))
            .await
            .step(|| format!("updating {}", describe(&id.name, &id.vault_uri)))?
            .json_value()?;

        self.set_from_bundle(&body, &config, d)
    }

    async fn delete(&self, d: &mut ResourceData, registry: &ClientRegistry) -> Result<()> {
        let id = existing_secret_id(d)?;
        let client = registry.client(ServiceFamily::KeyVaultData)?;
        let url = client.with_api_version(&format!(
            "{}secrets/{}",
            id.vault_uri,
            urlencoding::encode(&id.name)
        ));

        client
            .delete(&url)
            .await
            .step(|| format!("deleting {}", describe(&id.name, &id.vault_uri)))?;

        d.clear();
        Ok(())
    }

    async fn import(&self, id: &str, registry: &ClientRegistry) -> Result<ResourceData> {
        parse_secret_id(id)?;
        let mut d = ResourceData::with_id(id);
        if self.read(&mut d, registry).await? {
            Ok(d)
        } else {
            Err(ProviderError::NotFound(id.to_string()))
        }
    }
}

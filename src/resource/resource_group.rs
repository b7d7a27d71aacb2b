//! azurerm_resource_group

use super::helpers::{decode_config, expand_tags, flatten_tags, normalize_location};
use super::{existing_id, Resource, ResourceData};
use crate::arm::operation::wait_for_completion;
use crate::arm::registry::{ClientRegistry, ServiceFamily};
use crate::error::{ProviderError, Result, StepExt};
use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;

pub struct ResourceGroup;

#[derive(Debug, Deserialize)]
struct ResourceGroupConfig {
    name: String,
    location: String,
    #[serde(default)]
    tags: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ResourceGroupWire {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    tags: Option<BTreeMap<String, String>>,
}

/// Create payload
pub fn expand(d: &ResourceData) -> Result<Value> {
    let config: ResourceGroupConfig = decode_config(d.attributes())?;
    Ok(json!({
        "location": normalize_location(&config.location),
        "tags": expand_tags(&config.tags),
    }))
}

/// Copy a GET body into the declarative attributes
pub fn flatten(body: &Value, d: &mut ResourceData) -> Result<()> {
    let wire: ResourceGroupWire = serde_json::from_value(body.clone())?;
    d.set_opt("name", wire.name);
    d.set_opt("location", wire.location.as_deref().map(normalize_location));
    d.set("tags", flatten_tags(wire.tags.as_ref()));
    Ok(())
}

impl ResourceGroup {
    async fn read_back(&self, name: &str, d: &mut ResourceData, registry: &ClientRegistry) -> Result<()> {
        let client = registry.client(ServiceFamily::Resources)?;
        let body = client.get(&client.resource_group_url(name)).await?.json_value()?;

        let id = body
            .get("id")
            .and_then(|v| v.as_str())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                ProviderError::InconsistentState(format!("Cannot read Resource Group {:?} ID", name))
            })?;
        d.set_id(id);
        flatten(&body, d)
    }
}

#[async_trait]
impl Resource for ResourceGroup {
    fn type_name(&self) -> &'static str {
        "azurerm_resource_group"
    }

    async fn create(&self, d: &mut ResourceData, registry: &ClientRegistry) -> Result<()> {
        self.prepare(d)?;
        let config: ResourceGroupConfig = decode_config(d.attributes())?;
        let body = expand(d)?;
        let client = registry.client(ServiceFamily::Resources)?;
        let url = client.resource_group_url(&config.name);

        tracing::info!("Creating Resource Group {:?}", config.name);
        let response = client
            .put(&url, &body)
            .await
            .step(|| format!("creating Resource Group {:?}", config.name))?;
        wait_for_completion(
            client,
            Method::PUT,
            &url,
            response,
            registry.poll_interval(),
            registry.cancellation(),
        )
        .await
        .step(|| format!("waiting for creation of Resource Group {:?}", config.name))?;

        self.read_back(&config.name, d, registry)
            .await
            .step(|| format!("reading Resource Group {:?} after creation", config.name))
    }

    async fn read(&self, d: &mut ResourceData, registry: &ClientRegistry) -> Result<bool> {
        let id = existing_id(d)?;
        let client = registry.client(ServiceFamily::Resources)?;

        let response = match client.get(&client.resource_group_url(&id.resource_group)).await {
            Ok(response) => response,
            Err(e) if e.is_not_found() => {
                tracing::info!("Resource Group {:?} not found, removing from state", id.resource_group);
                d.clear();
                return Ok(false);
            }
            Err(e) => {
                return Err(e).step(|| format!("reading Resource Group {:?}", id.resource_group))
            }
        };

        flatten(&response.json_value()?, d)?;
        Ok(true)
    }

    async fn update(&self, d: &mut ResourceData, registry: &ClientRegistry) -> Result<()> {
        self.prepare(d)?;
        let id = existing_id(d)?;
        let config: ResourceGroupConfig = decode_config(d.attributes())?;
        let client = registry.client(ServiceFamily::Resources)?;

        // Only tags are mutable
        let body = json!({ "tags": expand_tags(&config.tags) });
        client
            .patch(&client.resource_group_url(&id.resource_group), &body)
            .await
            .step(|| format!("updating Resource Group {:?}", id.resource_group))?;

        self.read_back(&id.resource_group, d, registry)
            .await
            .step(|| format!("reading Resource Group {:?} after update", id.resource_group))
    }

    async fn delete(&self, d: &mut ResourceData, registry: &ClientRegistry) -> Result<()> {
        let id = existing_id(d)?;
        let client = registry.client(ServiceFamily::Resources)?;
        let url = client.resource_group_url(&id.resource_group);

        tracing::info!("Deleting Resource Group {:?}", id.resource_group);
        let response = client
            .delete(&url)
            .await
            .step(|| format!("deleting Resource Group {:?}", id.resource_group))?;
        wait_for_completion(
            client,
            Method::DELETE,
            &url,
            response,
            registry.poll_interval(),
            registry.cancellation(),
        )
        .await
        .step(|| format!("waiting for deletion of Resource Group {:?}", id.resource_group))?;

        d.clear();
        Ok(())
    }
}

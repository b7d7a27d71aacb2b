//! azurerm_mysql_server
//!
//! Azure Database for MySQL. Basic tier only: the accepted SKU, version and
//! storage values are the ones listed in `resources/mysql.json`.

use super::helpers::{decode_config, flatten_tags, normalize_location, single_block};
use super::{existing_id, Resource, ResourceData};
use crate::arm::operation::wait_for_completion;
use crate::arm::registry::{ClientRegistry, ServiceFamily};
use crate::error::{ProviderError, Result, StepExt};
use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

const NAMESPACE: &str = "Microsoft.DBforMySQL";

pub struct MySqlServer;

#[derive(Debug, Deserialize)]
struct MySqlServerConfig {
    name: String,
    location: String,
    resource_group_name: String,
    #[serde(deserialize_with = "single_block")]
    sku: SkuConfig,
    administrator_login: String,
    administrator_login_password: String,
    version: String,
    storage_mb: i64,
    ssl_enforcement: String,
    #[serde(default)]
    tags: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct SkuConfig {
    name: String,
    capacity: i64,
    tier: String,
}

/// Wire SKU. `size` carries the storage size in MB as a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sku {
    pub name: String,
    pub tier: String,
    pub capacity: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
}

#[derive(Debug, Serialize)]
struct ServerForCreate<'a> {
    location: String,
    sku: Sku,
    properties: CreateProperties<'a>,
    tags: &'a BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateProperties<'a> {
    create_mode: &'static str,
    version: &'a str,
    #[serde(rename = "storageMB")]
    storage_mb: i64,
    ssl_enforcement: &'a str,
    administrator_login: &'a str,
    administrator_login_password: &'a str,
}

/// Version, storage size and login are fixed after creation
#[derive(Debug, Serialize)]
struct ServerUpdate<'a> {
    sku: Sku,
    properties: UpdateProperties<'a>,
    tags: &'a BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateProperties<'a> {
    ssl_enforcement: &'a str,
    administrator_login_password: &'a str,
}

#[derive(Debug, Deserialize)]
struct Server {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    sku: Option<Sku>,
    #[serde(default)]
    properties: Option<ServerProperties>,
    #[serde(default)]
    tags: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerProperties {
    #[serde(default)]
    administrator_login: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default, rename = "storageMB")]
    storage_mb: Option<i64>,
    #[serde(default)]
    ssl_enforcement: Option<String>,
    #[serde(default)]
    fully_qualified_domain_name: Option<String>,
}

impl MySqlServerConfig {
    fn wire_sku(&self) -> Sku {
        Sku {
            name: self.sku.name.clone(),
            tier: self.sku.tier.clone(),
            capacity: self.sku.capacity,
            size: Some(self.storage_mb.to_string()),
        }
    }

    fn describe(&self) -> String {
        describe(&self.name, &self.resource_group_name)
    }
}

fn describe(name: &str, resource_group: &str) -> String {
    format!("MySQL Server {:?} (resource group {:?})", name, resource_group)
}

/// Create payload
pub fn expand(d: &ResourceData) -> Result<Value> {
    let config: MySqlServerConfig = decode_config(d.attributes())?;
    expand_create(&config)
}

fn expand_create(config: &MySqlServerConfig) -> Result<Value> {
    let body = ServerForCreate {
        location: normalize_location(&config.location),
        sku: config.wire_sku(),
        properties: CreateProperties {
            create_mode: "Default",
            version: &config.version,
            storage_mb: config.storage_mb,
            ssl_enforcement: &config.ssl_enforcement,
            administrator_login: &config.administrator_login,
            administrator_login_password: &config.administrator_login_password,
        },
        tags: &config.tags,
    };
    Ok(serde_json::to_value(body)?)
}

/// Update payload
pub fn expand_update(d: &ResourceData) -> Result<Value> {
    let config: MySqlServerConfig = decode_config(d.attributes())?;
    expand_patch(&config)
}

fn expand_patch(config: &MySqlServerConfig) -> Result<Value> {
    let body = ServerUpdate {
        sku: config.wire_sku(),
        properties: UpdateProperties {
            ssl_enforcement: &config.ssl_enforcement,
            administrator_login_password: &config.administrator_login_password,
        },
        tags: &config.tags,
    };
    Ok(serde_json::to_value(body)?)
}

/// Copy a GET body into the declarative attributes. The password is never
/// returned by the API and is left as configured.
pub fn flatten(body: &Value, resource_group: &str, d: &mut ResourceData) -> Result<()> {
    let server: Server = serde_json::from_value(body.clone())?;
    let props = server.properties.unwrap_or_default();

    d.set_opt("name", server.name);
    d.set("resource_group_name", resource_group);
    d.set_opt("location", server.location.as_deref().map(normalize_location));
    d.set_opt("administrator_login", props.administrator_login);
    d.set_opt("version", props.version);
    d.set_opt("storage_mb", props.storage_mb);
    d.set_opt("ssl_enforcement", props.ssl_enforcement);

    if let Some(sku) = server.sku {
        d.set(
            "sku",
            json!([{ "name": sku.name, "capacity": sku.capacity, "tier": sku.tier }]),
        );
    }
    d.set("tags", flatten_tags(server.tags.as_ref()));

    // Computed
    d.set_opt("fqdn", props.fully_qualified_domain_name);

    Ok(())
}

impl MySqlServer {
    fn server_url(registry: &ClientRegistry, resource_group: &str, name: &str) -> Result<String> {
        let client = registry.client(ServiceFamily::MySql)?;
        Ok(client.provider_url(
            resource_group,
            NAMESPACE,
            &format!("servers/{}", urlencoding::encode(name)),
        ))
    }

    /// Submit a PUT/PATCH and block until the remote operation finishes
    async fn submit(
        &self,
        registry: &ClientRegistry,
        method: Method,
        url: &str,
        body: &Value,
    ) -> Result<()> {
        let client = registry.client(ServiceFamily::MySql)?;
        let response = client
            .send(method.clone(), url, Some(body))
            .await?
            .error_for_status()?;
        wait_for_completion(
            client,
            method,
            url,
            response,
            registry.poll_interval(),
            registry.cancellation(),
        )
        .await?;
        Ok(())
    }

    /// GET after a write; the server must now have an ID
    async fn read_back(
        &self,
        resource_group: &str,
        name: &str,
        d: &mut ResourceData,
        registry: &ClientRegistry,
    ) -> Result<()> {
        let client = registry.client(ServiceFamily::MySql)?;
        let url = Self::server_url(registry, resource_group, name)?;
        let body = client.get(&url).await?.json_value()?;

        let id = body
            .get("id")
            .and_then(|v| v.as_str())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                ProviderError::InconsistentState(format!(
                    "Cannot read MySQL Server {} (resource group {}) ID",
                    name, resource_group
                ))
            })?;

        d.set_id(id);
        flatten(&body, resource_group, d)
    }
}

#[async_trait]
impl Resource for MySqlServer {
    fn type_name(&self) -> &'static str {
        "azurerm_mysql_server"
    }

    async fn create(&self, d: &mut ResourceData, registry: &ClientRegistry) -> Result<()> {
        tracing::info!("preparing arguments for MySQL Server creation");
        self.prepare(d)?;
        let config: MySqlServerConfig = decode_config(d.attributes())?;
        let body = expand_create(&config)?;
        let url = Self::server_url(registry, &config.resource_group_name, &config.name)?;

        self.submit(registry, Method::PUT, &url, &body)
            .await
            .step(|| format!("creating {}", config.describe()))?;

        self.read_back(&config.resource_group_name, &config.name, d, registry)
            .await
            .step(|| format!("reading {} after creation", config.describe()))
    }

    async fn read(&self, d: &mut ResourceData, registry: &ClientRegistry) -> Result<bool> {
        let id = existing_id(d)?;
        let name = id.require("servers")?.to_string();
        let client = registry.client(ServiceFamily::MySql)?;
        let url = Self::server_url(registry, &id.resource_group, &name)?;

        let response = match client.get(&url).await {
            Ok(response) => response,
            Err(e) if e.is_not_found() => {
                tracing::info!("{} not found, removing from state", describe(&name, &id.resource_group));
                d.clear();
                return Ok(false);
            }
            Err(e) => return Err(e).step(|| format!("reading {}", describe(&name, &id.resource_group))),
        };

        flatten(&response.json_value()?, &id.resource_group, d)?;
        Ok(true)
    }

    async fn update(&self, d: &mut ResourceData, registry: &ClientRegistry) -> Result<()> {
        tracing::info!("preparing arguments for MySQL Server update");
        self.prepare(d)?;
        let config: MySqlServerConfig = decode_config(d.attributes())?;
        let body = expand_patch(&config)?;
        let url = Self::server_url(registry, &config.resource_group_name, &config.name)?;

        self.submit(registry, Method::PATCH, &url, &body)
            .await
            .step(|| format!("updating {}", config.describe()))?;

        self.read_back(&config.resource_group_name, &config.name, d, registry)
            .await
            .step(|| format!("reading {} after update", config.describe()))
    }

    async fn delete(&self, d: &mut ResourceData, registry: &ClientRegistry) -> Result<()> {
        let id = existing_id(d)?;
        let name = id.require("servers")?.to_string();
        let url = Self::server_url(registry, &id.resource_group, &name)?;
        let client = registry.client(ServiceFamily::MySql)?;

        let response = client
            .delete(&url)
            .await
            .step(|| format!("deleting {}", describe(&name, &id.resource_group)))?;
        wait_for_completion(
            client,
            Method::DELETE,
            &url,
            response,
            registry.poll_interval(),
            registry.cancellation(),
        )
        .await
        .step(|| format!("waiting for deletion of {}", describe(&name, &id.resource_group)))?;

        d.clear();
        Ok(())
    }
}

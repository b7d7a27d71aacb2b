//! Resource abstraction layer
//!
//! Each managed resource type is an adapter implementing [`Resource`]: the
//! CRUD lifecycle plus import, translating between the flat declarative
//! attributes in [`ResourceData`] and the provider's nested wire format.
//! Schemas are loaded from JSON files at compile time and checked before
//! any network call.
//!
//! # Architecture
//!
//! - [`registry`] - Loads and caches resource schemas from embedded JSON
//! - [`dispatch`] - Maps resource type names to adapters
//! - [`data`] - Declarative state handed in by the host engine
//! - [`helpers`] - Location normalization, tags and block decoding
//!
//! # Resource Definitions
//!
//! Schemas are defined in JSON files under `src/resources/`:
//! - `resource_group.json` - Resource groups
//! - `mysql.json` - Azure Database for MySQL servers
//! - `key_vault.json` - Key Vault secrets (data plane)
//!
//! # Example
//!
//! ```ignore
//! use azrm::resource::{get_resource, ResourceData};
//!
//! async fn adopt(registry: &ClientRegistry, id: &str) -> azrm::error::Result<ResourceData> {
//!     let adapter = get_resource("azurerm_mysql_server").unwrap();
//!     adapter.import(id, registry).await
//! }
//! ```

mod data;
pub mod dispatch;
pub mod helpers;
pub mod key_vault_secret;
pub mod mysql_server;
mod registry;
pub mod resource_group;

pub use data::ResourceData;
pub use dispatch::{get_resource, require_resource};
pub use registry::*;

use crate::arm::registry::ClientRegistry;
use crate::arm::resource_id::ResourceId;
use crate::error::{ProviderError, Result};
use async_trait::async_trait;

/// CRUD lifecycle of one resource type.
///
/// Each adapter module also exports the pure translation pair next to its
/// implementation: `expand(&ResourceData) -> Result<Value>` builds the wire
/// payload and `flatten(&Value, .., &mut ResourceData)` copies a response
/// body back, taking whatever context the body lacks (the MySQL server's
/// resource group, for one). Both run without a registry.
///
/// The host engine serializes calls against a given resource instance;
/// adapters hold no state of their own and may run concurrently for
/// different instances.
#[async_trait]
pub trait Resource: Send + Sync {
    /// Declarative type name, e.g. `azurerm_mysql_server`
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> Result<&'static ResourceSchema> {
        get_schema(self.type_name()).ok_or_else(|| {
            ProviderError::Config(format!("no schema registered for {}", self.type_name()))
        })
    }

    /// Apply defaults and validate. Runs before any network call.
    fn prepare(&self, d: &mut ResourceData) -> Result<()> {
        let schema = self.schema()?;
        schema.apply_defaults(d);
        schema.validate(d)
    }

    /// Create the remote object, wait for completion and read it back
    async fn create(&self, d: &mut ResourceData, registry: &ClientRegistry) -> Result<()>;

    /// Refresh `d` from the remote object. `Ok(false)` means the object is
    /// gone and `d` has been cleared.
    async fn read(&self, d: &mut ResourceData, registry: &ClientRegistry) -> Result<bool>;

    async fn update(&self, d: &mut ResourceData, registry: &ClientRegistry) -> Result<()>;

    /// Delete the remote object and wait for completion. A 404 surfaces as
    /// an error for which [`ProviderError::is_not_found`] holds.
    async fn delete(&self, d: &mut ResourceData, registry: &ClientRegistry) -> Result<()>;

    /// Adopt a pre-existing remote object by its external identifier
    async fn import(&self, id: &str, registry: &ClientRegistry) -> Result<ResourceData> {
        ResourceId::parse(id)?;
        let mut d = ResourceData::with_id(id);
        if self.read(&mut d, registry).await? {
            Ok(d)
        } else {
            Err(ProviderError::NotFound(id.to_string()))
        }
    }
}

/// Parse the identifier of a resource that must already exist
pub(crate) fn existing_id(d: &ResourceData) -> Result<ResourceId> {
    let id = d.id().ok_or_else(|| ProviderError::InvalidResourceId {
        id: String::new(),
        reason: "the resource has no identifier".to_string(),
    })?;
    ResourceId::parse(id)
}

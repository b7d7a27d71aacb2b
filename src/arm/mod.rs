//! ARM API interaction module
//!
//! Core functionality for talking to Azure Resource Manager: environments,
//! service principal authentication, the HTTP transport and the per-service
//! client registry.
//!
//! # Module Structure
//!
//! - [`environment`] - Cloud endpoint descriptors and name resolution
//! - [`auth`] - OAuth client-credentials exchange and authorizers
//! - [`http`] - HTTP transport with wire logging
//! - [`client`] - Per-service authenticated handles
//! - [`registry`] - The client factory and session registry
//! - [`operation`] - Long-running operation polling
//! - [`resource_id`] - Resource identifier parsing
//! - [`storage`] - Storage account key lookup
//!
//! # Example
//!
//! ```ignore
//! use azrm::arm::{auth::Credentials, registry::{ClientRegistry, ServiceFamily}};
//!
//! async fn example() -> azrm::error::Result<()> {
//!     let creds = Credentials::new("client", "tenant", "subscription", "secret", "public");
//!     let registry = ClientRegistry::build(&creds).await?;
//!     let groups = registry.client(ServiceFamily::Resources)?;
//!     let rg = groups.get(&groups.resource_group_url("my-group")).await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod environment;
pub mod http;
pub mod operation;
pub mod registry;
pub mod resource_id;
pub mod storage;

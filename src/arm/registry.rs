//! Client Registry
//!
//! Builds one authenticated `ServiceClient` per service family from a single
//! credential set. The registry is constructed once per session and shared
//! by reference with every resource adapter.

use super::auth::{Authorizer, ChallengeAuthorizer, Credentials, OAuthConfig, ServicePrincipalToken};
use super::client::ServiceClient;
use super::environment::Environment;
use super::http::ArmHttpClient;
use crate::error::{ProviderError, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Default interval between long-running operation polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Which token a service family is called with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    Management,
    Directory,
    Vault,
}

/// Remote service families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ServiceFamily {
    AppInsights,
    Cdn,
    Compute,
    ContainerRegistry,
    ContainerService,
    CosmosDb,
    Disks,
    Dns,
    EventGrid,
    EventHub,
    Graph,
    KeyVault,
    KeyVaultData,
    MySql,
    Network,
    PostgreSql,
    Redis,
    Resources,
    Scheduler,
    Search,
    ServiceBus,
    Sql,
    Storage,
    Subscriptions,
    TrafficManager,
    Web,
}

impl ServiceFamily {
    pub const ALL: &'static [ServiceFamily] = &[
        Self::AppInsights,
        Self::Cdn,
        Self::Compute,
        Self::ContainerRegistry,
        Self::ContainerService,
        Self::CosmosDb,
        Self::Disks,
        Self::Dns,
        Self::EventGrid,
        Self::EventHub,
        Self::Graph,
        Self::KeyVault,
        Self::KeyVaultData,
        Self::MySql,
        Self::Network,
        Self::PostgreSql,
        Self::Redis,
        Self::Resources,
        Self::Scheduler,
        Self::Search,
        Self::ServiceBus,
        Self::Sql,
        Self::Storage,
        Self::Subscriptions,
        Self::TrafficManager,
        Self::Web,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::AppInsights => "appinsights",
            Self::Cdn => "cdn",
            Self::Compute => "compute",
            Self::ContainerRegistry => "containerregistry",
            Self::ContainerService => "containerservice",
            Self::CosmosDb => "cosmosdb",
            Self::Disks => "disks",
            Self::Dns => "dns",
            Self::EventGrid => "eventgrid",
            Self::EventHub => "eventhub",
            Self::Graph => "graph",
            Self::KeyVault => "keyvault",
            Self::KeyVaultData => "keyvault-data",
            Self::MySql => "mysql",
            Self::Network => "network",
            Self::PostgreSql => "postgresql",
            Self::Redis => "redis",
            Self::Resources => "resources",
            Self::Scheduler => "scheduler",
            Self::Search => "search",
            Self::ServiceBus => "servicebus",
            Self::Sql => "sql",
            Self::Storage => "storage",
            Self::Subscriptions => "subscriptions",
            Self::TrafficManager => "trafficmanager",
            Self::Web => "web",
        }
    }

    pub fn audience(self) -> Audience {
        match self {
            Self::Graph => Audience::Directory,
            Self::KeyVaultData => Audience::Vault,
            _ => Audience::Management,
        }
    }

    pub fn api_version(self) -> &'static str {
        match self {
            Self::AppInsights => "2015-05-01",
            Self::Cdn => "2016-10-02",
            Self::Compute => "2017-03-30",
            Self::ContainerRegistry => "2017-03-01",
            Self::ContainerService => "2017-01-31",
            Self::CosmosDb => "2015-04-08",
            Self::Disks => "2016-04-30-preview",
            Self::Dns => "2016-04-01",
            Self::EventGrid => "2017-06-15-preview",
            Self::EventHub => "2017-04-01",
            Self::Graph => "1.6",
            Self::KeyVault => "2016-10-01",
            Self::KeyVaultData => "2016-10-01",
            Self::MySql => "2017-04-30-preview",
            Self::Network => "2017-06-01",
            Self::PostgreSql => "2017-04-30-preview",
            Self::Redis => "2016-04-01",
            Self::Resources => "2017-05-10",
            Self::Scheduler => "2016-03-01",
            Self::Search => "2015-08-19",
            Self::ServiceBus => "2017-04-01",
            Self::Sql => "2014-04-01",
            Self::Storage => "2017-06-01",
            Self::Subscriptions => "2016-06-01",
            Self::TrafficManager => "2017-05-01",
            Self::Web => "2016-09-01",
        }
    }

    /// ARM provider namespace, for families addressed through `providers/`
    pub fn namespace(self) -> Option<&'static str> {
        match self {
            Self::AppInsights => Some("Microsoft.Insights"),
            Self::Cdn => Some("Microsoft.Cdn"),
            Self::Compute | Self::Disks => Some("Microsoft.Compute"),
            Self::ContainerRegistry => Some("Microsoft.ContainerRegistry"),
            Self::ContainerService => Some("Microsoft.ContainerService"),
            Self::CosmosDb => Some("Microsoft.DocumentDB"),
            Self::Dns => Some("Microsoft.Network"),
            Self::EventGrid => Some("Microsoft.EventGrid"),
            Self::EventHub => Some("Microsoft.EventHub"),
            Self::KeyVault => Some("Microsoft.KeyVault"),
            Self::MySql => Some("Microsoft.DBforMySQL"),
            Self::Network => Some("Microsoft.Network"),
            Self::PostgreSql => Some("Microsoft.DBforPostgreSQL"),
            Self::Redis => Some("Microsoft.Cache"),
            Self::Scheduler => Some("Microsoft.Scheduler"),
            Self::Search => Some("Microsoft.Search"),
            Self::ServiceBus => Some("Microsoft.ServiceBus"),
            Self::Sql => Some("Microsoft.Sql"),
            Self::Storage => Some("Microsoft.Storage"),
            Self::TrafficManager => Some("Microsoft.Network"),
            Self::Web => Some("Microsoft.Web"),
            Self::Graph | Self::KeyVaultData | Self::Resources | Self::Subscriptions => None,
        }
    }
}

impl fmt::Display for ServiceFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Knobs for building a registry
#[derive(Debug, Clone)]
pub struct RegistryOptions {
    pub poll_interval: Duration,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// All service handles for one authenticated session
pub struct ClientRegistry {
    environment: Environment,
    subscription_id: String,
    tenant_id: String,
    clients: HashMap<ServiceFamily, ServiceClient>,
    cancel: CancellationToken,
    poll_interval: Duration,
}

impl ClientRegistry {
    /// Build a registry for the environment named in the credentials
    pub async fn build(credentials: &Credentials) -> Result<Self> {
        let environment = Environment::resolve(credentials.environment())?;
        Self::build_with(credentials, environment, RegistryOptions::default()).await
    }

    /// Build a registry against an explicit environment descriptor
    pub async fn build_with(
        credentials: &Credentials,
        environment: Environment,
        options: RegistryOptions,
    ) -> Result<Self> {
        tracing::info!(
            "Building ARM clients for subscription {} in {}",
            credentials.subscription_id(),
            environment.name
        );

        let oauth = OAuthConfig::new(&environment.active_directory_endpoint, credentials.tenant_id())?;
        let token_http = reqwest::Client::builder()
            .user_agent(super::http::USER_AGENT)
            .build()
            .map_err(|e| ProviderError::Config(format!("failed to create HTTP client: {}", e)))?;

        let management = Arc::new(ServicePrincipalToken::new(
            oauth.clone(),
            credentials.client_id(),
            credentials.client_secret(),
            &environment.resource_manager_endpoint,
            token_http.clone(),
        ));
        let directory = Arc::new(ServicePrincipalToken::new(
            oauth.clone(),
            credentials.client_id(),
            credentials.client_secret(),
            &environment.graph_endpoint,
            token_http.clone(),
        ));

        // A rejected tenant or secret must fail here, not in the first adapter call
        futures::try_join!(management.token(), directory.token())?;

        let vault = {
            let oauth = oauth.clone();
            let client_id = credentials.client_id().to_string();
            let client_secret = credentials.client_secret().to_string();
            let http = token_http.clone();
            Arc::new(ChallengeAuthorizer::new(&environment.key_vault_dns_suffix, move |resource: &str| {
                ServicePrincipalToken::new(
                    oauth.clone(),
                    &client_id,
                    &client_secret,
                    resource,
                    http.clone(),
                )
            }))
        };

        let http = ArmHttpClient::new()?;
        let mut clients = HashMap::with_capacity(ServiceFamily::ALL.len());

        for family in ServiceFamily::ALL.iter().copied() {
            let client = match family.audience() {
                Audience::Management => ServiceClient::new(
                    family,
                    &environment.resource_manager_endpoint,
                    credentials.subscription_id(),
                    Authorizer::Bearer(management.clone()),
                    http.clone(),
                ),
                Audience::Directory => ServiceClient::new(
                    family,
                    &environment.graph_endpoint,
                    credentials.tenant_id(),
                    Authorizer::Bearer(directory.clone()),
                    http.clone(),
                ),
                Audience::Vault => ServiceClient::new(
                    family,
                    "",
                    credentials.tenant_id(),
                    Authorizer::Challenge(vault.clone()),
                    http.clone(),
                ),
            };
            clients.insert(family, client);
        }

        tracing::info!("Built {} ARM service clients", clients.len());

        Ok(Self {
            environment,
            subscription_id: credentials.subscription_id().to_string(),
            tenant_id: credentials.tenant_id().to_string(),
            clients,
            cancel: CancellationToken::new(),
            poll_interval: options.poll_interval,
        })
    }

    /// Handle for one service family
    pub fn client(&self, family: ServiceFamily) -> Result<&ServiceClient> {
        self.clients.get(&family).ok_or_else(|| {
            ProviderError::Config(format!("no client registered for service {}", family))
        })
    }

    pub fn families(&self) -> Vec<ServiceFamily> {
        let mut families: Vec<_> = self.clients.keys().copied().collect();
        families.sort();
        families
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Shared cancellation context for long-running waits
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Cancel every in-flight long-running wait of this session
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_family_has_an_api_version() {
        for family in ServiceFamily::ALL {
            assert!(!family.api_version().is_empty(), "{} has no api version", family);
        }
    }

    #[test]
    fn test_audiences() {
        assert_eq!(ServiceFamily::Graph.audience(), Audience::Directory);
        assert_eq!(ServiceFamily::KeyVaultData.audience(), Audience::Vault);
        assert_eq!(ServiceFamily::MySql.audience(), Audience::Management);
    }

    #[test]
    fn test_family_names_are_unique() {
        let mut names: Vec<_> = ServiceFamily::ALL.iter().map(|f| f.as_str()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), ServiceFamily::ALL.len());
    }
}

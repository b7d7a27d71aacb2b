//! Service client handles
//!
//! A `ServiceClient` binds a base endpoint, a subscription (or tenant) scope,
//! an API version and an authorizer. Handles are cheap to clone and safe to
//! share between concurrently running adapters.

use super::auth::{parse_bearer_challenge, Authorizer};
use super::http::{ApiResponse, ArmHttpClient};
use super::registry::ServiceFamily;
use crate::error::Result;
use reqwest::{Method, StatusCode};
use serde_json::Value;

/// One authenticated handle per remote service family
#[derive(Clone)]
pub struct ServiceClient {
    family: ServiceFamily,
    base_url: String,
    scope_id: String,
    api_version: &'static str,
    authorizer: Authorizer,
    http: ArmHttpClient,
}

impl ServiceClient {
    pub fn new(
        family: ServiceFamily,
        base_url: &str,
        scope_id: &str,
        authorizer: Authorizer,
        http: ArmHttpClient,
    ) -> Self {
        Self {
            family,
            base_url: base_url.trim_end_matches('/').to_string(),
            scope_id: scope_id.to_string(),
            api_version: family.api_version(),
            authorizer,
            http,
        }
    }

    pub fn family(&self) -> ServiceFamily {
        self.family
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Subscription ID, or tenant ID for directory clients
    pub fn scope_id(&self) -> &str {
        &self.scope_id
    }

    pub fn api_version(&self) -> &'static str {
        self.api_version
    }

    pub fn authorizer(&self) -> &Authorizer {
        &self.authorizer
    }

    // =========================================================================
    // URL helpers
    // =========================================================================

    /// Append this family's `api-version` to a URL
    pub fn with_api_version(&self, url: &str) -> String {
        let separator = if url.contains('?') { '&' } else { '?' };
        format!("{}{}api-version={}", url, separator, self.api_version)
    }

    /// Build a URL for a path under the base endpoint
    pub fn url(&self, path: &str) -> String {
        self.with_api_version(&format!(
            "{}/{}",
            self.base_url,
            path.trim_start_matches('/')
        ))
    }

    /// Build a URL for a full ARM resource ID
    pub fn id_url(&self, id: &str) -> String {
        self.url(id)
    }

    /// Build a subscription-scoped URL
    pub fn subscription_url(&self, path: &str) -> String {
        self.url(&format!("subscriptions/{}/{}", self.scope_id, path))
    }

    /// Build a resource group URL
    pub fn resource_group_url(&self, resource_group: &str) -> String {
        self.subscription_url(&format!(
            "resourcegroups/{}",
            urlencoding::encode(resource_group)
        ))
    }

    /// Build a URL for a resource inside a resource group
    pub fn provider_url(&self, resource_group: &str, namespace: &str, path: &str) -> String {
        self.subscription_url(&format!(
            "resourceGroups/{}/providers/{}/{}",
            urlencoding::encode(resource_group),
            namespace,
            path
        ))
    }

    // =========================================================================
    // Requests
    // =========================================================================

    /// GET, failing on any non-success status
    pub async fn get(&self, url: &str) -> Result<ApiResponse> {
        self.send(Method::GET, url, None).await?.error_for_status()
    }

    pub async fn put(&self, url: &str, body: &Value) -> Result<ApiResponse> {
        self.send(Method::PUT, url, Some(body)).await?.error_for_status()
    }

    pub async fn patch(&self, url: &str, body: &Value) -> Result<ApiResponse> {
        self.send(Method::PATCH, url, Some(body)).await?.error_for_status()
    }

    pub async fn post(&self, url: &str, body: Option<&Value>) -> Result<ApiResponse> {
        self.send(Method::POST, url, body).await?.error_for_status()
    }

    pub async fn delete(&self, url: &str) -> Result<ApiResponse> {
        self.send(Method::DELETE, url, None).await?.error_for_status()
    }

    /// Send an authorized request and return the raw response
    pub async fn send(&self, method: Method, url: &str, body: Option<&Value>) -> Result<ApiResponse> {
        match &self.authorizer {
            Authorizer::Bearer(source) => {
                let token = source.token().await?;
                self.http.execute(method, url, Some(&token), body).await
            }
            Authorizer::Challenge(challenge) => {
                let host = host_key(url);
                if let Some(resource) = challenge.audience_for_host(&host).await {
                    let token = challenge.token_for(&resource).await?;
                    return self.http.execute(method, url, Some(&token), body).await;
                }

                let response = self.http.execute(method.clone(), url, None, body).await?;
                if response.status != StatusCode::UNAUTHORIZED {
                    return Ok(response);
                }

                let Some(resource) = response
                    .header("www-authenticate")
                    .and_then(parse_bearer_challenge)
                else {
                    return Ok(response);
                };

                let request_host = url::Url::parse(url)
                    .ok()
                    .and_then(|u| u.host_str().map(str::to_string))
                    .unwrap_or_default();
                if !challenge.accepts(&request_host, &resource) {
                    tracing::warn!("Ignoring challenge from {} for foreign audience {}", host, resource);
                    return Ok(response);
                }

                tracing::debug!("Discovered audience {} for {}", resource, host);
                challenge.remember_audience(&host, &resource).await;
                let token = challenge.token_for(&resource).await?;
                self.http.execute(method, url, Some(&token), body).await
            }
        }
    }
}

/// `host[:port]` of a URL, used to cache challenge audiences
fn host_key(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(parsed) => match (parsed.host_str(), parsed.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            _ => url.to_string(),
        },
        Err(_) => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arm::auth::{OAuthConfig, ServicePrincipalToken};
    use std::sync::Arc;

    fn client(family: ServiceFamily) -> ServiceClient {
        let oauth = OAuthConfig::new("https://login.microsoftonline.com/", "tenant").unwrap();
        let token = ServicePrincipalToken::new(
            oauth,
            "client",
            "secret",
            "https://management.azure.com/",
            reqwest::Client::new(),
        );
        ServiceClient::new(
            family,
            "https://management.azure.com/",
            "sub-1",
            Authorizer::Bearer(Arc::new(token)),
            ArmHttpClient::new().unwrap(),
        )
    }

    #[test]
    fn test_provider_url() {
        let c = client(ServiceFamily::MySql);
        assert_eq!(
            c.provider_url("my rg", "Microsoft.DBforMySQL", "servers/db1"),
            format!(
                "https://management.azure.com/subscriptions/sub-1/resourceGroups/my%20rg/providers/Microsoft.DBforMySQL/servers/db1?api-version={}",
                ServiceFamily::MySql.api_version()
            )
        );
    }

    #[test]
    fn test_id_url_and_existing_query() {
        let c = client(ServiceFamily::Resources);
        let url = c.id_url("/subscriptions/sub-1/resourceGroups/rg");
        assert!(url.starts_with("https://management.azure.com/subscriptions/sub-1/resourceGroups/rg?api-version="));

        let url = c.with_api_version("https://x/y?foo=bar");
        assert!(url.starts_with("https://x/y?foo=bar&api-version="));
    }

    #[test]
    fn test_host_key() {
        assert_eq!(host_key("https://myvault.vault.azure.net/secrets/a"), "myvault.vault.azure.net");
        assert_eq!(host_key("http://127.0.0.1:8080/secrets/a"), "127.0.0.1:8080");
    }
}

//! Azure AD authentication
//!
//! Handles the OAuth client-credentials exchange for a service principal and
//! the three authorizers built from it: management, directory (graph) and the
//! challenge-driven Key Vault authorizer.

use crate::error::{ProviderError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use url::Url;

/// Token expiry buffer - refresh tokens this much before they actually expire
const TOKEN_EXPIRY_BUFFER_SECS: i64 = 60;

/// Default token TTL if the token endpoint does not say (30 minutes)
const DEFAULT_TOKEN_TTL_SECS: i64 = 30 * 60;

/// Service principal credential set
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    client_id: String,
    tenant_id: String,
    subscription_id: String,
    client_secret: String,
    environment: String,
}

impl Credentials {
    pub fn new(
        client_id: impl Into<String>,
        tenant_id: impl Into<String>,
        subscription_id: impl Into<String>,
        client_secret: impl Into<String>,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            tenant_id: tenant_id.into(),
            subscription_id: subscription_id.into(),
            client_secret: client_secret.into(),
            environment: environment.into(),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("tenant_id", &self.tenant_id)
            .field("subscription_id", &self.subscription_id)
            .field("client_secret", &"[redacted]")
            .field("environment", &self.environment)
            .finish()
    }
}

/// Token endpoint for one tenant
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    tenant_id: String,
    token_endpoint: Url,
}

impl OAuthConfig {
    pub fn new(active_directory_endpoint: &str, tenant_id: &str) -> Result<Self> {
        let tenant = tenant_id.trim();
        if tenant.is_empty() {
            return Err(ProviderError::Config("tenant ID must not be empty".to_string()));
        }
        if tenant.contains(['/', '?', '#', ' ']) {
            return Err(ProviderError::Config(format!(
                "Unable to configure OAuthConfig for tenant {}",
                tenant
            )));
        }

        let authority = Url::parse(active_directory_endpoint).map_err(|e| {
            ProviderError::Config(format!(
                "invalid active directory endpoint {:?}: {}",
                active_directory_endpoint, e
            ))
        })?;
        let token_endpoint = authority
            .join(&format!("{}/oauth2/token", tenant))
            .map_err(|e| {
                ProviderError::Config(format!(
                    "Unable to configure OAuthConfig for tenant {}: {}",
                    tenant, e
                ))
            })?;

        Ok(Self {
            tenant_id: tenant.to_string(),
            token_endpoint,
        })
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn token_endpoint(&self) -> &Url {
        &self.token_endpoint
    }
}

#[derive(Clone)]
struct CachedToken {
    token: String,
    /// When this token expires (with buffer applied)
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_valid(&self) -> bool {
        Utc::now() < self.expires_at
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default, deserialize_with = "number_or_string")]
    expires_in: Option<i64>,
}

#[derive(Deserialize)]
struct TokenErrorResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

/// AAD v1 endpoints send `expires_in` as a string, v2 as a number
fn number_or_string<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i64),
        Text(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Number(n)) => Some(n),
        Some(Raw::Text(s)) => s.trim().parse().ok(),
        None => None,
    })
}

/// A service principal token for one audience, refreshed lazily
pub struct ServicePrincipalToken {
    oauth: OAuthConfig,
    client_id: String,
    client_secret: String,
    resource: String,
    http: reqwest::Client,
    cache: RwLock<Option<CachedToken>>,
}

impl ServicePrincipalToken {
    pub fn new(
        oauth: OAuthConfig,
        client_id: &str,
        client_secret: &str,
        resource: &str,
        http: reqwest::Client,
    ) -> Self {
        Self {
            oauth,
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            resource: resource.to_string(),
            http,
            cache: RwLock::new(None),
        }
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Get a valid access token, exchanging credentials if the cached one
    /// has expired. Concurrent callers share one refresh.
    pub async fn token(&self) -> Result<String> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.is_valid() {
                    return Ok(cached.token.clone());
                }
                tracing::debug!("Cached token for {} expired, fetching new token", self.resource);
            }
        }

        let mut cache = self.cache.write().await;
        // Another task may have refreshed while we waited for the lock
        if let Some(cached) = cache.as_ref() {
            if cached.is_valid() {
                return Ok(cached.token.clone());
            }
        }

        let fresh = self.exchange().await?;
        let token = fresh.token.clone();
        *cache = Some(fresh);
        Ok(token)
    }

    /// Force refresh the token
    pub async fn refresh(&self) -> Result<String> {
        {
            let mut cache = self.cache.write().await;
            *cache = None;
        }
        self.token().await
    }

    async fn exchange(&self) -> Result<CachedToken> {
        tracing::debug!(
            "Requesting token for tenant {} audience {}",
            self.oauth.tenant_id(),
            self.resource
        );

        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("resource", self.resource.as_str()),
        ];

        let response = self
            .http
            .post(self.oauth.token_endpoint().clone())
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                ProviderError::Config(format!(
                    "failed to request token for {}: {}",
                    self.resource, e
                ))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            ProviderError::Config(format!("failed to read token response: {}", e))
        })?;

        if !status.is_success() {
            let detail = serde_json::from_str::<TokenErrorResponse>(&body)
                .ok()
                .and_then(|e| e.error_description.or(e.error))
                .unwrap_or_else(|| body.clone());
            return Err(ProviderError::Config(format!(
                "token endpoint rejected tenant {} ({}): {}",
                self.oauth.tenant_id(),
                status,
                super::http::sanitize_for_log(&detail)
            )));
        }

        let payload: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            ProviderError::Config(format!("failed to parse token response: {}", e))
        })?;

        let ttl = payload.expires_in.unwrap_or(DEFAULT_TOKEN_TTL_SECS);
        let ttl = (ttl - TOKEN_EXPIRY_BUFFER_SECS).max(0);
        let expires_at = Utc::now() + Duration::seconds(ttl);

        tracing::debug!("New token for {} cached, expires at {}", self.resource, expires_at);

        Ok(CachedToken {
            token: payload.access_token,
            expires_at,
        })
    }
}

/// Creates a token source for an audience only known at request time
pub type TokenSourceFactory = dyn Fn(&str) -> ServicePrincipalToken + Send + Sync;

/// Key Vault authorizer: the audience comes from the vault's 401 challenge,
/// so token sources are created per distinct audience on demand
pub struct ChallengeAuthorizer {
    vault_dns_suffix: String,
    factory: Box<TokenSourceFactory>,
    tokens: RwLock<HashMap<String, Arc<ServicePrincipalToken>>>,
    audiences: RwLock<HashMap<String, String>>,
}

impl ChallengeAuthorizer {
    pub fn new<F>(vault_dns_suffix: &str, factory: F) -> Self
    where
        F: Fn(&str) -> ServicePrincipalToken + Send + Sync + 'static,
    {
        Self {
            vault_dns_suffix: vault_dns_suffix.trim_start_matches('.').to_ascii_lowercase(),
            factory: Box::new(factory),
            tokens: RwLock::new(HashMap::new()),
            audiences: RwLock::new(HashMap::new()),
        }
    }

    /// Whether a challenge from `request_host` may name `resource`. The host
    /// must be a vault of this cloud, or live under the audience's own host.
    pub fn accepts(&self, request_host: &str, resource: &str) -> bool {
        let request_host = request_host.to_ascii_lowercase();
        if !self.vault_dns_suffix.is_empty() && is_subdomain(&request_host, &self.vault_dns_suffix) {
            return true;
        }
        match Url::parse(resource) {
            Ok(url) => url
                .host_str()
                .is_some_and(|host| is_subdomain(&request_host, &host.to_ascii_lowercase())),
            Err(_) => false,
        }
    }

    /// Audience previously discovered for a host
    pub async fn audience_for_host(&self, host: &str) -> Option<String> {
        self.audiences.read().await.get(host).cloned()
    }

    pub async fn remember_audience(&self, host: &str, resource: &str) {
        self.audiences
            .write()
            .await
            .insert(host.to_string(), resource.to_string());
    }

    /// Token for an audience, creating its token source on first use
    pub async fn token_for(&self, resource: &str) -> Result<String> {
        let existing = self.tokens.read().await.get(resource).cloned();
        let source = match existing {
            Some(source) => source,
            None => {
                let mut tokens = self.tokens.write().await;
                tokens
                    .entry(resource.to_string())
                    .or_insert_with(|| Arc::new((self.factory)(resource)))
                    .clone()
            }
        };
        source.token().await
    }
}

/// `host` equals `domain` or sits under it
fn is_subdomain(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

/// Parse `Bearer authorization="...", resource="..."` and return the resource
pub fn parse_bearer_challenge(header: &str) -> Option<String> {
    let rest = header.trim().strip_prefix("Bearer")?;
    let mut authorization = None;
    let mut resource = None;
    let mut scope = None;

    for part in rest.split(',') {
        let Some((key, value)) = part.split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches('"').to_string();
        match key.trim().to_ascii_lowercase().as_str() {
            "authorization" | "authorization_uri" => authorization = Some(value),
            "resource" => resource = Some(value),
            "scope" => scope = Some(value),
            _ => {}
        }
    }

    authorization?;
    resource.or_else(|| scope.map(|s| s.trim_end_matches("/.default").to_string()))
}

/// How a service client attaches credentials to its requests
#[derive(Clone)]
pub enum Authorizer {
    Bearer(Arc<ServicePrincipalToken>),
    Challenge(Arc<ChallengeAuthorizer>),
}

impl fmt::Debug for Authorizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bearer(token) => write!(f, "Bearer({})", token.resource()),
            Self::Challenge(_) => write!(f, "Challenge"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oauth_config_builds_token_endpoint() {
        let cfg = OAuthConfig::new("https://login.microsoftonline.com/", "my-tenant").unwrap();
        assert_eq!(
            cfg.token_endpoint().as_str(),
            "https://login.microsoftonline.com/my-tenant/oauth2/token"
        );
    }

    #[test]
    fn test_oauth_config_rejects_bad_tenant() {
        assert!(matches!(
            OAuthConfig::new("https://login.microsoftonline.com/", ""),
            Err(ProviderError::Config(_))
        ));
        assert!(matches!(
            OAuthConfig::new("https://login.microsoftonline.com/", "a/b"),
            Err(ProviderError::Config(_))
        ));
    }

    #[test]
    fn test_parse_bearer_challenge() {
        let header = r#"Bearer authorization="https://login.windows.net/72f988bf", resource="https://vault.azure.net""#;
        assert_eq!(
            parse_bearer_challenge(header).as_deref(),
            Some("https://vault.azure.net")
        );

        let scoped = r#"Bearer authorization="https://login.windows.net/t", scope="https://vault.azure.net/.default""#;
        assert_eq!(
            parse_bearer_challenge(scoped).as_deref(),
            Some("https://vault.azure.net")
        );

        assert!(parse_bearer_challenge("Basic realm=\"x\"").is_none());
        assert!(parse_bearer_challenge(r#"Bearer resource="https://vault.azure.net""#).is_none());
    }

    fn challenge_authorizer() -> ChallengeAuthorizer {
        ChallengeAuthorizer::new("vault.azure.net", |resource: &str| {
            let oauth = OAuthConfig::new("https://login.microsoftonline.com/", "t").unwrap();
            ServicePrincipalToken::new(oauth, "c", "s", resource, reqwest::Client::new())
        })
    }

    #[test]
    fn test_challenge_audience_must_match_host() {
        let auth = challenge_authorizer();
        assert!(auth.accepts("myvault.vault.azure.net", "https://vault.azure.net"));
        assert!(auth.accepts("127.0.0.1", "http://127.0.0.1:8080"));
        assert!(!auth.accepts("evil.example.com", "https://management.azure.com/"));
        assert!(!auth.accepts("evilvault.azure.net.example.com", "https://vault.azure.net"));
        assert!(!auth.accepts("notvault.azure.net", "not a url"));
    }

    #[test]
    fn test_token_response_accepts_string_expiry() {
        let parsed: TokenResponse =
            serde_json::from_str(r#"{"access_token":"t","expires_in":"3599"}"#).unwrap();
        assert_eq!(parsed.expires_in, Some(3599));

        let parsed: TokenResponse =
            serde_json::from_str(r#"{"access_token":"t","expires_in":3599}"#).unwrap();
        assert_eq!(parsed.expires_in, Some(3599));

        let parsed: TokenResponse = serde_json::from_str(r#"{"access_token":"t"}"#).unwrap();
        assert_eq!(parsed.expires_in, None);
    }

    #[test]
    fn test_credentials_debug_hides_secret() {
        let creds = Credentials::new("client", "tenant", "sub", "hunter2", "public");
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("[redacted]"));
    }
}

//! Integration tests for building the client registry against a fake cloud

mod common;

use azrm::arm::auth::{Credentials, OAuthConfig, ServicePrincipalToken};
use azrm::arm::http::USER_AGENT;
use azrm::arm::registry::{ClientRegistry, RegistryOptions, ServiceFamily};
use azrm::error::ProviderError;
use common::{environment, registry, resource_group_path, TENANT, TOKEN};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{bearer_token, body_string_contains, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_build_registers_every_family() {
    let server = MockServer::start().await;
    let registry = registry(&server).await;

    assert_eq!(registry.families().len(), ServiceFamily::ALL.len());
    assert_eq!(registry.subscription_id(), common::SUBSCRIPTION);
    assert_eq!(registry.tenant_id(), TENANT);

    let graph = registry.client(ServiceFamily::Graph).unwrap();
    assert_eq!(graph.base_url(), format!("{}/graph", server.uri()));
    assert_eq!(graph.scope_id(), TENANT);

    let mysql = registry.client(ServiceFamily::MySql).unwrap();
    assert_eq!(mysql.base_url(), server.uri());
    assert_eq!(mysql.api_version(), "2017-04-30-preview");
}

#[tokio::test]
async fn test_build_fetches_management_and_directory_tokens() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("/{}/oauth2/token", TENANT)))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains("client_id=test-client"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": TOKEN,
            "expires_in": 3599
        })))
        .expect(2)
        .mount(&server)
        .await;

    ClientRegistry::build_with(
        &common::credentials(),
        environment(&server),
        RegistryOptions::default(),
    )
    .await
    .expect("registry should build");
}

#[tokio::test]
async fn test_rejected_tenant_fails_build() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("/{}/oauth2/token", TENANT)))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_request",
            "error_description": "AADSTS90002: Tenant 'test-tenant' not found."
        })))
        .mount(&server)
        .await;

    let result = ClientRegistry::build_with(
        &common::credentials(),
        environment(&server),
        RegistryOptions::default(),
    )
    .await;

    match result {
        Err(ProviderError::Config(message)) => {
            assert!(message.contains("AADSTS90002"), "{message}");
        }
        Err(other) => panic!("expected a configuration error, got {other:?}"),
        Ok(_) => panic!("build should fail"),
    }
}

#[tokio::test]
async fn test_malformed_tenant_fails_without_network() {
    let server = MockServer::start().await;
    let creds = Credentials::new("client", "bad/tenant", "sub", "secret", "public");

    let result = ClientRegistry::build_with(&creds, environment(&server), RegistryOptions::default()).await;
    assert!(matches!(result, Err(ProviderError::Config(_))));

    let requests = server.received_requests().await.unwrap();
    assert!(requests.is_empty());
}

#[tokio::test]
async fn test_unknown_environment_is_a_config_error() {
    let creds = Credentials::new("client", "tenant", "sub", "secret", "mars");
    let result = ClientRegistry::build(&creds).await;
    assert!(matches!(result, Err(ProviderError::Config(_))));
}

#[tokio::test]
async fn test_requests_carry_identifying_headers() {
    let server = MockServer::start().await;
    let registry = registry(&server).await;

    Mock::given(method("GET"))
        .and(path(resource_group_path("rg")))
        .and(bearer_token(TOKEN))
        .and(header("user-agent", USER_AGENT))
        .and(header_exists("x-ms-client-request-id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "rg"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = registry.client(ServiceFamily::Resources).unwrap();
    let response = client.get(&client.resource_group_url("rg")).await.unwrap();
    assert_eq!(response.json_value().unwrap()["name"], "rg");
}

#[tokio::test]
async fn test_tokens_are_cached_across_requests() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("/{}/oauth2/token", TENANT)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": TOKEN,
            "expires_in": "3599"
        })))
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(resource_group_path("rg")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "rg"})))
        .expect(3)
        .mount(&server)
        .await;

    let registry = ClientRegistry::build_with(
        &common::credentials(),
        environment(&server),
        RegistryOptions::default(),
    )
    .await
    .unwrap();

    let client = registry.client(ServiceFamily::Resources).unwrap();
    let url = client.resource_group_url("rg");
    let (a, b, c) = tokio::join!(client.get(&url), client.get(&url), client.get(&url));
    assert!(a.is_ok() && b.is_ok() && c.is_ok());
}

#[tokio::test]
async fn test_concurrent_callers_share_one_exchange() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("/{}/oauth2/token", TENANT)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": TOKEN, "expires_in": 3599}))
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let oauth = OAuthConfig::new(&format!("{}/", server.uri()), TENANT).unwrap();
    let source = ServicePrincipalToken::new(
        oauth,
        "test-client",
        "test-secret",
        "https://management.test/",
        reqwest::Client::new(),
    );

    let tokens = futures::future::join_all((0..10).map(|_| source.token())).await;
    assert!(tokens.iter().all(|t| t.as_deref().ok() == Some(TOKEN)));
}

#[test]
fn test_short_environment_names_resolve() {
    for name in ["public", "AzurePublicCloud", "usgovernment", "CHINA"] {
        let env = azrm::arm::environment::Environment::resolve(name);
        assert!(env.is_ok(), "{name} should resolve");
    }
}

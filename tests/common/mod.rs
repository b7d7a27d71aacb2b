//! Shared fixtures: a fake Azure cloud served by wiremock

#![allow(dead_code)]

use azrm::arm::auth::Credentials;
use azrm::arm::environment::Environment;
use azrm::arm::registry::{ClientRegistry, RegistryOptions};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TENANT: &str = "test-tenant";
pub const SUBSCRIPTION: &str = "test-sub";
pub const TOKEN: &str = "test-token";

pub fn credentials() -> Credentials {
    Credentials::new("test-client", TENANT, SUBSCRIPTION, "test-secret", "public")
}

/// Every endpoint of the environment points at the mock server
pub fn environment(server: &MockServer) -> Environment {
    Environment {
        name: "AZURETESTCLOUD".to_string(),
        resource_manager_endpoint: format!("{}/", server.uri()),
        active_directory_endpoint: format!("{}/", server.uri()),
        graph_endpoint: format!("{}/graph/", server.uri()),
        key_vault_dns_suffix: "vault.test".to_string(),
        storage_endpoint_suffix: "core.test".to_string(),
    }
}

/// Token endpoint that accepts any client credentials
pub async fn mount_token_endpoint(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(format!("/{}/oauth2/token", TENANT)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token_type": "Bearer",
            "expires_in": "3599",
            "access_token": TOKEN
        })))
        .mount(server)
        .await;
}

/// Registry against the mock server with a fast poll interval
pub async fn registry(server: &MockServer) -> ClientRegistry {
    mount_token_endpoint(server).await;
    ClientRegistry::build_with(
        &credentials(),
        environment(server),
        RegistryOptions {
            poll_interval: Duration::from_millis(10),
        },
    )
    .await
    .expect("registry should build")
}

pub fn resource_group_path(group: &str) -> String {
    format!("/subscriptions/{}/resourcegroups/{}", SUBSCRIPTION, group)
}

pub fn provider_path(group: &str, namespace: &str, rest: &str) -> String {
    format!(
        "/subscriptions/{}/resourceGroups/{}/providers/{}/{}",
        SUBSCRIPTION, group, namespace, rest
    )
}
